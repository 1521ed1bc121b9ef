// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Ledger engine.
//!
//! The [`Engine`] is the only writer of account balances. It provisions one
//! account per owner and applies movements to them.
//!
//! # Applying a movement
//!
//! 1. The request is validated before anything is locked.
//! 2. The target account's mutex is acquired, bounded by a timeout.
//! 3. The new balance is computed and checked against the invariants.
//! 4. The new account state and the movement are committed to the store as
//!    one unit, and only then is the live copy updated.
//!
//! A rejected or failed apply leaves no movement and no balance change behind.
//!
//! # Thread Safety
//!
//! Accounts are indexed in [`DashMap`]s and each has its own mutex, so
//! movements on different accounts proceed in parallel while movements on the
//! same account are serialized in the order they acquire the lock.

use crate::account::{Account, AccountSlot};
use crate::base::{AccountId, MovementId, OwnerId};
use crate::config::LedgerConfig;
use crate::directory::{OpenDirectory, OwnerDirectory};
use crate::error::{LedgerError, LedgerResult};
use crate::history::{HistoryPage, HistoryQuery};
use crate::invariant;
use crate::movement::{Movement, MovementRequest, MovementStatus};
use crate::sequencer::Sequencer;
use crate::store::{LedgerStore, MemoryStore};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of a successful apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    pub movement_id: MovementId,
    pub balance: Decimal,
}

/// Ledger engine managing owner accounts and their movement logs.
///
/// # Invariants
///
/// - Exactly one account per owner.
/// - `balance == Σ signed(amount)` over the account's completed movements.
/// - No balance is ever negative.
/// - Movements are only ever appended.
pub struct Engine {
    /// Live accounts indexed by account ID.
    accounts: DashMap<AccountId, Arc<AccountSlot>>,
    /// Owner to account index; its entry lock makes provisioning idempotent.
    owners: DashMap<OwnerId, AccountId>,
    store: Arc<dyn LedgerStore>,
    directory: Arc<dyn OwnerDirectory>,
    account_ids: Sequencer,
    movement_ids: Sequencer,
    config: LedgerConfig,
}

impl Engine {
    /// Engine over a fresh in-memory store that accepts every owner.
    pub fn in_memory() -> Self {
        Self {
            accounts: DashMap::new(),
            owners: DashMap::new(),
            store: Arc::new(MemoryStore::new()),
            directory: Arc::new(OpenDirectory),
            account_ids: Sequencer::new(0),
            movement_ids: Sequencer::new(0),
            config: LedgerConfig::default(),
        }
    }

    /// Opens an engine over `store`, loading every persisted account.
    ///
    /// With `verify_on_open`, each account is reconciled against its movement
    /// log first and a [`LedgerError::Diverged`] aborts the open.
    pub fn open(
        store: Arc<dyn LedgerStore>,
        directory: Arc<dyn OwnerDirectory>,
        config: LedgerConfig,
    ) -> LedgerResult<Self> {
        let persisted = store.accounts()?;
        let last_account = persisted.iter().map(|account| account.id.0).max();
        let last_movement = store.latest_movement_id()?;

        let engine = Self {
            accounts: DashMap::with_capacity(persisted.len()),
            owners: DashMap::with_capacity(persisted.len()),
            store,
            directory,
            account_ids: Sequencer::new(last_account.unwrap_or(0)),
            movement_ids: Sequencer::new(last_movement.map_or(0, |id| id.0)),
            config,
        };

        for account in persisted {
            if engine.config.verify_on_open {
                engine.reconcile(&account)?;
            }
            engine.owners.insert(account.owner, account.id);
            engine
                .accounts
                .insert(account.id, Arc::new(AccountSlot::new(account)));
        }

        info!(
            accounts = engine.accounts.len(),
            last_movement = ?last_movement,
            "ledger opened"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // === Account Store ===

    /// Returns the owner's account, provisioning it with a zero balance on
    /// first use.
    ///
    /// Concurrent calls for the same owner converge on a single account. The
    /// owner directory is consulted without holding any engine lock; the store
    /// insert runs while the owner's registry shard is locked, so lookups of
    /// owners in that shard wait for it.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::OwnerNotFound`] - The owner directory does not know the owner.
    /// - [`LedgerError::Storage`] - The new account could not be persisted.
    pub fn get_or_create(&self, owner: OwnerId) -> LedgerResult<Account> {
        if let Some(account) = self.get_existing(owner)? {
            return Ok(account);
        }

        // The directory may be slow or call back into the engine, so it is
        // consulted before any shard lock is taken.
        if !self.directory.exists(owner) {
            warn!(%owner, "account requested for unknown owner");
            return Err(LedgerError::OwnerNotFound(owner));
        }

        // The vacant entry holds the owner's shard lock across the store
        // insert, so racing callers observe either nothing or the new account.
        let id = match self.owners.entry(owner) {
            Entry::Occupied(entry) => *entry.get(),
            Entry::Vacant(entry) => {
                let id = AccountId(self.account_ids.next());
                let account = Account::open(id, owner, Utc::now());
                self.store.insert_account(&account).inspect_err(|err| {
                    warn!(%owner, error = %err, "failed to persist new account");
                })?;
                self.accounts.insert(id, Arc::new(AccountSlot::new(account)));
                entry.insert(id);
                info!(%owner, account = %id, "account provisioned");
                id
            }
        };

        self.account(id)
    }

    /// Returns the owner's account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] - The owner has no account.
    pub fn get(&self, owner: OwnerId) -> LedgerResult<Account> {
        self.get_existing(owner)?.ok_or(LedgerError::NotFound)
    }

    /// Returns an account by its ID, as last committed.
    pub fn account(&self, id: AccountId) -> LedgerResult<Account> {
        self.store.account(id)?.ok_or(LedgerError::NotFound)
    }

    /// Returns every account, ordered by ID.
    pub fn accounts(&self) -> LedgerResult<Vec<Account>> {
        self.store.accounts()
    }

    fn get_existing(&self, owner: OwnerId) -> LedgerResult<Option<Account>> {
        // Copy the ID out so the owners shard is released before reading.
        let id = self.owners.get(&owner).map(|entry| *entry.value());
        id.map(|id| self.account(id)).transpose()
    }

    // === Ledger Engine ===

    /// Applies a movement to an account, waiting up to the configured lock
    /// timeout for exclusive access.
    ///
    /// See [`Engine::apply_within`].
    pub fn apply(&self, account: AccountId, request: &MovementRequest) -> LedgerResult<Receipt> {
        self.apply_within(account, request, self.config.lock_timeout())
    }

    /// Applies a movement to an account, waiting at most `timeout` for
    /// exclusive access.
    ///
    /// | Kind | Effect |
    /// |------|--------|
    /// | Deposit, Bonus, Refund | Balance increases by `amount` |
    /// | Withdrawal, Fee | Balance decreases by `amount` (never below zero) |
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is not positive, finer than cents, or too large.
    /// - [`LedgerError::InvalidDescription`] - Description is blank or too long.
    /// - [`LedgerError::NotFound`] - No such account.
    /// - [`LedgerError::Busy`] - Exclusive access not acquired within `timeout`.
    /// - [`LedgerError::InsufficientFunds`] - Debit exceeds the balance.
    /// - [`LedgerError::LimitExceeded`] - Credit would overflow the balance.
    /// - [`LedgerError::Storage`] - The commit failed; nothing was written.
    pub fn apply_within(
        &self,
        account: AccountId,
        request: &MovementRequest,
        timeout: Duration,
    ) -> LedgerResult<Receipt> {
        let amount = request.validate().inspect_err(|err| {
            warn!(
                %account,
                kind = %request.kind,
                amount = %request.amount,
                error = %err,
                "movement rejected"
            );
        })?;

        let slot = self.slot(account)?;
        let mut current = slot.acquire(timeout).inspect_err(|_| {
            warn!(%account, ?timeout, "timed out waiting for account");
        })?;

        let balance = invariant::next_balance(current.balance, request.kind, amount)
            .inspect_err(|err| {
                warn!(
                    %account,
                    kind = %request.kind,
                    %amount,
                    balance = %current.balance,
                    error = %err,
                    "movement rejected"
                );
            })?;

        let now = Utc::now();
        let movement = Movement {
            id: MovementId(self.movement_ids.next()),
            account,
            amount,
            kind: request.kind,
            status: MovementStatus::Completed,
            description: request.description.trim().to_owned(),
            trip: request.trip,
            created_at: now,
        };
        let next = current.advanced(balance, now);

        self.store.commit(&next, &movement).inspect_err(|err| {
            warn!(%account, movement = %movement.id, error = %err, "commit failed");
        })?;
        *current = next;
        drop(current);

        debug!(
            %account,
            movement = %movement.id,
            kind = %movement.kind,
            %amount,
            %balance,
            "movement applied"
        );
        Ok(Receipt {
            movement_id: movement.id,
            balance,
        })
    }

    fn slot(&self, account: AccountId) -> LedgerResult<Arc<AccountSlot>> {
        // Never hold a shard guard while waiting on an account mutex.
        self.accounts
            .get(&account)
            .map(|slot| Arc::clone(slot.value()))
            .ok_or(LedgerError::NotFound)
    }

    // === Queries ===

    /// Current committed balance. Does not wait for in-flight applies.
    pub fn balance(&self, account: AccountId) -> LedgerResult<Decimal> {
        self.account(account).map(|account| account.balance)
    }

    /// One page of the account's movement log.
    pub fn history(&self, account: AccountId, query: &HistoryQuery) -> LedgerResult<HistoryPage> {
        if !self.accounts.contains_key(&account) {
            return Err(LedgerError::NotFound);
        }
        let limit = self.config.page_size(query.limit);
        let rows = self
            .store
            .movements(account, query, limit.saturating_add(1))?;
        Ok(HistoryPage::from_rows(rows, limit))
    }

    // === Audit ===

    /// Checks that the account's balance is explained by its movement log.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Diverged`] - Balance and movements disagree.
    pub fn audit(&self, account: AccountId) -> LedgerResult<()> {
        let snapshot = self.account(account)?;
        self.reconcile(&snapshot)
    }

    /// Audits every account, stopping at the first divergence.
    pub fn audit_all(&self) -> LedgerResult<usize> {
        let accounts = self.store.accounts()?;
        for account in &accounts {
            self.reconcile(account)?;
        }
        Ok(accounts.len())
    }

    fn reconcile(&self, account: &Account) -> LedgerResult<()> {
        let movements = self.full_log(account.id)?;
        invariant::reconcile(account, &movements).inspect_err(|err| {
            warn!(account = %account.id, error = %err, "ledger audit failed");
        })
    }

    fn full_log(&self, account: AccountId) -> LedgerResult<Vec<Movement>> {
        let page = self.config.max_page_size.max(1);
        let mut query = HistoryQuery::default();
        let mut log = Vec::new();
        loop {
            let rows = self.store.movements(account, &query, page)?;
            let Some(last) = rows.last().map(|movement| movement.id) else {
                break;
            };
            let done = rows.len() < page;
            log.extend(rows);
            if done {
                break;
            }
            query = query.after(last);
        }
        Ok(log)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::in_memory()
    }
}

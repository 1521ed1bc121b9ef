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

use super::LedgerStore;
use crate::account::Account;
use crate::base::{AccountId, MovementId};
use crate::error::{LedgerError, LedgerResult};
use crate::history::{HistoryQuery, Order};
use crate::movement::Movement;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// An account together with its movement log.
///
/// Both live behind one lock so a commit is observed all at once.
#[derive(Debug)]
struct Book {
    account: Account,
    movements: Vec<Movement>,
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    books: DashMap<AccountId, Arc<RwLock<Book>>>,
    latest_movement: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn book(&self, id: AccountId) -> Option<Arc<RwLock<Book>>> {
        // Clone the Arc so no shard guard is held while locking the book.
        self.books.get(&id).map(|book| Arc::clone(&book))
    }
}

impl LedgerStore for MemoryStore {
    fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        match self.books.entry(account.id) {
            Entry::Occupied(_) => Err(LedgerError::Storage(format!(
                "account {} already exists",
                account.id
            ))),
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(RwLock::new(Book {
                    account: account.clone(),
                    movements: Vec::new(),
                })));
                Ok(())
            }
        }
    }

    fn commit(&self, account: &Account, movement: &Movement) -> LedgerResult<()> {
        if movement.account != account.id {
            return Err(LedgerError::Storage(format!(
                "movement {} belongs to account {}, not {}",
                movement.id, movement.account, account.id
            )));
        }
        let book = self.book(account.id).ok_or_else(|| {
            LedgerError::Storage(format!("account {} is not stored", account.id))
        })?;

        let mut book = book.write();
        if let Some(last) = book.movements.last() {
            if last.id >= movement.id {
                return Err(LedgerError::Storage(format!(
                    "movement {} is not newer than {}",
                    movement.id, last.id
                )));
            }
        }
        book.account = account.clone();
        book.movements.push(movement.clone());
        self.latest_movement.fetch_max(movement.id.0, Ordering::SeqCst);
        Ok(())
    }

    fn account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.book(id).map(|book| book.read().account.clone()))
    }

    fn accounts(&self) -> LedgerResult<Vec<Account>> {
        let books: Vec<_> = self
            .books
            .iter()
            .map(|book| Arc::clone(book.value()))
            .collect();
        let mut accounts: Vec<Account> = books
            .iter()
            .map(|book| book.read().account.clone())
            .collect();
        accounts.sort_by_key(|account| account.id);
        Ok(accounts)
    }

    fn movements(
        &self,
        account: AccountId,
        query: &HistoryQuery,
        limit: usize,
    ) -> LedgerResult<Vec<Movement>> {
        let Some(book) = self.book(account) else {
            return Ok(Vec::new());
        };
        let book = book.read();
        let admitted = |movement: &&Movement| query.admits(movement.id);

        let rows: Vec<Movement> = match query.order {
            Order::OldestFirst => book
                .movements
                .iter()
                .filter(admitted)
                .take(limit)
                .cloned()
                .collect(),
            Order::NewestFirst => book
                .movements
                .iter()
                .rev()
                .filter(admitted)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(rows)
    }

    fn latest_movement_id(&self) -> LedgerResult<Option<MovementId>> {
        match self.latest_movement.load(Ordering::SeqCst) {
            0 => Ok(None),
            id => Ok(Some(MovementId(id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::OwnerId;
    use crate::movement::{MovementKind, MovementStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn account(id: u64) -> Account {
        Account::open(AccountId(id), OwnerId(id), Utc::now())
    }

    fn deposit(id: u64, account: u64) -> Movement {
        Movement {
            id: MovementId(id),
            account: AccountId(account),
            amount: dec!(1.00),
            kind: MovementKind::Deposit,
            status: MovementStatus::Completed,
            description: format!("deposit {id}"),
            trip: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn duplicate_account_is_rejected() {
        let store = MemoryStore::new();
        store.insert_account(&account(1)).unwrap();
        assert!(matches!(
            store.insert_account(&account(1)),
            Err(LedgerError::Storage(_))
        ));
    }

    #[test]
    fn commit_updates_account_and_log_together() {
        let store = MemoryStore::new();
        let base = account(1);
        store.insert_account(&base).unwrap();

        let next = base.advanced(dec!(1.00), Utc::now());
        store.commit(&next, &deposit(1, 1)).unwrap();

        assert_eq!(store.account(AccountId(1)).unwrap().unwrap().balance, dec!(1.00));
        let log = store
            .movements(AccountId(1), &HistoryQuery::default(), 10)
            .unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(store.latest_movement_id().unwrap(), Some(MovementId(1)));
    }

    #[test]
    fn commit_rejects_out_of_order_movement() {
        let store = MemoryStore::new();
        let base = account(1);
        store.insert_account(&base).unwrap();
        store
            .commit(&base.advanced(dec!(1.00), Utc::now()), &deposit(5, 1))
            .unwrap();

        let result = store.commit(&base.advanced(dec!(2.00), Utc::now()), &deposit(3, 1));
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_eq!(store.account(AccountId(1)).unwrap().unwrap().balance, dec!(1.00));
    }

    #[test]
    fn commit_to_unknown_account_fails() {
        let store = MemoryStore::new();
        let result = store.commit(&account(9), &deposit(1, 9));
        assert!(matches!(result, Err(LedgerError::Storage(_))));
        assert_eq!(store.latest_movement_id().unwrap(), None);
    }

    #[test]
    fn movements_respect_cursor_and_direction() {
        let store = MemoryStore::new();
        let mut state = account(1);
        store.insert_account(&state).unwrap();
        for id in 1..=5 {
            state = state.advanced(state.balance + dec!(1.00), Utc::now());
            store.commit(&state, &deposit(id, 1)).unwrap();
        }

        let ids = |rows: Vec<Movement>| rows.into_iter().map(|m| m.id.0).collect::<Vec<_>>();

        let forward = store
            .movements(AccountId(1), &HistoryQuery::default().after(MovementId(2)), 2)
            .unwrap();
        assert_eq!(ids(forward), vec![3, 4]);

        let backward = store
            .movements(AccountId(1), &HistoryQuery::default().newest_first(), 3)
            .unwrap();
        assert_eq!(ids(backward), vec![5, 4, 3]);
    }
}

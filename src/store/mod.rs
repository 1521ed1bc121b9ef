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

//! Persistence backends for accounts and the movement log.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::account::Account;
use crate::base::{AccountId, MovementId};
use crate::error::LedgerResult;
use crate::history::HistoryQuery;
use crate::movement::Movement;

/// Abstraction over account and movement storage.
///
/// Movements can only be appended; there is no update or delete path.
pub trait LedgerStore: Send + Sync {
    /// Persist a newly provisioned account.
    fn insert_account(&self, account: &Account) -> LedgerResult<()>;

    /// Persist the account's new state and its new movement as one unit.
    ///
    /// On error neither write is visible.
    fn commit(&self, account: &Account, movement: &Movement) -> LedgerResult<()>;

    fn account(&self, id: AccountId) -> LedgerResult<Option<Account>>;

    fn accounts(&self) -> LedgerResult<Vec<Account>>;

    /// Up to `limit` movements of `account` admitted by `query`, in its order.
    fn movements(
        &self,
        account: AccountId,
        query: &HistoryQuery,
        limit: usize,
    ) -> LedgerResult<Vec<Movement>>;

    /// Highest movement id ever committed.
    fn latest_movement_id(&self) -> LedgerResult<Option<MovementId>>;
}

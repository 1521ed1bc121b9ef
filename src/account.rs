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

//! Account management.
//!
//! [`Account`] is a plain snapshot of one owner's wallet. The engine keeps the
//! live copy inside an [`AccountSlot`], whose mutex is the account's exclusive
//! access: whoever holds the guard is the only writer of that balance.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use wallet_ledger::{Engine, OwnerId};
//!
//! let engine = Engine::in_memory();
//! let account = engine.get_or_create(OwnerId(1)).unwrap();
//! assert_eq!(account.balance, dec!(0.00));
//! ```

use crate::base::{AccountId, OwnerId};
use crate::error::{LedgerError, LedgerResult};
use crate::movement::SCALE;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::time::Duration;

/// Ledger account of a single owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub owner: OwnerId,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// A fresh account with a `0.00` balance.
    pub(crate) fn open(id: AccountId, owner: OwnerId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner,
            balance: Decimal::new(0, SCALE),
            created_at: now,
            updated_at: now,
        }
    }

    /// The state this account moves to once a movement is committed.
    pub(crate) fn advanced(&self, balance: Decimal, now: DateTime<Utc>) -> Self {
        Self {
            balance,
            updated_at: now,
            ..self.clone()
        }
    }
}

impl Serialize for Account {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Account", 5)?;
        state.serialize_field("account", &self.id)?;
        state.serialize_field("owner", &self.owner)?;
        state.serialize_field("balance", &self.balance.round_dp(SCALE))?;
        state.serialize_field("created_at", &self.created_at)?;
        state.serialize_field("updated_at", &self.updated_at)?;
        state.end()
    }
}

/// Live, lockable copy of an account held by the engine.
#[derive(Debug)]
pub(crate) struct AccountSlot {
    inner: Mutex<Account>,
}

impl AccountSlot {
    pub(crate) fn new(account: Account) -> Self {
        Self {
            inner: Mutex::new(account),
        }
    }

    /// Takes exclusive access to the account, waiting at most `timeout`.
    pub(crate) fn acquire(&self, timeout: Duration) -> LedgerResult<MutexGuard<'_, Account>> {
        self.inner.try_lock_for(timeout).ok_or(LedgerError::Busy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Account {
        Account::open(AccountId(1), OwnerId(42), Utc::now())
    }

    #[test]
    fn open_account_has_zero_balance_at_scale() {
        let account = sample();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.balance.to_string(), "0.00");
        assert_eq!(account.created_at, account.updated_at);
    }

    #[test]
    fn advanced_keeps_identity_and_creation_time() {
        let account = sample();
        let later = account.created_at + chrono::Duration::seconds(5);
        let next = account.advanced(dec!(12.50), later);
        assert_eq!(next.id, account.id);
        assert_eq!(next.owner, account.owner);
        assert_eq!(next.created_at, account.created_at);
        assert_eq!(next.updated_at, later);
        assert_eq!(next.balance, dec!(12.50));
    }

    #[test]
    fn acquire_times_out_while_held() {
        let slot = AccountSlot::new(sample());
        let _guard = slot.acquire(Duration::from_millis(10)).unwrap();
        let second = slot.acquire(Duration::from_millis(10));
        assert_eq!(second.err(), Some(LedgerError::Busy));
    }

    #[test]
    fn acquire_succeeds_after_release() {
        let slot = AccountSlot::new(sample());
        drop(slot.acquire(Duration::from_millis(10)).unwrap());
        assert!(slot.acquire(Duration::from_millis(10)).is_ok());
    }

    // === Serialization Tests ===

    #[test]
    fn serializer_rounds_to_two_decimal_places() {
        let mut account = sample();
        account.balance = dec!(123.456);

        let json = serde_json::to_string(&account).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["balance"].as_str().unwrap(), "123.46");
        assert_eq!(parsed["account"], 1);
        assert_eq!(parsed["owner"], 42);
    }

    #[test]
    fn serializer_uses_bankers_rounding() {
        let mut account = sample();
        // 0.125 rounds to 0.12 (half to even), 0.135 rounds to 0.14
        account.balance = dec!(0.125);
        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        assert_eq!(parsed["balance"].as_str().unwrap(), "0.12");

        account.balance = dec!(0.135);
        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        assert_eq!(parsed["balance"].as_str().unwrap(), "0.14");
    }

    #[test]
    fn serializer_keeps_scale_of_stored_balance() {
        let mut account = sample();
        account.balance = dec!(1000.00);
        let parsed: serde_json::Value = serde_json::to_value(&account).unwrap();
        assert_eq!(parsed["balance"].as_str().unwrap(), "1000.00");
    }
}

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

//! Error types for ledger operations.

use crate::base::{AccountId, OwnerId};
use rust_decimal::Decimal;
use thiserror::Error;

/// Result alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger errors.
///
/// Every failure leaves the account and its movement log exactly as they were
/// before the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero, negative, finer than cents, or above the column limit
    #[error("invalid amount (must be positive, at most 2 decimal places)")]
    InvalidAmount,

    /// Description is blank or too long
    #[error("invalid description (must be non-blank, at most 255 characters)")]
    InvalidDescription,

    /// Debit would drive the balance below zero
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Credit would push the balance past the storable maximum
    #[error("balance limit exceeded")]
    LimitExceeded,

    /// The profile system does not know the owner
    #[error("owner {0} not found")]
    OwnerNotFound(OwnerId),

    /// No such account
    #[error("account not found")]
    NotFound,

    /// Exclusive access to the account was not acquired in time
    #[error("account is busy, retry later")]
    Busy,

    /// The storage layer failed; nothing was persisted
    #[error("storage failure: {0}")]
    Storage(String),

    /// Persisted balance does not match the movement log
    #[error("account {account} diverged: recorded {recorded}, movements sum to {derived}")]
    Diverged {
        account: AccountId,
        recorded: Decimal,
        derived: Decimal,
    },
}

impl LedgerError {
    /// Whether the same call may succeed if simply retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy | Self::Storage(_))
    }
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

impl From<std::io::Error> for LedgerError {
    fn from(value: std::io::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

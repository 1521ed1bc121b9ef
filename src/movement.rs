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

//! Movements: the immutable records of the movement log.
//!
//! A [`MovementRequest`] is what a collaborator (trip settlement, promo
//! redemption, payouts) hands to the engine. A [`Movement`] is what the engine
//! writes once the request has been applied. Amounts are always positive; the
//! sign comes from [`MovementKind::direction`].

use crate::base::{AccountId, MovementId, TripRef};
use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places carried by amounts and balances.
pub const SCALE: u32 = 2;

/// Largest amount (and balance) the ledger stores: ten significant digits.
pub const MAX_AMOUNT: Decimal = dec!(99999999.99);

/// Longest accepted movement description, in characters.
pub const MAX_DESCRIPTION_LEN: usize = 255;

/// Whether a movement adds to or takes from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    /// Money coming in, e.g. a trip payout.
    Deposit,
    /// Money leaving, e.g. a driver cashing out.
    Withdrawal,
    /// Promotional credit.
    Bonus,
    /// Correction of an earlier debit.
    Refund,
    /// Platform commission.
    Fee,
}

impl MovementKind {
    pub const ALL: [MovementKind; 5] = [
        MovementKind::Deposit,
        MovementKind::Withdrawal,
        MovementKind::Bonus,
        MovementKind::Refund,
        MovementKind::Fee,
    ];

    pub fn direction(self) -> Direction {
        match self {
            MovementKind::Deposit | MovementKind::Bonus | MovementKind::Refund => Direction::Credit,
            MovementKind::Withdrawal | MovementKind::Fee => Direction::Debit,
        }
    }

    pub fn is_debit(self) -> bool {
        self.direction() == Direction::Debit
    }

    /// Balance delta produced by applying `amount` with this kind.
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self.direction() {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementKind::Deposit => "deposit",
            MovementKind::Withdrawal => "withdrawal",
            MovementKind::Bonus => "bonus",
            MovementKind::Refund => "refund",
            MovementKind::Fee => "fee",
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MovementKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown movement kind: {s}"))
    }
}

/// Settlement status of a movement.
///
/// Only [`MovementStatus::Completed`] is written today: rejected requests
/// never reach the log. `Pending` is reserved for asynchronous settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementStatus {
    Pending,
    Completed,
    Failed,
}

impl MovementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MovementStatus::Pending => "pending",
            MovementStatus::Completed => "completed",
            MovementStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for MovementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MovementStatus::Pending),
            "completed" => Ok(MovementStatus::Completed),
            "failed" => Ok(MovementStatus::Failed),
            other => Err(format!("unknown movement status: {other}")),
        }
    }
}

/// A committed entry of an account's movement log. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    pub id: MovementId,
    pub account: AccountId,
    pub amount: Decimal,
    pub kind: MovementKind,
    pub status: MovementStatus,
    pub description: String,
    pub trip: Option<TripRef>,
    pub created_at: DateTime<Utc>,
}

impl Movement {
    /// Contribution of this movement to the account balance.
    ///
    /// Only completed movements count.
    pub fn signed_amount(&self) -> Decimal {
        match self.status {
            MovementStatus::Completed => self.kind.signed(self.amount),
            MovementStatus::Pending | MovementStatus::Failed => Decimal::ZERO,
        }
    }
}

/// A request to move money on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementRequest {
    pub kind: MovementKind,
    pub amount: Decimal,
    pub description: String,
    pub trip: Option<TripRef>,
}

impl MovementRequest {
    pub fn new(kind: MovementKind, amount: Decimal, description: impl Into<String>) -> Self {
        Self {
            kind,
            amount,
            description: description.into(),
            trip: None,
        }
    }

    pub fn with_trip(mut self, trip: TripRef) -> Self {
        self.trip = Some(trip);
        self
    }

    /// Checks the request before any account is touched.
    ///
    /// Returns the amount rescaled to [`SCALE`] decimal places.
    pub(crate) fn validate(&self) -> LedgerResult<Decimal> {
        if self.amount <= Decimal::ZERO
            || self.amount > MAX_AMOUNT
            || self.amount.normalize().scale() > SCALE
        {
            return Err(LedgerError::InvalidAmount);
        }
        let description = self.description.trim();
        if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
            return Err(LedgerError::InvalidDescription);
        }

        let mut amount = self.amount;
        amount.rescale(SCALE);
        Ok(amount)
    }
}

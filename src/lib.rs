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

//! # Wallet Ledger
//!
//! This library keeps one wallet account per user profile and a movement log
//! explaining every change to its balance. Trip settlement, promotions and
//! payouts feed it movements; reporting reads it back.
//!
//! ## Core Components
//!
//! - [`Engine`]: Provisions accounts and applies movements atomically
//! - [`Account`]: Snapshot of one owner's wallet
//! - [`Movement`]: Immutable entry of the movement log
//! - [`MovementKind`]: Deposit, withdrawal, bonus, refund or fee
//! - [`LedgerStore`]: Storage backend ([`MemoryStore`], [`SqliteStore`])
//! - [`LedgerError`]: Error types for ledger failures
//!
//! ## Example
//!
//! ```
//! use wallet_ledger::{Engine, HistoryQuery, MovementKind, MovementRequest, OwnerId, TripRef};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::in_memory();
//! let account = engine.get_or_create(OwnerId(1)).unwrap();
//!
//! // Credit a trip payout
//! let payout = MovementRequest::new(MovementKind::Deposit, dec!(50.00), "trip payout")
//!     .with_trip(TripRef(9));
//! let receipt = engine.apply(account.id, &payout).unwrap();
//! assert_eq!(receipt.balance, dec!(50.00));
//!
//! // Take the platform commission
//! let fee = MovementRequest::new(MovementKind::Fee, dec!(7.50), "commission");
//! engine.apply(account.id, &fee).unwrap();
//!
//! assert_eq!(engine.balance(account.id).unwrap(), dec!(42.50));
//! let page = engine.history(account.id, &HistoryQuery::default()).unwrap();
//! assert_eq!(page.movements.len(), 2);
//! ```
//!
//! ## Thread Safety
//!
//! The engine is `Send + Sync`. Each account has its own lock, so movements
//! on different accounts are applied in parallel.

pub mod account;
mod base;
mod config;
mod directory;
mod engine;
pub mod error;
mod history;
mod invariant;
mod movement;
mod sequencer;
pub mod store;

pub use account::Account;
pub use base::{AccountId, MovementId, OwnerId, TripRef};
pub use config::LedgerConfig;
pub use directory::{KnownOwners, OpenDirectory, OwnerDirectory};
pub use engine::{Engine, Receipt};
pub use error::{LedgerError, LedgerResult};
pub use history::{HistoryPage, HistoryQuery, Order};
pub use movement::{
    Direction, MAX_AMOUNT, MAX_DESCRIPTION_LEN, Movement, MovementKind, MovementRequest,
    MovementStatus, SCALE,
};
pub use store::{LedgerStore, MemoryStore, SqliteStore};

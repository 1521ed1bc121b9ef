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

//! Balance invariants.
//!
//! [`next_balance`] guards every transition made by the engine;
//! [`reconcile`] re-derives a balance from its movement log for audits.

use crate::account::Account;
use crate::error::{LedgerError, LedgerResult};
use crate::movement::{MAX_AMOUNT, Movement, MovementKind, SCALE};
use rust_decimal::Decimal;

/// Balance after applying a validated `amount` of `kind` to `balance`.
pub(crate) fn next_balance(
    balance: Decimal,
    kind: MovementKind,
    amount: Decimal,
) -> LedgerResult<Decimal> {
    debug_assert!(amount > Decimal::ZERO, "amount must be validated before use");

    if kind.is_debit() && amount > balance {
        return Err(LedgerError::InsufficientFunds);
    }
    let mut next = balance
        .checked_add(kind.signed(amount))
        .ok_or(LedgerError::LimitExceeded)?;
    if next > MAX_AMOUNT {
        return Err(LedgerError::LimitExceeded);
    }
    next.rescale(SCALE);

    debug_assert_eq!(
        next - balance,
        kind.signed(amount),
        "Invariant violated: delta does not match movement sign"
    );
    Ok(next)
}

/// Checks that `account.balance` is exactly explained by `movements`.
///
/// `movements` must be the account's full log in creation order. Besides the
/// final sum, the running balance must never dip below zero. Stored rows are
/// untrusted, so malformed amounts and overflow are reported as divergence.
pub(crate) fn reconcile(account: &Account, movements: &[Movement]) -> LedgerResult<()> {
    let mut running = Decimal::ZERO;
    for movement in movements {
        if movement.account != account.id || !is_well_formed(movement.amount) {
            return Err(diverged(account, running));
        }
        running = running
            .checked_add(movement.signed_amount())
            .ok_or_else(|| diverged(account, running))?;
        if running < Decimal::ZERO || running > MAX_AMOUNT {
            return Err(diverged(account, running));
        }
    }

    if running != account.balance {
        return Err(diverged(account, running));
    }
    Ok(())
}

fn is_well_formed(amount: Decimal) -> bool {
    amount > Decimal::ZERO && amount <= MAX_AMOUNT && amount.normalize().scale() <= SCALE
}

fn diverged(account: &Account, derived: Decimal) -> LedgerError {
    LedgerError::Diverged {
        account: account.id,
        recorded: account.balance,
        derived,
    }
}

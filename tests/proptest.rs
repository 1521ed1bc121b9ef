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

//! Property-based tests for the ledger engine.
//!
//! These tests verify invariants that should hold for any sequence of
//! movements, accepted or rejected.

use proptest::prelude::*;
use rust_decimal::Decimal;
use wallet_ledger::{
    AccountId, Direction, Engine, HistoryQuery, LedgerError, Movement, MovementKind,
    MovementRequest, OwnerId,
};

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Generate a positive amount (0.01 to 1000.00).
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (1i64..=100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_kind() -> impl Strategy<Value = MovementKind> {
    prop::sample::select(MovementKind::ALL.to_vec())
}

fn arb_movements() -> impl Strategy<Value = Vec<(MovementKind, Decimal)>> {
    prop::collection::vec((arb_kind(), arb_amount()), 1..40)
}

fn history(engine: &Engine, account: AccountId) -> Vec<Movement> {
    engine
        .history(account, &HistoryQuery::default().with_limit(500))
        .unwrap()
        .movements
}

// =============================================================================
// Balance Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// The balance always equals the signed sum of the movement log.
    #[test]
    fn balance_equals_sum_of_movements(movements in arb_movements()) {
        let engine = Engine::in_memory();
        let account = engine.get_or_create(OwnerId(1)).unwrap().id;

        for (kind, amount) in movements {
            let _ = engine.apply(account, &MovementRequest::new(kind, amount, "generated"));

            let derived: Decimal = history(&engine, account)
                .iter()
                .map(Movement::signed_amount)
                .sum();
            prop_assert_eq!(engine.balance(account).unwrap(), derived);
        }
        prop_assert_eq!(engine.audit(account), Ok(()));
    }

    /// No sequence of movements drives the balance below zero.
    #[test]
    fn balance_never_negative(movements in arb_movements()) {
        let engine = Engine::in_memory();
        let account = engine.get_or_create(OwnerId(1)).unwrap().id;

        for (kind, amount) in movements {
            if let Ok(receipt) =
                engine.apply(account, &MovementRequest::new(kind, amount, "generated"))
            {
                prop_assert!(receipt.balance >= Decimal::ZERO);
            }
            prop_assert!(engine.balance(account).unwrap() >= Decimal::ZERO);
        }
    }

    /// Applied one at a time, the engine agrees with a plain running total.
    #[test]
    fn engine_matches_sequential_model(movements in arb_movements()) {
        let engine = Engine::in_memory();
        let account = engine.get_or_create(OwnerId(1)).unwrap().id;
        let mut expected = Decimal::ZERO;

        for (kind, amount) in movements {
            let result = engine.apply(account, &MovementRequest::new(kind, amount, "generated"));
            let next = kind.signed(amount) + expected;
            if next < Decimal::ZERO {
                prop_assert_eq!(result, Err(LedgerError::InsufficientFunds));
            } else {
                prop_assert_eq!(result.map(|receipt| receipt.balance), Ok(next));
                expected = next;
            }
        }
        prop_assert_eq!(engine.balance(account).unwrap(), expected);
    }

    /// A rejected debit leaves both the balance and the log untouched.
    #[test]
    fn rejected_debit_leaves_no_trace(
        credits in prop::collection::vec(arb_amount(), 0..5),
        excess in arb_amount(),
        debit_is_fee in any::<bool>(),
    ) {
        let engine = Engine::in_memory();
        let account = engine.get_or_create(OwnerId(1)).unwrap().id;
        for amount in &credits {
            engine
                .apply(account, &MovementRequest::new(MovementKind::Deposit, *amount, "credit"))
                .unwrap();
        }
        let balance = engine.balance(account).unwrap();
        let before = history(&engine, account);

        let kind = if debit_is_fee { MovementKind::Fee } else { MovementKind::Withdrawal };
        prop_assert_eq!(kind.direction(), Direction::Debit);
        let result = engine.apply(account, &MovementRequest::new(kind, balance + excess, "debit"));

        prop_assert_eq!(result, Err(LedgerError::InsufficientFunds));
        prop_assert_eq!(engine.balance(account).unwrap(), balance);
        prop_assert_eq!(history(&engine, account), before);
    }

    /// Amounts finer than a cent are never accepted.
    #[test]
    fn sub_cent_amounts_rejected(
        kind in arb_kind(),
        mills in (1i64..=1_000_000i64).prop_filter("not a whole cent", |m| m % 10 != 0),
    ) {
        let engine = Engine::in_memory();
        let account = engine.get_or_create(OwnerId(1)).unwrap().id;

        let result = engine.apply(
            account,
            &MovementRequest::new(kind, Decimal::new(mills, 3), "generated"),
        );

        prop_assert_eq!(result, Err(LedgerError::InvalidAmount));
        prop_assert!(history(&engine, account).is_empty());
    }
}

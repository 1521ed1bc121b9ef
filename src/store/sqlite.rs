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
use crate::base::{AccountId, MovementId, OwnerId, TripRef};
use crate::error::{LedgerError, LedgerResult};
use crate::history::{HistoryQuery, Order};
use crate::movement::{Movement, MovementKind, MovementStatus};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use rust_decimal::Decimal;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// Movements are append-only: the triggers abort any UPDATE or DELETE.
const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY,
    owner_id INTEGER NOT NULL UNIQUE,
    balance TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS movements (
    id INTEGER PRIMARY KEY,
    account_id INTEGER NOT NULL REFERENCES accounts(id),
    amount TEXT NOT NULL,
    kind TEXT NOT NULL,
    status TEXT NOT NULL,
    description TEXT NOT NULL,
    trip_id INTEGER,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS movements_idx_account ON movements(account_id, id);
CREATE TRIGGER IF NOT EXISTS movements_no_update BEFORE UPDATE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;
CREATE TRIGGER IF NOT EXISTS movements_no_delete BEFORE DELETE ON movements
BEGIN
    SELECT RAISE(ABORT, 'movements are append-only');
END;
"#;

const MOVEMENT_COLUMNS: &str =
    "id, account_id, amount, kind, status, description, trip_id, created_at";

/// SQLite-backed store. State survives process restarts.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    path: PathBuf,
}

impl SqliteStore {
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let store = Self { path: path.into() };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn initialize_schema(&self) -> LedgerResult<()> {
        let conn = self.connect()?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(())
    }

    fn connect(&self) -> LedgerResult<Connection> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL; PRAGMA synchronous = FULL; PRAGMA foreign_keys = ON;",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }
}

impl LedgerStore for SqliteStore {
    fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO accounts (id, owner_id, balance, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                to_sql_id(account.id.0)?,
                to_sql_id(account.owner.0)?,
                account.balance.to_string(),
                account.created_at.to_rfc3339(),
                account.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn commit(&self, account: &Account, movement: &Movement) -> LedgerResult<()> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let updated = tx.execute(
            "UPDATE accounts SET balance = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                account.balance.to_string(),
                account.updated_at.to_rfc3339(),
                to_sql_id(account.id.0)?,
            ],
        )?;
        if updated != 1 {
            // Dropping `tx` rolls back.
            return Err(LedgerError::Storage(format!(
                "account {} is not stored",
                account.id
            )));
        }
        tx.execute(
            "INSERT INTO movements (id, account_id, amount, kind, status, description, trip_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                to_sql_id(movement.id.0)?,
                to_sql_id(movement.account.0)?,
                movement.amount.to_string(),
                movement.kind.as_str(),
                movement.status.as_str(),
                movement.description,
                movement.trip.map(|trip| to_sql_id(trip.0)).transpose()?,
                movement.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn account(&self, id: AccountId) -> LedgerResult<Option<Account>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT id, owner_id, balance, created_at, updated_at FROM accounts WHERE id = ?1",
                params![to_sql_id(id.0)?],
                |row| AccountRow::try_from(row),
            )
            .optional()?;
        row.map(AccountRow::into_account).transpose()
    }

    fn accounts(&self) -> LedgerResult<Vec<Account>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, balance, created_at, updated_at FROM accounts ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| AccountRow::try_from(row))?;
        let mut accounts = Vec::new();
        for row in rows {
            accounts.push(row?.into_account()?);
        }
        Ok(accounts)
    }

    fn movements(
        &self,
        account: AccountId,
        query: &HistoryQuery,
        limit: usize,
    ) -> LedgerResult<Vec<Movement>> {
        let conn = self.connect()?;
        let sql = match query.order {
            Order::OldestFirst => format!(
                "SELECT {MOVEMENT_COLUMNS} FROM movements
                 WHERE account_id = ?1 AND (?2 IS NULL OR id > ?2)
                 ORDER BY id ASC LIMIT ?3"
            ),
            Order::NewestFirst => format!(
                "SELECT {MOVEMENT_COLUMNS} FROM movements
                 WHERE account_id = ?1 AND (?2 IS NULL OR id < ?2)
                 ORDER BY id DESC LIMIT ?3"
            ),
        };
        let cursor = query.after.map(|id| to_sql_id(id.0)).transpose()?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![to_sql_id(account.0)?, cursor, limit], |row| {
            MovementRow::try_from(row)
        })?;
        let mut movements = Vec::new();
        for row in rows {
            movements.push(row?.into_movement()?);
        }
        Ok(movements)
    }

    fn latest_movement_id(&self) -> LedgerResult<Option<MovementId>> {
        let conn = self.connect()?;
        let latest: Option<i64> =
            conn.query_row("SELECT MAX(id) FROM movements", [], |row| row.get(0))?;
        Ok(latest.map(|id| MovementId(id as u64)))
    }
}

fn to_sql_id(value: u64) -> LedgerResult<i64> {
    i64::try_from(value)
        .map_err(|_| LedgerError::Storage(format!("identifier {value} exceeds storage range")))
}

/// Raw text columns of an `accounts` row, parsed outside the rusqlite closure.
struct AccountRow {
    id: i64,
    owner: i64,
    balance: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<&rusqlite::Row<'_>> for AccountRow {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            balance: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }
}

impl AccountRow {
    fn into_account(self) -> LedgerResult<Account> {
        Ok(Account {
            id: AccountId(self.id as u64),
            owner: OwnerId(self.owner as u64),
            balance: parse_decimal(&self.balance)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct MovementRow {
    id: i64,
    account: i64,
    amount: String,
    kind: String,
    status: String,
    description: String,
    trip: Option<i64>,
    created_at: String,
}

impl TryFrom<&rusqlite::Row<'_>> for MovementRow {
    type Error = rusqlite::Error;

    fn try_from(row: &rusqlite::Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get(0)?,
            account: row.get(1)?,
            amount: row.get(2)?,
            kind: row.get(3)?,
            status: row.get(4)?,
            description: row.get(5)?,
            trip: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

impl MovementRow {
    fn into_movement(self) -> LedgerResult<Movement> {
        Ok(Movement {
            id: MovementId(self.id as u64),
            account: AccountId(self.account as u64),
            amount: parse_decimal(&self.amount)?,
            kind: MovementKind::from_str(&self.kind).map_err(LedgerError::Storage)?,
            status: MovementStatus::from_str(&self.status).map_err(LedgerError::Storage)?,
            description: self.description,
            trip: self.trip.map(|trip| TripRef(trip as u64)),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_decimal(value: &str) -> LedgerResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|err| LedgerError::Storage(format!("invalid decimal {value}: {err}")))
}

fn parse_timestamp(value: &str) -> LedgerResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| LedgerError::Storage(format!("invalid timestamp {value}: {err}")))
}

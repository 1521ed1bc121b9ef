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

//! Paged reads of an account's movement log.
//!
//! Pages are keyed by [`MovementId`]: a page's `next` cursor is the id of its
//! last movement, and the following page starts strictly after it. Because
//! the log is append-only, walking pages never skips or repeats a movement.

use crate::base::MovementId;
use crate::movement::Movement;
use serde::{Deserialize, Serialize};

/// Direction in which the log is walked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Order {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Which slice of the movement log to read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Resume after this movement (exclusive).
    pub after: Option<MovementId>,
    /// Page size; `None` uses the configured default.
    pub limit: Option<usize>,
    pub order: Order,
}

impl HistoryQuery {
    pub fn after(mut self, cursor: MovementId) -> Self {
        self.after = Some(cursor);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = Order::NewestFirst;
        self
    }

    /// Whether `id` lies past the cursor in this query's direction.
    pub(crate) fn admits(&self, id: MovementId) -> bool {
        match (self.after, self.order) {
            (None, _) => true,
            (Some(cursor), Order::OldestFirst) => id > cursor,
            (Some(cursor), Order::NewestFirst) => id < cursor,
        }
    }
}

/// One page of movements plus the cursor for the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryPage {
    pub movements: Vec<Movement>,
    /// `None` once the end of the log has been reached.
    pub next: Option<MovementId>,
}

impl HistoryPage {
    /// Builds a page from up to `limit + 1` fetched rows.
    ///
    /// The extra row only signals that another page exists and is dropped.
    pub(crate) fn from_rows(mut rows: Vec<Movement>, limit: usize) -> Self {
        let more = rows.len() > limit;
        rows.truncate(limit);
        let next = if more {
            rows.last().map(|movement| movement.id)
        } else {
            None
        };
        Self {
            movements: rows,
            next,
        }
    }
}

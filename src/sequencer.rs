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

use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counter handing out strictly increasing identifiers.
///
/// Values burned by a failed commit are never reused, so identifiers may have
/// gaps but never repeat.
#[derive(Debug)]
pub(crate) struct Sequencer {
    counter: AtomicU64,
}

impl Sequencer {
    /// Starts after `last`, the highest value already persisted.
    pub(crate) fn new(last: u64) -> Self {
        Self {
            counter: AtomicU64::new(last),
        }
    }

    pub(crate) fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }
}

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

//! Owner existence checks against the profile system.

use crate::base::OwnerId;
use dashmap::DashSet;

/// Answers whether a user profile exists.
///
/// Consulted only when an account is provisioned for the first time.
pub trait OwnerDirectory: Send + Sync {
    fn exists(&self, owner: OwnerId) -> bool;
}

impl<F> OwnerDirectory for F
where
    F: Fn(OwnerId) -> bool + Send + Sync,
{
    fn exists(&self, owner: OwnerId) -> bool {
        self(owner)
    }
}

/// Directory that accepts every owner.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

impl OwnerDirectory for OpenDirectory {
    fn exists(&self, _owner: OwnerId) -> bool {
        true
    }
}

/// Directory backed by an explicit, growable set of known owners.
#[derive(Debug, Default)]
pub struct KnownOwners {
    owners: DashSet<OwnerId>,
}

impl KnownOwners {
    pub fn new(owners: impl IntoIterator<Item = OwnerId>) -> Self {
        Self {
            owners: owners.into_iter().collect(),
        }
    }

    pub fn register(&self, owner: OwnerId) {
        self.owners.insert(owner);
    }
}

impl OwnerDirectory for KnownOwners {
    fn exists(&self, owner: OwnerId) -> bool {
        self.owners.contains(&owner)
    }
}

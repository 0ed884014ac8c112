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

//! Allocatable resources and their status state machine.
//!
//! A [`Resource`] is one allocatable unit (a seat, a room, a parking spot).
//! Its status follows a small state machine driven exclusively by the owning
//! [`ResourcePool`](crate::ResourcePool):
//!
//! - `Available` → `Held` (via hold)
//! - `Held` → `Committed` (via commit) or back to `Available` (release/expiry)
//! - `Committed` → `Available` (via release/cancel)

use crate::base::ResourceId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Allocation status of a single resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    /// Free to be claimed by the next hold.
    Available,
    /// Provisionally claimed, pending payment confirmation. Time-bounded.
    Held,
    /// Booked. Stays committed until explicit cancellation.
    Committed,
}

/// Domain tag carried for collaborators (pricing, eligibility).
///
/// The engine itself never branches on the kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Standard,
    Premium,
    Accessible,
}

/// A single allocatable unit tracked by a pool.
///
/// Status and `last_changed` are mutated only through the owning pool's
/// critical section; external code observes snapshots.
#[derive(Debug, Clone)]
pub struct Resource {
    id: ResourceId,
    kind: ResourceKind,
    price: Decimal,
    status: ResourceStatus,
    last_changed: Instant,
}

impl Resource {
    /// Creates an available resource from catalog metadata.
    pub fn new(id: ResourceId, kind: ResourceKind, price: Decimal) -> Self {
        Self {
            id,
            kind,
            price,
            status: ResourceStatus::Available,
            last_changed: Instant::now(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Catalog price, supplied at pool construction and never recomputed.
    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn status(&self) -> ResourceStatus {
        self.status
    }

    /// Timestamp of the most recent status transition.
    ///
    /// Used solely for hold-expiry computation.
    pub fn last_changed(&self) -> Instant {
        self.last_changed
    }

    pub(crate) fn set_status(&mut self, status: ResourceStatus, now: Instant) {
        self.status = status;
        self.last_changed = now;
    }
}

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

//! Reservation records and their lifecycle.
//!
//! Reservations follow a state machine:
//! - [`Pending`] → [`Confirmed`] (payment succeeded, resources committed)
//! - [`Pending`] → [`Failed`] (payment declined or hold lapsed)
//! - [`Confirmed`] → [`Cancelled`] (explicit cancellation)
//!
//! No transition skips `Pending`, and `Failed`/`Cancelled` are terminal.
//!
//! [`Pending`]: ReservationStatus::Pending
//! [`Confirmed`]: ReservationStatus::Confirmed
//! [`Failed`]: ReservationStatus::Failed
//! [`Cancelled`]: ReservationStatus::Cancelled

use crate::base::{PayerId, ReservationId, ResourceId};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Instant;

/// Lifecycle status of a reservation.
#[derive(Debug, Clone, Copy, serde::Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    /// Hold taken, payment outcome unknown.
    Pending,
    /// Paid and committed.
    Confirmed,
    /// Explicitly cancelled after confirmation. Terminal.
    Cancelled,
    /// Payment declined or hold lapsed before commit. Terminal.
    Failed,
}

impl ReservationStatus {
    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Pending, ReservationStatus::Confirmed)
                | (ReservationStatus::Pending, ReservationStatus::Failed)
                | (ReservationStatus::Confirmed, ReservationStatus::Cancelled)
        )
    }
}

/// Ledger record tying a resource set, a payer, and an amount to a
/// lifecycle status.
///
/// Owned exclusively by the [`Ledger`](crate::Ledger); everything except the
/// status is immutable once recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    id: ReservationId,
    resource_ids: BTreeSet<ResourceId>,
    payer: PayerId,
    amount: Decimal,
    status: ReservationStatus,
    created_at: Instant,
}

impl Reservation {
    const DECIMAL_PRECISION: u32 = 4;

    /// Creates a pending reservation, the only entry state.
    pub fn pending(
        id: ReservationId,
        resource_ids: BTreeSet<ResourceId>,
        payer: PayerId,
        amount: Decimal,
        created_at: Instant,
    ) -> Self {
        Self {
            id,
            resource_ids,
            payer,
            amount,
            status: ReservationStatus::Pending,
            created_at,
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }

    pub fn resource_ids(&self) -> &BTreeSet<ResourceId> {
        &self.resource_ids
    }

    pub fn payer(&self) -> PayerId {
        self.payer
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn status(&self) -> ReservationStatus {
        self.status
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub(crate) fn set_status(&mut self, status: ReservationStatus) {
        self.status = status;
    }
}

impl Serialize for Reservation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        // `created_at` is a monotonic instant with no calendar meaning, so
        // it is omitted from serialized output.
        let resources = self
            .resource_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";");

        let mut state = serializer.serialize_struct("Reservation", 5)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("payer", &self.payer)?;
        state.serialize_field("resources", &resources)?;
        state.serialize_field(
            "amount",
            &self.amount.round_dp(Reservation::DECIMAL_PRECISION),
        )?;
        state.serialize_field("status", &self.status)?;
        state.end()
    }
}

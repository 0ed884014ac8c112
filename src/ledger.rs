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

//! Append-only reservation ledger.
//!
//! The ledger exclusively owns [`Reservation`] records. Records are never
//! deleted; cancellation is a status change, which preserves the audit trail
//! and makes cancel idempotent by construction.

use crate::base::ReservationId;
use crate::error::ReservationError;
use crate::reservation::{Reservation, ReservationStatus};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe, append-only store of reservation records.
///
/// Reservation IDs are handed out by [`next_id`](Ledger::next_id): strictly
/// increasing and never reused, also across failed and cancelled
/// reservations. Status updates are restricted to the legal transitions of
/// [`ReservationStatus`].
#[derive(Debug)]
pub struct Ledger {
    /// Reservations indexed by ID for O(1) lookup.
    reservations: DashMap<ReservationId, Reservation>,

    /// Next reservation ID to hand out.
    next_id: AtomicU64,
}

impl Ledger {
    /// Creates a new empty ledger.
    pub fn new() -> Self {
        Self {
            reservations: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates the next reservation ID.
    pub fn next_id(&self) -> ReservationId {
        ReservationId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Appends a reservation record.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::DuplicateReservation`] if a record with
    /// the same ID already exists.
    pub fn append(&self, reservation: Reservation) -> Result<(), ReservationError> {
        // Entry API for atomic check-and-insert.
        match self.reservations.entry(reservation.id()) {
            Entry::Occupied(_) => Err(ReservationError::DuplicateReservation),
            Entry::Vacant(entry) => {
                entry.insert(reservation);
                Ok(())
            }
        }
    }

    /// Retrieves a snapshot of a reservation by ID.
    pub fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).map(|entry| entry.clone())
    }

    /// Moves a reservation to a new status.
    ///
    /// The check and the write happen under the entry's shard lock, so two
    /// concurrent updates cannot both claim the same transition.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::ReservationNotFound`] - unknown ID.
    /// - [`ReservationError::IllegalTransition`] - the move is not in the
    ///   lifecycle table (e.g. `Failed` → `Confirmed`, or cancelling twice).
    pub fn update_status(
        &self,
        id: ReservationId,
        status: ReservationStatus,
    ) -> Result<(), ReservationError> {
        let mut entry = self
            .reservations
            .get_mut(&id)
            .ok_or(ReservationError::ReservationNotFound)?;
        if !entry.status().can_transition_to(status) {
            return Err(ReservationError::IllegalTransition);
        }
        entry.set_status(status);
        Ok(())
    }

    /// Number of records ever appended.
    pub fn len(&self) -> usize {
        self.reservations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservations.is_empty()
    }

    /// Returns an iterator over all reservation records.
    ///
    /// Useful for generating audit output; iteration order is unspecified.
    pub fn reservations(
        &self,
    ) -> impl Iterator<Item = dashmap::mapref::multiple::RefMulti<'_, ReservationId, Reservation>>
    {
        self.reservations.iter()
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

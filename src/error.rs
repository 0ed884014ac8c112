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

//! Error types for reservation processing.

use thiserror::Error;

/// Reservation processing errors.
///
/// The booking-flow variants (`ResourceUnavailable`, `PaymentDeclined`,
/// `ExpiredDuringPayment`) are expected outcomes a caller may react to;
/// the remaining variants signal bad input or misuse of the API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// Reserve was called with an empty resource set
    #[error("reservation requires at least one resource")]
    EmptyResourceSet,

    /// A referenced resource ID is not known to the pool
    #[error("unknown resource id")]
    InvalidResource,

    /// One or more resources were not available to hold
    #[error("resource not available")]
    ResourceUnavailable,

    /// Commit found a resource that is no longer held (hold expired)
    #[error("hold lapsed before commit")]
    HoldLapsed,

    /// Release requires every resource to be held or committed
    #[error("resource is not held or committed")]
    NotReleasable,

    /// The payment gateway declined the charge
    #[error("payment declined")]
    PaymentDeclined,

    /// The hold expired while the payment round trip was in flight
    #[error("hold expired during payment")]
    ExpiredDuringPayment,

    /// Referenced reservation ID does not exist in the ledger
    #[error("reservation not found")]
    ReservationNotFound,

    /// A reservation with the same ID already exists in the ledger
    #[error("duplicate reservation ID")]
    DuplicateReservation,

    /// Requested status change is not a legal reservation transition
    #[error("illegal reservation status transition")]
    IllegalTransition,
}

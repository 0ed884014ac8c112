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

//! # Booking Engine
//!
//! This library provides a concurrent resource-reservation engine: a pool of
//! finite, uniquely identified resources (seats, rooms, parking spots) with
//! atomic, time-bounded holds, a booking protocol that sequences
//! hold → payment → commit/rollback, and an append-only reservation ledger.
//!
//! ## Core Components
//!
//! - [`ResourcePool`]: owns resource status, one mutex domain per pool
//! - [`ReservationCoordinator`]: orchestrates hold, charge, commit/rollback
//! - [`Ledger`]: append-only record of reservation attempts
//! - [`ExpiryReaper`]: optional periodic reclamation of abandoned holds
//! - [`ReservationError`]: typed failure taxonomy for booking attempts
//!
//! ## Example
//!
//! ```
//! use booking_engine_rs::{
//!     CardGateway, Ledger, PayerId, ReservationCoordinator, Resource, ResourceId,
//!     ResourceKind, ResourcePool, SystemClock,
//! };
//! use rust_decimal_macros::dec;
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let pool = Arc::new(ResourcePool::new(
//!     [
//!         Resource::new(ResourceId(1), ResourceKind::Standard, dec!(10.00)),
//!         Resource::new(ResourceId(2), ResourceKind::Premium, dec!(15.00)),
//!     ],
//!     Duration::from_secs(300),
//! ));
//! let ledger = Arc::new(Ledger::new());
//! let coordinator = ReservationCoordinator::new(pool, ledger, Arc::new(SystemClock));
//!
//! let seats: BTreeSet<ResourceId> = [ResourceId(1), ResourceId(2)].into_iter().collect();
//! let reservation = coordinator
//!     .reserve(seats, PayerId(1), dec!(25.00), &CardGateway)
//!     .unwrap();
//! assert_eq!(reservation.amount(), dec!(25.00));
//! ```
//!
//! ## Thread Safety
//!
//! All mutating pool operations execute under one mutex per pool, so two
//! concurrent booking attempts over overlapping resource sets can never both
//! succeed, while independent pools proceed fully in parallel. The payment
//! round trip runs outside the pool's critical section.

pub mod base;
mod clock;
mod coordinator;
pub mod error;
mod ledger;
mod payment;
mod pool;
mod reaper;
pub mod resource;
mod reservation;

pub use base::{PayerId, ReservationId, ResourceId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::ReservationCoordinator;
pub use error::ReservationError;
pub use ledger::Ledger;
pub use payment::{CardGateway, FixedVerdictGateway, PaymentGateway, PaymentVerdict, WalletGateway};
pub use pool::ResourcePool;
pub use reaper::ExpiryReaper;
pub use reservation::{Reservation, ReservationStatus};
pub use resource::{Resource, ResourceKind, ResourceStatus};

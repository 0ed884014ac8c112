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

//! Booking protocol orchestration.
//!
//! The [`ReservationCoordinator`] sequences the multi-step protocol:
//! hold resources, invoke the external payment gateway, then commit or roll
//! back. It holds no state of its own beyond references to the pool, the
//! ledger, and a clock.
//!
//! # Lock discipline
//!
//! The payment round trip runs with no pool lock held. Hold and commit are
//! therefore two separate critical sections, and the pool may expire the
//! hold in between; commit re-validates held status rather than assuming
//! it, and a lapse surfaces as
//! [`ExpiredDuringPayment`](crate::ReservationError::ExpiredDuringPayment).

use crate::base::{PayerId, ReservationId, ResourceId};
use crate::clock::Clock;
use crate::error::ReservationError;
use crate::ledger::Ledger;
use crate::payment::{PaymentGateway, PaymentVerdict};
use crate::pool::ResourcePool;
use crate::reservation::{Reservation, ReservationStatus};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Stateless orchestrator for the hold → charge → commit/rollback protocol.
///
/// Construct one per pool and share it freely; all methods take `&self` and
/// are safe to call from concurrent threads.
pub struct ReservationCoordinator {
    pool: Arc<ResourcePool>,
    ledger: Arc<Ledger>,
    clock: Arc<dyn Clock>,
}

impl ReservationCoordinator {
    pub fn new(pool: Arc<ResourcePool>, ledger: Arc<Ledger>, clock: Arc<dyn Clock>) -> Self {
        Self { pool, ledger, clock }
    }

    /// The pool this coordinator books against.
    pub fn pool(&self) -> &Arc<ResourcePool> {
        &self.pool
    }

    /// The ledger recording this coordinator's reservations.
    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    /// Attempts to reserve the given resource set for `payer`.
    ///
    /// On success the resources are committed and the returned reservation
    /// is confirmed. On any failure the resources end up available again
    /// (immediately, or at the latest when their hold times out) and the
    /// ledger keeps a failed record — no partial reservation is ever left
    /// visible.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::EmptyResourceSet`] - no resources requested.
    /// - [`ReservationError::InvalidResource`] - an id is unknown; no side
    ///   effects.
    /// - [`ReservationError::ResourceUnavailable`] - a resource was not
    ///   available to hold; no side effects.
    /// - [`ReservationError::PaymentDeclined`] - the gateway declined;
    ///   resources were released before returning.
    /// - [`ReservationError::ExpiredDuringPayment`] - the hold lapsed while
    ///   payment was in flight; surfaced distinctly so callers can tell a
    ///   timeout from a genuine decline.
    pub fn reserve(
        &self,
        resource_ids: BTreeSet<ResourceId>,
        payer: PayerId,
        amount: Decimal,
        gateway: &dyn PaymentGateway,
    ) -> Result<Reservation, ReservationError> {
        if resource_ids.is_empty() {
            return Err(ReservationError::EmptyResourceSet);
        }

        // Take the hold. Unknown ids and conflicts fail here with no side
        // effects; both checks run in one pool critical section.
        self.pool.hold(&resource_ids, self.clock.now())?;

        // Record the pending attempt before payment so the ledger reflects
        // every attempt that made it past the hold.
        let id = self.ledger.next_id();
        let reservation = Reservation::pending(
            id,
            resource_ids.clone(),
            payer,
            amount,
            self.clock.now(),
        );
        self.ledger
            .append(reservation)
            .inspect_err(|_| {
                // next_id never repeats, so a duplicate here is a bug.
                error!(%id, "reservation id collision in ledger");
                self.pool.release_held(&resource_ids, self.clock.now());
            })?;

        // The external round trip. May block; no pool lock is held.
        let verdict = gateway.charge(payer, amount);

        match verdict {
            PaymentVerdict::Success => match self.pool.commit(&resource_ids, self.clock.now()) {
                Ok(()) => {
                    self.finish(id, ReservationStatus::Confirmed);
                    debug!(%id, %payer, "reservation confirmed");
                    // The record was just written; absence is a bug.
                    self.ledger
                        .get(id)
                        .ok_or(ReservationError::ReservationNotFound)
                }
                Err(_) => {
                    // The hold lapsed mid-payment. Release whatever this
                    // set still has held and fail the reservation.
                    self.pool.release_held(&resource_ids, self.clock.now());
                    self.finish(id, ReservationStatus::Failed);
                    warn!(%id, %payer, "hold expired during payment");
                    Err(ReservationError::ExpiredDuringPayment)
                }
            },
            PaymentVerdict::Failed => {
                self.pool.release_held(&resource_ids, self.clock.now());
                self.finish(id, ReservationStatus::Failed);
                debug!(%id, %payer, "payment declined");
                Err(ReservationError::PaymentDeclined)
            }
        }
    }

    /// Cancels a confirmed reservation, releasing its resources.
    ///
    /// Idempotent: returns `true` exactly once per reservation. Unknown ids,
    /// pending or failed reservations, and repeat cancellations all return
    /// `false`. Cancelling a pending reservation is deliberately rejected
    /// rather than silently ignored — its payment outcome is still in
    /// flight.
    pub fn cancel(&self, id: ReservationId) -> bool {
        let Some(reservation) = self.ledger.get(id) else {
            return false;
        };

        if reservation.status() == ReservationStatus::Pending {
            warn!(%id, "refusing to cancel a pending reservation");
            return false;
        }

        // Claim the Confirmed -> Cancelled transition first. The ledger
        // enforces the lifecycle table under its shard lock, so exactly one
        // concurrent cancel can win; the resources are still committed (and
        // owned by this reservation) until the winner releases them below.
        if self
            .ledger
            .update_status(id, ReservationStatus::Cancelled)
            .is_err()
        {
            return false;
        }

        if let Err(err) = self.pool.release(reservation.resource_ids(), self.clock.now()) {
            // A confirmed reservation's resources must be committed; this
            // is an internal invariant violation, not a caller error.
            error!(%id, %err, "cancel could not release committed resources");
            debug_assert!(false, "confirmed reservation had non-committed resources");
            return false;
        }

        debug!(%id, "reservation cancelled");
        true
    }

    /// Moves a pending reservation to its final status.
    ///
    /// The record was appended by this same reserve call, so the transition
    /// is always legal; a failure here is an internal invariant violation.
    fn finish(&self, id: ReservationId, status: ReservationStatus) {
        if let Err(err) = self.ledger.update_status(id, status) {
            error!(%id, %err, "could not finalize reservation status");
            debug_assert!(false, "finalizing a pending reservation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::payment::FixedVerdictGateway;
    use crate::resource::{Resource, ResourceKind, ResourceStatus};
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(300);

    fn setup(ids: &[u32]) -> (ReservationCoordinator, Arc<ResourcePool>, Arc<ManualClock>) {
        let resources = ids
            .iter()
            .map(|&id| Resource::new(ResourceId(id), ResourceKind::Standard, dec!(10.00)));
        let pool = Arc::new(ResourcePool::new(resources, TIMEOUT));
        let ledger = Arc::new(Ledger::new());
        let clock = Arc::new(ManualClock::new());
        let clock_source: Arc<dyn Clock> = clock.clone();
        let coordinator = ReservationCoordinator::new(Arc::clone(&pool), ledger, clock_source);
        (coordinator, pool, clock)
    }

    fn ids(raw: &[u32]) -> BTreeSet<ResourceId> {
        raw.iter().copied().map(ResourceId).collect()
    }

    #[test]
    fn empty_resource_set_is_rejected() {
        let (coordinator, _, _) = setup(&[1]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Success);

        let result = coordinator.reserve(BTreeSet::new(), PayerId(1), dec!(0.00), &gateway);
        assert_eq!(result, Err(ReservationError::EmptyResourceSet));
        assert!(coordinator.ledger().is_empty());
    }

    #[test]
    fn unknown_resource_has_no_side_effects() {
        let (coordinator, pool, clock) = setup(&[1]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Success);

        let result = coordinator.reserve(ids(&[1, 99]), PayerId(1), dec!(20.00), &gateway);
        assert_eq!(result, Err(ReservationError::InvalidResource));
        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Available)
        );
        assert!(coordinator.ledger().is_empty());
    }

    #[test]
    fn successful_reserve_confirms_and_commits() {
        let (coordinator, pool, clock) = setup(&[1, 2]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Success);

        let reservation = coordinator
            .reserve(ids(&[1, 2]), PayerId(7), dec!(100.00), &gateway)
            .unwrap();

        assert_eq!(reservation.status(), ReservationStatus::Confirmed);
        assert_eq!(reservation.amount(), dec!(100.00));
        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Committed)
        );
        assert_eq!(
            pool.status(ResourceId(2), clock.now()),
            Some(ResourceStatus::Committed)
        );
    }

    #[test]
    fn declined_payment_releases_and_fails() {
        let (coordinator, pool, clock) = setup(&[1]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Failed);

        let result = coordinator.reserve(ids(&[1]), PayerId(1), dec!(50.00), &gateway);
        assert_eq!(result, Err(ReservationError::PaymentDeclined));

        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Available)
        );
        let record = coordinator.ledger().get(ReservationId(1)).unwrap();
        assert_eq!(record.status(), ReservationStatus::Failed);
    }

    /// Gateway double whose charge advances the clock past the hold
    /// timeout, simulating a payment round trip that outlives the hold.
    struct SlowGateway<'a> {
        clock: &'a ManualClock,
        delay: Duration,
    }

    impl PaymentGateway for SlowGateway<'_> {
        fn charge(&self, _payer: PayerId, _amount: Decimal) -> PaymentVerdict {
            self.clock.advance(self.delay);
            PaymentVerdict::Success
        }
    }

    #[test]
    fn hold_expiring_mid_payment_surfaces_distinctly() {
        let (coordinator, pool, clock) = setup(&[1]);
        let gateway = SlowGateway {
            clock: &clock,
            delay: TIMEOUT + Duration::from_secs(1),
        };

        let result = coordinator.reserve(ids(&[1]), PayerId(1), dec!(10.00), &gateway);
        assert_eq!(result, Err(ReservationError::ExpiredDuringPayment));

        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Available)
        );
        let record = coordinator.ledger().get(ReservationId(1)).unwrap();
        assert_eq!(record.status(), ReservationStatus::Failed);
    }

    #[test]
    fn cancel_releases_resources_once() {
        let (coordinator, pool, clock) = setup(&[1, 2]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Success);
        let reservation = coordinator
            .reserve(ids(&[1, 2]), PayerId(1), dec!(20.00), &gateway)
            .unwrap();

        assert!(coordinator.cancel(reservation.id()));
        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Available)
        );

        // Second cancel is a no-op that reports false.
        assert!(!coordinator.cancel(reservation.id()));
        assert_eq!(
            pool.status(ResourceId(1), clock.now()),
            Some(ResourceStatus::Available)
        );
    }

    #[test]
    fn cancel_unknown_reservation_returns_false() {
        let (coordinator, _, _) = setup(&[1]);
        assert!(!coordinator.cancel(ReservationId(42)));
    }

    #[test]
    fn cancel_failed_reservation_returns_false() {
        let (coordinator, _, _) = setup(&[1]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Failed);
        let _ = coordinator.reserve(ids(&[1]), PayerId(1), dec!(10.00), &gateway);

        assert!(!coordinator.cancel(ReservationId(1)));
    }

    #[test]
    fn reservation_ids_survive_failures() {
        let (coordinator, _, _) = setup(&[1]);
        let declining = FixedVerdictGateway(PaymentVerdict::Failed);
        let approving = FixedVerdictGateway(PaymentVerdict::Success);

        let _ = coordinator.reserve(ids(&[1]), PayerId(1), dec!(10.00), &declining);
        let confirmed = coordinator
            .reserve(ids(&[1]), PayerId(1), dec!(10.00), &approving)
            .unwrap();

        // The failed attempt consumed an id; it is never reused.
        assert_eq!(confirmed.id(), ReservationId(2));
        assert_eq!(coordinator.ledger().len(), 2);
    }

    #[test]
    fn resources_freed_by_expiry_can_be_rebooked() {
        let (coordinator, _, clock) = setup(&[1]);
        let gateway = FixedVerdictGateway(PaymentVerdict::Success);

        // Take a hold directly and abandon it.
        coordinator.pool().hold(&ids(&[1]), clock.now()).unwrap();

        clock.advance(TIMEOUT + Duration::from_secs(60));

        let reservation = coordinator
            .reserve(ids(&[1]), PayerId(2), dec!(10.00), &gateway)
            .unwrap();
        assert_eq!(reservation.status(), ReservationStatus::Confirmed);
    }
}

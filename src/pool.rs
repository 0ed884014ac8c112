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

//! Resource pool with atomic, time-bounded holds.
//!
//! A [`ResourcePool`] owns the full set of resources for one booking domain
//! (one show, one floor) and is the only component that mutates resource
//! status. All mutating operations run under a single mutex per pool, so two
//! concurrent booking attempts over overlapping resource sets can never both
//! succeed; independent pools share nothing and proceed fully in parallel.
//!
//! # Hold expiry
//!
//! Holds are time-bounded. Every public operation sweeps expired holds back
//! to available before doing anything else, while already holding the pool
//! lock. Expiry is therefore lazy and correct without a background thread;
//! [`ExpiryReaper`](crate::ExpiryReaper) can additionally drive [`sweep`]
//! periodically for pools with little traffic.
//!
//! [`sweep`]: ResourcePool::sweep
//!
//! # All-or-nothing
//!
//! [`hold`], [`commit`], and [`release`] operate on resource *sets*: the
//! status check over every member and the subsequent mutations form one
//! atomic unit. A partial hold (2 of 3 seats) is never observable.
//!
//! [`hold`]: ResourcePool::hold
//! [`commit`]: ResourcePool::commit
//! [`release`]: ResourcePool::release

use crate::base::ResourceId;
use crate::error::ReservationError;
use crate::resource::{Resource, ResourceStatus};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct PoolData {
    resources: HashMap<ResourceId, Resource>,
}

impl PoolData {
    /// Reverts every hold older than `timeout` back to available.
    ///
    /// A hold expires strictly after the timeout: `now - last_changed`
    /// must exceed it, equality keeps the hold alive.
    fn sweep_expired(&mut self, now: Instant, timeout: Duration) -> usize {
        let mut reclaimed = 0;
        for resource in self.resources.values_mut() {
            if resource.status() == ResourceStatus::Held
                && now.duration_since(resource.last_changed()) > timeout
            {
                resource.set_status(ResourceStatus::Available, now);
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            debug!(reclaimed, "swept expired holds");
        }
        reclaimed
    }

    /// Checks that every id exists and has the expected status.
    fn check_all(
        &self,
        ids: &BTreeSet<ResourceId>,
        expected: impl Fn(ResourceStatus) -> bool,
        on_mismatch: ReservationError,
    ) -> Result<(), ReservationError> {
        for id in ids {
            let resource = self.resources.get(id).ok_or(ReservationError::InvalidResource)?;
            if !expected(resource.status()) {
                return Err(on_mismatch.clone());
            }
        }
        Ok(())
    }

    fn set_all(&mut self, ids: &BTreeSet<ResourceId>, status: ResourceStatus, now: Instant) {
        for id in ids {
            // check_all ran under the same lock acquisition.
            self.resources
                .get_mut(id)
                .expect("resource validated before transition")
                .set_status(status, now);
        }
    }
}

/// A pool of finite, uniquely identified resources.
///
/// One pool is one unit of mutual exclusion. Construct it once from catalog
/// metadata and share it behind an `Arc`; the pool never gains or loses
/// resources after construction.
///
/// # Invariants
///
/// - A resource's status reflects at most one outstanding hold or commitment
///   at any instant.
/// - Hold/commit/release are all-or-nothing over the requested set.
/// - A held resource older than the hold timeout is reclaimed before any
///   operation observes it.
#[derive(Debug)]
pub struct ResourcePool {
    inner: Mutex<PoolData>,
    hold_timeout: Duration,
}

impl ResourcePool {
    /// Creates a pool owning the given resources.
    ///
    /// `hold_timeout` bounds how long a hold may sit unconfirmed before any
    /// subsequent pool operation reclaims it.
    pub fn new(resources: impl IntoIterator<Item = Resource>, hold_timeout: Duration) -> Self {
        let resources = resources
            .into_iter()
            .map(|resource| (resource.id(), resource))
            .collect();
        Self {
            inner: Mutex::new(PoolData { resources }),
            hold_timeout,
        }
    }

    /// The configured hold timeout.
    pub fn hold_timeout(&self) -> Duration {
        self.hold_timeout
    }

    /// Number of resources owned by the pool.
    pub fn len(&self) -> usize {
        self.inner.lock().resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().resources.is_empty()
    }

    /// Whether the pool knows the given resource id.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.inner.lock().resources.contains_key(&id)
    }

    /// Atomically holds every listed resource.
    ///
    /// Expired holds are swept first. Fails with no side effects if any id
    /// is unknown or any resource is not available; on success every
    /// resource transitions to held with `last_changed = now`.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidResource`] - an id is not in the pool.
    /// - [`ReservationError::ResourceUnavailable`] - a resource is held or
    ///   committed by someone else.
    pub fn hold(
        &self,
        ids: &BTreeSet<ResourceId>,
        now: Instant,
    ) -> Result<(), ReservationError> {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        data.check_all(
            ids,
            |status| status == ResourceStatus::Available,
            ReservationError::ResourceUnavailable,
        )?;
        data.set_all(ids, ResourceStatus::Held, now);
        Ok(())
    }

    /// Atomically commits every listed resource from held to committed.
    ///
    /// Requires every resource to still be held. A failure signals that the
    /// hold lapsed (or was never taken); the caller must treat the booking
    /// as failed and release whatever it still holds.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidResource`] - an id is not in the pool.
    /// - [`ReservationError::HoldLapsed`] - a resource is no longer held.
    pub fn commit(
        &self,
        ids: &BTreeSet<ResourceId>,
        now: Instant,
    ) -> Result<(), ReservationError> {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        data.check_all(
            ids,
            |status| status == ResourceStatus::Held,
            ReservationError::HoldLapsed,
        )?;
        data.set_all(ids, ResourceStatus::Committed, now);
        Ok(())
    }

    /// Atomically releases every listed resource back to available.
    ///
    /// Used both for rollback and for normal cancellation. Requires every
    /// resource to be held or committed.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::InvalidResource`] - an id is not in the pool.
    /// - [`ReservationError::NotReleasable`] - a resource is already
    ///   available.
    pub fn release(
        &self,
        ids: &BTreeSet<ResourceId>,
        now: Instant,
    ) -> Result<(), ReservationError> {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        data.check_all(
            ids,
            |status| matches!(status, ResourceStatus::Held | ResourceStatus::Committed),
            ReservationError::NotReleasable,
        )?;
        data.set_all(ids, ResourceStatus::Available, now);
        Ok(())
    }

    /// Best-effort compensation: releases whichever of the listed resources
    /// are still held, ignoring the rest.
    ///
    /// Used after a declined or expired payment, where some holds may
    /// already have been reclaimed by the sweep. Returns how many resources
    /// were released.
    pub fn release_held(&self, ids: &BTreeSet<ResourceId>, now: Instant) -> usize {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        let mut released = 0;
        for id in ids {
            if let Some(resource) = data.resources.get_mut(id)
                && resource.status() == ResourceStatus::Held
            {
                resource.set_status(ResourceStatus::Available, now);
                released += 1;
            }
        }
        released
    }

    /// Reclaims expired holds and returns how many were reclaimed.
    ///
    /// Every other operation sweeps implicitly; this entry point exists for
    /// periodic external triggers such as [`ExpiryReaper`](crate::ExpiryReaper).
    pub fn sweep(&self, now: Instant) -> usize {
        self.inner.lock().sweep_expired(now, self.hold_timeout)
    }

    /// Snapshot of every resource's status, after sweeping expired holds.
    pub fn view(&self, now: Instant) -> BTreeMap<ResourceId, ResourceStatus> {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        data.resources
            .iter()
            .map(|(id, resource)| (*id, resource.status()))
            .collect()
    }

    /// Current status of one resource, after sweeping expired holds.
    ///
    /// Returns `None` for ids the pool does not know.
    pub fn status(&self, id: ResourceId, now: Instant) -> Option<ResourceStatus> {
        let mut data = self.inner.lock();
        data.sweep_expired(now, self.hold_timeout);
        data.resources.get(&id).map(Resource::status)
    }

    /// Sums the catalog prices of the listed resources.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::InvalidResource`] if any id is unknown.
    pub fn quote(&self, ids: &BTreeSet<ResourceId>) -> Result<Decimal, ReservationError> {
        let data = self.inner.lock();
        let mut total = Decimal::ZERO;
        for id in ids {
            let resource = data.resources.get(id).ok_or(ReservationError::InvalidResource)?;
            total += resource.price();
        }
        Ok(total)
    }
}

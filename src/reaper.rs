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

//! Periodic expiry sweeper.
//!
//! Every pool operation already sweeps expired holds lazily, which is what
//! makes expiry correct. The reaper exists for pools with low traffic: a
//! long-idle hold would otherwise sit until the next caller shows up.

use crate::clock::Clock;
use crate::pool::ResourcePool;
use crossbeam::channel::{bounded, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

/// Background thread that reclaims expired holds on a fixed cadence.
///
/// Sweeping runs under the pool's own lock, so the reaper adds no new
/// synchronization and cannot observe partial state. The thread is signalled
/// and joined on drop.
pub struct ExpiryReaper {
    shutdown: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl ExpiryReaper {
    /// Spawns a reaper sweeping `pool` every `interval`.
    pub fn spawn(pool: Arc<ResourcePool>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        let (shutdown, signal) = bounded::<()>(0);
        let handle = std::thread::spawn(move || {
            loop {
                // A message or a closed channel both mean shut down; only
                // the timeout tick sweeps.
                match signal.recv_timeout(interval) {
                    Err(crossbeam::channel::RecvTimeoutError::Timeout) => {
                        let reclaimed = pool.sweep(clock.now());
                        if reclaimed > 0 {
                            debug!(reclaimed, "reaper reclaimed expired holds");
                        }
                    }
                    _ => break,
                }
            }
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }
}

impl Drop for ExpiryReaper {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

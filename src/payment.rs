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

//! Payment collaborator interface.
//!
//! The engine sequences payment but does not implement it: callers select a
//! [`PaymentGateway`] implementation (card, wallet, scripted double) and the
//! coordinator invokes it at most once per reservation attempt, outside the
//! pool's critical section.

use crate::base::PayerId;
use rust_decimal::Decimal;

/// Outcome of a charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentVerdict {
    Success,
    Failed,
}

/// External payment collaborator.
///
/// `charge` may block for an external round trip; the coordinator guarantees
/// no pool lock is held while it runs.
pub trait PaymentGateway: Send + Sync {
    fn charge(&self, payer: PayerId, amount: Decimal) -> PaymentVerdict;
}

/// Card processor stand-in that approves every charge.
#[derive(Debug, Default, Clone, Copy)]
pub struct CardGateway;

impl PaymentGateway for CardGateway {
    fn charge(&self, _payer: PayerId, _amount: Decimal) -> PaymentVerdict {
        PaymentVerdict::Success
    }
}

/// Wallet processor stand-in that approves every charge.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalletGateway;

impl PaymentGateway for WalletGateway {
    fn charge(&self, _payer: PayerId, _amount: Decimal) -> PaymentVerdict {
        PaymentVerdict::Success
    }
}

/// Gateway returning a fixed verdict, for scripted flows and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedVerdictGateway(pub PaymentVerdict);

impl PaymentGateway for FixedVerdictGateway {
    fn charge(&self, _payer: PayerId, _amount: Decimal) -> PaymentVerdict {
        self.0
    }
}

// This file is part of ship-receiver.
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::InvariantError;
use crate::infra::protocol::ProtocolError;
use ship_common::error::BoxError;
use thiserror::Error;

/// Top-level error of the Sync Controller, see `spec.md` §7.
///
/// The variant distinguishes the recovery policy applied by
/// [crate::infra::controller::SyncController]: `Transport` and `Decode` drive a reconnect
/// through `Backoff`; the remaining variants are fatal and terminate the controller.
#[derive(Debug, Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("protocol decode error: {0}")]
    Decode(#[from] ProtocolError),

    #[error("normalization invariant violated: {0}")]
    InvariantViolated(#[from] InvariantError),

    #[error("requested start height has already been pruned from upstream history")]
    HistoryPruned,

    #[error("downstream publisher rejected a native block: {0}")]
    DownstreamUnavailable(#[source] BoxError),

    #[error("retry budget of {max_retry} exhausted without a successful connection")]
    RetryBudgetExhausted { max_retry: u32 },

    /// A `blocks_result` with no `this_block` arrived inside an active subscription. Outside a
    /// subscription this is a normal no-op (`Block Normalizer` §4.3 step 1, returns `Ok(None)`);
    /// here it is unexpected and fatal (`spec.md` §4.4 `start_read`: "`None` → fatal shutdown").
    #[error("received a this_block-less frame inside an active get_blocks subscription")]
    UnexpectedEmptyNotification,
}

impl Error {
    /// `true` for the two error kinds §7 designates as locally recovered via reconnect
    /// (`Transport`, `Decode`); `false` for everything that escalates to fatal shutdown.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Decode(_))
    }
}

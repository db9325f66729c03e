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

//! Registers this core's metric descriptions once at startup (`SPEC_FULL.md` §12). The counters
//! and gauges themselves are held and updated by [crate::infra::controller::SyncController],
//! which is where the events they track (`spec.md` §4.4 reconnect and read-loop publish) occur.

use metrics::{describe_counter, describe_gauge};

/// Describes every series this core exports, so a scrape before the first block sees defined
/// metrics rather than absent ones.
pub fn describe() {
    describe_counter!(
        "ship_native_blocks_published_total",
        "Number of native blocks published to the downstream consumer"
    );
    describe_counter!(
        "ship_reconnects_total",
        "Number of times the sync controller has reconnected to the upstream state-history feed"
    );
    describe_gauge!(
        "ship_last_published_block_num",
        "Height of the last native block published downstream"
    );
    describe_gauge!(
        "ship_last_lib",
        "Last irreversible block height reported by the upstream state-history feed"
    );
}

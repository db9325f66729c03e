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

mod metrics;

use crate::{
    config::{self, Config},
    domain::{CanonicalHeadProvider, NativeBlockPublisher},
    infra::{ControllerConfig, SyncController, transport::WebSocketTransport},
};
use anyhow::Context;
use log::{info, warn};
use ship_common::domain::Name;
use tokio::{select, signal::unix::Signal};

/// Wires C1-C5 together and runs until SIGTERM or a fatal error (`spec.md` §7). The surrounding
/// process harness (option parsing, daemon lifecycle, the JSON-RPC plugin shell) is out of scope
/// per `spec.md` §1 — this is the entry point an embedding binary calls from its own `main`.
pub async fn run<C, P>(
    config: Config,
    canonical: C,
    publisher: P,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    C: CanonicalHeadProvider,
    P: NativeBlockPublisher,
{
    metrics::describe();

    let (host, port) = config::split_endpoint(&config.ship_endpoint).with_context(|| {
        format!("invalid ship-endpoint {:?}: expected host:port", config.ship_endpoint)
    })?;
    let core_account = Name::from_str(&config.ship_core_account).with_context(|| {
        format!("invalid ship-core-account {:?}: not a valid name", config.ship_core_account)
    })?;

    info!(host, port, core_account:%, max_retry = config.ship_max_retry; "starting ship receiver");

    let controller_config = ControllerConfig {
        host: host.to_string(),
        port: port.to_string(),
        core_account,
        start_from_canonical_height: config.ship_start_from_canonical_height,
        delay: config.ship_delay,
        max_retry: config.ship_max_retry,
    };

    let mut controller: SyncController<WebSocketTransport, C, P> =
        SyncController::new(controller_config, canonical, publisher);

    let mut receive_task = tokio::spawn(async move { controller.run().await });

    // "Successful" completion of receive_task is unexpected: SyncController::run only returns on
    // a fatal error (`spec.md` §4.4).
    select! {
        result = &mut receive_task => result
            .context("ship receiver task panicked")
            .and_then(|r| r.context("ship receiver task failed")),

        _ = sigterm.recv() => {
            warn!("SIGTERM received, shutting down ship receiver");
            // Cooperative shutdown (`spec.md` §5): abort cancels the in-flight transport read and
            // drops the transport handle along with the task.
            receive_task.abort();
            Ok(())
        }
    }
}

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

//! Process-wide logging, tracing and metrics bootstrap, shared by every
//! binary that embeds the SHiP receiver core.

use fastrace::collector::Config as FastraceConfig;
use log::LevelFilter;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;

/// Logging configuration. `level` follows the usual `log` severity names.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_level() }
    }
}

fn default_level() -> String {
    "info".to_string()
}

/// Bootstrap the global `log` logger via `logforth`, writing structured,
/// key-value-annotated lines to stderr.
pub fn init_logging(config: &LoggingConfig) {
    let level = config.level.parse().unwrap_or(LevelFilter::Info);

    logforth::builder()
        .dispatch(|d| d.filter(level).append(logforth::append::Stderr::default()))
        .apply();
}

/// Bootstrap `fastrace` span reporting. Call once, before the first `#[trace]`-annotated
/// function runs.
pub fn init_tracing() {
    fastrace::set_reporter(
        fastrace::collector::ConsoleReporter,
        FastraceConfig::default(),
    );
}

/// Bootstrap a process-wide Prometheus metrics recorder, scraped by the harness this core is
/// embedded in (out of scope for this crate).
pub fn init_metrics() {
    let builder = PrometheusBuilder::new();
    if let Err(error) = builder.install() {
        log::warn!(error:%; "failed to install Prometheus metrics recorder");
    }
}

/// Flush any buffered spans. Call on graceful shutdown.
pub fn flush_tracing() {
    fastrace::flush();
}

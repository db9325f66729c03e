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

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::Deserialize;
use ship_common::telemetry;
use std::time::Duration;

/// Configuration surface for the Sync Controller, see `spec.md` §6, plus the ambient
/// logging knobs every binary embedding this core exposes the same way (`SPEC_FULL.md` §11/§12).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_ship_endpoint")]
    pub ship_endpoint: String,

    #[serde(default = "default_ship_core_account")]
    pub ship_core_account: String,

    #[serde(default)]
    pub ship_max_retry: u32,

    #[serde(default = "default_ship_delay", with = "humantime_serde")]
    pub ship_delay: Duration,

    #[serde(default)]
    pub ship_start_from_canonical_height: Option<u64>,

    #[serde(default, rename = "logging")]
    pub logging_config: telemetry::LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ship_endpoint: default_ship_endpoint(),
            ship_core_account: default_ship_core_account(),
            ship_max_retry: 0,
            ship_delay: default_ship_delay(),
            ship_start_from_canonical_height: None,
            logging_config: telemetry::LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment, falling back to the defaults in
    /// `spec.md` §6 for anything unset. Environment variables are matched case-insensitively
    /// against the field names above (e.g. `SHIP_ENDPOINT`, `SHIP_MAX_RETRY`).
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new().merge(Serialized::defaults(Self::default())).merge(Env::raw()).extract()
    }
}

fn default_ship_endpoint() -> String {
    "127.0.0.1:8999".to_string()
}

fn default_ship_core_account() -> String {
    "evmevmevmevm".to_string()
}

fn default_ship_delay() -> Duration {
    Duration::from_secs(10)
}

/// Splits a `ship-endpoint` of the form `host:port` into its two parts, on the first `:`
/// (matching `ship_receiver_plugin::plugin_initialize` in the original implementation, which
/// allows a bracket-less IPv6 literal to pass through as the "host" half unsplit further).
pub fn split_endpoint(endpoint: &str) -> Option<(&str, &str)> {
    endpoint.split_once(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_the_first_colon() {
        assert_eq!(split_endpoint("127.0.0.1:8999"), Some(("127.0.0.1", "8999")));
    }

    #[test]
    fn splits_ipv6_literals_on_their_first_colon_too() {
        // Matches the original's naive `find(":")`/`substr` split: an IPv6 literal is not
        // special-cased, so only the first colon-delimited segment becomes "host".
        assert_eq!(split_endpoint("::1:8999"), Some(("", ":1:8999")));
    }

    #[test]
    fn returns_none_without_a_colon() {
        assert_eq!(split_endpoint("justahost"), None);
    }

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.ship_endpoint, "127.0.0.1:8999");
        assert_eq!(config.ship_core_account, "evmevmevmevm");
        assert_eq!(config.ship_max_retry, 0);
        assert_eq!(config.ship_delay, Duration::from_secs(10));
        assert_eq!(config.ship_start_from_canonical_height, None);
    }
}

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

//! The State-History Receiver Core: ingests a SHiP feed from an upstream
//! node, normalizes a fixed class of EVM-bridging actions into
//! [`domain::NativeBlock`]s, and publishes them to a downstream consumer.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;

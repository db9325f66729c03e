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

//! The Downstream Channel (C5): a priority-aware publish point for [NativeBlock]s (`spec.md`
//! §4.5). This core is producer only; subscription and fan-out are a concern of whatever
//! [Publisher] implementation the host orchestrator wires in.

use crate::domain::NativeBlock;
pub use ship_common::domain::{Publisher, Shared};

/// Every [NativeBlock] is published at this fixed priority (`spec.md` §4.4 `start_read`).
pub const NATIVE_BLOCK_PRIORITY: u8 = 80;

/// A publish point typed to this core's output. Blanket-implemented for any [Publisher] of
/// [NativeBlock]; exists only to give the bound a name at call sites.
pub trait NativeBlockPublisher: Publisher<NativeBlock> {}

impl<T: Publisher<NativeBlock>> NativeBlockPublisher for T {}

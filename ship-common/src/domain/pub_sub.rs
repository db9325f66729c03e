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

use std::{error::Error as StdError, sync::Arc};

/// An item handed off to a downstream consumer. Cheap to clone since it is reference counted;
/// once published, the referenced value is never mutated again.
pub type Shared<T> = Arc<T>;

/// A priority-aware, single-producer publish point. If no subscriber is attached, a publish is a
/// no-op rather than an error: this core never blocks on downstream consumers keeping pace.
#[trait_variant::make(Send)]
pub trait Publisher<T>
where
    Self: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Publish `value`. Lower `priority` values are scheduled ahead of higher ones by the
    /// execution context; this core always publishes at a single, fixed priority.
    async fn publish(&self, priority: u8, value: Shared<T>) -> Result<(), Self::Error>;
}

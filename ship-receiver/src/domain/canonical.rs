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

//! The downstream canonical-head collaborator (`spec.md` §6): the authoritative source of the
//! initial sync height, consulted only on a fresh (non-reconnect) start.

use ship_common::domain::ByteArray;
use std::error::Error as StdError;

/// A downstream block header, insofar as the Sync Controller needs it: its height and the
/// `prev_randao` field the downstream uses to smuggle the source-chain height across the
/// cross-subsystem boundary (see [decode_source_height]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalBlockHeader {
    pub number: u64,
    pub hash: ByteArray<32>,
    pub prev_randao: ByteArray<32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalBlock {
    pub header: CanonicalBlockHeader,
}

/// The downstream collaborator owning canonical head state (`spec.md` §6). Out of scope for this
/// core beyond this contract: the core only reads, never writes, canonical head.
#[trait_variant::make(Send)]
pub trait CanonicalHeadProvider
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// Returns the canonical block at `height`, or at the current head if `height` is absent.
    /// `None` means the downstream has no canonical block yet (fatal: `DownstreamUnavailable`).
    async fn get_canonical_block_at_height(
        &self,
        height: Option<u64>,
    ) -> Result<Option<CanonicalBlock>, Self::Error>;
}

/// Decodes the source-chain height the downstream packed into the low 4 bytes of `prev_randao`,
/// big-endian (`spec.md` §6, `utils::to_block_num` in the original implementation).
pub fn decode_source_height(prev_randao: &ByteArray<32>) -> u32 {
    let bytes = prev_randao.as_bytes();
    u32::from_be_bytes([bytes[28], bytes[29], bytes[30], bytes[31]])
}

/// Encodes `height` into the low 4 bytes of a `prev_randao`-shaped field, the inverse of
/// [decode_source_height]. Used by tests to build canonical-head fixtures.
pub fn encode_source_height(height: u32) -> ByteArray<32> {
    let mut bytes = [0u8; 32];
    bytes[28..32].copy_from_slice(&height.to_be_bytes());
    ByteArray::new(bytes)
}

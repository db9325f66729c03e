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

use derive_more::{AsRef, From};
use std::fmt::{self, Debug, Display};

/// A fixed-size byte array, e.g. a block or transaction identifier.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, From, AsRef)]
#[as_ref([u8])]
pub struct ByteArray<const N: usize>(pub [u8; N]);

impl<const N: usize> ByteArray<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }
}

impl<const N: usize> Debug for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ByteArray({})", const_hex::encode(self.0))
    }
}

impl<const N: usize> Display for ByteArray<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", const_hex::encode(self.0))
    }
}

/// An owned, growable byte buffer, used for raw wire payloads whose length is not known at
/// compile time (action data, serialized blocks, trace blobs).
pub type ByteVec = Vec<u8>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_debug_are_hex_encoded() {
        let a = ByteArray::new([0xab, 0xcd]);
        assert_eq!(a.to_string(), "abcd");
        assert_eq!(format!("{a:?}"), "ByteArray(abcd)");
    }

    #[test]
    fn as_ref_exposes_the_underlying_slice() {
        let a = ByteArray::new([1u8, 2, 3]);
        assert_eq!(a.as_ref(), &[1, 2, 3]);
    }
}

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

//! The Protocol Codec (C2): encodes outgoing request messages and decodes incoming result
//! messages exchanged with the upstream state-history feed (`spec.md` §4.2), plus the textual
//! schema descriptor read once at handshake.
//!
//! The wire grammar used here (varuint-prefixed vectors/strings/bytes, one-byte optional-presence
//! flags, little-endian fixed-width integers, one-byte tags for tagged unions) is a
//! self-consistent encoding this workspace defines for every structure it decodes; it is not
//! claimed to be byte-for-byte compatible with any specific upstream nodeos release (see
//! `SPEC_FULL.md` §16).

use ship_common::domain::{BlockId, ByteArray, Name, TransactionId};
use thiserror::Error;

/// The upstream's self-description: the first inbound frame after the websocket handshake.
/// Parsing terminates on a NUL byte; the core appends one before parsing (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    raw: String,
}

impl SchemaDescriptor {
    /// Parses `bytes` as a NUL-terminated textual schema. Content at or after the first NUL byte
    /// (appended by this parser if not already present) is discarded.
    pub fn parse(bytes: &[u8]) -> Self {
        let mut owned = bytes.to_vec();
        owned.push(0);
        let end = owned.iter().position(|&b| b == 0).unwrap_or(owned.len());
        let raw = String::from_utf8_lossy(&owned[..end]).into_owned();
        Self { raw }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("schema descriptor not yet loaded; no result may be decoded before it")]
    SchemaNotLoaded,

    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    #[error("unexpected end of buffer while decoding {0}")]
    UnexpectedEof(&'static str),

    #[error("unsupported variant tag {0} for {1}")]
    UnsupportedVariant(u8, &'static str),
}

// ---------------------------------------------------------------------------------------------
// primitive reader/writer
// ---------------------------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        if self.pos + n > self.buf.len() {
            return Err(ProtocolError::UnexpectedEof("buffer"));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.u8()? != 0)
    }

    fn u32_le(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn u64_le(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8)?;
        Ok(u64::from_le_bytes(b.try_into().expect("8 bytes")))
    }

    fn i64_le(&mut self) -> Result<i64, ProtocolError> {
        Ok(self.u64_le()? as i64)
    }

    fn array32(&mut self) -> Result<[u8; 32], ProtocolError> {
        Ok(self.take(32)?.try_into().expect("32 bytes"))
    }

    fn varuint32(&mut self) -> Result<u32, ProtocolError> {
        let mut result: u32 = 0;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            result |= ((byte & 0x7f) as u32) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
            if shift >= 35 {
                return Err(ProtocolError::Malformed("varuint32 overflow"));
            }
        }
        Ok(result)
    }

    fn name(&mut self) -> Result<Name, ProtocolError> {
        Ok(Name::new(self.u64_le()?))
    }

    fn bytes_vec(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let len = self.varuint32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn string(&mut self) -> Result<String, ProtocolError> {
        let bytes = self.bytes_vec()?;
        String::from_utf8(bytes).map_err(|_| ProtocolError::Malformed("invalid utf8"))
    }

    fn option<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<Option<T>, ProtocolError> {
        if self.bool()? { Ok(Some(f(self)?)) } else { Ok(None) }
    }

    fn vec<T>(
        &mut self,
        mut f: impl FnMut(&mut Self) -> Result<T, ProtocolError>,
    ) -> Result<Vec<T>, ProtocolError> {
        let len = self.varuint32()? as usize;
        (0..len).map(|_| f(self)).collect()
    }
}

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn bool(&mut self, v: bool) {
        self.u8(v as u8);
    }

    fn u32_le(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64_le(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i64_le(&mut self, v: i64) {
        self.u64_le(v as u64);
    }

    fn array32(&mut self, v: &[u8; 32]) {
        self.buf.extend_from_slice(v);
    }

    fn varuint32(&mut self, mut v: u32) {
        loop {
            let mut byte = (v & 0x7f) as u8;
            v >>= 7;
            if v != 0 {
                byte |= 0x80;
            }
            self.buf.push(byte);
            if v == 0 {
                break;
            }
        }
    }

    fn name(&mut self, v: Name) {
        self.u64_le(v.value());
    }

    fn bytes_vec(&mut self, v: &[u8]) {
        self.varuint32(v.len() as u32);
        self.buf.extend_from_slice(v);
    }

    fn string(&mut self, v: &str) {
        self.bytes_vec(v.as_bytes());
    }

    fn option<T>(&mut self, v: &Option<T>, mut f: impl FnMut(&mut Self, &T)) {
        match v {
            Some(inner) => {
                self.bool(true);
                f(self, inner);
            }
            None => self.bool(false),
        }
    }

    fn vec<T>(&mut self, v: &[T], mut f: impl FnMut(&mut Self, &T)) {
        self.varuint32(v.len() as u32);
        for item in v {
            f(self, item);
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

// ---------------------------------------------------------------------------------------------
// shared structures
// ---------------------------------------------------------------------------------------------

/// A block height/id pair, as carried by `this_block`, `prev_block` and `last_irreversible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPosition {
    pub block_num: u32,
    pub block_id: BlockId,
}

impl BlockPosition {
    fn encode(&self, w: &mut Writer) {
        w.u32_le(self.block_num);
        w.array32(self.block_id.as_bytes());
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        let block_num = r.u32_le()?;
        let block_id = BlockId::new(r.array32()?);
        Ok(Self { block_num, block_id })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PermissionLevel {
    pub actor: Name,
    pub permission: Name,
}

impl PermissionLevel {
    fn encode(&self, w: &mut Writer) {
        w.name(self.actor);
        w.name(self.permission);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self { actor: r.name()?, permission: r.name()? })
    }
}

/// The inner, unresolved action payload of an `action_trace` (`act`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub account: Name,
    pub name: Name,
    pub authorization: Vec<PermissionLevel>,
    pub data: Vec<u8>,
}

impl Action {
    fn encode(&self, w: &mut Writer) {
        w.name(self.account);
        w.name(self.name);
        w.vec(&self.authorization, |w, p| p.encode(w));
        w.bytes_vec(&self.data);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        let account = r.name()?;
        let name = r.name()?;
        let authorization = r.vec(PermissionLevel::decode)?;
        let data = r.bytes_vec()?;
        Ok(Self { account, name, authorization, data })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReceiptV0 {
    pub receiver: Name,
    pub act_digest: ByteArray<32>,
    pub global_sequence: u64,
    pub recv_sequence: u64,
    pub auth_sequence: Vec<(Name, u64)>,
    pub code_sequence: u32,
    pub abi_sequence: u32,
}

impl ActionReceiptV0 {
    fn encode(&self, w: &mut Writer) {
        w.name(self.receiver);
        w.array32(self.act_digest.as_bytes());
        w.u64_le(self.global_sequence);
        w.u64_le(self.recv_sequence);
        w.vec(&self.auth_sequence, |w, (n, s)| {
            w.name(*n);
            w.u64_le(*s);
        });
        w.varuint32(self.code_sequence);
        w.varuint32(self.abi_sequence);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        let receiver = r.name()?;
        let act_digest = ByteArray::new(r.array32()?);
        let global_sequence = r.u64_le()?;
        let recv_sequence = r.u64_le()?;
        let auth_sequence = r.vec(|r| Ok((r.name()?, r.u64_le()?)))?;
        let code_sequence = r.varuint32()?;
        let abi_sequence = r.varuint32()?;
        Ok(Self {
            receiver,
            act_digest,
            global_sequence,
            recv_sequence,
            auth_sequence,
            code_sequence,
            abi_sequence,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountRamDelta {
    pub account: Name,
    pub delta: i64,
}

impl AccountRamDelta {
    fn encode(&self, w: &mut Writer) {
        w.name(self.account);
        w.i64_le(self.delta);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self { account: r.name()?, delta: r.i64_le()? })
    }
}

/// A deferred-transaction continuation. Opaque to this core (Non-goal: interpreting inner
/// payloads beyond action name and raw bytes); kept only so the decoder can skip past it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTransaction {
    pub raw: Vec<u8>,
}

impl PartialTransaction {
    fn encode(&self, w: &mut Writer) {
        w.bytes_vec(&self.raw);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        Ok(Self { raw: r.bytes_vec()? })
    }
}

/// An `action_trace_v0`. Tagged at the wire level (see [encode_action_trace]/[decode_action_trace]);
/// newer variants are rejected rather than misparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTraceV0 {
    pub action_ordinal: u32,
    pub creator_action_ordinal: u32,
    pub receipt: Option<ActionReceiptV0>,
    pub receiver: Name,
    pub act: Action,
    pub context_free: bool,
    pub elapsed: i64,
    pub console: String,
    pub account_ram_deltas: Vec<AccountRamDelta>,
    pub except: Option<String>,
    pub error_code: Option<u64>,
}

impl ActionTraceV0 {
    fn encode_fields(&self, w: &mut Writer) {
        w.varuint32(self.action_ordinal);
        w.varuint32(self.creator_action_ordinal);
        w.option(&self.receipt, |w, r| r.encode(w));
        w.name(self.receiver);
        self.act.encode(w);
        w.bool(self.context_free);
        w.i64_le(self.elapsed);
        w.string(&self.console);
        w.vec(&self.account_ram_deltas, |w, d| d.encode(w));
        w.option(&self.except, |w, s| w.string(s));
        w.option(&self.error_code, |w, c| w.u64_le(*c));
    }

    fn decode_fields(r: &mut Reader) -> Result<Self, ProtocolError> {
        let action_ordinal = r.varuint32()?;
        let creator_action_ordinal = r.varuint32()?;
        let receipt = r.option(ActionReceiptV0::decode)?;
        let receiver = r.name()?;
        let act = Action::decode(r)?;
        let context_free = r.bool()?;
        let elapsed = r.i64_le()?;
        let console = r.string()?;
        let account_ram_deltas = r.vec(AccountRamDelta::decode)?;
        let except = r.option(|r| r.string())?;
        let error_code = r.option(|r| r.u64_le())?;
        Ok(Self {
            action_ordinal,
            creator_action_ordinal,
            receipt,
            receiver,
            act,
            context_free,
            elapsed,
            console,
            account_ram_deltas,
            except,
            error_code,
        })
    }
}

/// Encodes `trace` as a tagged `action_trace` (variant 0, the only shape this core produces).
pub fn encode_action_trace(w: &mut Writer, trace: &ActionTraceV0) {
    w.u8(0);
    trace.encode_fields(w);
}

/// Decodes a tagged `action_trace`, rejecting any variant other than `v0`.
pub fn decode_action_trace(r: &mut Reader) -> Result<ActionTraceV0, ProtocolError> {
    let tag = r.u8()?;
    if tag != 0 {
        return Err(ProtocolError::UnsupportedVariant(tag, "action_trace"));
    }
    ActionTraceV0::decode_fields(r)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    Executed,
    SoftFail,
    HardFail,
    Delayed,
    Expired,
}

impl TransactionStatus {
    fn encode(&self, w: &mut Writer) {
        let tag = match self {
            Self::Executed => 0,
            Self::SoftFail => 1,
            Self::HardFail => 2,
            Self::Delayed => 3,
            Self::Expired => 4,
        };
        w.u8(tag);
    }

    fn decode(r: &mut Reader) -> Result<Self, ProtocolError> {
        match r.u8()? {
            0 => Ok(Self::Executed),
            1 => Ok(Self::SoftFail),
            2 => Ok(Self::HardFail),
            3 => Ok(Self::Delayed),
            4 => Ok(Self::Expired),
            other => Err(ProtocolError::UnsupportedVariant(other, "transaction_status")),
        }
    }
}

/// A `transaction_trace_v0`. Tagged at the wire level like [ActionTraceV0].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionTraceV0 {
    pub id: TransactionId,
    pub status: TransactionStatus,
    pub cpu_usage_us: u32,
    pub net_usage_words: u32,
    pub elapsed: i64,
    pub net_usage: u64,
    pub scheduled: bool,
    pub action_traces: Vec<ActionTraceV0>,
    pub account_ram_delta: Option<AccountRamDelta>,
    pub except: Option<String>,
    pub error_code: Option<u64>,
    pub failed_dtrx_trace: Option<Box<TransactionTraceV0>>,
    pub partial: Option<PartialTransaction>,
}

impl TransactionTraceV0 {
    fn encode_fields(&self, w: &mut Writer) {
        w.array32(self.id.as_bytes());
        self.status.encode(w);
        w.varuint32(self.cpu_usage_us);
        w.varuint32(self.net_usage_words);
        w.i64_le(self.elapsed);
        w.u64_le(self.net_usage);
        w.bool(self.scheduled);
        w.vec(&self.action_traces, |w, a| encode_action_trace(w, a));
        w.option(&self.account_ram_delta, |w, d| d.encode(w));
        w.option(&self.except, |w, s| w.string(s));
        w.option(&self.error_code, |w, c| w.u64_le(*c));
        w.option(&self.failed_dtrx_trace, |w, t| encode_transaction_trace(w, t));
        w.option(&self.partial, |w, p| p.encode(w));
    }

    fn decode_fields(r: &mut Reader) -> Result<Self, ProtocolError> {
        let id = TransactionId::new(r.array32()?);
        let status = TransactionStatus::decode(r)?;
        let cpu_usage_us = r.varuint32()?;
        let net_usage_words = r.varuint32()?;
        let elapsed = r.i64_le()?;
        let net_usage = r.u64_le()?;
        let scheduled = r.bool()?;
        let action_traces = r.vec(decode_action_trace)?;
        let account_ram_delta = r.option(AccountRamDelta::decode)?;
        let except = r.option(|r| r.string())?;
        let error_code = r.option(|r| r.u64_le())?;
        let failed_dtrx_trace = r.option(|r| decode_transaction_trace(r).map(Box::new))?;
        let partial = r.option(PartialTransaction::decode)?;
        Ok(Self {
            id,
            status,
            cpu_usage_us,
            net_usage_words,
            elapsed,
            net_usage,
            scheduled,
            action_traces,
            account_ram_delta,
            except,
            error_code,
            failed_dtrx_trace,
            partial,
        })
    }
}

/// Encodes `trace` as a tagged `transaction_trace` (variant 0).
pub fn encode_transaction_trace(w: &mut Writer, trace: &TransactionTraceV0) {
    w.u8(0);
    trace.encode_fields(w);
}

/// Decodes a tagged `transaction_trace`, rejecting any variant other than `v0`.
pub fn decode_transaction_trace(r: &mut Reader) -> Result<TransactionTraceV0, ProtocolError> {
    let tag = r.u8()?;
    if tag != 0 {
        return Err(ProtocolError::UnsupportedVariant(tag, "transaction_trace"));
    }
    TransactionTraceV0::decode_fields(r)
}

// ---------------------------------------------------------------------------------------------
// requests
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetStatusRequest;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetBlocksRequest {
    pub start_block_num: u32,
    pub end_block_num: u32,
    pub max_messages_in_flight: u32,
    pub have_positions: Vec<BlockPosition>,
    pub irreversible_only: bool,
    pub fetch_block: bool,
    pub fetch_traces: bool,
    pub fetch_deltas: bool,
}

impl GetBlocksRequest {
    /// Builds the request for `start_block_num` with the defaults this core always sends
    /// (`spec.md` §4.2): unbounded end, unbounded in-flight messages, no resume positions,
    /// fetching blocks and traces but not deltas.
    pub fn from_start(start_block_num: u32) -> Self {
        Self {
            start_block_num,
            end_block_num: u32::MAX,
            max_messages_in_flight: u32::MAX,
            have_positions: Vec::new(),
            irreversible_only: false,
            fetch_block: true,
            fetch_traces: true,
            fetch_deltas: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    GetStatus(GetStatusRequest),
    GetBlocks(GetBlocksRequest),
}

/// Encodes `request` as a tagged `request` union (request kind tag, then a `v0` variant tag).
pub fn encode_request(request: &Request) -> Vec<u8> {
    let mut w = Writer::new();
    match request {
        Request::GetStatus(_) => {
            w.u8(0);
            w.u8(0);
        }
        Request::GetBlocks(req) => {
            w.u8(1);
            w.u8(0);
            w.u32_le(req.start_block_num);
            w.u32_le(req.end_block_num);
            w.u32_le(req.max_messages_in_flight);
            w.vec(&req.have_positions, |w, p| p.encode(w));
            w.bool(req.irreversible_only);
            w.bool(req.fetch_block);
            w.bool(req.fetch_traces);
            w.bool(req.fetch_deltas);
        }
    }
    w.into_bytes()
}

/// Decodes a tagged `request` union. Exposed mainly for round-trip testing of [encode_request].
pub fn decode_request(bytes: &[u8]) -> Result<Request, ProtocolError> {
    let mut r = Reader::new(bytes);
    let kind = r.u8()?;
    let version = r.u8()?;
    if version != 0 {
        return Err(ProtocolError::UnsupportedVariant(version, "request"));
    }
    match kind {
        0 => Ok(Request::GetStatus(GetStatusRequest)),
        1 => {
            let start_block_num = r.u32_le()?;
            let end_block_num = r.u32_le()?;
            let max_messages_in_flight = r.u32_le()?;
            let have_positions = r.vec(BlockPosition::decode)?;
            let irreversible_only = r.bool()?;
            let fetch_block = r.bool()?;
            let fetch_traces = r.bool()?;
            let fetch_deltas = r.bool()?;
            Ok(Request::GetBlocks(GetBlocksRequest {
                start_block_num,
                end_block_num,
                max_messages_in_flight,
                have_positions,
                irreversible_only,
                fetch_block,
                fetch_traces,
                fetch_deltas,
            }))
        }
        other => Err(ProtocolError::UnsupportedVariant(other, "request")),
    }
}

// ---------------------------------------------------------------------------------------------
// results
// ---------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetStatusResult {
    pub head: BlockPosition,
    pub last_irreversible: BlockPosition,
    pub trace_begin_block: u32,
    pub trace_end_block: u32,
    pub chain_id: BlockId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlocksResult {
    pub this_block: Option<BlockPosition>,
    pub prev_block: Option<BlockPosition>,
    pub last_irreversible: Option<BlockPosition>,
    pub block: Option<Vec<u8>>,
    pub traces: Option<Vec<TransactionTraceV0>>,
    pub deltas: Option<Vec<u8>>,
}

/// Decodes a `get_status_result`, requiring the schema descriptor to already be loaded
/// (`spec.md` §4.2: "No further decoding is attempted before the schema is loaded").
pub fn decode_get_status_result(
    bytes: &[u8],
    schema: Option<&SchemaDescriptor>,
) -> Result<GetStatusResult, ProtocolError> {
    schema.ok_or(ProtocolError::SchemaNotLoaded)?;

    let mut r = Reader::new(bytes);
    let tag = r.u8()?;
    if tag != 0 {
        return Err(ProtocolError::UnsupportedVariant(tag, "result"));
    }
    let version = r.u8()?;
    if version != 0 {
        return Err(ProtocolError::UnsupportedVariant(version, "get_status_result"));
    }

    let head = BlockPosition::decode(&mut r)?;
    let last_irreversible = BlockPosition::decode(&mut r)?;
    let trace_begin_block = r.u32_le()?;
    let trace_end_block = r.u32_le()?;
    let chain_id = BlockId::new(r.array32()?);

    Ok(GetStatusResult { head, last_irreversible, trace_begin_block, trace_end_block, chain_id })
}

/// Encodes a `get_status_result`. The core never sends this (only the upstream does); this
/// exists to build test fixtures that exercise [decode_get_status_result].
pub fn encode_get_status_result(result: &GetStatusResult) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(0);
    w.u8(0);
    result.head.encode(&mut w);
    result.last_irreversible.encode(&mut w);
    w.u32_le(result.trace_begin_block);
    w.u32_le(result.trace_end_block);
    w.array32(result.chain_id.as_bytes());
    w.into_bytes()
}

/// Decodes a `get_blocks_result`, requiring the schema descriptor to already be loaded.
pub fn decode_blocks_result(
    bytes: &[u8],
    schema: Option<&SchemaDescriptor>,
) -> Result<BlocksResult, ProtocolError> {
    schema.ok_or(ProtocolError::SchemaNotLoaded)?;

    let mut r = Reader::new(bytes);
    let tag = r.u8()?;
    if tag != 1 {
        return Err(ProtocolError::UnsupportedVariant(tag, "result"));
    }
    let version = r.u8()?;
    if version != 0 {
        return Err(ProtocolError::UnsupportedVariant(version, "get_blocks_result"));
    }

    let this_block = r.option(BlockPosition::decode)?;
    let prev_block = r.option(BlockPosition::decode)?;
    let last_irreversible = r.option(BlockPosition::decode)?;
    let block = r.option(|r| r.bytes_vec())?;
    let traces = r.option(|r| r.vec(decode_transaction_trace))?;
    let deltas = r.option(|r| r.bytes_vec())?;

    Ok(BlocksResult { this_block, prev_block, last_irreversible, block, traces, deltas })
}

/// Encodes a `get_blocks_result`. Used to build test fixtures that exercise
/// [decode_blocks_result] against a simulated upstream.
pub fn encode_blocks_result(result: &BlocksResult) -> Vec<u8> {
    let mut w = Writer::new();
    w.u8(1);
    w.u8(0);
    w.option(&result.this_block, |w, p| p.encode(w));
    w.option(&result.prev_block, |w, p| p.encode(w));
    w.option(&result.last_irreversible, |w, p| p.encode(w));
    w.option(&result.block, |w, b| w.bytes_vec(b));
    w.option(&result.traces, |w, traces| {
        w.vec(traces, |w, t| encode_transaction_trace(w, t))
    });
    w.option(&result.deltas, |w, b| w.bytes_vec(b));
    w.into_bytes()
}

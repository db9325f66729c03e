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

//! The Block Normalizer (C1 transport and C2 codec feed the shapes consumed here; see
//! `infra::protocol`). Pure transformation from a decoded `blocks_result` into a [NativeBlock],
//! with no I/O and no controller state.

use crate::infra::protocol::{ActionTraceV0, BlocksResult, TransactionStatus, TransactionTraceV0};
use ship_common::domain::{BlockId, Name, TransactionId};
use std::collections::BTreeMap;
use thiserror::Error;

/// A single extracted, core-account action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeAction {
    pub ordinal: u32,
    pub receiver: Name,
    pub account: Name,
    pub name: Name,
    pub data: Vec<u8>,
}

/// A transaction contributing at least one [NativeAction].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTrx {
    pub id: TransactionId,
    pub cpu_usage_us: u32,
    pub elapsed: i64,
    pub actions: Vec<NativeAction>,
}

/// A normalized source-chain block, ready for publication to the downstream consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeBlock {
    pub block_num: u32,
    pub id: BlockId,
    pub prev: BlockId,
    pub timestamp: u64,
    pub lib: u32,
    pub transactions: Vec<NativeTrx>,
    pub new_config: Option<NativeAction>,
}

/// A normalization-invariant violation (`spec.md` §3); fatal for the block and for the process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    #[error("matched action trace has no receipt")]
    MissingReceipt,

    #[error("evmtx creator_action_ordinal must reference an earlier action in the transaction")]
    InvalidParentOrdinal,

    #[error("block carries more than one configchange action")]
    MultipleConfigChange,

    #[error("configchange must be the only action in the block and precede any transaction")]
    ConfigChangeNotFirst,

    #[error("a transaction or block mixes pushtx and evmtx action names")]
    MixedActionNames,

    #[error("this_block is present but the accompanying signed block payload is missing")]
    MissingBlockPayload,
}

const EVMTX: &str = "evmtx";
const PUSHTX: &str = "pushtx";
const CONFIGCHANGE: &str = "configchange";

/// Converts a `block_timestamp_type` slot (half-seconds since 2000-01-01T00:00:00 UTC, the first
/// field of `signed_block`/`block_header`) into microseconds since the Unix epoch, matching
/// `sb.timestamp.to_time_point().time_since_epoch().count()` in the original implementation.
pub fn decode_block_timestamp(block_payload: &[u8]) -> Result<u64, InvariantError> {
    const EPOCH_2000_MS: u64 = 946_684_800_000;
    const SLOT_MS: u64 = 500;

    let slot = block_payload
        .get(0..4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(InvariantError::MissingBlockPayload)?;

    Ok((EPOCH_2000_MS + slot as u64 * SLOT_MS) * 1_000)
}

/// Transforms a decoded `blocks_result` into a [NativeBlock]. Returns `Ok(None)` when the result
/// carries no `this_block` (a no-op notification).
pub fn normalize(result: BlocksResult, core_account: Name) -> Result<Option<NativeBlock>, InvariantError> {
    let Some(this_block) = result.this_block else {
        return Ok(None);
    };

    let block_payload = result.block.ok_or(InvariantError::MissingBlockPayload)?;
    let timestamp = decode_block_timestamp(&block_payload)?;

    let mut native_block = NativeBlock {
        block_num: this_block.block_num,
        id: this_block.block_id,
        prev: result.prev_block.map(|p| p.block_id).unwrap_or_default(),
        timestamp,
        lib: result.last_irreversible.map(|li| li.block_num).unwrap_or_default(),
        transactions: Vec::new(),
        new_config: None,
    };

    let Some(traces) = result.traces else {
        return Ok(Some(native_block));
    };

    let evmtx = Name::from_str(EVMTX).expect("valid name literal");
    let pushtx = Name::from_str(PUSHTX).expect("valid name literal");
    let configchange = Name::from_str(CONFIGCHANGE).expect("valid name literal");

    for trace in traces {
        append_trace(&mut native_block, trace, core_account, evmtx, pushtx, configchange)?;
    }

    Ok(Some(native_block))
}

fn append_trace(
    block: &mut NativeBlock,
    trace: TransactionTraceV0,
    core_account: Name,
    evmtx: Name,
    pushtx: Name,
    configchange: Name,
) -> Result<(), InvariantError> {
    if trace.status != TransactionStatus::Executed {
        return Ok(());
    }

    let target = if trace
        .action_traces
        .iter()
        .any(|a| a.receiver == core_account && a.act.name == evmtx)
    {
        evmtx
    } else {
        pushtx
    };

    let mut ordered: BTreeMap<u64, &ActionTraceV0> = BTreeMap::new();
    for (index, action) in trace.action_traces.iter().enumerate() {
        if action.receiver != core_account {
            continue;
        }
        if action.act.name != target && action.act.name != configchange {
            continue;
        }

        let global_sequence = if action.act.name == evmtx {
            let parent_ordinal = action.creator_action_ordinal;
            if parent_ordinal == 0 {
                return Err(InvariantError::InvalidParentOrdinal);
            }
            let parent_index = (parent_ordinal - 1) as usize;
            if parent_index >= index {
                return Err(InvariantError::InvalidParentOrdinal);
            }
            trace.action_traces[parent_index]
                .receipt
                .as_ref()
                .ok_or(InvariantError::MissingReceipt)?
                .global_sequence
        } else if action.act.name == configchange {
            0
        } else {
            action
                .receipt
                .as_ref()
                .ok_or(InvariantError::MissingReceipt)?
                .global_sequence
        };

        ordered.insert(global_sequence, action);
    }

    if ordered.is_empty() {
        return Ok(());
    }

    let mut native_trx = NativeTrx {
        id: trace.id,
        cpu_usage_us: trace.cpu_usage_us,
        elapsed: trace.elapsed,
        actions: Vec::new(),
    };

    for action in ordered.into_values() {
        let native_action = NativeAction {
            ordinal: action.action_ordinal,
            receiver: action.receiver,
            account: action.act.account,
            name: action.act.name,
            data: action.act.data.clone(),
        };

        if native_action.name == configchange {
            if block.new_config.is_some() {
                return Err(InvariantError::MultipleConfigChange);
            }
            if !native_trx.actions.is_empty() || !block.transactions.is_empty() {
                return Err(InvariantError::ConfigChangeNotFirst);
            }
            block.new_config = Some(native_action);
        } else {
            if block.new_config.is_some() {
                return Err(InvariantError::ConfigChangeNotFirst);
            }
            if let Some(last) = native_trx.actions.last() {
                if last.name != native_action.name {
                    return Err(InvariantError::MixedActionNames);
                }
            }
            native_trx.actions.push(native_action);
        }
    }

    if native_trx.actions.is_empty() {
        // The ordered map held only a configchange action, already routed into
        // `block.new_config` above; a configchange carries no `NativeTrx` of its own.
        return Ok(());
    }

    if let (Some(prev_trx), Some(cur_last)) = (block.transactions.last(), native_trx.actions.last()) {
        if let Some(prev_last) = prev_trx.actions.last() {
            if prev_last.name != cur_last.name {
                return Err(InvariantError::MixedActionNames);
            }
        }
    }

    block.transactions.push(native_trx);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::protocol::{Action, ActionReceiptV0, BlockPosition, PermissionLevel};
    use assert_matches::assert_matches;

    fn core() -> Name {
        Name::from_str("evmevmevmevm").unwrap()
    }

    fn receipt(global_sequence: u64) -> ActionReceiptV0 {
        ActionReceiptV0 {
            receiver: core(),
            act_digest: Default::default(),
            global_sequence,
            recv_sequence: 0,
            auth_sequence: Vec::new(),
            code_sequence: 0,
            abi_sequence: 0,
        }
    }

    fn action_trace(
        ordinal: u32,
        creator_ordinal: u32,
        receipt: Option<ActionReceiptV0>,
        name: &str,
        receiver: Name,
    ) -> ActionTraceV0 {
        ActionTraceV0 {
            action_ordinal: ordinal,
            creator_action_ordinal: creator_ordinal,
            receipt,
            receiver,
            act: Action {
                account: receiver,
                name: Name::from_str(name).unwrap(),
                authorization: vec![PermissionLevel { actor: receiver, permission: Name::from_str("active").unwrap() }],
                data: vec![1, 2, 3],
            },
            context_free: false,
            elapsed: 0,
            console: String::new(),
            account_ram_deltas: Vec::new(),
            except: None,
            error_code: None,
        }
    }

    fn base_result(this_block: bool, traces: Option<Vec<TransactionTraceV0>>) -> BlocksResult {
        BlocksResult {
            this_block: this_block.then(|| BlockPosition { block_num: 100, block_id: Default::default() }),
            prev_block: Some(BlockPosition { block_num: 99, block_id: Default::default() }),
            last_irreversible: Some(BlockPosition { block_num: 90, block_id: Default::default() }),
            block: this_block.then(|| vec![0u8; 4]),
            traces,
            deltas: None,
        }
    }

    #[test]
    fn absent_this_block_yields_none_with_no_error() {
        let result = base_result(false, None);
        assert_eq!(normalize(result, core()).unwrap(), None);
    }

    #[test]
    fn absent_traces_yields_zero_transactions_and_populated_lib() {
        let result = base_result(true, None);
        let block = normalize(result, core()).unwrap().unwrap();
        assert_eq!(block.transactions.len(), 0);
        assert_eq!(block.lib, 90);
        assert_eq!(block.new_config, None);
    }

    #[test]
    fn transaction_with_no_matching_actions_contributes_nothing() {
        let other = Name::from_str("otheracct").unwrap();
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 10,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(5)), "pushtx", other)],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        let block = normalize(result, core()).unwrap().unwrap();
        assert_eq!(block.transactions.len(), 0);
    }

    #[test]
    fn evmtx_actions_are_ordered_by_parent_receipt_global_sequence() {
        let parents = vec![
            action_trace(0, 0, Some(receipt(30)), "someact", core()),
            action_trace(1, 0, Some(receipt(10)), "someact", core()),
            action_trace(2, 0, Some(receipt(20)), "someact", core()),
            action_trace(3, 1, None, "evmtx", core()),
            action_trace(4, 2, None, "evmtx", core()),
            action_trace(5, 3, None, "evmtx", core()),
        ];
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 10,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: parents,
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        let block = normalize(result, core()).unwrap().unwrap();
        assert_eq!(block.transactions.len(), 1);
        let ordinals: Vec<u32> = block.transactions[0].actions.iter().map(|a| a.ordinal).collect();
        // evmtx ordinal 4's parent (ordinal 1) has global_sequence 10, ordinal 5's parent
        // (ordinal 2) has 20, ordinal 3's parent (ordinal 0) has 30.
        assert_eq!(ordinals, vec![4, 5, 3]);
    }

    #[test]
    fn evmtx_with_zero_creator_ordinal_is_an_invariant_violation() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, None, "evmtx", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        assert_matches!(normalize(result, core()), Err(InvariantError::InvalidParentOrdinal));
    }

    #[test]
    fn evmtx_referencing_a_later_action_is_an_invariant_violation() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![
                action_trace(0, 2, None, "evmtx", core()),
                action_trace(1, 0, Some(receipt(1)), "someact", core()),
            ],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        assert_matches!(normalize(result, core()), Err(InvariantError::InvalidParentOrdinal));
    }

    #[test]
    fn matched_action_without_a_receipt_is_an_invariant_violation() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, None, "pushtx", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        assert_matches!(normalize(result, core()), Err(InvariantError::MissingReceipt));
    }

    #[test]
    fn non_executed_transactions_are_skipped_entirely() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::HardFail,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "pushtx", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        let block = normalize(result, core()).unwrap().unwrap();
        assert_eq!(block.transactions.len(), 0);
    }

    #[test]
    fn configchange_only_block_has_no_transactions() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "configchange", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace]));
        let block = normalize(result, core()).unwrap().unwrap();
        assert!(block.new_config.is_some());
        assert!(block.transactions.is_empty());
    }

    #[test]
    fn configchange_must_be_alone_and_first() {
        let trace_a = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "pushtx", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let trace_b = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "configchange", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace_a, trace_b]));
        assert_matches!(normalize(result, core()), Err(InvariantError::ConfigChangeNotFirst));
    }

    #[test]
    fn configchange_followed_by_an_evmtx_transaction_is_also_rejected() {
        // Regression test: a prior version of this check only rejected a trailing `pushtx`
        // transaction after `configchange`, silently letting a trailing `evmtx` one through.
        let trace_a = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "configchange", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let trace_b = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 0,
            net_usage_words: 0,
            elapsed: 0,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![
                action_trace(0, 0, Some(receipt(5)), "someact", core()),
                action_trace(1, 1, None, "evmtx", core()),
            ],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result = base_result(true, Some(vec![trace_a, trace_b]));
        assert_matches!(normalize(result, core()), Err(InvariantError::ConfigChangeNotFirst));
    }

    #[test]
    fn normalizing_twice_yields_byte_equal_blocks() {
        let trace = TransactionTraceV0 {
            id: Default::default(),
            status: TransactionStatus::Executed,
            cpu_usage_us: 5,
            net_usage_words: 0,
            elapsed: 7,
            net_usage: 0,
            scheduled: false,
            action_traces: vec![action_trace(0, 0, Some(receipt(1)), "pushtx", core())],
            account_ram_delta: None,
            except: None,
            error_code: None,
            failed_dtrx_trace: None,
            partial: None,
        };
        let result_a = base_result(true, Some(vec![trace.clone()]));
        let result_b = base_result(true, Some(vec![trace]));
        assert_eq!(normalize(result_a, core()).unwrap(), normalize(result_b, core()).unwrap());
    }
}

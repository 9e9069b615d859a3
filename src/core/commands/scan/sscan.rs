// src/core/commands/scan/sscan.rs

use super::helpers::{format_scan_options_to_bytes, glob_match, parse_scan_args};
use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_bytes;
use crate::core::database::ExecutionContext;
use crate::core::protocol::RespFrame;
use crate::core::storage::data_types::DataValue;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// Implements the `SSCAN` command for incrementally iterating over members of a set.
#[derive(Debug, Clone, Default)]
pub struct SScan {
    pub key: Bytes,
    pub cursor: u64,
    pub pattern: Option<Bytes>,
    pub count: Option<usize>,
}
impl ParseCommand for SScan {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if args.len() < 2 {
            return Err(SpinelDBError::WrongArgumentCount("SSCAN".to_string()));
        }
        let key = extract_bytes(&args[0])?;
        let (cursor, pattern, count) = parse_scan_args(&args[1..], 1, "SSCAN")?;
        Ok(SScan {
            key,
            cursor,
            pattern,
            count,
        })
    }
}
#[async_trait]
impl ExecutableCommand for SScan {
    async fn execute<'a>(
        &self,
        ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        let (_, guard) = ctx.get_single_shard_context_mut()?;
        let (cursor, items) = if let Some(entry) = guard.get_mut(&self.key) {
            if entry.is_expired() {
                (0, vec![])
            } else if let DataValue::Set(set) = &entry.data {
                let count = self.count.unwrap_or(10).max(1);
                let mut result_members = Vec::with_capacity(count);
                let mut new_cursor_pos = self.cursor as usize;

                for member in set.iter().skip(self.cursor as usize) {
                    new_cursor_pos += 1;

                    if let Some(p) = &self.pattern {
                        if glob_match(p, member) {
                            result_members.push(RespValue::BulkString(member.clone()));
                        }
                    } else {
                        result_members.push(RespValue::BulkString(member.clone()));
                    }

                    if result_members.len() >= count {
                        break;
                    }
                }

                let new_cursor = if new_cursor_pos >= set.len() {
                    0
                } else {
                    new_cursor_pos as u64
                };

                (new_cursor, result_members)
            } else {
                return Err(SpinelDBError::WrongType);
            }
        } else {
            (0, vec![])
        };

        let resp = RespValue::Array(vec![
            RespValue::BulkString(cursor.to_string().into()),
            RespValue::Array(items),
        ]);

        Ok((resp, WriteOutcome::DidNotWrite))
    }
}
impl CommandSpec for SScan {
    fn name(&self) -> &'static str {
        "sscan"
    }
    fn arity(&self) -> i64 {
        -3
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::MOVABLEKEYS
    }
    fn first_key(&self) -> i64 {
        1
    }
    fn last_key(&self) -> i64 {
        1
    }
    fn step(&self) -> i64 {
        1
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![self.key.clone()]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        let mut args = vec![self.key.clone(), self.cursor.to_string().into()];
        args.extend(format_scan_options_to_bytes(&self.pattern, &self.count));
        args
    }
}

// src/core/commands/generic/command.rs

//! Implements the `COMMAND` introspection command and its subcommands.

use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{
    CommandFlags, ExecutableCommand, ParseCommand, WriteOutcome,
};
use crate::core::commands::helpers::extract_string;
use crate::core::protocol::RespFrame;
use crate::core::database::ExecutionContext;
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

/// Enum for `COMMAND` subcommands.
#[derive(Debug, Clone, Default)]
pub enum CommandSubcommand {
    #[default]
    List,
    Count,
    Docs(Vec<String>),
}

/// The main `COMMAND` command struct.
#[derive(Debug, Clone, Default)]
pub struct CommandInfo {
    pub subcommand: CommandSubcommand,
}

impl ParseCommand for CommandInfo {
    fn parse(args: &[RespFrame]) -> Result<Self, SpinelDBError> {
        if args.is_empty() {
            return Ok(CommandInfo {
                subcommand: CommandSubcommand::List,
            });
        }
        let sub_str = extract_string(&args[0])?.to_ascii_lowercase();
        let subcommand = match sub_str.as_str() {
            "count" => CommandSubcommand::Count,
            "docs" => {
                let names = args[1..]
                    .iter()
                    .map(extract_string)
                    .collect::<Result<Vec<_>, _>>()?;
                CommandSubcommand::Docs(names)
            }
            _ => {
                return Err(SpinelDBError::UnknownCommand(format!("COMMAND {sub_str}")));
            }
        };
        Ok(CommandInfo { subcommand })
    }
}

#[async_trait]
impl ExecutableCommand for CommandInfo {
    async fn execute<'a>(
        &self,
        _ctx: &mut ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        let resp = match &self.subcommand {
            CommandSubcommand::List => RespValue::Array(vec![]),
            CommandSubcommand::Count => RespValue::Integer(0),
            CommandSubcommand::Docs(_) => RespValue::Array(vec![]),
        };
        Ok((resp, WriteOutcome::DidNotWrite))
    }
}

impl CommandSpec for CommandInfo {
    fn name(&self) -> &'static str {
        "command"
    }
    fn arity(&self) -> i64 {
        -1
    }
    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY | CommandFlags::ADMIN
    }
    fn first_key(&self) -> i64 {
        0
    }
    fn last_key(&self) -> i64 {
        0
    }
    fn step(&self) -> i64 {
        0
    }
    fn get_keys(&self) -> Vec<Bytes> {
        vec![]
    }
    fn to_resp_args(&self) -> Vec<Bytes> {
        match &self.subcommand {
            CommandSubcommand::List => vec![],
            CommandSubcommand::Count => vec!["COUNT".into()],
            CommandSubcommand::Docs(names) => {
                let mut args = vec![Bytes::from_static(b"DOCS")];
                args.extend(names.iter().cloned().map(Bytes::from));
                args
            }
        }
    }
}

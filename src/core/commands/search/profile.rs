use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, WriteOutcome};
use crate::core::types::{BytesExt, SpinelString};
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct FtProfileCommand {
    pub index_name: String,
    pub subcommand: String,
    pub query: String,
}

#[async_trait]
impl ExecutableCommand for FtProfileCommand {
    async fn execute<'a>(
        &self,
        _ctx: &mut crate::core::database::ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        // Placeholder for profiling functionality
        // This would return performance metrics for the query
        let result = vec![RespValue::Array(vec![
            // Query result
            RespValue::Array(vec![RespValue::Integer(0)]),
            // Profile information
            RespValue::Array(vec![
                RespValue::BulkString("Query Time".to_string().into()),
                RespValue::BulkString("0.0".to_string().into()),
            ]),
        ])];

        Ok((RespValue::Array(result), WriteOutcome::DidNotWrite))
    }
}

impl FtProfileCommand {
    pub fn parse(args: &[SpinelString]) -> Result<Self, SpinelDBError> {
        if args.len() < 3 {
            return Err(SpinelDBError::WrongArgumentCount("FT.PROFILE".to_string()));
        }

        let index_name = args[0].string_from_bytes()?;
        let subcommand = args[1].string_from_bytes()?.to_ascii_lowercase();
        let query = args[2].string_from_bytes()?;

        Ok(Self {
            index_name,
            subcommand,
            query,
        })
    }
}

impl CommandSpec for FtProfileCommand {
    fn name(&self) -> &'static str {
        "ft.profile"
    }

    fn arity(&self) -> i64 {
        -4 // FT.PROFILE index_name subcommand query
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::READONLY
    }

    fn first_key(&self) -> i64 {
        1
    }

    fn last_key(&self) -> i64 {
        1
    }

    fn step(&self) -> i64 {
        0
    }

    fn get_keys(&self) -> Vec<Bytes> {
        vec![] // This command doesn't have keys in the traditional sense
    }

    fn to_resp_args(&self) -> Vec<Bytes> {
        vec![
            Bytes::from_static(b"PROFILE"),
            Bytes::from(self.index_name.clone()),
            Bytes::from(self.subcommand.clone()),
            Bytes::from(self.query.clone()),
        ]
    }
}

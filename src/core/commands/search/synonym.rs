use crate::core::commands::command_spec::CommandSpec;
use crate::core::commands::command_trait::{CommandFlags, ExecutableCommand, WriteOutcome};
use crate::core::types::{BytesExt, SpinelString};
use crate::core::{RespValue, SpinelDBError};
use async_trait::async_trait;
use bytes::Bytes;

#[derive(Debug, Clone, Default)]
pub struct FtSynonymCommand {
    pub index_name: String,
    pub group_id: String,
    pub terms: Vec<String>,
}

#[async_trait]
impl ExecutableCommand for FtSynonymCommand {
    async fn execute<'a>(
        &self,
        _ctx: &mut crate::core::database::ExecutionContext<'a>,
    ) -> Result<(RespValue, WriteOutcome), SpinelDBError> {
        // Placeholder for synonym management
        // This would manage groups of synonyms for search expansion
        let result = vec![RespValue::SimpleString("OK".to_string())];

        Ok((
            RespValue::Array(result),
            WriteOutcome::Write { keys_modified: 0 },
        ))
    }
}

impl FtSynonymCommand {
    pub fn parse(args: &[SpinelString]) -> Result<Self, SpinelDBError> {
        if args.len() < 3 {
            return Err(SpinelDBError::WrongArgumentCount(
                "FT.SYNUPDATE".to_string(),
            ));
        }

        let index_name = args[0].string_from_bytes()?;
        let group_id = args[1].string_from_bytes()?;
        let mut terms = Vec::new();

        for arg in args.iter().skip(2) {
            terms.push(arg.string_from_bytes()?);
        }

        Ok(Self {
            index_name,
            group_id,
            terms,
        })
    }
}

impl CommandSpec for FtSynonymCommand {
    fn name(&self) -> &'static str {
        "ft.synupdate"
    }

    fn arity(&self) -> i64 {
        -3 // FT.SYNUPDATE index_name group_id term1 [term2...]
    }

    fn flags(&self) -> CommandFlags {
        CommandFlags::WRITE
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
        let mut args = vec![
            Bytes::from_static(b"SYNUPDATE"),
            Bytes::from(self.index_name.clone()),
            Bytes::from(self.group_id.clone()),
        ];

        for term in &self.terms {
            args.push(Bytes::from(term.clone()));
        }

        args
    }
}

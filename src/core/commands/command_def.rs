// src/core/commands/command_def.rs

//! The `define_commands!` macro. Given a table of (variant, struct, module)
//! triples it generates the `Command` enum plus the glue that lets the rest
//! of the server treat every command uniformly: dispatch by name via
//! `TryFrom<RespFrame>`, introspection via `CommandSpec`, and execution via
//! `CommandExt`.
//!
//! Keeping this in one macro means adding a command is a one-line change to
//! the table in `mod.rs` instead of four separate hand-written impls that can
//! drift out of sync.

macro_rules! define_commands {
    (
        dispatchers: { $( ($dvariant:ident, $dtype:ty, $dmod:ident) ),* $(,)? },
        standard: { $( ($variant:ident, $stype:ty, $smod:ident) ),* $(,)? }
    ) => {
        /// The single parsed representation of every command the server understands.
        /// Produced by `TryFrom<RespFrame>`, consumed by the router, the transaction
        /// handler, the replication applier and the scripting gateway alike.
        #[derive(Debug, Clone)]
        pub enum Command {
            $( $dvariant($dmod::$dtype), )*
            $( $variant($smod::$stype), )*
        }

        impl Command {
            /// The command's canonical lowercase name, as reported by its `CommandSpec`.
            pub fn name(&self) -> &'static str {
                match self {
                    $( Command::$dvariant(c) => $crate::core::commands::command_spec::CommandSpec::name(c), )*
                    $( Command::$variant(c) => $crate::core::commands::command_spec::CommandSpec::name(c), )*
                }
            }

            /// Reconstructs the wire form of this command: the uppercased command
            /// name followed by its arguments. Used by replication and AOF writers.
            pub fn get_resp_args(&self) -> Vec<$crate::core::protocol::RespFrame> {
                let mut out = Vec::new();
                out.push($crate::core::protocol::RespFrame::BulkString(
                    bytes::Bytes::from(self.name().to_ascii_uppercase()),
                ));
                let args: Vec<bytes::Bytes> = match self {
                    $( Command::$dvariant(c) => $crate::core::commands::command_spec::CommandSpec::to_resp_args(c), )*
                    $( Command::$variant(c) => $crate::core::commands::command_spec::CommandSpec::to_resp_args(c), )*
                };
                out.extend(args.into_iter().map($crate::core::protocol::RespFrame::BulkString));
                out
            }
        }

        #[async_trait::async_trait]
        impl $crate::core::commands::command_trait::CommandExt for Command {
            fn get_flags(&self) -> $crate::core::commands::command_trait::CommandFlags {
                match self {
                    $( Command::$dvariant(c) => $crate::core::commands::command_spec::CommandSpec::flags(c), )*
                    $( Command::$variant(c) => $crate::core::commands::command_spec::CommandSpec::flags(c), )*
                }
            }

            fn get_keys(&self) -> Vec<bytes::Bytes> {
                match self {
                    $( Command::$dvariant(c) => $crate::core::commands::command_spec::CommandSpec::get_keys(c), )*
                    $( Command::$variant(c) => $crate::core::commands::command_spec::CommandSpec::get_keys(c), )*
                }
            }

            async fn execute<'a>(
                &self,
                ctx: &mut $crate::core::database::ExecutionContext<'a>,
            ) -> Result<
                ($crate::core::RespValue, $crate::core::commands::command_trait::WriteOutcome),
                $crate::core::SpinelDBError,
            > {
                match self {
                    $( Command::$dvariant(c) => $crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await, )*
                    $( Command::$variant(c) => $crate::core::commands::command_trait::ExecutableCommand::execute(c, ctx).await, )*
                }
            }
        }

        /// A name-keyed table of parse functions, built once on first use.
        /// `TryFrom<RespFrame>` looks the command name up here instead of
        /// chaining a linear `if/else` over every known command.
        type ParseFn = fn(&[$crate::core::protocol::RespFrame]) -> Result<Command, $crate::core::SpinelDBError>;

        static COMMAND_TABLE: once_cell::sync::Lazy<std::collections::HashMap<&'static str, ParseFn>> =
            once_cell::sync::Lazy::new(|| {
                let mut m: std::collections::HashMap<&'static str, ParseFn> = std::collections::HashMap::new();
                $(
                    {
                        let key: &'static str = Box::leak(
                            stringify!($dvariant).to_ascii_lowercase().into_boxed_str()
                        );
                        m.insert(key, (|args: &[$crate::core::protocol::RespFrame]| {
                            Ok(Command::$dvariant(<$dmod::$dtype as $crate::core::commands::command_trait::ParseCommand>::parse(args)?))
                        }) as ParseFn);
                    }
                )*
                $(
                    {
                        let key: &'static str = Box::leak(
                            stringify!($variant).to_ascii_lowercase().into_boxed_str()
                        );
                        m.insert(key, (|args: &[$crate::core::protocol::RespFrame]| {
                            Ok(Command::$variant(<$smod::$stype as $crate::core::commands::command_trait::ParseCommand>::parse(args)?))
                        }) as ParseFn);
                    }
                )*
                m
            });

        impl std::convert::TryFrom<$crate::core::protocol::RespFrame> for Command {
            type Error = $crate::core::SpinelDBError;

            fn try_from(frame: $crate::core::protocol::RespFrame) -> Result<Self, Self::Error> {
                use $crate::core::protocol::RespFrame;
                use $crate::core::SpinelDBError;

                let items = match frame {
                    RespFrame::Array(items) => items,
                    _ => {
                        return Err(SpinelDBError::InvalidRequest(
                            "expected a command array".into(),
                        ));
                    }
                };
                if items.is_empty() {
                    return Err(SpinelDBError::InvalidRequest("empty command".into()));
                }

                let name = match &items[0] {
                    RespFrame::BulkString(b) => String::from_utf8_lossy(b).to_ascii_lowercase(),
                    RespFrame::SimpleString(s) => s.to_ascii_lowercase(),
                    _ => return Err(SpinelDBError::InvalidRequest("invalid command name".into())),
                };

                let parse_fn = COMMAND_TABLE
                    .get(name.as_str())
                    .ok_or_else(|| SpinelDBError::UnknownCommand(name.clone()))?;

                parse_fn(&items[1..])
            }
        }

        impl From<Command> for $crate::core::protocol::RespFrame {
            fn from(cmd: Command) -> Self {
                $crate::core::protocol::RespFrame::Array(cmd.get_resp_args())
            }
        }
    };
}

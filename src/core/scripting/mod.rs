// src/core/scripting/mod.rs

//! The scripting execution core: the piece that sits between the embedded Lua
//! engine and the normal command dispatcher. It owns the single running-script
//! invariant, enforces the same ACL/OOM/cluster/replica rules a real client
//! would face, supervises long-running scripts for timeout, and mediates
//! administrative `SCRIPT KILL`.

pub mod gateway;
pub mod kill;
pub mod lifecycle;
pub mod lua_manager;
pub mod run_context;
pub mod timeout;

pub use gateway::call_command;
pub use kill::kill;
pub use lifecycle::{ScriptRunGuard, ScriptRunner, protect_caller};
pub use run_context::{ReplicationFlags, RunContext, RunFlags, RunShared, ScriptPseudoClient};
pub use timeout::{InterruptAction, interrupt};

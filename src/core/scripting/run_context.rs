// src/core/scripting/run_context.rs

//! The per-invocation state bundle for a single script execution.

use crate::core::acl::user::AclUser;
use crate::core::state::client::ClientInfo;
use crate::core::{Command, SpinelDBError};
use bitflags::bitflags;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

bitflags! {
    /// Independent bits tracked for the lifetime of one script invocation.
    ///
    /// These live on [`RunShared`] rather than directly on [`RunContext`] because an
    /// administrative `SCRIPT KILL` arrives on a different connection's task and needs
    /// to flip `KILLED` without holding a reference to the running script's own state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RunFlags: u16 {
        /// Ad-hoc `EVAL`/`EVALSHA` script, as opposed to a registered function.
        const EVAL_MODE     = 1 << 0;
        /// Set the first time a write command is dispatched through the gateway.
        const WRITE_DIRTY   = 1 << 1;
        /// Set once the atomicity open-bracket bookkeeping has fired.
        const MULTI_EMITTED = 1 << 2;
        /// The script has exceeded its time budget and is running in reentrant mode.
        const TIMEDOUT      = 1 << 3;
        /// An administrator requested termination; observed at the next interrupt tick.
        const KILLED        = 1 << 4;
        /// The script declared itself read-only; write commands are refused.
        const READ_ONLY     = 1 << 5;
    }

    /// Destinations eligible to receive a script's writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ReplicationFlags: u8 {
        const PROPAGATE_LOG      = 1 << 0;
        const PROPAGATE_REPLICAS = 1 << 1;
    }
}

/// State shared between the running script and administrative commands (`SCRIPT KILL`,
/// introspection) that observe it from a different connection's task.
#[derive(Debug)]
pub struct RunShared {
    pub function_name: String,
    pub caller_session_id: u64,
    pub caller_is_replication_applier: bool,
    pub start: Instant,
    pub snapshot_time_ms: u64,
    flags: AtomicU16,
}

impl RunShared {
    pub fn flags(&self) -> RunFlags {
        RunFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn set_flags(&self, flags: RunFlags) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    pub fn clear_flags(&self, flags: RunFlags) {
        self.flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    pub fn is_set(&self, flag: RunFlags) -> bool {
        self.flags().contains(flag)
    }

    pub fn is_eval(&self) -> bool {
        self.is_set(RunFlags::EVAL_MODE)
    }

    pub fn run_duration_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Capability bundle through which script-issued commands enter the dispatcher.
///
/// Scripts have no network peer of their own; the pseudo-client stands in for
/// per-command state (selected database, protocol version, current-command pointer).
#[derive(Debug, Clone)]
pub struct ScriptPseudoClient {
    pub db_index: usize,
    pub protocol_version: u8,
    pub authenticated_user: Option<Arc<AclUser>>,
    pub current_command: Option<Command>,
    pub in_transaction: bool,
    pub is_readonly_flag: bool,
    pub is_asking: bool,
}

impl ScriptPseudoClient {
    fn new(db_index: usize, authenticated_user: Option<Arc<AclUser>>, in_transaction: bool) -> Self {
        Self {
            db_index,
            protocol_version: 2,
            authenticated_user,
            current_command: None,
            in_transaction,
            is_readonly_flag: false,
            is_asking: false,
        }
    }

    /// `spinel.setresp(n)`. Only RESP2/RESP3 are accepted.
    pub fn set_protocol_version(&mut self, version: i64) -> Result<(), SpinelDBError> {
        if version != 2 && version != 3 {
            return Err(SpinelDBError::InvalidState(
                "RESP version must be 2 or 3".into(),
            ));
        }
        self.protocol_version = version as u8;
        Ok(())
    }
}

/// Exactly one in-flight script invocation. Owned by the caller's own task for the
/// duration of the script; the [`RunShared`] handle inside is what a concurrent
/// `SCRIPT KILL`/introspection command actually reaches across tasks.
pub struct RunContext {
    pub shared: Arc<RunShared>,
    pub pseudo_client: ScriptPseudoClient,
    pub caller_db_index: usize,
    pub caller_authenticated_user: Option<Arc<AclUser>>,
    pub repl_flags: ReplicationFlags,
    /// Whether the server was over its memory cap at `prepare` time. Captured once so
    /// that the §4.4 step 8 OOM gate judges the *whole script* against the pressure that
    /// was present when it started, rather than re-sampling memory on every dispatched
    /// command (the open question in §9: the surrounding server refreshes this at each
    /// `prepare`, so pressure that appears mid-script does not retroactively block a
    /// script that started clean, and pressure that clears mid-script does not
    /// retroactively unblock one that started under it).
    pub oom_latched: bool,
    /// Lifetime-pinning clone of the caller's client record. Holding this `Arc` keeps
    /// the record alive for the duration of the script even if the caller's connection
    /// drops and `ConnectionGuard` removes it from `ServerState::clients` in the meantime.
    protected_caller: Option<Arc<Mutex<ClientInfo>>>,
}

impl RunContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        function_name: String,
        is_eval: bool,
        caller_session_id: u64,
        caller_db_index: usize,
        caller_authenticated_user: Option<Arc<AclUser>>,
        caller_in_transaction: bool,
        caller_is_replication_applier: bool,
        oom_latched: bool,
        protected_caller: Option<Arc<Mutex<ClientInfo>>>,
    ) -> Self {
        let snapshot_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let mut initial_flags = RunFlags::empty();
        if is_eval {
            initial_flags |= RunFlags::EVAL_MODE;
        }

        let shared = Arc::new(RunShared {
            function_name,
            caller_session_id,
            caller_is_replication_applier,
            start: Instant::now(),
            snapshot_time_ms,
            flags: AtomicU16::new(initial_flags.bits()),
        });

        Self {
            shared,
            pseudo_client: ScriptPseudoClient::new(
                caller_db_index,
                caller_authenticated_user.clone(),
                caller_in_transaction,
            ),
            caller_db_index,
            caller_authenticated_user,
            repl_flags: ReplicationFlags::PROPAGATE_LOG | ReplicationFlags::PROPAGATE_REPLICAS,
            oom_latched,
            protected_caller,
        }
    }

    pub fn protect_caller(&mut self, client: Arc<Mutex<ClientInfo>>) {
        self.protected_caller = Some(client);
    }

    pub fn unprotect_caller(&mut self) {
        self.protected_caller = None;
    }
}

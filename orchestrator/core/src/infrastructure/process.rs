// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! OS process control for per-workload worker processes.
//!
//! Workers are started by re-executing a program (normally the current
//! binary) with `monitor --schain <name>` appended to a fixed argument list.
//! Children spawned here are kept so that exited workers get reaped instead
//! of lingering as zombies that still answer `kill(pid, 0)`.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use tracing::{debug, info};

use crate::domain::process::{ProcessControl, ProcessError, Signal};

pub struct OsProcessControl {
    program: PathBuf,
    base_args: Vec<String>,
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new(program: impl Into<PathBuf>, base_args: Vec<String>) -> Self {
        Self { program: program.into(), base_args, children: Mutex::new(HashMap::new()) }
    }

    /// Re-execute the running binary, forwarding `--config` when given.
    pub fn current_exe(config_path: Option<PathBuf>) -> std::io::Result<Self> {
        let program = std::env::current_exe()?;
        let mut base_args = Vec::new();
        if let Some(path) = config_path {
            base_args.push("--config".to_string());
            base_args.push(path.display().to_string());
        }
        Ok(Self::new(program, base_args))
    }

    pub fn worker_args(&self, schain: &str) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.extend(["monitor".to_string(), "--schain".to_string(), schain.to_string()]);
        args
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn_worker(&self, schain: &str) -> Result<u32, ProcessError> {
        let child = Command::new(&self.program)
            .args(self.worker_args(schain))
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| ProcessError::Spawn { schain: schain.to_string(), reason: e.to_string() })?;

        let pid = child.id();
        self.children.lock().insert(pid, child);
        info!("[{}] Spawned worker process {}", schain, pid);
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }

        let mut children = self.children.lock();
        if let Some(child) = children.get_mut(&pid) {
            return match child.try_wait() {
                Ok(None) => true,
                Ok(Some(status)) => {
                    debug!("Reaped worker process {} ({})", pid, status);
                    children.remove(&pid);
                    false
                }
                Err(_) => false,
            };
        }
        drop(children);

        unsafe { libc::kill(pid as i32, 0) == 0 }
    }

    fn signal(&self, pid: u32, signal: Signal) -> Result<(), ProcessError> {
        if pid == 0 {
            return Err(ProcessError::Signal { pid, reason: "refusing to signal pid 0".to_string() });
        }
        let signo = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        unsafe {
            if libc::kill(pid as i32, signo) != 0 {
                return Err(ProcessError::Signal {
                    pid,
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
        }
        Ok(())
    }
}

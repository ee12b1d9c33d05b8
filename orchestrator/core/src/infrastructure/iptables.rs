// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # iptables Host Firewall
//!
//! [`HostFirewall`] on top of the `iptables` binary, `INPUT` chain only.
//!
//! Managed rules have exactly one of these shapes:
//!
//! ```text
//! -A INPUT -p tcp -m tcp --dport <port> -j ACCEPT
//! -A INPUT -s <ip>/32 -p tcp -m tcp --dport <port> -j ACCEPT
//! -A INPUT -p tcp -m iprange --src-range <a>-<b> -m tcp --dport <port> -j ACCEPT
//! ```
//!
//! Anything else in the chain is ignored. Mutations take the host lock, then
//! check the rule with `-C` before changing anything.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::{Command, Output};
use tracing::{debug, info};

use crate::domain::firewall::{FirewallError, FirewallRule, HostFirewall};
use crate::infrastructure::file_lock::HostLock;

const CHAIN: &str = "INPUT";

pub struct IptablesFirewall {
    binary: String,
    lock: HostLock,
}

impl IptablesFirewall {
    pub fn new(binary: impl Into<String>, lock_path: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into(), lock: HostLock::new(lock_path) }
    }

    fn run(&self, args: &[String]) -> Result<Output, FirewallError> {
        debug!("{} {}", self.binary, args.join(" "));
        Ok(Command::new(&self.binary).args(args).output()?)
    }

    fn check(&self, rule: &FirewallRule) -> Result<bool, FirewallError> {
        let mut args = vec!["-C".to_string(), CHAIN.to_string()];
        args.extend(rule_args(rule));
        let output = self.run(&args)?;
        match output.status.code() {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(command_error("-C", &output)),
        }
    }

    fn mutate(&self, action: &str, rule: &FirewallRule) -> Result<(), FirewallError> {
        let mut args = vec![action.to_string(), CHAIN.to_string()];
        args.extend(rule_args(rule));
        let output = self.run(&args)?;
        if !output.status.success() {
            return Err(command_error(action, &output));
        }
        Ok(())
    }
}

impl HostFirewall for IptablesFirewall {
    fn rules(&self) -> Result<Vec<FirewallRule>, FirewallError> {
        let output = self.run(&["-S".to_string(), CHAIN.to_string()])?;
        if !output.status.success() {
            return Err(command_error("-S", &output));
        }
        Ok(parse_rules(&String::from_utf8_lossy(&output.stdout)))
    }

    fn add_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError> {
        let _guard = self.lock.lock().map_err(|e| FirewallError::Lock(e.to_string()))?;
        if self.check(rule)? {
            return Ok(());
        }
        // Insert at the top so the rule precedes any trailing DROP
        self.mutate("-I", rule)?;
        info!("Firewall rule added: {}", rule);
        Ok(())
    }

    fn remove_rule(&self, rule: &FirewallRule) -> Result<(), FirewallError> {
        let _guard = self.lock.lock().map_err(|e| FirewallError::Lock(e.to_string()))?;
        if !self.check(rule)? {
            return Ok(());
        }
        self.mutate("-D", rule)?;
        info!("Firewall rule removed: {}", rule);
        Ok(())
    }
}

fn command_error(action: &str, output: &Output) -> FirewallError {
    FirewallError::Command(format!(
        "iptables {} exited with {}: {}",
        action,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    ))
}

/// Rule specification without the `-A/-C/-D/-I <chain>` prefix.
pub fn rule_args(rule: &FirewallRule) -> Vec<String> {
    let mut args = Vec::new();
    match (rule.first_ip, rule.last_ip) {
        (Some(first), Some(last)) if first != last => {
            args.extend(["-p", "tcp", "-m", "iprange", "--src-range"].map(String::from));
            args.push(format!("{}-{}", first, last));
        }
        (Some(ip), _) => {
            args.push("-s".to_string());
            args.push(format!("{}/32", ip));
            args.extend(["-p", "tcp"].map(String::from));
        }
        _ => args.extend(["-p", "tcp"].map(String::from)),
    }
    args.extend(["-m", "tcp", "--dport"].map(String::from));
    args.push(rule.port.to_string());
    args.extend(["-j", "ACCEPT"].map(String::from));
    args
}

/// Parse `iptables -S INPUT` output, keeping only managed rules.
pub fn parse_rules(output: &str) -> Vec<FirewallRule> {
    output.lines().filter_map(parse_rule_line).collect()
}

fn parse_rule_line(line: &str) -> Option<FirewallRule> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 2 || tokens[0] != "-A" || tokens[1] != CHAIN {
        return None;
    }

    let mut protocol_tcp = false;
    let mut accept = false;
    let mut port: Option<u16> = None;
    let mut source: Option<(Ipv4Addr, Ipv4Addr)> = None;

    let mut i = 2;
    while i < tokens.len() {
        let value = tokens.get(i + 1).copied();
        match tokens[i] {
            "-p" => protocol_tcp = value == Some("tcp"),
            "-j" => accept = value == Some("ACCEPT"),
            "--dport" => port = value.and_then(|v| v.parse().ok()),
            "-s" => {
                let ip = value?.strip_suffix("/32")?.parse().ok()?;
                source = Some((ip, ip));
            }
            "--src-range" => {
                let (start, end) = value?.split_once('-')?;
                source = Some((start.parse().ok()?, end.parse().ok()?));
            }
            "-m" => {
                if !matches!(value, Some("tcp") | Some("iprange")) {
                    return None;
                }
            }
            _ => {
                i += 1;
                continue;
            }
        }
        i += 2;
    }

    if !protocol_tcp || !accept {
        return None;
    }
    let port = port?;
    Some(match source {
        Some((first, last)) => FirewallRule { port, first_ip: Some(first), last_ip: Some(last) },
        None => FirewallRule::open(port),
    })
}

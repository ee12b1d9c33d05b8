// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Monitor Classification
//!
//! Pure selection of the remediation program for one reconciliation cycle.
//!
//! ## Priority Table
//! | Order | Monitor | Entry condition |
//! |-------|---------|-----------------|
//! | 1 | Backup | `first_run && !new_schain && backup_run` |
//! | 2 | Repair | `repair_mode \|\| !exit_code_ok` |
//! | 3 | Rotation | rotation in progress |
//! | 4 | PostRotation | exit schedule present and worker exited with code 0 |
//! | 5 | Regular | fallback |
//!
//! A Rotation cycle further branches on [`RotationRole`]. Each resulting
//! [`Program`] maps to a fixed ordered list of [`Step`]s.

use serde::Serialize;
use std::fmt;

use crate::domain::schain::{NodeId, RotationFacts};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorKind {
    Backup,
    Repair,
    Rotation,
    PostRotation,
    Regular,
}

impl MonitorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorKind::Backup => "backup",
            MonitorKind::Repair => "repair",
            MonitorKind::Rotation => "rotation",
            MonitorKind::PostRotation => "post_rotation",
            MonitorKind::Regular => "regular",
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the classifier looks at, flattened from record, node config,
/// checks and rotation facts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierInputs {
    pub first_run: bool,
    pub new_schain: bool,
    pub backup_run: bool,
    pub repair_mode: bool,
    pub exit_code_ok: bool,
    pub rotation_in_progress: bool,
    pub exit_scheduled: bool,
    pub exited_cleanly: bool,
}

pub fn classify(inputs: &ClassifierInputs) -> MonitorKind {
    if inputs.first_run && !inputs.new_schain && inputs.backup_run {
        MonitorKind::Backup
    } else if inputs.repair_mode || !inputs.exit_code_ok {
        MonitorKind::Repair
    } else if inputs.rotation_in_progress {
        MonitorKind::Rotation
    } else if inputs.exit_scheduled && inputs.exited_cleanly {
        MonitorKind::PostRotation
    } else {
        MonitorKind::Regular
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationRole {
    Leaving,
    New,
    Staying,
}

/// Role of `self_id` in an in-progress rotation.
///
/// A node without a local config file is treated as new even if the chain
/// lists it as staying, so that a node which lost its config re-bootstraps.
pub fn rotation_role(self_id: NodeId, facts: &RotationFacts, config_present: bool) -> RotationRole {
    if facts.leaving_node_id == self_id {
        RotationRole::Leaving
    } else if facts.new_node_id == self_id || !config_present {
        RotationRole::New
    } else {
        RotationRole::Staying
    }
}

/// One remediation step. Variants carrying options of the same aspect are
/// kept separate so that program tables stay `'static`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Teardown,
    Directory,
    Dkg,
    Config,
    ForceConfig,
    Volume,
    FirewallRules,
    ClearFirewallRules,
    WorkerContainer,
    WorkerFromSnapshot,
    WorkerAtRotationFinish,
    RestartWorker,
    Liveness,
    RelayContainer,
    RotationRequest,
    ClearExitSchedule,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Teardown => "teardown",
            Step::Directory => "directory",
            Step::Dkg => "dkg",
            Step::Config => "config",
            Step::ForceConfig => "force_config",
            Step::Volume => "volume",
            Step::FirewallRules => "firewall_rules",
            Step::ClearFirewallRules => "clear_firewall_rules",
            Step::WorkerContainer => "worker_container",
            Step::WorkerFromSnapshot => "worker_from_snapshot",
            Step::WorkerAtRotationFinish => "worker_at_rotation_finish",
            Step::RestartWorker => "restart_worker",
            Step::Liveness => "liveness",
            Step::RelayContainer => "relay_container",
            Step::RotationRequest => "rotation_request",
            Step::ClearExitSchedule => "clear_exit_schedule",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Program {
    Backup,
    Repair,
    RotationLeaving,
    RotationNew,
    RotationStaying,
    PostRotation,
    Regular,
}

const BACKUP_STEPS: &[Step] = &[
    Step::Teardown,
    Step::Directory,
    Step::Config,
    Step::Volume,
    Step::FirewallRules,
    Step::WorkerFromSnapshot,
    Step::RelayContainer,
];

const REPAIR_STEPS: &[Step] = &[
    Step::Teardown,
    Step::Volume,
    Step::FirewallRules,
    Step::WorkerFromSnapshot,
    Step::RelayContainer,
];

const LEAVING_STEPS: &[Step] = &[
    Step::FirewallRules,
    Step::WorkerContainer,
    Step::Liveness,
    Step::RelayContainer,
    Step::RotationRequest,
];

const NEW_NODE_STEPS: &[Step] = &[
    Step::Directory,
    Step::Dkg,
    Step::Config,
    Step::Volume,
    Step::FirewallRules,
    Step::WorkerAtRotationFinish,
    Step::RelayContainer,
];

const STAYING_STEPS: &[Step] = &[
    Step::FirewallRules,
    Step::WorkerContainer,
    Step::Liveness,
    Step::RelayContainer,
    Step::Dkg,
    Step::RotationRequest,
];

const POST_ROTATION_STEPS: &[Step] = &[
    Step::ClearFirewallRules,
    Step::ForceConfig,
    Step::FirewallRules,
    Step::RestartWorker,
    Step::ClearExitSchedule,
];

const REGULAR_STEPS: &[Step] = &[
    Step::Directory,
    Step::Dkg,
    Step::Config,
    Step::Volume,
    Step::FirewallRules,
    Step::WorkerContainer,
    Step::Liveness,
    Step::RelayContainer,
];

impl Program {
    /// `role` is only consulted for [`MonitorKind::Rotation`].
    pub fn select(kind: MonitorKind, role: Option<RotationRole>) -> Self {
        match kind {
            MonitorKind::Backup => Program::Backup,
            MonitorKind::Repair => Program::Repair,
            MonitorKind::Rotation => match role.unwrap_or(RotationRole::Staying) {
                RotationRole::Leaving => Program::RotationLeaving,
                RotationRole::New => Program::RotationNew,
                RotationRole::Staying => Program::RotationStaying,
            },
            MonitorKind::PostRotation => Program::PostRotation,
            MonitorKind::Regular => Program::Regular,
        }
    }

    pub fn steps(&self) -> &'static [Step] {
        match self {
            Program::Backup => BACKUP_STEPS,
            Program::Repair => REPAIR_STEPS,
            Program::RotationLeaving => LEAVING_STEPS,
            Program::RotationNew => NEW_NODE_STEPS,
            Program::RotationStaying => STAYING_STEPS,
            Program::PostRotation => POST_ROTATION_STEPS,
            Program::Regular => REGULAR_STEPS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_inputs() -> Vec<ClassifierInputs> {
        let mut out = Vec::new();
        for bits in 0u16..256 {
            let bit = |n: u16| bits & (1 << n) != 0;
            out.push(ClassifierInputs {
                first_run: bit(0),
                new_schain: bit(1),
                backup_run: bit(2),
                repair_mode: bit(3),
                exit_code_ok: bit(4),
                rotation_in_progress: bit(5),
                exit_scheduled: bit(6),
                exited_cleanly: bit(7),
            });
        }
        out
    }

    #[test]
    fn test_priority_order_holds_for_every_input() {
        for inputs in all_inputs() {
            let kind = classify(&inputs);
            let backup = inputs.first_run && !inputs.new_schain && inputs.backup_run;
            let repair = inputs.repair_mode || !inputs.exit_code_ok;
            let rotation = inputs.rotation_in_progress;
            let post = inputs.exit_scheduled && inputs.exited_cleanly;

            let expected = if backup {
                MonitorKind::Backup
            } else if repair {
                MonitorKind::Repair
            } else if rotation {
                MonitorKind::Rotation
            } else if post {
                MonitorKind::PostRotation
            } else {
                MonitorKind::Regular
            };
            assert_eq!(kind, expected, "inputs: {:?}", inputs);
        }
    }

    #[test]
    fn test_repair_wins_over_rotation() {
        let inputs = ClassifierInputs {
            repair_mode: true,
            exit_code_ok: true,
            rotation_in_progress: true,
            ..Default::default()
        };
        assert_eq!(classify(&inputs), MonitorKind::Repair);
    }

    #[test]
    fn test_bad_exit_code_triggers_repair() {
        let inputs = ClassifierInputs { exit_code_ok: false, ..Default::default() };
        assert_eq!(classify(&inputs), MonitorKind::Repair);
    }

    #[test]
    fn test_backup_requires_existing_schain() {
        let inputs = ClassifierInputs {
            first_run: true,
            new_schain: true,
            backup_run: true,
            exit_code_ok: true,
            ..Default::default()
        };
        assert_eq!(classify(&inputs), MonitorKind::Regular);
    }

    #[test]
    fn test_rotation_roles_are_exclusive() {
        let facts = RotationFacts {
            rotation_id: 1,
            leaving_node_id: 1,
            new_node_id: 2,
            finish_ts: 1000,
            in_progress: true,
        };
        assert_eq!(rotation_role(1, &facts, true), RotationRole::Leaving);
        assert_eq!(rotation_role(2, &facts, true), RotationRole::New);
        assert_eq!(rotation_role(3, &facts, true), RotationRole::Staying);
    }

    #[test]
    fn test_missing_config_makes_staying_node_new() {
        let facts = RotationFacts {
            rotation_id: 1,
            leaving_node_id: 1,
            new_node_id: 2,
            finish_ts: 1000,
            in_progress: true,
        };
        assert_eq!(rotation_role(3, &facts, false), RotationRole::New);
        // leaving takes precedence even without config
        assert_eq!(rotation_role(1, &facts, false), RotationRole::Leaving);
    }

    #[test]
    fn test_leaving_program_has_no_dkg() {
        let steps = Program::select(MonitorKind::Rotation, Some(RotationRole::Leaving)).steps();
        assert!(!steps.contains(&Step::Dkg));
        assert_eq!(steps.last(), Some(&Step::RotationRequest));
    }

    #[test]
    fn test_dependency_order_in_regular() {
        let steps = Program::Regular.steps();
        let pos = |s: Step| steps.iter().position(|x| *x == s).unwrap();
        assert!(pos(Step::Directory) < pos(Step::Config));
        assert!(pos(Step::Config) < pos(Step::Volume));
        assert!(pos(Step::Config) < pos(Step::FirewallRules));
        assert!(pos(Step::FirewallRules) < pos(Step::WorkerContainer));
        assert!(pos(Step::Dkg) < pos(Step::WorkerContainer));
    }
}

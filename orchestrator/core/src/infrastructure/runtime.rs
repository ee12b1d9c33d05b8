// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::runtime::{
    ContainerRuntime, ContainerSpec, ContainerState, ContainerStatus, RuntimeError,
};
use async_trait::async_trait;
use bollard::container::LogOutput;
use bollard::errors::Error as DockerError;
use bollard::models::{ContainerCreateBody, ContainerStateStatusEnum, HostConfig, VolumeCreateRequest};
use bollard::query_parameters::{
    CreateContainerOptionsBuilder, InspectContainerOptions, LogsOptionsBuilder,
    RemoveContainerOptionsBuilder, RemoveVolumeOptions, RestartContainerOptionsBuilder,
    StartContainerOptions,
};
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use tracing::{debug, info};

/// Seconds Docker waits for a container to stop before killing it.
const STOP_TIMEOUT_SECS: i32 = 300;

/// Label carrying the requested volume size in bytes.
pub const VOLUME_SIZE_LABEL: &str = "schain.volume.size";

pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(socket_path: Option<String>) -> Result<Self, RuntimeError> {
        // Connect to Docker daemon (custom socket or auto-detect)
        let docker = if let Some(path) = socket_path {
            Docker::connect_with_unix(&path, 120, bollard::API_DEFAULT_VERSION).map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker at {}: {}\n\n\
                     Ensure Docker is running and the socket path is correct.",
                    path, e
                ))
            })?
        } else {
            Docker::connect_with_local_defaults().map_err(|e| {
                RuntimeError::Unavailable(format!(
                    "Failed to connect to Docker: {}\n\n\
                     Common causes:\n\
                     - Docker daemon not running (check: docker ps)\n\
                     - Permission denied accessing Docker socket\n\n\
                     Try:\n\
                     - Start Docker: systemctl start docker\n\
                     - Check permissions: ls -la /var/run/docker.sock",
                    e
                ))
            })?
        };

        Ok(Self { docker })
    }

    /// Verify Docker daemon is accessible
    pub async fn healthcheck(&self) -> Result<(), RuntimeError> {
        self.docker
            .ping()
            .await
            .map_err(|e| RuntimeError::Unavailable(format!("Docker ping failed: {}", e)))?;
        Ok(())
    }
}

fn is_not_found(err: &DockerError) -> bool {
    matches!(err, DockerError::DockerResponseServerError { status_code: 404, .. })
}

fn map_status(status: Option<ContainerStateStatusEnum>) -> ContainerStatus {
    match status {
        Some(ContainerStateStatusEnum::CREATED) => ContainerStatus::Created,
        Some(ContainerStateStatusEnum::RUNNING) => ContainerStatus::Running,
        Some(ContainerStateStatusEnum::PAUSED) => ContainerStatus::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerStatus::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerStatus::Removing,
        Some(ContainerStateStatusEnum::EXITED) => ContainerStatus::Exited,
        _ => ContainerStatus::Dead,
    }
}

fn bind_string(source: &str, target: &str, read_only: bool) -> String {
    if read_only {
        format!("{}:{}:ro", source, target)
    } else {
        format!("{}:{}", source, target)
    }
}

/// Local volume labelled with its requested size.
fn volume_request(name: &str, size_bytes: u64) -> VolumeCreateRequest {
    let mut labels = HashMap::new();
    labels.insert(VOLUME_SIZE_LABEL.to_string(), size_bytes.to_string());
    VolumeCreateRequest {
        name: Some(name.to_string()),
        driver: Some("local".to_string()),
        labels: Some(labels),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn container_state(&self, name: &str) -> Result<Option<ContainerState>, RuntimeError> {
        match self.docker.inspect_container(name, None::<InspectContainerOptions>).await {
            Ok(inspect) => {
                let state = inspect.state.unwrap_or_default();
                Ok(Some(ContainerState {
                    status: map_status(state.status),
                    exit_code: state.exit_code.unwrap_or(0),
                }))
            }
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(RuntimeError::ContainerFailed(format!(
                "Failed to inspect container {}: {}",
                name, e
            ))),
        }
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<(), RuntimeError> {
        let binds: Vec<String> = spec
            .binds
            .iter()
            .map(|b| bind_string(&b.source, &b.target, b.read_only))
            .collect();

        let host_config = HostConfig {
            binds: Some(binds),
            network_mode: spec.network_mode.clone(),
            ..Default::default()
        };

        // Convert map to "KEY=VALUE" strings
        let mut env_vars: Vec<String> = spec.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        env_vars.sort();

        let body = ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: Some(spec.cmd.clone()),
            env: Some(env_vars),
            labels: Some(spec.labels.clone()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = CreateContainerOptionsBuilder::default().name(&spec.name).build();
        self.docker
            .create_container(Some(options), body)
            .await
            .map_err(|e| RuntimeError::ContainerFailed(format!("Failed to create {}: {}", spec.name, e)))?;

        self.docker
            .start_container(&spec.name, None::<StartContainerOptions>)
            .await
            .map_err(|e| RuntimeError::ContainerFailed(format!("Failed to start {}: {}", spec.name, e)))?;

        info!("Started container {} ({})", spec.name, spec.image);
        Ok(())
    }

    async fn restart_container(&self, name: &str) -> Result<(), RuntimeError> {
        let options = RestartContainerOptionsBuilder::default().t(STOP_TIMEOUT_SECS).build();
        self.docker
            .restart_container(name, Some(options))
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    RuntimeError::NotFound(name.to_string())
                } else {
                    RuntimeError::ContainerFailed(format!("Failed to restart {}: {}", name, e))
                }
            })?;
        info!("Restarted container {}", name);
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), RuntimeError> {
        let options = RemoveContainerOptionsBuilder::default().force(true).v(false).build();
        match self.docker.remove_container(name, Some(options)).await {
            Ok(()) => {
                info!("Removed container {}", name);
                Ok(())
            }
            Err(e) if is_not_found(&e) => {
                debug!("Container {} already absent", name);
                Ok(())
            }
            Err(e) => Err(RuntimeError::ContainerFailed(format!("Failed to remove {}: {}", name, e))),
        }
    }

    async fn volume_exists(&self, name: &str) -> Result<bool, RuntimeError> {
        match self.docker.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(RuntimeError::VolumeFailed(format!("Failed to inspect volume {}: {}", name, e))),
        }
    }

    async fn create_volume(&self, name: &str, size_bytes: u64) -> Result<(), RuntimeError> {
        self.docker
            .create_volume(volume_request(name, size_bytes))
            .await
            .map_err(|e| RuntimeError::VolumeFailed(format!("Failed to create volume {}: {}", name, e)))?;
        info!("Created volume {} ({} bytes)", name, size_bytes);
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), RuntimeError> {
        match self.docker.remove_volume(name, None::<RemoveVolumeOptions>).await {
            Ok(()) => {
                info!("Removed volume {}", name);
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(RuntimeError::VolumeFailed(format!("Failed to remove volume {}: {}", name, e))),
        }
    }

    async fn container_logs(&self, name: &str, tail: usize) -> Result<String, RuntimeError> {
        let options = LogsOptionsBuilder::default()
            .stdout(true)
            .stderr(true)
            .tail(&tail.to_string())
            .build();
        let mut stream = self.docker.logs(name, Some(options));

        let mut output = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message }) | Ok(LogOutput::StdErr { message }) => {
                    output.push_str(&String::from_utf8_lossy(&message));
                }
                Ok(_) => {}
                Err(e) if is_not_found(&e) => return Err(RuntimeError::NotFound(name.to_string())),
                Err(e) => {
                    return Err(RuntimeError::ContainerFailed(format!(
                        "Failed to read logs of {}: {}",
                        name, e
                    )))
                }
            }
        }
        Ok(output)
    }
}

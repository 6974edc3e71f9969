// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Restarts libvirtd through systemd and waits until it serves requests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use crate::domain::host::{DaemonController, HostError};
use crate::domain::test_config::DaemonConfig;
use crate::infrastructure::process::run_checked;
use crate::infrastructure::virsh::VirshClient;

pub struct SystemdDaemonController {
    systemctl: String,
    service: String,
    virsh: Arc<VirshClient>,
    restart_timeout: Duration,
    poll_interval: Duration,
}

impl SystemdDaemonController {
    pub fn new(config: &DaemonConfig, virsh: Arc<VirshClient>) -> Self {
        Self {
            systemctl: config.systemctl.clone(),
            service: config.service.clone(),
            virsh,
            restart_timeout: Duration::from_secs(config.restart_timeout_seconds),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }
}

#[async_trait]
impl DaemonController for SystemdDaemonController {
    async fn restart(&self) -> Result<(), HostError> {
        info!("Restarting {}", self.service);
        run_checked(
            &self.systemctl,
            &["restart".to_string(), self.service.clone()],
            self.restart_timeout,
        )
        .await?;

        let deadline = Instant::now() + self.restart_timeout;
        loop {
            match self.virsh.ping().await {
                Ok(()) => {
                    info!("{} is responsive again", self.service);
                    return Ok(());
                }
                Err(e) if Instant::now() < deadline => {
                    debug!("{} not ready yet: {}", self.service, e);
                    sleep(self.poll_interval).await;
                }
                Err(_) => {
                    return Err(HostError::Timeout {
                        command: format!("waiting for {} to answer", self.service),
                        seconds: self.restart_timeout.as_secs(),
                    });
                }
            }
        }
    }
}

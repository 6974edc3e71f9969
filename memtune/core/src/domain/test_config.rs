// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Test Configuration Types
//
// Defines the manifest that drives a memtune test run:
// - Kubernetes-style envelope (apiVersion/kind/metadata/spec)
// - Domain under test and how to reach libvirt
// - Daemon restart settings
// - Single-shot scenario parameters
// - Step sweep offsets (all values in KiB)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::limit::{LimitKind, LimitValue};

pub const API_VERSION: &str = "memtune/v1";
pub const KIND: &str = "MemtuneTest";

/// Top-level test manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemtuneTestManifest {
    /// API version (must be "memtune/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "MemtuneTest")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: MemtuneTestSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable test name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemtuneTestSpec {
    /// libvirt domain name
    pub domain: String,

    #[serde(default)]
    pub virsh: VirshConfig,

    #[serde(default)]
    pub daemon: DaemonConfig,

    #[serde(default)]
    pub scenario: ScenarioConfig,

    #[serde(default)]
    pub sweep: SweepConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirshConfig {
    /// virsh executable, resolved through PATH when not absolute
    #[serde(default = "default_virsh_binary")]
    pub binary: String,

    /// Connection URI passed as `-c` (default: virsh's own default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,

    /// Timeout applied to every virsh invocation
    #[serde(default = "default_command_timeout")]
    pub timeout_seconds: u64,

    /// Directory holding `<domain>.pid` files written by the qemu driver
    #[serde(default = "default_pid_dir")]
    pub pid_dir: PathBuf,
}

impl Default for VirshConfig {
    fn default() -> Self {
        Self {
            binary: default_virsh_binary(),
            uri: None,
            timeout_seconds: default_command_timeout(),
            pid_dir: default_pid_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// systemctl executable used to restart the unit
    #[serde(default = "default_systemctl")]
    pub systemctl: String,

    /// systemd unit restarted for persistence checks
    #[serde(default = "default_daemon_service")]
    pub service: String,

    /// How long to wait for the daemon to answer after a restart
    #[serde(default = "default_restart_timeout")]
    pub restart_timeout_seconds: u64,

    /// Delay between readiness checks
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            systemctl: default_systemctl(),
            service: default_daemon_service(),
            restart_timeout_seconds: default_restart_timeout(),
            poll_interval_ms: default_poll_interval(),
        }
    }
}

/// Single-shot scenario. Limit values are KiB and are passed to the set
/// command exactly as written; non-positive values mean "unlimited" when the
/// expectation is built in single-limit mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_limit: Option<LimitValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soft_limit: Option<LimitValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap_hard_limit: Option<LimitValue>,

    /// Set all three limits in one command
    #[serde(default)]
    pub set_in_one_command: bool,

    /// Restart the daemon after verification and verify again
    #[serde(default)]
    pub restart_daemon: bool,

    /// The set command is expected to fail
    #[serde(default)]
    pub expect_error: bool,

    /// Regular expression the failure message must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_pattern: Option<String>,
}

impl ScenarioConfig {
    pub fn limit(&self, kind: LimitKind) -> Option<LimitValue> {
        match kind {
            LimitKind::HardLimit => self.hard_limit,
            LimitKind::SoftLimit => self.soft_limit,
            LimitKind::SwapHardLimit => self.swap_hard_limit,
        }
    }

    /// Restart checks need all three limits, so a restart forces combined mode.
    pub fn combined(&self) -> bool {
        self.set_in_one_command || self.restart_daemon
    }

    /// First configured limit in hard, soft, swap-hard order.
    pub fn first_configured(&self) -> Option<(LimitKind, LimitValue)> {
        LimitKind::ALL
            .iter()
            .find_map(|&kind| self.limit(kind).map(|value| (kind, value)))
    }
}

/// Step sweep offsets, all KiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Distance below MemTotal at which the sweep starts
    #[serde(default = "default_base_mem")]
    pub base_mem: LimitValue,

    /// Hard limit offset below the working value; also the step size
    #[serde(default = "default_hard_base_mem")]
    pub hard_base_mem: LimitValue,

    /// Soft limit offset below the working value
    #[serde(default = "default_soft_base_mem")]
    pub soft_base_mem: LimitValue,

    /// Starting value when MemTotal is below `base_mem`
    #[serde(default = "default_min_mem")]
    pub min_mem: LimitValue,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_mem: default_base_mem(),
            hard_base_mem: default_hard_base_mem(),
            soft_base_mem: default_soft_base_mem(),
            min_mem: default_min_mem(),
        }
    }
}

// Default value functions
fn default_virsh_binary() -> String {
    "virsh".to_string()
}

fn default_command_timeout() -> u64 {
    60
}

fn default_pid_dir() -> PathBuf {
    PathBuf::from("/var/run/libvirt/qemu")
}

fn default_systemctl() -> String {
    "systemctl".to_string()
}

fn default_daemon_service() -> String {
    "libvirtd".to_string()
}

fn default_restart_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    500
}

fn default_domain() -> String {
    "avocado-vt-vm1".to_string()
}

// 1 GiB below MemTotal, 256 MiB floor, 100 KiB steps
fn default_base_mem() -> LimitValue {
    1_048_576
}

fn default_hard_base_mem() -> LimitValue {
    100
}

fn default_soft_base_mem() -> LimitValue {
    50
}

fn default_min_mem() -> LimitValue {
    262_144
}

impl Default for MemtuneTestSpec {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            virsh: VirshConfig::default(),
            daemon: DaemonConfig::default(),
            scenario: ScenarioConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl Default for MemtuneTestManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: format!("memtune-{}", hostname),
                description: None,
            },
            spec: MemtuneTestSpec::default(),
        }
    }
}

impl MemtuneTestManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. MEMTUNE_CONFIG_PATH environment variable
    /// 2. ./memtune-config.yaml (working directory)
    /// 3. ~/.memtune/config.yaml (user home)
    /// 4. /etc/memtune/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("MEMTUNE_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./memtune-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".memtune").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/memtune/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // Explicit CLI path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(domain) = std::env::var("MEMTUNE_DOMAIN") {
            if !domain.is_empty() {
                tracing::info!("Environment override: MEMTUNE_DOMAIN={}", domain);
                self.spec.domain = domain;
            }
        }

        if let Ok(uri) = std::env::var("MEMTUNE_LIBVIRT_URI") {
            if !uri.is_empty() {
                tracing::info!("Environment override: MEMTUNE_LIBVIRT_URI={}", uri);
                self.spec.virsh.uri = Some(uri);
            }
        }

        if let Ok(val) = std::env::var("MEMTUNE_RESTART_DAEMON") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: MEMTUNE_RESTART_DAEMON=true");
                    self.spec.scenario.restart_daemon = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: MEMTUNE_RESTART_DAEMON=false");
                    self.spec.scenario.restart_daemon = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for MEMTUNE_RESTART_DAEMON: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        if self.spec.domain.is_empty() {
            anyhow::bail!("spec.domain cannot be empty");
        }

        if self.spec.virsh.binary.is_empty() {
            anyhow::bail!("spec.virsh.binary cannot be empty");
        }

        if self.spec.daemon.systemctl.is_empty() {
            anyhow::bail!("spec.daemon.systemctl cannot be empty");
        }

        if self.spec.virsh.timeout_seconds == 0 {
            anyhow::bail!("spec.virsh.timeout_seconds must be positive");
        }

        if self.spec.sweep.enabled {
            self.validate_sweep()
        } else {
            self.validate_scenario()
        }
    }

    fn validate_sweep(&self) -> anyhow::Result<()> {
        let sweep = &self.spec.sweep;

        // The hard offset is the step size; a non-positive step never terminates
        if sweep.hard_base_mem <= 0 {
            anyhow::bail!(
                "spec.sweep.hard_base_mem must be positive, got {}",
                sweep.hard_base_mem
            );
        }

        if sweep.base_mem < 0 {
            anyhow::bail!("spec.sweep.base_mem cannot be negative");
        }

        if sweep.soft_base_mem < 0 {
            anyhow::bail!("spec.sweep.soft_base_mem cannot be negative");
        }

        if sweep.min_mem <= 0 {
            anyhow::bail!("spec.sweep.min_mem must be positive");
        }

        Ok(())
    }

    fn validate_scenario(&self) -> anyhow::Result<()> {
        let scenario = &self.spec.scenario;

        if scenario.first_configured().is_none() {
            anyhow::bail!("spec.scenario must set at least one of hard_limit, soft_limit, swap_hard_limit");
        }

        if scenario.combined() {
            for kind in LimitKind::ALL {
                if scenario.limit(kind).is_none() {
                    anyhow::bail!(
                        "spec.scenario.{} is required when all limits are set in one command",
                        kind.query_key()
                    );
                }
            }
        }

        if scenario.expect_error
            && scenario
                .error_pattern
                .as_deref()
                .map_or(true, |p| p.trim().is_empty())
        {
            anyhow::bail!("spec.scenario.error_pattern is required when expect_error is set");
        }

        Ok(())
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! `virsh`-backed implementations of the memtune command, the domain XML
//! source and the domain handle.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::domain::host::{
    ApplyScope, CommandOutcome, DomainConfigSource, DomainHandle, HostError, MemtuneCommand,
    MemtuneDocument,
};
use crate::domain::limit::{LimitKind, LimitValue, UNLIMITED};
use crate::domain::test_config::VirshConfig;
use crate::infrastructure::process::{run_checked, run_command};

pub struct VirshClient {
    binary: String,
    uri: Option<String>,
    timeout: Duration,
}

impl VirshClient {
    pub fn new(binary: impl Into<String>, uri: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            uri,
            timeout,
        }
    }

    pub fn from_config(config: &VirshConfig) -> Self {
        Self::new(
            config.binary.clone(),
            config.uri.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    fn args<I, S>(&self, rest: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = Vec::new();
        if let Some(uri) = &self.uri {
            args.push("-c".to_string());
            args.push(uri.clone());
        }
        args.extend(rest.into_iter().map(Into::into));
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<CommandOutcome, HostError> {
        run_command(&self.binary, &args, self.timeout).await
    }

    async fn run_checked(&self, args: Vec<String>) -> Result<String, HostError> {
        run_checked(&self.binary, &args, self.timeout).await
    }

    /// Succeeds once libvirt answers a trivial request.
    pub async fn ping(&self) -> Result<(), HostError> {
        self.run_checked(self.args(["version"])).await.map(|_| ())
    }

    pub async fn dumpxml(&self, domain: &str) -> Result<String, HostError> {
        self.run_checked(self.args(["dumpxml", domain])).await
    }

    /// Current domain state, or `None` when virsh cannot report one (the
    /// domain is undefined or its qemu process is gone).
    pub async fn domstate(&self, domain: &str) -> Result<Option<String>, HostError> {
        let outcome = self.run(self.args(["domstate", domain])).await?;
        if !outcome.success {
            debug!("domstate {} failed: {}", domain, outcome.message());
            return Ok(None);
        }
        Ok(Some(outcome.stdout.trim().to_string()))
    }

    pub fn domain(self: &Arc<Self>, name: impl Into<String>, pid_dir: impl Into<PathBuf>) -> VirshDomain {
        VirshDomain {
            virsh: self.clone(),
            name: name.into(),
            pid_dir: pid_dir.into(),
        }
    }
}

#[async_trait]
impl MemtuneCommand for VirshClient {
    async fn get_limit(&self, domain: &str, kind: LimitKind) -> Result<LimitValue, HostError> {
        let out = self.run_checked(self.args(["memtune", domain])).await?;
        parse_memtune_value(&out, kind)
    }

    async fn set_limits(
        &self,
        domain: &str,
        limits: &[(LimitKind, LimitValue)],
        scope: ApplyScope,
    ) -> Result<CommandOutcome, HostError> {
        let mut rest = vec!["memtune".to_string(), domain.to_string()];
        for (kind, value) in limits {
            rest.push(kind.option_flag());
            rest.push(value.to_string());
        }
        rest.push(scope.flag().to_string());
        self.run(self.args(rest)).await
    }

    async fn has_command(&self, command: &str) -> Result<bool, HostError> {
        Ok(self.run(self.args(["help", command])).await?.success)
    }

    async fn has_option(&self, command: &str, option: &str) -> Result<bool, HostError> {
        let outcome = self.run(self.args(["help", command])).await?;
        Ok(outcome.success && outcome.stdout.contains(option))
    }
}

#[async_trait]
impl DomainConfigSource for VirshClient {
    async fn fetch(&self, domain: &str) -> Result<MemtuneDocument, HostError> {
        let xml = self.dumpxml(domain).await?;
        parse_memtune_xml(&xml)
    }
}

/// A libvirt domain reached through `virsh`.
pub struct VirshDomain {
    virsh: Arc<VirshClient>,
    name: String,
    pid_dir: PathBuf,
}

#[async_trait]
impl DomainHandle for VirshDomain {
    fn name(&self) -> &str {
        &self.name
    }

    async fn is_alive(&self) -> Result<bool, HostError> {
        let state = self.virsh.domstate(&self.name).await?;
        Ok(state.is_some_and(|s| state_is_alive(&s)))
    }

    async fn pid(&self) -> Result<u32, HostError> {
        let path = self.pid_dir.join(format!("{}.pid", self.name));
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| HostError::Io {
                path: path.clone(),
                source,
            })?;
        content.trim().parse().map_err(|_| HostError::Parse {
            what: path.display().to_string(),
            detail: format!("not a pid: '{}'", content.trim()),
        })
    }
}

/// Any state other than shut off or crashed still has a qemu process.
pub fn state_is_alive(state: &str) -> bool {
    !matches!(state.trim(), "shut off" | "crashed" | "")
}

/// Extract one limit from `virsh memtune <domain>` output:
///
/// ```text
/// hard_limit     : 1048576
/// soft_limit     : unlimited
/// swap_hard_limit: unlimited
/// ```
pub fn parse_memtune_value(output: &str, kind: LimitKind) -> Result<LimitValue, HostError> {
    let key = kind.query_key();
    let raw = output
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim() == key)
        .map(|(_, v)| v.trim())
        .ok_or_else(|| HostError::Parse {
            what: "virsh memtune".to_string(),
            detail: format!("no '{}' in output", key),
        })?;

    if raw.eq_ignore_ascii_case("unlimited") {
        return Ok(UNLIMITED);
    }
    raw.parse().map_err(|_| HostError::Parse {
        what: "virsh memtune".to_string(),
        detail: format!("{} is '{}'", key, raw),
    })
}

/// Extract `<memtune>` limits from a domain XML, converted to KiB.
pub fn parse_memtune_xml(xml: &str) -> Result<MemtuneDocument, HostError> {
    let mut document = MemtuneDocument::default();

    let block = Regex::new(r"(?s)<memtune\s*>(.*?)</memtune\s*>").map_err(regex_error)?;
    let Some(section) = block.captures(xml).and_then(|c| c.get(1)) else {
        return Ok(document);
    };

    for kind in LimitKind::ALL {
        let tag = kind.xml_element();
        let element = Regex::new(&format!(
            r#"<{tag}(?:\s+unit\s*=\s*['"]([A-Za-z]+)['"])?\s*>\s*(\d+)\s*</{tag}\s*>"#
        ))
        .map_err(regex_error)?;

        if let Some(caps) = element.captures(section.as_str()) {
            let unit = caps.get(1).map_or("KiB", |m| m.as_str());
            let value: u128 = caps[2].parse().map_err(|_| HostError::Parse {
                what: "domain XML".to_string(),
                detail: format!("<{}> value '{}'", tag, &caps[2]),
            })?;
            document.set(kind, Some(to_kib(value, unit)?));
        }
    }

    Ok(document)
}

/// libvirt scaled integer units, converted to KiB.
fn to_kib(value: u128, unit: &str) -> Result<LimitValue, HostError> {
    let multiplier: u128 = match unit {
        "b" | "bytes" => 1,
        "KB" => 1_000,
        "k" | "K" | "KiB" => 1 << 10,
        "MB" => 1_000_000,
        "M" | "MiB" => 1 << 20,
        "GB" => 1_000_000_000,
        "G" | "GiB" => 1 << 30,
        "TB" => 1_000_000_000_000,
        "T" | "TiB" => 1 << 40,
        other => {
            return Err(HostError::Parse {
                what: "domain XML".to_string(),
                detail: format!("unknown unit '{}'", other),
            })
        }
    };
    let kib = value.saturating_mul(multiplier) / 1024;
    Ok(LimitValue::try_from(kib).unwrap_or(LimitValue::MAX))
}

fn regex_error(e: regex::Error) -> HostError {
    HostError::Parse {
        what: "regex".to_string(),
        detail: e.to_string(),
    }
}

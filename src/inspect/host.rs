//! Inspector backed by the running host and the build's lockfile.

use std::borrow::Cow;
use std::env;
use std::path::PathBuf;

use serde::Deserialize;

use super::{group_packages, EnvironmentInspector, InstalledPackage, SystemInfo};
use crate::{AppError, Result};

/// `Cargo.lock` captured by the build script; empty when none existed.
const EMBEDDED_LOCKFILE: &str = include_str!(concat!(env!("OUT_DIR"), "/Cargo.lock.embedded"));

#[derive(Debug, Deserialize)]
struct Lockfile {
    #[serde(default)]
    package: Vec<LockedPackage>,
}

#[derive(Debug, Deserialize)]
struct LockedPackage {
    name: String,
    version: String,
}

/// Parse a `Cargo.lock` document into grouped packages.
///
/// # Errors
///
/// Returns `AppError::Config` if the document is not valid lockfile TOML.
pub fn parse_lockfile(raw: &str) -> Result<Vec<InstalledPackage>> {
    let lock: Lockfile = toml::from_str(raw)
        .map_err(|err| AppError::config(format!("unreadable lockfile: {err}")))?;
    Ok(group_packages(
        lock.package.into_iter().map(|p| (p.name, p.version)),
    ))
}

/// Reads facts from the current process and host.
#[derive(Debug, Clone)]
pub struct HostInspector {
    lockfile: Cow<'static, str>,
}

impl Default for HostInspector {
    fn default() -> Self {
        Self {
            lockfile: Cow::Borrowed(EMBEDDED_LOCKFILE),
        }
    }
}

impl HostInspector {
    /// Inspector that lists packages from `lockfile` instead of the
    /// embedded build lockfile.
    pub fn with_lockfile(lockfile: impl Into<String>) -> Self {
        Self {
            lockfile: Cow::Owned(lockfile.into()),
        }
    }
}

impl EnvironmentInspector for HostInspector {
    #[cfg(unix)]
    fn system_info(&self) -> Result<SystemInfo> {
        let uts = nix::sys::utsname::uname()
            .map_err(|err| AppError::io(format!("uname failed: {err}")))?;
        Ok(SystemInfo {
            sysname: uts.sysname().to_string_lossy().into_owned(),
            nodename: uts.nodename().to_string_lossy().into_owned(),
            release: uts.release().to_string_lossy().into_owned(),
            version: uts.version().to_string_lossy().into_owned(),
            machine: uts.machine().to_string_lossy().into_owned(),
        })
    }

    #[cfg(not(unix))]
    fn system_info(&self) -> Result<SystemInfo> {
        let nodename = env::var("COMPUTERNAME")
            .or_else(|_| env::var("HOSTNAME"))
            .unwrap_or_else(|_| "unknown".to_owned());
        Ok(SystemInfo {
            sysname: env::consts::OS.to_owned(),
            nodename,
            release: "unknown".to_owned(),
            version: env::consts::FAMILY.to_owned(),
            machine: env::consts::ARCH.to_owned(),
        })
    }

    fn installed_packages(&self) -> Result<Vec<InstalledPackage>> {
        parse_lockfile(&self.lockfile)
    }

    fn search_paths(&self) -> Result<Vec<PathBuf>> {
        let raw = env::var_os("PATH").ok_or_else(|| AppError::not_found("PATH is not set"))?;
        Ok(env::split_paths(&raw).collect())
    }
}

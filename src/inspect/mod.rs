//! Host and build environment introspection for crash dumps.
//!
//! Provides the [`EnvironmentInspector`] trait and associated types. The
//! primary implementation, [`HostInspector`], reads `uname`, the `Cargo.lock`
//! embedded at build time, and the executable search path.

pub mod host;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Operating system and host identification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SystemInfo {
    /// Kernel name, e.g. `Linux`.
    pub sysname: String,
    /// Network host name.
    pub nodename: String,
    /// Kernel release.
    pub release: String,
    /// Kernel build description.
    pub version: String,
    /// Hardware architecture.
    pub machine: String,
}

/// A dependency compiled into the tool together with every resolved version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Package name.
    pub name: String,
    /// Resolved versions in ascending order.
    pub versions: Vec<String>,
}

/// Source of environment facts. Each method fails independently.
pub trait EnvironmentInspector {
    /// Identify the operating system and host.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform query fails.
    fn system_info(&self) -> Result<SystemInfo>;

    /// List dependency packages, names ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the package manifest cannot be read or parsed.
    fn installed_packages(&self) -> Result<Vec<InstalledPackage>>;

    /// List module search path entries in resolution order.
    ///
    /// # Errors
    ///
    /// Returns an error if the search path is unavailable.
    fn search_paths(&self) -> Result<Vec<PathBuf>>;
}

/// Snapshot of everything an inspector can report, for the `inspect` command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EnvironmentReport {
    /// Host identification.
    pub system: SystemInfo,
    /// Compiled-in packages.
    pub packages: Vec<InstalledPackage>,
    /// Search path entries.
    pub search_paths: Vec<PathBuf>,
}

impl EnvironmentReport {
    /// Collect every section, failing on the first unavailable source.
    ///
    /// # Errors
    ///
    /// Propagates the first inspector error.
    pub fn collect(inspector: &dyn EnvironmentInspector) -> Result<Self> {
        Ok(Self {
            system: inspector.system_info()?,
            packages: inspector.installed_packages()?,
            search_paths: inspector.search_paths()?,
        })
    }
}

/// Group `(name, version)` pairs into packages sorted by name, each with
/// deduplicated versions in ascending order.
#[must_use]
pub fn group_packages<I>(pairs: I) -> Vec<InstalledPackage>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, version) in pairs {
        grouped.entry(name).or_default().push(version);
    }
    grouped
        .into_iter()
        .map(|(name, mut versions)| {
            versions.sort_by(|a, b| compare_versions(a, b));
            versions.dedup();
            InstalledPackage { name, versions }
        })
        .collect()
}

/// Order version strings component-wise, numerically where both sides are
/// numeric (`0.9.0 < 0.10.0`).
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-', '+']);
    let mut right = b.split(['.', '-', '+']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

pub use host::HostInspector;

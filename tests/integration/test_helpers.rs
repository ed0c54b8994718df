//! Shared helpers for watchdog and reporter integration tests.
//!
//! Builds reporters that write diagnostics to an in-memory buffer and crash
//! logs into a temporary directory, with a scripted environment inspector.

use std::path::{Path, PathBuf};

use toolbox_watchdog::inspect::{EnvironmentInspector, InstalledPackage, SystemInfo};
use toolbox_watchdog::{AppError, Reporter, WatchdogConfig};

/// Inspector returning canned data; the package source can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInspector {
    pub packages_error: Option<String>,
}

impl EnvironmentInspector for ScriptedInspector {
    fn system_info(&self) -> toolbox_watchdog::Result<SystemInfo> {
        Ok(SystemInfo {
            sysname: "Linux".into(),
            nodename: "ci-runner".into(),
            release: "6.8.0".into(),
            version: "#1".into(),
            machine: "aarch64".into(),
        })
    }

    fn installed_packages(&self) -> toolbox_watchdog::Result<Vec<InstalledPackage>> {
        match &self.packages_error {
            Some(reason) => Err(AppError::io(reason.clone())),
            None => Ok(vec![InstalledPackage {
                name: "serde".into(),
                versions: vec!["1.0.210".into()],
            }]),
        }
    }

    fn search_paths(&self) -> toolbox_watchdog::Result<Vec<PathBuf>> {
        Ok(vec![PathBuf::from("/opt/toolbox/bin")])
    }
}

/// Configuration writing the crash log to `<dir>/crash.log`.
pub fn test_config(dir: &Path) -> WatchdogConfig {
    WatchdogConfig {
        crash_log: dir.join("crash.log"),
        version: "0.3.0-test".into(),
        ..WatchdogConfig::default()
    }
}

/// Reporter capturing diagnostics in memory.
pub fn buffer_reporter(dir: &Path, inspector: ScriptedInspector) -> Reporter<Vec<u8>> {
    Reporter::new(Vec::new(), &test_config(dir)).with_inspector(inspector)
}

/// Decode every pretty-printed record in a diagnostic buffer.
pub fn records(buffer: &[u8]) -> Vec<serde_json::Value> {
    serde_json::Deserializer::from_slice(buffer)
        .into_iter::<serde_json::Value>()
        .collect::<Result<_, _>>()
        .expect("diagnostic channel holds JSON objects")
}

//! Directory bootstrap and first-run config templating.
//!
//! Grounded on the original's `main.go` `dirs` map (certificate/codefiles/
//! logs created under the working directory if absent) and `InitConfig`'s
//! "no config file → write one and continue" behavior, adapted to a
//! non-interactive template write since a judging-core daemon started by a
//! process supervisor should not block on stdin (recorded in DESIGN.md).

use std::path::{Path, PathBuf};

use judgecore_core::{AppConfig, Result};

/// `certificate/`, `codefiles/`, `config/`, `logs/` under `base`, created if
/// absent.
pub struct Directories {
    pub certificate: PathBuf,
    pub codefiles: PathBuf,
    pub config: PathBuf,
    pub logs: PathBuf,
}

impl Directories {
    pub fn ensure_under(base: &Path) -> Result<Self> {
        let certificate = base.join("certificate");
        let codefiles = base.join("codefiles");
        let config = base.join("config");
        let logs = base.join("logs");

        for dir in [&certificate, &codefiles, &config, &logs] {
            std::fs::create_dir_all(dir)?;
        }

        Ok(Self {
            certificate,
            codefiles,
            config,
            logs,
        })
    }
}

/// Write `config/default.toml` with placeholder values if no config file
/// is present yet, then load the layered configuration.
pub fn load_or_bootstrap(config_dir: &Path) -> Result<AppConfig> {
    let default_path = config_dir.join("default.toml");
    if !default_path.exists() {
        tracing::info!(path = %default_path.display(), "no configuration found, writing template");
        AppConfig::write_template(&default_path)?;
    }
    AppConfig::load()
}

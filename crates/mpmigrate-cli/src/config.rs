//! Configuration management for mpmigrate
//!
//! Settings are resolved from, lowest to highest priority:
//!
//! 1. Built-in defaults
//! 2. `--config FILE`, or `<config dir>/mpmigrate/config.toml` when present
//! 3. `MPMIGRATE_*` environment variables
//! 4. Command-line flags
//!
//! Levels 3 and 4 both arrive through clap (`env` attributes) and are applied
//! with [`MigrateConfig::apply`].

use crate::error::{CliError, Result};
use crate::markers::MarkerNames;
use crate::membership::MatchMode;
use crate::queue::TransferMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Directory name under the user config directory
pub const APP_DIR: &str = "mpmigrate";

/// Config file name inside [`APP_DIR`]
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default lock file name
pub const LOCK_FILE_NAME: &str = "mpmigrate.pid";

/// Settings shared by every delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSettings {
    pub markers: MarkerNames,
    pub match_mode: MatchMode,
    pub transfer_mode: TransferMode,
    pub prune_ingested: bool,
}

/// Resolved migration configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MigrateConfig {
    /// Root of the coordinator tree (`<work_root>/<series>/<item>/`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_root: Option<PathBuf>,

    /// Membership list used for routing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_file: Option<PathBuf>,

    /// Queue for items on the membership list
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_in_list: Option<PathBuf>,

    /// Queue for every other item
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dest_not_in_list: Option<PathBuf>,

    /// Process lock file
    pub lock_file: PathBuf,

    pub match_mode: MatchMode,

    pub transfer_mode: TransferMode,

    /// Delete item contents except markers after delivery
    pub prune_ingested: bool,

    /// Marker file names
    pub markers: MarkerNames,
}

impl Default for MigrateConfig {
    fn default() -> Self {
        Self {
            work_root: None,
            membership_file: None,
            dest_in_list: None,
            dest_not_in_list: None,
            lock_file: default_lock_file(),
            match_mode: MatchMode::default(),
            transfer_mode: TransferMode::default(),
            prune_ingested: false,
            markers: MarkerNames::default(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub work_root: Option<PathBuf>,
    pub membership_file: Option<PathBuf>,
    pub dest_in_list: Option<PathBuf>,
    pub dest_not_in_list: Option<PathBuf>,
    pub lock_file: Option<PathBuf>,
    pub match_mode: Option<MatchMode>,
    pub transfer_mode: Option<TransferMode>,
    pub prune_ingested: bool,
}

/// `<runtime dir or temp dir>/mpmigrate.pid`
pub fn default_lock_file() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(LOCK_FILE_NAME)
}

/// `<config dir>/mpmigrate/config.toml`, if a config directory is known
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
}

impl MigrateConfig {
    /// Load the configuration file.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// when a file is there, otherwise built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => {
                if !path.is_file() {
                    return Err(CliError::invalid_path(
                        "config file",
                        path,
                        "does not exist or is not a file",
                    ));
                }
                Self::from_file(path)
            },
            None => match default_config_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    /// Apply command-line and environment values on top of the file values
    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.work_root {
            self.work_root = Some(v);
        }
        if let Some(v) = overrides.membership_file {
            self.membership_file = Some(v);
        }
        if let Some(v) = overrides.dest_in_list {
            self.dest_in_list = Some(v);
        }
        if let Some(v) = overrides.dest_not_in_list {
            self.dest_not_in_list = Some(v);
        }
        if let Some(v) = overrides.lock_file {
            self.lock_file = v;
        }
        if let Some(v) = overrides.match_mode {
            self.match_mode = v;
        }
        if let Some(v) = overrides.transfer_mode {
            self.transfer_mode = v;
        }
        if overrides.prune_ingested {
            self.prune_ingested = true;
        }
        self
    }

    pub fn transfer_settings(&self) -> TransferSettings {
        TransferSettings {
            markers: self.markers.clone(),
            match_mode: self.match_mode,
            transfer_mode: self.transfer_mode,
            prune_ingested: self.prune_ingested,
        }
    }

    pub fn work_root(&self) -> Result<&Path> {
        required(&self.work_root, "work_root", "--work-root", "MPMIGRATE_WORK_ROOT")
    }

    pub fn membership_file(&self) -> Result<&Path> {
        required(
            &self.membership_file,
            "membership_file",
            "--membership-file",
            "MPMIGRATE_MEMBERSHIP_FILE",
        )
    }

    pub fn dest_in_list(&self) -> Result<&Path> {
        required(
            &self.dest_in_list,
            "dest_in_list",
            "--dest-in-list",
            "MPMIGRATE_DEST_IN_LIST",
        )
    }

    pub fn dest_not_in_list(&self) -> Result<&Path> {
        required(
            &self.dest_not_in_list,
            "dest_not_in_list",
            "--dest-not-in-list",
            "MPMIGRATE_DEST_NOT_IN_LIST",
        )
    }

    /// Check everything a migration run needs before it starts
    pub fn validate_for_migration(&self) -> Result<()> {
        require_dir("work root", self.work_root()?)?;
        require_file("membership file", self.membership_file()?)?;
        require_dir("in-membership-list queue", self.dest_in_list()?)?;
        require_dir("not-in-membership-list queue", self.dest_not_in_list()?)?;
        self.validate_markers()
    }

    /// Marker names must be distinct plain file names
    pub fn validate_markers(&self) -> Result<()> {
        let names = [&self.markers.ingested, &self.markers.failed];
        for name in names {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(CliError::config(format!(
                    "marker name '{name}' is not a plain file name"
                )));
            }
        }
        if self.markers.ingested == self.markers.failed {
            return Err(CliError::config("the ingested and failed markers share a name"));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn required<'a>(
    value: &'a Option<PathBuf>,
    key: &str,
    flag: &str,
    env: &str,
) -> Result<&'a Path> {
    value.as_deref().ok_or_else(|| {
        CliError::config(format!(
            "'{key}' is not set; pass {flag}, set {env} or add it to the config file"
        ))
    })
}

/// Fail unless `path` is an existing directory
pub fn require_dir(what: &'static str, path: &Path) -> Result<()> {
    if !path.exists() {
        Err(CliError::invalid_path(what, path, "does not exist"))
    } else if !path.is_dir() {
        Err(CliError::invalid_path(what, path, "is not a directory"))
    } else {
        Ok(())
    }
}

/// Fail unless `path` is an existing regular file
pub fn require_file(what: &'static str, path: &Path) -> Result<()> {
    if !path.exists() {
        Err(CliError::invalid_path(what, path, "does not exist"))
    } else if !path.is_file() {
        Err(CliError::invalid_path(what, path, "is not a file"))
    } else {
        Ok(())
    }
}

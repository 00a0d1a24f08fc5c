//! `mpmigrate config` command implementation
//!
//! Shows the resolved configuration.

use crate::config::{default_config_path, MigrateConfig};
use crate::error::Result;
use crate::SettingsArgs;
use std::path::Path;

/// Render the resolved configuration as TOML, headed by a comment naming its
/// source file
pub fn render(config_path: Option<&Path>, settings: &SettingsArgs) -> Result<String> {
    let config = MigrateConfig::load(config_path)?.apply(settings.overrides(false));

    let source = match config_path {
        Some(path) => path.display().to_string(),
        None => match default_config_path() {
            Some(path) if path.is_file() => path.display().to_string(),
            _ => "built-in defaults".to_string(),
        },
    };
    Ok(format!(
        "# mpmigrate configuration (file: {source})\n{}",
        config.to_toml()?
    ))
}

/// Show all configuration
pub fn show(config_path: Option<&Path>, settings: &SettingsArgs) -> Result<()> {
    print!("{}", render(config_path, settings)?);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_render_applies_overrides() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "work_root = \"/from/file\"\nprune_ingested = true\n").unwrap();

        let settings = SettingsArgs {
            dest_in_list: Some(PathBuf::from("/queues/in")),
            ..Default::default()
        };
        let rendered = render(Some(&path), &settings).unwrap();

        assert!(rendered.starts_with("# mpmigrate configuration"));
        assert!(rendered.contains("work_root = \"/from/file\""));
        assert!(rendered.contains("dest_in_list = \"/queues/in\""));
        assert!(rendered.contains("prune_ingested = true"));
        let parsed: MigrateConfig = toml::from_str(&rendered).unwrap();
        assert!(parsed.prune_ingested);
    }
}

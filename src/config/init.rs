use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use super::{ensure_parent_dir, get_config_path, Config};

const HEADER: &str = "\
# CHF engine configuration.
# training_years: years the entropy weights are learned from.
# all_years: years scored against the learned model (add the assessment year here).
# indicators: exactly 8 columns; sign is positive or negative relative to yield.
";

/// Prompt user with a yes/no question. Returns bool based on input and default.
fn prompt_yes_no(message: &str, default_yes: bool) -> Result<bool> {
    let hint = if default_yes { "Y/n" } else { "y/N" };
    print!("{} [{}]: ", message, hint);
    std::io::stdout().flush().context("Failed to flush stdout")?;
    let mut input = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read input")?;
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        Ok(default_yes)
    } else {
        Ok(input == "y" || input == "yes")
    }
}

/// Render a config as commented YAML.
pub fn render_config(config: &Config) -> Result<String> {
    let yaml = serde_saphyr::to_string(config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;
    Ok(format!("{}{}", HEADER, yaml))
}

/// Write `config` to `path`, creating parent directories.
pub fn write_config(path: &Path, config: &Config) -> Result<()> {
    let yaml = render_config(config)?;
    ensure_parent_dir(path)?;
    std::fs::write(path, yaml)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}

/// Write the reference configuration.
///
/// An existing file is only replaced with `force` or after confirmation.
/// Returns the written path, or None when the user declined.
pub fn run_init(path: Option<PathBuf>, force: bool) -> Result<Option<PathBuf>> {
    let config_path = match path {
        Some(p) => p,
        None => get_config_path()?,
    };

    if config_path.exists() && !force {
        let overwrite = prompt_yes_no(
            &format!("Config already exists at {}. Overwrite?", config_path.display()),
            false,
        )?;
        if !overwrite {
            return Ok(None);
        }
    }

    write_config(&config_path, &Config::default())?;
    Ok(Some(config_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{load_config, validate_config};

    #[test]
    fn test_rendered_config_starts_with_header() {
        let yaml = render_config(&Config::default()).unwrap();
        assert!(yaml.starts_with("# CHF engine configuration."));
        assert!(yaml.contains("condition_variability"));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yaml");

        let written = run_init(Some(path.clone()), false).unwrap();
        assert_eq!(written, Some(path.clone()));

        let config = load_config(Some(path)).unwrap();
        assert_eq!(config, Config::default());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "stale").unwrap();

        run_init(Some(path.clone()), true).unwrap();
        assert!(load_config(Some(path)).is_ok());
    }
}

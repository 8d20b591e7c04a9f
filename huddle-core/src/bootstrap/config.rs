//! Configuration loading

use anyhow::Result;
use tracing::info;

use crate::Config;

/// Load configuration from a config file and environment variables
///
/// Config file search order:
/// 1. The explicit path, if given (command line)
/// 2. HUDDLE_CONFIG_PATH environment variable
/// 3. ./config.yaml (current working directory)
/// 4. Fall back to environment variables only
pub fn load_config(explicit_path: Option<&str>) -> Result<Config> {
    if let Some(path) = explicit_path {
        if !std::path::Path::new(path).exists() {
            return Err(anyhow::anyhow!("Config file {path} does not exist"));
        }
    }

    let config_path = explicit_path
        .map(str::to_string)
        .or_else(|| std::env::var("HUDDLE_CONFIG_PATH").ok())
        .filter(|p| std::path::Path::new(p).exists())
        .or_else(|| {
            let cwd = "config.yaml";
            std::path::Path::new(cwd).exists().then(|| cwd.to_string())
        });

    // Logging is not up yet at this point, hence eprintln.
    let config = if let Some(path) = config_path {
        eprintln!("Loading config from {path}");
        Config::from_file(&path).map_err(|e| anyhow::anyhow!("Failed to load {path}: {e}"))?
    } else {
        eprintln!("No config file found, using environment variables");
        Config::from_env()?
    };

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Config validation error: {error}");
        }
        return Err(anyhow::anyhow!(
            "Configuration validation failed with {} error(s): {}",
            errors.len(),
            errors.join("; ")
        ));
    }

    info!("Configuration loaded and validated successfully");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_path_is_an_error() {
        assert!(load_config(Some("/definitely/not/here.yaml")).is_err());
    }

    #[test]
    fn test_invalid_file_fails_validation() {
        let path = std::env::temp_dir().join(format!("huddle-bad-{}.yaml", std::process::id()));
        std::fs::write(&path, "rooms:\n  outbound_buffer: 0\n").unwrap();

        let result = load_config(path.to_str());
        std::fs::remove_file(&path).unwrap();

        let err = result.unwrap_err().to_string();
        assert!(err.contains("rooms.outbound_buffer"));
    }
}

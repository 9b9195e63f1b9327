use std::env;
use std::fs as stdfs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::output::LogFormat;
use crate::config::Config;

const LOCAL_ENV_FILE: &str = "config/local.env";
const LOCAL_CONFIG_FILE: &str = "config/config.yaml";

/// What loading `config/local.env` did.
///
/// Loading runs before the subscriber exists, so the outcome is kept and
/// logged once logging is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalEnvOutcome {
    Missing,
    Loaded {
        path: PathBuf,
        applied: usize,
        skipped_lines: Vec<usize>,
    },
    Unreadable {
        path: PathBuf,
        error: String,
    },
}

impl LocalEnvOutcome {
    pub fn log(&self) {
        match self {
            LocalEnvOutcome::Missing => {}
            LocalEnvOutcome::Loaded {
                path,
                applied,
                skipped_lines,
            } => {
                for line in skipped_lines {
                    warn!(path = %path.display(), line, "invalid local.env entry; skipping");
                }
                info!(path = %path.display(), applied, "Loaded environment overrides from local.env");
            }
            LocalEnvOutcome::Unreadable { path, error } => {
                warn!(path = %path.display(), error = %error, "failed to read local.env overrides");
            }
        }
    }
}

/// Copy `config/local.env` into the environment without clobbering set variables.
pub fn load_local_env_overrides() -> LocalEnvOutcome {
    apply_env_file(Path::new(LOCAL_ENV_FILE))
}

fn apply_env_file(path: &Path) -> LocalEnvOutcome {
    if !path.exists() {
        return LocalEnvOutcome::Missing;
    }
    let contents = match stdfs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) => {
            return LocalEnvOutcome::Unreadable {
                path: path.to_path_buf(),
                error: err.to_string(),
            }
        }
    };

    let parsed = parse_env_file(&contents);
    let mut applied = 0usize;
    for (key, value) in parsed.pairs {
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
            applied += 1;
        }
    }
    LocalEnvOutcome::Loaded {
        path: path.to_path_buf(),
        applied,
        skipped_lines: parsed.skipped_lines,
    }
}

#[derive(Debug, Default)]
struct ParsedEnvFile {
    pairs: Vec<(String, String)>,
    /// 1-based numbers of malformed lines
    skipped_lines: Vec<usize>,
}

/// `KEY=VALUE` pairs in file order; blank lines and comments are ignored.
fn parse_env_file(contents: &str) -> ParsedEnvFile {
    let mut parsed = ParsedEnvFile::default();
    for (idx, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        match line.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => parsed
                .pairs
                .push((key.trim().to_string(), unescape_value(value.trim()))),
            _ => parsed.skipped_lines.push(idx + 1),
        }
    }
    parsed
}

/// Install the global subscriber; logs go to stderr so stdout stays machine-readable.
pub fn init_logging(level: &str, debug: bool, format: LogFormat) -> Result<()> {
    let level = if debug {
        tracing::Level::DEBUG
    } else {
        level.parse().context("Invalid log level")?
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Human => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("Failed to install log subscriber")?;

    Ok(())
}

pub struct LoadedConfig {
    pub config: Config,
    pub path: PathBuf,
}

/// Where the config is looked up when `--config` is absent
fn default_config_path() -> Result<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.exists() {
        return Ok(local);
    }
    let mut path = dirs::config_dir().context("Failed to get config directory")?;
    path.push("uiflow");
    path.push("config.yaml");
    Ok(path)
}

pub async fn load_config(config_path: Option<&PathBuf>) -> Result<LoadedConfig> {
    let path = match config_path {
        Some(path) => path.clone(),
        None => default_config_path()?,
    };

    if !path.exists() {
        warn!("Config file not found, using defaults: {}", path.display());
        return Ok(LoadedConfig {
            config: Config::default(),
            path,
        });
    }

    let content = fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;
    info!("Loaded configuration from: {}", path.display());
    Ok(LoadedConfig { config, path })
}

fn unescape_value(value: &str) -> String {
    if value.starts_with('"') && value.ends_with('"') && value.len() >= 2 {
        let inner = &value[1..value.len() - 1];
        inner
            .replace("\\\"", "\"")
            .replace("\\n", "\n")
            .replace("\\r", "\r")
            .replace("\\t", "\t")
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_values_are_unescaped() {
        assert_eq!(unescape_value(r#""a \"b\"\tc""#), "a \"b\"\tc");
        assert_eq!(unescape_value("plain"), "plain");
        assert_eq!(unescape_value("\""), "\"");
    }

    #[test]
    fn env_file_skips_comments_and_malformed_lines() {
        let parsed = parse_env_file(
            "# credentials\nUIFLOW_USERNAME=operator\n\nexport UIFLOW_PASSWORD=\"p@ss\"\nnot a pair\n=orphan\n",
        );
        assert_eq!(
            parsed.pairs,
            vec![
                ("UIFLOW_USERNAME".to_string(), "operator".to_string()),
                ("UIFLOW_PASSWORD".to_string(), "p@ss".to_string()),
            ]
        );
        assert_eq!(parsed.skipped_lines, vec![5, 6]);
    }

    #[test]
    fn local_env_outcome_is_kept_for_later_logging() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            apply_env_file(&dir.path().join("local.env")),
            LocalEnvOutcome::Missing
        );

        let path = dir.path().join("local.env");
        env::set_var("UIFLOW_LOCAL_ENV_KEPT", "from-shell");
        std::fs::write(
            &path,
            "UIFLOW_LOCAL_ENV_KEPT=from-file\nUIFLOW_LOCAL_ENV_ADDED=1\nbroken\n",
        )
        .unwrap();

        let outcome = apply_env_file(&path);
        assert_eq!(
            outcome,
            LocalEnvOutcome::Loaded {
                path: path.clone(),
                applied: 1,
                skipped_lines: vec![3],
            }
        );
        assert_eq!(env::var("UIFLOW_LOCAL_ENV_KEPT").unwrap(), "from-shell");
        assert_eq!(env::var("UIFLOW_LOCAL_ENV_ADDED").unwrap(), "1");
        outcome.log();
    }

    #[tokio::test]
    async fn explicit_config_file_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "reports_root: runs\nengine:\n  mark_hold_ms: 0\n").unwrap();

        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.path, path);
        assert_eq!(loaded.config.reports_root, PathBuf::from("runs"));
        assert_eq!(loaded.config.engine.mark_hold_ms, 0);
    }

    #[tokio::test]
    async fn missing_config_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let loaded = load_config(Some(&path)).await.unwrap();
        assert_eq!(loaded.config, Config::default());
    }
}

use crate::api::Caller;
use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::model::UserId;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the project-local config file.
pub const PROJECT_CONFIG_FILE: &str = "civic.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CivicConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub output: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
}

/// Who the CLI acts as. Authentication is out of scope; the identity is
/// taken as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

impl IdentityConfig {
    /// Fields set in `over` win; unset ones fall back to `self`.
    #[must_use]
    pub fn overlay(self, over: Self) -> Self {
        Self {
            user_id: over.user_id.or(self.user_id),
            username: over.username.or(self.username),
            firstname: over.firstname.or(self.firstname),
            lastname: over.lastname.or(self.lastname),
        }
    }

    /// The caller this identity describes, or `None` when no user id is set.
    ///
    /// # Errors
    ///
    /// Fails when the user id is malformed or the username is missing.
    pub fn caller(&self) -> Result<Option<Caller>> {
        let Some(raw) = self.user_id.as_deref().filter(|raw| !raw.is_empty()) else {
            return Ok(None);
        };
        let user_id = UserId::parse(raw).context("identity.user_id")?;
        let Some(username) = self.username.clone().filter(|name| !name.is_empty()) else {
            bail!("identity.username must be set together with identity.user_id");
        };
        Ok(Some(Caller {
            user_id,
            username,
            first_name: self.firstname.clone().unwrap_or_default(),
            last_name: self.lastname.clone().unwrap_or_default(),
        }))
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub db: Option<PathBuf>,
    pub identity: IdentityConfig,
    pub json: bool,
    pub format: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub store_path: PathBuf,
    pub busy_timeout: Duration,
    pub identity: IdentityConfig,
    pub resolved_output: String,
}

fn load_file(path: &Path) -> Result<Option<CivicConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<CivicConfig>(&content)
        .map(Some)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// `civic.toml` in `project_root`, if present.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<Option<CivicConfig>> {
    load_file(&project_root.join(PROJECT_CONFIG_FILE))
}

/// `<config_dir>/civic/config.toml`, if present.
///
/// # Errors
///
/// Fails when the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<Option<CivicConfig>> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(None);
    };
    load_file(&config_dir.join("civic/config.toml"))
}

/// Where the store lives when nothing else says.
#[must_use]
pub fn default_store_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from("civic.db"),
        |dir| dir.join("civic").join("civic.db"),
    )
}

/// Merge overrides, project file, user file and defaults, in that order.
///
/// # Errors
///
/// Fails when a config file exists but is unreadable or malformed.
pub fn resolve_config(project_root: &Path, overrides: Overrides) -> Result<EffectiveConfig> {
    let user = load_user_config()?.unwrap_or_default();
    let project = load_project_config(project_root)?;
    let env_format = env::var("FORMAT").ok();
    Ok(merge(user, project, overrides, env_format))
}

fn merge(
    user: CivicConfig,
    project: Option<CivicConfig>,
    overrides: Overrides,
    env_format: Option<String>,
) -> EffectiveConfig {
    let (file_path, busy_timeout_ms, identity, output) = match project {
        Some(project) => (
            project.store.path.or(user.store.path),
            project.store.busy_timeout_ms.or(user.store.busy_timeout_ms),
            user.identity.overlay(project.identity),
            project.output.or(user.output),
        ),
        None => (
            user.store.path,
            user.store.busy_timeout_ms,
            user.identity,
            user.output,
        ),
    };

    EffectiveConfig {
        store_path: overrides
            .db
            .or(file_path)
            .unwrap_or_else(default_store_path),
        busy_timeout: busy_timeout_ms.map_or(DEFAULT_BUSY_TIMEOUT, Duration::from_millis),
        identity: identity.overlay(overrides.identity),
        resolved_output: resolve_output(
            overrides.json,
            overrides.format.as_deref(),
            output,
            env_format,
        ),
    }
}

fn resolve_output(
    cli_json: bool,
    cli_format: Option<&str>,
    config_output: Option<String>,
    env_format: Option<String>,
) -> String {
    fn normalize_output_mode(raw: &str) -> Option<&'static str> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pretty" | "human" => Some("pretty"),
            "text" | "plain" => Some("text"),
            "json" => Some("json"),
            _ => None,
        }
    }

    if cli_json {
        return "json".to_string();
    }

    let chosen = [cli_format, env_format.as_deref(), config_output.as_deref()]
        .into_iter()
        .flatten()
        .find_map(normalize_output_mode);
    if let Some(mode) = chosen {
        return mode.to_string();
    }

    if std::io::stdout().is_terminal() {
        "pretty".to_string()
    } else {
        "text".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> CivicConfig {
        toml::from_str(content).expect("parse")
    }

    #[test]
    fn missing_project_config_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_project_config(dir.path()).expect("load").is_none());
    }

    #[test]
    fn project_file_is_parsed_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(PROJECT_CONFIG_FILE),
            "[store]\npath = \"data/civic.db\"\n",
        )
        .expect("write");

        let cfg = load_project_config(dir.path()).expect("load").expect("present");
        assert_eq!(cfg.store.path, Some(PathBuf::from("data/civic.db")));
        assert_eq!(cfg.store.busy_timeout_ms, None);
        assert_eq!(cfg.identity, IdentityConfig::default());
    }

    #[test]
    fn malformed_file_reports_its_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(PROJECT_CONFIG_FILE), "[store\n").expect("write");
        let err = load_project_config(dir.path()).expect_err("bad toml");
        assert!(format!("{err:#}").contains(PROJECT_CONFIG_FILE));
    }

    #[test]
    fn precedence_is_flag_then_project_then_user() {
        let user = parse(
            r#"
output = "text"
[store]
path = "/user/civic.db"
busy_timeout_ms = 100
[identity]
user_id = "0c7d6a52-1f0e-4b7a-8f3c-5d2e1a9b8c7d"
username = "user-file"
firstname = "Ada"
"#,
        );
        let project = parse(
            r#"
[store]
busy_timeout_ms = 250
[identity]
username = "project-file"
"#,
        );
        let overrides = Overrides {
            identity: IdentityConfig {
                lastname: Some("Lovelace".into()),
                ..IdentityConfig::default()
            },
            ..Overrides::default()
        };

        let cfg = merge(user, Some(project), overrides, None);
        assert_eq!(cfg.store_path, PathBuf::from("/user/civic.db"));
        assert_eq!(cfg.busy_timeout, Duration::from_millis(250));
        assert_eq!(cfg.resolved_output, "text");
        let caller = cfg.identity.caller().expect("identity").expect("caller");
        assert_eq!(caller.username, "project-file");
        assert_eq!(caller.first_name, "Ada");
        assert_eq!(caller.last_name, "Lovelace");

        let flagged = merge(
            CivicConfig::default(),
            None,
            Overrides {
                db: Some(PathBuf::from("/flag.db")),
                ..Overrides::default()
            },
            None,
        );
        assert_eq!(flagged.store_path, PathBuf::from("/flag.db"));
    }

    #[test]
    fn user_timeout_survives_a_project_file_that_omits_it() {
        let user = parse("[store]\nbusy_timeout_ms = 100\n");
        let project = parse("[store]\npath = \"data/civic.db\"\n");

        let cfg = merge(user, Some(project), Overrides::default(), None);
        assert_eq!(cfg.busy_timeout, Duration::from_millis(100));
        assert_eq!(cfg.store_path, PathBuf::from("data/civic.db"));

        let defaulted = merge(CivicConfig::default(), None, Overrides::default(), None);
        assert_eq!(defaulted.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn cli_json_overrides_env_and_config() {
        let output = resolve_output(true, Some("pretty"), Some("text".into()), Some("text".into()));
        assert_eq!(output, "json");
        let output = resolve_output(false, None, Some("pretty".into()), Some("json".into()));
        assert_eq!(output, "json");
    }

    #[test]
    fn identity_without_user_id_is_anonymous() {
        assert!(IdentityConfig::default().caller().expect("ok").is_none());
        let missing_name = IdentityConfig {
            user_id: Some("0c7d6a52-1f0e-4b7a-8f3c-5d2e1a9b8c7d".into()),
            ..IdentityConfig::default()
        };
        assert!(missing_name.caller().is_err());
        let bad_id = IdentityConfig {
            user_id: Some("not-a-uuid".into()),
            username: Some("x".into()),
            ..IdentityConfig::default()
        };
        assert!(bad_id.caller().is_err());
    }
}

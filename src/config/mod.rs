/// CLI configuration: API endpoint and stored credentials
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::client::default_user_agent;
use crate::api::{Configuration, TlsSettings};

pub const ENDPOINT_ENV: &str = "GSCTL_ENDPOINT";
pub const AUTH_TOKEN_ENV: &str = "GSCTL_AUTH_TOKEN";
pub const CONFIG_PATH_ENV: &str = "GSCTL_CONFIG_PATH";

/// Timeout for CLI-issued API requests
pub const CLI_TIMEOUT: Duration = Duration::from_secs(20);

/// Persisted CLI configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    /// API endpoint URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Email of the logged-in user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Auth token obtained by `gsctl login`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Authorization scheme placed before the token
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

fn default_scheme() -> String {
    "giantswarm".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            email: None,
            token: None,
            scheme: default_scheme(),
        }
    }
}

impl CliConfig {
    /// Config file location: GSCTL_CONFIG_PATH or ~/.config/gsctl/config.yaml
    pub fn default_path() -> anyhow::Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
            return Ok(PathBuf::from(path));
        }
        let home = std::env::var("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config/gsctl/config.yaml"))
    }

    /// Load configuration from a YAML file. A missing file yields defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: CliConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write configuration to a YAML file readable only by the owner,
    /// creating parent directories
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let yaml = serde_yaml::to_string(self)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;

        // The mode above only applies to new files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to restrict {}", path.display()))?;
        }

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.scheme.trim().is_empty() {
            anyhow::bail!("scheme cannot be empty");
        }
        if self.scheme.contains(char::is_whitespace) {
            anyhow::bail!("scheme must be a single word: {:?}", self.scheme);
        }
        Ok(())
    }

    /// Endpoint to use: command line flag, then GSCTL_ENDPOINT, then config
    pub fn choose_endpoint(&self, flag: Option<&str>) -> anyhow::Result<String> {
        let env = std::env::var(ENDPOINT_ENV).ok();
        first_non_empty([flag, env.as_deref(), self.endpoint.as_deref()])
            .map(normalize_endpoint)
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "API endpoint not found. Pass --endpoint, set {} or log in first",
                    ENDPOINT_ENV
                )
            })
    }

    /// Authorization header value for the stored token, if any
    pub fn auth_header(&self) -> Option<String> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(|t| format!("{} {}", self.scheme, t))
    }
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
}

/// Add https:// when no scheme is given
fn normalize_endpoint(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.trim_end_matches('/').to_string()
    } else {
        format!("https://{}", endpoint.trim_end_matches('/'))
    }
}

/// Build a provider for the Authorization header.
///
/// An explicit token wins, then GSCTL_AUTH_TOKEN. Otherwise the config file
/// is re-read on every call so a token refreshed by another `gsctl login`
/// is used without rebuilding the client.
pub fn auth_header_getter(
    config_path: PathBuf,
    explicit_token: Option<String>,
) -> impl Fn() -> anyhow::Result<String> + Send + Sync + 'static {
    let fixed = explicit_token
        .or_else(|| std::env::var(AUTH_TOKEN_ENV).ok())
        .filter(|t| !t.trim().is_empty());

    move || {
        if let Some(token) = &fixed {
            return Ok(format!("{} {}", default_scheme(), token.trim()));
        }

        CliConfig::from_file(&config_path)?
            .auth_header()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "not logged in. Run 'gsctl login' or pass --auth-token (or set {})",
                    AUTH_TOKEN_ENV
                )
            })
    }
}

/// Client configuration for a CLI invocation
pub fn client_configuration(
    config_path: &Path,
    endpoint: String,
    explicit_token: Option<String>,
    activity_name: &str,
) -> Configuration {
    Configuration::new(endpoint)
        .with_timeout(CLI_TIMEOUT)
        .with_user_agent(default_user_agent())
        .with_activity_name(activity_name)
        .with_auth_header_getter(auth_header_getter(
            config_path.to_path_buf(),
            explicit_token,
        ))
        .with_tls(TlsSettings::from_env())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = CliConfig::from_file(dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.scheme, "giantswarm");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.yaml");

        let config = CliConfig {
            endpoint: Some("https://api.example.com".to_string()),
            email: Some("dev@acme.com".to_string()),
            token: Some("abc".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = CliConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.auth_header().as_deref(), Some("giantswarm abc"));
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        let config = CliConfig {
            token: Some("secret".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        assert_eq!(CliConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_config_validation() {
        let mut config = CliConfig::default();
        assert!(config.validate().is_ok());

        config.scheme = "two words".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_endpoint_precedence() {
        assert_eq!(
            first_non_empty([Some(" "), None, Some("https://config")]),
            Some("https://config")
        );
        assert_eq!(
            first_non_empty([Some("https://flag"), Some("https://env"), None]),
            Some("https://flag")
        );
        assert_eq!(first_non_empty([None, Some("")]), None);
    }

    #[test]
    fn test_flag_endpoint_is_normalized() {
        let config = CliConfig::default();
        assert_eq!(
            config.choose_endpoint(Some("api.example.com/")).unwrap(),
            "https://api.example.com"
        );
        assert_eq!(
            config.choose_endpoint(Some("http://localhost:8000")).unwrap(),
            "http://localhost:8000"
        );
    }

    #[test]
    fn test_explicit_token_wins() {
        let dir = tempdir().unwrap();
        let getter = auth_header_getter(dir.path().join("config.yaml"), Some("flag".to_string()));
        assert_eq!(getter().unwrap(), "giantswarm flag");
    }

    #[test]
    fn test_getter_picks_up_refreshed_token() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        let getter = auth_header_getter(path.clone(), None);
        if std::env::var(AUTH_TOKEN_ENV).is_ok() {
            // Environment token overrides the file, nothing else to check
            return;
        }
        assert!(getter().is_err());

        let mut config = CliConfig {
            token: Some("first".to_string()),
            ..Default::default()
        };
        config.save(&path).unwrap();
        assert_eq!(getter().unwrap(), "giantswarm first");

        config.token = Some("second".to_string());
        config.save(&path).unwrap();
        assert_eq!(getter().unwrap(), "giantswarm second");
    }
}

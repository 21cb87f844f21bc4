//! Credentials file
//!
//! The credentials file is a small TOML document naming the endpoint and the
//! keys used to authenticate against it. Callers pass its path explicitly;
//! [`default_credentials_path`] only exists for the CLI.
//!
//! Changes to the layout require bumping [`SCHEMA_VERSION`] and adding a
//! migration step in [`CredentialsFile::migrate`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Current credentials schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Directory name under the platform config dir
const APP_DIR: &str = "bucketkit";

/// File name of the default credentials file
const CREDENTIALS_FILE: &str = "credentials.toml";

/// Timeout configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
        }
    }
}

/// Credentials for one S3-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Endpoint URL (SDK default endpoint when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Access key ID
    pub access_key: String,

    /// Secret access key
    pub secret_key: String,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Region
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Timeout configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<TimeoutConfig>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl Credentials {
    /// Create credentials with required fields
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            endpoint: None,
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            session_token: None,
            region: default_region(),
            bucket_lookup: default_bucket_lookup(),
            timeout: None,
        }
    }

    /// Set a custom endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Get the effective timeout configuration
    pub fn timeout_config(&self) -> TimeoutConfig {
        self.timeout.clone().unwrap_or_default()
    }

    /// Whether requests should use path-style addressing
    pub fn force_path_style(&self) -> bool {
        self.bucket_lookup == "path" || self.bucket_lookup == "auto"
    }

    /// Check that the credentials can be used to build a client
    pub fn validate(&self) -> Result<()> {
        if self.access_key.trim().is_empty() {
            return Err(Error::Credentials("access_key is empty".into()));
        }
        if self.secret_key.trim().is_empty() {
            return Err(Error::Credentials("secret_key is empty".into()));
        }
        if let Some(endpoint) = &self.endpoint {
            url::Url::parse(endpoint)?;
        }
        match self.bucket_lookup.as_str() {
            "auto" | "path" | "dns" => Ok(()),
            other => Err(Error::Credentials(format!(
                "bucket_lookup must be one of auto, path, dns (got '{other}')"
            ))),
        }
    }
}

/// Loads credentials files from disk
#[derive(Debug)]
pub struct CredentialsFile {
    path: PathBuf,
}

impl CredentialsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the credentials file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load and validate the credentials.
    ///
    /// A schema version newer than supported is rejected; older ones are
    /// migrated in memory.
    pub fn load(&self) -> Result<Credentials> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            Error::Config(format!(
                "Cannot read credentials file {}: {e}",
                self.path.display()
            ))
        })?;
        let mut credentials: Credentials = toml::from_str(&content)?;

        if credentials.schema_version < SCHEMA_VERSION {
            credentials = self.migrate(credentials)?;
        } else if credentials.schema_version > SCHEMA_VERSION {
            return Err(Error::Config(format!(
                "Credentials file version {} is newer than supported version {}",
                credentials.schema_version, SCHEMA_VERSION
            )));
        }

        credentials.validate()?;
        tracing::debug!(path = %self.path.display(), "loaded credentials");
        Ok(credentials)
    }

    /// Migrate credentials from an older schema version
    fn migrate(&self, credentials: Credentials) -> Result<Credentials> {
        let mut credentials = credentials;
        credentials.schema_version = SCHEMA_VERSION;
        Ok(credentials)
    }
}

/// Default credentials location: `<config_dir>/bucketkit/credentials.toml`
pub fn default_credentials_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| Error::Config("Could not determine config directory".into()))?;
    Ok(config_dir.join(APP_DIR).join(CREDENTIALS_FILE))
}

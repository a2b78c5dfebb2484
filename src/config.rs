//! TOML-based connection configuration.
//!
//! The bind password is stored as a `bind_password_env` field referencing an
//! environment variable name; the actual secret is resolved at runtime via
//! [`LdapConfig::resolve_env`].

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Directory connection configuration loaded from a TOML file.
#[derive(Clone, Serialize, Deserialize)]
pub struct LdapConfig {
    /// Directory URL (`ldap://host:389`, `ldaps://host:636`, `ldapi://...`).
    pub url: String,

    /// DN to bind as. Omit for anonymous access.
    #[serde(default)]
    pub bind_dn: Option<String>,

    /// Environment variable holding the bind password.
    #[serde(default)]
    pub bind_password_env: Option<String>,

    /// Negotiate STARTTLS after connecting. Not valid with an `ldaps://` URL.
    #[serde(default)]
    pub starttls: bool,

    /// Connection timeout in seconds (default 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Resolved bind password (populated by `resolve_env`, never serialized).
    #[serde(skip)]
    pub bind_password: Option<String>,
}

fn default_connect_timeout() -> u64 {
    30
}

impl LdapConfig {
    /// Load an [`LdapConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env`](Self::resolve_env) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: LdapConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `bind_password_env` reference and populate
    /// [`bind_password`](Self::bind_password).
    ///
    /// A missing variable logs a warning but does **not** fail here;
    /// [`validate`](Self::validate) reports it once resolution is complete.
    pub fn resolve_env(&mut self) {
        if let Some(ref env_name) = self.bind_password_env {
            self.bind_password = resolve_optional_env(env_name, "bind_password_env");
        }
    }

    /// Validate that all fields are present and sane.
    ///
    /// Call after [`resolve_env`](Self::resolve_env): a bind password that
    /// failed to resolve is reported from here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let scheme_ok = ["ldap://", "ldaps://", "ldapi://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme));
        if !scheme_ok {
            return Err(ConfigError::InvalidValue {
                field: "url".into(),
                detail: "URL must start with ldap://, ldaps:// or ldapi://".into(),
            });
        }
        if self.starttls && self.url.starts_with("ldaps://") {
            return Err(ConfigError::InvalidValue {
                field: "starttls".into(),
                detail: "STARTTLS cannot be combined with an ldaps:// URL".into(),
            });
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "connect_timeout_secs".into(),
                detail: "connection timeout must be > 0".into(),
            });
        }
        if self.bind_dn.is_some() {
            match &self.bind_password_env {
                None => {
                    return Err(ConfigError::InvalidValue {
                        field: "bind_password_env".into(),
                        detail: "bind_dn is set but no password source is configured".into(),
                    });
                }
                Some(var) if self.bind_password.is_none() => {
                    return Err(ConfigError::EnvVarMissing {
                        var: var.clone(),
                        field: "bind_password_env".into(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env();
        config.validate()?;
        Ok(config)
    }
}

// The resolved password stays out of log output.
impl fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfig")
            .field("url", &self.url)
            .field("bind_dn", &self.bind_dn)
            .field("bind_password_env", &self.bind_password_env)
            .field("starttls", &self.starttls)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field(
                "bind_password",
                &self.bind_password.as_ref().map(|_| "***"),
            )
            .finish()
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

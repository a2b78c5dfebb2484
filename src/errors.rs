//! Error types for the ldap-odm library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and the
//! top-level [`OdmError`] enum unifies them for callers that want a single
//! error type out of every mapper operation.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for all mapper and directory operations.
#[derive(Debug, Error)]
pub enum OdmError {
    /// The target DN does not exist in the directory.
    #[error("no such entry: {0}")]
    NoSuchEntry(String),

    /// An entry already exists at the target DN.
    #[error("entry already exists: {0}")]
    AlreadyExists(String),

    /// A required attribute was absent from a directory entry.
    #[error("entry '{dn}' is missing required attribute '{attribute}'")]
    MissingRequiredAttribute {
        dn: String,
        attribute: String,
    },

    /// The mapped type has no registered object definition.
    #[error("no object definition registered for type '{0}'")]
    NotRegistered(&'static str),

    /// The instance has no DN, but the operation needs one.
    #[error("object has no distinguished name")]
    MissingDn,

    /// The DN could not be tokenized, or has no parent where one is needed.
    #[error("invalid distinguished name: '{0}'")]
    InvalidDn(String),

    /// A mapped object rejected a value of the wrong variant.
    #[error("attribute '{attribute}' expects a {expected} value")]
    AttributeType {
        attribute: String,
        expected: &'static str,
    },

    /// Value conversion failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Underlying LDAP protocol or connection error.
    #[error("LDAP error: {0}")]
    Ldap(#[from] ldap3::LdapError),
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// Errors from syntax-driven value conversion.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The value does not conform to the syntax (e.g. non-numeric INTEGER).
    #[error("malformed {syntax} value: {detail}")]
    Format {
        syntax: &'static str,
        detail: String,
    },

    /// The wire bytes are not valid UTF-8 for a string syntax.
    #[error("invalid {syntax} encoding: {source}")]
    Encoding {
        syntax: &'static str,
        source: std::string::FromUtf8Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = OdmError::NoSuchEntry("uid=jd,ou=people,dc=example,dc=com".into());
        assert_eq!(
            err.to_string(),
            "no such entry: uid=jd,ou=people,dc=example,dc=com"
        );

        let err = OdmError::MissingRequiredAttribute {
            dn: "cn=svc,dc=example,dc=com".into(),
            attribute: "uidNumber".into(),
        };
        assert!(err.to_string().contains("uidNumber"));

        let err = OdmError::NotRegistered("Account");
        assert_eq!(
            err.to_string(),
            "no object definition registered for type 'Account'"
        );

        let err = ConfigError::EnvVarMissing {
            var: "LDAP_BIND_PASSWORD".into(),
            field: "bind_password_env".into(),
        };
        assert!(err.to_string().contains("LDAP_BIND_PASSWORD"));
    }

    #[test]
    fn test_odm_error_from_subsystem() {
        let codec_err = CodecError::Format {
            syntax: "INTEGER",
            detail: "not a number".into(),
        };
        let odm_err: OdmError = codec_err.into();
        assert!(matches!(odm_err, OdmError::Codec(_)));

        let cfg_err = ConfigError::ParseError("bad toml".into());
        let odm_err: OdmError = cfg_err.into();
        assert!(matches!(odm_err, OdmError::Config(_)));
    }
}

//! Syntax-driven value coercion.
//!
//! LDAP attribute syntaxes (RFC 4517) identify how an attribute's wire bytes
//! are to be interpreted. [`SyntaxCodec`] maps a syntax OID to a bidirectional
//! converter between the wire form and a typed [`Value`]. The registry is a
//! fixed match table; unknown syntaxes resolve to `None` and degrade to
//! identity pass-through at mapping time.

use crate::errors::CodecError;
use crate::value::Value;

/// Well-known attribute syntax OIDs from RFC 4517.
pub mod oid {
    pub const BOOLEAN: &str = "1.3.6.1.4.1.1466.115.121.1.7";
    pub const DIRECTORY_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.15";
    pub const GENERALIZED_TIME: &str = "1.3.6.1.4.1.1466.115.121.1.24";
    pub const IA5_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.26";
    pub const INTEGER: &str = "1.3.6.1.4.1.1466.115.121.1.27";
    pub const NUMERIC_STRING: &str = "1.3.6.1.4.1.1466.115.121.1.36";
    pub const UTC_TIME: &str = "1.3.6.1.4.1.1466.115.121.1.53";
}

/// A stateless converter between wire bytes and typed values for one syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxCodec {
    /// `TRUE`/`FALSE` wire form. Decoding is lossy: anything other than the
    /// exact bytes `TRUE` reads as `false`.
    Boolean,
    /// UTF-8 string (Directory String syntax).
    DirectoryString,
    /// ASCII string (IA5 String syntax). Validated as UTF-8.
    Ia5String,
    /// Decimal integer string.
    Integer,
    /// Digit string, normalized through integer parsing (`"0012"` → `"12"`).
    NumericString,
    /// Pass-through with no interpretation. Also used for the time syntaxes,
    /// which round-trip unmodified.
    Identity,
}

impl SyntaxCodec {
    /// Looks up the codec for a syntax OID. Returns `None` for syntaxes the
    /// registry does not know, which callers treat as identity pass-through.
    pub fn for_syntax(oid: &str) -> Option<SyntaxCodec> {
        match oid {
            oid::BOOLEAN => Some(SyntaxCodec::Boolean),
            oid::DIRECTORY_STRING => Some(SyntaxCodec::DirectoryString),
            oid::IA5_STRING => Some(SyntaxCodec::Ia5String),
            oid::INTEGER => Some(SyntaxCodec::Integer),
            oid::NUMERIC_STRING => Some(SyntaxCodec::NumericString),
            oid::GENERALIZED_TIME | oid::UTC_TIME => Some(SyntaxCodec::Identity),
            _ => None,
        }
    }

    /// The syntax name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            SyntaxCodec::Boolean => "Boolean",
            SyntaxCodec::DirectoryString => "DirectoryString",
            SyntaxCodec::Ia5String => "IA5String",
            SyntaxCodec::Integer => "INTEGER",
            SyntaxCodec::NumericString => "NumericString",
            SyntaxCodec::Identity => "identity",
        }
    }

    /// Decodes wire bytes into the typed value for this syntax.
    pub fn decode(&self, raw: &[u8]) -> Result<Value, CodecError> {
        match self {
            SyntaxCodec::Boolean => Ok(Value::Bool(raw == b"TRUE")),
            SyntaxCodec::DirectoryString | SyntaxCodec::Ia5String => {
                String::from_utf8(raw.to_vec())
                    .map(Value::Text)
                    .map_err(|source| CodecError::Encoding {
                        syntax: self.name(),
                        source,
                    })
            }
            SyntaxCodec::Integer => Ok(Value::Int(self.parse_int(raw)?)),
            SyntaxCodec::NumericString => {
                Ok(Value::Text(self.parse_int(raw)?.to_string()))
            }
            SyntaxCodec::Identity => Ok(Value::Bytes(raw.to_vec())),
        }
    }

    /// Encodes a typed value into wire bytes for this syntax.
    ///
    /// Every codec except [`SyntaxCodec::Identity`] accepts only its own
    /// variant and fails with [`CodecError::Format`] on a mismatch.
    pub fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match (self, value) {
            (SyntaxCodec::Boolean, Value::Bool(true)) => Ok(b"TRUE".to_vec()),
            (SyntaxCodec::Boolean, Value::Bool(false)) => Ok(b"FALSE".to_vec()),
            (SyntaxCodec::DirectoryString | SyntaxCodec::Ia5String, Value::Text(s)) => {
                Ok(s.clone().into_bytes())
            }
            (SyntaxCodec::Integer, Value::Int(n)) => Ok(n.to_string().into_bytes()),
            // Numeric strings re-validate and normalize on the way out.
            (SyntaxCodec::NumericString, Value::Text(s)) => {
                let n: i64 = s.trim().parse().map_err(|_| CodecError::Format {
                    syntax: self.name(),
                    detail: format!("'{s}' is not a digit string"),
                })?;
                Ok(n.to_string().into_bytes())
            }
            (SyntaxCodec::NumericString, Value::Int(n)) => Ok(n.to_string().into_bytes()),
            (SyntaxCodec::Identity, v) => Ok(match v {
                Value::Bytes(b) => b.clone(),
                other => other.to_string().into_bytes(),
            }),
            (codec, other) => Err(CodecError::Format {
                syntax: codec.name(),
                detail: format!("cannot encode a {} value", other.kind()),
            }),
        }
    }

    fn parse_int(&self, raw: &[u8]) -> Result<i64, CodecError> {
        let text = std::str::from_utf8(raw).map_err(|_| CodecError::Format {
            syntax: self.name(),
            detail: format!("'{}' is not valid UTF-8", String::from_utf8_lossy(raw)),
        })?;
        text.trim().parse().map_err(|_| CodecError::Format {
            syntax: self.name(),
            detail: format!("'{text}' is not a decimal integer"),
        })
    }
}

//! Schema-aware object mapper for LDAP directories.
//!
//! This crate provides the components for mapping typed objects onto
//! directory entries: syntax codecs, subschema lookup, object definitions
//! with cardinality markers, DN handling, directory backends, and the
//! mapper itself.

pub mod config;
pub mod definition;
pub mod directory;
pub mod dn;
pub mod errors;
pub mod mapper;
pub mod object;
pub mod schema;
pub mod syntax;
pub mod value;

// Re-exports for convenience.
pub use config::LdapConfig;
pub use definition::{AttributeDef, ObjectDefinition};
pub use directory::{
    AttributeMap, Directory, LdapDirectory, MemoryDirectory, Modification, RawEntry,
    Scope, WireValue,
};
pub use errors::{CodecError, ConfigError, OdmError};
pub use mapper::LdapMapper;
pub use object::{GenericObject, LdapObject};
pub use schema::{AttributeType, ObjectClass, SubSchema};
pub use syntax::SyntaxCodec;
pub use value::Value;

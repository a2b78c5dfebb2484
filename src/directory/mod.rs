//! Directory collaborator interface.
//!
//! [`Directory`] expresses exactly the operations the mapper needs from a
//! directory store. [`ldap::LdapDirectory`] adapts a live LDAP connection;
//! [`memory::MemoryDirectory`] is the in-process double that journals writes
//! so mapping behavior is observable in tests without a server.

pub mod ldap;
pub mod memory;

pub use ldap::LdapDirectory;
pub use memory::{DirectoryOp, MemoryDirectory};

use std::collections::HashMap;

use crate::errors::OdmError;

/// A raw attribute value as it travels on the wire.
pub type WireValue = Vec<u8>;

/// Attribute name to wire values, as a directory query returns them.
pub type AttributeMap = HashMap<String, Vec<WireValue>>;

/// One entry from a directory query result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub dn: String,
    pub attrs: AttributeMap,
}

/// Query scope relative to the base DN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The base entry only.
    Base,
    /// Direct children of the base, excluding the base itself.
    OneLevel,
    /// The base entry and everything under it.
    Subtree,
}

/// One attribute change inside a modify request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
    /// Replace all values of the attribute.
    Replace(String, Vec<WireValue>),
    /// Add values to the attribute.
    Add(String, Vec<WireValue>),
    /// Delete the given values, or the whole attribute when empty.
    Delete(String, Vec<WireValue>),
}

/// The directory operations the mapper consumes.
///
/// Implementations report a missing target DN as [`OdmError::NoSuchEntry`]
/// and a create collision as [`OdmError::AlreadyExists`]; everything else
/// (connectivity, permissions, protocol) propagates unmodified.
pub trait Directory {
    /// Runs a query and returns the matching entries in result order.
    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Option<&[&str]>,
    ) -> Result<Vec<RawEntry>, OdmError>;

    /// Creates an entry. `attrs` is ordered so `objectClass` leads.
    fn create(
        &mut self,
        dn: &str,
        attrs: Vec<(String, Vec<WireValue>)>,
    ) -> Result<(), OdmError>;

    /// Applies the modifications to an existing entry in one request.
    fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> Result<(), OdmError>;

    /// Deletes the entry at `dn`.
    fn delete(&mut self, dn: &str) -> Result<(), OdmError>;

    /// Renames and/or moves the entry. `new_superior` of `None` keeps the
    /// entry under its current superior; `delete_old` removes the old RDN
    /// value from the entry's attributes.
    fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_superior: Option<&str>,
        delete_old: bool,
    ) -> Result<(), OdmError>;

    /// Changes the entry's password. `old` is required by servers that
    /// verify the current password before accepting the new one.
    fn change_password(
        &mut self,
        dn: &str,
        old: Option<&str>,
        new: &str,
    ) -> Result<(), OdmError>;
}

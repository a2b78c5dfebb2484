//! LDAP directory adapter.
//!
//! [`LdapDirectory`] adapts the `ldap3` synchronous connection handle to the
//! [`Directory`] trait: connection setup (timeout, STARTTLS, simple bind),
//! result-code mapping, and folding the search API's string/binary attribute
//! split back into wire bytes. Mapping logic lives in the mapper; this is
//! connection plumbing only.

use std::collections::HashSet;
use std::time::Duration;

use ldap3::exop::PasswordModify;
use ldap3::{LdapConn, LdapConnSettings, LdapError, LdapResult, Mod, SearchEntry};
use tracing::{debug, info};

use super::{AttributeMap, Directory, Modification, RawEntry, Scope, WireValue};
use crate::config::LdapConfig;
use crate::errors::{ConfigError, OdmError};

const LDAP_RC_NO_SUCH_OBJECT: u32 = 32;
const LDAP_RC_ALREADY_EXISTS: u32 = 68;

/// A live LDAP connection implementing [`Directory`].
pub struct LdapDirectory {
    conn: LdapConn,
}

impl LdapDirectory {
    /// Connects to the given URL (`ldap://`, `ldaps://`, `ldapi://`) without
    /// binding.
    pub fn connect(url: &str) -> Result<Self, OdmError> {
        let conn = LdapConn::new(url)?;
        info!(url, "connected to directory");
        Ok(LdapDirectory { conn })
    }

    /// Connects and binds according to a resolved [`LdapConfig`].
    pub fn from_config(config: &LdapConfig) -> Result<Self, OdmError> {
        let settings = LdapConnSettings::new()
            .set_conn_timeout(Duration::from_secs(config.connect_timeout_secs))
            .set_starttls(config.starttls);
        let conn = LdapConn::with_settings(settings, &config.url)?;
        let mut directory = LdapDirectory { conn };
        info!(url = %config.url, starttls = config.starttls, "connected to directory");

        if let Some(bind_dn) = &config.bind_dn {
            let password =
                config
                    .bind_password
                    .as_deref()
                    .ok_or_else(|| ConfigError::InvalidValue {
                        field: "bind_password".to_string(),
                        detail: "bind_dn is set but no password was resolved".to_string(),
                    })?;
            directory.simple_bind(bind_dn, password)?;
        }
        Ok(directory)
    }

    /// Wraps an already-established connection.
    pub fn from_conn(conn: LdapConn) -> Self {
        LdapDirectory { conn }
    }

    /// Performs a simple bind.
    pub fn simple_bind(&mut self, bind_dn: &str, password: &str) -> Result<(), OdmError> {
        let result = self.conn.simple_bind(bind_dn, password)?;
        if result.rc != 0 {
            return Err(OdmError::Ldap(LdapError::from(result)));
        }
        debug!(bind_dn, "bind successful");
        Ok(())
    }

    /// Closes the connection.
    pub fn unbind(&mut self) -> Result<(), OdmError> {
        self.conn.unbind()?;
        Ok(())
    }

    fn check_result(dn: &str, result: LdapResult) -> Result<(), OdmError> {
        match result.rc {
            0 => Ok(()),
            LDAP_RC_NO_SUCH_OBJECT => Err(OdmError::NoSuchEntry(dn.to_string())),
            LDAP_RC_ALREADY_EXISTS => Err(OdmError::AlreadyExists(dn.to_string())),
            _ => Err(OdmError::Ldap(LdapError::from(result))),
        }
    }
}

/// Folds a search entry's string and binary attribute maps into one
/// byte-valued map.
fn to_raw_entry(entry: SearchEntry) -> RawEntry {
    let mut attrs = AttributeMap::new();
    for (name, values) in entry.attrs {
        attrs
            .entry(name)
            .or_default()
            .extend(values.into_iter().map(String::into_bytes));
    }
    for (name, values) in entry.bin_attrs {
        attrs.entry(name).or_default().extend(values);
    }
    RawEntry {
        dn: entry.dn,
        attrs,
    }
}

fn wire_scope(scope: Scope) -> ldap3::Scope {
    match scope {
        Scope::Base => ldap3::Scope::Base,
        Scope::OneLevel => ldap3::Scope::OneLevel,
        Scope::Subtree => ldap3::Scope::Subtree,
    }
}

impl Directory for LdapDirectory {
    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Option<&[&str]>,
    ) -> Result<Vec<RawEntry>, OdmError> {
        let attr_list = attrs.map(<[&str]>::to_vec).unwrap_or_else(|| vec!["*"]);
        debug!(base, filter, "directory search");
        let result = self.conn.search(base, wire_scope(scope), filter, attr_list)?;
        match result.success() {
            Ok((entries, _)) => Ok(entries
                .into_iter()
                .map(SearchEntry::construct)
                .map(to_raw_entry)
                .collect()),
            Err(LdapError::LdapResult { result })
                if result.rc == LDAP_RC_NO_SUCH_OBJECT =>
            {
                Err(OdmError::NoSuchEntry(base.to_string()))
            }
            Err(e) => Err(OdmError::Ldap(e)),
        }
    }

    fn create(
        &mut self,
        dn: &str,
        attrs: Vec<(String, Vec<WireValue>)>,
    ) -> Result<(), OdmError> {
        let wire_attrs: Vec<(Vec<u8>, HashSet<Vec<u8>>)> = attrs
            .into_iter()
            .map(|(name, values)| (name.into_bytes(), values.into_iter().collect()))
            .collect();
        let result = self.conn.add(dn, wire_attrs)?;
        Self::check_result(dn, result)?;
        info!(dn, "entry created");
        Ok(())
    }

    fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> Result<(), OdmError> {
        let wire_mods: Vec<Mod<Vec<u8>>> = mods
            .into_iter()
            .map(|m| match m {
                Modification::Replace(name, values) => {
                    Mod::Replace(name.into_bytes(), values.into_iter().collect())
                }
                Modification::Add(name, values) => {
                    Mod::Add(name.into_bytes(), values.into_iter().collect())
                }
                Modification::Delete(name, values) => {
                    Mod::Delete(name.into_bytes(), values.into_iter().collect())
                }
            })
            .collect();
        let result = self.conn.modify(dn, wire_mods)?;
        Self::check_result(dn, result)?;
        info!(dn, "entry modified");
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> Result<(), OdmError> {
        let result = self.conn.delete(dn)?;
        Self::check_result(dn, result)?;
        info!(dn, "entry deleted");
        Ok(())
    }

    fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_superior: Option<&str>,
        delete_old: bool,
    ) -> Result<(), OdmError> {
        let result = self.conn.modifydn(dn, new_rdn, delete_old, new_superior)?;
        Self::check_result(dn, result)?;
        info!(dn, new_rdn, "entry renamed");
        Ok(())
    }

    fn change_password(
        &mut self,
        dn: &str,
        old: Option<&str>,
        new: &str,
    ) -> Result<(), OdmError> {
        let exop = PasswordModify {
            user_id: Some(dn),
            old_pass: old,
            new_pass: Some(new),
        };
        let result = self.conn.extended(exop)?;
        Self::check_result(dn, result.1)?;
        info!(dn, "password changed");
        Ok(())
    }
}

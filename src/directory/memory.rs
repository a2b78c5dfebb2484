//! In-process directory double.
//!
//! [`MemoryDirectory`] keeps entries in a map and journals every write it
//! receives, so mapper behavior (diffs, rename semantics, operation order) is
//! observable in tests without a server. It honors scope semantics and a
//! minimal filter subset: presence `(attr=*)` and simple equality
//! `(attr=value)`. `(objectclass=*)` matches every entry, as it does on a
//! server where objectClass is mandatory, so fixtures seeded without one
//! stay visible. Composite filters log a warning and match everything.
//!
//! Known simplifications: no parent-existence check on create, renames move
//! the entry itself but not a subtree beneath it, and password changes are
//! applied without verifying the old password.

use std::collections::BTreeMap;

use tracing::warn;

use super::{AttributeMap, Directory, Modification, RawEntry, Scope, WireValue};
use crate::dn::{parent_dn, split_dn, split_rdn, unescape_value};
use crate::errors::OdmError;

/// One write operation the double received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryOp {
    Create {
        dn: String,
    },
    Modify {
        dn: String,
        mods: Vec<Modification>,
    },
    Delete {
        dn: String,
    },
    Rename {
        dn: String,
        new_rdn: String,
        new_superior: Option<String>,
        delete_old: bool,
    },
    PasswordChange {
        dn: String,
    },
}

/// Map-backed directory double with a write journal.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    entries: BTreeMap<String, AttributeMap>,
    log: Vec<DirectoryOp>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        MemoryDirectory::default()
    }

    /// Seeds an entry without journaling, for test fixtures.
    pub fn insert_entry<N, V>(
        &mut self,
        dn: impl Into<String>,
        attrs: impl IntoIterator<Item = (N, Vec<V>)>,
    ) where
        N: Into<String>,
        V: Into<WireValue>,
    {
        let attrs = attrs
            .into_iter()
            .map(|(name, values)| {
                (name.into(), values.into_iter().map(Into::into).collect())
            })
            .collect();
        self.entries.insert(dn.into(), attrs);
    }

    /// The stored attributes of an entry.
    pub fn entry(&self, dn: &str) -> Option<&AttributeMap> {
        self.entries.get(dn)
    }

    pub fn contains_entry(&self, dn: &str) -> bool {
        self.entries.contains_key(dn)
    }

    /// Every write received since construction or the last [`clear_log`].
    ///
    /// [`clear_log`]: MemoryDirectory::clear_log
    pub fn log(&self) -> &[DirectoryOp] {
        &self.log
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn in_scope(dn: &str, base: &str, scope: Scope) -> bool {
        match scope {
            Scope::Base => dn == base,
            Scope::OneLevel => parent_dn(dn) == Some(base),
            Scope::Subtree => dn == base || Self::is_under(dn, base),
        }
    }

    fn is_under(dn: &str, base: &str) -> bool {
        let mut current = dn;
        while let Some(parent) = parent_dn(current) {
            if parent == base {
                return true;
            }
            current = parent;
        }
        false
    }

    fn matches_filter(attrs: &AttributeMap, filter: &str) -> bool {
        let trimmed = filter.trim();
        let body = trimmed
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .unwrap_or(trimmed);
        if body.starts_with(['&', '|', '!']) || body.contains('(') {
            warn!(filter, "composite filters unsupported here, matching all entries");
            return true;
        }
        let Some((name, expected)) = body.split_once('=') else {
            warn!(filter, "unparseable filter, matching all entries");
            return true;
        };
        // The conventional match-all; entries seeded without objectClass
        // still match.
        if expected == "*" && name.eq_ignore_ascii_case("objectclass") {
            return true;
        }
        let values = attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, values)| values);
        match (values, expected) {
            (Some(values), "*") => !values.is_empty(),
            (Some(values), expected) => {
                values.iter().any(|v| v == expected.as_bytes())
            }
            (None, _) => false,
        }
    }

    fn project(attrs: &AttributeMap, wanted: Option<&[&str]>) -> AttributeMap {
        match wanted {
            None => attrs.clone(),
            Some(names) => attrs
                .iter()
                .filter(|(key, _)| {
                    names.iter().any(|n| n.eq_ignore_ascii_case(key))
                })
                .map(|(key, values)| (key.clone(), values.clone()))
                .collect(),
        }
    }

    fn stored_key(attrs: &AttributeMap, name: &str) -> Option<String> {
        attrs
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}

impl Directory for MemoryDirectory {
    fn search(
        &mut self,
        base: &str,
        scope: Scope,
        filter: &str,
        attrs: Option<&[&str]>,
    ) -> Result<Vec<RawEntry>, OdmError> {
        if !self.entries.contains_key(base) {
            return Err(OdmError::NoSuchEntry(base.to_string()));
        }
        let mut results = Vec::new();
        for (dn, entry) in &self.entries {
            if !Self::in_scope(dn, base, scope) {
                continue;
            }
            if !Self::matches_filter(entry, filter) {
                continue;
            }
            results.push(RawEntry {
                dn: dn.clone(),
                attrs: Self::project(entry, attrs),
            });
        }
        Ok(results)
    }

    fn create(
        &mut self,
        dn: &str,
        attrs: Vec<(String, Vec<WireValue>)>,
    ) -> Result<(), OdmError> {
        if self.entries.contains_key(dn) {
            return Err(OdmError::AlreadyExists(dn.to_string()));
        }
        let mut entry = AttributeMap::new();
        for (name, values) in attrs {
            entry.entry(name).or_default().extend(values);
        }
        self.entries.insert(dn.to_string(), entry);
        self.log.push(DirectoryOp::Create { dn: dn.to_string() });
        Ok(())
    }

    fn modify(&mut self, dn: &str, mods: Vec<Modification>) -> Result<(), OdmError> {
        let Some(entry) = self.entries.get_mut(dn) else {
            return Err(OdmError::NoSuchEntry(dn.to_string()));
        };
        for m in &mods {
            match m {
                Modification::Replace(name, values) => {
                    let key = Self::stored_key(entry, name)
                        .unwrap_or_else(|| name.clone());
                    if values.is_empty() {
                        entry.remove(&key);
                    } else {
                        entry.insert(key, values.clone());
                    }
                }
                Modification::Add(name, values) => {
                    let key = Self::stored_key(entry, name)
                        .unwrap_or_else(|| name.clone());
                    entry.entry(key).or_default().extend(values.iter().cloned());
                }
                Modification::Delete(name, values) => {
                    let Some(key) = Self::stored_key(entry, name) else {
                        continue;
                    };
                    if values.is_empty() {
                        entry.remove(&key);
                    } else if let Some(current) = entry.get_mut(&key) {
                        current.retain(|v| !values.contains(v));
                        if current.is_empty() {
                            entry.remove(&key);
                        }
                    }
                }
            }
        }
        self.log.push(DirectoryOp::Modify {
            dn: dn.to_string(),
            mods,
        });
        Ok(())
    }

    fn delete(&mut self, dn: &str) -> Result<(), OdmError> {
        if self.entries.remove(dn).is_none() {
            return Err(OdmError::NoSuchEntry(dn.to_string()));
        }
        self.log.push(DirectoryOp::Delete { dn: dn.to_string() });
        Ok(())
    }

    fn rename(
        &mut self,
        dn: &str,
        new_rdn: &str,
        new_superior: Option<&str>,
        delete_old: bool,
    ) -> Result<(), OdmError> {
        let Some(mut attrs) = self.entries.remove(dn) else {
            return Err(OdmError::NoSuchEntry(dn.to_string()));
        };
        let (old_rdn, old_parent) = split_dn(dn);
        let parent = new_superior.or(old_parent);
        let new_dn = match parent {
            Some(parent) => format!("{new_rdn},{parent}"),
            None => new_rdn.to_string(),
        };
        if new_dn != dn && self.entries.contains_key(&new_dn) {
            self.entries.insert(dn.to_string(), attrs);
            return Err(OdmError::AlreadyExists(new_dn));
        }

        // Same value surgery a server performs for modrdn.
        if delete_old {
            if let Some((name, value)) = split_rdn(old_rdn) {
                let old_value = unescape_value(value).into_bytes();
                if let Some(key) = Self::stored_key(&attrs, name) {
                    if let Some(current) = attrs.get_mut(&key) {
                        current.retain(|v| v != &old_value);
                        if current.is_empty() {
                            attrs.remove(&key);
                        }
                    }
                }
            }
        }
        if let Some((name, value)) = split_rdn(new_rdn) {
            let new_value = unescape_value(value).into_bytes();
            let key = Self::stored_key(&attrs, name).unwrap_or_else(|| name.to_string());
            let values = attrs.entry(key).or_default();
            if !values.contains(&new_value) {
                values.push(new_value);
            }
        }

        self.entries.insert(new_dn, attrs);
        self.log.push(DirectoryOp::Rename {
            dn: dn.to_string(),
            new_rdn: new_rdn.to_string(),
            new_superior: new_superior.map(String::from),
            delete_old,
        });
        Ok(())
    }

    fn change_password(
        &mut self,
        dn: &str,
        _old: Option<&str>,
        new: &str,
    ) -> Result<(), OdmError> {
        let Some(entry) = self.entries.get_mut(dn) else {
            return Err(OdmError::NoSuchEntry(dn.to_string()));
        };
        entry.insert(
            "userPassword".to_string(),
            vec![new.as_bytes().to_vec()],
        );
        self.log.push(DirectoryOp::PasswordChange { dn: dn.to_string() });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> MemoryDirectory {
        let mut dir = MemoryDirectory::new();
        dir.insert_entry(
            "dc=example,dc=com",
            [("objectClass", vec!["domain"]), ("dc", vec!["example"])],
        );
        dir.insert_entry(
            "ou=people,dc=example,dc=com",
            [("ou", vec!["people"]), ("objectClass", vec!["organizationalUnit"])],
        );
        dir.insert_entry(
            "uid=jdoe,ou=people,dc=example,dc=com",
            [
                ("objectClass", vec!["person", "posixAccount"]),
                ("uid", vec!["jdoe"]),
                ("cn", vec!["John Doe"]),
            ],
        );
        dir.insert_entry(
            "uid=asmith,ou=people,dc=example,dc=com",
            [
                ("objectClass", vec!["person", "posixAccount"]),
                ("uid", vec!["asmith"]),
                ("cn", vec!["Alice Smith"]),
            ],
        );
        dir
    }

    #[test]
    fn test_search_scopes() {
        let mut dir = seeded();

        let base = dir
            .search("ou=people,dc=example,dc=com", Scope::Base, "(objectclass=*)", None)
            .unwrap();
        assert_eq!(base.len(), 1);
        assert_eq!(base[0].dn, "ou=people,dc=example,dc=com");

        let one = dir
            .search("ou=people,dc=example,dc=com", Scope::OneLevel, "(objectclass=*)", None)
            .unwrap();
        assert_eq!(one.len(), 2);
        assert!(one.iter().all(|e| e.dn.ends_with("ou=people,dc=example,dc=com")));
        assert!(one.iter().all(|e| e.dn != "ou=people,dc=example,dc=com"));

        let sub = dir
            .search("dc=example,dc=com", Scope::Subtree, "(objectclass=*)", None)
            .unwrap();
        assert_eq!(sub.len(), 4);
    }

    #[test]
    fn test_search_missing_base() {
        let mut dir = seeded();
        let err = dir
            .search("ou=nowhere,dc=example,dc=com", Scope::Base, "(objectclass=*)", None)
            .unwrap_err();
        assert!(matches!(err, OdmError::NoSuchEntry(_)));
    }

    #[test]
    fn test_search_filters() {
        let mut dir = seeded();

        let by_uid = dir
            .search("dc=example,dc=com", Scope::Subtree, "(uid=jdoe)", None)
            .unwrap();
        assert_eq!(by_uid.len(), 1);
        assert_eq!(by_uid[0].dn, "uid=jdoe,ou=people,dc=example,dc=com");

        let with_uid = dir
            .search("dc=example,dc=com", Scope::Subtree, "(UID=*)", None)
            .unwrap();
        assert_eq!(with_uid.len(), 2);

        let none = dir
            .search("dc=example,dc=com", Scope::Subtree, "(uid=nobody)", None)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_objectclass_presence_matches_entries_without_objectclass() {
        let mut dir = seeded();
        dir.insert_entry("ou=limbo,dc=example,dc=com", [("ou", vec!["limbo"])]);

        let sub = dir
            .search("dc=example,dc=com", Scope::Subtree, "(objectClass=*)", None)
            .unwrap();
        assert!(sub.iter().any(|e| e.dn == "ou=limbo,dc=example,dc=com"));

        // Presence of any other attribute still tests the entry itself.
        let with_cn = dir
            .search("dc=example,dc=com", Scope::Subtree, "(cn=*)", None)
            .unwrap();
        assert!(with_cn.iter().all(|e| e.dn != "ou=limbo,dc=example,dc=com"));
    }

    #[test]
    fn test_search_attribute_projection() {
        let mut dir = seeded();
        let results = dir
            .search(
                "uid=jdoe,ou=people,dc=example,dc=com",
                Scope::Base,
                "(objectclass=*)",
                Some(&["cn"]),
            )
            .unwrap();
        assert_eq!(results[0].attrs.len(), 1);
        assert!(results[0].attrs.contains_key("cn"));
    }

    #[test]
    fn test_create_and_collision() {
        let mut dir = seeded();
        dir.create(
            "uid=new,ou=people,dc=example,dc=com",
            vec![
                ("objectClass".to_string(), vec![b"person".to_vec()]),
                ("uid".to_string(), vec![b"new".to_vec()]),
            ],
        )
        .unwrap();
        assert!(dir.contains_entry("uid=new,ou=people,dc=example,dc=com"));
        assert_eq!(dir.log().len(), 1);

        let err = dir
            .create("uid=jdoe,ou=people,dc=example,dc=com", vec![])
            .unwrap_err();
        assert!(matches!(err, OdmError::AlreadyExists(_)));
    }

    #[test]
    fn test_modify_replace_add_delete() {
        let mut dir = seeded();
        let dn = "uid=jdoe,ou=people,dc=example,dc=com";
        dir.modify(
            dn,
            vec![
                Modification::Replace("cn".into(), vec![b"Johnny Doe".to_vec()]),
                Modification::Add("mail".into(), vec![b"jd@example.com".to_vec()]),
                Modification::Delete("uid".into(), vec![]),
            ],
        )
        .unwrap();

        let entry = dir.entry(dn).unwrap();
        assert_eq!(entry["cn"], vec![b"Johnny Doe".to_vec()]);
        assert_eq!(entry["mail"], vec![b"jd@example.com".to_vec()]);
        assert!(!entry.contains_key("uid"));
    }

    #[test]
    fn test_modify_delete_single_value() {
        let mut dir = MemoryDirectory::new();
        dir.insert_entry(
            "cn=g,dc=example,dc=com",
            [("memberUid", vec!["a", "b"])],
        );
        dir.modify(
            "cn=g,dc=example,dc=com",
            vec![Modification::Delete("memberUid".into(), vec![b"a".to_vec()])],
        )
        .unwrap();
        let entry = dir.entry("cn=g,dc=example,dc=com").unwrap();
        assert_eq!(entry["memberUid"], vec![b"b".to_vec()]);
    }

    #[test]
    fn test_modify_missing_entry() {
        let mut dir = seeded();
        let err = dir
            .modify("uid=ghost,dc=example,dc=com", vec![])
            .unwrap_err();
        assert!(matches!(err, OdmError::NoSuchEntry(_)));
    }

    #[test]
    fn test_delete() {
        let mut dir = seeded();
        dir.delete("uid=jdoe,ou=people,dc=example,dc=com").unwrap();
        assert!(!dir.contains_entry("uid=jdoe,ou=people,dc=example,dc=com"));
        assert!(matches!(
            dir.delete("uid=jdoe,ou=people,dc=example,dc=com"),
            Err(OdmError::NoSuchEntry(_))
        ));
    }

    #[test]
    fn test_rename_moves_entry_and_rewrites_rdn_value() {
        let mut dir = seeded();
        dir.rename(
            "uid=jdoe,ou=people,dc=example,dc=com",
            "uid=jdoe2",
            None,
            true,
        )
        .unwrap();

        assert!(!dir.contains_entry("uid=jdoe,ou=people,dc=example,dc=com"));
        let entry = dir.entry("uid=jdoe2,ou=people,dc=example,dc=com").unwrap();
        assert_eq!(entry["uid"], vec![b"jdoe2".to_vec()]);
    }

    #[test]
    fn test_rename_keeps_old_value_without_delete_old() {
        let mut dir = seeded();
        dir.rename(
            "uid=jdoe,ou=people,dc=example,dc=com",
            "uid=jdoe2",
            None,
            false,
        )
        .unwrap();
        let entry = dir.entry("uid=jdoe2,ou=people,dc=example,dc=com").unwrap();
        let mut values = entry["uid"].clone();
        values.sort();
        assert_eq!(values, vec![b"jdoe".to_vec(), b"jdoe2".to_vec()]);
    }

    #[test]
    fn test_rename_with_new_superior() {
        let mut dir = seeded();
        dir.insert_entry(
            "ou=archive,dc=example,dc=com",
            [("ou", vec!["archive"])],
        );
        dir.rename(
            "uid=jdoe,ou=people,dc=example,dc=com",
            "uid=jdoe",
            Some("ou=archive,dc=example,dc=com"),
            true,
        )
        .unwrap();
        assert!(dir.contains_entry("uid=jdoe,ou=archive,dc=example,dc=com"));
    }

    #[test]
    fn test_rename_collision_restores_entry() {
        let mut dir = seeded();
        let err = dir
            .rename(
                "uid=jdoe,ou=people,dc=example,dc=com",
                "uid=asmith",
                None,
                true,
            )
            .unwrap_err();
        assert!(matches!(err, OdmError::AlreadyExists(_)));
        // The source entry is still in place.
        assert!(dir.contains_entry("uid=jdoe,ou=people,dc=example,dc=com"));
    }

    #[test]
    fn test_change_password() {
        let mut dir = seeded();
        let dn = "uid=jdoe,ou=people,dc=example,dc=com";
        dir.change_password(dn, None, "s3cret").unwrap();
        assert_eq!(
            dir.entry(dn).unwrap()["userPassword"],
            vec![b"s3cret".to_vec()]
        );
        assert!(matches!(
            dir.log().last(),
            Some(DirectoryOp::PasswordChange { .. })
        ));
    }

    #[test]
    fn test_journal_records_operations_in_order() {
        let mut dir = seeded();
        dir.delete("uid=asmith,ou=people,dc=example,dc=com").unwrap();
        dir.change_password("uid=jdoe,ou=people,dc=example,dc=com", None, "x")
            .unwrap();

        let kinds: Vec<_> = dir
            .log()
            .iter()
            .map(|op| match op {
                DirectoryOp::Create { .. } => "create",
                DirectoryOp::Modify { .. } => "modify",
                DirectoryOp::Delete { .. } => "delete",
                DirectoryOp::Rename { .. } => "rename",
                DirectoryOp::PasswordChange { .. } => "password",
            })
            .collect();
        assert_eq!(kinds, vec!["delete", "password"]);

        dir.clear_log();
        assert!(dir.log().is_empty());
    }
}

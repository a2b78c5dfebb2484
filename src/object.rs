//! Mapped object capability interface.
//!
//! The mapper addresses instances only through [`LdapObject`]: a DN accessor
//! pair and attribute get/set by name, exchanging [`Value`] sequences. Typed
//! structs implement the trait by matching on attribute names;
//! [`GenericObject`] is the map-backed implementation for callers that do not
//! want to define one.

use std::collections::BTreeMap;

use crate::errors::OdmError;
use crate::value::Value;

/// The capability interface every mapped type implements.
///
/// An empty sequence (or `None` from the getter) reads as "attribute absent".
pub trait LdapObject: Default + 'static {
    /// The entry's DN, if the instance is bound to one.
    fn dn(&self) -> Option<&str>;

    /// Binds the instance to a DN.
    ///
    /// The mapper calls this after `build` and after a successful rename.
    /// While the entry exists in the directory, the DN changes only through
    /// [`crate::mapper::LdapMapper::rename`].
    fn set_dn(&mut self, dn: String);

    /// Current values of the named attribute.
    fn attribute(&self, name: &str) -> Option<Vec<Value>>;

    /// Replaces the values of the named attribute. An empty vec marks the
    /// attribute absent.
    ///
    /// Typed implementations may reject a value of the wrong variant with
    /// [`OdmError::AttributeType`].
    fn set_attribute(&mut self, name: &str, values: Vec<Value>)
        -> Result<(), OdmError>;
}

/// A map-backed mapped object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericObject {
    dn: Option<String>,
    attrs: BTreeMap<String, Vec<Value>>,
}

impl GenericObject {
    pub fn new() -> Self {
        GenericObject::default()
    }

    /// All values of an attribute; empty slice when absent.
    pub fn get(&self, name: &str) -> &[Value] {
        self.attrs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The first value of an attribute, for single-valued use.
    pub fn first(&self, name: &str) -> Option<&Value> {
        self.get(name).first()
    }

    /// Replaces an attribute's values.
    pub fn set(&mut self, name: impl Into<String>, values: Vec<Value>) {
        self.attrs.insert(name.into(), values);
    }

    /// Replaces an attribute with a single value.
    pub fn set_one(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attrs.insert(name.into(), vec![value.into()]);
    }

    /// Removes an attribute entirely, returning its previous values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<Value>> {
        self.attrs.remove(name)
    }

    /// Names of all attributes currently carried, including empty ones.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attrs.keys().map(String::as_str)
    }
}

impl LdapObject for GenericObject {
    fn dn(&self) -> Option<&str> {
        self.dn.as_deref()
    }

    fn set_dn(&mut self, dn: String) {
        self.dn = Some(dn);
    }

    fn attribute(&self, name: &str) -> Option<Vec<Value>> {
        self.attrs.get(name).cloned()
    }

    fn set_attribute(
        &mut self,
        name: &str,
        values: Vec<Value>,
    ) -> Result<(), OdmError> {
        self.attrs.insert(name.to_string(), values);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_empty_slice_for_absent() {
        let obj = GenericObject::new();
        assert!(obj.get("mail").is_empty());
        assert_eq!(obj.first("mail"), None);
    }

    #[test]
    fn test_set_and_read_back() {
        let mut obj = GenericObject::new();
        obj.set_one("uid", "jdoe");
        obj.set("mail", vec!["a@x".into(), "b@x".into()]);

        assert_eq!(obj.first("uid"), Some(&Value::Text("jdoe".into())));
        assert_eq!(obj.get("mail").len(), 2);
        assert_eq!(obj.remove("mail").map(|v| v.len()), Some(2));
        assert!(obj.get("mail").is_empty());
    }

    #[test]
    fn test_ldap_object_impl() {
        let mut obj = GenericObject::new();
        assert_eq!(obj.dn(), None);
        obj.set_dn("uid=jdoe,dc=example,dc=com".into());
        assert_eq!(obj.dn(), Some("uid=jdoe,dc=example,dc=com"));

        obj.set_attribute("cn", vec!["John Doe".into()]).unwrap();
        assert_eq!(obj.attribute("cn"), Some(vec![Value::Text("John Doe".into())]));
        // Empty vec reads back as set-but-absent.
        obj.set_attribute("cn", vec![]).unwrap();
        assert_eq!(obj.attribute("cn"), Some(vec![]));
    }
}

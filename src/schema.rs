//! In-memory subschema model.
//!
//! [`SubSchema`] holds the attribute-type and object-class records the mapper
//! consults: attribute syntaxes (walking supertype links where a record
//! declares none) and the accumulated must/may attribute sets of an
//! object-class chain. Records are pushed programmatically from an
//! already-parsed source, typically the directory's own subschema entry, and
//! the populated value is shared read-only.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::syntax::SyntaxCodec;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// An attribute-type record (RFC 4512 `AttributeTypeDescription`).
#[derive(Debug, Clone)]
pub struct AttributeType {
    oid: String,
    names: Vec<String>,
    syntax: Option<String>,
    sup: Option<String>,
}

impl AttributeType {
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        AttributeType {
            oid: oid.into(),
            names: vec![name.into()],
            syntax: None,
            sup: None,
        }
    }

    /// Adds an alternative name for this attribute type.
    pub fn with_alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Sets the syntax OID.
    pub fn with_syntax(mut self, oid: impl Into<String>) -> Self {
        self.syntax = Some(oid.into());
        self
    }

    /// Sets the supertype this attribute inherits from.
    pub fn with_sup(mut self, name: impl Into<String>) -> Self {
        self.sup = Some(name.into());
        self
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn syntax(&self) -> Option<&str> {
        self.syntax.as_deref()
    }

    pub fn sup(&self) -> Option<&str> {
        self.sup.as_deref()
    }
}

/// An object-class record (RFC 4512 `ObjectClassDescription`).
#[derive(Debug, Clone)]
pub struct ObjectClass {
    oid: String,
    names: Vec<String>,
    sup: Vec<String>,
    must: Vec<String>,
    may: Vec<String>,
}

impl ObjectClass {
    pub fn new(oid: impl Into<String>, name: impl Into<String>) -> Self {
        ObjectClass {
            oid: oid.into(),
            names: vec![name.into()],
            sup: Vec::new(),
            must: Vec::new(),
            may: Vec::new(),
        }
    }

    /// Adds an alternative name for this object class.
    pub fn with_alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Adds a superior class. Call repeatedly for multiple superiors.
    pub fn with_superior(mut self, name: impl Into<String>) -> Self {
        self.sup.push(name.into());
        self
    }

    /// Adds required attribute names.
    pub fn with_must(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.must.extend(names.into_iter().map(Into::into));
        self
    }

    /// Adds optional attribute names.
    pub fn with_may(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.may.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn oid(&self) -> &str {
        &self.oid
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn superiors(&self) -> &[String] {
        &self.sup
    }

    pub fn must(&self) -> &[String] {
        &self.must
    }

    pub fn may(&self) -> &[String] {
        &self.may
    }
}

// ---------------------------------------------------------------------------
// SubSchema
// ---------------------------------------------------------------------------

/// The populated subschema the mapper resolves names against.
///
/// Lookups are case-insensitive and accept any declared name or the OID.
#[derive(Debug, Clone, Default)]
pub struct SubSchema {
    attribute_types: Vec<AttributeType>,
    object_classes: Vec<ObjectClass>,
    attr_index: HashMap<String, usize>,
    class_index: HashMap<String, usize>,
}

impl SubSchema {
    pub fn new() -> Self {
        SubSchema::default()
    }

    pub fn push_attribute_type(&mut self, at: AttributeType) {
        let idx = self.attribute_types.len();
        self.attr_index.insert(at.oid.to_ascii_lowercase(), idx);
        for name in &at.names {
            self.attr_index.insert(name.to_ascii_lowercase(), idx);
        }
        self.attribute_types.push(at);
    }

    pub fn push_object_class(&mut self, oc: ObjectClass) {
        let idx = self.object_classes.len();
        self.class_index.insert(oc.oid.to_ascii_lowercase(), idx);
        for name in &oc.names {
            self.class_index.insert(name.to_ascii_lowercase(), idx);
        }
        self.object_classes.push(oc);
    }

    /// Looks up an attribute-type record by name or OID.
    pub fn attribute_type(&self, name_or_oid: &str) -> Option<&AttributeType> {
        self.attr_index
            .get(&name_or_oid.to_ascii_lowercase())
            .map(|&idx| &self.attribute_types[idx])
    }

    /// Looks up an object-class record by name or OID.
    pub fn object_class(&self, name_or_oid: &str) -> Option<&ObjectClass> {
        self.class_index
            .get(&name_or_oid.to_ascii_lowercase())
            .map(|&idx| &self.object_classes[idx])
    }

    /// Resolves an attribute's syntax OID, following supertype links while
    /// the record declares no syntax of its own. Cycle-safe.
    pub fn attribute_syntax(&self, name_or_oid: &str) -> Option<&str> {
        let mut visited = HashSet::new();
        let mut current = self.attribute_type(name_or_oid)?;
        loop {
            if let Some(syntax) = current.syntax() {
                return Some(syntax);
            }
            let sup = current.sup()?;
            current = self.attribute_type(sup)?;
            if !visited.insert(current.oid.as_str()) {
                return None;
            }
        }
    }

    /// The codec for an attribute, resolved through its syntax OID.
    pub fn codec_for_attribute(&self, name_or_oid: &str) -> Option<SyntaxCodec> {
        self.attribute_syntax(name_or_oid)
            .and_then(SyntaxCodec::for_syntax)
    }

    /// Accumulates the `must` and `may` attribute names of an object-class
    /// chain, walking superiors breadth-first from the given class.
    ///
    /// Each reachable class contributes once, but the returned lists are not
    /// deduplicated: a name declared by several classes in the chain appears
    /// once per declaration. Consumers test membership, so duplicates are
    /// harmless. Names that resolve to no record are skipped.
    pub fn object_class_attributes(
        &self,
        name_or_oid: &str,
    ) -> (Vec<String>, Vec<String>) {
        let mut must = Vec::new();
        let mut may = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(name_or_oid.to_string());

        while let Some(name) = queue.pop_front() {
            let Some(&idx) = self.class_index.get(&name.to_ascii_lowercase()) else {
                debug!(class = %name, "object class not in schema, skipping");
                continue;
            };
            if !visited.insert(idx) {
                continue;
            }
            let oc = &self.object_classes[idx];
            must.extend(oc.must.iter().cloned());
            may.extend(oc.may.iter().cloned());
            for sup in &oc.sup {
                queue.push_back(sup.clone());
            }
        }
        (must, may)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix_schema() -> SubSchema {
        let mut schema = SubSchema::new();

        schema.push_attribute_type(
            AttributeType::new("2.5.4.41", "name")
                .with_syntax("1.3.6.1.4.1.1466.115.121.1.15"),
        );
        schema.push_attribute_type(
            AttributeType::new("2.5.4.3", "cn")
                .with_alias("commonName")
                .with_sup("name"),
        );
        schema.push_attribute_type(
            AttributeType::new("1.3.6.1.1.1.1.0", "uidNumber")
                .with_syntax("1.3.6.1.4.1.1466.115.121.1.27"),
        );
        schema.push_attribute_type(
            AttributeType::new("1.3.6.1.1.1.1.1", "gidNumber")
                .with_syntax("1.3.6.1.4.1.1466.115.121.1.27"),
        );

        schema.push_object_class(
            ObjectClass::new("2.5.6.0", "top").with_must(["objectClass"]),
        );
        schema.push_object_class(
            ObjectClass::new("2.5.6.6", "person")
                .with_superior("top")
                .with_must(["sn", "cn"])
                .with_may(["userPassword", "telephoneNumber"]),
        );
        schema.push_object_class(
            ObjectClass::new("1.3.6.1.1.1.2.0", "posixAccount")
                .with_superior("top")
                .with_must(["cn", "uid", "uidNumber", "gidNumber", "homeDirectory"])
                .with_may(["loginShell", "gecos"]),
        );
        schema
    }

    #[test]
    fn test_lookup_is_case_insensitive_and_accepts_aliases() {
        let schema = posix_schema();
        assert!(schema.attribute_type("CN").is_some());
        assert!(schema.attribute_type("commonname").is_some());
        assert!(schema.attribute_type("2.5.4.3").is_some());
        assert!(schema.object_class("POSIXACCOUNT").is_some());
        assert!(schema.attribute_type("missing").is_none());
    }

    #[test]
    fn test_attribute_syntax_walks_supertypes() {
        let schema = posix_schema();
        // cn has no syntax of its own; name supplies it.
        assert_eq!(
            schema.attribute_syntax("cn"),
            Some("1.3.6.1.4.1.1466.115.121.1.15")
        );
        assert_eq!(
            schema.attribute_syntax("uidNumber"),
            Some("1.3.6.1.4.1.1466.115.121.1.27")
        );
    }

    #[test]
    fn test_attribute_syntax_terminates_on_cycle() {
        let mut schema = SubSchema::new();
        schema.push_attribute_type(AttributeType::new("1.1.1", "a").with_sup("b"));
        schema.push_attribute_type(AttributeType::new("1.1.2", "b").with_sup("a"));
        assert_eq!(schema.attribute_syntax("a"), None);
    }

    #[test]
    fn test_codec_resolution() {
        let schema = posix_schema();
        assert_eq!(
            schema.codec_for_attribute("uidNumber"),
            Some(SyntaxCodec::Integer)
        );
        assert_eq!(
            schema.codec_for_attribute("cn"),
            Some(SyntaxCodec::DirectoryString)
        );
        assert_eq!(schema.codec_for_attribute("missing"), None);
    }

    #[test]
    fn test_object_class_attributes_accumulates_chain() {
        let schema = posix_schema();
        let (must, may) = schema.object_class_attributes("posixAccount");
        assert!(must.iter().any(|a| a == "uidNumber"));
        assert!(must.iter().any(|a| a == "objectClass"));
        assert!(may.iter().any(|a| a == "loginShell"));
    }

    #[test]
    fn test_object_class_attributes_keeps_duplicates_across_superiors() {
        let mut schema = SubSchema::new();
        schema.push_object_class(
            ObjectClass::new("1.2.1", "baseA").with_must(["cn"]),
        );
        schema.push_object_class(
            ObjectClass::new("1.2.2", "baseB").with_must(["cn", "sn"]),
        );
        schema.push_object_class(
            ObjectClass::new("1.2.3", "derived")
                .with_superior("baseA")
                .with_superior("baseB")
                .with_must(["uid"]),
        );
        let (must, _) = schema.object_class_attributes("derived");
        // cn declared by both superiors, so it appears twice.
        assert_eq!(must.iter().filter(|a| a.as_str() == "cn").count(), 2);
        assert!(must.iter().any(|a| a == "uid"));
        assert!(must.iter().any(|a| a == "sn"));
    }

    #[test]
    fn test_object_class_attributes_terminates_on_cycle() {
        let mut schema = SubSchema::new();
        schema.push_object_class(
            ObjectClass::new("1.3.1", "loopA")
                .with_superior("loopB")
                .with_must(["a"]),
        );
        schema.push_object_class(
            ObjectClass::new("1.3.2", "loopB")
                .with_superior("loopA")
                .with_must(["b"]),
        );
        let (must, _) = schema.object_class_attributes("loopA");
        assert_eq!(must, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_object_class_attributes_skips_unknown_superior() {
        let mut schema = SubSchema::new();
        schema.push_object_class(
            ObjectClass::new("1.4.1", "orphan")
                .with_superior("notInSchema")
                .with_must(["cn"]),
        );
        let (must, may) = schema.object_class_attributes("orphan");
        assert_eq!(must, vec!["cn".to_string()]);
        assert!(may.is_empty());
    }
}

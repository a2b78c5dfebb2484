//! Object definitions: the declarative description of a mapped type.
//!
//! An [`ObjectDefinition`] names the object-classes a mapped type represents
//! and its attributes with cardinality markers. [`schemarize`] resolves each
//! attribute against a [`SubSchema`] to attach a concrete codec; without it,
//! all conversions degrade to identity pass-through.
//!
//! [`schemarize`]: ObjectDefinition::schemarize

use std::collections::HashSet;

use tracing::debug;

use crate::schema::SubSchema;
use crate::syntax::SyntaxCodec;

/// One attribute of an object definition.
#[derive(Debug, Clone)]
pub struct AttributeDef {
    name: String,
    required: bool,
    multi: bool,
    syntax: Option<String>,
    codec: Option<SyntaxCodec>,
}

impl AttributeDef {
    /// Parses an attribute spec with an optional trailing cardinality
    /// marker: `?` optional single-valued, `*` optional multi-valued,
    /// `+` required multi-valued, no marker required single-valued.
    fn parse(spec: &str) -> AttributeDef {
        let (name, required, multi) = match spec.as_bytes().last() {
            Some(b'?') => (&spec[..spec.len() - 1], false, false),
            Some(b'*') => (&spec[..spec.len() - 1], false, true),
            Some(b'+') => (&spec[..spec.len() - 1], true, true),
            _ => (spec, true, false),
        };
        AttributeDef {
            name: name.to_string(),
            required,
            multi,
            syntax: None,
            codec: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn required(&self) -> bool {
        self.required
    }

    pub fn multi_valued(&self) -> bool {
        self.multi
    }

    /// The resolved syntax OID, once `schemarize` has run.
    pub fn syntax(&self) -> Option<&str> {
        self.syntax.as_deref()
    }

    pub fn codec(&self) -> Option<SyntaxCodec> {
        self.codec
    }

    /// The codec to convert with: the resolved one, or identity pass-through
    /// when the attribute never resolved against a schema.
    pub fn effective_codec(&self) -> SyntaxCodec {
        self.codec.unwrap_or(SyntaxCodec::Identity)
    }
}

/// The declarative description of one mapped type.
#[derive(Debug, Clone)]
pub struct ObjectDefinition {
    object_classes: Vec<String>,
    attributes: Vec<AttributeDef>,
}

impl ObjectDefinition {
    /// Builds a definition from an object-class list and attribute specs.
    ///
    /// Attribute names must be unique within a definition, and `objectClass`
    /// is not a declarable attribute: the class list is written to the entry
    /// separately by the mapper.
    pub fn new(
        object_classes: impl IntoIterator<Item = impl Into<String>>,
        attribute_specs: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> ObjectDefinition {
        ObjectDefinition {
            object_classes: object_classes.into_iter().map(Into::into).collect(),
            attributes: attribute_specs
                .into_iter()
                .map(|s| AttributeDef::parse(s.as_ref()))
                .collect(),
        }
    }

    pub fn object_classes(&self) -> &[String] {
        &self.object_classes
    }

    pub fn attributes(&self) -> &[AttributeDef] {
        &self.attributes
    }

    /// The declared attribute with the given name, compared
    /// case-insensitively the way directories compare attribute names.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }

    /// Resolves every attribute's syntax and codec against the schema.
    ///
    /// Attributes that resolve to no syntax, or to a syntax the registry
    /// does not know, keep `None` and pass through unconverted.
    pub fn schemarize(&mut self, schema: &SubSchema) {
        for attr in &mut self.attributes {
            attr.syntax = schema.attribute_syntax(&attr.name).map(String::from);
            attr.codec = attr.syntax.as_deref().and_then(SyntaxCodec::for_syntax);
            if attr.codec.is_none() {
                debug!(
                    attribute = %attr.name,
                    syntax = attr.syntax.as_deref().unwrap_or("none"),
                    "no codec resolved, values pass through"
                );
            }
        }
    }

    /// Declared attribute names that appear in neither the accumulated
    /// `must` nor `may` sets of this definition's object-class chains.
    ///
    /// Advisory: the mapper logs these at registration, nothing fails.
    pub fn uncovered_attributes(&self, schema: &SubSchema) -> Vec<&str> {
        let mut covered: HashSet<String> = HashSet::new();
        for class in &self.object_classes {
            let (must, may) = schema.object_class_attributes(class);
            covered.extend(must.into_iter().map(|n| n.to_ascii_lowercase()));
            covered.extend(may.into_iter().map(|n| n.to_ascii_lowercase()));
        }
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .filter(|name| !covered.contains(&name.to_ascii_lowercase()))
            .collect()
    }
}

//! The object mapper.
//!
//! [`LdapMapper`] owns a [`Directory`] collaborator and a registration table
//! keyed by mapped-type identity. Registered types are built from query
//! results through their [`ObjectDefinition`] and written back as minimal
//! diffs against the directory's current state.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::definition::ObjectDefinition;
use crate::directory::{AttributeMap, Directory, Modification, Scope, WireValue};
use crate::dn::{parent_dn, split_dn, split_rdn, unescape_value};
use crate::errors::OdmError;
use crate::object::LdapObject;
use crate::schema::SubSchema;
use crate::syntax::SyntaxCodec;

const PRESENCE_FILTER: &str = "(objectclass=*)";

/// Maps typed objects onto directory entries.
pub struct LdapMapper<D> {
    directory: D,
    schema: Option<Arc<SubSchema>>,
    definitions: HashMap<TypeId, ObjectDefinition>,
}

impl<D: Directory> LdapMapper<D> {
    /// A mapper without a schema: all value conversion degrades to
    /// pass-through until definitions carry codecs of their own.
    pub fn new(directory: D) -> Self {
        LdapMapper {
            directory,
            schema: None,
            definitions: HashMap::new(),
        }
    }

    /// A mapper resolving registered definitions against `schema`.
    pub fn with_schema(directory: D, schema: Arc<SubSchema>) -> Self {
        LdapMapper {
            directory,
            schema: Some(schema),
            definitions: HashMap::new(),
        }
    }

    pub fn schema(&self) -> Option<&SubSchema> {
        self.schema.as_deref()
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn directory_mut(&mut self) -> &mut D {
        &mut self.directory
    }

    pub fn into_directory(self) -> D {
        self.directory
    }

    /// Registers `definition` for the mapped type `T`, resolving it against
    /// the schema when one is present. Re-registering replaces the previous
    /// definition.
    pub fn register<T: LdapObject>(&mut self, mut definition: ObjectDefinition) {
        if let Some(schema) = &self.schema {
            definition.schemarize(schema);
            for name in definition.uncovered_attributes(schema) {
                warn!(
                    attribute = name,
                    object = std::any::type_name::<T>(),
                    "attribute not covered by the declared object classes"
                );
            }
        }
        debug!(
            object = std::any::type_name::<T>(),
            classes = ?definition.object_classes(),
            "registered object definition"
        );
        self.definitions.insert(TypeId::of::<T>(), definition);
    }

    /// Removes the registration for `T`.
    pub fn unregister<T: LdapObject>(&mut self) -> Result<(), OdmError> {
        self.definitions
            .remove(&TypeId::of::<T>())
            .map(|_| ())
            .ok_or(OdmError::NotRegistered(std::any::type_name::<T>()))
    }

    /// The registered definition for `T`, if any.
    pub fn definition<T: LdapObject>(&self) -> Option<&ObjectDefinition> {
        self.definitions.get(&TypeId::of::<T>())
    }

    /// Creates an unbound instance of `T` with every declared multi-valued
    /// attribute initialized to an empty sequence.
    pub fn new_instance<T: LdapObject>(&self) -> Result<T, OdmError> {
        let definition = self.definition_for::<T>()?;
        Self::instantiate(definition)
    }

    /// Loads the entry at `dn` as a `T`.
    pub fn load<T: LdapObject>(&mut self, dn: &str) -> Result<T, OdmError> {
        self.definition_for::<T>()?;
        debug!(dn, "loading entry");
        let entries = self
            .directory
            .search(dn, Scope::Base, PRESENCE_FILTER, None)?;
        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| OdmError::NoSuchEntry(dn.to_string()))?;
        self.build(&entry.dn, &entry.attrs)
    }

    /// Loads the parent entry of `obj` as a `P`.
    pub fn load_parent<P: LdapObject, T: LdapObject>(
        &mut self,
        obj: &T,
    ) -> Result<P, OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?;
        let parent = parent_dn(dn).ok_or_else(|| OdmError::InvalidDn(dn.to_string()))?;
        self.load(parent)
    }

    /// Searches under `base` and maps every result entry to a `T`, in query
    /// result order. `filter` defaults to matching any object; zero matches
    /// yield an empty vec.
    pub fn search<T: LdapObject>(
        &mut self,
        base: &str,
        scope: Scope,
        filter: Option<&str>,
    ) -> Result<Vec<T>, OdmError> {
        self.definition_for::<T>()?;
        let filter = filter.unwrap_or(PRESENCE_FILTER);
        debug!(base, filter, "searching");
        let entries = self.directory.search(base, scope, filter, None)?;
        let mut objects = Vec::with_capacity(entries.len());
        for entry in entries {
            objects.push(self.build(&entry.dn, &entry.attrs)?);
        }
        Ok(objects)
    }

    /// Builds a `T` from a raw entry.
    ///
    /// Attribute lookup in `attrs` is by case-sensitive declared name. A
    /// required attribute with no values fails; an optional one leaves the
    /// factory default in place. Single-valued attributes take the first
    /// decoded value.
    pub fn build<T: LdapObject>(
        &self,
        dn: &str,
        attrs: &AttributeMap,
    ) -> Result<T, OdmError> {
        let definition = self.definition_for::<T>()?;
        let mut obj: T = Self::instantiate(definition)?;
        obj.set_dn(dn.to_string());
        for attr in definition.attributes() {
            match attrs.get(attr.name()) {
                Some(values) if !values.is_empty() => {
                    let codec = attr.effective_codec();
                    let mut decoded = Vec::with_capacity(values.len());
                    for raw in values {
                        decoded.push(codec.decode(raw)?);
                    }
                    if !attr.multi_valued() {
                        decoded.truncate(1);
                    }
                    obj.set_attribute(attr.name(), decoded)?;
                }
                _ => {
                    if attr.required() {
                        return Err(OdmError::MissingRequiredAttribute {
                            dn: dn.to_string(),
                            attribute: attr.name().to_string(),
                        });
                    }
                }
            }
        }
        Ok(obj)
    }

    /// Creates the directory entry for `obj`: the definition's object-class
    /// list plus every declared attribute with a non-absent value.
    pub fn add<T: LdapObject>(&mut self, obj: &T) -> Result<(), OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?;
        let Some(definition) = self.definitions.get(&TypeId::of::<T>()) else {
            return Err(OdmError::NotRegistered(std::any::type_name::<T>()));
        };
        let attrs = Self::write_entry(definition, obj)?;
        debug!(dn, attrs = attrs.len(), "adding entry");
        self.directory.create(dn, attrs)
    }

    /// Writes the difference between `obj` and the entry's current state.
    ///
    /// The entry is re-fetched at `obj`'s DN first, which is what keeps the
    /// DN and its naming attribute unchangeable through this path; renames
    /// go through [`rename`](Self::rename). The modify request is issued
    /// even when the computed diff is empty.
    pub fn modify<T: LdapObject>(&mut self, obj: &T) -> Result<(), OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?;
        let Some(definition) = self.definitions.get(&TypeId::of::<T>()) else {
            return Err(OdmError::NotRegistered(std::any::type_name::<T>()));
        };
        let entries = self
            .directory
            .search(dn, Scope::Base, PRESENCE_FILTER, None)?;
        let current = entries
            .into_iter()
            .next()
            .ok_or_else(|| OdmError::NoSuchEntry(dn.to_string()))?;
        let mods = Self::diff(definition, obj, &current.attrs)?;
        debug!(dn, mods = mods.len(), "modifying entry");
        self.directory.modify(dn, mods)
    }

    /// Deletes the entry at `obj`'s DN.
    pub fn delete<T: LdapObject>(&mut self, obj: &T) -> Result<(), OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?;
        debug!(dn, "deleting entry");
        self.directory.delete(dn)
    }

    /// Renames (and optionally moves) the entry, then updates `obj` to
    /// match: the old naming attribute is cleared when `delete_old`, the new
    /// naming attribute is set from the RDN value decoded through its codec,
    /// and the DN is recomputed.
    ///
    /// A `new_superior` equal to the current superior is treated as "no
    /// move" and omitted from the directory call. The naming attribute is
    /// handled single-valued here.
    pub fn rename<T: LdapObject>(
        &mut self,
        obj: &mut T,
        new_rdn: &str,
        new_superior: Option<&str>,
        delete_old: bool,
    ) -> Result<(), OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?.to_string();
        let (old_rdn, old_superior) = split_dn(&dn);
        let (old_attr, _) =
            split_rdn(old_rdn).ok_or_else(|| OdmError::InvalidDn(dn.clone()))?;
        let (new_attr, new_value) =
            split_rdn(new_rdn).ok_or_else(|| OdmError::InvalidDn(new_rdn.to_string()))?;

        let wire_superior = match new_superior {
            Some(superior) if old_superior == Some(superior) => None,
            other => other,
        };

        // Codecs are Copy; extract them before the directory call.
        let definition = self.definitions.get(&TypeId::of::<T>());
        let (old_name, _) = Self::naming_attribute(definition, old_attr);
        let (new_name, new_codec) = Self::naming_attribute(definition, new_attr);
        let decoded = new_codec.decode(unescape_value(new_value).as_bytes())?;

        self.directory
            .rename(&dn, new_rdn, wire_superior, delete_old)?;

        if delete_old {
            obj.set_attribute(&old_name, Vec::new())?;
        }
        obj.set_attribute(&new_name, vec![decoded])?;
        let new_dn = match wire_superior.or(old_superior) {
            Some(superior) => format!("{new_rdn},{superior}"),
            None => new_rdn.to_string(),
        };
        debug!(old_dn = %dn, new_dn = %new_dn, "renamed entry");
        obj.set_dn(new_dn);
        Ok(())
    }

    /// Changes the password of the entry at `obj`'s DN.
    pub fn change_password<T: LdapObject>(
        &mut self,
        obj: &T,
        old: Option<&str>,
        new: &str,
    ) -> Result<(), OdmError> {
        let dn = obj.dn().ok_or(OdmError::MissingDn)?;
        debug!(dn, "changing password");
        self.directory.change_password(dn, old, new)
    }

    fn definition_for<T: LdapObject>(&self) -> Result<&ObjectDefinition, OdmError> {
        self.definitions
            .get(&TypeId::of::<T>())
            .ok_or(OdmError::NotRegistered(std::any::type_name::<T>()))
    }

    fn instantiate<T: LdapObject>(definition: &ObjectDefinition) -> Result<T, OdmError> {
        let mut obj = T::default();
        for attr in definition.attributes() {
            if attr.multi_valued() {
                obj.set_attribute(attr.name(), Vec::new())?;
            }
        }
        Ok(obj)
    }

    /// The declared name and codec for an RDN attribute; identity
    /// pass-through when the attribute (or the whole type) is unregistered.
    fn naming_attribute(
        definition: Option<&ObjectDefinition>,
        name: &str,
    ) -> (String, SyntaxCodec) {
        match definition.and_then(|d| d.attribute(name)) {
            Some(attr) => (attr.name().to_string(), attr.effective_codec()),
            None => (name.to_string(), SyntaxCodec::Identity),
        }
    }

    /// Encodes `obj` into the attribute list for a create request.
    fn write_entry<T: LdapObject>(
        definition: &ObjectDefinition,
        obj: &T,
    ) -> Result<Vec<(String, Vec<WireValue>)>, OdmError> {
        let classes: Vec<WireValue> = definition
            .object_classes()
            .iter()
            .map(|class| class.clone().into_bytes())
            .collect();
        let mut entry = vec![("objectClass".to_string(), classes)];
        for attr in definition.attributes() {
            // The class list is written above, never from the instance.
            if attr.name().eq_ignore_ascii_case("objectclass") {
                continue;
            }
            let Some(mut values) = obj.attribute(attr.name()) else {
                continue;
            };
            // An empty value list reads as absent and is never written.
            if values.is_empty() {
                continue;
            }
            if !attr.multi_valued() {
                values.truncate(1);
            }
            let codec = attr.effective_codec();
            let mut encoded = Vec::with_capacity(values.len());
            for value in &values {
                encoded.push(codec.encode(value)?);
            }
            entry.push((attr.name().to_string(), encoded));
        }
        Ok(entry)
    }

    /// Computes the minimal modification list turning the directory's
    /// `current` attribute state into `obj`'s.
    fn diff<T: LdapObject>(
        definition: &ObjectDefinition,
        obj: &T,
        current: &AttributeMap,
    ) -> Result<Vec<Modification>, OdmError> {
        let mut mods = Vec::new();

        if !Self::class_list_matches(definition, current) {
            mods.push(Modification::Replace(
                "objectClass".to_string(),
                definition
                    .object_classes()
                    .iter()
                    .map(|class| class.clone().into_bytes())
                    .collect(),
            ));
        }

        for attr in definition.attributes() {
            if attr.name().eq_ignore_ascii_case("objectclass") {
                continue;
            }
            let mut values = obj.attribute(attr.name()).unwrap_or_default();
            let current_values = current.get(attr.name());
            if values.is_empty() {
                if current_values.is_some() {
                    mods.push(Modification::Delete(attr.name().to_string(), Vec::new()));
                }
                continue;
            }
            if !attr.multi_valued() {
                values.truncate(1);
            }
            let codec = attr.effective_codec();
            let mut encoded = Vec::with_capacity(values.len());
            for value in &values {
                encoded.push(codec.encode(value)?);
            }
            match current_values {
                Some(current_values) => {
                    if !Self::value_sets_equal(&encoded, current_values) {
                        mods.push(Modification::Replace(
                            attr.name().to_string(),
                            encoded,
                        ));
                    }
                }
                None => {
                    mods.push(Modification::Add(attr.name().to_string(), encoded));
                }
            }
        }
        Ok(mods)
    }

    /// Whether the entry's current object classes match the definition's,
    /// compared as sets.
    fn class_list_matches(definition: &ObjectDefinition, current: &AttributeMap) -> bool {
        let declared: HashSet<&[u8]> = definition
            .object_classes()
            .iter()
            .map(|class| class.as_bytes())
            .collect();
        let existing: HashSet<&[u8]> = current
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("objectclass"))
            .map(|(_, values)| values.iter().map(Vec::as_slice).collect())
            .unwrap_or_default();
        declared == existing
    }

    fn value_sets_equal(a: &[WireValue], b: &[WireValue]) -> bool {
        let a: HashSet<&[u8]> = a.iter().map(Vec::as_slice).collect();
        let b: HashSet<&[u8]> = b.iter().map(Vec::as_slice).collect();
        a == b
    }
}

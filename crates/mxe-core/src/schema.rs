//! Type catalog: the schema registry consulted by both passes
//!
//! The catalog is data, not code: a JSON file declaring each parameter
//! type's ordered field layout, its subparameter slots, and its path/asset
//! field libraries, plus the flattened slot structure of each entity type
//! and the asset subtype definitions. It is validated once at load time so
//! the marshallers can rely on internal consistency while processing rows.

use crate::error::{Error, Result};
use crate::value::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Asset subtype reserved for merged-texture variants. Extension inference
/// skips it so ambiguous extensions resolve to the main texture subtype.
pub const MERGED_TEXTURE_SUBTYPE: u32 = 21;

/// One declared field of a parameter type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

/// A named, repeatable subparameter slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubparamDecl {
    pub name: String,
    /// Parameter type of every instance in this slot
    #[serde(rename = "type")]
    pub param_type: String,
}

/// Layout of one parameter type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    /// Fields in declaration order; this order fixes the CSV column order
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub subparams: Vec<SubparamDecl>,
    /// Path library: `path`-typed field name -> node parameter type of the
    /// graph it references
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    /// Asset library: `asset`-typed field name -> asset definition name
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
}

impl ParamSchema {
    /// Find a declared field by name
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Nested sub-entity structure of one entity type.
///
/// The CSV column order for an entity's reference slots is exactly
/// [`EntitySchema::flat_slots`], a preorder traversal of this tree; both
/// import and export consume that single function, so they always agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    /// Parameter types required at this node's own slots
    #[serde(default)]
    pub slots: Vec<String>,
    #[serde(default)]
    pub children: Vec<EntitySchema>,
}

impl EntitySchema {
    /// Flatten the sub-entity tree into an ordered slot-type list
    pub fn flat_slots(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_slots(&mut out);
        out
    }

    fn collect_slots<'a>(&'a self, out: &mut Vec<&'a str>) {
        for slot in &self.slots {
            out.push(slot.as_str());
        }
        for child in &self.children {
            child.collect_slots(out);
        }
    }
}

/// One asset subtype definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetDef {
    pub subtype: u32,
    /// Canonical filepath extension, without the dot
    pub extension: String,
}

/// The full schema registry for one game title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeCatalog {
    #[serde(default)]
    pub params: BTreeMap<String, ParamSchema>,
    #[serde(default)]
    pub entities: BTreeMap<String, EntitySchema>,
    #[serde(default)]
    pub assets: BTreeMap<String, AssetDef>,
}

impl TypeCatalog {
    /// Parse a catalog from JSON text and validate it
    pub fn from_json(text: &str) -> Result<Self> {
        let catalog: TypeCatalog = serde_json::from_str(text)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        Self::from_json(&content)
    }

    /// Check internal consistency once, at load time
    pub fn validate(&self) -> Result<()> {
        for (type_name, schema) in &self.params {
            for (field, node_type) in &schema.paths {
                match schema.field(field) {
                    Some(def) if def.ty == FieldType::Path => {}
                    Some(_) => {
                        return Err(Error::InvalidCatalog(format!(
                            "path library of '{type_name}' names field '{field}', which is not typed 'path'"
                        )))
                    }
                    None => {
                        return Err(Error::InvalidCatalog(format!(
                            "path library of '{type_name}' names undeclared field '{field}'"
                        )))
                    }
                }
                if !self.params.contains_key(node_type) {
                    return Err(Error::InvalidCatalog(format!(
                        "path library of '{type_name}' maps '{field}' to unknown node type '{node_type}'"
                    )));
                }
            }
            for (field, def_name) in &schema.assets {
                match schema.field(field) {
                    Some(def) if def.ty == FieldType::Asset => {}
                    Some(_) => {
                        return Err(Error::InvalidCatalog(format!(
                            "asset library of '{type_name}' names field '{field}', which is not typed 'asset'"
                        )))
                    }
                    None => {
                        return Err(Error::InvalidCatalog(format!(
                            "asset library of '{type_name}' names undeclared field '{field}'"
                        )))
                    }
                }
                if !self.assets.contains_key(def_name) {
                    return Err(Error::InvalidCatalog(format!(
                        "asset library of '{type_name}' maps '{field}' to unknown asset definition '{def_name}'"
                    )));
                }
            }
            for decl in &schema.subparams {
                if !self.params.contains_key(&decl.param_type) {
                    return Err(Error::InvalidCatalog(format!(
                        "subparameter '{}' of '{type_name}' has unknown type '{}'",
                        decl.name, decl.param_type
                    )));
                }
            }
        }

        for (entity_type, schema) in &self.entities {
            for slot in schema.flat_slots() {
                if !self.params.contains_key(slot) {
                    return Err(Error::InvalidCatalog(format!(
                        "entity '{entity_type}' has a slot of unknown parameter type '{slot}'"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a parameter schema by type name
    pub fn param(&self, name: &str) -> Option<&ParamSchema> {
        self.params.get(name)
    }

    /// Return a copy with the named `utf8_string` fields flipped to
    /// `sjis_string`.
    ///
    /// The override is scoped to the catalog value handed to one
    /// container's pack/unpack run, so no state leaks between containers
    /// processed in the same batch.
    pub fn with_sjis_fields(&self, overrides: &[(String, String)]) -> Result<Self> {
        let mut catalog = self.clone();
        for (type_name, field) in overrides {
            let schema = catalog.params.get_mut(type_name).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "string-encoding override names unknown type '{type_name}'"
                ))
            })?;
            let def = schema
                .fields
                .iter_mut()
                .find(|f| &f.name == field)
                .ok_or_else(|| {
                    Error::InvalidCatalog(format!(
                        "string-encoding override names unknown field '{type_name}.{field}'"
                    ))
                })?;
            if def.ty == FieldType::Utf8String {
                def.ty = FieldType::SjisString;
            }
        }
        Ok(catalog)
    }
}

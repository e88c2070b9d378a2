//! In-memory container model
//!
//! These types mirror what the native binary codec produces and consumes:
//! typed parameters with nested subparameters, entities referencing those
//! parameters, directed path graphs, and asset records. Everything derives
//! serde so a container can round-trip through the JSON interchange form
//! used at the codec boundary.

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// One game data unit: the full contents of a native container file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Parameters of every type, sorted by ID, globally contiguous from 0
    pub params: Vec<Parameter>,
    /// Entities, sorted by (type, ID)
    pub entities: Vec<Entity>,
    /// Path graphs, sorted by ID, contiguous from 0
    pub paths: Vec<PathGraph>,
    /// Assets, sorted by ID, contiguous from 0
    pub assets: Vec<Asset>,
}

impl Container {
    /// Look up a parameter by its global ID
    pub fn find_param(&self, id: i64) -> Option<&Parameter> {
        self.params.iter().find(|p| p.id == id)
    }
}

/// A typed, schema-described record of scalar/vector fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Globally unique ID, densely contiguous across all parameter types
    pub id: i64,
    pub name: String,
    /// Names a schema entry in the type catalog
    pub param_type: String,
    /// Field values in schema declaration order
    pub fields: Vec<(String, Value)>,
    /// Subparameter instances per declared slot, in declaration order
    pub subparams: Vec<(String, Vec<Parameter>)>,
}

impl Parameter {
    /// Get a field value by name
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A typed record referencing parameters through a fixed slot list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique across all entity types; no contiguity requirement
    pub id: i64,
    pub name: String,
    pub controller_id: i64,
    /// Empty cell in the table form; not a sentinel integer
    pub unknown: Option<i64>,
    pub entity_type: String,
    /// Flattened parameter references, in catalog traversal order
    pub param_refs: Vec<ParamRef>,
}

/// One flattened entity reference slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRef {
    /// Parameter type this slot requires
    pub slot_type: String,
    pub param_id: i64,
}

/// A named directed graph whose nodes carry parameter references
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathGraph {
    /// Dense, contiguous, non-negative
    pub id: i64,
    pub name: String,
    /// Parameter type shared by every node in the graph; `None` only for a
    /// graph with no nodes and no referencing parameters
    pub node_type: Option<String>,
    pub subgraphs: Vec<Subgraph>,
}

/// An ordered node list; a node's position in the list is its identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
}

/// A graph node: a parameter reference plus variable-arity outgoing edges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub param_id: i64,
    pub next_edges: Vec<Edge>,
}

/// A directed edge carrying an order-significant parameter-ID list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Index into the same subgraph's node list
    pub next_node: usize,
    pub param_ids: Vec<i64>,
}

/// A registry entry binding an ID to a file path and a subtype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    /// Dense, contiguous from 0
    pub id: i64,
    /// Numeric subtype, declared by a referencing parameter or inferred
    /// from the filepath extension
    pub subtype: u32,
    pub unknown_id_1: i64,
    pub unknown_id_2: i64,
    pub filepath: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_find_param() {
        let c = Container {
            params: vec![Parameter {
                id: 3,
                name: "p".to_string(),
                param_type: "T".to_string(),
                fields: vec![("x".to_string(), Value::Int(1))],
                subparams: Vec::new(),
            }],
            ..Default::default()
        };
        assert!(c.find_param(3).is_some());
        assert!(c.find_param(4).is_none());
    }

    #[test]
    fn test_parameter_field_lookup() {
        let p = Parameter {
            id: 0,
            name: String::new(),
            param_type: "T".to_string(),
            fields: vec![
                ("a".to_string(), Value::Int(1)),
                ("b".to_string(), Value::UInt(2)),
            ],
            subparams: Vec::new(),
        };
        assert_eq!(p.field("b"), Some(&Value::UInt(2)));
        assert_eq!(p.field("c"), None);
    }
}

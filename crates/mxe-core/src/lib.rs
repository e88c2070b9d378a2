//! mxe-core: Bidirectional transform engine between a game container model
//! and editable CSV table sets
//!
//! This library provides functionality to:
//! - Load and validate the type catalog that describes every parameter,
//!   entity, and asset type of a game title
//! - Unpack an in-memory container into a directory of CSV tables
//! - Pack such a directory back into a container, validating every value,
//!   ID space, and cross-collection reference along the way
//!
//! Packing is fail-fast and ordered: parameters first, then entities
//! validated against them, then path graphs, then assets.

pub mod assets;
pub mod csvio;
pub mod entities;
pub mod error;
pub mod ids;
pub mod model;
pub mod params;
pub mod paths;
pub mod schema;
pub mod value;

pub use error::{Error, Result, ValueError};
pub use model::{Asset, Container, Edge, Entity, Node, ParamRef, Parameter, PathGraph, Subgraph};
pub use schema::{AssetDef, EntitySchema, FieldDef, ParamSchema, SubparamDecl, TypeCatalog};
pub use value::{decode, encode, FieldType, Value};

use std::path::Path;

/// Unpack a container into `dir` as an editable table set
pub fn unpack_container(container: &Container, catalog: &TypeCatalog, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    params::unpack_params(container, catalog, dir)?;
    entities::unpack_entities(container, catalog, dir)?;
    paths::unpack_paths(container, dir)?;
    assets::unpack_assets(container, dir)
}

/// Pack the table set under `dir` back into a container.
///
/// Collections are packed in dependency order so each referential check
/// runs against a finished collection; the first error aborts the pack.
pub fn pack_container(dir: &Path, catalog: &TypeCatalog) -> Result<Container> {
    let params = params::pack_params(dir, catalog)?;
    let entities = entities::pack_entities(dir, catalog, &params)?;
    let paths = paths::pack_paths(dir, catalog, &params)?;
    let assets = assets::pack_assets(dir, catalog, &params)?;
    Ok(Container {
        params,
        entities,
        paths,
        assets,
    })
}

//! Error types for mxe-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the value codec while decoding a single cell.
///
/// These carry only the offending text; the marshaller that called the codec
/// wraps them with the parameter type, ID, and field name.
#[derive(Debug, Error)]
pub enum ValueError {
    /// Text cannot be interpreted as the declared semantic type
    #[error("'{text}' cannot be interpreted as {expected}")]
    Malformed { text: String, expected: &'static str },

    /// Value decodes but does not fit the field's fixed-width encoding
    #[error("'{text}' cannot be serialized to {expected}")]
    OutOfRange { text: String, expected: &'static str },

    /// Hex fields must carry an explicit 0x prefix
    #[error("'{text}' is not a valid hex string: must begin with '0x'")]
    BadHexPrefix { text: String },

    /// Padding slots are reserved and must decode to zero
    #[error("'{text}' is a padding value and must be 0")]
    PadNonZero { text: String },

    /// One or more vector components failed to parse; every bad component
    /// is listed as `index (token)`
    #[error("the {kind} '{text}' components {bad} could not be interpreted as {expected}")]
    ComponentsMalformed {
        kind: &'static str,
        text: String,
        expected: &'static str,
        bad: String,
    },

    /// One or more vector components parsed but overflow their encoding
    #[error("the {kind} '{text}' components {bad} could not be serialized as {expected}")]
    ComponentsOutOfRange {
        kind: &'static str,
        text: String,
        expected: &'static str,
        bad: String,
    },

    /// More components supplied than the fixed slot count
    #[error("the {kind} '{text}' has {count} components but at most {max} are allowed")]
    TooManyComponents {
        kind: &'static str,
        text: String,
        count: usize,
        max: usize,
    },
}

/// Errors that can occur while packing or unpacking a container
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A table file's name does not match any type in the catalog
    #[error("'{path}' names the type '{type_name}', which is not defined in the type catalog")]
    UnknownType { type_name: String, path: PathBuf },

    /// The type catalog itself is malformed
    #[error("invalid type catalog: {0}")]
    InvalidCatalog(String),

    /// A row's ID column could not be parsed
    #[error("attempted to pack {type_name} entry '{value}': could not convert ID to an integer")]
    MalformedId { type_name: String, value: String },

    /// An ID was claimed twice within a scope that requires uniqueness
    #[error("attempted to pack {type_name} entry {id}: {kind} ID already used in {existing}")]
    DuplicateId {
        kind: &'static str,
        type_name: String,
        id: i64,
        existing: String,
    },

    /// Row value-column count disagrees with the schema's field count
    #[error("attempted to pack {type_name} entry {id}: number of values ({found}) does not match definition ({expected})")]
    FieldCountMismatch {
        type_name: String,
        id: i64,
        expected: usize,
        found: usize,
    },

    /// A cell failed to decode; wraps the codec error with full context
    #[error("attempted to convert '{field}' entry of {type_name} entry {id}: {source}")]
    Value {
        type_name: String,
        id: i64,
        field: String,
        #[source]
        source: ValueError,
    },

    /// A subparameter cell failed to decode
    #[error("attempted to convert '{field}' entry of {subparam_type} subparameter of {parent_type} entry {parent_id}: {source}")]
    SubparamValue {
        subparam_type: String,
        parent_type: String,
        parent_id: i64,
        field: String,
        #[source]
        source: ValueError,
    },

    /// A parameter type declares subparameters but its side-table folder is absent
    #[error("attempted to pack {type_name}.csv, which has subparameters, but the folder '{path}' that should contain them is not present")]
    MissingSubparamDir { type_name: String, path: PathBuf },

    /// A declared subparameter slot has no side table
    #[error("attempted to pack {type_name}.csv, which has the subparameter '{slot}', but the csv file '{path}' that should contain the subparameter data is not present")]
    MissingSubparamFile {
        type_name: String,
        slot: String,
        path: PathBuf,
    },

    /// A subparameter row's parent-ID column could not be parsed
    #[error("attempted to read {type_name} subparameter file '{path}': could not convert parent ID '{value}' to an integer")]
    MalformedParentId {
        type_name: String,
        path: PathBuf,
        value: String,
    },

    /// A subparameter row's value count disagrees with its schema
    #[error("attempted to pack {subparam_type} subparameter of {parent_type} entry {parent_id}: number of values ({found}) does not match definition ({expected})")]
    SubparamFieldCountMismatch {
        subparam_type: String,
        parent_type: String,
        parent_id: i64,
        expected: usize,
        found: usize,
    },

    /// An entity cell (controller, unknown, or a reference slot) failed to parse
    #[error("attempted to convert '{column}' entry of {entity_type} entry {id}: could not convert '{value}' to an integer")]
    MalformedEntityCell {
        entity_type: String,
        id: i64,
        column: String,
        value: String,
    },

    /// Entity reference-slot count disagrees with the flattened schema
    #[error("attempted to pack {entity_type} entry {id}: number of parameter references ({found}) does not match definition ({expected})")]
    SlotCountMismatch {
        entity_type: String,
        id: i64,
        expected: usize,
        found: usize,
    },

    /// An entity reference names a parameter ID that does not exist
    #[error("attempted to pack {entity_type} entry {id}: referenced parameter {param_id} does not exist")]
    DanglingParamRef {
        entity_type: String,
        id: i64,
        param_id: i64,
    },

    /// A reference resolves but its parameter's type disagrees with the slot
    #[error("attempted to pack {entity_type} entry {id}: parameter {param_id} is of type {found} but {required} is required")]
    SlotTypeMismatch {
        entity_type: String,
        id: i64,
        param_id: i64,
        found: String,
        required: String,
    },

    /// The paths folder exists but its top-level listing is missing
    #[error("attempted to pack the 'paths' folder, but could not find '{path}'")]
    MissingPathsListing { path: PathBuf },

    /// More than one node/asset type is implied for a single referenced ID.
    /// This indicates a type-catalog bug, not a table bug.
    #[error("attempted to pack {kind} {id}: internal catalog inconsistency - more than one type was found for this {kind}: {types}")]
    ReferenceTypeConflict {
        kind: &'static str,
        id: i64,
        types: String,
    },

    /// A listed path has no same-named subdirectory
    #[error("attempted to pack path '{name}': could not find the directory '{path}'")]
    MissingPathDir { name: String, path: PathBuf },

    /// A subgraph file's name is not an integer index
    #[error("attempted to pack path '{name}', subgraph file '{file}': could not interpret filename '{stem}' as an integer")]
    MalformedSubgraphName {
        name: String,
        file: String,
        stem: String,
    },

    /// A subgraph row is too short to hold a node
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: row has {len} columns but a node needs at least 2")]
    ShortNodeRow {
        name: String,
        file: String,
        row: usize,
        len: usize,
    },

    /// A node cell (label or parameter ID) could not be parsed
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: could not interpret {what} '{value}' as an integer")]
    MalformedNodeCell {
        name: String,
        file: String,
        row: usize,
        what: &'static str,
        value: String,
    },

    /// A node references a parameter ID that does not exist
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: node parameter {param_id} does not exist")]
    DanglingNodeParam {
        name: String,
        file: String,
        row: usize,
        param_id: i64,
    },

    /// A node's parameter type disagrees with the graph's node type
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: graph node type is '{expected}', but this node's parameter is '{found}'")]
    NodeTypeMismatch {
        name: String,
        file: String,
        row: usize,
        expected: String,
        found: String,
    },

    /// Edge columns must come in (next index, parameter list) pairs
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: {count} trailing edge columns do not form (next node, parameters) pairs")]
    OddEdgeColumns {
        name: String,
        file: String,
        row: usize,
        count: usize,
    },

    /// One or more edge parameter tokens failed to parse; all are listed
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: could not interpret edge parameters as a list of integers; values {bad} were problematic")]
    BadEdgeTokens {
        name: String,
        file: String,
        row: usize,
        bad: String,
    },

    /// An edge's next-node index lands outside the subgraph
    #[error("attempted to pack path '{name}', subgraph file '{file}', row {row}: next node index {index} is outside the subgraph ({node_count} nodes)")]
    EdgeIndexOutOfBounds {
        name: String,
        file: String,
        row: usize,
        index: i64,
        node_count: usize,
    },

    /// IDs required by parameter references were never defined
    #[error("attempted to pack {kind}s, but some IDs referenced in the parameters were not defined. Unable to find the IDs referenced by the following parameters:\n{listing}")]
    MissingReferenced { kind: &'static str, listing: String },

    /// An ID space required to be dense has gaps
    #[error("{kind} IDs must be contiguous; the following IDs are missing: {missing}")]
    NonContiguousIds { kind: &'static str, missing: String },

    /// An asset row does not have the four expected columns
    #[error("attempted to pack asset row {row}: row has {len} columns. Expected: [ID, Unknown ID 1, Unknown ID 2, Asset Path]")]
    AssetRowTooShort { row: usize, len: usize },

    /// An asset row's integer column could not be parsed
    #[error("attempted to pack asset row {row}, column {column}: cannot interpret '{value}' as an integer")]
    MalformedAssetCell {
        row: usize,
        column: usize,
        value: String,
    },

    /// No asset subtype could be inferred from a filepath's extension
    #[error("attempted to pack asset row {row}, ID {id}: unknown file extension '{extension}'")]
    UnknownAssetExtension {
        row: usize,
        id: i64,
        extension: String,
    },

    /// The filepath's extension disagrees with the one the referencing
    /// parameters require
    #[error("attempted to pack asset row {row}, ID {id}: found filepath extension '{found}', but the asset is referenced by parameters that expect the extension '{expected}'. These parameters are: {referencing}")]
    AssetExtensionMismatch {
        row: usize,
        id: i64,
        found: String,
        expected: String,
        referencing: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

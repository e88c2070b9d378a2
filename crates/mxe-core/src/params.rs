//! Parameter marshaller: `params/<Type>.csv` tables and their
//! `params/<Type>/<slot>.csv` subparameter side tables
//!
//! Unpacking groups the parameter collection by type and writes one table
//! per type plus one side table per declared subparameter slot. Packing is
//! the symmetric pass; it enforces global ID uniqueness while reading and
//! 0-based contiguity once every table has been consumed.

use crate::csvio;
use crate::error::{Error, Result};
use crate::ids::IdRegistry;
use crate::model::{Container, Parameter};
use crate::schema::{ParamSchema, SubparamDecl, TypeCatalog};
use crate::value::{decode, encode};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Write the parameter tables for one container
pub fn unpack_params(container: &Container, catalog: &TypeCatalog, dir: &Path) -> Result<()> {
    if container.params.is_empty() {
        return Ok(());
    }

    let params_dir = dir.join("params");
    fs::create_dir_all(&params_dir)?;

    let mut by_type: BTreeMap<&str, Vec<&Parameter>> = BTreeMap::new();
    for param in &container.params {
        by_type.entry(&param.param_type).or_default().push(param);
    }

    for (param_type, params) in by_type {
        let schema = catalog.param(param_type).ok_or_else(|| Error::UnknownType {
            type_name: param_type.to_string(),
            path: params_dir.clone(),
        })?;

        let mut header = vec!["ID".to_string(), "Name".to_string()];
        header.extend(schema.fields.iter().map(|f| f.name.clone()));

        let mut rows = Vec::with_capacity(params.len());
        for param in &params {
            let mut row = vec![param.id.to_string(), param.name.clone()];
            for def in &schema.fields {
                let value = param.field(&def.name).ok_or_else(|| Error::FieldCountMismatch {
                    type_name: param_type.to_string(),
                    id: param.id,
                    expected: schema.fields.len(),
                    found: param.fields.len(),
                })?;
                row.push(encode(value));
            }
            rows.push(row);
        }
        csvio::write_rows(&params_dir.join(format!("{param_type}.csv")), &header, &rows)?;

        // One side table per declared slot, even when empty: packing
        // requires the file to exist.
        if !schema.subparams.is_empty() {
            let subdir = params_dir.join(param_type);
            fs::create_dir_all(&subdir)?;
            for decl in &schema.subparams {
                write_subparam_table(&params, decl, catalog, &subdir)?;
            }
        }
    }

    Ok(())
}

fn write_subparam_table(
    params: &[&Parameter],
    decl: &SubparamDecl,
    catalog: &TypeCatalog,
    subdir: &Path,
) -> Result<()> {
    let sub_schema = catalog
        .param(&decl.param_type)
        .ok_or_else(|| Error::UnknownType {
            type_name: decl.param_type.clone(),
            path: subdir.to_path_buf(),
        })?;

    let mut header = vec!["Parent ID".to_string()];
    header.extend(sub_schema.fields.iter().map(|f| f.name.clone()));

    let mut rows = Vec::new();
    for param in params {
        let instances = param
            .subparams
            .iter()
            .find(|(name, _)| name == &decl.name)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[]);
        for instance in instances {
            let mut row = vec![param.id.to_string()];
            for def in &sub_schema.fields {
                let value = instance
                    .field(&def.name)
                    .ok_or_else(|| Error::FieldCountMismatch {
                        type_name: decl.param_type.clone(),
                        id: param.id,
                        expected: sub_schema.fields.len(),
                        found: instance.fields.len(),
                    })?;
                row.push(encode(value));
            }
            rows.push(row);
        }
    }

    csvio::write_rows(&subdir.join(format!("{}.csv", decl.name)), &header, &rows)
}

/// Read every parameter table under `dir/params`, returning the collection
/// sorted by ID
pub fn pack_params(dir: &Path, catalog: &TypeCatalog) -> Result<Vec<Parameter>> {
    let params_dir = dir.join("params");
    let mut out = Vec::new();
    if !params_dir.is_dir() {
        return Ok(out);
    }

    let mut registry = IdRegistry::new("parameter");

    for file in table_files(&params_dir)? {
        let param_type = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let schema = catalog.param(&param_type).ok_or_else(|| Error::UnknownType {
            type_name: param_type.clone(),
            path: file.clone(),
        })?;

        let subparam_tables = read_subparam_tables(&params_dir, &param_type, schema)?;

        let (_header, rows) = csvio::read_rows(&file)?;
        for row in rows {
            let param = pack_one_param(
                &row,
                &param_type,
                schema,
                &subparam_tables,
                catalog,
                &mut registry,
            )?;
            out.push(param);
        }
    }

    registry.check_contiguous()?;
    out.sort_by_key(|p| p.id);
    Ok(out)
}

/// Side tables for one parameter type, read once and grouped by parent ID
type SubparamTables = Vec<(SubparamDecl, BTreeMap<i64, Vec<Vec<String>>>)>;

fn read_subparam_tables(
    params_dir: &Path,
    param_type: &str,
    schema: &ParamSchema,
) -> Result<SubparamTables> {
    if schema.subparams.is_empty() {
        return Ok(Vec::new());
    }

    let subdir = params_dir.join(param_type);
    if !subdir.is_dir() {
        return Err(Error::MissingSubparamDir {
            type_name: param_type.to_string(),
            path: subdir,
        });
    }

    let mut tables = Vec::with_capacity(schema.subparams.len());
    for decl in &schema.subparams {
        let path = subdir.join(format!("{}.csv", decl.name));
        if !path.is_file() {
            return Err(Error::MissingSubparamFile {
                type_name: param_type.to_string(),
                slot: decl.name.clone(),
                path,
            });
        }

        let (_header, rows) = csvio::read_rows(&path)?;
        let mut by_parent: BTreeMap<i64, Vec<Vec<String>>> = BTreeMap::new();
        for row in rows {
            let Some(parent_text) = row.first() else {
                continue;
            };
            let parent: i64 =
                parent_text
                    .trim()
                    .parse()
                    .map_err(|_| Error::MalformedParentId {
                        type_name: param_type.to_string(),
                        path: path.clone(),
                        value: parent_text.clone(),
                    })?;
            by_parent.entry(parent).or_default().push(row[1..].to_vec());
        }
        tables.push((decl.clone(), by_parent));
    }

    Ok(tables)
}

fn pack_one_param(
    row: &[String],
    param_type: &str,
    schema: &ParamSchema,
    subparam_tables: &SubparamTables,
    catalog: &TypeCatalog,
    registry: &mut IdRegistry,
) -> Result<Parameter> {
    let id_text = row.first().map(String::as_str).unwrap_or("");
    let id: i64 = id_text.trim().parse().map_err(|_| Error::MalformedId {
        type_name: param_type.to_string(),
        value: id_text.to_string(),
    })?;
    let name = row.get(1).cloned().unwrap_or_default();

    registry.claim(id, param_type)?;

    let values = if row.len() > 2 { &row[2..] } else { &[] };
    if values.len() != schema.fields.len() {
        return Err(Error::FieldCountMismatch {
            type_name: param_type.to_string(),
            id,
            expected: schema.fields.len(),
            found: values.len(),
        });
    }

    let mut fields = Vec::with_capacity(schema.fields.len());
    for (def, text) in schema.fields.iter().zip(values) {
        let value = decode(text, def.ty).map_err(|e| Error::Value {
            type_name: param_type.to_string(),
            id,
            field: def.name.clone(),
            source: e,
        })?;
        fields.push((def.name.clone(), value));
    }

    let mut subparams = Vec::with_capacity(subparam_tables.len());
    for (decl, by_parent) in subparam_tables {
        let sub_schema = catalog
            .param(&decl.param_type)
            .ok_or_else(|| Error::InvalidCatalog(format!(
                "subparameter type '{}' vanished from the catalog",
                decl.param_type
            )))?;

        let mut instances = Vec::new();
        for sprow in by_parent.get(&id).into_iter().flatten() {
            if sprow.len() != sub_schema.fields.len() {
                return Err(Error::SubparamFieldCountMismatch {
                    subparam_type: decl.param_type.clone(),
                    parent_type: param_type.to_string(),
                    parent_id: id,
                    expected: sub_schema.fields.len(),
                    found: sprow.len(),
                });
            }
            let mut sub_fields = Vec::with_capacity(sub_schema.fields.len());
            for (def, text) in sub_schema.fields.iter().zip(sprow) {
                let value = decode(text, def.ty).map_err(|e| Error::SubparamValue {
                    subparam_type: decl.param_type.clone(),
                    parent_type: param_type.to_string(),
                    parent_id: id,
                    field: def.name.clone(),
                    source: e,
                })?;
                sub_fields.push((def.name.clone(), value));
            }
            instances.push(Parameter {
                id: -1,
                name: String::new(),
                param_type: decl.param_type.clone(),
                fields: sub_fields,
                subparams: Vec::new(),
            });
        }
        subparams.push((decl.name.clone(), instances));
    }

    Ok(Parameter {
        id,
        name,
        param_type: param_type.to_string(),
        fields,
        subparams,
    })
}

/// The `.csv` files directly inside a directory, sorted by name
pub(crate) fn table_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "csv") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn catalog() -> TypeCatalog {
        TypeCatalog::from_json(
            r#"{
                "params": {
                    "A": {"fields": [{"name": "x", "type": "uint8"}]},
                    "B": {
                        "fields": [{"name": "y", "type": "int32"}],
                        "subparams": [{"name": "extras", "type": "A"}]
                    }
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_pack_two_types() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("A.csv"), "ID,Name,x\n0,first,7\n").unwrap();
        fs::write(params.join("B.csv"), "ID,Name,y\n1,second,-3\n").unwrap();
        fs::create_dir_all(params.join("B")).unwrap();
        fs::write(params.join("B").join("extras.csv"), "Parent ID,x\n").unwrap();

        let packed = pack_params(dir.path(), &catalog()).unwrap();
        assert_eq!(packed.len(), 2);
        assert_eq!(packed[0].id, 0);
        assert_eq!(packed[0].param_type, "A");
        assert_eq!(packed[0].field("x"), Some(&Value::UInt(7)));
        assert_eq!(packed[1].id, 1);
        assert_eq!(packed[1].field("y"), Some(&Value::Int(-3)));
    }

    #[test]
    fn test_pack_missing_params_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(pack_params(dir.path(), &catalog()).unwrap().is_empty());
    }

    #[test]
    fn test_pack_duplicate_global_id_across_types() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("A.csv"), "ID,Name,x\n0,a,1\n").unwrap();
        fs::write(params.join("B.csv"), "ID,Name,y\n0,b,2\n").unwrap();
        fs::create_dir_all(params.join("B")).unwrap();
        fs::write(params.join("B").join("extras.csv"), "Parent ID,x\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        match err {
            Error::DuplicateId { id, existing, .. } => {
                assert_eq!(id, 0);
                assert_eq!(existing, "A");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pack_non_contiguous_ids() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("A.csv"), "ID,Name,x\n0,a,1\n3,b,2\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        match err {
            Error::NonContiguousIds { missing, .. } => assert_eq!(missing, "1, 2"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pack_field_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("A.csv"), "ID,Name,x\n0,a,1,9\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        assert!(matches!(
            err,
            Error::FieldCountMismatch {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_pack_wraps_value_error_with_context() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("A.csv"), "ID,Name,x\n0,a,300\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        match err {
            Error::Value {
                type_name,
                id,
                field,
                ..
            } => {
                assert_eq!(type_name, "A");
                assert_eq!(id, 0);
                assert_eq!(field, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pack_requires_subparam_file() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("B.csv"), "ID,Name,y\n0,b,1\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        assert!(matches!(err, Error::MissingSubparamDir { .. }));

        fs::create_dir_all(params.join("B")).unwrap();
        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        assert!(matches!(err, Error::MissingSubparamFile { .. }));
    }

    #[test]
    fn test_pack_attaches_subparams_by_parent_id() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("B.csv"), "ID,Name,y\n0,b0,1\n1,b1,2\n").unwrap();
        fs::create_dir_all(params.join("B")).unwrap();
        fs::write(
            params.join("B").join("extras.csv"),
            "Parent ID,x\n1,5\n0,3\n1,6\n",
        )
        .unwrap();

        let packed = pack_params(dir.path(), &catalog()).unwrap();
        let b0 = &packed[0];
        let b1 = &packed[1];

        assert_eq!(b0.subparams[0].0, "extras");
        assert_eq!(b0.subparams[0].1.len(), 1);
        assert_eq!(b0.subparams[0].1[0].field("x"), Some(&Value::UInt(3)));
        // Order within a parent follows the side table's row order
        assert_eq!(b1.subparams[0].1.len(), 2);
        assert_eq!(b1.subparams[0].1[0].field("x"), Some(&Value::UInt(5)));
        assert_eq!(b1.subparams[0].1[1].field("x"), Some(&Value::UInt(6)));
    }

    #[test]
    fn test_unpack_then_pack_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let container = Container {
            params: vec![
                Parameter {
                    id: 0,
                    name: "first".to_string(),
                    param_type: "A".to_string(),
                    fields: vec![("x".to_string(), Value::UInt(9))],
                    subparams: Vec::new(),
                },
                Parameter {
                    id: 1,
                    name: "second".to_string(),
                    param_type: "B".to_string(),
                    fields: vec![("y".to_string(), Value::Int(-5))],
                    subparams: vec![(
                        "extras".to_string(),
                        vec![Parameter {
                            id: -1,
                            name: String::new(),
                            param_type: "A".to_string(),
                            fields: vec![("x".to_string(), Value::UInt(2))],
                            subparams: Vec::new(),
                        }],
                    )],
                },
            ],
            ..Default::default()
        };

        unpack_params(&container, &catalog(), dir.path()).unwrap();
        let packed = pack_params(dir.path(), &catalog()).unwrap();
        assert_eq!(packed, container.params);
    }

    #[test]
    fn test_unknown_type_table() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join("params");
        fs::create_dir_all(&params).unwrap();
        fs::write(params.join("Mystery.csv"), "ID,Name\n0,a\n").unwrap();

        let err = pack_params(dir.path(), &catalog()).unwrap_err();
        assert!(matches!(err, Error::UnknownType { .. }));
    }
}

//! Asset registry marshaller: the `assets.csv` table
//!
//! The table carries no subtype column: a referenced asset takes its
//! subtype from the asset definition its referencing parameters name, and
//! an unreferenced one falls back to inference from the filepath
//! extension. Like the path pass, packing discovers the required IDs from
//! the packed parameters first and resolves the table against them.

use crate::csvio;
use crate::error::{Error, Result};
use crate::ids;
use crate::model::{Asset, Container, Parameter};
use crate::schema::{TypeCatalog, MERGED_TEXTURE_SUBTYPE};
use crate::value::FieldType;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

const HEADER: [&str; 4] = ["ID", "Unknown ID 1", "Unknown ID 2", "Asset Path"];

/// Write the asset table for one container
pub fn unpack_assets(container: &Container, dir: &Path) -> Result<()> {
    if container.assets.is_empty() {
        return Ok(());
    }

    let rows: Vec<Vec<String>> = container
        .assets
        .iter()
        .map(|a| {
            vec![
                a.id.to_string(),
                a.unknown_id_1.to_string(),
                a.unknown_id_2.to_string(),
                a.filepath.clone(),
            ]
        })
        .collect();
    csvio::write_rows(&dir.join("assets.csv"), &HEADER, &rows)
}

/// Asset IDs required by the packed parameters: the definition name each
/// must satisfy, and the parameters that reference each
struct Discovered {
    defs: BTreeMap<i64, String>,
    refs: BTreeMap<i64, Vec<(i64, String)>>,
}

fn discover_required(params: &[Parameter], catalog: &TypeCatalog) -> Result<Discovered> {
    let mut by_id: BTreeMap<i64, Vec<(String, i64, String)>> = BTreeMap::new();

    for param in params {
        let schema = catalog.param(&param.param_type).ok_or_else(|| {
            Error::InvalidCatalog(format!(
                "parameter type '{}' is not in the catalog",
                param.param_type
            ))
        })?;
        for def in &schema.fields {
            if def.ty != FieldType::Asset {
                continue;
            }
            let def_name = schema.assets.get(&def.name).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "field '{}' of '{}' is typed 'asset' but has no asset library entry",
                    def.name, param.param_type
                ))
            })?;
            let Some(asset_id) = param.field(&def.name).and_then(|v| v.as_ref_id()) else {
                continue;
            };
            if asset_id == -1 {
                continue;
            }
            by_id.entry(asset_id).or_default().push((
                def_name.clone(),
                param.id,
                param.param_type.clone(),
            ));
        }
    }

    let mut defs = BTreeMap::new();
    let mut refs = BTreeMap::new();
    for (id, links) in by_id {
        let unique: BTreeSet<&str> = links.iter().map(|(d, _, _)| d.as_str()).collect();
        if unique.len() != 1 {
            return Err(Error::ReferenceTypeConflict {
                kind: "asset",
                id,
                types: unique.into_iter().collect::<Vec<_>>().join(", "),
            });
        }
        defs.insert(id, links[0].0.clone());
        refs.insert(
            id,
            links.into_iter().map(|(_, pid, ptype)| (pid, ptype)).collect(),
        );
    }

    Ok(Discovered { defs, refs })
}

fn reference_listing(missing: &BTreeSet<i64>, refs: &BTreeMap<i64, Vec<(i64, String)>>) -> String {
    let mut out = String::new();
    for id in missing {
        let links = refs
            .get(id)
            .map(|v| {
                v.iter()
                    .map(|(pid, ptype)| format!("{pid} ({ptype})"))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default();
        out.push_str(&format!("{id}: {links}\n"));
    }
    out
}

fn path_extension(filepath: &str) -> &str {
    Path::new(filepath)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
}

/// Infer a subtype from a filepath extension alone.
///
/// The merged-texture subtype is skipped so an extension shared with it
/// resolves to the main variant; among the remaining candidates the lowest
/// subtype number wins.
fn infer_subtype(catalog: &TypeCatalog, extension: &str) -> Option<u32> {
    catalog
        .assets
        .values()
        .filter(|d| d.subtype != MERGED_TEXTURE_SUBTYPE && d.extension == extension)
        .map(|d| d.subtype)
        .min()
}

/// Read `dir/assets.csv`, validating every row against the packed
/// parameter collection
pub fn pack_assets(
    dir: &Path,
    catalog: &TypeCatalog,
    params: &[Parameter],
) -> Result<Vec<Asset>> {
    let discovered = discover_required(params, catalog)?;

    let table = dir.join("assets.csv");
    if !table.is_file() {
        if discovered.defs.is_empty() {
            return Ok(Vec::new());
        }
        let required: BTreeSet<i64> = discovered.defs.keys().copied().collect();
        return Err(Error::MissingReferenced {
            kind: "asset",
            listing: reference_listing(&required, &discovered.refs),
        });
    }

    let (_header, rows) = csvio::read_rows(&table)?;
    let mut assets = Vec::with_capacity(rows.len());
    let mut located: BTreeSet<i64> = BTreeSet::new();
    for (row_idx, row) in rows.iter().enumerate() {
        let row_no = row_idx + 1;
        if row.len() < 4 {
            return Err(Error::AssetRowTooShort {
                row: row_no,
                len: row.len(),
            });
        }

        let cell = |column: usize| -> Result<i64> {
            let text = row[column].trim();
            text.parse().map_err(|_| Error::MalformedAssetCell {
                row: row_no,
                column,
                value: text.to_string(),
            })
        };
        let id = cell(0)?;
        let unknown_id_1 = cell(1)?;
        let unknown_id_2 = cell(2)?;
        let filepath = row[3].clone();

        if !located.insert(id) {
            return Err(Error::DuplicateId {
                kind: "asset",
                type_name: "asset".to_string(),
                id,
                existing: "assets.csv".to_string(),
            });
        }

        let extension = path_extension(&filepath);
        let subtype = match discovered.defs.get(&id) {
            Some(def_name) => {
                let def = catalog.assets.get(def_name).ok_or_else(|| {
                    Error::InvalidCatalog(format!("unknown asset definition '{def_name}'"))
                })?;
                if def.extension != extension {
                    let referencing = discovered
                        .refs
                        .get(&id)
                        .map(|v| {
                            v.iter()
                                .map(|(pid, ptype)| format!("{pid} ({ptype})"))
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    return Err(Error::AssetExtensionMismatch {
                        row: row_no,
                        id,
                        found: extension.to_string(),
                        expected: def.extension.clone(),
                        referencing,
                    });
                }
                def.subtype
            }
            None => {
                infer_subtype(catalog, extension).ok_or_else(|| Error::UnknownAssetExtension {
                    row: row_no,
                    id,
                    extension: extension.to_string(),
                })?
            }
        };

        assets.push(Asset {
            id,
            subtype,
            unknown_id_1,
            unknown_id_2,
            filepath,
        });
    }

    let required: BTreeSet<i64> = discovered.defs.keys().copied().collect();
    let missing: BTreeSet<i64> = required.difference(&located).copied().collect();
    if !missing.is_empty() {
        return Err(Error::MissingReferenced {
            kind: "asset",
            listing: reference_listing(&missing, &discovered.refs),
        });
    }

    ids::check_contiguous("asset", &located)?;
    assets.sort_by_key(|a| a.id);
    Ok(assets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::fs;

    fn catalog() -> TypeCatalog {
        TypeCatalog::from_json(
            r#"{
                "params": {
                    "CharInfo": {
                        "fields": [{"name": "portrait", "type": "asset"}],
                        "assets": {"portrait": "texture"}
                    }
                },
                "assets": {
                    "texture": {"subtype": 2, "extension": "htx"},
                    "texture_merged": {"subtype": 21, "extension": "htx"},
                    "texture_alt": {"subtype": 5, "extension": "htx"},
                    "model": {"subtype": 1, "extension": "hmd"}
                }
            }"#,
        )
        .unwrap()
    }

    fn char_info(id: i64, portrait: i64) -> Parameter {
        Parameter {
            id,
            name: format!("c{id}"),
            param_type: "CharInfo".to_string(),
            fields: vec![("portrait".to_string(), Value::Int(portrait))],
            subparams: Vec::new(),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let params = vec![char_info(0, 0)];
        let container = Container {
            params: params.clone(),
            assets: vec![
                Asset {
                    id: 0,
                    subtype: 2,
                    unknown_id_1: 7,
                    unknown_id_2: -1,
                    filepath: "textures/face.htx".to_string(),
                },
                Asset {
                    id: 1,
                    subtype: 1,
                    unknown_id_1: 0,
                    unknown_id_2: 0,
                    filepath: "models/unit.hmd".to_string(),
                },
            ],
            ..Default::default()
        };

        unpack_assets(&container, dir.path()).unwrap();
        let packed = pack_assets(dir.path(), &catalog(), &params).unwrap();
        assert_eq!(packed, container.assets);
    }

    #[test]
    fn test_unreferenced_subtype_is_inferred_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.htx\n",
        )
        .unwrap();

        let packed = pack_assets(dir.path(), &catalog(), &[]).unwrap();
        // "htx" maps to subtypes 2, 5 and merged 21; the merged variant is
        // excluded and the lowest of the rest wins
        assert_eq!(packed[0].subtype, 2);
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.wav\n",
        )
        .unwrap();

        let err = pack_assets(dir.path(), &catalog(), &[]).unwrap_err();
        match err {
            Error::UnknownAssetExtension { id, extension, .. } => {
                assert_eq!(id, 0);
                assert_eq!(extension, "wav");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_extension_mismatch_names_referencers() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.hmd\n",
        )
        .unwrap();

        let params = vec![char_info(3, 0)];
        let err = pack_assets(dir.path(), &catalog(), &params).unwrap_err();
        match err {
            Error::AssetExtensionMismatch {
                found,
                expected,
                referencing,
                ..
            } => {
                assert_eq!(found, "hmd");
                assert_eq!(expected, "htx");
                assert!(referencing.contains("3 (CharInfo)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_referenced_assets_itemized() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.htx\n",
        )
        .unwrap();

        let params = vec![char_info(0, 0), char_info(1, 4)];
        let err = pack_assets(dir.path(), &catalog(), &params).unwrap_err();
        match err {
            Error::MissingReferenced { kind, listing } => {
                assert_eq!(kind, "asset");
                assert!(listing.contains("4: 1 (CharInfo)"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_table_without_references_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let params = vec![char_info(0, -1)];
        let packed = pack_assets(dir.path(), &catalog(), &params).unwrap();
        assert!(packed.is_empty());
    }

    #[test]
    fn test_duplicate_asset_id() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.htx\n0,0,0,y.htx\n",
        )
        .unwrap();

        let err = pack_assets(dir.path(), &catalog(), &[]).unwrap_err();
        assert!(matches!(err, Error::DuplicateId { kind: "asset", .. }));
    }

    #[test]
    fn test_non_contiguous_asset_ids() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0,x.htx\n2,0,0,y.htx\n",
        )
        .unwrap();

        let err = pack_assets(dir.path(), &catalog(), &[]).unwrap_err();
        match err {
            Error::NonContiguousIds { kind, missing } => {
                assert_eq!(kind, "asset");
                assert_eq!(missing, "1");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_short_row() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("assets.csv"),
            "ID,Unknown ID 1,Unknown ID 2,Asset Path\n0,0,0\n",
        )
        .unwrap();

        let err = pack_assets(dir.path(), &catalog(), &[]).unwrap_err();
        assert!(matches!(err, Error::AssetRowTooShort { len: 3, .. }));
    }
}

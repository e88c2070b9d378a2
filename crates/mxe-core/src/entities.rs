//! Entity marshaller: `entities/<Type>.csv` tables
//!
//! An entity's reference columns are the flattened sub-entity slot list
//! from the type catalog; the same flattening drives both unpack and pack,
//! so column order always agrees. Packing validates every reference against
//! the already-packed parameter collection.

use crate::csvio;
use crate::error::{Error, Result};
use crate::ids::IdRegistry;
use crate::model::{Container, Entity, ParamRef, Parameter};
use crate::params::table_files;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Write the entity tables for one container
pub fn unpack_entities(
    container: &Container,
    catalog: &crate::schema::TypeCatalog,
    dir: &Path,
) -> Result<()> {
    if container.entities.is_empty() {
        return Ok(());
    }

    let entities_dir = dir.join("entities");
    fs::create_dir_all(&entities_dir)?;

    let mut by_type: BTreeMap<&str, Vec<&Entity>> = BTreeMap::new();
    for entity in &container.entities {
        by_type.entry(&entity.entity_type).or_default().push(entity);
    }

    for (entity_type, entities) in by_type {
        let schema = catalog
            .entities
            .get(entity_type)
            .ok_or_else(|| Error::UnknownType {
                type_name: entity_type.to_string(),
                path: entities_dir.clone(),
            })?;
        let slots = schema.flat_slots();

        let mut header = vec![
            "ID".to_string(),
            "Name".to_string(),
            "Controller Entity".to_string(),
            "Unknown".to_string(),
        ];
        header.extend(slots.iter().map(|s| s.to_string()));

        let mut rows = Vec::with_capacity(entities.len());
        for entity in entities {
            if entity.param_refs.len() != slots.len() {
                return Err(Error::SlotCountMismatch {
                    entity_type: entity_type.to_string(),
                    id: entity.id,
                    expected: slots.len(),
                    found: entity.param_refs.len(),
                });
            }
            let mut row = vec![
                entity.id.to_string(),
                entity.name.clone(),
                entity.controller_id.to_string(),
                entity.unknown.map(|u| u.to_string()).unwrap_or_default(),
            ];
            row.extend(entity.param_refs.iter().map(|r| r.param_id.to_string()));
            rows.push(row);
        }

        csvio::write_rows(&entities_dir.join(format!("{entity_type}.csv")), &header, &rows)?;
    }

    Ok(())
}

/// Read every entity table under `dir/entities`, validating references
/// against the packed parameter collection
pub fn pack_entities(
    dir: &Path,
    catalog: &crate::schema::TypeCatalog,
    params: &[Parameter],
) -> Result<Vec<Entity>> {
    let entities_dir = dir.join("entities");
    let mut out = Vec::new();
    if !entities_dir.is_dir() {
        return Ok(out);
    }

    let params_by_id: BTreeMap<i64, &str> = params
        .iter()
        .map(|p| (p.id, p.param_type.as_str()))
        .collect();

    let mut registry = IdRegistry::new("entity");

    for file in table_files(&entities_dir)? {
        let entity_type = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let schema = catalog
            .entities
            .get(&entity_type)
            .ok_or_else(|| Error::UnknownType {
                type_name: entity_type.clone(),
                path: file.clone(),
            })?;
        let slots = schema.flat_slots();

        let (header, rows) = csvio::read_rows(&file)?;
        for row in rows {
            out.push(pack_one_entity(
                &row,
                &header,
                &entity_type,
                &slots,
                &params_by_id,
                &mut registry,
            )?);
        }
    }

    out.sort_by(|a, b| (&a.entity_type, a.id).cmp(&(&b.entity_type, b.id)));
    Ok(out)
}

fn pack_one_entity(
    row: &[String],
    header: &[String],
    entity_type: &str,
    slots: &[&str],
    params_by_id: &BTreeMap<i64, &str>,
    registry: &mut IdRegistry,
) -> Result<Entity> {
    let id_text = row.first().map(String::as_str).unwrap_or("");
    let id: i64 = id_text.trim().parse().map_err(|_| Error::MalformedId {
        type_name: entity_type.to_string(),
        value: id_text.to_string(),
    })?;
    let name = row.get(1).cloned().unwrap_or_default();

    let controller_text = row.get(2).map(String::as_str).unwrap_or("");
    let controller_id: i64 =
        controller_text
            .trim()
            .parse()
            .map_err(|_| Error::MalformedEntityCell {
                entity_type: entity_type.to_string(),
                id,
                column: "Controller Entity".to_string(),
                value: controller_text.to_string(),
            })?;

    let unknown_text = row.get(3).map(String::as_str).unwrap_or("");
    let unknown = if unknown_text.is_empty() {
        None
    } else {
        Some(
            unknown_text
                .trim()
                .parse()
                .map_err(|_| Error::MalformedEntityCell {
                    entity_type: entity_type.to_string(),
                    id,
                    column: "Unknown".to_string(),
                    value: unknown_text.to_string(),
                })?,
        )
    };

    registry.claim(id, entity_type)?;

    let values = if row.len() > 4 { &row[4..] } else { &[] };
    if values.len() != slots.len() {
        return Err(Error::SlotCountMismatch {
            entity_type: entity_type.to_string(),
            id,
            expected: slots.len(),
            found: values.len(),
        });
    }

    let mut param_refs = Vec::with_capacity(slots.len());
    for (i, (slot, text)) in slots.iter().zip(values).enumerate() {
        let column = header
            .get(i + 4)
            .cloned()
            .unwrap_or_else(|| slot.to_string());
        let param_id: i64 = text.trim().parse().map_err(|_| Error::MalformedEntityCell {
            entity_type: entity_type.to_string(),
            id,
            column,
            value: text.clone(),
        })?;

        let found = params_by_id
            .get(&param_id)
            .ok_or_else(|| Error::DanglingParamRef {
                entity_type: entity_type.to_string(),
                id,
                param_id,
            })?;
        if *found != *slot {
            return Err(Error::SlotTypeMismatch {
                entity_type: entity_type.to_string(),
                id,
                param_id,
                found: found.to_string(),
                required: slot.to_string(),
            });
        }

        param_refs.push(ParamRef {
            slot_type: slot.to_string(),
            param_id,
        });
    }

    Ok(Entity {
        id,
        name,
        controller_id,
        unknown,
        entity_type: entity_type.to_string(),
        param_refs,
    })
}

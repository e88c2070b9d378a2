//! Path graph marshaller: `paths/paths.csv` plus one directory per graph
//!
//! Each graph is a directory named after the graph, holding one file per
//! subgraph; a node's row position is its identity within the subgraph, and
//! its trailing columns are (next node index, edge parameter list) pairs.
//! Packing runs in two phases: discovery scans the packed parameters for
//! `path`-typed fields to learn which graph IDs are required and what node
//! type each must carry, then resolution reads the listing and every
//! subgraph table against those requirements.

use crate::csvio;
use crate::error::{Error, Result};
use crate::ids;
use crate::model::{Container, Edge, Node, Parameter, PathGraph, Subgraph};
use crate::schema::TypeCatalog;
use crate::value::FieldType;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Write the path listing and per-graph directories for one container
pub fn unpack_paths(container: &Container, dir: &Path) -> Result<()> {
    if container.paths.is_empty() {
        return Ok(());
    }

    let paths_dir = dir.join("paths");
    fs::create_dir_all(&paths_dir)?;

    for graph in &container.paths {
        let graph_dir = paths_dir.join(&graph.name);
        fs::create_dir_all(&graph_dir)?;

        for (i, subgraph) in graph.subgraphs.iter().enumerate() {
            let max_edges = subgraph
                .nodes
                .iter()
                .map(|n| n.next_edges.len())
                .max()
                .unwrap_or(0);

            let mut header = vec!["ID".to_string(), "Node Parameter".to_string()];
            for k in 1..=max_edges {
                header.push(format!("Next Node {k}"));
                header.push(format!("Next Node {k} Parameters"));
            }

            let mut rows = Vec::with_capacity(subgraph.nodes.len());
            for (node_idx, node) in subgraph.nodes.iter().enumerate() {
                let mut row = vec![node_idx.to_string(), node.param_id.to_string()];
                for edge in &node.next_edges {
                    row.push(edge.next_node.to_string());
                    row.push(
                        edge.param_ids
                            .iter()
                            .map(|id| id.to_string())
                            .collect::<Vec<_>>()
                            .join(" "),
                    );
                }
                rows.push(row);
            }

            csvio::write_rows(&graph_dir.join(format!("{i}.csv")), &header, &rows)?;
        }
    }

    let listing: Vec<Vec<String>> = container
        .paths
        .iter()
        .map(|g| vec![g.id.to_string(), g.name.clone()])
        .collect();
    csvio::write_rows(&paths_dir.join("paths.csv"), &["ID", "Name"], &listing)
}

/// Graph IDs required by the packed parameters: the node type each must
/// carry, and the parameters that reference each
struct Discovered {
    types: BTreeMap<i64, String>,
    refs: BTreeMap<i64, Vec<(i64, String)>>,
}

fn discover_required(params: &[Parameter], catalog: &TypeCatalog) -> Result<Discovered> {
    let mut by_id: BTreeMap<i64, Vec<(String, i64, String)>> = BTreeMap::new();

    for param in params {
        let schema = param_schema(catalog, &param.param_type)?;
        for def in &schema.fields {
            if def.ty != FieldType::Path {
                continue;
            }
            let node_type = schema.paths.get(&def.name).ok_or_else(|| {
                Error::InvalidCatalog(format!(
                    "field '{}' of '{}' is typed 'path' but has no path library entry",
                    def.name, param.param_type
                ))
            })?;
            let Some(path_id) = param.field(&def.name).and_then(|v| v.as_ref_id()) else {
                continue;
            };
            if path_id == -1 {
                continue;
            }
            by_id.entry(path_id).or_default().push((
                node_type.clone(),
                param.id,
                param.param_type.clone(),
            ));
        }
    }

    let mut types = BTreeMap::new();
    let mut refs = BTreeMap::new();
    for (id, links) in by_id {
        let unique: BTreeSet<&str> = links.iter().map(|(t, _, _)| t.as_str()).collect();
        if unique.len() != 1 {
            return Err(Error::ReferenceTypeConflict {
                kind: "path",
                id,
                types: unique.into_iter().collect::<Vec<_>>().join(", "),
            });
        }
        types.insert(id, links[0].0.clone());
        refs.insert(
            id,
            links.into_iter().map(|(_, pid, ptype)| (pid, ptype)).collect(),
        );
    }

    Ok(Discovered { types, refs })
}

fn param_schema<'a>(
    catalog: &'a TypeCatalog,
    type_name: &str,
) -> Result<&'a crate::schema::ParamSchema> {
    catalog.param(type_name).ok_or_else(|| {
        Error::InvalidCatalog(format!("parameter type '{type_name}' is not in the catalog"))
    })
}

/// Format "id: p0 (T0), p1 (T1)" lines for a set of unsatisfied IDs
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

/// Read every path graph under `dir/paths`, validating against the packed
/// parameter collection
pub fn pack_paths(
    dir: &Path,
    catalog: &TypeCatalog,
    params: &[Parameter],
) -> Result<Vec<PathGraph>> {
    let discovered = discover_required(params, catalog)?;

    let paths_dir = dir.join("paths");
    if !paths_dir.is_dir() {
        if discovered.types.is_empty() {
            return Ok(Vec::new());
        }
        return Err(Error::MissingPathsListing {
            path: paths_dir.join("paths.csv"),
        });
    }

    let listing_path = paths_dir.join("paths.csv");
    if !listing_path.is_file() {
        return Err(Error::MissingPathsListing { path: listing_path });
    }

    let (_header, listing_rows) = csvio::read_rows(&listing_path)?;
    let mut listing: Vec<(i64, String)> = Vec::with_capacity(listing_rows.len());
    let mut listed_ids: BTreeSet<i64> = BTreeSet::new();
    for row in listing_rows {
        let id_text = row.first().map(String::as_str).unwrap_or("");
        let id: i64 = id_text.trim().parse().map_err(|_| Error::MalformedId {
            type_name: "path".to_string(),
            value: id_text.to_string(),
        })?;
        let name = row.get(1).cloned().unwrap_or_default();
        if !listed_ids.insert(id) {
            return Err(Error::DuplicateId {
                kind: "path",
                type_name: name,
                id,
                existing: "paths.csv".to_string(),
            });
        }
        listing.push((id, name));
    }

    let params_by_id: BTreeMap<i64, &str> = params
        .iter()
        .map(|p| (p.id, p.param_type.as_str()))
        .collect();

    let mut graphs = Vec::with_capacity(listing.len());
    let mut located: BTreeSet<i64> = BTreeSet::new();
    for (id, name) in listing {
        let graph = pack_one_graph(&paths_dir, id, &name, &discovered, &params_by_id)?;
        graphs.push(graph);
        located.insert(id);
    }

    let required: BTreeSet<i64> = discovered.types.keys().copied().collect();
    let missing: BTreeSet<i64> = required.difference(&located).copied().collect();
    if !missing.is_empty() {
        return Err(Error::MissingReferenced {
            kind: "path",
            listing: reference_listing(&missing, &discovered.refs),
        });
    }

    ids::check_contiguous("path", &located)?;
    graphs.sort_by_key(|g| g.id);
    Ok(graphs)
}

fn pack_one_graph(
    paths_dir: &Path,
    id: i64,
    name: &str,
    discovered: &Discovered,
    params_by_id: &BTreeMap<i64, &str>,
) -> Result<PathGraph> {
    let graph_dir = paths_dir.join(name);
    if !graph_dir.is_dir() {
        return Err(Error::MissingPathDir {
            name: name.to_string(),
            path: graph_dir,
        });
    }

    // Subgraph files are named by index and processed in ascending numeric
    // order.
    let mut subgraph_files: Vec<(i64, std::path::PathBuf)> = Vec::new();
    for entry in fs::read_dir(&graph_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let index: i64 = stem.parse().map_err(|_| Error::MalformedSubgraphName {
            name: name.to_string(),
            file,
            stem: stem.clone(),
        })?;
        subgraph_files.push((index, path));
    }
    subgraph_files.sort();

    let mut graph_type: Option<String> = discovered.types.get(&id).cloned();
    let mut subgraphs = Vec::with_capacity(subgraph_files.len());
    for (_, path) in subgraph_files {
        let file = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        subgraphs.push(pack_one_subgraph(
            &path,
            name,
            &file,
            &mut graph_type,
            params_by_id,
        )?);
    }

    Ok(PathGraph {
        id,
        name: name.to_string(),
        node_type: graph_type,
        subgraphs,
    })
}

fn pack_one_subgraph(
    path: &Path,
    graph_name: &str,
    file: &str,
    graph_type: &mut Option<String>,
    params_by_id: &BTreeMap<i64, &str>,
) -> Result<Subgraph> {
    let (_header, rows) = csvio::read_rows(path)?;

    let mut nodes = Vec::with_capacity(rows.len());
    // (row, edge slot index within the node's edge list) for bounds checks
    // once the node count is known
    let mut pending_edges: Vec<(usize, i64)> = Vec::new();

    for (row_idx, row) in rows.iter().enumerate() {
        let row_no = row_idx + 1;
        if row.len() < 2 {
            return Err(Error::ShortNodeRow {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                len: row.len(),
            });
        }

        // The first column is a sanity label only; row order is identity.
        let label = row[0].trim();
        label
            .parse::<i64>()
            .map_err(|_| Error::MalformedNodeCell {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                what: "node label",
                value: label.to_string(),
            })?;

        let param_text = row[1].trim();
        let param_id: i64 = param_text.parse().map_err(|_| Error::MalformedNodeCell {
            name: graph_name.to_string(),
            file: file.to_string(),
            row: row_no,
            what: "node parameter ID",
            value: param_text.to_string(),
        })?;

        let param_type = params_by_id
            .get(&param_id)
            .ok_or_else(|| Error::DanglingNodeParam {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                param_id,
            })?;
        match graph_type {
            Some(expected) if expected.as_str() != *param_type => {
                return Err(Error::NodeTypeMismatch {
                    name: graph_name.to_string(),
                    file: file.to_string(),
                    row: row_no,
                    expected: expected.clone(),
                    found: param_type.to_string(),
                });
            }
            Some(_) => {}
            None => *graph_type = Some(param_type.to_string()),
        }

        let edge_cells = &row[2..];
        if edge_cells.len() % 2 != 0 {
            return Err(Error::OddEdgeColumns {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                count: edge_cells.len(),
            });
        }

        let mut next_edges = Vec::with_capacity(edge_cells.len() / 2);
        for pair in edge_cells.chunks(2) {
            let next_text = pair[0].trim();
            let next: i64 = next_text.parse().map_err(|_| Error::MalformedNodeCell {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                what: "next node index",
                value: next_text.to_string(),
            })?;
            pending_edges.push((row_no, next));

            let mut param_ids = Vec::new();
            let mut bad = Vec::new();
            for (tok_idx, tok) in pair[1].split_whitespace().enumerate() {
                match tok.parse::<i64>() {
                    Ok(v) => param_ids.push(v),
                    Err(_) => bad.push((tok_idx, tok)),
                }
            }
            if !bad.is_empty() {
                return Err(Error::BadEdgeTokens {
                    name: graph_name.to_string(),
                    file: file.to_string(),
                    row: row_no,
                    bad: bad
                        .iter()
                        .map(|(i, tok)| format!("{i} ('{tok}')"))
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }

            next_edges.push(Edge {
                next_node: next.max(0) as usize,
                param_ids,
            });
        }

        nodes.push(Node {
            param_id,
            next_edges,
        });
    }

    // Edge targets may point forward, so bounds are checked once every row
    // has been read.
    for (row_no, next) in pending_edges {
        if next < 0 || next as usize >= nodes.len() {
            return Err(Error::EdgeIndexOutOfBounds {
                name: graph_name.to_string(),
                file: file.to_string(),
                row: row_no,
                index: next,
                node_count: nodes.len(),
            });
        }
    }

    Ok(Subgraph { nodes })
}

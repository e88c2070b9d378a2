//! MXE container CSV tool
//!
//! Command-line tool for unpacking container JSON dumps into editable CSV
//! table sets and packing edited table sets back.

use clap::{Parser, Subcommand};
use mxe_core::{pack_container, unpack_container, Container, TypeCatalog};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Interchange suffix for container dumps
const CONTAINER_SUFFIX: &str = ".mxe.json";

#[derive(Parser)]
#[command(name = "mxe-cli")]
#[command(about = "MXE container CSV unpacker/packer", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Unpack one container dump into a CSV table set
    Unpack {
        /// Path to the container dump (.mxe.json)
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output directory (defaults to the input path minus its suffix)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Treat a string field as Shift-JIS: TYPE.FIELD (repeatable)
        #[arg(long = "sjis-field")]
        sjis_fields: Vec<String>,
    },

    /// Unpack every container dump found under a directory
    UnpackAll {
        /// Root directory to scan for .mxe.json files
        #[arg(short, long)]
        root: PathBuf,

        /// Path to the type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Treat a string field as Shift-JIS: TYPE.FIELD (repeatable)
        #[arg(long = "sjis-field")]
        sjis_fields: Vec<String>,
    },

    /// Pack one CSV table set back into a container dump
    Pack {
        /// Table set directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Output file (defaults to the directory name plus .mxe.json)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Treat a string field as Shift-JIS: TYPE.FIELD (repeatable)
        #[arg(long = "sjis-field")]
        sjis_fields: Vec<String>,
    },

    /// Pack every CSV table set found under a directory
    PackAll {
        /// Root directory to scan for table sets
        #[arg(short, long)]
        root: PathBuf,

        /// Path to the type catalog (JSON)
        #[arg(short, long)]
        catalog: PathBuf,

        /// Treat a string field as Shift-JIS: TYPE.FIELD (repeatable)
        #[arg(long = "sjis-field")]
        sjis_fields: Vec<String>,
    },
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> mxe_core::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Unpack {
            input,
            catalog,
            out,
            sjis_fields,
        } => {
            let catalog = load_catalog(&catalog, &sjis_fields)?;
            let out = out.unwrap_or_else(|| strip_suffix(&input));
            cmd_unpack(&input, &catalog, &out)
        }
        Commands::UnpackAll {
            root,
            catalog,
            sjis_fields,
        } => {
            let catalog = load_catalog(&catalog, &sjis_fields)?;
            cmd_unpack_all(&root, &catalog)
        }
        Commands::Pack {
            input,
            catalog,
            out,
            sjis_fields,
        } => {
            let catalog = load_catalog(&catalog, &sjis_fields)?;
            let out = out.unwrap_or_else(|| add_suffix(&input));
            cmd_pack(&input, &catalog, &out)
        }
        Commands::PackAll {
            root,
            catalog,
            sjis_fields,
        } => {
            let catalog = load_catalog(&catalog, &sjis_fields)?;
            cmd_pack_all(&root, &catalog)
        }
    }
}

fn load_catalog(path: &Path, sjis_fields: &[String]) -> mxe_core::Result<TypeCatalog> {
    let catalog = TypeCatalog::load(path)?;
    if sjis_fields.is_empty() {
        return Ok(catalog);
    }

    let mut overrides = Vec::with_capacity(sjis_fields.len());
    for spec in sjis_fields {
        match spec.split_once('.') {
            Some((type_name, field)) if !type_name.is_empty() && !field.is_empty() => {
                overrides.push((type_name.to_string(), field.to_string()));
            }
            _ => {
                eprintln!("Invalid --sjis-field '{}', expected 'TYPE.FIELD'", spec);
                std::process::exit(1);
            }
        }
    }
    catalog.with_sjis_fields(&overrides)
}

fn strip_suffix(input: &Path) -> PathBuf {
    let name = input.to_string_lossy();
    match name.strip_suffix(CONTAINER_SUFFIX) {
        Some(stem) => PathBuf::from(stem),
        None => input.with_extension(""),
    }
}

fn add_suffix(dir: &Path) -> PathBuf {
    let mut name = dir
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "container".to_string());
    name.push_str(CONTAINER_SUFFIX);
    dir.with_file_name(name)
}

fn read_container(path: &Path) -> mxe_core::Result<Container> {
    let text = fs::read_to_string(path).map_err(|e| mxe_core::Error::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(serde_json::from_str(&text)?)
}

fn write_container(container: &Container, path: &Path) -> mxe_core::Result<()> {
    let json = serde_json::to_string_pretty(container)?;
    fs::write(path, json)?;
    Ok(())
}

fn cmd_unpack(input: &Path, catalog: &TypeCatalog, out: &Path) -> mxe_core::Result<()> {
    let container = read_container(input)?;
    unpack_container(&container, catalog, out)?;

    println!(
        "Unpacked {} ({} parameters, {} entities, {} paths, {} assets) to {}",
        input.display(),
        container.params.len(),
        container.entities.len(),
        container.paths.len(),
        container.assets.len(),
        out.display()
    );

    Ok(())
}

fn cmd_unpack_all(root: &Path, catalog: &TypeCatalog) -> mxe_core::Result<()> {
    let mut count = 0;
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            mxe_core::Error::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk error")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !path.to_string_lossy().ends_with(CONTAINER_SUFFIX) {
            continue;
        }
        cmd_unpack(path, catalog, &strip_suffix(path))?;
        count += 1;
    }

    println!("Unpacked {} container(s)", count);
    Ok(())
}

fn cmd_pack(input: &Path, catalog: &TypeCatalog, out: &Path) -> mxe_core::Result<()> {
    let container = pack_container(input, catalog)?;
    write_container(&container, out)?;

    println!(
        "Packed {} ({} parameters, {} entities, {} paths, {} assets) to {}",
        input.display(),
        container.params.len(),
        container.entities.len(),
        container.paths.len(),
        container.assets.len(),
        out.display()
    );

    Ok(())
}

/// A directory is a table set root when it directly holds any of the table
/// layout markers
fn is_table_set(dir: &Path) -> bool {
    dir.join("params").is_dir()
        || dir.join("entities").is_dir()
        || dir.join("paths").is_dir()
        || dir.join("assets.csv").is_file()
}

fn cmd_pack_all(root: &Path, catalog: &TypeCatalog) -> mxe_core::Result<()> {
    let mut count = 0;
    let mut it = WalkDir::new(root).sort_by_file_name().into_iter();
    while let Some(entry) = it.next() {
        let entry = entry.map_err(|e| {
            mxe_core::Error::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk error")
            }))
        })?;
        if !entry.file_type().is_dir() || !is_table_set(entry.path()) {
            continue;
        }
        // Table sets do not nest
        it.skip_current_dir();
        cmd_pack(entry.path(), catalog, &add_suffix(entry.path()))?;
        count += 1;
    }

    println!("Packed {} table set(s)", count);
    Ok(())
}

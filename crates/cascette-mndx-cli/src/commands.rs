//! Command handlers

use crate::{Commands, OutputFormat};
use anyhow::{Context, Result};
use cascette_mndx::mar::FileNameDatabase;
use cascette_mndx::root::{MndxFile, MndxRootFile, normalize_path};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Run one subcommand
pub fn handle(command: Commands, format: OutputFormat) -> Result<()> {
    match command {
        Commands::Info { file } => info_command(&file, format),
        Commands::Packages { file } => packages_command(&file, format),
        Commands::List { file, prefix, mask } => {
            list_command(&file, prefix.as_deref(), mask.as_deref(), format)
        }
        Commands::Lookup { file, paths } => lookup_command(&file, &paths, format),
        Commands::Names { file, prefix } => names_command(&file, &prefix, format),
    }
}

fn load_root(path: &Path) -> Result<MndxRootFile> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    debug!("Read {} bytes from {}", data.len(), path.display());
    MndxRootFile::parse(&data).with_context(|| format!("Failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T, format: OutputFormat) -> Result<()> {
    let output = if format == OutputFormat::JsonPretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{output}");
    Ok(())
}

fn info_command(path: &Path, format: OutputFormat) -> Result<()> {
    let root = load_root(path)?;
    let databases = [root.package_names(), root.stripped_names(), root.full_names()];

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let json = serde_json::json!({
                "header_version": root.header.header_version,
                "format_version": root.header.format_version,
                "entries_total": root.header.entries_total,
                "entries_valid": root.header.entries_valid,
                "packages": root.packages().len(),
                "databases": databases
                    .iter()
                    .map(|database| serde_json::json!({
                        "names": database.num_names(),
                        "nodes": database.num_nodes(),
                        "tiers": database.tiers(),
                        "config": database.config().mask(),
                    }))
                    .collect::<Vec<_>>(),
            });
            print_json(&json, format)?;
        }
        OutputFormat::Text => {
            println!("MNDX root: {}", path.display());
            println!(
                "  Version: header {}, format {}",
                root.header.header_version, root.header.format_version
            );
            println!(
                "  Entries: {} total, {} names",
                root.header.entries_total, root.header.entries_valid
            );
            println!("  Packages: {}", root.packages().len());
            for (label, database) in ["packages", "stripped", "full"].iter().zip(databases) {
                println!(
                    "  MAR {:<9} {:>8} names {:>9} nodes {} tier(s), {}",
                    label,
                    database.num_names(),
                    database.num_nodes(),
                    database.tiers(),
                    database.config()
                );
            }
        }
    }
    Ok(())
}

fn packages_command(path: &Path, format: OutputFormat) -> Result<()> {
    let root = load_root(path)?;
    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => {
            let packages: Vec<_> = root.packages().iter().collect();
            print_json(&packages, format)?;
        }
        OutputFormat::Text => {
            for package in root.packages() {
                println!("{:>5}  {}", package.index, package.name);
            }
        }
    }
    Ok(())
}

fn list_command(
    path: &Path,
    prefix: Option<&str>,
    mask: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let root = load_root(path)?;
    let files = match (prefix, mask) {
        (None, Some(mask)) => root.find_files(mask)?,
        (prefix, mask) => {
            let mask = mask.map(normalize_path);
            let mut files = Vec::new();
            for file in root.files_with_prefix(prefix.unwrap_or_default()) {
                let file = file?;
                if mask.as_deref().is_none_or(|mask| file.matches_pattern(mask)) {
                    files.push(file);
                }
            }
            files
        }
    };
    info!("Listed {} files", files.len());

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(&files, format)?,
        OutputFormat::Text => {
            for file in &files {
                print_file(file);
            }
        }
    }
    Ok(())
}

fn print_file(file: &MndxFile) {
    println!("{}  {:>10}  {}", file.content_key, file.content_size, file.name);
}

#[derive(Serialize)]
struct LookupResult<'a> {
    path: &'a str,
    found: Option<MndxFile>,
}

fn lookup_command(path: &Path, paths: &[String], format: OutputFormat) -> Result<()> {
    let root = load_root(path)?;
    let mut results = Vec::with_capacity(paths.len());
    for query in paths {
        let found = root.resolve(query)?.map(|entry| MndxFile {
            name: normalize_path(query),
            package_index: entry.package_index(),
            content_key: entry.content_key,
            content_size: entry.content_size,
        });
        results.push(LookupResult { path: query, found });
    }

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(&results, format)?,
        OutputFormat::Text => {
            for result in &results {
                match &result.found {
                    Some(file) => print_file(file),
                    None => println!("{:>32}  {:>10}  {}", "not found", "-", result.path),
                }
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct NameRecord {
    index: u32,
    name: String,
}

fn names_command(path: &Path, prefix: &str, format: OutputFormat) -> Result<()> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let database = FileNameDatabase::parse(&data)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    let mut names = Vec::new();
    for found in database.names_with_prefix(prefix) {
        let found = found?;
        names.push(NameRecord {
            index: found.index,
            name: found.name().into_owned(),
        });
    }

    match format {
        OutputFormat::Json | OutputFormat::JsonPretty => print_json(&names, format)?,
        OutputFormat::Text => {
            for record in &names {
                println!("{:>8}  {}", record.index, record.name);
            }
        }
    }
    Ok(())
}

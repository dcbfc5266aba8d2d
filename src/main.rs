//! Shenkit CLI - Command-line tool for Shenmue archive extraction.
//!
//! This is the main entry point for the shenkit command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glob::{MatchOptions, Pattern};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use shenkit::prelude::*;
use shenkit::{map_models, ImportReport, TextureOrigin};

/// Shenkit - Shenmue archive, model and texture extraction tool
#[derive(Parser)]
#[command(name = "shenkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directories holding .tac/.tad pairs, as DIR or LABEL=DIR
    #[arg(short, long = "data", env = "SHENKIT_DATA", value_delimiter = ',', global = true)]
    data: Vec<String>,

    /// Label given to data directories without one
    #[arg(long, env = "SHENKIT_SOURCE", default_value = "s1", global = true)]
    source: String,

    /// Deepest container nesting to expand
    #[arg(long, default_value_t = 8, global = true)]
    max_depth: usize,

    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List archive entries
    List {
        /// Only entries of this kind (model, pvr, paks, pakf, chrt, ...)
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter pattern on the logical path (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show offsets, sizes and type tags
        #[arg(long)]
        detailed: bool,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Extract entries to disk under their logical paths
    Extract {
        /// Output directory
        #[arg(short, long, env = "SHENKIT_OUTPUT")]
        output: PathBuf,

        /// Only entries of this kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Filter pattern on the logical path (glob-style)
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Decode a model and resolve its textures
    Model {
        /// Logical path of the model entry
        path: String,

        /// Resolve texture names globally instead of within the model's pack
        #[arg(long)]
        global: bool,

        /// Write the model's textures as PNG files into this directory
        #[arg(short, long)]
        textures: Option<PathBuf>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Decode a texture to PNG
    Texture {
        /// Logical path of a PVR entry, a registered texture name, or with
        /// --file a path on disk
        target: String,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,

        /// Treat the target as a standalone .pvr file on disk
        #[arg(long)]
        file: bool,
    },

    /// Parse a character scene and place its characters
    Chrt {
        /// Logical path of the CHRS entry
        path: String,

        /// Pack holding the character models; found from the scene's model
        /// names when omitted
        #[arg(long)]
        pack: Option<String>,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Summarize the loaded archives
    Stats {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::List {
            kind,
            filter,
            detailed,
            json,
        } => {
            let resolver = open_resolver(&cli)?;
            cmd_list(&resolver, kind.as_deref(), filter.as_deref(), *detailed, *json)?;
        }
        Commands::Extract { output, kind, filter } => {
            let resolver = open_resolver(&cli)?;
            cmd_extract(&resolver, output, kind.as_deref(), filter.as_deref())?;
        }
        Commands::Model {
            path,
            global,
            textures,
            json,
        } => {
            let resolver = open_resolver(&cli)?;
            cmd_model(&resolver, path, *global, textures.as_deref(), *json)?;
        }
        Commands::Texture { target, output, file } => {
            if *file {
                cmd_texture_file(Path::new(target), output)?;
            } else {
                let resolver = open_resolver(&cli)?;
                cmd_texture(&resolver, target, output)?;
            }
        }
        Commands::Chrt { path, pack, json } => {
            let resolver = open_resolver(&cli)?;
            cmd_chrt(&resolver, path, pack.as_deref(), *json)?;
        }
        Commands::Stats { json } => {
            let resolver = open_resolver(&cli)?;
            cmd_stats(&resolver, *json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "shenkit=debug" } else { "shenkit=info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn source_roots(cli: &Cli) -> Result<Vec<SourceRoot>> {
    if cli.data.is_empty() {
        bail!("No data directories given; pass --data or set SHENKIT_DATA");
    }
    Ok(cli
        .data
        .iter()
        .map(|arg| match arg.split_once('=') {
            Some((label, dir)) => SourceRoot::new(label, dir),
            None => SourceRoot::new(cli.source.as_str(), arg.as_str()),
        })
        .collect())
}

fn open_resolver(cli: &Cli) -> Result<ArchiveResolver> {
    let sources = source_roots(cli)?;
    let options = ResolverOptions {
        max_depth: cli.max_depth,
        ..ResolverOptions::default()
    };

    let start = Instant::now();
    let resolver = ArchiveResolver::open(&sources, options).context("Failed to build archive index")?;
    info!(
        archives = resolver.archives().len(),
        entries = resolver.len(),
        elapsed = ?start.elapsed(),
        "archive index built"
    );
    Ok(resolver)
}

fn parse_kind(kind: Option<&str>) -> Result<Option<FileKind>> {
    kind.map(|name| {
        FileKind::from_name(name).with_context(|| {
            let known: Vec<_> = FileKind::ALL.iter().map(|k| k.name()).collect();
            format!("Unknown kind {name:?}; expected one of {}", known.join(", "))
        })
    })
    .transpose()
}

fn path_filter(filter: Option<&str>) -> Result<Option<Pattern>> {
    filter
        .map(|pattern| Pattern::new(pattern).with_context(|| format!("Invalid filter pattern {pattern:?}")))
        .transpose()
}

/// Entries matching an optional kind and path pattern, in load order.
fn select_entries(resolver: &ArchiveResolver, kind: Option<&str>, filter: Option<&str>) -> Result<Vec<EntryId>> {
    let kind = parse_kind(kind)?;
    let pattern = path_filter(filter)?;
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::default()
    };

    let candidates: Vec<EntryId> = match kind {
        Some(kind) => resolver.list_entries(kind).to_vec(),
        None => resolver.entries().map(|(id, _)| id).collect(),
    };
    Ok(candidates
        .into_iter()
        .filter(|&id| match (&pattern, resolver.entry(id)) {
            (Some(pattern), Some(entry)) => pattern.matches_with(&entry.path, options),
            (None, Some(_)) => true,
            (_, None) => false,
        })
        .collect())
}

fn progress_bar(len: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct EntrySummary<'a> {
    path: &'a str,
    name: &'a str,
    kind: Option<&'static str>,
    type_tag: &'a str,
    offset: u64,
    length: u64,
    compressed: bool,
    content_length: u64,
    children: usize,
}

fn cmd_list(
    resolver: &ArchiveResolver,
    kind: Option<&str>,
    filter: Option<&str>,
    detailed: bool,
    json: bool,
) -> Result<()> {
    let ids = select_entries(resolver, kind, filter)?;
    let entries: Vec<_> = ids.iter().filter_map(|&id| resolver.entry(id)).collect();

    if json {
        let summaries: Vec<_> = entries
            .iter()
            .map(|entry| EntrySummary {
                path: &entry.path,
                name: &entry.name,
                kind: entry.kind.map(FileKind::name),
                type_tag: &entry.type_tag,
                offset: entry.offset,
                length: entry.length,
                compressed: entry.compressed,
                content_length: entry.content_length,
                children: entry.children.len(),
            })
            .collect();
        return print_json(&summaries);
    }

    for entry in &entries {
        if detailed {
            println!(
                "{:>10} {:>10} {:>10} {} {:<6} {}",
                entry.offset,
                entry.length,
                entry.content_length,
                if entry.compressed { "Z" } else { " " },
                entry.type_tag,
                entry.path
            );
        } else {
            println!("{}", entry.path);
        }
    }

    println!("\nTotal: {} entries", entries.len());

    Ok(())
}

fn cmd_extract(resolver: &ArchiveResolver, output: &Path, kind: Option<&str>, filter: Option<&str>) -> Result<()> {
    let ids = select_entries(resolver, kind, filter)?;
    println!("Extracting {} entries to {}...", ids.len(), output.display());

    fs::create_dir_all(output)?;
    let pb = progress_bar(ids.len())?;

    let start = Instant::now();
    let mut errors = 0;
    for &id in &ids {
        if let Err(e) = resolver.extract(id, output) {
            let path = resolver.entry(id).map_or("?", |entry| entry.path.as_str());
            pb.suspend(|| warn!(path, error = %e, "extraction failed"));
            errors += 1;
        }
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!(
        "Extracted {} entries in {:?} ({} errors)",
        ids.len() - errors,
        start.elapsed(),
        errors
    );

    Ok(())
}

#[derive(Serialize)]
struct NodeSummary {
    id: u32,
    offset: u32,
    depth: usize,
    position: [f32; 3],
    rotation: [f32; 3],
    scale: [f32; 3],
    vertices: usize,
    strips: usize,
    triangles: usize,
}

#[derive(Serialize)]
struct TextureSummary {
    slot: usize,
    name: Option<String>,
    origin: String,
    width: u32,
    height: u32,
    placeholder: bool,
}

#[derive(Serialize)]
struct ModelSummary<'a> {
    path: &'a str,
    format: MeshFormat,
    report: &'a ImportReport,
    nodes: Vec<NodeSummary>,
    textures: Vec<TextureSummary>,
}

fn origin_label(resolver: &ArchiveResolver, origin: TextureOrigin) -> String {
    match origin {
        TextureOrigin::Embedded => "embedded".to_string(),
        TextureOrigin::External(id) => resolver
            .entry(id)
            .map_or_else(|| "external".to_string(), |entry| entry.path.clone()),
        TextureOrigin::Missing => "missing".to_string(),
        TextureOrigin::Placeholder => "placeholder".to_string(),
    }
}

fn cmd_model(resolver: &ArchiveResolver, path: &str, global: bool, textures: Option<&Path>, json: bool) -> Result<()> {
    let id = resolver.resolve(path).with_context(|| format!("No entry at {path}"))?;
    let scope = if global {
        TextureScope::Global
    } else {
        default_scope(resolver, id)
    };
    let model = import_model(resolver, id, scope).with_context(|| format!("Failed to decode model {path}"))?;
    let scene = &model.scene;

    let nodes: Vec<NodeSummary> = scene
        .depth_first()
        .into_iter()
        .map(|(node_id, depth)| {
            let node = scene.node(node_id);
            let mesh = node.mesh.as_ref();
            NodeSummary {
                id: node.id,
                offset: node.offset,
                depth,
                position: node.transform.position,
                rotation: node.transform.rotation,
                scale: node.transform.scale,
                vertices: mesh.map_or(0, |m| m.positions.len()),
                strips: mesh.map_or(0, |m| m.strips.len()),
                triangles: mesh.map_or(0, |m| m.triangle_count()),
            }
        })
        .collect();
    let texture_summaries: Vec<TextureSummary> = model
        .textures
        .iter()
        .enumerate()
        .map(|(slot, resolved)| TextureSummary {
            slot,
            name: resolved.name.clone(),
            origin: origin_label(resolver, resolved.origin),
            width: resolved.texture.width,
            height: resolved.texture.height,
            placeholder: resolved.texture.is_placeholder(),
        })
        .collect();

    if let Some(dir) = textures {
        fs::create_dir_all(dir)?;
        for (slot, resolved) in model.textures.iter().enumerate() {
            let file = match &resolved.name {
                Some(name) => format!("{slot:03}_{name}.png"),
                None => format!("{slot:03}.png"),
            };
            resolved
                .texture
                .save_png(dir.join(&file))
                .with_context(|| format!("Failed to write {file}"))?;
        }
    }

    if json {
        return print_json(&ModelSummary {
            path,
            format: scene.format,
            report: &model.report,
            nodes,
            textures: texture_summaries,
        });
    }

    println!("{path} ({} format)", scene.format);
    for node in &nodes {
        println!(
            "{:indent$}node {} @ {:#x}: pos {:?} rot {:?} scale {:?}, {} vertices, {} strips, {} triangles",
            "",
            node.id,
            node.offset,
            node.position,
            node.rotation,
            node.scale,
            node.vertices,
            node.strips,
            node.triangles,
            indent = node.depth * 2
        );
    }
    for texture in &texture_summaries {
        println!(
            "texture {:>3} {:<10} {}x{} {}{}",
            texture.slot,
            texture.name.as_deref().unwrap_or("-"),
            texture.width,
            texture.height,
            texture.origin,
            if texture.placeholder { " (placeholder)" } else { "" }
        );
    }
    for diagnostic in &model.report.diagnostics {
        println!("warning: {diagnostic}");
    }
    println!("{}", model.report);

    Ok(())
}

fn cmd_texture(resolver: &ArchiveResolver, target: &str, output: &Path) -> Result<()> {
    let texture = match resolver.resolve(target) {
        Ok(id) => {
            let source = resolver.open_entry(id)?;
            decode_pvr(&source).with_context(|| format!("Failed to decode texture entry {target}"))?
        }
        Err(_) => {
            let source = resolver
                .texture_source(target, TextureScope::Global)
                .with_context(|| format!("{target} is neither an entry path nor a registered texture name"))?;
            shenkit::pvr::decode_texture_node(&source)
                .with_context(|| format!("Failed to decode texture {target}"))?
                .texture
        }
    };
    write_texture(&texture, output)
}

fn cmd_texture_file(input: &Path, output: &Path) -> Result<()> {
    let data = fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let texture = decode_pvr(&ByteSource::from_vec(data)).context("Failed to decode texture")?;
    write_texture(&texture, output)
}

fn write_texture(texture: &Texture, output: &Path) -> Result<()> {
    if texture.is_placeholder() {
        warn!(
            color = %texture.color_format,
            storage = %texture.storage_format,
            "unsupported pixel format, writing placeholder"
        );
    }
    texture.save_png(output).context("Failed to write PNG")?;
    println!(
        "{}x{} {} {} -> {}",
        texture.width,
        texture.height,
        texture.color_format,
        texture.storage_format,
        output.display()
    );
    Ok(())
}

#[derive(Serialize)]
struct PlacementSummary {
    character: String,
    image: Option<String>,
    model: String,
    position: [f32; 3],
    angles: [f32; 3],
}

#[derive(Serialize)]
struct ChrtSummary<'a> {
    scene: &'a CharacterScene,
    pack: Option<String>,
    map_models: Vec<String>,
    placements: Vec<PlacementSummary>,
}

fn cmd_chrt(resolver: &ArchiveResolver, path: &str, pack: Option<&str>, json: bool) -> Result<()> {
    let id = resolver.resolve(path).with_context(|| format!("No entry at {path}"))?;
    let scene = load_character_scene(resolver, id).with_context(|| format!("Failed to parse {path}"))?;

    let pack = match pack {
        Some(pack) => Some(resolver.resolve(pack).with_context(|| format!("No entry at {pack}"))?),
        None => {
            let candidates = scene_containers(resolver, &scene);
            if candidates.len() > 1 {
                warn!(candidates = candidates.len(), "several packs hold every model, using the first");
            }
            candidates.first().copied()
        }
    };

    let entry_path = |id: EntryId| resolver.entry(id).map_or_else(String::new, |entry| entry.path.clone());
    let (map, placements) = match pack {
        Some(pack) => (map_models(resolver, pack), place_characters(resolver, &scene, pack)),
        None => (Vec::new(), Vec::new()),
    };
    let placements: Vec<PlacementSummary> = placements
        .into_iter()
        .map(|placement| PlacementSummary {
            character: placement.character,
            image: placement.image,
            model: entry_path(placement.model),
            position: placement.position,
            angles: placement.angles,
        })
        .collect();
    let map: Vec<String> = map.into_iter().map(entry_path).collect();

    if json {
        return print_json(&ChrtSummary {
            scene: &scene,
            pack: pack.map(entry_path),
            map_models: map,
            placements,
        });
    }

    println!(
        "{path}: {} image definitions, {} characters, {} properties",
        scene.images.len(),
        scene.characters.len(),
        scene.properties.len()
    );
    if let Some(name) = &scene.stopped_at {
        println!("warning: stopped at unknown property {name:?}");
    }
    for image in &scene.images {
        println!("image {:<8} model {}", image.id, image.model.as_deref().unwrap_or("-"));
    }
    match pack {
        Some(pack) => println!("pack {}", entry_path(pack)),
        None => println!("no pack holds every model"),
    }
    for model in &map {
        println!("map {model}");
    }
    for placement in &placements {
        println!(
            "character {:<8} {} at {:?} angles {:?}",
            placement.character, placement.model, placement.position, placement.angles
        );
    }

    Ok(())
}

#[derive(Serialize)]
struct StatsSummary {
    archives: usize,
    entries: usize,
    top_level: usize,
    compressed: usize,
    containers: usize,
    texture_names: usize,
    unknown: usize,
    by_kind: Vec<(&'static str, usize)>,
    unknown_types: Vec<(String, usize)>,
}

fn cmd_stats(resolver: &ArchiveResolver, json: bool) -> Result<()> {
    let stats = resolver.stats();
    let summary = StatsSummary {
        archives: stats.archives,
        entries: stats.entries,
        top_level: stats.top_level,
        compressed: stats.compressed,
        containers: stats.containers,
        texture_names: stats.texture_names,
        unknown: stats.unknown,
        by_kind: stats.by_kind.iter().map(|&(kind, count)| (kind.name(), count)).collect(),
        unknown_types: resolver.unknown_types(),
    };

    if json {
        return print_json(&summary);
    }

    println!("Archives:      {}", summary.archives);
    println!("Entries:       {} ({} top-level)", summary.entries, summary.top_level);
    println!("Compressed:    {}", summary.compressed);
    println!("Containers:    {}", summary.containers);
    println!("Texture names: {}", summary.texture_names);
    for (kind, count) in &summary.by_kind {
        println!("  {kind:<8} {count}");
    }
    if !summary.unknown_types.is_empty() {
        println!("Unknown types: {}", summary.unknown);
        for (tag, count) in &summary.unknown_types {
            println!("  {tag:<8} {count}");
        }
    }

    Ok(())
}

//! flatbvh CLI - build and inspect stackless BVH buffers.

use flatbvh::prelude::*;
use std::env;
use std::fs::File;
use std::io::BufWriter;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

/// Parsed command line.
struct Options<'a> {
    command: &'a str,
    scene: Option<&'a str>,
    output: Option<&'a str>,
    config: Option<&'a str>,
    packed: bool,
    json: bool,
}

fn main() {
    let args: Vec<String> = env::args().collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "warn",
            _ => filtered_args.push(arg),
        }
    }
    init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return;
    }

    let opts = match parse_options(&filtered_args) {
        Ok(o) => o,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            std::process::exit(1);
        }
    };

    let result = match opts.command {
        "b" | "build" => cmd_build(&opts),
        "t" | "tree" => cmd_tree(&opts),
        "s" | "stats" => cmd_stats(&opts),
        "d" | "dump" => cmd_dump(&opts),
        "h" | "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        "--version" | "version" => {
            println!(
                "flatbvh {} (built {})",
                env!("CARGO_PKG_VERSION"),
                env!("FLATBVH_BUILD_DATE")
            );
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            eprintln!("Run 'flatbvh help' for usage.");
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the verbosity flags when set.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn parse_options<'a>(args: &[&'a str]) -> std::result::Result<Options<'a>, String> {
    let mut opts = Options {
        command: args[0],
        scene: None,
        output: None,
        config: None,
        packed: false,
        json: false,
    };
    let mut rest = args[1..].iter();
    while let Some(&arg) = rest.next() {
        match arg {
            "-o" | "--output" => {
                opts.output = Some(rest.next().copied().ok_or("missing value for --output")?);
            }
            "-c" | "--config" => {
                opts.config = Some(rest.next().copied().ok_or("missing value for --config")?);
            }
            "--packed" => opts.packed = true,
            "-j" | "--json" => opts.json = true,
            _ if opts.scene.is_none() => opts.scene = Some(arg),
            _ => return Err(format!("unexpected argument: {}", arg)),
        }
    }
    Ok(opts)
}

fn print_help() {
    println!("flatbvh - SAH BVH builder with stackless hit/miss flattening");
    println!();
    println!("USAGE:");
    println!("    flatbvh [OPTIONS] <COMMAND> <scene.json> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    b, build <scene> [-o out.bin]   Build and write the record buffer");
    println!("    t, tree  <scene>                Print the tree hierarchy");
    println!("    s, stats <scene>                Print build statistics with timing");
    println!("    d, dump  <scene> [--json]       Print every record");
    println!("    h, help                         Show this help");
    println!("    version                         Show version");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose         Show debug output");
    println!("    -vv, --trace          Show trace output (very verbose)");
    println!("    -q, --quiet           Only warnings and errors");
    println!("    -c, --config <file>   Build settings (JSON: bins, layout)");
    println!("    --packed              12-byte records instead of 16-byte");
    println!();
    println!("EXAMPLES:");
    println!("    flatbvh build scene.json -o scene.bvh");
    println!("    flatbvh tree scene.json");
    println!("    flatbvh dump scene.json --json");
    println!("    flatbvh -v stats terrain.json");
    println!();
    println!("NOTES:");
    println!("    - A scene with no primitives produces no buffer at all");
    println!("    - RUST_LOG overrides -v/-q");
}

fn load_settings(opts: &Options<'_>) -> Result<BuildSettings> {
    let mut settings = match opts.config {
        Some(path) => BuildSettings::load(path)?,
        None => BuildSettings::default(),
    };
    if opts.packed {
        settings.layout = RecordLayout::Packed;
    }
    Ok(settings)
}

fn load_primitives(opts: &Options<'_>) -> Result<Vec<Primitive>> {
    let path = opts
        .scene
        .ok_or_else(|| Error::other(format!("missing scene argument for '{}'", opts.command)))?;
    tracing::info!("Loading scene: {}", path);
    SceneFile::load(path)?.primitives()
}

/// Build the tree, or report that there is nothing to build.
fn build_tree(opts: &Options<'_>) -> Result<Option<(Bvh, BuildSettings)>> {
    let settings = load_settings(opts)?;
    let prims = load_primitives(opts)?;
    let bvh = Bvh::build_with(&prims, &settings)?;
    if bvh.is_empty() {
        println!("Scene has no primitives; nothing to build.");
        return Ok(None);
    }
    Ok(Some((bvh, settings)))
}

fn cmd_build(opts: &Options<'_>) -> Result<()> {
    let Some((bvh, settings)) = build_tree(opts)? else {
        return Ok(());
    };
    let records = bvh.serialize()?;
    drop(bvh);

    let output = opts.output.unwrap_or("out.bvh");
    let file = File::create(output)?;
    records.write_to(BufWriter::new(file), settings.layout)?;

    println!(
        "Wrote {} records ({} nodes, {} bytes) to {}",
        records.len(),
        records.node_count(),
        records.len() * settings.layout.stride(),
        output
    );
    Ok(())
}

fn cmd_tree(opts: &Options<'_>) -> Result<()> {
    if let Some((bvh, _)) = build_tree(opts)? {
        print!("{}", bvh);
    }
    Ok(())
}

fn cmd_stats(opts: &Options<'_>) -> Result<()> {
    let settings = load_settings(opts)?;
    let prims = load_primitives(opts)?;

    let start = Instant::now();
    let bvh = Bvh::build_with(&prims, &settings)?;
    let build_ms = start.elapsed().as_secs_f64() * 1000.0;
    if bvh.is_empty() {
        println!("Scene has no primitives; nothing to build.");
        return Ok(());
    }

    let start = Instant::now();
    let records = bvh.serialize()?;
    let serialize_ms = start.elapsed().as_secs_f64() * 1000.0;

    println!("{}", bvh.stats());
    println!("records:         {}", records.len());
    println!("bytes:           {}", records.len() * settings.layout.stride());
    if let Some(root) = records.bounds(0) {
        println!("bounds:          {}", root);
    }
    println!();
    println!("build:           {:.3} ms", build_ms);
    println!("serialize:       {:.3} ms", serialize_ms);
    Ok(())
}

fn cmd_dump(opts: &Options<'_>) -> Result<()> {
    let Some((bvh, _)) = build_tree(opts)? else {
        return Ok(());
    };
    let records = bvh.serialize()?;

    if opts.json {
        let nodes: Vec<serde_json::Value> = records
            .nodes()
            .map(|(index, h, bbox)| {
                serde_json::json!({
                    "index": index,
                    "primitive": h.primitive_id,
                    "hit": h.hit,
                    "miss": h.miss,
                    "min": bbox.min.to_array(),
                    "max": bbox.max.to_array(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&nodes)?);
        return Ok(());
    }

    for (index, h, bbox) in records.nodes() {
        println!(
            "[{:>6}] prim {:>6}  hit {:>6}  miss {:>6}  {}",
            index, h.primitive_id, h.hit, h.miss, bbox
        );
    }
    Ok(())
}

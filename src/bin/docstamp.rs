use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docstamp::{
    parse_hex_color, BrushColor, ExportEncoder, ExportFormat, ExportResult, SessionRegistry,
    StrokePath, Viewport, WatermarkCompositor, WatermarkSpec, DEFAULT_WATERMARK_TEXT,
};

#[derive(Parser)]
#[command(
    name = "docstamp",
    about = "Censor regions of document scans and stamp a diagonal watermark across them",
    version,
    after_help = "Example: docstamp dni_front.jpg dni_back.jpg --stroke \"40,120 420,120\" -o out/\n\n\
                  Strokes are given in image pixel coordinates and are painted on every input."
)]
struct Cli {
    /// Input image files (non-image files are skipped)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory (default: next to each input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Watermark text
    #[arg(long, default_value = DEFAULT_WATERMARK_TEXT)]
    text: String,

    /// Watermark opacity in percent (0-100)
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u8).range(0..=100))]
    opacity: u8,

    /// Watermark color as hex (#rgb, #rrggbb, #rrggbbaa)
    #[arg(long, default_value = "#ff0000", value_parser = parse_hex_color)]
    color: image::Rgba<u8>,

    /// Brush color for censoring strokes: black, white or gray
    #[arg(long, default_value = "black")]
    brush: BrushColor,

    /// Censoring stroke as space-separated "x,y" points (repeatable)
    #[arg(long = "stroke", value_name = "POINTS")]
    strokes: Vec<StrokePath>,

    /// Output format: png, jpeg, bmp or webp
    #[arg(long, default_value = "png")]
    format: ExportFormat,

    /// TrueType/OpenType font for the watermark (default: embedded bold sans)
    #[arg(long)]
    font: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    let compositor = match &cli.font {
        Some(path) => WatermarkCompositor::from_font_file(path),
        None => WatermarkCompositor::new(),
    };
    let compositor = match compositor {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Fatal: Failed to load watermark font: {e}");
            process::exit(1);
        }
    };

    let mut registry = SessionRegistry::new();
    let mut sources = HashMap::new();
    for path in &cli.inputs {
        match std::fs::read(path) {
            Ok(bytes) => {
                for id in registry.ingest([(display_name(path), bytes)]) {
                    sources.insert(id, path.as_path());
                }
            }
            Err(e) => eprintln!("[SKIP] {}: {e}", path.display()),
        }
    }
    if registry.is_empty() {
        eprintln!("Error: No decodable images among the inputs");
        process::exit(1);
    }

    for id in sources.keys() {
        let Some(session) = registry.get_mut(*id) else {
            continue;
        };
        session.set_brush_color(cli.brush);
        let (w, h) = session.working().dimensions();
        let viewport = Viewport::unscaled(w, h);
        for stroke in &cli.strokes {
            session.apply_stroke(&viewport, stroke.events());
        }
    }

    let spec = WatermarkSpec::default()
        .with_text(&cli.text)
        .with_opacity_percent(cli.opacity)
        .with_color(cli.color);

    if !cli.quiet {
        eprintln!(
            "Stamping {:?} at {}% opacity on {} image(s)",
            spec.text,
            cli.opacity,
            registry.len()
        );
        eprintln!();
    }

    let results = registry.export(&compositor, &spec, &ExportEncoder::new(cli.format));

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for result in &results {
        let source = sources.get(&result.session).copied().unwrap_or(Path::new("."));
        match write_result(result, source, cli.output.as_deref()) {
            Ok(written) => {
                success_count += 1;
                if !cli.quiet {
                    eprintln!("[OK] {} -> {}", result.file_name, written.display());
                }
            }
            Err(message) => {
                fail_count += 1;
                eprintln!("[FAIL] {}: {message}", result.file_name);
            }
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Exported: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    if fail_count > 0 {
        process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let fallback = if cli.quiet {
        "error"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn write_result(
    result: &ExportResult,
    source: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf, String> {
    let composited = result.outcome.as_ref().map_err(ToString::to_string)?;

    let dir = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => source.parent().unwrap_or(Path::new(".")).to_path_buf(),
    };
    if !dir.as_os_str().is_empty() && !dir.exists() {
        std::fs::create_dir_all(&dir)
            .map_err(|e| format!("Failed to create output directory: {e}"))?;
    }

    let path = dir.join(&composited.suggested_file_name);
    std::fs::write(&path, &composited.encoded_bytes)
        .map_err(|e| format!("Failed to save: {e}"))?;
    Ok(path)
}

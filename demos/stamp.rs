//! Censor a region of one image and stamp the default watermark on it.
//!
//! Usage:
//! ```sh
//! cargo run --example stamp -- input.jpg "40,60 300,60" out_dir
//! ```

use std::env;
use std::path::Path;
use std::process;

use docstamp::{
    ExportEncoder, SessionRegistry, StrokePath, Viewport, WatermarkCompositor, WatermarkSpec,
};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <input> <stroke points> <output dir>", args[0]);
        process::exit(1);
    }

    let input = Path::new(&args[1]);
    let stroke: StrokePath = match args[2].parse() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };
    let output_dir = Path::new(&args[3]);

    let bytes = std::fs::read(input).expect("failed to read input");
    let name = input
        .file_name()
        .map_or_else(|| args[1].clone(), |f| f.to_string_lossy().to_string());

    let mut registry = SessionRegistry::new();
    let ids = registry.ingest([(name, bytes)]);
    let Some(&id) = ids.first() else {
        eprintln!("Error: {} is not an image", input.display());
        process::exit(1);
    };

    let session = registry.get_mut(id).expect("session just added");
    let (w, h) = session.working().dimensions();
    session.apply_stroke(&Viewport::unscaled(w, h), stroke.events());

    let compositor = WatermarkCompositor::new().expect("failed to load embedded font");
    let spec = WatermarkSpec::default();
    for result in registry.export(&compositor, &spec, &ExportEncoder::default()) {
        match result.outcome {
            Ok(out) => {
                let path = output_dir.join(&out.suggested_file_name);
                std::fs::write(&path, &out.encoded_bytes).expect("failed to write output");
                println!("Done: {}", path.display());
            }
            Err(e) => {
                eprintln!("Error: {}: {e}", result.file_name);
                process::exit(1);
            }
        }
    }
}

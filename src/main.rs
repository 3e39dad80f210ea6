use std::path::PathBuf;

use base64::Engine as Base64Engine;
use clap::Parser;
use serde::Serialize;

use domsnap::{CaptureOptions, Capturer, Color, Document, Error, ViewMetrics, Viewport};

/// Capture a subtree of an HTML file into a raster buffer
#[derive(Parser, Debug)]
#[command(name = "domsnap", version, about)]
struct Args {
    /// HTML file to capture from
    input: PathBuf,

    /// Selector of the target subtree
    #[arg(long, default_value = "body")]
    selector: String,

    /// Raster scale factor
    #[arg(long)]
    scale: Option<f32>,

    /// Window width in CSS pixels
    #[arg(long)]
    window_width: Option<u32>,

    /// Window height in CSS pixels
    #[arg(long)]
    window_height: Option<u32>,

    /// Background color, e.g. '#ffffff'
    #[arg(long)]
    background: Option<String>,

    /// Skip subtrees matching this selector
    #[arg(long)]
    ignore: Option<String>,

    /// Base URL for resolving asset references
    #[arg(long)]
    base_url: Option<String>,

    /// Write the raw RGBA8 buffer to this path
    #[arg(long)]
    out: Option<PathBuf>,

    /// Print a JSON summary instead of plain text
    #[arg(long)]
    json: bool,

    /// Include base64 pixels in the JSON summary
    #[arg(long)]
    include_pixels: bool,
}

#[derive(Serialize)]
struct Summary {
    selector: String,
    width: u32,
    height: u32,
    scale: f32,
    digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pixels_base64: Option<String>,
}

async fn run(args: Args) -> domsnap::Result<()> {
    let html = std::fs::read_to_string(&args.input)
        .map_err(|e| Error::Other(format!("failed to read {}: {}", args.input.display(), e)))?;

    let background = match args.background.as_deref() {
        Some(raw) => Some(
            Color::parse(raw)
                .ok_or_else(|| Error::ConfigError(format!("unrecognized color '{}'", raw)))?,
        ),
        None => None,
    };

    let metrics = ViewMetrics {
        viewport: Viewport {
            width: args.window_width.unwrap_or(1280),
            height: args.window_height.unwrap_or(720),
        },
        ..Default::default()
    };
    let doc = Document::with_metrics(html, metrics);
    if let Some(base_url) = &args.base_url {
        doc.set_base_url(base_url.clone());
    }

    let overrides = CaptureOptions {
        scale: args.scale,
        window_width: args.window_width,
        window_height: args.window_height,
        background_color: background,
        ignore_selector: args.ignore.clone(),
        ..Default::default()
    };

    let mut capturer = Capturer::new();
    let result = capturer.capture(&doc.select(&args.selector), &overrides).await?;

    if let Some(out) = &args.out {
        std::fs::write(out, result.pixels())
            .map_err(|e| Error::Other(format!("failed to write {}: {}", out.display(), e)))?;
    }

    if args.json {
        let summary = Summary {
            selector: args.selector.clone(),
            width: result.width(),
            height: result.height(),
            scale: result.scale(),
            digest: result.digest(),
            pixels_base64: args
                .include_pixels
                .then(|| base64::engine::general_purpose::STANDARD.encode(result.pixels())),
        };
        let rendered = serde_json::to_string(&summary)
            .map_err(|e| Error::Other(format!("failed to serialize summary: {}", e)))?;
        println!("{}", rendered);
    } else {
        println!(
            "captured '{}': {}x{} at scale {} (sha256 {})",
            args.selector,
            result.width(),
            result.height(),
            result.scale(),
            result.digest()
        );
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("domsnap: {}", e);
        std::process::exit(1);
    }
}

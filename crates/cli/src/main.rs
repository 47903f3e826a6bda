use anyhow::{Context, Result};
use clap::Parser;
use glowup_core::{
    config::Config,
    export::{DiskDownloader, FileDownloader, NullViewport},
    gemini::InlineImage,
    init,
    settings::Settings,
    share::{build_share_url, ClipboardWriter, SystemClipboard},
    GlowUp, ShareCodec,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use termimad::crossterm::style::Color;
use termimad::MadSkin;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Portrait photo to process (max 5 MB)
    image: Option<PathBuf>,

    /// Style request, e.g. "soft coquette pink" (empty = default K-beauty look)
    #[arg(short, long, default_value = "")]
    style: String,

    /// Extra research notes woven into the prompts
    #[arg(short, long, default_value = "")]
    notes: String,

    /// Override the diagnosis/search model defined in .env or settings
    #[arg(short, long)]
    model: Option<String>,

    /// Override the synthesis model defined in .env or settings
    #[arg(long)]
    image_model: Option<String>,

    /// Directory for the generated images and snapshot card
    #[arg(short, long, default_value = "glowup-output")]
    out: PathBuf,

    /// Also rasterize the results into a snapshot card PNG
    #[arg(long, default_value_t = false)]
    card: bool,

    /// Copy the share link to clipboard automatically
    #[arg(short, long, default_value_t = false)]
    copy: bool,

    /// Base URL the share fragment is attached to
    #[arg(long, default_value = "https://glowup.example/app")]
    base_url: String,

    /// Restore a shared fragment and print its contents, then exit
    #[arg(long)]
    restore: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let _ = dotenvy::dotenv();
    init();
    let args = Args::parse();

    // Handle --restore: decode a share fragment without touching the API
    if let Some(fragment) = args.restore {
        match ShareCodec::decode(&fragment) {
            Some(payload) => {
                print_markdown(&format!("# Shared look\n\n{}\n", payload.desc));
                for product in &payload.prods {
                    println!("{}. {} — {}", product.id + 1, product.name, product.url);
                }
            }
            None => println!("Share fragment could not be decoded"),
        }
        return Ok(());
    }

    let image_path = args
        .image
        .context("No portrait given. Pass a photo path, or --restore <fragment>")?;

    // Load config, then layer persisted settings and CLI overrides on top
    let mut config = Config::load().context("Failed to load configuration")?;
    let settings = Settings::load(&config.text_model, &config.image_model);
    config.text_model = args.model.unwrap_or(settings.text_model.clone());
    config.image_model = args.image_model.unwrap_or(settings.image_model.clone());

    let style = if args.style.trim().is_empty() {
        settings.default_style.clone()
    } else {
        args.style.clone()
    };

    let app = GlowUp::with_config(config).context("Failed to initialize Gemini client")?;

    app.upload_file(&image_path)
        .with_context(|| format!("Failed to read portrait {}", image_path.display()))?;

    // Run the pipeline
    println!(); // Spacer
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
            .template("{spinner:.green} {msg}")?
    );
    spinner.set_message(format!("Analyzing with {}...", app.config().text_model));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let pipeline_result = app.generate(&style, &args.notes).await;

    spinner.finish_and_clear();

    if let Err(e) = pipeline_result {
        eprintln!("GlowUp error: {}", e);
        return Ok(());
    }

    let state = app.state();

    // Diagnostic report
    print_markdown(&format!("# Facial diagnostic\n\n{}\n", state.diagnosis_summary));
    if let Some(overall) = state.overall_metric() {
        println!("Overall: {}%", overall.score);
    }
    for metric in &state.metrics {
        println!("  {:<24} {:>5.0}%", metric.label, metric.score);
    }

    // Trending products
    if !state.products.is_empty() {
        print_markdown(&format!("\n# Trending products\n\n{}\n", state.look_description));
        for product in &state.products {
            println!("{}. {}", product.id + 1, product.name);
            println!("   {}", product.description);
            println!("   {}", product.url);
        }
    }

    // Write images to the output directory
    let mut downloader = DiskDownloader::new(&args.out);
    if let Some(overlay) = &state.diagnostic_image {
        save_inline(&mut downloader, "diagnostic", overlay)?;
    }
    if let Some(makeover) = &state.generated_image {
        save_inline(&mut downloader, "makeover", makeover)?;
    }
    println!("\nImages written to {}", args.out.display());

    // Snapshot card: failures are logged, never fatal
    if args.card {
        match app.export_snapshot(&mut NullViewport, &mut downloader) {
            Ok(filename) => println!("Snapshot card: {}", filename),
            Err(e) => tracing::warn!("snapshot card skipped: {}", e),
        }
    }

    // Share link
    if let Some(payload) = state.share_payload() {
        let share_url = build_share_url(&args.base_url, &payload)?;
        println!("Share link: {}", share_url);

        if args.copy {
            match SystemClipboard.write_text(share_url.as_str()) {
                Ok(()) => println!("(Copied to clipboard)"),
                Err(e) => eprintln!("Warning: {}", e),
            }
        }
    }

    Ok(())
}

/// Writes an inline image from the model under a stable name.
fn save_inline(
    downloader: &mut DiskDownloader,
    stem: &str,
    image: &InlineImage,
) -> Result<()> {
    let ext = match image.mime_type.as_str() {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        other => {
            tracing::warn!("unexpected mime type {}, writing as .bin", other);
            "bin"
        }
    };
    let bytes = image.to_bytes().context("Model returned undecodable image data")?;
    downloader
        .deliver(&format!("{}.{}", stem, ext), &bytes)
        .context("Failed to write image")?;
    Ok(())
}

/// Helper to print markdown
fn print_markdown(text: &str) {
    let mut skin = MadSkin::default();
    skin.bold.set_fg(Color::Yellow);
    skin.italic.set_fg(Color::Magenta);
    skin.code_block.set_bg(Color::Rgb { r: 40, g: 40, b: 40} );

    skin.print_text(text);
}

//! Watermark CLI - run the upload hook over image files on disk

mod cli;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use cli::Cli;
use log::{debug, info};
use std::process::ExitCode;
use upload_hook::{PluginSettings, UploadHook, UploadItem};
use watermark_core::Watermarker;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity flag.
fn init_logger(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn load_settings(cli: &Cli) -> Result<Option<PluginSettings>> {
    let raw = std::fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read settings {}", cli.config.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid JSON in {}", cli.config.display()))?;

    let settings = match &cli.key {
        Some(key) => PluginSettings::from_store(&value, key)?,
        None => Some(PluginSettings::from_value(value)?),
    };
    Ok(settings)
}

fn build_watermarker(cli: &Cli) -> Result<Watermarker> {
    let mut watermarker = if cli.no_system_fonts {
        Watermarker::without_system_fonts()
    } else {
        Watermarker::new()
    };
    for font in &cli.fonts {
        watermarker = watermarker
            .with_font_file(font)
            .with_context(|| format!("Failed to load font {}", font.display()))?;
    }
    debug!("{} font face(s) available", watermarker.font_count());
    Ok(watermarker)
}

/// Returns `Ok(false)` when any image failed
async fn run(cli: &Cli) -> Result<bool> {
    let outputs = cli.output_paths()?;
    let settings = load_settings(cli)?;
    let watermarker = build_watermarker(cli)?;

    if let Some(dir) = &cli.output_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let mut items = Vec::with_capacity(cli.inputs.len());
    for input in &cli.inputs {
        let data = tokio::fs::read(input)
            .await
            .with_context(|| format!("Failed to read {}", input.display()))?;
        items.push(UploadItem::from_buffer(
            input.to_string_lossy(),
            Bytes::from(data),
        ));
    }

    let hook = UploadHook::new(&watermarker);
    let report = hook.handle(settings.as_ref(), &mut items).await;

    for ((input, output), item) in cli.inputs.iter().zip(&outputs).zip(&items) {
        let Some(buffer) = &item.buffer else {
            continue;
        };
        tokio::fs::write(output, buffer)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!("{} -> {}", input.display(), output.display());
    }

    Ok(!report.has_failures())
}

// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scanwerk — scan a stack of paper into one corrected, searchable PDF.
//
// Entry point. Initialises logging, loads configuration, picks the scanner
// source and OCR engine, and runs the pipeline once.

mod cli;
mod services;

use std::fs::OpenOptions;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::Parser;
use scanwerk_core::PipelineConfig;
use scanwerk_core::config::{OcrBackendKind, OcrSettings};
use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::human_errors::humanize_error;
use scanwerk_document::{CommandGuesser, OcrEngine, TesseractEngine};
use scanwerk_scan::{DirectorySource, ScanimageSource, ScannerSource, list_devices, pick_device};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::Cli;
use services::data_dir;
use services::gate::{AutoDiscard, BlankGate, Interactive};
use services::pipeline::Pipeline;

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = init_logging(&cli) {
        eprintln!("{}", humanize_error(&err));
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "Run failed");
            eprintln!("{}", humanize_error(&err));
            ExitCode::FAILURE
        }
    }
}

/// Console output on stderr, plus an optional plain-text file sink.
fn init_logging(cli: &Cli) -> Result<()> {
    let default_filter = if cli.verbose { "debug" } else { "info" };

    let file_layer = match &cli.log_file {
        None => None,
        Some(path) => {
            let path = path
                .clone()
                .unwrap_or_else(|| data_dir::default_log_path(&data_dir::data_dir()));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    cli.apply(&mut config)?;

    if cli.list_devices {
        for device in list_devices(&config.scanner.scanimage_path)? {
            println!("{}\t{}", device.name, device.description);
        }
        return Ok(());
    }

    info!(version = env!("CARGO_PKG_VERSION"), "Scanwerk starting");

    let ocr = build_engine(&config.ocr)?;
    let guesser = config
        .output
        .organization_command
        .as_deref()
        .and_then(CommandGuesser::from_argv);
    let mut source = open_source(cli, &config)?;
    let mut gate: Box<dyn BlankGate> = if config.output.interactive_blank_gate {
        Box::new(Interactive::terminal())
    } else {
        Box::new(AutoDiscard)
    };

    let mut pipeline = Pipeline::new(config, ocr.as_ref());
    if let Some(guesser) = &guesser {
        pipeline = pipeline.with_guesser(guesser);
    }
    let result = pipeline.run(source.as_mut(), gate.as_mut());
    info!(status = ?pipeline.status(), "Pipeline finished");
    let report = result?;

    info!(
        scanned = report.pages_scanned,
        kept = report.pages_kept,
        text_layer = report.text_layer,
        output = %report.output.display(),
        "Run complete"
    );
    println!("{}", report.output.display());
    Ok(())
}

/// Explicit `--config`, else `config.json` in the data dir if present, else defaults.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    if let Some(path) = path {
        return PipelineConfig::load(path);
    }
    let fallback = data_dir::default_config_path(&data_dir::data_dir());
    if fallback.is_file() {
        info!(path = %fallback.display(), "Loading configuration");
        return PipelineConfig::load(fallback);
    }
    Ok(PipelineConfig::default())
}

fn build_engine(settings: &OcrSettings) -> Result<Box<dyn OcrEngine>> {
    match settings.backend {
        OcrBackendKind::Tesseract => Ok(Box::new(TesseractEngine::new(settings)?)),
        #[cfg(feature = "ocr")]
        OcrBackendKind::Ocrs => {
            let models = scanwerk_document::OcrsModels::from_optional_dir(settings.model_dir.as_deref());
            Ok(Box::new(scanwerk_document::OcrsEngine::new(models)?))
        }
        #[cfg(not(feature = "ocr"))]
        OcrBackendKind::Ocrs => Err(ScanwerkError::Config(
            "the ocrs backend needs a build with the `ocr` feature".into(),
        )),
    }
}

fn open_source(cli: &Cli, config: &PipelineConfig) -> Result<Box<dyn ScannerSource>> {
    if let Some(dir) = &cli.from_dir {
        info!(dir = %dir.display(), "Replaying images from directory");
        return Ok(Box::new(DirectorySource::open(dir, config.scanner.resolution)?));
    }

    let device = match &config.scanner.device {
        Some(device) => device.clone(),
        None => {
            let devices = list_devices(&config.scanner.scanimage_path)?;
            pick_device(&devices).ok_or(ScanwerkError::NoScanner)?.name.clone()
        }
    };
    info!(%device, "Using scanner");
    Ok(Box::new(ScanimageSource::open(&config.scanner, &device)?))
}

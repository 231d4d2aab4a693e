use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use dysphonia_analyzer::{AnalysisOptions, Analyzer, AnalyzerConfig, AudioInput, EnginePreference, ReportLanguage};

/// Acoustic dysphonia analysis of a speech recording
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Recording to analyse (WAV, MP3, FLAC, OGG, M4A)
    audio: PathBuf,

    /// Config file (defaults to ~/.dysphonia-analyzer/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for result.json, intermediates.json and denoised.wav
    #[arg(long)]
    save_intermediates: Option<PathBuf>,

    /// Run identifier (random UUID if omitted)
    #[arg(long)]
    run_id: Option<String>,

    /// Pitch engine: auto, autocorrelation or mcleod
    #[arg(short, long)]
    engine: Option<EnginePreference>,

    /// Report language: en or ru
    #[arg(short, long)]
    language: Option<ReportLanguage>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => AnalyzerConfig::default_config_path()?,
    };
    let mut config = AnalyzerConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    if let Some(engine) = args.engine {
        config.engine = engine;
    }
    if let Some(language) = args.language {
        config.report_language = language;
    }
    info!("Config: {:?} (engine {:?})", config_path, config.engine);

    let analyzer = Analyzer::new(config)?;
    let options = AnalysisOptions {
        save_intermediates: args.save_intermediates.is_some(),
        run_id: args.run_id.clone(),
    };
    let result = analyzer.analyze(AudioInput::Path(args.audio.clone()), options);
    let json = serde_json::to_string_pretty(&result).context("Failed to serialize result")?;

    if let Some(dir) = &args.save_intermediates {
        let run_dir = dir.join(&result.run_id);
        std::fs::create_dir_all(&run_dir).with_context(|| format!("Failed to create {:?}", run_dir))?;
        std::fs::write(run_dir.join("result.json"), &json).context("Failed to write result.json")?;
        if let Some(intermediates) = &result.intermediates {
            intermediates.save(&run_dir)?;
        }
        info!("Run artifacts written to {:?}", run_dir);
    }

    match &args.output {
        Some(path) => {
            std::fs::write(path, &json).with_context(|| format!("Failed to write {:?}", path))?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", json),
    }

    if let Some(message) = &result.error {
        error!("Analysis failed: {}", message);
        std::process::exit(1);
    }

    Ok(())
}

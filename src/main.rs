//! Analytics session recorder CLI.
//!
//! A small diagnostic front end around the library: record a demo session
//! end-to-end, sign an existing document, or show the effective
//! configuration.

use std::path::{Path, PathBuf};

use analytics_session_recorder::{
    authorization_token, AnalyticsProvider, ConfigSource, EventAttribute, FileAnalyticsProvider,
    FileConfigSource, NoopUploader, RecorderConfig, UploadPipeline, Uploader, CONFIG_SECTION,
    SECRET_KEY, SERVER_KEY, VERSION,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "analytics-recorder")]
#[command(version = VERSION)]
#[command(about = "Embedded analytics session recorder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a short demo session end-to-end
    Demo {
        /// Number of generic events to record
        #[arg(long, default_value = "5")]
        events: u32,

        /// Deliver the closed document to the configured collector
        #[arg(long)]
        upload: bool,
    },

    /// Print the authorization token for an existing document
    Sign {
        /// Path to a closed .analytics document
        file: PathBuf,
    },

    /// Show the effective configuration
    Config,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo { events, upload } => cmd_demo(events, upload),
        Commands::Sign { file } => cmd_sign(&file),
        Commands::Config => cmd_config(),
    }
}

fn delivery_config() -> FileConfigSource {
    match FileConfigSource::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: could not load configuration: {e}");
            FileConfigSource::empty()
        }
    }
}

#[cfg(feature = "uploader")]
fn http_uploader() -> Box<dyn Uploader> {
    use analytics_session_recorder::HttpUploader;

    match HttpUploader::new() {
        Ok(uploader) => Box::new(uploader),
        Err(e) => {
            eprintln!("Error: could not create HTTP uploader: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "uploader"))]
fn http_uploader() -> Box<dyn Uploader> {
    eprintln!("Error: this build has no HTTP uploader; rebuild with --features uploader");
    std::process::exit(1);
}

fn cmd_demo(events: u32, upload: bool) {
    let uploader: Box<dyn Uploader> = if upload {
        http_uploader()
    } else {
        Box::new(NoopUploader)
    };
    let pipeline = UploadPipeline::new(Box::new(delivery_config()), uploader);
    let mut provider = FileAnalyticsProvider::new(RecorderConfig::default(), pipeline);
    provider.set_build_info(VERSION);
    provider.set_default_attributes(vec![EventAttribute::new("source", "demo")]);

    if !provider.start_session(&[]) {
        eprintln!("Error: failed to start a session");
        std::process::exit(1);
    }
    println!("Recording session {}", provider.session_id());

    for sequence in 0..events {
        provider.record_event(
            "demo.tick",
            &[EventAttribute::new("sequence", sequence.to_string())],
        );
    }
    provider.record_progress("demo", "complete", &[]);

    let path = provider.document_path();
    provider.end_session();

    println!("Session document written to {}", path.display());
    if upload {
        println!("Upload dispatched to the configured collector");
    }
}

fn cmd_sign(file: &Path) {
    let config = delivery_config();
    let Some(secret) = config.get(CONFIG_SECTION, SECRET_KEY) else {
        eprintln!(
            "Error: no secret configured at {}",
            FileConfigSource::config_path().display()
        );
        std::process::exit(1);
    };

    match std::fs::read(file) {
        Ok(bytes) => println!("{}", authorization_token(&secret, &bytes)),
        Err(e) => {
            eprintln!("Error: could not read {}: {}", file.display(), e);
            std::process::exit(1);
        }
    }
}

fn cmd_config() {
    let recorder = RecorderConfig::default();
    let config = delivery_config();

    println!("Config file:   {}", FileConfigSource::config_path().display());
    println!("Analytics dir: {}", recorder.analytics_dir.display());
    println!(
        "Collector:     {}",
        config
            .get(CONFIG_SECTION, SERVER_KEY)
            .unwrap_or_else(|| "(not configured)".to_string())
    );
    println!(
        "Secret:        {}",
        if config.get(CONFIG_SECTION, SECRET_KEY).is_some() {
            "(configured)"
        } else {
            "(not configured)"
        }
    );
}

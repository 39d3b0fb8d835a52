use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

mod audio;
mod cache;
mod config;
mod scheduler;
mod tts;

use crate::cache::{clear_cache, default_cache_root, CachingSynthesizer};
use crate::config::{load_config, load_voice_config, AppConfig, VoiceConfig};
use crate::tts::{AudioEncoding, GoogleTts, Synthesizer, SynthesisParams};

#[derive(Parser)]
#[command(
    name = "routine-notifier",
    about = "Speak scheduled messages via Google Cloud TTS",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate and summarize a schedule config file
    Validate {
        /// Path to JSON config
        config: PathBuf,
    },
    /// Run the scheduler to speak messages at scheduled times
    Run {
        /// Path to JSON config
        #[arg(long, default_value = "schedule.json")]
        config: PathBuf,
        /// Polling interval in seconds
        #[arg(long, default_value_t = 1.0)]
        check_interval: f64,
        #[command(flatten)]
        voice: VoiceArgs,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Synthesize and play a single line of text
    Speak {
        /// Text to speak once
        text: String,
        #[command(flatten)]
        voice: VoiceArgs,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// List available TTS voices
    Voices {
        /// Optional BCP-47 code filter (e.g., ja-JP)
        #[arg(long, short = 'l')]
        language_code: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Clear all cached audio files
    CacheClear {
        /// Cache directory (defaults to the platform cache dir)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Confirm deletion without prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Args)]
struct VoiceArgs {
    /// Language code for TTS
    #[arg(long, default_value = "ja-JP")]
    language_code: String,
    /// Specific voice name (optional)
    #[arg(long)]
    voice_name: Option<String>,
    /// Speaking rate (0.25 - 4.0)
    #[arg(long, default_value_t = 1.0)]
    speaking_rate: f64,
    /// Pitch in semitones (-20.0 .. 20.0)
    #[arg(long, default_value_t = 0.0)]
    pitch: f64,
    /// Audio encoding: MP3, LINEAR16, OGG_OPUS
    #[arg(long, default_value = "MP3")]
    audio_encoding: AudioEncoding,
    /// Path to JSON with voice settings (overrides the voice flags)
    #[arg(long)]
    voice_config: Option<PathBuf>,
}

impl VoiceArgs {
    fn resolve(&self) -> Result<SynthesisParams> {
        let vcfg = match &self.voice_config {
            Some(path) => load_voice_config(path)?,
            None => {
                let vcfg = VoiceConfig {
                    language_code: self.language_code.clone(),
                    voice_name: self.voice_name.clone(),
                    speaking_rate: self.speaking_rate,
                    pitch: self.pitch,
                    audio_encoding: self.audio_encoding,
                };
                vcfg.validate()?;
                vcfg
            }
        };
        Ok(vcfg.to_params())
    }
}

#[derive(Args)]
struct CacheArgs {
    /// Disable the on-disk audio cache
    #[arg(long)]
    no_cache: bool,
    /// Cache directory (defaults to the platform cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    /// Cache size limit in MB (0 for unlimited)
    #[arg(long, default_value_t = 200)]
    cache_max_mb: u64,
}

impl CacheArgs {
    fn build_synthesizer(&self) -> Arc<dyn Synthesizer> {
        let backend = match GoogleTts::from_env() {
            Ok(backend) => backend,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        };
        Arc::new(CachingSynthesizer::new(
            Arc::new(backend),
            self.cache_dir.clone(),
            !self.no_cache,
            self.cache_max_mb * 1024 * 1024,
        ))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("routine_notifier=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Validate { config } => validate(&config),
        Command::Run {
            config,
            check_interval,
            voice,
            cache,
        } => run(&config, check_interval, &voice, &cache).await,
        Command::Speak { text, voice, cache } => speak(&text, &voice, &cache).await,
        Command::Voices {
            language_code,
            json,
        } => voices(language_code.as_deref(), json).await,
        Command::CacheClear { cache_dir, yes } => cache_clear(cache_dir, yes),
    }
}

fn print_schedules(cfg: &AppConfig) {
    for s in &cfg.schedules {
        let days: Vec<&str> = s.days.iter().map(|d| d.as_str()).collect();
        println!("- {} @ {} on [{}]", s.name, s.time, days.join(","));
    }
}

fn validate(config: &PathBuf) -> Result<()> {
    match load_config(config) {
        Ok(cfg) => {
            println!("Config is valid. Schedules:");
            print_schedules(&cfg);
            Ok(())
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}

async fn run(
    config: &PathBuf,
    check_interval: f64,
    voice: &VoiceArgs,
    cache: &CacheArgs,
) -> Result<()> {
    let cfg = match load_config(config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    println!("Loaded schedules:");
    print_schedules(&cfg);
    println!("Starting scheduler. Press Ctrl+C to stop.");

    let params = voice.resolve()?;
    let synthesizer = cache.build_synthesizer();
    let interval = Duration::from_secs_f64(check_interval.max(0.1));

    info!(
        "🚀 Scheduler started ({} schedules, polling every {:?})",
        cfg.schedules.len(),
        interval
    );
    tokio::select! {
        _ = scheduler::run_forever(&cfg, synthesizer.as_ref(), &params, interval) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("⚠️ Shutdown signal received, stopping");
            println!("Stopped.");
        }
    }
    Ok(())
}

async fn speak(text: &str, voice: &VoiceArgs, cache: &CacheArgs) -> Result<()> {
    let params = voice.resolve()?;
    let synthesizer = cache.build_synthesizer();
    let audio = synthesizer.synthesize(text, &params).await?;
    audio::play_audio_bytes(&audio, params.audio_encoding).await
}

async fn voices(language_code: Option<&str>, json: bool) -> Result<()> {
    let backend = match GoogleTts::from_env() {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };
    let voices = backend.list_voices(language_code.filter(|l| !l.is_empty())).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&voices)?);
        return Ok(());
    }
    if voices.is_empty() {
        println!("No voices found.");
        return Ok(());
    }
    println!("Available voices:");
    for v in &voices {
        println!(
            "- {} | {} | {} | {} Hz",
            v.name,
            v.language_codes.join(","),
            v.ssml_gender,
            v.natural_sample_rate_hertz
        );
    }
    Ok(())
}

fn cache_clear(cache_dir: Option<PathBuf>, yes: bool) -> Result<()> {
    let target = cache_dir.unwrap_or_else(default_cache_root);
    if !yes {
        print!("About to remove cached audio in {}. Proceed? [y/N] ", target.display());
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        if !matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes") {
            println!("Aborted.");
            return Ok(());
        }
    }
    let removed = clear_cache(&target)?;
    println!("Cache cleared ({removed} files).");
    Ok(())
}

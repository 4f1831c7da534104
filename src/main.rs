//! docvox main entry point
//!
//! Subcommands map onto the pipeline stages:
//! 1. `extract` - document to segmented text (printed or saved as JSON)
//! 2. `convert` - document or saved text to WAV/MP3
//! 3. `voices` - voices each engine can use
//! 4. `save-edit` - text back out as an ODT document
//! 5. `speak` - synthesize and play, Ctrl-C stops

use anyhow::Context;
use clap::{Parser, Subcommand};
use docvox::audio::{AudioFormat, Exporter};
use docvox::config::Config;
use docvox::job::{CancelToken, OutputTarget, Orchestrator, SynthesisJob};
use docvox::pipeline::{convert, output_format, prepare_text, save_edition};
use docvox::speech::voices::{ESPEAK_VOICES, PICO_VOICES};
use docvox::speech::{EngineConfig, EngineKind, SystemEngines, VoiceStore};
use docvox::text::TextUnit;
use docvox::{DocvoxError, APP_NAME};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Global flag set by the SIGINT handler
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// SIGINT handler - sets flag so the running job and player can stop
#[cfg(unix)]
extern "C" fn handle_sigint(_: nix::libc::c_int) {
    INTERRUPTED.store(true, Ordering::Relaxed);
}

#[derive(Parser)]
#[command(name = "docvox")]
#[command(about = "Convert PDF, DOCX and ODT documents into spoken audio", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.docvox.cfg)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write debug logs to docvox.log
    #[arg(long, short, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract and segment the text of a document
    Extract {
        /// PDF, DOCX, ODT or text file
        input: PathBuf,

        /// Save the segments as JSON for editing instead of printing them
        #[arg(long)]
        json: Option<PathBuf>,

        /// Previously edited segments to keep
        #[arg(long)]
        edits: Option<PathBuf>,
    },

    /// Convert a document (or saved segments) to audio
    Convert {
        /// PDF, DOCX, ODT, text file or saved segments (.json)
        input: PathBuf,

        /// Output audio file (.wav or .mp3)
        #[arg(long, short)]
        output: PathBuf,

        /// TTS engine: piper, pico or espeak
        #[arg(long, short)]
        engine: Option<EngineKind>,

        /// Voice name or model path
        #[arg(long, short)]
        voice: Option<String>,

        /// Output sample rate in Hz
        #[arg(long)]
        sample_rate: Option<u32>,

        /// Output channels (1 or 2)
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=2))]
        channels: Option<u16>,

        /// Concurrent engine processes
        #[arg(long, short)]
        workers: Option<usize>,

        /// Previously edited segments to keep
        #[arg(long)]
        edits: Option<PathBuf>,

        /// Output format, overriding the extension
        #[arg(long, short)]
        format: Option<AudioFormat>,

        /// If MP3 cannot be written, save the audio as WAV instead
        #[arg(long)]
        wav_fallback: bool,
    },

    /// Synthesize a document (or saved segments) and play it
    Speak {
        /// PDF, DOCX, ODT, text file or saved segments (.json)
        input: PathBuf,

        /// TTS engine: piper, pico or espeak
        #[arg(long, short)]
        engine: Option<EngineKind>,

        /// Voice name or model path
        #[arg(long, short)]
        voice: Option<String>,

        /// Concurrent engine processes
        #[arg(long, short)]
        workers: Option<usize>,

        /// Previously edited segments to keep
        #[arg(long)]
        edits: Option<PathBuf>,
    },

    /// List available voices
    Voices {
        /// Only this engine
        #[arg(long, short)]
        engine: Option<EngineKind>,
    },

    /// Save the (edited) text as an ODT document
    SaveEdit {
        /// Document or saved segments (.json)
        input: PathBuf,

        /// Output .odt file
        #[arg(long, short)]
        output: PathBuf,

        /// Previously edited segments to keep
        #[arg(long)]
        edits: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logger
    if cli.debug {
        // Debug mode: write to docvox.log file
        use std::fs::OpenOptions;
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(format!("{}.log", APP_NAME))
        {
            Ok(log_file) => {
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Debug)
                    .target(env_logger::Target::Pipe(Box::new(log_file)))
                    .init();
            }
            Err(e) => {
                eprintln!("Warning: Failed to open docvox.log for debug logging: {}", e);
                eprintln!("Continuing without file logging...");
                env_logger::Builder::new()
                    .filter_level(log::LevelFilter::Warn)
                    .init();
            }
        }

        info!(
            "docvox version {} starting (debug mode, logging to docvox.log)",
            docvox::VERSION
        );
    } else {
        // Normal mode: warnings and errors to stderr unless RUST_LOG says otherwise
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Warn)
            .parse_default_env()
            .init();
    }

    if let Err(e) = run(cli) {
        error!("Fatal error: {:#}", e);
        match e.downcast_ref::<DocvoxError>() {
            Some(err) => match err.segment() {
                Some(idx) => eprintln!("Error ({} stage, segment {}): {:#}", err.stage(), idx, e),
                None => eprintln!("Error ({} stage): {:#}", err.stage(), e),
            },
            None => eprintln!("Error: {:#}", e),
        }
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    info!("Config loaded from {:?}", config.path());

    match cli.command {
        Commands::Extract { input, json, edits } => {
            let prior = load_edits(edits.as_deref())?;
            let unit = prepare_text(&input, prior.as_ref())?;
            match json {
                Some(path) => {
                    unit.save(&path)?;
                    println!("Saved {} segments to {}", unit.len(), path.display());
                }
                None => {
                    for seg in unit.segments() {
                        println!("[{}] {}", seg.index, seg.text);
                    }
                }
            }
        }

        Commands::Convert {
            input,
            output,
            engine,
            voice,
            sample_rate,
            channels,
            workers,
            edits,
            format,
            wav_fallback,
        } => {
            let format = output_format(&output, format)?;
            let prior = load_edits(edits.as_deref())?;
            let unit = prepare_text(&input, prior.as_ref())?;

            let mut engine_config = engine_config(&config, engine, voice);
            if let Some(rate) = sample_rate {
                engine_config.sample_rate = rate;
            }
            if let Some(channels) = channels {
                engine_config.channels = channels;
            }

            let mut options = config.run_options();
            if let Some(workers) = workers {
                options.workers = workers.max(1);
            }

            let factory = SystemEngines::new(config.engine_settings());
            let bar = progress_bar(unit.len(), &engine_config)?;
            let progress = bar.clone();
            let mut orchestrator = Orchestrator::new(&factory, options).on_progress(move |done, total| {
                progress.set_length(total as u64);
                progress.set_position(done as u64);
            });

            let mut job = SynthesisJob::new(unit, engine_config, OutputTarget::new(&output, format));
            let export = config.export_settings();
            let (result, segments) = convert(&mut orchestrator, &mut job, &export);
            bar.finish_and_clear();

            match result {
                Ok(()) => println!("Wrote {}", output.display()),
                Err(DocvoxError::TranscodeUnavailable(reason)) if !segments.is_empty() => {
                    if !wav_fallback {
                        return Err(DocvoxError::TranscodeUnavailable(format!(
                            "{}; rerun with --wav-fallback to keep the audio as WAV",
                            reason
                        ))
                        .into());
                    }
                    let wav = output.with_extension("wav");
                    warn!("MP3 export unavailable ({}), writing {:?}", reason, wav);
                    Exporter::new(export, job.engine.sample_rate, job.engine.channels)
                        .export(&segments, &wav, AudioFormat::Wav)?;
                    println!("MP3 transcoder unavailable; wrote {}", wav.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Speak {
            input,
            engine,
            voice,
            workers,
            edits,
        } => {
            let prior = load_edits(edits.as_deref())?;
            let unit = prepare_text(&input, prior.as_ref())?;
            let engine_config = engine_config(&config, engine, voice);

            let mut options = config.run_options();
            if let Some(workers) = workers {
                options.workers = workers.max(1);
            }

            let scratch = tempfile::Builder::new().prefix("docvox-").tempdir()?;
            let wav = scratch.path().join("speech.wav");

            let factory = SystemEngines::new(config.engine_settings());
            let bar = progress_bar(unit.len(), &engine_config)?;
            let progress = bar.clone();
            let mut orchestrator = Orchestrator::new(&factory, options).on_progress(move |done, total| {
                progress.set_length(total as u64);
                progress.set_position(done as u64);
            });
            let cancel = orchestrator.cancel_token();
            watch_interrupt(cancel.clone())?;

            let mut job = SynthesisJob::new(unit, engine_config, OutputTarget::new(&wav, AudioFormat::Wav));
            let (result, _) = convert(&mut orchestrator, &mut job, &config.export_settings());
            bar.finish_and_clear();

            let played = result.and_then(|()| {
                println!("Playing (Ctrl-C to stop)");
                config.player().play(&wav, &cancel)
            });
            match played {
                Err(e) if matches!(e.cause(), DocvoxError::Cancelled) => println!("Stopped"),
                other => other?,
            }
        }

        Commands::Voices { engine } => {
            let engines = match engine {
                Some(kind) => vec![kind],
                None => EngineKind::ALL.to_vec(),
            };
            for kind in engines {
                list_voices(kind, &config);
            }
        }

        Commands::SaveEdit {
            input,
            output,
            edits,
        } => {
            let prior = load_edits(edits.as_deref())?;
            let unit = prepare_text(&input, prior.as_ref())?;
            save_edition(&unit, &output)
                .with_context(|| format!("saving {}", output.display()))?;
            println!("Saved {}", output.display());
        }
    }

    Ok(())
}

/// Engine configuration from the config file and command-line overrides
fn engine_config(config: &Config, engine: Option<EngineKind>, voice: Option<String>) -> EngineConfig {
    let mut engine_config = config.engine_config();
    if let Some(engine) = engine {
        if engine != engine_config.engine {
            engine_config.voice = None;
        }
        engine_config.engine = engine;
    }
    if let Some(voice) = voice {
        engine_config.voice = Some(voice);
    }
    engine_config
}

fn progress_bar(len: usize, engine: &EngineConfig) -> anyhow::Result<ProgressBar> {
    let bar = ProgressBar::new(len as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>5}/{len:5} {msg}")?
            .progress_chars("#>-"),
    );
    bar.set_message(format!("{} segments", engine.engine));
    Ok(bar)
}

/// Cancel `token` when the user presses Ctrl-C
fn watch_interrupt(token: CancelToken) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, SigHandler, Signal};
        unsafe {
            signal::signal(Signal::SIGINT, SigHandler::Handler(handle_sigint))
                .context("Failed to set SIGINT handler")?;
        }
    }

    thread::spawn(move || {
        while !INTERRUPTED.load(Ordering::Relaxed) {
            thread::sleep(Duration::from_millis(50));
        }
        info!("Interrupted, cancelling");
        token.cancel();
    });
    Ok(())
}

fn load_edits(path: Option<&Path>) -> anyhow::Result<Option<TextUnit>> {
    path.map(|p| TextUnit::load(p).with_context(|| format!("loading edits from {}", p.display())))
        .transpose()
}

fn list_voices(kind: EngineKind, config: &Config) {
    println!("{}:", kind);
    match kind {
        EngineKind::Piper => {
            let store = VoiceStore::new(config.engine_settings().models_dir);
            let voices = store.list();
            if voices.is_empty() {
                println!("  (no voices installed in {})", store.models_dir().display());
            }
            for voice in voices {
                match voice.sample_rate {
                    Some(rate) => println!("  {} ({} Hz)", voice.name, rate),
                    None => println!("  {}", voice.name),
                }
            }
        }
        EngineKind::Pico => {
            for voice in PICO_VOICES {
                println!("  {} (16000 Hz)", voice);
            }
        }
        EngineKind::Espeak => {
            for voice in ESPEAK_VOICES {
                println!("  {}", voice);
            }
            println!("  (any voice listed by espeak-ng --voices)");
        }
    }
}

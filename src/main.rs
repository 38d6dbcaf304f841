//! srt-tts-sync - консольная утилита
//!
//! Озвучивает SRT-файл через VITS-сервер и сохраняет одну нормализованную
//! дорожку. Без `--srt` предлагает выбрать файл из директории субтитров.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use walkdir::WalkDir;

use srt_tts_sync::logger::init_logger;
use srt_tts_sync::subtitle::format_timecode;
use srt_tts_sync::{ProgressUpdate, SrtTtsSync, SyncConfig, TtsSyncError};

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(name = "srt-tts-sync")]
#[command(about = "Voice an SRT transcript into one synchronized, loudness-normalized track")]
#[command(version)]
struct Args {
    /// SRT file to process (interactive selection from --srt-dir when omitted)
    #[arg(short, long)]
    srt: Option<PathBuf>,

    /// Output file (defaults to <out-dir>/<srt name>.<format>)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file
    #[arg(short, long, env = "SRT_TTS_SYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Replacement dictionary (JSON)
    #[arg(long)]
    dict: Option<PathBuf>,

    /// Directory with SRT files
    #[arg(long)]
    srt_dir: Option<PathBuf>,

    /// Directory for finished tracks
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Directory for per-cue clips
    #[arg(long)]
    scratch_dir: Option<PathBuf>,

    /// Target integrated loudness, LUFS
    #[arg(long, allow_hyphen_values = true)]
    target_lufs: Option<f64>,

    /// Voice id on the synthesis server
    #[arg(long)]
    speaker: Option<u32>,

    /// Synthesis endpoint URL
    #[arg(long, env = "VITS_ENDPOINT")]
    endpoint: Option<String>,

    /// Number of cues processed concurrently
    #[arg(short, long)]
    jobs: Option<usize>,
}

impl Args {
    fn apply_overrides(&self, config: &mut SyncConfig) {
        if let Some(dict) = &self.dict {
            config.dictionary_path = dict.clone();
        }
        if let Some(dir) = &self.srt_dir {
            config.srt_dir = dir.clone();
        }
        if let Some(dir) = &self.out_dir {
            config.out_dir = dir.clone();
        }
        if let Some(dir) = &self.scratch_dir {
            config.scratch_dir = dir.clone();
        }
        if let Some(lufs) = self.target_lufs {
            config.loudness.integrated = lufs;
        }
        if let Some(speaker) = self.speaker {
            config.speaker_id = speaker;
        }
        if let Some(endpoint) = &self.endpoint {
            config.vits_base_url = endpoint.clone();
        }
        if let Some(jobs) = self.jobs {
            config.max_concurrent_requests = jobs;
        }
    }
}

/// SRT-файлы директории (без вложенных), по имени
fn list_srt_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case("srt"))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Интерактивный выбор SRT-файла
fn choose_srt(dir: &Path) -> Result<Option<PathBuf>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        println!(
            "Created {}. Put .srt files there and run again.",
            dir.display()
        );
        return Ok(None);
    }

    let files = list_srt_files(dir);
    if files.is_empty() {
        println!("No .srt files found in {}", dir.display());
        return Ok(None);
    }

    println!("SRT files in {}:", dir.display());
    for (i, file) in files.iter().enumerate() {
        let name = file.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        println!("  {}. {}", i + 1, name);
    }
    print!("Select a file (1-{}): ", files.len());
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    match line.trim().parse::<usize>() {
        Ok(n) if (1..=files.len()).contains(&n) => Ok(Some(files[n - 1].clone())),
        _ => {
            println!("Invalid selection: {:?}", line.trim());
            Ok(None)
        }
    }
}

fn default_output(config: &SyncConfig, srt: &Path) -> PathBuf {
    let stem = srt
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    config
        .out_dir
        .join(format!("{}.{}", stem, config.audio_format))
}

fn print_progress(update: &ProgressUpdate) {
    match update {
        ProgressUpdate::Started { total_cues } => println!("Processing {} cues", total_cues),
        ProgressUpdate::CueStarted { cue_id, index, total } => {
            println!("[{}/{}] cue {}", index + 1, total, cue_id)
        }
        ProgressUpdate::CueSkipped { cue_id, reason } => {
            println!("  cue {} skipped: {}", cue_id, reason)
        }
        ProgressUpdate::CueReady {
            cue_id,
            start_offset_ms,
            duration_ms,
            speed_factor,
        } => {
            let tempo = speed_factor
                .map(|f| format!(", sped up {:.2}x", f))
                .unwrap_or_default();
            println!(
                "  cue {} at {} ({:.0} ms{})",
                cue_id,
                format_timecode(*start_offset_ms),
                duration_ms,
                tempo
            );
        }
        ProgressUpdate::Merging { clips } => println!("Mixing {} clips...", clips),
        ProgressUpdate::Normalizing { pass } => {
            println!("Loudness normalization, pass {}/2...", pass)
        }
        ProgressUpdate::Finished { output } => println!("Saved {}", output.display()),
        ProgressUpdate::Failed { reason } => eprintln!("Failed: {}", reason),
    }
}

/// Дождаться вывода прогресса; сбой задачи печати не влияет на результат
async fn wait_for_printer(printer: JoinHandle<()>) -> bool {
    match printer.await {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Progress printer stopped abnormally: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SyncConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => SyncConfig::default(),
    };
    args.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let srt = match &args.srt {
        Some(path) => path.clone(),
        None => match choose_srt(&config.srt_dir)? {
            Some(path) => path,
            None => return Ok(()),
        },
    };
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&config, &srt));

    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            print_progress(&update);
        }
    });

    let result = SrtTtsSync::with_progress(config.clone(), tx)
        .process(&srt, &output)
        .await;
    wait_for_printer(printer).await;

    match result {
        Ok(report) => {
            println!(
                "{} clips, {} cues skipped, gain {:+.2} dB (measured {:.2} LUFS)",
                report.clips.len(),
                report.skipped.len(),
                report.loudness.applied_offset,
                report.loudness.stats.measured_integrated
            );
            println!(
                "Intermediate clips are kept in {}",
                config.scratch_dir.display()
            );
            Ok(())
        }
        Err(TtsSyncError::NothingToMerge) => {
            println!("No audio was generated, nothing to merge.");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to voice {}", srt.display())),
    }
}

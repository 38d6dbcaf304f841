//! Модуль для работы с FFmpeg
//!
//! Движок принимает описание задания (входы, фильтр, выход), запускает
//! ffmpeg и возвращает его диагностический вывод (stderr). Каждый запуск
//! ограничен по времени; процесс, не уложившийся в таймаут, завершается.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use tokio::process::Command;

use crate::config::SyncConfig;
use crate::error::EngineError;
use crate::media::filter::{FilterChain, FilterGraph};

/// Сколько последних строк stderr сохранять в ошибке
const STDERR_TAIL_LINES: usize = 12;

/// Фильтр задания
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFilter {
    /// `-filter:a`
    Simple(FilterChain),
    /// `-filter_complex`
    Complex(FilterGraph),
}

/// Куда писать результат
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    File {
        path: PathBuf,
        codec: Option<String>,
    },
    /// Аудио отбрасывается (`-f null -`), нужен только диагностический вывод
    Discard,
}

/// Задание для движка
#[derive(Debug, Clone, PartialEq)]
pub struct EngineJob {
    pub inputs: Vec<PathBuf>,
    pub filter: AudioFilter,
    pub output: JobOutput,
}

impl EngineJob {
    pub fn simple(input: impl Into<PathBuf>, chain: FilterChain, output: JobOutput) -> Self {
        Self {
            inputs: vec![input.into()],
            filter: AudioFilter::Simple(chain),
            output,
        }
    }

    pub fn complex(inputs: Vec<PathBuf>, graph: FilterGraph, output: JobOutput) -> Self {
        Self {
            inputs,
            filter: AudioFilter::Complex(graph),
            output,
        }
    }

    /// Аргументы командной строки ffmpeg
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = vec!["-hide_banner".into(), "-nostdin".into(), "-y".into()];
        for input in &self.inputs {
            args.push("-i".into());
            args.push(input.to_string_lossy().into_owned());
        }
        match &self.filter {
            AudioFilter::Simple(chain) => {
                args.push("-filter:a".into());
                args.push(chain.to_string());
            }
            AudioFilter::Complex(graph) => {
                args.push("-filter_complex".into());
                args.push(graph.to_string());
            }
        }
        match &self.output {
            JobOutput::File { path, codec } => {
                if let Some(codec) = codec {
                    args.push("-c:a".into());
                    args.push(codec.clone());
                }
                args.push(path.to_string_lossy().into_owned());
            }
            JobOutput::Discard => {
                args.extend(["-f".to_string(), "null".to_string(), "-".to_string()]);
            }
        }
        args
    }
}

/// Внешний движок обработки аудио
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Выполнить задание и вернуть диагностический вывод
    async fn run(&self, job: &EngineJob) -> Result<String, EngineError>;

    /// Длительность аудиофайла в секундах
    async fn probe_duration(&self, path: &Path) -> Result<f64, EngineError>;
}

/// Реализация движка через бинарники ffmpeg/ffprobe
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
    timeout: Duration,
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            config.ffprobe_path.clone(),
            config.engine_timeout(),
        )
    }

    /// Проверка наличия FFmpeg
    pub async fn check_installed(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn execute(&self, program: &str, args: &[String]) -> Result<std::process::Output, EngineError> {
        debug!("Running {} {}", program, args.join(" "));
        let started = Instant::now();
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // При таймауте future с дочерним процессом уничтожается, kill_on_drop завершает процесс
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| EngineError::Timeout {
                program: program.to_string(),
                elapsed: started.elapsed(),
            })?
            .map_err(|source| EngineError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr_tail: stderr_tail(&stderr, STDERR_TAIL_LINES),
            });
        }

        debug!("{} finished in {:?}", program, started.elapsed());
        Ok(output)
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn run(&self, job: &EngineJob) -> Result<String, EngineError> {
        let output = self.execute(&self.ffmpeg, &job.to_args()).await?;
        Ok(String::from_utf8_lossy(&output.stderr).into_owned())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64, EngineError> {
        let args: Vec<String> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "default=noprint_wrappers=1:nokey=1".into(),
            path.to_string_lossy().into_owned(),
        ];
        let output = self.execute(&self.ffprobe, &args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&stdout).ok_or_else(|| EngineError::UnexpectedOutput {
            program: self.ffprobe.clone(),
            output: stdout.trim().to_string(),
        })
    }
}

/// Разбор вывода ffprobe с длительностью
pub fn parse_probe_output(stdout: &str) -> Option<f64> {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
}

/// Последние `lines` строк вывода
fn stderr_tail(stderr: &str, lines: usize) -> String {
    let all: Vec<&str> = stderr.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

//! Основной файл библиотеки srt-tts-sync
//!
//! Библиотека озвучивает SRT-субтитры: синтезирует речь для каждого субтитра,
//! подгоняет клипы под окна субтитров, сводит их на общую временную шкалу и
//! нормализует громкость итоговой дорожки.

pub mod config;
pub mod error;
pub mod logger;
pub mod media;
pub mod pipeline;
pub mod progress;
pub mod subtitle;
pub mod text;
pub mod tts;
pub mod utils;

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::Sender;

pub use crate::config::{LoudnessTarget, SyncConfig};
pub use crate::error::{Result, TtsSyncError};
pub use crate::pipeline::{Pipeline, PipelineReport, SkipReason, SkippedCue};
pub use crate::progress::{PipelineStage, ProgressUpdate};

use crate::media::FfmpegEngine;
use crate::text::{Dictionary, TextNormalizer};
use crate::tts::VitsSynthesizer;

/// Основная структура для работы с библиотекой
pub struct SrtTtsSync {
    /// Конфигурация библиотеки
    config: SyncConfig,
    /// Канал для обновлений прогресса
    progress: Option<Sender<ProgressUpdate>>,
}

impl SrtTtsSync {
    /// Создать новый экземпляр с указанной конфигурацией
    pub fn new(config: SyncConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Создать экземпляр, отправляющий обновления прогресса в канал
    pub fn with_progress(config: SyncConfig, sender: Sender<ProgressUpdate>) -> Self {
        Self {
            config,
            progress: Some(sender),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Озвучить SRT-файл и сохранить нормализованную дорожку в `output_path`
    pub async fn process(&self, srt_path: &Path, output_path: &Path) -> Result<PipelineReport> {
        log::info!("Starting synchronization of {}", srt_path.display());
        self.config.validate()?;

        let entries = subtitle::parse_srt_file(srt_path)?;
        let cues = subtitle::cues_from_entries(&entries);
        log::info!("Parsed {} cues ({} entries in file)", cues.len(), entries.len());

        let dictionary = Dictionary::load_or_empty(&self.config.dictionary_path);
        let engine = FfmpegEngine::from_config(&self.config);
        if !engine.check_installed().await {
            log::warn!(
                "{} did not respond to -version, engine calls will likely fail",
                self.config.ffmpeg_path
            );
        }

        let mut pipeline = Pipeline::new(
            self.config.clone(),
            Arc::new(VitsSynthesizer::from_config(&self.config)),
            Arc::new(engine),
            TextNormalizer::new(dictionary),
        );
        if let Some(sender) = &self.progress {
            pipeline = pipeline.with_progress(sender.clone());
        }
        pipeline.run(&cues, output_path).await
    }
}

/// Публичный API для удобного использования
pub async fn synchronize_srt(
    srt_path: &Path,
    output_path: &Path,
    config: SyncConfig,
) -> Result<PipelineReport> {
    SrtTtsSync::new(config).process(srt_path, output_path).await
}

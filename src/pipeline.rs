//! Оркестратор полного цикла: субтитры -> клипы -> сведение -> нормализация
//!
//! Состояния: `Init -> PerCue(i) -> Merging -> Normalizing -> Done`, при
//! фатальной ошибке `Failed`. Ошибка отдельного субтитра не прерывает запуск:
//! субтитр пропускается, остальные обрабатываются дальше. Порядок клипов
//! всегда совпадает с порядком субтитров.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use log::{debug, error, info, warn};
use tokio::sync::mpsc::Sender;
use tokio::sync::Semaphore;

use crate::config::SyncConfig;
use crate::error::{Result, TtsSyncError};
use crate::media::engine::MediaEngine;
use crate::media::loudness::{LoudnessNormalizer, LoudnessReport};
use crate::media::mixer::{self, SynthesizedClip};
use crate::media::{probe, tempo};
use crate::progress::{send_progress, PipelineStage, ProgressUpdate};
use crate::subtitle::Cue;
use crate::text::TextNormalizer;
use crate::tts::SpeechSynthesizer;
use crate::utils::ScratchDir;

/// Сведённая дорожка может быть чуть короче расчётной из-за кодека
const MERGED_DURATION_TOLERANCE_MS: f64 = 100.0;

/// Причина, по которой субтитр не дал клипа
#[derive(Debug)]
pub enum SkipReason {
    /// После очистки текста произносить нечего
    EmptyText,
    /// Ошибка на одном из шагов обработки субтитра
    Failed(TtsSyncError),
    /// Задача обработки завершилась аварийно
    Aborted(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyText => f.write_str("text is empty after normalization"),
            Self::Failed(e) => write!(f, "{}", e),
            Self::Aborted(e) => write!(f, "task aborted: {}", e),
        }
    }
}

/// Пропущенный субтитр
#[derive(Debug)]
pub struct SkippedCue {
    pub cue_id: u32,
    pub reason: SkipReason,
}

/// Итог успешного запуска
#[derive(Debug)]
pub struct PipelineReport {
    /// Итоговый нормализованный файл
    pub output: PathBuf,
    /// Клипы в порядке субтитров
    pub clips: Vec<SynthesizedClip>,
    /// Пропущенные субтитры в порядке субтитров
    pub skipped: Vec<SkippedCue>,
    /// Длительность сведённой дорожки, если её удалось измерить
    pub merged_duration_ms: Option<f64>,
    pub loudness: LoudnessReport,
}

type CueOutcome = std::result::Result<SynthesizedClip, SkipReason>;

/// Всё, что нужно для обработки одного субтитра; дёшево клонируется в задачи
#[derive(Clone)]
struct CueWorker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    engine: Arc<dyn MediaEngine>,
    normalizer: Arc<TextNormalizer>,
    scratch: ScratchDir,
    progress: Option<Sender<ProgressUpdate>>,
}

impl CueWorker {
    async fn process(&self, index: usize, total: usize, cue: &Cue) -> CueOutcome {
        send_progress(
            &self.progress,
            ProgressUpdate::CueStarted {
                cue_id: cue.id,
                index,
                total,
            },
        )
        .await;

        let text = self.normalizer.normalize(&cue.text);
        if text != cue.text {
            info!("[{}] text: {:?} -> {:?}", cue.id, cue.text, text);
        }
        if text.is_empty() {
            return Err(SkipReason::EmptyText);
        }

        self.synthesize_and_fit(index, cue, &text)
            .await
            .map_err(SkipReason::Failed)
    }

    async fn synthesize_and_fit(&self, index: usize, cue: &Cue, text: &str) -> Result<SynthesizedClip> {
        let audio = self
            .synthesizer
            .synthesize(text, cue.id)
            .await
            .map_err(|source| TtsSyncError::Synthesis {
                cue_id: cue.id,
                source,
            })?;

        let clip_path = self.scratch.clip_path(index, cue.id);
        tokio::fs::write(&clip_path, &audio).await?;

        let engine = self.engine.as_ref();
        let generated = probe::probe_duration_secs(engine, &clip_path).await?;
        let window = cue.window_secs();
        info!(
            "[{}] window: {:.2}s, generated audio: {:.2}s",
            cue.id, window, generated
        );

        let speed_factor = tempo::speed_factor(generated, window);
        let (path, duration_secs) = match speed_factor {
            Some(factor) => {
                let processed = self.scratch.processed_path(index, cue.id);
                tempo::adjust_tempo(engine, &clip_path, &processed, factor).await?;
                let adjusted = probe::probe_duration_secs(engine, &processed).await?;
                debug!("[{}] adjusted duration: {:.2}s", cue.id, adjusted);
                (processed, adjusted)
            }
            None => {
                info!("[{}] audio fits its window, no tempo change", cue.id);
                (clip_path, generated)
            }
        };

        let clip = SynthesizedClip {
            cue_id: cue.id,
            path,
            start_offset_ms: cue.start_ms,
            duration_ms: duration_secs * 1000.0,
        };
        send_progress(
            &self.progress,
            ProgressUpdate::CueReady {
                cue_id: clip.cue_id,
                start_offset_ms: clip.start_offset_ms,
                duration_ms: clip.duration_ms,
                speed_factor,
            },
        )
        .await;
        Ok(clip)
    }
}

/// Оркестратор одного запуска
pub struct Pipeline {
    config: SyncConfig,
    worker: CueWorker,
    stage: PipelineStage,
}

impl Pipeline {
    pub fn new(
        config: SyncConfig,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        engine: Arc<dyn MediaEngine>,
        normalizer: TextNormalizer,
    ) -> Self {
        let scratch = ScratchDir::new(config.scratch_dir.clone(), config.audio_format.clone());
        Self {
            worker: CueWorker {
                synthesizer,
                engine,
                normalizer: Arc::new(normalizer),
                scratch,
                progress: None,
            },
            config,
            stage: PipelineStage::Init,
        }
    }

    /// Отправлять обновления прогресса в канал
    pub fn with_progress(mut self, sender: Sender<ProgressUpdate>) -> Self {
        self.worker.progress = Some(sender);
        self
    }

    /// Текущее состояние
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.worker.scratch
    }

    fn enter(&mut self, stage: PipelineStage) {
        debug!("Pipeline stage: {} -> {}", self.stage, stage);
        self.stage = stage;
    }

    /// Полный запуск: клипы для `cues`, сведение и нормализация в `output`
    pub async fn run(&mut self, cues: &[Cue], output: &Path) -> Result<PipelineReport> {
        match self.run_stages(cues, output).await {
            Ok(report) => {
                self.enter(PipelineStage::Done);
                info!("Run finished, output saved to {}", report.output.display());
                send_progress(
                    &self.worker.progress,
                    ProgressUpdate::Finished {
                        output: report.output.clone(),
                    },
                )
                .await;
                Ok(report)
            }
            Err(e) => {
                let failed_in = self.stage;
                self.enter(PipelineStage::Failed);
                error!("Run failed during {}: {}", failed_in, e);
                send_progress(
                    &self.worker.progress,
                    ProgressUpdate::Failed {
                        reason: e.to_string(),
                    },
                )
                .await;
                Err(e)
            }
        }
    }

    async fn run_stages(&mut self, cues: &[Cue], output: &Path) -> Result<PipelineReport> {
        self.enter(PipelineStage::Init);
        send_progress(
            &self.worker.progress,
            ProgressUpdate::Started {
                total_cues: cues.len(),
            },
        )
        .await;
        self.worker.scratch.prepare().await?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (clips, skipped) = self.process_cues(cues).await;
        info!("{} of {} cues produced clips", clips.len(), cues.len());

        self.enter(PipelineStage::Merging);
        if clips.is_empty() {
            warn!("No audio was generated, nothing to merge");
            return Err(TtsSyncError::NothingToMerge);
        }
        send_progress(
            &self.worker.progress,
            ProgressUpdate::Merging { clips: clips.len() },
        )
        .await;

        let engine = Arc::clone(&self.worker.engine);
        let merged = self.worker.scratch.merged_path();
        mixer::merge_clips(engine.as_ref(), &clips, &merged, self.config.normalize_mix).await?;
        let merged_duration_ms = self.check_merged_duration(&merged, &clips).await;

        self.enter(PipelineStage::Normalizing);
        let normalizer = LoudnessNormalizer::new(engine.as_ref(), self.config.loudness);
        send_progress(&self.worker.progress, ProgressUpdate::Normalizing { pass: 1 }).await;
        let stats = normalizer.analyze(&merged).await?;
        send_progress(&self.worker.progress, ProgressUpdate::Normalizing { pass: 2 }).await;
        let applied_offset = normalizer.apply(&merged, output, &stats).await?;

        if let Err(e) = tokio::fs::remove_file(&merged).await {
            warn!("Failed to remove merged track {}: {}", merged.display(), e);
        }

        Ok(PipelineReport {
            output: output.to_path_buf(),
            clips,
            skipped,
            merged_duration_ms,
            loudness: LoudnessReport {
                stats,
                applied_offset,
            },
        })
    }

    /// Обработать все субтитры и собрать клипы в исходном порядке
    async fn process_cues(&mut self, cues: &[Cue]) -> (Vec<SynthesizedClip>, Vec<SkippedCue>) {
        let total = cues.len();
        let limit = self.config.max_concurrent_requests.max(1);

        let mut outcomes: Vec<(usize, u32, CueOutcome)> = if limit == 1 {
            let mut outcomes = Vec::with_capacity(total);
            for (index, cue) in cues.iter().enumerate() {
                self.enter(PipelineStage::PerCue(index));
                let outcome = self.worker.process(index, total, cue).await;
                outcomes.push((index, cue.id, outcome));
            }
            outcomes
        } else {
            info!("Processing {} cues with up to {} in parallel", total, limit);
            let semaphore = Arc::new(Semaphore::new(limit));
            let tasks: Vec<_> = cues
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, cue)| {
                    let worker = self.worker.clone();
                    let semaphore = Arc::clone(&semaphore);
                    tokio::spawn(async move {
                        let outcome = match semaphore.acquire_owned().await {
                            Ok(_permit) => worker.process(index, total, &cue).await,
                            Err(e) => Err(SkipReason::Aborted(e.to_string())),
                        };
                        (index, cue.id, outcome)
                    })
                })
                .collect();

            join_all(tasks)
                .await
                .into_iter()
                .zip(cues.iter().enumerate())
                .map(|(joined, (index, cue))| match joined {
                    Ok(result) => result,
                    Err(e) => (index, cue.id, Err(SkipReason::Aborted(e.to_string()))),
                })
                .collect()
        };

        // Склейка должна идти в порядке субтитров, а не в порядке завершения
        outcomes.sort_by_key(|(index, _, _)| *index);

        let mut clips = Vec::with_capacity(outcomes.len());
        let mut skipped = Vec::new();
        for (index, cue_id, outcome) in outcomes {
            if limit > 1 {
                self.enter(PipelineStage::PerCue(index));
            }
            match outcome {
                Ok(clip) => clips.push(clip),
                Err(reason) => {
                    match &reason {
                        SkipReason::EmptyText => info!("[{}] skipped: {}", cue_id, reason),
                        _ => warn!("[{}] skipped: {}", cue_id, reason),
                    }
                    send_progress(
                        &self.worker.progress,
                        ProgressUpdate::CueSkipped {
                            cue_id,
                            reason: reason.to_string(),
                        },
                    )
                    .await;
                    skipped.push(SkippedCue { cue_id, reason });
                }
            }
        }
        (clips, skipped)
    }

    /// Сравнить длительность сведённой дорожки с концом самого позднего клипа
    async fn check_merged_duration(&self, merged: &Path, clips: &[SynthesizedClip]) -> Option<f64> {
        let expected = mixer::timeline_span_ms(clips);
        match probe::probe_duration_ms(self.worker.engine.as_ref(), merged).await {
            Ok(actual) => {
                if actual + MERGED_DURATION_TOLERANCE_MS < expected {
                    warn!(
                        "Merged track is {:.0} ms, shorter than the expected {:.0} ms",
                        actual, expected
                    );
                } else {
                    info!("Merged track duration: {:.0} ms", actual);
                }
                Some(actual)
            }
            Err(e) => {
                warn!("Could not measure merged track: {}", e);
                None
            }
        }
    }
}

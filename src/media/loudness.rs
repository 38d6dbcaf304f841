//! Двухпроходная нормализация громкости (EBU R128, фильтр loudnorm)
//!
//! Первый проход только измеряет: аудио отбрасывается, из диагностического
//! вывода берётся последний JSON-блок. Второй проход применяет фильтр с
//! измеренными значениями. Смещение усиления для второго прохода считается
//! как `target - measured_i`; значение `target_offset`, которое предлагает
//! сам фильтр, для речевого материала оказывается неверным и не используется.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Deserializer};

use crate::config::LoudnessTarget;
use crate::error::{Result, TtsSyncError};
use crate::media::engine::{EngineJob, JobOutput, MediaEngine};
use crate::media::filter::{Filter, FilterChain};

/// Результат измерения первого прохода
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessStats {
    /// Интегральная громкость, LUFS
    pub measured_integrated: f64,
    /// Диапазон громкости, LU
    pub measured_lra: f64,
    /// Истинный пик, dBTP
    pub measured_true_peak: f64,
    /// Порог гейтирования, LUFS
    pub measured_threshold: f64,
    /// Смещение, предложенное фильтром (только для журнала)
    pub engine_suggested_offset: f64,
}

/// Отчёт о нормализации
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoudnessReport {
    pub stats: LoudnessStats,
    /// Смещение, фактически переданное во второй проход
    pub applied_offset: f64,
}

/// JSON-блок, который печатает loudnorm с `print_format=json`
#[derive(Debug, Deserialize)]
struct LoudnormJson {
    #[serde(deserialize_with = "lenient_f64")]
    input_i: f64,
    #[serde(deserialize_with = "lenient_f64")]
    input_tp: f64,
    #[serde(deserialize_with = "lenient_f64")]
    input_lra: f64,
    #[serde(deserialize_with = "lenient_f64")]
    input_thresh: f64,
    #[serde(deserialize_with = "lenient_f64")]
    target_offset: f64,
}

/// loudnorm печатает числа строками ("-27.61"), но числа тоже принимаются
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(f64),
        Str(String),
    }

    match NumOrString::deserialize(deserializer)? {
        NumOrString::Num(n) => Ok(n),
        NumOrString::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
    }
}

/// Последний блок `{ ... }` в диагностическом выводе
pub fn extract_json_block(diagnostics: &str) -> Option<&str> {
    let start = diagnostics.rfind('{')?;
    let end = diagnostics.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&diagnostics[start..=end])
}

/// Разобрать результат первого прохода
pub fn parse_analysis(diagnostics: &str) -> Result<LoudnessStats> {
    let block = extract_json_block(diagnostics).ok_or_else(|| {
        TtsSyncError::AnalysisParse("no JSON block found in engine diagnostics".to_string())
    })?;
    let raw: LoudnormJson = serde_json::from_str(block)
        .map_err(|e| TtsSyncError::AnalysisParse(format!("{}: {}", e, block)))?;

    let stats = LoudnessStats {
        measured_integrated: raw.input_i,
        measured_lra: raw.input_lra,
        measured_true_peak: raw.input_tp,
        measured_threshold: raw.input_thresh,
        engine_suggested_offset: raw.target_offset,
    };

    let measured = [
        stats.measured_integrated,
        stats.measured_lra,
        stats.measured_true_peak,
        stats.measured_threshold,
    ];
    if measured.iter().any(|v| !v.is_finite()) {
        return Err(TtsSyncError::AnalysisParse(format!(
            "non-finite measurement (silent input?): {}",
            block
        )));
    }
    Ok(stats)
}

/// Смещение для второго прохода, округлённое до сотых
pub fn corrected_offset(target_integrated: f64, measured_integrated: f64) -> f64 {
    ((target_integrated - measured_integrated) * 100.0).round() / 100.0
}

fn base_filter(target: &LoudnessTarget) -> Filter {
    Filter::new("loudnorm")
        .option("I", target.integrated)
        .option("LRA", target.lra)
        .option("tp", target.true_peak)
}

/// Фильтр первого прохода
pub fn analysis_filter(target: &LoudnessTarget) -> FilterChain {
    base_filter(target).option("print_format", "json").into()
}

/// Фильтр второго прохода
pub fn application_filter(target: &LoudnessTarget, stats: &LoudnessStats, offset: f64) -> FilterChain {
    base_filter(target)
        .option("measured_i", stats.measured_integrated)
        .option("measured_lra", stats.measured_lra)
        .option("measured_tp", stats.measured_true_peak)
        .option("measured_thresh", stats.measured_threshold)
        .option("offset", format!("{:.2}", offset))
        .into()
}

/// Временный файл второго прохода рядом с итоговым
fn partial_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let name = match output.extension() {
        Some(ext) => format!(".{}.normalizing.{}", stem, ext.to_string_lossy()),
        None => format!(".{}.normalizing", stem),
    };
    output.with_file_name(name)
}

/// Двухпроходный нормализатор громкости
pub struct LoudnessNormalizer<'a> {
    engine: &'a dyn MediaEngine,
    target: LoudnessTarget,
}

impl<'a> LoudnessNormalizer<'a> {
    pub fn new(engine: &'a dyn MediaEngine, target: LoudnessTarget) -> Self {
        Self { engine, target }
    }

    /// Первый проход: измерение
    pub async fn analyze(&self, input: &Path) -> Result<LoudnessStats> {
        info!("Pass 1: measuring loudness of {}", input.display());
        let job = EngineJob::simple(input, analysis_filter(&self.target), JobOutput::Discard);
        let diagnostics = self
            .engine
            .run(&job)
            .await
            .map_err(TtsSyncError::AnalysisEngine)?;
        let stats = parse_analysis(&diagnostics)?;
        info!(
            "Measured integrated loudness: {} LUFS (LRA {}, TP {}, threshold {})",
            stats.measured_integrated,
            stats.measured_lra,
            stats.measured_true_peak,
            stats.measured_threshold
        );
        Ok(stats)
    }

    /// Второй проход: применение. Итоговый файл появляется только при успехе.
    pub async fn apply(&self, input: &Path, output: &Path, stats: &LoudnessStats) -> Result<f64> {
        let offset = corrected_offset(self.target.integrated, stats.measured_integrated);
        info!(
            "Engine-suggested offset {:.2} is unreliable, ignored",
            stats.engine_suggested_offset
        );
        info!("Pass 2: applying manually computed offset {:.2} dB", offset);

        let partial = partial_path(output);
        let job = EngineJob::simple(
            input,
            application_filter(&self.target, stats, offset),
            JobOutput::File {
                path: partial.clone(),
                codec: None,
            },
        );

        if let Err(e) = self.engine.run(&job).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", partial.display(), cleanup);
                }
            }
            return Err(TtsSyncError::ApplicationEngine(e));
        }

        tokio::fs::rename(&partial, output).await?;
        info!("Normalization finished, saved to {}", output.display());
        Ok(offset)
    }

    /// Оба прохода подряд
    pub async fn normalize(&self, input: &Path, output: &Path) -> Result<LoudnessReport> {
        let stats = self.analyze(input).await?;
        let applied_offset = self.apply(input, output, &stats).await?;
        Ok(LoudnessReport {
            stats,
            applied_offset,
        })
    }
}

//! Изменение темпа клипа без изменения высоты тона
//!
//! Речь только сжимается, чтобы уложиться в окно субтитра: растягивать клип
//! до длины окна не нужно.

use std::path::Path;

use log::info;

use crate::error::{Result, TtsSyncError};
use crate::media::engine::{EngineJob, JobOutput, MediaEngine};
use crate::media::filter::{Filter, FilterChain};

/// Допустимый диапазон одного фильтра atempo
pub const ATEMPO_MIN: f64 = 0.5;
pub const ATEMPO_MAX: f64 = 2.0;

/// Коэффициент ускорения, если клип не помещается в окно субтитра
///
/// Возвращает `None`, когда клип и так помещается или окно пустое/отрицательное.
pub fn speed_factor(generated_secs: f64, window_secs: f64) -> Option<f64> {
    if generated_secs > window_secs && window_secs > 0.0 {
        Some(generated_secs / window_secs)
    } else {
        None
    }
}

/// Разложить коэффициент на ступени, каждая из которых в пределах [0.5, 2.0]
pub fn tempo_stages(factor: f64) -> Result<Vec<f64>> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(TtsSyncError::InvalidTempoFactor(factor));
    }

    let mut stages = Vec::new();
    let mut remaining = factor;
    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);
    Ok(stages)
}

/// Цепочка фильтров atempo для коэффициента
pub fn tempo_chain(factor: f64) -> Result<FilterChain> {
    Ok(tempo_stages(factor)?
        .into_iter()
        .fold(FilterChain::new(), |chain, stage| {
            chain.then(Filter::new("atempo").arg(stage))
        }))
}

/// Ускорить клип `input` в `factor` раз и записать в `output`
pub async fn adjust_tempo(
    engine: &dyn MediaEngine,
    input: &Path,
    output: &Path,
    factor: f64,
) -> Result<()> {
    let chain = tempo_chain(factor)?;
    info!(
        "[tempo] speed {:.2}x ({} stage(s)), file: {}",
        factor,
        chain.filters().len(),
        input.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    );

    let job = EngineJob::simple(
        input,
        chain,
        JobOutput::File {
            path: output.to_path_buf(),
            codec: None,
        },
    );
    engine
        .run(&job)
        .await
        .map(|_| ())
        .map_err(TtsSyncError::TempoAdjust)
}

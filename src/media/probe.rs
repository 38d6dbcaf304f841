//! Измерение длительности клипов

use std::path::Path;

use crate::error::{Result, TtsSyncError};
use crate::media::engine::MediaEngine;

/// Длительность клипа в секундах
pub async fn probe_duration_secs(engine: &dyn MediaEngine, path: &Path) -> Result<f64> {
    engine
        .probe_duration(path)
        .await
        .map_err(|source| TtsSyncError::DurationProbe {
            path: path.display().to_string(),
            source,
        })
}

/// Длительность клипа в миллисекундах
pub async fn probe_duration_ms(engine: &dyn MediaEngine, path: &Path) -> Result<f64> {
    Ok(probe_duration_secs(engine, path).await? * 1000.0)
}

//! Модуль конфигурации библиотеки srt-tts-sync
//!
//! Все параметры запуска собраны в одной структуре, которая передаётся
//! оркестратору при создании. Значения по умолчанию соответствуют локальному
//! VITS-серверу и целевой громкости -16 LUFS.

use std::path::{Path, PathBuf};
use std::time::Duration;

use path_clean::PathClean;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsSyncError};

/// Целевые параметры фильтра нормализации громкости
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoudnessTarget {
    /// Интегральная громкость, LUFS
    pub integrated: f64,
    /// Диапазон громкости (LRA), LU
    pub lra: f64,
    /// Максимальный истинный пик, dBTP
    pub true_peak: f64,
}

impl Default for LoudnessTarget {
    fn default() -> Self {
        Self {
            integrated: -16.0,
            lra: 11.0,
            true_peak: -1.5,
        }
    }
}

/// Конфигурация запуска
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Адрес сервиса синтеза
    pub vits_base_url: String,
    /// Идентификатор голоса
    pub speaker_id: u32,
    /// Формат аудио, запрашиваемый у сервиса (и расширение клипов)
    pub audio_format: String,
    /// Язык синтеза
    pub language: String,
    /// Директория с SRT-файлами
    pub srt_dir: PathBuf,
    /// Директория для итоговых файлов
    pub out_dir: PathBuf,
    /// Рабочая директория для клипов отдельных субтитров
    pub scratch_dir: PathBuf,
    /// Путь к словарю замен
    pub dictionary_path: PathBuf,
    /// Параметры нормализации громкости
    pub loudness: LoudnessTarget,
    /// Масштабировать ли входы `amix` по числу одновременно звучащих клипов
    pub normalize_mix: bool,
    /// Максимальное количество субтитров, обрабатываемых одновременно
    pub max_concurrent_requests: usize,
    /// Таймаут одного запроса к сервису синтеза, в секундах
    pub synthesis_timeout_secs: u64,
    /// Таймаут одного вызова ffmpeg/ffprobe, в секундах
    pub engine_timeout_secs: u64,
    /// Путь к ffmpeg
    pub ffmpeg_path: String,
    /// Путь к ffprobe
    pub ffprobe_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            vits_base_url: "http://127.0.0.1:23456/voice/vits".to_string(),
            speaker_id: 2894,
            audio_format: "mp3".to_string(),
            language: "auto".to_string(),
            srt_dir: PathBuf::from("./srt"),
            out_dir: PathBuf::from("./out"),
            scratch_dir: PathBuf::from("./temp_audio"),
            dictionary_path: PathBuf::from("./dict.json"),
            loudness: LoudnessTarget::default(),
            normalize_mix: true,
            max_concurrent_requests: 1,
            synthesis_timeout_secs: 60,
            engine_timeout_secs: 600,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl SyncConfig {
    /// Загрузить конфигурацию из JSON-файла; отсутствующие поля берутся по умолчанию
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TtsSyncError::FileNotFound(format!("{}: {}", path.display(), e))
        })?;
        let config: SyncConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Проверить согласованность параметров
    pub fn validate(&self) -> Result<()> {
        if self.vits_base_url.trim().is_empty() {
            return Err(TtsSyncError::Configuration(
                "synthesis endpoint must not be empty".to_string(),
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err(TtsSyncError::Configuration(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if self.synthesis_timeout_secs == 0 || self.engine_timeout_secs == 0 {
            return Err(TtsSyncError::Configuration(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        self.check_scratch_dir()?;
        let target = self.loudness;
        if !target.integrated.is_finite() || target.integrated >= 0.0 {
            return Err(TtsSyncError::Configuration(format!(
                "target loudness must be a negative LUFS value, got {}",
                target.integrated
            )));
        }
        if !target.lra.is_finite() || !target.true_peak.is_finite() {
            return Err(TtsSyncError::Configuration(
                "LRA and true peak must be finite".to_string(),
            ));
        }
        Ok(())
    }

    /// Очищаемая при запуске рабочая директория не должна совпадать с
    /// директориями пользователя или содержать их
    fn check_scratch_dir(&self) -> Result<()> {
        let cwd = std::env::current_dir()?;
        let absolute = |path: &Path| {
            if path.is_absolute() {
                path.clean()
            } else {
                cwd.join(path).clean()
            }
        };

        let scratch = absolute(&self.scratch_dir);
        let protected = [
            ("working directory", cwd.clean()),
            ("out_dir", absolute(&self.out_dir)),
            ("srt_dir", absolute(&self.srt_dir)),
            ("dictionary_path", absolute(&self.dictionary_path)),
        ];
        for (name, path) in protected {
            if path.starts_with(&scratch) {
                return Err(TtsSyncError::Configuration(format!(
                    "scratch_dir {} is cleared on every run and would remove {} {}",
                    self.scratch_dir.display(),
                    name,
                    path.display()
                )));
            }
        }
        Ok(())
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

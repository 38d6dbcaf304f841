//! Модуль обработки ошибок библиотеки srt-tts-sync
//!
//! Ошибки делятся на три группы: восстановимые в пределах одного субтитра
//! (субтитр пропускается, обработка продолжается), фатальные для всего запуска
//! и ошибки конфигурации/окружения.

use std::time::Duration;
use thiserror::Error;

/// Ошибки вызова внешнего движка (ffmpeg / ffprobe)
#[derive(Debug, Error)]
pub enum EngineError {
    /// Процесс не удалось запустить
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Процесс завершился с ненулевым кодом
    #[error("{program} exited with {status}: {stderr_tail}")]
    Failed {
        program: String,
        status: String,
        stderr_tail: String,
    },

    /// Процесс не уложился в отведённое время и был остановлен
    #[error("{program} timed out after {elapsed:?}")]
    Timeout { program: String, elapsed: Duration },

    /// Вывод процесса не удалось интерпретировать
    #[error("unexpected output from {program}: {output}")]
    UnexpectedOutput { program: String, output: String },
}

/// Ошибки обращения к сервису синтеза речи
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Сетевая ошибка (соединение, чтение тела ответа)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Сервис ответил статусом не из диапазона 2xx
    #[error("service responded with status {status}: {body}")]
    Service { status: u16, body: String },

    /// Сервис вернул пустое тело
    #[error("service returned an empty audio body")]
    EmptyResponse,

    /// Запрос не уложился в таймаут
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Ошибки библиотеки srt-tts-sync
#[derive(Debug, Error)]
pub enum TtsSyncError {
    /// Временная метка не соответствует формату `HH:MM:SS,mmm`
    #[error("malformed timecode: {0:?}")]
    MalformedTimecode(String),

    /// Синтез речи для субтитра не удался
    #[error("speech synthesis failed for cue {cue_id}: {source}")]
    Synthesis {
        cue_id: u32,
        #[source]
        source: SynthesisError,
    },

    /// Не удалось измерить длительность клипа
    #[error("duration probe failed for {path}: {source}")]
    DurationProbe {
        path: String,
        #[source]
        source: EngineError,
    },

    /// Ошибка изменения темпа клипа
    #[error("tempo adjustment failed: {0}")]
    TempoAdjust(#[source] EngineError),

    /// Коэффициент темпа не может быть применён
    #[error("invalid tempo factor: {0}")]
    InvalidTempoFactor(f64),

    /// Ни один субтитр не дал клипа, объединять нечего
    #[error("nothing to merge: no clips were produced")]
    NothingToMerge,

    /// Ошибка движка при объединении клипов
    #[error("merge failed: {0}")]
    MergeEngine(#[source] EngineError),

    /// В диагностическом выводе первого прохода нет корректного JSON-блока
    #[error("failed to parse loudness analysis: {0}")]
    AnalysisParse(String),

    /// Ошибка движка на первом проходе нормализации
    #[error("loudness analysis pass failed: {0}")]
    AnalysisEngine(#[source] EngineError),

    /// Ошибка движка на втором проходе нормализации
    #[error("loudness application pass failed: {0}")]
    ApplicationEngine(#[source] EngineError),

    /// Ошибка ввода-вывода
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ошибка сериализации/десериализации JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Ошибка конфигурации
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Файл не найден
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Неверный формат входных данных
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

impl TtsSyncError {
    /// Можно ли пропустить текущий субтитр и продолжить запуск
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TtsSyncError::MalformedTimecode(_)
                | TtsSyncError::Synthesis { .. }
                | TtsSyncError::DurationProbe { .. }
                | TtsSyncError::TempoAdjust(_)
                | TtsSyncError::InvalidTempoFactor(_)
        )
    }
}

/// Тип Result для библиотеки srt-tts-sync
pub type Result<T> = std::result::Result<T, TtsSyncError>;

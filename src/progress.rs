//! Модуль для отслеживания прогресса выполнения
//!
//! Оркестратор отправляет обновления в необязательный канал Tokio. Закрытый
//! или отсутствующий получатель на ход обработки не влияет.

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc::Sender;

/// Состояние оркестратора
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Подготовка рабочей директории
    Init,
    /// Обработка субтитра с указанным индексом
    PerCue(usize),
    /// Сведение клипов
    Merging,
    /// Нормализация громкости
    Normalizing,
    /// Успешное завершение
    Done,
    /// Запуск прерван фатальной ошибкой
    Failed,
}

impl PipelineStage {
    /// Завершён ли запуск
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::PerCue(i) => write!(f, "cue #{}", i + 1),
            Self::Merging => f.write_str("merging"),
            Self::Normalizing => f.write_str("normalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Обновление прогресса
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressUpdate {
    /// Началась обработка
    Started { total_cues: usize },
    /// Началась обработка субтитра
    CueStarted { cue_id: u32, index: usize, total: usize },
    /// Субтитр пропущен
    CueSkipped { cue_id: u32, reason: String },
    /// Клип субтитра готов
    CueReady {
        cue_id: u32,
        start_offset_ms: u64,
        duration_ms: f64,
        speed_factor: Option<f64>,
    },
    /// Сведение клипов
    Merging { clips: usize },
    /// Проход нормализации (1 - измерение, 2 - применение)
    Normalizing { pass: u8 },
    /// Обработка завершена
    Finished { output: PathBuf },
    /// Обработка прервана
    Failed { reason: String },
}

/// Асинхронно отправляет обновление прогресса
pub async fn send_progress(sender: &Option<Sender<ProgressUpdate>>, update: ProgressUpdate) {
    if let Some(sender) = sender {
        let _ = sender.send(update).await;
    }
}

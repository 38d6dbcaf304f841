//! Модуль для работы с TTS
//!
//! Синтезатор получает готовый текст одного субтитра и возвращает байты аудио.
//! Сохранение результата на диск - забота оркестратора.

pub mod vits;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::SynthesisError;

pub use vits::VitsSynthesizer;

/// Бэкенд синтеза речи
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Синтезировать речь для текста субтитра `cue_id`
    async fn synthesize(&self, text: &str, cue_id: u32) -> Result<Bytes, SynthesisError>;
}

//! Модуль для работы с аудио
//!
//! Все операции над аудио выполняются внешним движком (ffmpeg); здесь
//! описываются задания для него и логика, которая их связывает.

pub mod engine;
pub mod filter;
pub mod loudness;
pub mod mixer;
pub mod probe;
pub mod tempo;

pub use engine::{AudioFilter, EngineJob, FfmpegEngine, JobOutput, MediaEngine};
pub use loudness::{LoudnessNormalizer, LoudnessReport, LoudnessStats};
pub use mixer::SynthesizedClip;

//! Модуль для работы с субтитрами
//!
//! Разбор SRT-файлов и преобразование временных меток.

pub mod parser;
pub mod timecode;

pub use parser::{cues_from_entries, parse_srt, parse_srt_file, Cue, SubtitleEntry};
pub use timecode::{format_timecode, parse_timecode};

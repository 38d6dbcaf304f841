//! Модуль для парсинга субтитров
//!
//! Этот модуль содержит функции для парсинга SRT файлов.

use std::path::Path;

use log::warn;

use crate::error::{Result, TtsSyncError};
use crate::subtitle::timecode::parse_timecode;

/// Запись SRT-файла в том виде, в каком она записана в файле
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleEntry {
    /// Номер записи
    pub id: u32,
    /// Время начала, как в файле
    pub start_time: String,
    /// Время окончания, как в файле
    pub end_time: String,
    /// Текст записи
    pub text: String,
}

/// Субтитр с разобранными временными метками
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub id: u32,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

impl Cue {
    pub fn new(id: u32, start_ms: u64, end_ms: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            start_ms,
            end_ms,
            text: text.into(),
        }
    }

    /// Преобразовать запись файла в субтитр
    pub fn from_entry(entry: &SubtitleEntry) -> Result<Self> {
        Ok(Self {
            id: entry.id,
            start_ms: parse_timecode(&entry.start_time)?,
            end_ms: parse_timecode(&entry.end_time)?,
            text: entry.text.clone(),
        })
    }

    /// Длительность окна субтитра в секундах (отрицательная, если конец раньше начала)
    pub fn window_secs(&self) -> f64 {
        (self.end_ms as f64 - self.start_ms as f64) / 1000.0
    }
}

/// Преобразовать записи в субтитры; записи с битыми метками пропускаются
pub fn cues_from_entries(entries: &[SubtitleEntry]) -> Vec<Cue> {
    entries
        .iter()
        .filter_map(|entry| match Cue::from_entry(entry) {
            Ok(cue) => Some(cue),
            Err(e) => {
                warn!("[{}] skipped: {}", entry.id, e);
                None
            }
        })
        .collect()
}

/// Парсинг SRT файла
pub fn parse_srt_file<P: AsRef<Path>>(srt_file_path: P) -> Result<Vec<SubtitleEntry>> {
    let path = srt_file_path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        TtsSyncError::FileNotFound(format!("Failed to open SRT file {}: {}", path.display(), e))
    })?;
    parse_srt(&content)
}

/// Парсинг содержимого SRT
pub fn parse_srt(content: &str) -> Result<Vec<SubtitleEntry>> {
    let content = content.trim_start_matches('\u{feff}');
    if !content.contains("-->") && !content.trim().is_empty() {
        return Err(TtsSyncError::InvalidFormat(
            "Invalid SRT content: no timing lines found".to_string(),
        ));
    }

    let mut entries = Vec::new();
    let mut current_block: Vec<&str> = Vec::new();
    let mut position = 0u32;

    for line in content.lines().map(|l| l.trim_end_matches('\r')) {
        if line.trim().is_empty() {
            if !current_block.is_empty() {
                position += 1;
                if let Some(entry) = parse_block(&current_block, position) {
                    entries.push(entry);
                }
                current_block.clear();
            }
        } else {
            current_block.push(line);
        }
    }

    // Обрабатываем последний блок, если он есть
    if !current_block.is_empty() {
        position += 1;
        if let Some(entry) = parse_block(&current_block, position) {
            entries.push(entry);
        }
    }

    Ok(entries)
}

/// Парсинг блока субтитра
fn parse_block(lines: &[&str], position: u32) -> Option<SubtitleEntry> {
    let timing_index = match lines.iter().position(|line| line.contains("-->")) {
        Some(i) => i,
        None => {
            warn!("Skipping SRT block {} without a timing line", position);
            return None;
        }
    };

    let id = if timing_index > 0 {
        lines[0].trim().parse::<u32>().unwrap_or(position)
    } else {
        position
    };

    let (start, end) = lines[timing_index].split_once("-->")?;
    // Координаты позиционирования после метки конца не нужны
    let end = end.split_whitespace().next().unwrap_or("");

    let text = lines[timing_index + 1..]
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<&str>>()
        .join("\n");

    Some(SubtitleEntry {
        id,
        start_time: start.trim().to_string(),
        end_time: end.trim().to_string(),
        text,
    })
}

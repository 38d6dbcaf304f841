//! Преобразование временных меток субтитров
//!
//! Метки вида `HH:MM:SS,mmm` переводятся в миллисекунды от начала дорожки и обратно.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, TtsSyncError};

lazy_static! {
    static ref TIMECODE_RE: Regex =
        Regex::new(r"^(\d{1,3}):([0-5]\d):([0-5]\d)[,.](\d{1,3})$").unwrap();
}

/// Разбор строки времени в формате HH:MM:SS,mmm
///
/// Точка вместо запятой также допускается. Дробная часть короче трёх цифр
/// трактуется как доли секунды (`,5` = 500 мс).
pub fn parse_timecode(text: &str) -> Result<u64> {
    let trimmed = text.trim();
    let caps = TIMECODE_RE
        .captures(trimmed)
        .ok_or_else(|| TtsSyncError::MalformedTimecode(text.to_string()))?;

    let field = |i: usize| -> Result<u64> {
        caps[i]
            .parse::<u64>()
            .map_err(|_| TtsSyncError::MalformedTimecode(text.to_string()))
    };

    let hours = field(1)?;
    let minutes = field(2)?;
    let seconds = field(3)?;
    let fraction = &caps[4];
    let millis = field(4)? * 10_u64.pow(3 - fraction.len() as u32);

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000 + millis)
}

/// Форматирование миллисекунд в строку HH:MM:SS,mmm
pub fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms / 60_000) % 60;
    let seconds = (ms / 1000) % 60;
    let millis = ms % 1000;
    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, seconds, millis)
}

//! Очистка текста перед синтезом
//!
//! Удаляет каомодзи, текстовые смайлики и декоративные символы, которые
//! синтезатор иначе попытается произнести.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// Серии из двух и более декоративных символов или скобочных групп
    static ref KAOMOJI_RE: Regex = Regex::new(
        r"(?:[\x{2500}-\x{257F}\x{2580}-\x{259F}\x{25A0}-\x{25FF}\x{2600}-\x{26FF}\x{2700}-\x{27BF}\x{3000}-\x{303F}\x{FF00}-\x{FFEF}\x{E000}-\x{F8FF}]|\([^)]*\)|（[^）]*）){2,}"
    )
    .unwrap();

    static ref EMOTICON_RE: Regex =
        Regex::new(r"(?i)\s*(?:qwq|qaq|owo|ovo|t_t|;-;|:\)|:\(|:p|:d|=v=)\s*").unwrap();

    /// Скобки, внутри которых нет ни букв, ни цифр, ни иероглифов, ни каны
    static ref SYMBOL_PARENS_RE: Regex = Regex::new(
        r"[（(][^a-zA-Z0-9\x{4e00}-\x{9fa5}\x{3040}-\x{309f}\x{30a0}-\x{30ff}]+?[)）]"
    )
    .unwrap();

    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();
}

/// Очистка текста субтитра от нечитаемых символов
pub fn cleanup_text(text: &str) -> String {
    let text = KAOMOJI_RE.replace_all(text, "");
    let text = EMOTICON_RE.replace_all(&text, " ");
    let text = SYMBOL_PARENS_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

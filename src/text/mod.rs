//! Подготовка текста субтитров для синтеза речи

pub mod dictionary;
pub mod normalizer;

pub use dictionary::{Dictionary, DictionaryEntry};
pub use normalizer::cleanup_text;

/// Очистка текста и применение словаря замен
#[derive(Debug, Clone, Default)]
pub struct TextNormalizer {
    dictionary: Dictionary,
}

impl TextNormalizer {
    pub fn new(dictionary: Dictionary) -> Self {
        Self { dictionary }
    }

    /// Подготовить текст к синтезу. Пустая строка означает, что произносить нечего.
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = cleanup_text(text);
        self.dictionary.apply(&cleaned).trim().to_string()
    }
}

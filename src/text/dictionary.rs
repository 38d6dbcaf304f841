//! Словарь замен для текста, отправляемого в синтезатор
//!
//! Ключ словаря - регулярное выражение, значение - строка замены и флаг
//! чувствительности к регистру. Более длинные шаблоны применяются первыми,
//! шаблоны равной длины - в порядке записи в файле.
//!
//! Строка замены понимает `$1`..`$99`, `$<name>`, `$&`, `` $` ``, `$'` и `$$`.
//! Ссылка на группу, которой нет в шаблоне, остаётся в тексте как есть.

use std::path::Path;

use log::{error, info, warn};
use regex::{Captures, Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TtsSyncError};

/// Запись словаря в JSON-файле
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DictionaryEntry {
    /// Строка замены (поддерживает `$1`, `$<name>`, `$&`)
    pub value: String,
    /// Учитывать регистр при поиске
    #[serde(default, rename = "caseSensitive")]
    pub case_sensitive: bool,
}

/// Часть разобранной строки замены
#[derive(Debug, Clone, PartialEq, Eq)]
enum Piece {
    Literal(String),
    Group(usize),
    Named(String),
    /// `$&`
    Whole,
    /// `` $` ``
    Before,
    /// `$'`
    After,
}

/// Разобрать строку замены с учётом групп, которые есть в шаблоне
fn parse_replacement(value: &str, regex: &Regex) -> Vec<Piece> {
    let groups = regex.captures_len();
    let names: Vec<&str> = regex.capture_names().flatten().collect();
    let chars: Vec<char> = value.chars().collect();

    let mut pieces = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 == chars.len() {
            literal.push(chars[i]);
            i += 1;
            continue;
        }

        let token = match chars[i + 1] {
            '$' => Some((Piece::Literal("$".to_string()), 2)),
            '&' => Some((Piece::Whole, 2)),
            '`' => Some((Piece::Before, 2)),
            '\'' => Some((Piece::After, 2)),
            '0'..='9' => group_reference(&chars[i + 1..], groups),
            '<' if !names.is_empty() => chars[i + 2..]
                .iter()
                .position(|&c| c == '>')
                .map(|len| {
                    let name: String = chars[i + 2..i + 2 + len].iter().collect();
                    // Несуществующее имя при наличии именованных групп даёт пустую строку
                    let piece = if names.contains(&name.as_str()) {
                        Piece::Named(name)
                    } else {
                        Piece::Literal(String::new())
                    };
                    (piece, len + 3)
                }),
            _ => None,
        };

        match token {
            Some((Piece::Literal(text), len)) => {
                literal.push_str(&text);
                i += len;
            }
            Some((piece, len)) => {
                if !literal.is_empty() {
                    pieces.push(Piece::Literal(std::mem::take(&mut literal)));
                }
                pieces.push(piece);
                i += len;
            }
            None => {
                literal.push('$');
                i += 1;
            }
        }
    }
    if !literal.is_empty() {
        pieces.push(Piece::Literal(literal));
    }
    pieces
}

/// `$n` или `$nn`: двузначный номер, если такая группа есть, иначе однозначный
fn group_reference(digits: &[char], groups: usize) -> Option<(Piece, usize)> {
    let first = digits.first()?.to_digit(10)? as usize;
    if let Some(second) = digits.get(1).and_then(|c| c.to_digit(10)) {
        let two = first * 10 + second as usize;
        if (1..groups).contains(&two) {
            return Some((Piece::Group(two), 3));
        }
    }
    if (1..groups).contains(&first) {
        return Some((Piece::Group(first), 2));
    }
    None
}

fn render(pieces: &[Piece], caps: &Captures, haystack: &str) -> String {
    let mut out = String::new();
    for piece in pieces {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Group(i) => {
                if let Some(m) = caps.get(*i) {
                    out.push_str(m.as_str());
                }
            }
            Piece::Named(name) => {
                if let Some(m) = caps.name(name) {
                    out.push_str(m.as_str());
                }
            }
            Piece::Whole => out.push_str(&caps[0]),
            Piece::Before => {
                if let Some(m) = caps.get(0) {
                    out.push_str(&haystack[..m.start()]);
                }
            }
            Piece::After => {
                if let Some(m) = caps.get(0) {
                    out.push_str(&haystack[m.end()..]);
                }
            }
        }
    }
    out
}

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    regex: Regex,
    replacement: Vec<Piece>,
}

/// Скомпилированный словарь замен
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    rules: Vec<Rule>,
}

impl Dictionary {
    /// Собрать словарь из записей; некорректные шаблоны пропускаются с предупреждением
    pub fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, DictionaryEntry)>,
    {
        let mut ordered: Vec<(String, DictionaryEntry)> = entries.into_iter().collect();
        // sort_by стабильна: при равной длине сохраняется исходный порядок
        ordered.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

        let mut rules = Vec::with_capacity(ordered.len());
        for (pattern, entry) in ordered {
            match RegexBuilder::new(&pattern)
                .case_insensitive(!entry.case_sensitive)
                .build()
            {
                Ok(regex) => rules.push(Rule {
                    replacement: parse_replacement(&entry.value, &regex),
                    pattern,
                    regex,
                }),
                Err(e) => {
                    warn!("Invalid dictionary pattern {:?}, skipped: {}", pattern, e);
                }
            }
        }

        Self { rules }
    }

    /// Разобрать словарь из JSON-строки
    pub fn from_json(json: &str) -> Result<Self> {
        // Map сохраняет порядок ключей из файла (feature preserve_order)
        let raw: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)?;
        let entries = raw
            .into_iter()
            .map(|(pattern, value)| Ok((pattern, serde_json::from_value(value)?)))
            .collect::<Result<Vec<(String, DictionaryEntry)>>>()?;
        Ok(Self::from_entries(entries))
    }

    /// Загрузить словарь из файла
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TtsSyncError::FileNotFound(format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Загрузить словарь, а при любой ошибке продолжить без замен
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            warn!(
                "Dictionary file not found at {}, substitutions disabled",
                path.display()
            );
            return Self::default();
        }
        match Self::load(path) {
            Ok(dictionary) => {
                info!(
                    "Loaded dictionary {} ({} rules)",
                    path.display(),
                    dictionary.len()
                );
                dictionary
            }
            Err(e) => {
                error!("Failed to load dictionary {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Шаблоны в порядке применения
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.pattern.as_str())
    }

    /// Применить все замены к тексту
    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for rule in &self.rules {
            result = rule
                .regex
                .replace_all(&result, |caps: &Captures| {
                    render(&rule.replacement, caps, &result)
                })
                .into_owned();
        }
        result
    }
}

//! Модуль для работы с рабочей директорией
//!
//! Рабочая директория хранит клипы отдельных субтитров и промежуточную
//! сведённую дорожку. В начале каждого запуска она очищается и создаётся
//! заново; после запуска клипы остаются для проверки.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Result;

/// Рабочая директория одного запуска
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
    extension: String,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Удалить содержимое предыдущего запуска и создать директорию заново
    pub async fn prepare(&self) -> Result<()> {
        if tokio::fs::metadata(&self.root).await.is_ok() {
            debug!("Clearing scratch directory {}", self.root.display());
            tokio::fs::remove_dir_all(&self.root).await?;
        }
        tokio::fs::create_dir_all(&self.root).await?;
        info!("Scratch directory ready: {}", self.root.display());
        Ok(())
    }

    /// Клип, полученный от синтезатора.
    ///
    /// Номер субтитра в SRT не обязан быть уникальным, поэтому имя
    /// начинается с позиции субтитра в файле.
    pub fn clip_path(&self, index: usize, cue_id: u32) -> PathBuf {
        self.root
            .join(format!("temp_{}_{}.{}", index, cue_id, self.extension))
    }

    /// Клип после изменения темпа
    pub fn processed_path(&self, index: usize, cue_id: u32) -> PathBuf {
        self.root
            .join(format!("processed_{}_{}.{}", index, cue_id, self.extension))
    }

    /// Промежуточная сведённая дорожка
    pub fn merged_path(&self) -> PathBuf {
        self.root.join(format!(
            "temp_merged_{}.{}",
            chrono::Utc::now().timestamp_millis(),
            self.extension
        ))
    }
}

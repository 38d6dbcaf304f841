//! Модуль для интеграции с VITS API
//!
//! Сервис принимает GET-запрос с параметрами `id`, `format`, `lang`, `text`
//! и возвращает аудио в теле ответа.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use log::{debug, error, info};
use reqwest::Client;

use crate::config::SyncConfig;
use crate::error::SynthesisError;
use crate::tts::SpeechSynthesizer;

/// Клиент сервиса синтеза VITS
#[derive(Debug, Clone)]
pub struct VitsSynthesizer {
    client: Client,
    base_url: String,
    speaker_id: u32,
    format: String,
    language: String,
    timeout: Duration,
}

impl VitsSynthesizer {
    pub fn new(
        base_url: impl Into<String>,
        speaker_id: u32,
        format: impl Into<String>,
        language: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            speaker_id,
            format: format.into(),
            language: language.into(),
            timeout,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.vits_base_url.clone(),
            config.speaker_id,
            config.audio_format.clone(),
            config.language.clone(),
            config.synthesis_timeout(),
        )
    }

    /// Параметры запроса в порядке, который ожидает сервис
    pub fn query_params(&self, text: &str) -> Vec<(&'static str, String)> {
        vec![
            ("id", self.speaker_id.to_string()),
            ("format", self.format.clone()),
            ("lang", self.language.clone()),
            ("text", text.to_string()),
        ]
    }

    async fn request(&self, text: &str, cue_id: u32) -> Result<Bytes, SynthesisError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query_params(text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("Failed to read error response: {}", e),
            };
            return Err(SynthesisError::Service {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(SynthesisError::EmptyResponse);
        }
        debug!("[{}] received {} bytes of audio", cue_id, bytes.len());
        Ok(bytes)
    }
}

#[async_trait]
impl SpeechSynthesizer for VitsSynthesizer {
    async fn synthesize(&self, text: &str, cue_id: u32) -> Result<Bytes, SynthesisError> {
        info!("[{}] synthesizing speech: {}", cue_id, text);
        match tokio::time::timeout(self.timeout, self.request(text, cue_id)).await {
            Ok(Ok(bytes)) => Ok(bytes),
            Ok(Err(e)) => {
                error!("[{}] synthesis request failed: {}", cue_id, e);
                Err(e)
            }
            Err(_) => {
                error!("[{}] synthesis request timed out after {:?}", cue_id, self.timeout);
                Err(SynthesisError::Timeout(self.timeout))
            }
        }
    }
}

use common::{
    env_config::TranslationConfig,
    error::{AppError, Res},
};
use log::debug;
use reqwest::Client;
use serde::{Serialize, de::DeserializeOwned};
use url::Url;

use crate::dtos::translate::{DetectRequest, DetectResponse, LocalizeRequest, LocalizeResponse};

/// Longest text forwarded to the provider, in characters.
pub const MAX_TEXT_CHARS: usize = 5000;

/// Forwards detection and localization requests to the translation provider.
#[derive(Clone)]
pub struct TranslationClient {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl TranslationClient {
    pub fn new(config: &TranslationConfig) -> Res<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AppError::Internal(format!(
                "Invalid translation base URL {}: {}",
                config.base_url, e
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Internal(format!(
                "Translation base URL {} cannot take a path",
                config.base_url
            )));
        }
        Ok(TranslationClient {
            client: Client::builder().timeout(config.timeout).build()?,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    pub async fn detect_locale(&self, text: &str) -> Res<String> {
        let text = validate_text(text)?;
        let response: DetectResponse = self
            .post("detect", &DetectRequest {
                text: text.to_string(),
            })
            .await?;
        Ok(response.locale)
    }

    pub async fn localize(&self, text: &str, source_locale: &str, target_locale: &str) -> Res<String> {
        let text = validate_text(text)?;
        if source_locale.trim().is_empty() || target_locale.trim().is_empty() {
            return Err(AppError::BadRequest(
                "Source and target locale are required".to_string(),
            ));
        }
        if source_locale.eq_ignore_ascii_case(target_locale) {
            return Ok(text.to_string());
        }

        let response: LocalizeResponse = self
            .post("localize", &LocalizeRequest {
                text: text.to_string(),
                source_locale: source_locale.to_string(),
                target_locale: target_locale.to_string(),
            })
            .await?;
        Ok(response.localized_text)
    }

    async fn post<B: Serialize, R: DeserializeOwned>(&self, segment: &str, body: &B) -> Res<R> {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(segment);
        }
        debug!("Forwarding translation request to {}", url);

        let mut request = self.client.post(url).json(body);
        if let Some(key) = self.api_key.as_deref() {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Translation provider returned {}: {}",
                status, message
            )));
        }
        response
            .json::<R>()
            .await
            .map_err(|e| AppError::Upstream(format!("Unreadable translation response: {}", e)))
    }
}

fn validate_text(text: &str) -> Res<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Text is required".to_string()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::BadRequest(format!(
            "Text exceeds {} characters",
            MAX_TEXT_CHARS
        )));
    }
    Ok(text)
}

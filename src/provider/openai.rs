//! Chat-completions provider (OpenAI API and compatible servers).
//!
//! The model is asked for a JSON object with a single `doc_string` key and
//! the element's source as the user message.

use super::{Annotation, AnnotationError, AnnotationProvider};
use crate::config::ProviderSettings;
use crate::extract::ElementKind;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;

pub struct OpenAiProvider {
    client: Client,
    settings: ProviderSettings,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(
        settings: ProviderSettings,
        api_key: impl Into<String>,
    ) -> Result<Self, AnnotationError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AnnotationError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            settings,
            api_key: api_key.into(),
        })
    }

    /// Build a provider reading the API key from `settings.api_key_env`.
    pub fn from_env(settings: ProviderSettings) -> Result<Self, AnnotationError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AnnotationError::MissingApiKey(settings.api_key_env.clone()))?;
        Self::new(settings, api_key)
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url.trim_end_matches('/'))
    }
}

impl AnnotationProvider for OpenAiProvider {
    fn annotate(
        &self,
        kind: ElementKind,
        source_text: &str,
    ) -> Result<Annotation, AnnotationError> {
        let body = request_body(&self.settings, kind, source_text);

        let mut request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body);
        if let Some(org) = &self.settings.organization {
            request = request.header("OpenAI-Organization", org);
        }

        tracing::debug!(%kind, model = %self.settings.model, "requesting docstring");
        let response = request.send().map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AnnotationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().map_err(transport_error)?;
        parse_completion(&payload)
    }
}

fn transport_error(err: reqwest::Error) -> AnnotationError {
    if err.is_timeout() {
        AnnotationError::Timeout
    } else if err.is_decode() {
        AnnotationError::Malformed(err.to_string())
    } else {
        AnnotationError::Transport(err.to_string())
    }
}

/// Request payload for one element.
pub fn request_body(settings: &ProviderSettings, kind: ElementKind, source_text: &str) -> Value {
    let mut messages = system_messages(kind);
    messages.push(json!({ "role": "user", "content": source_text }));

    json!({
        "model": settings.model,
        "max_tokens": settings.max_tokens,
        "temperature": settings.temperature,
        "top_p": settings.top_p,
        "frequency_penalty": settings.frequency_penalty,
        "presence_penalty": settings.presence_penalty,
        "response_format": { "type": "json_object" },
        "messages": messages,
    })
}

/// System prompt for an element kind.
pub fn system_messages(kind: ElementKind) -> Vec<Value> {
    let subject = match kind {
        ElementKind::Module => "the Python module (the whole file)",
        ElementKind::Class => "the Python class",
        ElementKind::Function => "the Python function",
        ElementKind::Method => "the Python method",
    };

    vec![
        json!({
            "role": "system",
            "content": "You are a helpful assistant designed to output JSON.",
        }),
        json!({
            "role": "system",
            "content": format!(
                "The JSON contains a key 'doc_string' and the associated value is a \
                 docstring compliant documentation of {subject} that the user sends \
                 you as message. Return only the docstring text, without quotes and \
                 without indentation."
            ),
        }),
    ]
}

/// Extract the annotation from a chat-completions response body.
pub fn parse_completion(payload: &Value) -> Result<Annotation, AnnotationError> {
    let content = payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            AnnotationError::Malformed("response has no choices[0].message.content".to_string())
        })?;

    if payload.pointer("/choices/0/finish_reason").and_then(Value::as_str) == Some("length") {
        return Err(AnnotationError::Malformed(
            "completion was cut off at max_tokens".to_string(),
        ));
    }

    Annotation::from_json_str(content)
}

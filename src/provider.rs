//! Provider-specific request building and response extraction.
//!
//! Everything that differs between provider families is looked up from a
//! single [`ProviderSpec`] table, so adding a provider means adding one
//! `match` arm in [`Provider::spec`].

use serde_json::{json, Value};

use crate::config::{ModelDescriptor, Provider};
use crate::error::{AnalysisError, Result};
use crate::types::{NormalizedImage, PromptPair};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Payload layout understood by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireFormat {
    /// Anthropic Messages API.
    AnthropicMessages,
    /// OpenAI-style chat completions.
    ChatCompletions,
}

/// How the API key travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `x-api-key` plus a pinned `anthropic-version`.
    AnthropicKey { version: &'static str },
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// The raw key in a named header.
    RawKey(&'static str),
}

/// Per-provider conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderSpec {
    pub wire: WireFormat,
    pub auth: AuthScheme,
    /// JSON pointer to the response text.
    pub text_pointer: &'static str,
    /// JSON pointers tried in order for an error message.
    pub error_pointers: &'static [&'static str],
    /// Message used when the error body carries nothing better.
    pub generic_error: &'static str,
}

impl Provider {
    pub fn spec(self) -> ProviderSpec {
        match self {
            Provider::Anthropic => ProviderSpec {
                wire: WireFormat::AnthropicMessages,
                auth: AuthScheme::AnthropicKey {
                    version: ANTHROPIC_VERSION,
                },
                text_pointer: "/content/0/text",
                error_pointers: &["/error/message"],
                generic_error: "Claude API error",
            },
            Provider::OpenAi => ProviderSpec {
                wire: WireFormat::ChatCompletions,
                auth: AuthScheme::Bearer,
                text_pointer: "/choices/0/message/content",
                error_pointers: &["/error/message"],
                generic_error: "OpenAI API error",
            },
            Provider::Lanit => ProviderSpec {
                wire: WireFormat::ChatCompletions,
                auth: AuthScheme::RawKey("X-API-KEY"),
                text_pointer: "/choices/0/message/content",
                error_pointers: &["/error/message", "/detail"],
                generic_error: "LANIT API error",
            },
        }
    }
}

/// A fully built provider request, ready for a [`crate::Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct WireRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl WireRequest {
    /// First header value with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Build the provider request for one round-trip.
///
/// Images appear in the given order. Labelled images get a
/// `📷 Фото N: <label>` caption, where `N` is the 1-based position.
pub fn build_request(
    images: &[NormalizedImage],
    prompts: &PromptPair,
    model: &ModelDescriptor,
    api_key: &str,
) -> WireRequest {
    let spec = model.provider.spec();

    let body = match spec.wire {
        WireFormat::AnthropicMessages => anthropic_body(images, prompts, model),
        WireFormat::ChatCompletions => chat_completions_body(images, prompts, model),
    };

    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    match spec.auth {
        AuthScheme::AnthropicKey { version } => {
            headers.push(("x-api-key".to_string(), api_key.to_string()));
            headers.push(("anthropic-version".to_string(), version.to_string()));
        }
        AuthScheme::Bearer => {
            headers.push(("Authorization".to_string(), format!("Bearer {}", api_key)));
        }
        AuthScheme::RawKey(name) => {
            headers.push((name.to_string(), api_key.to_string()));
        }
    }

    WireRequest {
        url: model.endpoint.clone(),
        headers,
        body,
    }
}

fn caption(index: usize, label: &str) -> String {
    format!("📷 Фото {}: {}", index + 1, label)
}

fn anthropic_body(
    images: &[NormalizedImage],
    prompts: &PromptPair,
    model: &ModelDescriptor,
) -> Value {
    let mut content = Vec::with_capacity(images.len() * 2 + 1);
    for (i, image) in images.iter().enumerate() {
        if let Some(label) = &image.label {
            content.push(json!({"type": "text", "text": caption(i, label)}));
        }
        content.push(json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": image.media_type,
                "data": image.base64,
            }
        }));
    }
    content.push(json!({"type": "text", "text": prompts.user}));

    json!({
        "model": model.id,
        "max_tokens": model.max_tokens,
        "system": prompts.system,
        "messages": [{"role": "user", "content": content}],
    })
}

fn chat_completions_body(
    images: &[NormalizedImage],
    prompts: &PromptPair,
    model: &ModelDescriptor,
) -> Value {
    let captions: Vec<String> = images
        .iter()
        .enumerate()
        .filter_map(|(i, image)| image.label.as_deref().map(|label| caption(i, label)))
        .collect();

    let text = if captions.is_empty() {
        prompts.user.clone()
    } else {
        format!("{}\n\n{}", captions.join("\n"), prompts.user)
    };

    let mut content = vec![json!({"type": "text", "text": text})];
    for image in images {
        content.push(json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", image.media_type, image.base64),
            }
        }));
    }

    json!({
        "model": model.id,
        "messages": [
            {"role": "system", "content": prompts.system},
            {"role": "user", "content": content},
        ],
        "max_tokens": model.max_tokens,
    })
}

/// Pull the generated text out of a successful response body.
pub fn extract_text(provider: Provider, body: &Value) -> Result<String> {
    let pointer = provider.spec().text_pointer;
    body.pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            AnalysisError::InvalidResponse(format!(
                "{} response has no text at {}",
                provider, pointer
            ))
        })
}

/// Human-readable message for a failed response body.
pub fn error_message(provider: Provider, body: &str) -> String {
    let spec = provider.spec();
    match serde_json::from_str::<Value>(body) {
        Ok(json) => spec
            .error_pointers
            .iter()
            .find_map(|pointer| {
                json.pointer(pointer)
                    .and_then(Value::as_str)
                    .filter(|message| !message.is_empty())
            })
            .unwrap_or(spec.generic_error)
            .to_string(),
        Err(_) if !body.trim().is_empty() => body.to_string(),
        Err(_) => spec.generic_error.to_string(),
    }
}

/// Turn a raw status and body into the response text or a provider error.
pub fn interpret_response(provider: Provider, status: u16, body: &str) -> Result<String> {
    if !(200..300).contains(&status) {
        return Err(AnalysisError::ProviderHttp {
            status,
            message: error_message(provider, body),
        });
    }
    let json: Value = serde_json::from_str(body).map_err(|e| {
        AnalysisError::InvalidResponse(format!("{} returned non-JSON body: {}", provider, e))
    })?;
    extract_text(provider, &json)
}

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{AnalysisError, Result};

pub const ANTHROPIC_HOST: &str = "https://api.anthropic.com";
pub const OPENAI_HOST: &str = "https://api.openai.com";

/// Model key used when the caller does not pick one.
pub const DEFAULT_MODEL_KEY: &str = "claude";

/// Provider family of a model backend.
///
/// The variant fully determines wire format, auth headers and response
/// extraction; see [`crate::provider::ProviderSpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    Anthropic,
    OpenAi,
    /// OpenAI-compatible enterprise gateway (LANIT vLLM).
    Lanit,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Lanit => "lanit",
        }
    }

    /// Upstream API path for this provider's vision endpoint.
    pub fn api_path(self) -> &'static str {
        match self {
            Provider::Anthropic => "/v1/messages",
            Provider::OpenAi | Provider::Lanit => "/v1/chat/completions",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            "lanit" => Ok(Provider::Lanit),
            other => Err(AnalysisError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Static description of a target model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    /// Display name.
    pub name: String,
    /// Provider's model name.
    pub id: String,
    pub provider: Provider,
    pub endpoint: String,
    pub max_tokens: u32,
    /// Slot in the credential store holding this model's API key.
    pub api_key_storage_key: String,
}

/// Where provider requests are sent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Routing {
    /// Straight to the provider hosts.
    #[default]
    Direct,
    /// Through a CORS relay; requests go to `{base_url}/{provider}{path}`.
    Relay { base_url: String },
}

impl Routing {
    pub fn relay(base_url: impl Into<String>) -> Self {
        Routing::Relay {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Endpoint URL for a provider under this routing.
    ///
    /// The gateway has neither a public host nor a relay prefix, so its
    /// models must carry explicit endpoints.
    pub fn endpoint(&self, provider: Provider) -> Option<String> {
        let base = match (self, provider) {
            (_, Provider::Lanit) => return None,
            (Routing::Direct, Provider::Anthropic) => ANTHROPIC_HOST.to_string(),
            (Routing::Direct, Provider::OpenAi) => OPENAI_HOST.to_string(),
            (Routing::Relay { base_url }, p) => format!("{}/{}", base_url, p.as_str()),
        };
        Some(format!("{}{}", base, provider.api_path()))
    }
}

#[derive(Debug, Deserialize)]
struct RawModel {
    name: String,
    id: String,
    provider: String,
    endpoint: Option<String>,
    max_tokens: u32,
    api_key_storage_key: String,
}

/// Read-only table of models keyed by model key.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    routing: Routing,
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelCatalog {
    /// Empty catalog under the given routing.
    pub fn new(routing: Routing) -> Self {
        Self {
            routing,
            models: BTreeMap::new(),
        }
    }

    /// The built-in Claude and GPT vision models.
    pub fn builtin(routing: Routing) -> Self {
        let entries = [
            (
                "claude",
                "Claude 3.5 Sonnet",
                "claude-3-5-sonnet-20241022",
                Provider::Anthropic,
                4096,
                "slingcheck_claude_api_key",
            ),
            (
                "claude4",
                "Claude Sonnet 4.5",
                "claude-sonnet-4-5-20250929",
                Provider::Anthropic,
                8192,
                "slingcheck_claude_api_key",
            ),
            (
                "gpt4",
                "GPT-4 Turbo",
                "gpt-4-turbo",
                Provider::OpenAi,
                4096,
                "slingcheck_openai_api_key",
            ),
            (
                "gpt4o",
                "GPT-4o",
                "gpt-4o",
                Provider::OpenAi,
                4096,
                "slingcheck_openai_api_key",
            ),
        ];

        let mut catalog = Self::new(routing);
        for (key, name, id, provider, max_tokens, storage_key) in entries {
            let Some(endpoint) = catalog.routing.endpoint(provider) else {
                continue;
            };
            catalog.models.insert(
                key.to_string(),
                ModelDescriptor {
                    name: name.to_string(),
                    id: id.to_string(),
                    provider,
                    endpoint,
                    max_tokens,
                    api_key_storage_key: storage_key.to_string(),
                },
            );
        }
        catalog
    }

    /// Register or replace a model.
    pub fn with_model(mut self, key: impl Into<String>, model: ModelDescriptor) -> Result<Self> {
        validate_model(&model)?;
        self.models.insert(key.into(), model);
        Ok(self)
    }

    /// Merge models from a JSON object of `key -> model`.
    ///
    /// Provider strings are checked here, so an unsupported provider never
    /// reaches request building. Models without an `endpoint` get the routing
    /// default for their provider.
    pub fn extend_from_json(mut self, json: &str) -> Result<Self> {
        let raw: BTreeMap<String, RawModel> = serde_json::from_str(json)?;
        for (key, entry) in raw {
            let provider: Provider = entry.provider.parse()?;
            let endpoint = entry
                .endpoint
                .or_else(|| self.routing.endpoint(provider))
                .ok_or_else(|| {
                    AnalysisError::InvalidConfig(format!("model '{}' needs an endpoint", key))
                })?;
            self = self.with_model(
                key,
                ModelDescriptor {
                    name: entry.name,
                    id: entry.id,
                    provider,
                    endpoint,
                    max_tokens: entry.max_tokens,
                    api_key_storage_key: entry.api_key_storage_key,
                },
            )?;
        }
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Result<&ModelDescriptor> {
        self.models
            .get(key)
            .ok_or_else(|| AnalysisError::UnknownModel(key.to_string()))
    }

    /// Model keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn routing(&self) -> &Routing {
        &self.routing
    }
}

impl Default for ModelCatalog {
    fn default() -> Self {
        Self::builtin(Routing::Direct)
    }
}

fn validate_model(model: &ModelDescriptor) -> Result<()> {
    if model.max_tokens == 0 {
        return Err(AnalysisError::InvalidConfig(format!(
            "model '{}' must have positive max_tokens",
            model.id
        )));
    }
    if model.endpoint.trim().is_empty() {
        return Err(AnalysisError::InvalidConfig(format!(
            "model '{}' has no endpoint",
            model.id
        )));
    }
    Ok(())
}

/// Upload and normalization limits for images.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageLimits {
    /// Largest allowed width or height after normalization (default: 1920).
    pub max_dimension: u32,
    /// Compression factor in (0, 1] (default: 0.8). Applies to JPEG output.
    pub quality: f32,
    /// Largest accepted input file (default: 5 MiB).
    pub max_file_bytes: usize,
    /// Accepted MIME types.
    pub accepted_formats: Vec<String>,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            max_dimension: 1920,
            quality: 0.8,
            max_file_bytes: 5 * 1024 * 1024,
            accepted_formats: vec![
                "image/jpeg".to_string(),
                "image/png".to_string(),
                "image/webp".to_string(),
            ],
        }
    }
}

impl ImageLimits {
    pub fn with_max_dimension(mut self, max_dimension: u32) -> Self {
        self.max_dimension = max_dimension;
        self
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: usize) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    pub fn accepts(&self, media_type: &str) -> bool {
        self.accepted_formats.iter().any(|f| f == media_type)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_dimension == 0 {
            return Err(AnalysisError::InvalidConfig(
                "max_dimension must be positive".to_string(),
            ));
        }
        if !(self.quality > 0.0 && self.quality <= 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "quality must be in (0, 1], got {}",
                self.quality
            )));
        }
        Ok(())
    }
}

/// Configuration for the [`crate::Analyzer`].
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub catalog: ModelCatalog,
    pub image_limits: ImageLimits,
    /// Mode used when a requested mode is unknown (default: `verified`).
    pub default_mode: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            catalog: ModelCatalog::default(),
            image_limits: ImageLimits::default(),
            default_mode: crate::prompt::DEFAULT_MODE.to_string(),
        }
    }
}

impl AnalyzerConfig {
    pub fn with_catalog(mut self, catalog: ModelCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_image_limits(mut self, limits: ImageLimits) -> Self {
        self.image_limits = limits;
        self
    }

    pub fn with_default_mode(mut self, mode: impl Into<String>) -> Self {
        self.default_mode = mode.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parse_fails_closed() {
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
        assert_eq!("lanit".parse::<Provider>().unwrap(), Provider::Lanit);
        match "gemini".parse::<Provider>() {
            Err(AnalysisError::UnsupportedProvider(p)) => assert_eq!(p, "gemini"),
            other => panic!("Expected UnsupportedProvider, got {:?}", other),
        }
    }

    #[test]
    fn direct_routing_endpoints() {
        let routing = Routing::Direct;
        assert_eq!(
            routing.endpoint(Provider::Anthropic).as_deref(),
            Some("https://api.anthropic.com/v1/messages")
        );
        assert_eq!(
            routing.endpoint(Provider::OpenAi).as_deref(),
            Some("https://api.openai.com/v1/chat/completions")
        );
        assert_eq!(routing.endpoint(Provider::Lanit), None);
    }

    #[test]
    fn relay_routing_prefixes_provider() {
        let routing = Routing::relay("http://localhost:8002/");
        assert_eq!(
            routing.endpoint(Provider::Anthropic).as_deref(),
            Some("http://localhost:8002/anthropic/v1/messages")
        );
        assert_eq!(
            routing.endpoint(Provider::OpenAi).as_deref(),
            Some("http://localhost:8002/openai/v1/chat/completions")
        );
        assert_eq!(routing.endpoint(Provider::Lanit), None);
    }

    #[test]
    fn builtin_catalog_models() {
        let catalog = ModelCatalog::default();
        let keys: Vec<_> = catalog.keys().collect();
        assert_eq!(keys, vec!["claude", "claude4", "gpt4", "gpt4o"]);

        let claude4 = catalog.get("claude4").unwrap();
        assert_eq!(claude4.provider, Provider::Anthropic);
        assert_eq!(claude4.max_tokens, 8192);
        assert_eq!(claude4.api_key_storage_key, "slingcheck_claude_api_key");

        assert!(catalog.get(DEFAULT_MODEL_KEY).is_ok());
        assert!(matches!(
            catalog.get("llava"),
            Err(AnalysisError::UnknownModel(_))
        ));
    }

    #[test]
    fn catalog_from_json_adds_gateway_model() {
        let json = r#"{
            "qwen": {
                "name": "Qwen2-VL",
                "id": "Qwen/Qwen2-VL-72B-Instruct",
                "provider": "lanit",
                "endpoint": "https://llm.example.internal/v1/chat/completions",
                "max_tokens": 2048,
                "api_key_storage_key": "slingcheck_lanit_api_key"
            }
        }"#;
        let catalog = ModelCatalog::default().extend_from_json(json).unwrap();
        let qwen = catalog.get("qwen").unwrap();
        assert_eq!(qwen.provider, Provider::Lanit);
        assert_eq!(qwen.endpoint, "https://llm.example.internal/v1/chat/completions");
    }

    #[test]
    fn catalog_from_json_rejects_unknown_provider() {
        let json = r#"{
            "gem": {
                "name": "Gemini",
                "id": "gemini-pro-vision",
                "provider": "google",
                "max_tokens": 2048,
                "api_key_storage_key": "k"
            }
        }"#;
        let result = ModelCatalog::default().extend_from_json(json);
        assert!(matches!(result, Err(AnalysisError::UnsupportedProvider(_))));
    }

    #[test]
    fn gateway_model_without_endpoint_is_rejected() {
        let json = r#"{
            "qwen": {
                "name": "Qwen2-VL",
                "id": "qwen2-vl",
                "provider": "lanit",
                "max_tokens": 2048,
                "api_key_storage_key": "slingcheck_lanit_api_key"
            }
        }"#;
        let result = ModelCatalog::default().extend_from_json(json);
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn catalog_rejects_zero_max_tokens() {
        let json = r#"{
            "x": {
                "name": "X",
                "id": "x",
                "provider": "openai",
                "max_tokens": 0,
                "api_key_storage_key": "k"
            }
        }"#;
        let result = ModelCatalog::default().extend_from_json(json);
        assert!(matches!(result, Err(AnalysisError::InvalidConfig(_))));
    }

    #[test]
    fn image_limits_defaults_and_validation() {
        let limits = ImageLimits::default();
        assert_eq!(limits.max_dimension, 1920);
        assert_eq!(limits.quality, 0.8);
        assert_eq!(limits.max_file_bytes, 5 * 1024 * 1024);
        assert!(limits.accepts("image/webp"));
        assert!(!limits.accepts("image/gif"));
        assert!(limits.validate().is_ok());

        assert!(ImageLimits::default().with_quality(0.0).validate().is_err());
        assert!(ImageLimits::default().with_quality(1.5).validate().is_err());
        assert!(ImageLimits::default().with_max_dimension(0).validate().is_err());
        assert!(ImageLimits::default().with_quality(1.0).validate().is_ok());
    }
}

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{AnalyzerConfig, ModelDescriptor};
use crate::credentials::{CredentialStore, MemoryCredentialStore};
use crate::error::{AnalysisError, Result};
use crate::manual;
use crate::normalizer::normalize;
use crate::parser::parse_step1;
use crate::prompt::{
    with_child_info, with_photo_listing, PromptResolver, ResolvedPrompts, StagedPrompts,
    DEFAULT_MODE,
};
use crate::provider::{build_request, interpret_response};
use crate::transport::{HttpTransport, Transport};
use crate::types::{
    AnalysisProgress, ChildInfo, ManualPosition, NormalizedImage, PromptPair, SourceImage,
    StagedReport, Step1Result,
};

/// Per-call analysis options, owned by the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeOptions {
    /// Analysis mode (default: `verified`).
    pub mode: String,
    /// Replaces the mode's prompts when set, for every mode.
    pub prompt_override: Option<PromptPair>,
    /// Advisory details, used by the multi-image flow.
    pub child_info: ChildInfo,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            mode: DEFAULT_MODE.to_string(),
            prompt_override: None,
            child_info: ChildInfo::default(),
        }
    }
}

impl AnalyzeOptions {
    pub fn with_mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    pub fn with_prompt_override(mut self, prompts: PromptPair) -> Self {
        self.prompt_override = Some(prompts);
        self
    }

    pub fn with_child_info(mut self, child_info: ChildInfo) -> Self {
        self.child_info = child_info;
        self
    }
}

/// Join both stages of a staged analysis under their section headers.
pub fn combine_stages(step1: &str, step2: &str) -> String {
    format!(
        "## 📍 ЭТАП 1: Определение позиции\n\n{}\n\n---\n\n## 📋 ЭТАП 2: Полный анализ\n\n{}",
        step1, step2
    )
}

enum TwoStep {
    AwaitingStep1,
    AwaitingStep2 { step1: String, parsed: Step1Result },
    Done(StagedReport),
}

/// Runs carrier-safety analyses against vision models.
///
/// Every flow looks up the model, fetches its API key, normalizes the
/// images, resolves prompts and performs one or two provider round-trips.
/// The first error aborts the flow; nothing is retried.
pub struct Analyzer {
    config: AnalyzerConfig,
    prompts: PromptResolver,
    transport: Arc<dyn Transport>,
    credentials: Arc<dyn CredentialStore>,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("models", &self.config.catalog.keys().collect::<Vec<_>>())
            .field("modes", &self.prompts.modes().collect::<Vec<_>>())
            .field("default_mode", &self.prompts.default_mode())
            .finish()
    }
}

impl Analyzer {
    /// Analyzer over HTTP with an in-memory credential store.
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Arc::new(HttpTransport::new()),
            Arc::new(MemoryCredentialStore::new()),
        )
    }

    /// Analyzer with explicit transport and credential store.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the image limits are invalid or the default mode
    /// has no prompts.
    pub fn with_parts(
        config: AnalyzerConfig,
        transport: Arc<dyn Transport>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        config.image_limits.validate()?;
        let prompts = PromptResolver::default().with_default_mode(config.default_mode.clone())?;
        Ok(Self {
            config,
            prompts,
            transport,
            credentials,
        })
    }

    /// Replace the prompt table, keeping the configured default mode.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the table has no prompts for the default mode.
    pub fn with_prompts(mut self, prompts: PromptResolver) -> Result<Self> {
        self.prompts = prompts.with_default_mode(self.config.default_mode.clone())?;
        Ok(self)
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn prompts(&self) -> &PromptResolver {
        &self.prompts
    }

    /// Store the API key for a model's credential slot.
    ///
    /// Models sharing a slot share the key.
    pub async fn store_api_key(&self, model_key: &str, secret: &str) -> Result<()> {
        let model = self.config.catalog.get(model_key)?;
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "API key must not be empty".to_string(),
            ));
        }
        self.credentials
            .set(&model.api_key_storage_key, secret.to_string())
            .await;
        debug!(model = model_key, slot = %model.api_key_storage_key, "ANALYZER: API key stored");
        Ok(())
    }

    /// Analyze one photo in the given mode.
    ///
    /// Staged modes run [`Analyzer::analyze_two_step`] and return the combined
    /// report; `on_step1` receives the first stage's raw text and parsed
    /// fields. Single modes ignore `on_step1`.
    pub async fn analyze<F>(
        &self,
        image: &SourceImage,
        model_key: &str,
        options: &AnalyzeOptions,
        on_step1: F,
    ) -> Result<String>
    where
        F: FnMut(&str, &Step1Result),
    {
        match self
            .prompts
            .resolve(&options.mode, options.prompt_override.as_ref())
        {
            ResolvedPrompts::Single(prompts) => {
                self.analyze_single_step(image, model_key, &prompts).await
            }
            ResolvedPrompts::Staged(staged) => Ok(self
                .analyze_two_step(image, model_key, &staged, on_step1)
                .await?
                .combined),
        }
    }

    /// One round-trip with the given prompts.
    pub async fn analyze_single_step(
        &self,
        image: &SourceImage,
        model_key: &str,
        prompts: &PromptPair,
    ) -> Result<String> {
        let (model, api_key) = self.model_and_key(model_key).await?;
        let normalized = self.normalize_uncaptioned(image).await?;
        self.round_trip(model, &api_key, &[normalized], prompts).await
    }

    /// Detect the position first, then run the full analysis with it.
    ///
    /// The image is normalized once and sent in both round-trips. The second
    /// stage always runs after the first succeeds; its failure is the
    /// flow's error, so the first stage's text is only available through
    /// `on_step1`.
    pub async fn analyze_two_step<F>(
        &self,
        image: &SourceImage,
        model_key: &str,
        staged: &StagedPrompts,
        mut on_step1: F,
    ) -> Result<StagedReport>
    where
        F: FnMut(&str, &Step1Result),
    {
        let (model, api_key) = self.model_and_key(model_key).await?;
        let images = [self.normalize_uncaptioned(image).await?];

        let mut state = TwoStep::AwaitingStep1;
        loop {
            state = match state {
                TwoStep::AwaitingStep1 => {
                    let step1 = self
                        .round_trip(model, &api_key, &images, &staged.step1)
                        .await?;
                    let parsed = parse_step1(&step1);
                    info!(
                        position = %parsed.position,
                        age = %parsed.age,
                        legs = %parsed.legs,
                        "ANALYZER: step 1 complete"
                    );
                    on_step1(&step1, &parsed);
                    TwoStep::AwaitingStep2 { step1, parsed }
                }
                TwoStep::AwaitingStep2 { step1, parsed } => {
                    let prompts = staged.step2.render(&parsed);
                    let step2 = self.round_trip(model, &api_key, &images, &prompts).await?;
                    let combined = combine_stages(&step1, &step2);
                    TwoStep::Done(StagedReport {
                        step1,
                        step1_parsed: parsed,
                        step2,
                        combined,
                    })
                }
                TwoStep::Done(report) => return Ok(report),
            };
        }
    }

    /// Analyze one photo with a caller-declared position.
    ///
    /// Exactly one round-trip. The result starts with a summary of the
    /// declared values.
    pub async fn analyze_with_manual_position(
        &self,
        image: &SourceImage,
        model_key: &str,
        manual: &ManualPosition,
    ) -> Result<String> {
        let (model, api_key) = self.model_and_key(model_key).await?;
        let normalized = self.normalize_uncaptioned(image).await?;
        let prompts = self.manual_prompts(manual, None)?;

        info!(position = %manual.position, "ANALYZER: manual position analysis");
        let response = self
            .round_trip(model, &api_key, &[normalized], &prompts)
            .await?;
        Ok(format!(
            "{}\n\n---\n\n{}",
            manual::result_header(manual, None),
            response
        ))
    }

    /// Analyze several photos of the same carry in one round-trip.
    ///
    /// Staged modes are single-image only and fall back to the default mode.
    pub async fn analyze_multiple<F>(
        &self,
        images: &[SourceImage],
        model_key: &str,
        options: &AnalyzeOptions,
        mut on_progress: F,
    ) -> Result<String>
    where
        F: FnMut(AnalysisProgress),
    {
        if images.is_empty() {
            return Err(AnalysisError::NoImages);
        }
        let (model, api_key) = self.model_and_key(model_key).await?;
        let count = images.len();

        on_progress(AnalysisProgress::PreparingImages { count });
        let (normalized, labels) = self.normalize_all(images).await?;

        let base = self.single_prompts(options)?;
        let prompts = PromptPair::new(
            with_photo_listing(&base.system, &labels),
            with_child_info(&base.user, &options.child_info),
        );

        on_progress(AnalysisProgress::Analyzing { count });
        self.round_trip(model, &api_key, &normalized, &prompts).await
    }

    /// Multi-photo variant of [`Analyzer::analyze_with_manual_position`].
    pub async fn analyze_multiple_with_manual_position<F>(
        &self,
        images: &[SourceImage],
        model_key: &str,
        manual: &ManualPosition,
        child_info: &ChildInfo,
        mut on_progress: F,
    ) -> Result<String>
    where
        F: FnMut(AnalysisProgress),
    {
        if images.is_empty() {
            return Err(AnalysisError::NoImages);
        }
        let (model, api_key) = self.model_and_key(model_key).await?;
        let count = images.len();

        on_progress(AnalysisProgress::PreparingImages { count });
        let (normalized, labels) = self.normalize_all(images).await?;

        let base = self.manual_prompts(manual, Some(count))?;
        let prompts = PromptPair::new(
            with_photo_listing(&base.system, &labels),
            with_child_info(&base.user, child_info),
        );

        on_progress(AnalysisProgress::Analyzing { count });
        info!(position = %manual.position, count, "ANALYZER: manual position analysis");
        let response = self
            .round_trip(model, &api_key, &normalized, &prompts)
            .await?;
        Ok(format!(
            "{}\n\n---\n\n{}",
            manual::result_header(manual, Some(count)),
            response
        ))
    }

    async fn model_and_key(&self, model_key: &str) -> Result<(&ModelDescriptor, String)> {
        let model = self.config.catalog.get(model_key)?;
        let api_key = self
            .credentials
            .get(&model.api_key_storage_key)
            .await
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AnalysisError::MissingApiKey(model_key.to_string()))?;
        Ok((model, api_key))
    }

    /// Single-image flows send no caption block.
    async fn normalize_uncaptioned(&self, image: &SourceImage) -> Result<NormalizedImage> {
        let mut source = image.clone();
        source.label = None;
        self.normalize_image(source).await
    }

    async fn normalize_image(&self, source: SourceImage) -> Result<NormalizedImage> {
        let limits = self.config.image_limits.clone();
        tokio::task::spawn_blocking(move || normalize(&source, &limits)).await?
    }

    /// Normalize in order; unlabelled images are labelled `Фото N`.
    async fn normalize_all(
        &self,
        images: &[SourceImage],
    ) -> Result<(Vec<NormalizedImage>, Vec<String>)> {
        let mut normalized = Vec::with_capacity(images.len());
        let mut labels = Vec::with_capacity(images.len());

        for (i, image) in images.iter().enumerate() {
            let label = image
                .label
                .as_deref()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map_or_else(|| format!("Фото {}", i + 1), str::to_string);

            let source = image.clone().with_label(label.clone());
            normalized.push(self.normalize_image(source).await?);
            labels.push(label);
        }

        Ok((normalized, labels))
    }

    fn single_prompts(&self, options: &AnalyzeOptions) -> Result<PromptPair> {
        match self
            .prompts
            .resolve(&options.mode, options.prompt_override.as_ref())
        {
            ResolvedPrompts::Single(prompts) => Ok(prompts),
            ResolvedPrompts::Staged(_) => {
                warn!(
                    mode = %options.mode,
                    fallback = %self.prompts.default_mode(),
                    "ANALYZER: staged mode is single-image only, using default"
                );
                match self.prompts.resolve(self.prompts.default_mode(), None) {
                    ResolvedPrompts::Single(prompts) => Ok(prompts),
                    ResolvedPrompts::Staged(_) => Err(AnalysisError::InvalidConfig(format!(
                        "default mode '{}' is staged",
                        self.prompts.default_mode()
                    ))),
                }
            }
        }
    }

    /// Step-2 template when both legs and age are declared, bespoke otherwise.
    fn manual_prompts(
        &self,
        manual: &ManualPosition,
        photo_count: Option<usize>,
    ) -> Result<PromptPair> {
        match (manual.age, manual.legs()) {
            (Some(age), Some(legs)) => Ok(self.prompts.step2_template()?.render_fields(
                &manual.position,
                legs,
                age.label(),
                Some(age),
            )),
            _ => Ok(manual::compose(manual, photo_count)),
        }
    }

    async fn round_trip(
        &self,
        model: &ModelDescriptor,
        api_key: &str,
        images: &[NormalizedImage],
        prompts: &PromptPair,
    ) -> Result<String> {
        let request = build_request(images, prompts, model, api_key);
        info!(
            model = %model.id,
            provider = %model.provider,
            images = images.len(),
            "ANALYZER: sending request"
        );

        let response = self.transport.send(&request).await?;
        let text = interpret_response(model.provider, response.status, &response.body)?;
        debug!(model = %model.id, chars = text.chars().count(), "ANALYZER: response received");
        Ok(text)
    }
}

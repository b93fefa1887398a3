//! Vision-model interaction: submit a plant photo and a fixed prompt, get text.
//!
//! The external model is reached through the [`ImageAnalyzer`] trait, a
//! single async method taking an [`AnalysisRequest`] and returning the
//! model's answer. [`LlmAnalyzer`] is the production implementation over any
//! `edgequake_llm` provider; tests substitute fakes.
//!
//! ## No retries
//!
//! A failed call is surfaced to the caller as
//! [`PlantReportError::UpstreamFailure`] immediately. The upload is a
//! user-facing, interactive request: the user can press the button again,
//! and provider SDKs already retry transport-level blips themselves.

use crate::config::{ServiceConfig, DEFAULT_GEMINI_MODEL};
use crate::error::PlantReportError;
use crate::pipeline::encode::EncodedImage;
use crate::prompts::ANALYSIS_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One image-analysis request. Built once by [`analyze`] and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    image: EncodedImage,
    prompt: &'static str,
}

impl AnalysisRequest {
    /// Pair an encoded image with the system prompt.
    pub fn new(image: EncodedImage) -> Self {
        Self {
            image,
            prompt: ANALYSIS_PROMPT,
        }
    }

    /// Base64 image payload.
    pub fn image_data(&self) -> &str {
        &self.image.data
    }

    pub fn mime_type(&self) -> &str {
        &self.image.mime_type
    }

    pub fn prompt_text(&self) -> &str {
        self.prompt
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }
}

/// The model's answer plus the image, re-embedded as a data URI so the
/// caller can request a report without uploading the photo again.
///
/// Serialises to the wire shape `{ "result": ..., "image": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "result")]
    pub text: String,
    #[serde(rename = "image")]
    pub image_data_uri: String,
}

/// An external image-understanding capability.
#[async_trait]
pub trait ImageAnalyzer: Send + Sync {
    /// Submit the image and prompt; return the answer text unmodified.
    async fn describe(&self, request: &AnalysisRequest) -> Result<String, PlantReportError>;
}

/// Analyse an encoded image.
///
/// Builds the [`AnalysisRequest`] with the fixed prompt, calls the analyzer
/// exactly once, and returns the text as received.
///
/// # Errors
/// [`PlantReportError::UpstreamFailure`] (or `UpstreamTimeout`) when the
/// analyzer fails or answers with nothing. No partial result is returned.
pub async fn analyze(
    analyzer: &dyn ImageAnalyzer,
    image: EncodedImage,
) -> Result<AnalysisResult, PlantReportError> {
    let request = AnalysisRequest::new(image);
    let start = Instant::now();

    let text = analyzer.describe(&request).await?;
    if text.trim().is_empty() {
        return Err(PlantReportError::UpstreamFailure {
            reason: "model returned an empty response".to_string(),
        });
    }

    info!(
        "Analysis complete: {} chars in {}ms",
        text.len(),
        start.elapsed().as_millis()
    );

    Ok(AnalysisResult {
        text,
        image_data_uri: request.image().to_data_uri(),
    })
}

// ── edgequake-llm implementation ─────────────────────────────────────────

/// [`ImageAnalyzer`] backed by an `edgequake_llm` vision provider.
pub struct LlmAnalyzer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
}

impl LlmAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ServiceConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
        }
    }

    /// Resolve the provider from `config` and the environment.
    pub fn from_config(config: &ServiceConfig) -> Result<Self, PlantReportError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl ImageAnalyzer for LlmAnalyzer {
    /// ## Message Layout
    ///
    /// A single user message carrying the prompt text and the image as an
    /// inline attachment. No system message: the prompt is the whole task.
    async fn describe(&self, request: &AnalysisRequest) -> Result<String, PlantReportError> {
        let messages = vec![ChatMessage::user_with_images(
            request.prompt_text(),
            vec![request.image().to_image_data()],
        )];

        let call = self.provider.chat(&messages, Some(&self.options));
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(response)) => {
                debug!(
                    "Analysis used {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                Ok(response.content)
            }
            Ok(Err(e)) => {
                warn!("Vision provider call failed: {}", e);
                Err(PlantReportError::UpstreamFailure {
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                warn!("Vision provider call timed out after {:?}", self.timeout);
                Err(PlantReportError::UpstreamTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}

/// Build `CompletionOptions` from the service config.
fn build_options(config: &ServiceConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, PlantReportError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        PlantReportError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`GEMINI_API_KEY`**: Gemini with `config.model` or
///    [`DEFAULT_GEMINI_MODEL`]. Deployments of the original service only set
///    this key.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &ServiceConfig) -> Result<Arc<dyn LLMProvider>, PlantReportError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(gemini_key) = std::env::var("GEMINI_API_KEY") {
        if !gemini_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_GEMINI_MODEL);
            return create_vision_provider("gemini", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| PlantReportError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set GEMINI_API_KEY, OPENAI_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: Result<String, String>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                reply: Err(reason.to_string()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageAnalyzer for Canned {
        async fn describe(&self, request: &AnalysisRequest) -> Result<String, PlantReportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(request.prompt_text(), ANALYSIS_PROMPT);
            self.reply
                .clone()
                .map_err(|reason| PlantReportError::UpstreamFailure { reason })
        }
    }

    fn jpeg() -> EncodedImage {
        EncodedImage {
            data: "/9j/4AAQ".into(),
            mime_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn text_passes_through_unmodified() {
        let analyzer = Canned::ok("  Tulsi\nHoly basil.  \n\n");
        let result = analyze(&analyzer, jpeg()).await.unwrap();
        assert_eq!(result.text, "  Tulsi\nHoly basil.  \n\n");
        assert_eq!(result.image_data_uri, "data:image/jpeg;base64,/9j/4AAQ");
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failure_is_not_retried() {
        let analyzer = Canned::failing("quota exceeded");
        let err = analyze(&analyzer, jpeg()).await.unwrap_err();
        assert!(matches!(err, PlantReportError::UpstreamFailure { .. }));
        assert_eq!(analyzer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_answer_is_upstream_failure() {
        let analyzer = Canned::ok(" \n ");
        let err = analyze(&analyzer, jpeg()).await.unwrap_err();
        assert!(err.to_string().contains("empty"), "got: {err}");
    }

    #[test]
    fn request_exposes_parts() {
        let request = AnalysisRequest::new(jpeg());
        assert_eq!(request.image_data(), "/9j/4AAQ");
        assert_eq!(request.mime_type(), "image/jpeg");
        assert_eq!(request.prompt_text(), ANALYSIS_PROMPT);
    }

    #[test]
    fn result_wire_shape() {
        let result = AnalysisResult {
            text: "Neem".into(),
            image_data_uri: "data:image/png;base64,AA==".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["result"], "Neem");
        assert_eq!(json["image"], "data:image/png;base64,AA==");
    }

    use crate::error::ErrorKind;
    use edgequake_llm::providers::MockProvider;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError};
    use std::sync::Mutex;

    enum Script {
        Reply(&'static str),
        Fail,
        Stall,
    }

    /// A provider that records the messages it is sent and answers from a script.
    struct ScriptedProvider {
        script: Script,
        seen: Mutex<Vec<ChatMessage>>,
    }

    impl ScriptedProvider {
        fn new(script: Script) -> Arc<Self> {
            Arc::new(Self {
                script,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "scripted-vision"
        }

        fn max_context_length(&self) -> usize {
            8192
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            self.chat(&[], None).await
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            match self.script {
                Script::Reply(text) => Ok(LLMResponse::new(text, "scripted-vision")),
                Script::Fail => Err(LlmError::RateLimited("quota exceeded".into())),
                Script::Stall => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(LLMResponse::new("too late", "scripted-vision"))
                }
            }
        }
    }

    #[tokio::test]
    async fn llm_analyzer_returns_mock_text_unmodified() {
        let mock = MockProvider::new();
        mock.add_response("  Neem\nAzadirachta indica.\n").await;
        let analyzer = LlmAnalyzer::new(Arc::new(mock), &ServiceConfig::default());

        let result = analyze(&analyzer, jpeg()).await.unwrap();
        assert_eq!(result.text, "  Neem\nAzadirachta indica.\n");
        assert_eq!(result.image_data_uri, "data:image/jpeg;base64,/9j/4AAQ");
    }

    #[tokio::test]
    async fn llm_analyzer_sends_one_user_message_with_image() {
        let provider = ScriptedProvider::new(Script::Reply("Rose"));
        let analyzer = LlmAnalyzer::new(provider.clone(), &ServiceConfig::default());

        let text = analyzer.describe(&AnalysisRequest::new(jpeg())).await.unwrap();
        assert_eq!(text, "Rose");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].role, ChatRole::User);
        assert_eq!(seen[0].content, ANALYSIS_PROMPT);
        let images = seen[0].images.as_ref().expect("image attached");
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, "/9j/4AAQ");
        assert_eq!(images[0].mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn provider_error_becomes_upstream_failure() {
        let analyzer = LlmAnalyzer::new(
            ScriptedProvider::new(Script::Fail),
            &ServiceConfig::default(),
        );
        let err = analyze(&analyzer, jpeg()).await.unwrap_err();
        match err {
            PlantReportError::UpstreamFailure { ref reason } => {
                assert!(reason.contains("quota exceeded"), "got: {reason}")
            }
            other => panic!("expected UpstreamFailure, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let config = ServiceConfig::builder().api_timeout_secs(1).build().unwrap();
        let provider = ScriptedProvider::new(Script::Stall);
        let analyzer = LlmAnalyzer::new(provider.clone(), &config);

        let err = analyze(&analyzer, jpeg()).await.unwrap_err();
        assert!(matches!(err, PlantReportError::UpstreamTimeout { secs: 1 }));
        assert_eq!(err.kind(), ErrorKind::UpstreamFailure);
        assert_eq!(provider.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn build_options_defaults() {
        let config = ServiceConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.4));
        assert_eq!(opts.max_tokens, Some(2048));
    }
}

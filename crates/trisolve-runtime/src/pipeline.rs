//! The solve pipeline: image in, compiled PDF and caption out.
//!
//! One request is one sequential flow:
//! 1. Ask the vision model, rotating credentials on failure
//! 2. Parse the reply and run the trap checks
//! 3. Render the LaTeX document and compile it
//! 4. Build the caption
//!
//! [`SolvePipeline::respond`] never returns an error. Failures become a
//! [`Reply::Failure`] carrying a user-facing message.

use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

use trisolve_core::message::{caption, user_error_message};
use trisolve_core::{parse_response, KnowledgeBase, KnowledgeError, LatexDocument, SolutionRecord};

use crate::compiler::{self, Artifact, CompileError, DocumentCompiler};
use crate::config::{ConfigError, RuntimeConfig, MAX_ATTEMPTS_CAP};
use crate::image::{ImageError, ImageInput};
use crate::prompts::build_solver_prompt;
use crate::providers::{
    CompletionConfig, CompletionResponse, LlmProvider, ProviderError, ProviderRegistry,
    VisionRequest,
};

/// Errors from a solve request.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Model call failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Document compilation failed: {0}")]
    Compile(#[from] CompileError),

    #[error("Invalid image: {0}")]
    Image(#[from] ImageError),

    #[error("Knowledge base error: {0}")]
    Knowledge(#[from] KnowledgeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// A successful solve.
#[derive(Debug)]
pub struct SolveOutcome {
    pub record: SolutionRecord,

    /// The compiled PDF; the caller discards it after delivery
    pub artifact: Artifact,

    /// Plain-text caption for the artifact
    pub caption: String,
}

/// What goes back to the requester.
#[derive(Debug)]
pub enum Reply {
    Document { artifact: Artifact, caption: String },
    Failure { message: String },
}

/// Job name for a document: `solution_<YYYYmmdd_HHMMSS>_<seq>`.
pub fn job_name(at: DateTime<Utc>, seq: u64) -> String {
    format!("solution_{}_{}", at.format("%Y%m%d_%H%M%S"), seq)
}

/// Drives one request from image to artifact.
///
/// Holds no per-request state beyond a job counter, so one pipeline can
/// serve concurrent requests.
pub struct SolvePipeline {
    provider: Arc<dyn LlmProvider>,
    compiler: Arc<dyn DocumentCompiler>,
    knowledge: KnowledgeBase,
    prompt: String,
    completion: CompletionConfig,
    document: LatexDocument,
    max_attempts: usize,
    retry_delay: Duration,
    jobs: AtomicU64,
}

impl std::fmt::Debug for SolvePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolvePipeline")
            .field("provider", &self.provider.name())
            .field("compiler", &self.compiler.name())
            .field("model", &self.completion.model)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl SolvePipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        compiler: Arc<dyn DocumentCompiler>,
        knowledge: KnowledgeBase,
    ) -> Self {
        let max_attempts = provider.credential_count().clamp(1, MAX_ATTEMPTS_CAP);
        Self {
            prompt: build_solver_prompt(&knowledge),
            provider,
            compiler,
            knowledge,
            completion: CompletionConfig::default(),
            document: LatexDocument::default(),
            max_attempts,
            retry_delay: Duration::from_secs(2),
            jobs: AtomicU64::new(0),
        }
    }

    /// Build everything a [`RuntimeConfig`] describes.
    pub fn from_config(
        config: &RuntimeConfig,
        registry: &ProviderRegistry,
    ) -> Result<Self, PipelineError> {
        let provider_type = &config.provider.provider_type;
        registry.validate(provider_type, &config.provider.settings)?;
        let provider = registry.create(provider_type, &config.provider.settings)?;
        let compiler =
            compiler::from_settings(&config.compiler, &config.output_dir, config.keep_debug_source)?;
        let knowledge = match &config.knowledge {
            Some(path) => KnowledgeBase::from_yaml_file(path)?,
            None => KnowledgeBase::builtin()?,
        };
        let max_attempts = config.attempts_for(provider.credential_count());

        tracing::info!(
            provider = provider.name(),
            compiler = compiler.name(),
            model = %config.model.model,
            max_attempts,
            "Pipeline configured"
        );

        Ok(Self::new(provider, compiler, knowledge)
            .with_completion(config.model.clone())
            .with_max_attempts(max_attempts)
            .with_retry_delay(config.retry_delay))
    }

    pub fn with_completion(mut self, completion: CompletionConfig) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_document(mut self, document: LatexDocument) -> Self {
        self.document = document;
        self
    }

    /// Total model attempts per request, at least 1.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn knowledge(&self) -> &KnowledgeBase {
        &self.knowledge
    }

    /// The solver prompt sent with every image.
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run the full flow for one image.
    pub async fn solve(&self, image: &ImageInput) -> Result<SolveOutcome, PipelineError> {
        let started = Instant::now();
        let request = VisionRequest::new(self.prompt.clone(), image.clone());

        let response = self.ask_model(&request).await?;
        tracing::info!(
            model = %response.model,
            tokens = response.usage.total(),
            finish_reason = ?response.finish_reason,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Model replied"
        );

        let record = parse_response(response.content);
        self.publish(record).await
    }

    /// Load an image from disk and solve it.
    pub async fn solve_file(&self, path: impl AsRef<Path>) -> Result<SolveOutcome, PipelineError> {
        let image = ImageInput::from_path(path).await?;
        self.solve(&image).await
    }

    /// Re-render a saved model reply without calling the model.
    pub async fn render_only(&self, raw_text: &str) -> Result<SolveOutcome, PipelineError> {
        self.publish(parse_response(raw_text)).await
    }

    /// LaTeX source for a record, as it would be compiled.
    pub fn render_source(&self, record: &SolutionRecord) -> String {
        self.document.render(record)
    }

    /// Like [`solve`](Self::solve), but failures become a user-facing reply.
    pub async fn respond(&self, image: &ImageInput) -> Reply {
        Self::into_reply(self.solve(image).await)
    }

    /// Like [`solve_file`](Self::solve_file), but failures become a reply.
    pub async fn respond_file(&self, path: impl AsRef<Path>) -> Reply {
        Self::into_reply(self.solve_file(path).await)
    }

    fn into_reply(result: Result<SolveOutcome, PipelineError>) -> Reply {
        match result {
            Ok(outcome) => Reply::Document {
                artifact: outcome.artifact,
                caption: outcome.caption,
            },
            Err(e) => {
                tracing::error!(error = %e, "Solve request failed");
                Reply::Failure {
                    message: user_error_message(&e),
                }
            }
        }
    }

    async fn publish(&self, record: SolutionRecord) -> Result<SolveOutcome, PipelineError> {
        if !record.warnings.is_empty() {
            tracing::warn!(
                warnings = ?record.warning_messages(),
                "Trap checks flagged the reply"
            );
        }

        let source = self.document.render(&record);
        let seq = self.jobs.fetch_add(1, Ordering::Relaxed) + 1;
        let job = job_name(record.received_at, seq);

        let artifact = self.compiler.compile(&source, &job).await?;
        let caption = caption(&record);

        Ok(SolveOutcome {
            record,
            artifact,
            caption,
        })
    }

    /// One model call per attempt, each under the completion timeout.
    ///
    /// Between attempts the provider moves to its next credential.
    async fn ask_model(&self, request: &VisionRequest) -> Result<CompletionResponse, ProviderError> {
        let provider = self.provider.as_ref();
        let completion = &self.completion;
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;

        let backoff = ConstantBuilder::default()
            .with_delay(self.retry_delay)
            .with_max_times(self.max_attempts.saturating_sub(1));

        let result = (move || async move {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::debug!(attempt, provider = provider.name(), "Calling model");
            match tokio::time::timeout(completion.timeout, provider.complete(request, completion)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(completion.timeout)),
            }
        })
        .retry(backoff)
        .when(ProviderError::is_retryable)
        .notify(|err: &ProviderError, delay: Duration| {
            let credential = provider.rotate_credential();
            tracing::warn!(error = %err, credential, ?delay, "Model call failed, retrying");
        })
        .await;

        if let Err(e) = &result {
            tracing::error!(
                error = %e,
                attempts = attempts.load(Ordering::Relaxed),
                "Model call gave up"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::sample_png;
    use crate::providers::TokenUsage;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const REPLY: &str = "STRATEGY 1 - TEXTBOOK RIGOR\nBy parts.\nANSWER 1: x^2 + C\n\
STRATEGY 2 - SPEED SHORTCUTS\nPower rule.\nANSWER 2: x^2 + C\n\
STRATEGY 3 - OLYMPIAD INSIGHT\nArea.\nANSWER 3: x^2 + C\n\
FINAL SYNTHESIS & VERIFICATION:\nDO ALL THREE AGREE? YES\n\
ULTIMATE ANSWER:\nFINAL ANSWER: x^2 + C\nONE-SENTENCE CLEAR REASON:\nPower rule.\nFINAL CONFIDENCE: 96%\n";

    /// Replays scripted results; succeeds with [`REPLY`] once the script runs out.
    struct ScriptedProvider {
        script: Mutex<VecDeque<ProviderError>>,
        credentials: usize,
        calls: AtomicUsize,
        rotations: AtomicUsize,
        delay: Option<Duration>,
    }

    impl ScriptedProvider {
        fn new(failures: Vec<ProviderError>, credentials: usize) -> Self {
            Self {
                script: Mutex::new(failures.into()),
                credentials,
                calls: AtomicUsize::new(0),
                rotations: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn complete(
            &self,
            request: &VisionRequest,
            config: &CompletionConfig,
        ) -> Result<CompletionResponse, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(request.prompt.contains("FINAL CONFIDENCE:"));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(error) = self.script.lock().unwrap().pop_front() {
                return Err(error);
            }
            Ok(CompletionResponse {
                content: REPLY.to_string(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
                finish_reason: Some("STOP".to_string()),
            })
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn rotate_credential(&self) -> usize {
            let n = self.rotations.fetch_add(1, Ordering::SeqCst) + 1;
            n % self.credentials
        }

        fn credential_count(&self) -> usize {
            self.credentials
        }
    }

    /// Writes a minimal PDF and remembers each source it was given.
    struct FakeCompiler {
        dir: PathBuf,
        sources: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl FakeCompiler {
        fn new(dir: &Path) -> Self {
            Self {
                dir: dir.to_path_buf(),
                sources: Mutex::new(Vec::new()),
                fail: false,
            }
        }
    }

    #[async_trait]
    impl DocumentCompiler for FakeCompiler {
        async fn compile(&self, source: &str, job_name: &str) -> Result<Artifact, CompileError> {
            self.sources
                .lock()
                .unwrap()
                .push((job_name.to_string(), source.to_string()));
            if self.fail {
                return Err(CompileError::Failed {
                    job: job_name.to_string(),
                    code: Some(1),
                    log_tail: "! Undefined control sequence.".to_string(),
                });
            }
            let path = self.dir.join(format!("{}.pdf", job_name));
            tokio::fs::write(&path, b"%PDF-1.5\n").await?;
            Artifact::from_pdf(path, job_name).await
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    fn pipeline(provider: Arc<ScriptedProvider>, compiler: Arc<FakeCompiler>) -> SolvePipeline {
        SolvePipeline::new(provider, compiler, KnowledgeBase::builtin().unwrap())
            .with_retry_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_solve_produces_artifact_and_caption() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![], 1));
        let compiler = Arc::new(FakeCompiler::new(dir.path()));
        let pipeline = pipeline(provider.clone(), compiler.clone());

        let outcome = pipeline.solve(&sample_png()).await.unwrap();

        assert_eq!(outcome.record.final_answer.value, "x^2 + C");
        assert_eq!(outcome.record.confidence.value, 96);
        assert!(outcome.record.warnings.is_empty());
        assert!(outcome.artifact.path().exists());
        assert!(outcome.caption.contains("Answer: x^2 + C"));
        assert!(outcome.caption.contains("Confidence: 96%"));
        assert_eq!(provider.calls(), 1);

        let sources = compiler.sources.lock().unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].0.starts_with("solution_"));
        assert!(sources[0].1.contains(r"\begin{document}"));
    }

    #[tokio::test]
    async fn test_retry_rotates_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(
            vec![
                ProviderError::RateLimited { retry_after: None },
                ProviderError::HttpError("connection reset".to_string()),
            ],
            3,
        ));
        let pipeline = pipeline(provider.clone(), Arc::new(FakeCompiler::new(dir.path())));
        assert_eq!(pipeline.max_attempts(), 3);

        let outcome = pipeline.solve(&sample_png()).await.unwrap();
        assert_eq!(outcome.record.final_answer.value, "x^2 + C");
        assert_eq!(provider.calls(), 3);
        assert_eq!(provider.rotations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let failures = (0..10).map(|_| ProviderError::AuthError).collect();
        let provider = Arc::new(ScriptedProvider::new(failures, 2));
        let pipeline = pipeline(provider.clone(), Arc::new(FakeCompiler::new(dir.path())));

        let result = pipeline.solve(&sample_png()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Provider(ProviderError::AuthError))
        ));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_not_configured_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(
            vec![ProviderError::NotConfigured("no key".to_string())],
            3,
        ));
        let pipeline = pipeline(provider.clone(), Arc::new(FakeCompiler::new(dir.path())));

        assert!(pipeline.solve(&sample_png()).await.is_err());
        assert_eq!(provider.calls(), 1);
        assert_eq!(provider.rotations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_model_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = ScriptedProvider::new(vec![], 1);
        provider.delay = Some(Duration::from_secs(600));
        let provider = Arc::new(provider);

        let completion = CompletionConfig {
            timeout: Duration::from_secs(5),
            ..CompletionConfig::default()
        };
        let pipeline = pipeline(provider.clone(), Arc::new(FakeCompiler::new(dir.path())))
            .with_completion(completion);

        match pipeline.solve(&sample_png()).await {
            Err(PipelineError::Provider(ProviderError::Timeout(d))) => {
                assert_eq!(d, Duration::from_secs(5))
            }
            other => panic!("Expected timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_turns_compile_failure_into_message() {
        let dir = tempfile::tempdir().unwrap();
        let mut compiler = FakeCompiler::new(dir.path());
        compiler.fail = true;
        let provider = Arc::new(ScriptedProvider::new(vec![], 1));
        let pipeline = pipeline(provider, Arc::new(compiler));

        match pipeline.respond(&sample_png()).await {
            Reply::Failure { message } => {
                assert!(message.starts_with("*ERROR*"));
                assert!(message.contains("Document compilation failed"));
                assert!(message.contains("try again"));
            }
            other => panic!("Expected failure reply, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_respond_file_rejects_bad_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problem.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let provider = Arc::new(ScriptedProvider::new(vec![], 1));
        let pipeline = pipeline(provider.clone(), Arc::new(FakeCompiler::new(dir.path())));

        assert!(matches!(
            pipeline.respond_file(&path).await,
            Reply::Failure { .. }
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_render_only_skips_model() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(vec![], 1));
        let compiler = Arc::new(FakeCompiler::new(dir.path()));
        let pipeline = pipeline(provider.clone(), compiler.clone());

        let first = pipeline.render_only("no markers at all").await.unwrap();
        let second = pipeline.render_only(REPLY).await.unwrap();

        assert_eq!(provider.calls(), 0);
        assert!(first.record.final_answer.is_fallback());
        assert_ne!(first.artifact.job_name(), second.artifact.job_name());
        assert!(second.artifact.job_name().ends_with("_2"));
    }

    #[test]
    fn test_job_name_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(job_name(at, 12), "solution_20240309_140507_12");
    }

    #[test]
    fn test_max_attempts_follow_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = Arc::new(FakeCompiler::new(dir.path()));
        let many = pipeline(Arc::new(ScriptedProvider::new(vec![], 12)), compiler.clone());
        assert_eq!(many.max_attempts(), MAX_ATTEMPTS_CAP);

        let explicit = pipeline(Arc::new(ScriptedProvider::new(vec![], 1)), compiler)
            .with_max_attempts(0);
        assert_eq!(explicit.max_attempts(), 1);
    }

    #[test]
    fn test_from_config_with_inline_key() {
        let config = RuntimeConfig::from_yaml(
            "provider:\n  type: gemini\n  settings:\n    api_keys: [a, b]\n",
        )
        .unwrap();
        let pipeline = SolvePipeline::from_config(&config, &ProviderRegistry::with_defaults()).unwrap();
        assert_eq!(pipeline.max_attempts(), 2);
        assert!(pipeline.prompt().contains("KNOWLEDGE BASE"));
    }

    #[test]
    fn test_from_config_rejects_bad_provider_settings() {
        let config = RuntimeConfig::from_yaml(
            "provider:\n  type: gemini\n  settings:\n    api_key: k\n    base_url: not-a-url\n",
        )
        .unwrap();
        match SolvePipeline::from_config(&config, &ProviderRegistry::with_defaults()) {
            Err(PipelineError::Provider(ProviderError::NotConfigured(msg))) => {
                assert!(msg.contains("base_url"));
            }
            other => panic!("Expected NotConfigured, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_from_config_unknown_provider() {
        let config = RuntimeConfig::from_yaml("provider:\n  type: nope\n").unwrap();
        assert!(matches!(
            SolvePipeline::from_config(&config, &ProviderRegistry::with_defaults()),
            Err(PipelineError::Provider(ProviderError::NotConfigured(_)))
        ));
    }
}

//! # trisolve-runtime
//!
//! Everything in trisolve that touches the outside world: the vision-model
//! call, the LaTeX compiler, and the pipeline tying them to the pure
//! parsing and rendering in `trisolve-core`.
//!
//! ## Flow
//!
//! ```text
//! ImageInput -> LlmProvider -> parse_response -> LatexDocument -> DocumentCompiler -> Artifact
//! ```
//!
//! ## Features
//!
//! - `gemini` (default): HTTP client for the Gemini `generateContent` API
//! - `remote` (default): HTTP client for a remote LaTeX compile service
//!
//! Without them the types still build, and calls return `NotConfigured`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use trisolve_runtime::{ProviderRegistry, RuntimeConfig, SolvePipeline, Reply};
//!
//! let config = RuntimeConfig::from_yaml_file("trisolve.yaml")?;
//! let pipeline = SolvePipeline::from_config(&config, &ProviderRegistry::with_defaults())?;
//!
//! match pipeline.respond_file("problem.jpg").await {
//!     Reply::Document { artifact, caption } => println!("{caption}\n{}", artifact.path().display()),
//!     Reply::Failure { message } => eprintln!("{message}"),
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod image;
pub mod pipeline;
pub mod prompts;
pub mod providers;

#[cfg(test)]
mod test_support;

pub use compiler::{Artifact, CompileError, DocumentCompiler, LatexCompiler, RemoteCompiler};
pub use config::{CompilerSettings, ConfigError, ProviderSettings, RuntimeConfig};
pub use image::{ImageError, ImageFormat, ImageInput};
pub use pipeline::{job_name, PipelineError, Reply, SolveOutcome, SolvePipeline};
pub use prompts::build_solver_prompt;
pub use providers::{
    CompletionConfig, CredentialPool, GeminiProvider, LlmProvider, ProviderError,
    ProviderRegistry, VisionRequest,
};

//! Turning a LaTeX source into a validated PDF artifact.
//!
//! Two backends implement [`DocumentCompiler`]: a local `pdflatex`
//! subprocess and a remote HTTP compile service. Both guarantee that a
//! returned [`Artifact`] exists and starts with the `%PDF` magic bytes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

mod pdflatex;
mod remote;

pub use pdflatex::LatexCompiler;
pub use remote::RemoteCompiler;

use crate::config::CompilerSettings;

/// Leading bytes of every PDF file.
pub const PDF_MAGIC: &[u8] = b"%PDF";

/// Errors from document compilation.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Compiler exited with {code:?} for job '{job}': {log_tail}")]
    Failed {
        job: String,
        code: Option<i32>,
        log_tail: String,
    },

    #[error("Compilation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Compiler binary not found: {0}")]
    BinaryNotFound(String),

    #[error("I/O error during compilation: {0}")]
    Io(#[from] std::io::Error),

    #[error("Compiler reported success but {0} is missing")]
    MissingOutput(PathBuf),

    #[error("Output is not a PDF: {0}")]
    InvalidArtifact(PathBuf),

    #[error("Remote compiler error: {status} - {message}")]
    Remote { status: u16, message: String },

    #[error("Compiler not configured: {0}")]
    NotConfigured(String),
}

/// A compiled, validated PDF on disk.
///
/// The caller owns the file and removes it with [`Artifact::discard`]
/// once delivered.
#[derive(Debug, Clone)]
pub struct Artifact {
    path: PathBuf,
    job_name: String,
    size: u64,
}

impl Artifact {
    /// Validate `path` and wrap it.
    pub async fn from_pdf(path: PathBuf, job_name: impl Into<String>) -> Result<Self, CompileError> {
        let size = validate_pdf(&path).await?;
        Ok(Self {
            path,
            job_name: job_name.into(),
            size,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Delete the PDF.
    pub async fn discard(self) -> Result<(), CompileError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Check that `path` exists and starts with `%PDF`. Returns the file size.
pub async fn validate_pdf(path: &Path) -> Result<u64, CompileError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(CompileError::MissingOutput(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(CompileError::InvalidArtifact(path.to_path_buf()));
    }
    Ok(bytes.len() as u64)
}

/// Compiles a LaTeX source into a PDF artifact.
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    async fn compile(&self, source: &str, job_name: &str) -> Result<Artifact, CompileError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Build the configured backend.
pub fn from_settings(
    settings: &CompilerSettings,
    output_dir: impl Into<PathBuf>,
    keep_debug_source: bool,
) -> Result<Arc<dyn DocumentCompiler>, CompileError> {
    let output_dir = output_dir.into();
    match settings {
        CompilerSettings::Local {
            program,
            pass_timeout,
        } => Ok(Arc::new(
            LatexCompiler::new(output_dir)
                .with_program(program.clone())
                .with_pass_timeout(*pass_timeout)
                .keep_debug_source(keep_debug_source),
        )),
        CompilerSettings::Remote { endpoint, timeout } => Ok(Arc::new(
            RemoteCompiler::new(endpoint.clone(), output_dir)?.with_timeout(*timeout),
        )),
    }
}

/// Last `lines` lines of `text`.
pub(crate) fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

//! HTTP compile-service backend.
//!
//! POSTs the LaTeX source as `text/x-tex` and expects the PDF bytes back.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

use super::{Artifact, CompileError, DocumentCompiler, PDF_MAGIC};

/// Default request timeout.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body carried in [`CompileError::Remote`].
#[cfg_attr(not(feature = "remote"), allow(dead_code))]
const MAX_ERROR_BODY: usize = 500;

/// Compiles through a remote service.
#[derive(Debug, Clone)]
pub struct RemoteCompiler {
    endpoint: String,
    output_dir: PathBuf,
    #[cfg_attr(not(feature = "remote"), allow(dead_code))]
    timeout: Duration,
    #[cfg(feature = "remote")]
    client: reqwest::Client,
}

impl RemoteCompiler {
    pub fn new(endpoint: impl Into<String>, output_dir: impl Into<PathBuf>) -> Result<Self, CompileError> {
        let endpoint = endpoint.into();
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            return Err(CompileError::NotConfigured(format!(
                "Remote endpoint must be an http(s) URL, got '{}'",
                endpoint
            )));
        }
        Ok(Self {
            endpoint,
            output_dir: output_dir.into(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
            #[cfg(feature = "remote")]
            client: reqwest::Client::new(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    #[cfg(feature = "remote")]
    async fn fetch(&self, source: &str) -> Result<Vec<u8>, CompileError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("content-type", "text/x-tex")
            .timeout(self.timeout)
            .body(source.to_string())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CompileError::Timeout(self.timeout)
                } else {
                    CompileError::Remote {
                        status: 0,
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| message.is_char_boundary(*i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(CompileError::Remote {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await.map_err(|e| CompileError::Remote {
            status: status.as_u16(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }

    #[cfg(not(feature = "remote"))]
    async fn fetch(&self, _source: &str) -> Result<Vec<u8>, CompileError> {
        Err(CompileError::NotConfigured(
            "Remote compiler requires 'remote' feature".to_string(),
        ))
    }
}

#[async_trait]
impl DocumentCompiler for RemoteCompiler {
    async fn compile(&self, source: &str, job_name: &str) -> Result<Artifact, CompileError> {
        let bytes = self.fetch(source).await?;
        let pdf_path = self.output_dir.join(format!("{}.pdf", job_name));

        if !bytes.starts_with(PDF_MAGIC) {
            tracing::warn!(job = job_name, bytes = bytes.len(), "Remote compiler returned non-PDF body");
            return Err(CompileError::InvalidArtifact(pdf_path));
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        tokio::fs::write(&pdf_path, &bytes).await?;
        tracing::info!(job = job_name, bytes = bytes.len(), "Remote compile finished");

        Artifact::from_pdf(pdf_path, job_name).await
    }

    fn name(&self) -> &str {
        "remote"
    }
}

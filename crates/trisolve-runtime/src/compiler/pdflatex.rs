//! Local `pdflatex` backend.
//!
//! Runs the compiler twice so the table of contents resolves. A failed
//! first pass is tolerated (it often fails only on missing `.toc`/`.aux`
//! state); the second pass must exit zero.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use super::{tail, Artifact, CompileError, DocumentCompiler};

/// Default per-pass timeout.
pub const DEFAULT_PASS_TIMEOUT: Duration = Duration::from_secs(120);

/// Lines of compiler log carried in [`CompileError::Failed`].
const LOG_TAIL_LINES: usize = 20;

/// Auxiliary files removed after each job. A failed job also loses its `.pdf`.
const AUX_EXTENSIONS: [&str; 5] = ["aux", "log", "out", "toc", "tex"];

/// Compiles with a local `pdflatex` (or compatible) binary.
#[derive(Debug, Clone)]
pub struct LatexCompiler {
    program: String,
    output_dir: PathBuf,
    pass_timeout: Duration,
    keep_debug_source: bool,
}

impl LatexCompiler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: "pdflatex".to_string(),
            output_dir: output_dir.into(),
            pass_timeout: DEFAULT_PASS_TIMEOUT,
            keep_debug_source: false,
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_pass_timeout(mut self, timeout: Duration) -> Self {
        self.pass_timeout = timeout;
        self
    }

    /// Keep a copy of the source as `<job>.debug.tex`.
    pub fn keep_debug_source(mut self, keep: bool) -> Self {
        self.keep_debug_source = keep;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    async fn run_pass(&self, tex_path: &Path, job_name: &str) -> Result<Output, CompileError> {
        let child = Command::new(&self.program)
            .arg("-interaction=nonstopmode")
            .arg("-output-directory")
            .arg(&self.output_dir)
            .arg("-jobname")
            .arg(job_name)
            .arg(tex_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CompileError::BinaryNotFound(self.program.clone()),
                _ => CompileError::Io(e),
            })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        match tokio::time::timeout(self.pass_timeout, child.wait_with_output()).await {
            Ok(output) => Ok(output?),
            Err(_) => Err(CompileError::Timeout(self.pass_timeout)),
        }
    }

    async fn failure_log(&self, job_name: &str, output: &Output) -> String {
        let log_path = self.output_dir.join(format!("{}.log", job_name));
        let text = match tokio::fs::read(&log_path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => format!(
                "{}{}",
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            ),
        };
        tail(&text, LOG_TAIL_LINES)
    }

    async fn cleanup(&self, job_name: &str, failed: bool) {
        let pdf = failed.then_some("pdf");
        for ext in AUX_EXTENSIONS.into_iter().chain(pdf) {
            let path = self.output_dir.join(format!("{}.{}", job_name, ext));
            if let Err(e) = tokio::fs::remove_file(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(path = %path.display(), error = %e, "Failed to remove auxiliary file");
                }
            }
        }
    }

    async fn compile_inner(&self, tex_path: &Path, job_name: &str) -> Result<Artifact, CompileError> {
        let first = self.run_pass(tex_path, job_name).await?;
        if !first.status.success() {
            tracing::warn!(
                job = job_name,
                pass = 1,
                code = ?first.status.code(),
                "First compile pass failed, continuing"
            );
        }

        let second = self.run_pass(tex_path, job_name).await?;
        if !second.status.success() {
            let log_tail = self.failure_log(job_name, &second).await;
            return Err(CompileError::Failed {
                job: job_name.to_string(),
                code: second.status.code(),
                log_tail,
            });
        }

        let pdf_path = self.output_dir.join(format!("{}.pdf", job_name));
        Artifact::from_pdf(pdf_path, job_name).await
    }
}

#[async_trait]
impl DocumentCompiler for LatexCompiler {
    async fn compile(&self, source: &str, job_name: &str) -> Result<Artifact, CompileError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let tex_path = self.output_dir.join(format!("{}.tex", job_name));
        tokio::fs::write(&tex_path, source).await?;

        if self.keep_debug_source {
            let debug_path = self.output_dir.join(format!("{}.debug.tex", job_name));
            tokio::fs::write(&debug_path, source).await?;
            tracing::debug!(path = %debug_path.display(), "Saved debug source");
        }

        let result = self.compile_inner(&tex_path, job_name).await;
        self.cleanup(job_name, result.is_err()).await;

        match &result {
            Ok(artifact) => {
                tracing::info!(job = job_name, bytes = artifact.size(), "Compiled document")
            }
            Err(e) => tracing::warn!(job = job_name, error = %e, "Compilation failed"),
        }
        result
    }

    fn name(&self) -> &str {
        "pdflatex"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Write an executable shell script standing in for pdflatex.
    ///
    /// Arguments arrive as: `$1` interaction flag, `$3` output dir, `$5` job name.
    fn fake_compiler(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    const SOURCE: &str = "\\documentclass{article}\\begin{document}x\\end{document}";

    #[tokio::test]
    async fn test_failing_compiler_reports_failed() {
        let out = tempfile::tempdir().unwrap();
        let compiler = LatexCompiler::new(out.path()).with_program("false");

        match compiler.compile(SOURCE, "job").await {
            Err(CompileError::Failed { job, code, .. }) => {
                assert_eq!(job, "job");
                assert_eq!(code, Some(1));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(!out.path().join("job.pdf").exists());
    }

    #[tokio::test]
    async fn test_partial_pdf_removed_on_failure() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(
            bin.path(),
            "partial",
            r#"printf '%%PDF-1.5\n' > "$3/$5.pdf"; exit 1"#,
        );

        let compiler = LatexCompiler::new(out.path()).with_program(program);
        assert!(matches!(
            compiler.compile(SOURCE, "job").await,
            Err(CompileError::Failed { .. })
        ));
        let left: Vec<_> = std::fs::read_dir(out.path()).unwrap().collect();
        assert!(left.is_empty(), "left behind: {:?}", left);
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let out = tempfile::tempdir().unwrap();
        let compiler = LatexCompiler::new(out.path()).with_program("trisolve-no-such-pdflatex");
        assert!(matches!(
            compiler.compile(SOURCE, "job").await,
            Err(CompileError::BinaryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_successful_compile() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(
            bin.path(),
            "fake-pdflatex",
            r#"printf '%%PDF-1.5\n' > "$3/$5.pdf"; echo run >> "$3/passes""#,
        );

        let compiler = LatexCompiler::new(out.path()).with_program(program);
        let artifact = compiler.compile(SOURCE, "solution_1").await.unwrap();

        assert_eq!(artifact.path(), out.path().join("solution_1.pdf"));
        assert_eq!(artifact.job_name(), "solution_1");
        let passes = std::fs::read_to_string(out.path().join("passes")).unwrap();
        assert_eq!(passes.lines().count(), 2);
        // Working source is cleaned up, no debug copy by default
        assert!(!out.path().join("solution_1.tex").exists());
        assert!(!out.path().join("solution_1.debug.tex").exists());
    }

    #[tokio::test]
    async fn test_first_pass_failure_tolerated() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(
            bin.path(),
            "flaky",
            r#"if [ -f "$3/seen" ]; then printf '%%PDF-1.4\n' > "$3/$5.pdf"; exit 0; fi; touch "$3/seen"; exit 1"#,
        );

        let compiler = LatexCompiler::new(out.path()).with_program(program);
        assert!(compiler.compile(SOURCE, "job").await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_output_rejected() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(bin.path(), "garbage", r#"echo "not a pdf" > "$3/$5.pdf""#);

        let compiler = LatexCompiler::new(out.path()).with_program(program);
        assert!(matches!(
            compiler.compile(SOURCE, "job").await,
            Err(CompileError::InvalidArtifact(_))
        ));
        assert!(!out.path().join("job.pdf").exists());
    }

    #[tokio::test]
    async fn test_success_without_output() {
        let out = tempfile::tempdir().unwrap();
        let compiler = LatexCompiler::new(out.path()).with_program("true");
        assert!(matches!(
            compiler.compile(SOURCE, "job").await,
            Err(CompileError::MissingOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_failure_carries_log_tail() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(
            bin.path(),
            "broken",
            r#"printf 'line one\n! Undefined control sequence.\n' > "$3/$5.log"; exit 1"#,
        );

        let compiler = LatexCompiler::new(out.path()).with_program(program);
        match compiler.compile(SOURCE, "job").await {
            Err(CompileError::Failed { log_tail, .. }) => {
                assert!(log_tail.contains("Undefined control sequence"));
            }
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(!out.path().join("job.log").exists());
    }

    #[tokio::test]
    async fn test_timeout_kills_pass() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(bin.path(), "slow", "sleep 5");

        let compiler = LatexCompiler::new(out.path())
            .with_program(program)
            .with_pass_timeout(Duration::from_millis(200));
        let started = std::time::Instant::now();
        assert!(matches!(
            compiler.compile(SOURCE, "job").await,
            Err(CompileError::Timeout(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_debug_source_kept() {
        let bin = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let program = fake_compiler(bin.path(), "ok", r#"printf '%%PDF-1.5\n' > "$3/$5.pdf""#);

        let compiler = LatexCompiler::new(out.path())
            .with_program(program)
            .keep_debug_source(true);
        compiler.compile(SOURCE, "job").await.unwrap();

        let kept = std::fs::read_to_string(out.path().join("job.debug.tex")).unwrap();
        assert_eq!(kept, SOURCE);
    }
}

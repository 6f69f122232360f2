//! trisolve CLI: calculus problem images in, annotated PDFs out.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use trisolve_core::{analyze, KnowledgeBase, LatexDocument, SolutionRecord, StrategyId};
use trisolve_runtime::{
    build_solver_prompt, compiler, job_name, ProviderRegistry, RuntimeConfig, SolvePipeline,
};

#[derive(Parser)]
#[command(name = "trisolve", version, about = "Solve calculus problems three ways and typeset the result")]
struct Cli {
    /// Runtime config file (YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Solve the problem in an image and compile the PDF.
    Solve {
        /// JPEG or PNG image of the problem.
        image: PathBuf,

        /// Directory for the compiled PDF.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Parse a saved model reply and report what was extracted.
    Inspect {
        /// File holding the raw model reply.
        response: PathBuf,

        /// Print the full record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render a saved model reply to LaTeX, optionally compiling it.
    Render {
        /// File holding the raw model reply.
        response: PathBuf,

        /// Write the LaTeX source here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Compile to PDF with the configured backend.
        #[arg(long)]
        compile: bool,

        /// Directory for the compiled PDF.
        #[arg(long, requires = "compile")]
        output_dir: Option<PathBuf>,

        /// Leave out the table of contents.
        #[arg(long)]
        no_toc: bool,
    },

    /// Print the solver prompt sent with every image.
    Prompt {
        /// Knowledge base YAML to embed instead of the configured one.
        #[arg(long)]
        knowledge: Option<PathBuf>,
    },

    /// Work with knowledge-base files.
    Knowledge {
        #[command(subcommand)]
        action: KnowledgeAction,
    },

    /// Print the effective runtime config as YAML.
    Config,
}

#[derive(Subcommand)]
enum KnowledgeAction {
    /// Validate a knowledge-base YAML file.
    Validate {
        file: PathBuf,
    },
    /// List the entries of a knowledge base.
    List {
        /// File to list; the configured or built-in base when omitted.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    tracing::debug!(path = ?cli.config, output_dir = %config.output_dir.display(), "Loaded configuration");

    match cli.command {
        Commands::Solve { image, output_dir } => solve(config, &image, output_dir).await,
        Commands::Inspect { response, json } => inspect(&response, json),
        Commands::Render {
            response,
            output,
            compile,
            output_dir,
            no_toc,
        } => render(config, &response, output, compile, output_dir, no_toc).await,
        Commands::Prompt { knowledge } => {
            let base = match knowledge {
                Some(path) => load_knowledge(&path)?,
                None => configured_knowledge(&config)?,
            };
            print!("{}", build_solver_prompt(&base));
            Ok(())
        }
        Commands::Knowledge { action } => match action {
            KnowledgeAction::Validate { file } => {
                let base = load_knowledge(&file)?;
                println!(
                    "knowledge base valid: {} v{} ({} sections, {} entries)",
                    base.name,
                    base.version,
                    base.sections.len(),
                    base.entries().count()
                );
                Ok(())
            }
            KnowledgeAction::List { file } => {
                let base = match file {
                    Some(path) => load_knowledge(&path)?,
                    None => configured_knowledge(&config)?,
                };
                list_knowledge(&base);
                Ok(())
            }
        },
        Commands::Config => {
            print!("{}", serde_yaml::to_string(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn load_knowledge(path: &Path) -> Result<KnowledgeBase> {
    KnowledgeBase::from_yaml_file(path)
        .with_context(|| format!("Invalid knowledge base {}", path.display()))
}

fn configured_knowledge(config: &RuntimeConfig) -> Result<KnowledgeBase> {
    match &config.knowledge {
        Some(path) => load_knowledge(path),
        None => Ok(KnowledgeBase::builtin()?),
    }
}

fn read_reply(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

async fn solve(mut config: RuntimeConfig, image: &Path, output_dir: Option<PathBuf>) -> Result<()> {
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    let pipeline = SolvePipeline::from_config(&config, &ProviderRegistry::with_defaults())?;

    let outcome = pipeline
        .solve_file(image)
        .await
        .with_context(|| format!("Failed to solve {}", image.display()))?;

    println!("{}", outcome.caption);
    println!();
    println!("PDF: {}", outcome.artifact.path().display());
    Ok(())
}

fn inspect(response: &Path, json: bool) -> Result<()> {
    let record = analyze(&read_reply(response)?);

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_record(&record);
    }
    Ok(())
}

fn print_record(record: &SolutionRecord) {
    let flag = |fallback: bool| if fallback { " (default)" } else { "" };

    println!(
        "Final answer: {}{}",
        record.final_answer.value,
        flag(record.final_answer.is_fallback())
    );
    println!(
        "Confidence:   {}%{}",
        record.confidence.value,
        flag(record.confidence.is_fallback())
    );
    println!("Reason:       {}{}", record.reason.value, flag(record.reason.is_fallback()));
    println!(
        "Model says all three agree: {}",
        if record.all_agree { "yes" } else { "no" }
    );

    println!();
    println!("Strategies:");
    for strategy in StrategyId::ALL {
        let status = match record.sections.get(&strategy) {
            Some(section) if !section.is_fallback() => "found",
            _ => "missing",
        };
        let answer = record
            .strategy_answers
            .get(&strategy)
            .map(String::as_str)
            .unwrap_or("-");
        println!("  {} [{}] answer: {}", strategy, status, answer);
    }

    println!();
    if record.warnings.is_empty() {
        println!("Warnings: none");
    } else {
        println!("Warnings:");
        for warning in &record.warnings {
            match &warning.span {
                Some(span) => println!("  - {} ({})", warning.message, span),
                None => println!("  - {}", warning.message),
            }
        }
    }
}

async fn render(
    mut config: RuntimeConfig,
    response: &Path,
    output: Option<PathBuf>,
    compile: bool,
    output_dir: Option<PathBuf>,
    no_toc: bool,
) -> Result<()> {
    let record = analyze(&read_reply(response)?);

    let mut document = LatexDocument::default();
    if no_toc {
        document = document.without_toc();
    }
    let source = document.render(&record);

    match &output {
        Some(path) => {
            std::fs::write(path, &source)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None if !compile => print!("{}", source),
        None => {}
    }

    if compile {
        if let Some(dir) = output_dir {
            config.output_dir = dir;
        }
        let backend =
            compiler::from_settings(&config.compiler, &config.output_dir, config.keep_debug_source)?;
        let artifact = backend
            .compile(&source, &job_name(record.received_at, 1))
            .await
            .context("Compilation failed")?;
        println!("PDF: {}", artifact.path().display());
    }

    Ok(())
}

fn list_knowledge(base: &KnowledgeBase) {
    println!("{} v{}", base.name, base.version);
    for section in &base.sections {
        println!();
        println!(
            "{} ({} entries{})",
            section.title,
            section.entries.len(),
            if section.in_prompt { "" } else { ", not in prompt" }
        );
        for entry in &section.entries {
            println!("  {:<4} {}", entry.id, entry.statement);
        }
    }
}

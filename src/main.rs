//! Taskstage - multi-stage workflows in markdown task lists.
//!
//! Acts as a minimal host editor: each command reads a markdown file,
//! builds the edit a user would make, runs it through the workflow engine
//! and prints or writes the result.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use taskstage::core::{Change, Config, Document, Transaction};
use taskstage::workflow::{
    discover_definitions, parse_task_line, transition_options, WorkflowEngine, STAGE_SEPARATOR,
};

/// Multi-stage workflows in markdown task lists
#[derive(Parser)]
#[command(name = "taskstage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default locations
    #[arg(short, long, global = true, env = "TASKSTAGE_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark a task complete and advance its workflow
    Complete {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Print the result instead of writing the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Show the workflow position of a task
    Info {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List the transitions available for a task
    Options {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Move a task to another stage
    Move {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Target stage, optionally with a sub-stage (`stage.sub`)
        #[arg(short, long)]
        to: String,

        /// Print the result instead of writing the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Complete a task on a terminal stage together with its workflow
    Finish {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Print the result instead of writing the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Add a child task at the same stage as a task
    AddChild {
        /// Markdown file
        file: PathBuf,

        /// Line of the task (1-based)
        #[arg(short, long)]
        line: usize,

        /// Print the result instead of writing the file
        #[arg(short, long)]
        dry_run: bool,
    },

    /// List registered workflows
    Workflows {
        /// Validate the definitions
        #[arg(long)]
        check: bool,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry().with(fmt::layer().with_target(false)).with(filter).init();

    match cli.command {
        Commands::Complete { file, line, dry_run } => {
            cmd_complete(&load_engine(cli.config.as_deref())?, &file, line, dry_run)?;
        }
        Commands::Info { file, line, format } => {
            cmd_info(&load_engine(cli.config.as_deref())?, &file, line, format)?;
        }
        Commands::Options { file, line, format } => {
            cmd_options(&load_engine(cli.config.as_deref())?, &file, line, format)?;
        }
        Commands::Move { file, line, to, dry_run } => {
            cmd_move(&load_engine(cli.config.as_deref())?, &file, line, &to, dry_run)?;
        }
        Commands::Finish { file, line, dry_run } => {
            cmd_finish(&load_engine(cli.config.as_deref())?, &file, line, dry_run)?;
        }
        Commands::AddChild { file, line, dry_run } => {
            cmd_add_child(&load_engine(cli.config.as_deref())?, &file, line, dry_run)?;
        }
        Commands::Workflows { check } => {
            cmd_workflows(&load_engine(cli.config.as_deref())?, check)?;
        }
        Commands::Config { path } => {
            cmd_config(cli.config.as_deref(), path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from_file(path),
        None => Config::load(),
    }
}

/// Build the engine from config plus workflow files in the working directory.
fn load_engine(config_path: Option<&Path>) -> Result<WorkflowEngine> {
    let config = load_config(config_path)?;
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let definitions = discover_definitions(&cwd)?;

    tracing::debug!(count = definitions.len(), "Discovered workflow files");
    Ok(WorkflowEngine::new(config).with_definitions(definitions))
}

fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::new(content.replace("\r\n", "\n")))
}

fn check_line(doc: &Document, line: usize) -> Result<()> {
    if line == 0 || line > doc.lines() {
        anyhow::bail!("Line {line} is out of range (document has {} lines)", doc.lines());
    }
    Ok(())
}

fn write_result(path: &Path, doc: &Document, dry_run: bool) -> Result<()> {
    if dry_run {
        print!("{doc}");
        if !doc.as_str().ends_with('\n') {
            println!();
        }
        return Ok(());
    }

    std::fs::write(path, doc.as_str())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Tick a task's checkbox and run the workflow engine over the edit.
fn cmd_complete(engine: &WorkflowEngine, file: &Path, line: usize, dry_run: bool) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let target = doc.line(line);
    let task = parse_task_line(target.text)
        .with_context(|| format!("Line {line} is not a task"))?;

    let statuses = &engine.config().task_statuses;
    if statuses.is_completed(task.status) {
        anyhow::bail!("Task on line {line} is already complete");
    }

    let from = target.from + task.status_range.start;
    let to = target.from + task.status_range.end;
    let tr = Transaction::new(doc, vec![Change::replace(from, to, statuses.completion_marker())]);
    let tr = engine.filter_transaction(tr);

    if !tr.is_augmented() {
        tracing::info!(line, "No workflow transition");
    }

    write_result(file, &tr.apply(), dry_run)?;
    if !dry_run {
        println!("Completed task on line {line}");
    }

    Ok(())
}

/// Show the resolved workflow position of a line.
fn cmd_info(engine: &WorkflowEngine, file: &Path, line: usize, format: OutputFormat) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let resolved = engine
        .resolve(&doc, line)
        .with_context(|| format!("Line {line} is not a workflow task"))?;
    let summary = resolved.summary();

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            println!("Workflow: {} ({})", summary.workflow_name, summary.workflow);
            println!("Stage: {} ({}, {})", summary.stage_name, summary.stage, summary.stage_type);
            if let (Some(id), Some(name)) = (&summary.sub_stage, &summary.sub_stage_name) {
                println!("Sub-stage: {name} ({id})");
            }
            println!("Root task: {}", if summary.is_root_task { "yes" } else { "no" });
        }
    }

    Ok(())
}

/// List the transitions a menu could offer for a line.
fn cmd_options(
    engine: &WorkflowEngine,
    file: &Path,
    line: usize,
    format: OutputFormat,
) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let resolved = engine
        .resolve(&doc, line)
        .with_context(|| format!("Line {line} is not a workflow task"))?;
    let options = transition_options(&resolved);

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&options)?);
        }
        OutputFormat::Text => {
            for option in &options {
                println!("{}", option.label(resolved.workflow));
            }
        }
    }

    Ok(())
}

/// Move a task to a chosen stage.
fn cmd_move(
    engine: &WorkflowEngine,
    file: &Path,
    line: usize,
    to: &str,
    dry_run: bool,
) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let (stage, sub_stage) = match to.split_once(STAGE_SEPARATOR) {
        Some((stage, sub_stage)) => (stage, Some(sub_stage)),
        None => (to, None),
    };

    let tr = engine
        .move_to_stage(&doc, line, stage, sub_stage)
        .with_context(|| format!("Cannot move line {line} to '{to}'"))?;

    write_result(file, &tr.apply(), dry_run)?;
    if !dry_run {
        println!("Moved task on line {line} to {to}");
    }

    Ok(())
}

/// Complete a workflow from its terminal stage task.
fn cmd_finish(engine: &WorkflowEngine, file: &Path, line: usize, dry_run: bool) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let tr = engine
        .complete_workflow(&doc, line)
        .with_context(|| format!("Line {line} is not on a terminal workflow stage"))?;

    write_result(file, &tr.apply(), dry_run)?;
    if !dry_run {
        println!("Completed workflow from line {line}");
    }

    Ok(())
}

/// Add a child task at the stage of a line.
fn cmd_add_child(engine: &WorkflowEngine, file: &Path, line: usize, dry_run: bool) -> Result<()> {
    let doc = read_document(file)?;
    check_line(&doc, line)?;

    let tr = engine
        .add_child_with_same_stage(&doc, line)
        .with_context(|| format!("Cannot add a child task below line {line}"))?;

    write_result(file, &tr.apply(), dry_run)?;
    if !dry_run {
        println!("Added child task below line {line}");
    }

    Ok(())
}

/// List (and optionally validate) workflow definitions.
fn cmd_workflows(engine: &WorkflowEngine, check: bool) -> Result<()> {
    let registry = engine.registry();

    for workflow in registry.iter() {
        println!("{} - {} ({} stages)", workflow.id, workflow.name, workflow.stages.len());
    }

    if check {
        let problems = registry.problems();
        if !problems.is_empty() {
            for problem in &problems {
                eprintln!("  {problem}");
            }
            anyhow::bail!("{} problem(s) found in workflow definitions", problems.len());
        }
        println!("All {} workflows are valid", registry.len());
    }

    Ok(())
}

/// Show configuration.
fn cmd_config(config_path: Option<&Path>, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::config_dir() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let config = load_config(config_path)?;
    let toml = toml::to_string_pretty(&config)?;
    println!("{toml}");

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "taskstage", &mut io::stdout());
}

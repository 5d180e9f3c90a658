mod collaborators;
mod config;
mod domain;
mod driver;
mod executor;
mod outline;
mod prompts;
mod service;
mod state;
mod state_machine;
mod state_store;
mod structured_logger;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use collaborators::local::{
    FileCourseRepository, HashEmbedder, JsonlSourceSearcher, SubprocessModel,
};
use collaborators::{CourseRepository, Embedder};
use config::AppConfig;
use domain::{CourseId, Preferences, TimestampUtc};
use driver::Orchestrator;
use executor::CommandExecutor;
use service::{CourseService, StartRequest};
use state_store::{FileStateStore, StateStore};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use structured_logger::GenerationLogger;

#[derive(Parser)]
#[command(name = "coursegen")]
#[command(about = "Course outline generator: request in, time-budgeted outline out")]
#[command(version)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Path to a YAML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory (defaults to ~/.course-agent)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Start a new course generation and run it to completion
    Start {
        /// The learning request (all arguments are joined)
        #[arg(trailing_var_arg = true, required = true)]
        query: Vec<String>,

        /// Target course duration in hours
        #[arg(long, default_value_t = 2.0)]
        hours: f64,

        /// Preferred depth (free text, e.g. "introductory")
        #[arg(long)]
        depth: Option<String>,

        /// Preferred pace
        #[arg(long)]
        pace: Option<String>,

        /// Preferred style
        #[arg(long)]
        style: Option<String>,

        /// Free-form notes for the planner
        #[arg(long)]
        notes: Option<String>,

        /// Enqueue only; run later with `coursegen resume`
        #[arg(long)]
        no_run: bool,
    },

    /// Resume a pending or crashed course generation
    Resume { course_id: String },

    /// Report generation progress
    Status { course_id: String },

    /// Print the stored course and sections
    Show { course_id: String },

    /// Request cancellation of a running generation
    Cancel { course_id: String },

    /// Remove a course's state record (the stored course, if any, stays)
    Delete { course_id: String },

    /// Remove expired state records
    Sweep,

    /// Embed a source summary into the local search corpus
    AddSource {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        summary: String,
        #[arg(long, default_value_t = 1)]
        version: i64,
    },
}

/// Wiring for the file-backed runtime.
struct App {
    config: AppConfig,
    data_dir: PathBuf,
}

impl App {
    fn new(cli_config: Option<PathBuf>, cli_data_dir: Option<PathBuf>) -> Result<Self> {
        let config = AppConfig::load_or_default(cli_config.as_deref())?;
        let data_dir = match cli_data_dir.or_else(|| config.data_dir.clone()) {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("cannot determine home directory")?
                .join(".course-agent"),
        };
        Ok(Self { config, data_dir })
    }

    fn corpus_path(&self) -> PathBuf {
        self.config
            .corpus_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("sources.jsonl"))
    }

    fn state_store(&self) -> Arc<dyn StateStore> {
        Arc::new(FileStateStore::new(self.data_dir.join("state")))
    }

    fn repository(&self) -> Arc<dyn CourseRepository> {
        Arc::new(FileCourseRepository::new(self.data_dir.join("courses")))
    }

    fn service(&self) -> CourseService {
        CourseService::new(
            self.state_store(),
            self.repository(),
            self.config.generation.clone(),
        )
    }

    fn orchestrator(&self, course_id: &CourseId) -> Result<Orchestrator> {
        let executor = CommandExecutor::new(
            Arc::new(HashEmbedder::new(self.config.embedding.dimension)),
            Arc::new(JsonlSourceSearcher::new(self.corpus_path())),
            Arc::new(SubprocessModel::new(
                self.config.model.command.clone(),
                self.config.model.args.clone(),
            )),
            self.repository(),
            self.config.generation.clone(),
        );
        let logger = Arc::new(GenerationLogger::new(
            &course_id.to_string(),
            &self.data_dir.join("logs"),
        )?);
        tracing::debug!(log = %logger.path().display(), "structured log opened");
        Ok(Orchestrator::new(
            executor,
            self.state_store(),
            logger,
            self.config.generation.clone(),
        ))
    }

    async fn run_course(&self, course_id: &CourseId) -> Result<()> {
        let orchestrator = self.orchestrator(course_id)?;
        let state = orchestrator.run(course_id).await?;
        match state.error_message {
            Some(message) if state.status.public_label() == "error" => {
                eprintln!("course {} failed: {}", course_id, message);
            }
            _ => {
                println!("course {} finished: {}", course_id, state.status);
            }
        }
        Ok(())
    }
}

fn parse_course_id(raw: &str) -> Result<CourseId> {
    CourseId::from_string(raw).with_context(|| format!("invalid course id '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app = App::new(cli.config, cli.data_dir)?;

    match cli.command {
        CliCommand::Start {
            query,
            hours,
            depth,
            pace,
            style,
            notes,
            no_run,
        } => {
            let request = StartRequest {
                query: query.join(" "),
                target_duration_hours: hours,
                preferences: Preferences {
                    depth,
                    pace,
                    style,
                    notes,
                },
            };
            let response = app.service().start(request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            if !no_run {
                app.run_course(&response.course_id).await?;
            }
        }

        CliCommand::Resume { course_id } => {
            let course_id = parse_course_id(&course_id)?;
            app.run_course(&course_id).await?;
        }

        CliCommand::Status { course_id } => {
            let course_id = parse_course_id(&course_id)?;
            let response = app.service().poll(&course_id).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }

        CliCommand::Show { course_id } => {
            let course_id = parse_course_id(&course_id)?;
            let bundle = app.service().retrieve(&course_id).await?;
            println!("{}", serde_json::to_string_pretty(&bundle)?);
        }

        CliCommand::Cancel { course_id } => {
            let course_id = parse_course_id(&course_id)?;
            app.service().cancel(&course_id).await?;
            println!("cancel requested for course {}", course_id);
        }

        CliCommand::Delete { course_id } => {
            let course_id = parse_course_id(&course_id)?;
            app.state_store()
                .delete(&course_id)
                .await
                .map_err(anyhow::Error::new)?;
            println!("removed state record for course {}", course_id);
        }

        CliCommand::Sweep => {
            let store = FileStateStore::new(app.data_dir.join("state"));
            let removed = store.sweep_expired(TimestampUtc::now())?;
            println!("removed {} expired state record(s)", removed);
        }

        CliCommand::AddSource {
            id,
            title,
            summary,
            version,
        } => {
            let embedder = HashEmbedder::new(app.config.embedding.dimension);
            let embedding = embedder
                .embed(&format!("{}\n{}", title, summary))
                .await
                .map_err(anyhow::Error::new)?;
            let entry = serde_json::json!({
                "source_id": id,
                "title": title,
                "summary": summary,
                "version": version,
                "embedding": embedding,
            });
            let corpus = app.corpus_path();
            if let Some(parent) = corpus.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&corpus)?;
            writeln!(file, "{}", entry)?;
            println!("added source '{}' to {}", id, corpus.display());
        }
    }

    Ok(())
}

//! CLI command definitions for article-forge.
//!
//! Every option can also be supplied through the environment, which is how
//! the worker is normally launched (one process per `WORKER_INDEX`).

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::config::{
    parse_worker_index, WorkerConfig, DEFAULT_JOBS_API_URL, DEFAULT_MAX_ATTEMPTS_PER_JOB,
    DEFAULT_MAX_REQUESTS_PER_CREDENTIAL, DEFAULT_MIN_SECONDS_PER_REQUEST, DEFAULT_MODEL,
    DEFAULT_QUOTA_SLEEP_SECONDS, DEFAULT_UNITS_PER_WORKER,
};
use crate::content::slugify;
use crate::credentials::{self, Credential};
use crate::error::ConfigError;
use crate::jobs::{JobClient, JobClientConfig, JobSource};
use crate::llm::{GeminiClient, TextGenerator};
use crate::worker::{RunSummary, WorkerPool};

/// Distributed SEO article worker.
#[derive(Parser)]
#[command(name = "article-forge")]
#[command(about = "Pull article jobs from a queue server and write them with Gemini")]
#[command(version)]
#[command(
    long_about = "article-forge pulls article jobs from a shared queue server, generates an SEO article plus meta description for each, and reports the result back.\n\nEach worker instance uses its own slice of the credential pool, selected by WORKER_INDEX.\n\nExample usage:\n  WORKER_INDEX=0 GEMINI_API_KEY=\"$(cat keys.txt)\" article-forge run"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Process jobs until the queue or this worker's request budget is exhausted.
    Run(RunArgs),

    /// Show which credentials this worker index would use, without running.
    Plan(WorkerArgs),

    /// Print the slug derived from a title.
    Slug(SlugArgs),
}

/// Options shared by `run` and `plan`.
#[derive(Parser, Debug, Clone)]
pub struct WorkerArgs {
    /// Index of this worker instance; selects its credential slice.
    #[arg(long, env = "WORKER_INDEX", default_value = "0")]
    pub worker_index: String,

    /// Newline-separated Gemini API keys (the whole pool, shared by all workers).
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_keys: Option<String>,

    /// Execution units (one per credential) per worker instance.
    #[arg(long, env = "THREADS_PER_WORKER", default_value_t = DEFAULT_UNITS_PER_WORKER)]
    pub units_per_worker: usize,
}

impl WorkerArgs {
    /// Parses the credential pool.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if no pool was given and
    /// `ConfigError::EmptyCredentialPool` if it holds no keys.
    pub fn credential_pool(&self) -> Result<Vec<Credential>, ConfigError> {
        let raw = self
            .api_keys
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("GEMINI_API_KEY".to_string()))?;
        credentials::parse_pool(raw)
    }

    /// Parses the pool and allocates this worker's slice.
    pub fn assigned_credentials(&self) -> Result<Vec<Credential>, ConfigError> {
        let worker_index = parse_worker_index(&self.worker_index)?;
        let pool = self.credential_pool()?;
        credentials::allocate(&pool, worker_index, self.units_per_worker)
    }
}

/// Arguments for `article-forge run`.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub worker: WorkerArgs,

    /// Job server endpoint.
    #[arg(long, env = "JOBS_API_URL", default_value = DEFAULT_JOBS_API_URL)]
    pub jobs_url: String,

    /// Gemini model identifier.
    #[arg(short = 'm', long, env = "GEMINI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Minimum seconds between two requests of one unit.
    #[arg(long, env = "MIN_SECONDS_PER_REQUEST", default_value_t = DEFAULT_MIN_SECONDS_PER_REQUEST)]
    pub min_seconds_per_request: u64,

    /// Generation attempts per job.
    #[arg(long, env = "MAX_RETRIES_PER_TITLE", default_value_t = DEFAULT_MAX_ATTEMPTS_PER_JOB)]
    pub max_attempts: u32,

    /// Wait after a quota error that carries no retry hint, in seconds.
    #[arg(long, env = "DEFAULT_QUOTA_SLEEP_SECONDS", default_value_t = DEFAULT_QUOTA_SLEEP_SECONDS)]
    pub quota_sleep_secs: u64,

    /// Maximum generation requests per credential.
    #[arg(long, env = "MAX_REQUESTS_PER_API", default_value_t = DEFAULT_MAX_REQUESTS_PER_CREDENTIAL)]
    pub max_requests: u32,

    /// Output the run summary as JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl RunArgs {
    /// Builds and validates the worker configuration.
    pub fn to_config(&self) -> Result<WorkerConfig, ConfigError> {
        let worker_index = parse_worker_index(&self.worker.worker_index)?;

        let config = WorkerConfig::new()
            .with_worker_index(worker_index)
            .with_units_per_worker(self.worker.units_per_worker)
            .with_model(self.model.clone())
            .with_min_request_interval(std::time::Duration::from_secs(
                self.min_seconds_per_request,
            ))
            .with_max_attempts_per_job(self.max_attempts)
            .with_default_quota_wait(std::time::Duration::from_secs(self.quota_sleep_secs))
            .with_max_requests_per_credential(self.max_requests)
            .with_jobs(JobClientConfig::new(self.jobs_url.clone()));

        config.validate()?;
        Ok(config)
    }
}

/// Arguments for `article-forge slug`.
#[derive(Parser, Debug)]
pub struct SlugArgs {
    /// Title to convert.
    pub title: String,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse and run in one step.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with pre-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_worker_command(args).await,
        Commands::Plan(args) => run_plan_command(args),
        Commands::Slug(args) => {
            println!("{}", slugify(&args.title));
            Ok(())
        }
    }
}

async fn run_worker_command(args: RunArgs) -> anyhow::Result<()> {
    let config = args.to_config()?;
    let assigned = args.worker.assigned_credentials()?;

    info!(
        worker_index = config.worker_index,
        units = assigned.len(),
        model = %config.model,
        endpoint = %config.jobs.endpoint,
        "Credentials allocated"
    );

    let job_client = JobClient::new(config.jobs.clone()).context("failed to build job client")?;
    let jobs: Arc<dyn JobSource> = Arc::new(job_client);

    let mut generators: Vec<Arc<dyn TextGenerator>> = Vec::with_capacity(assigned.len());
    for credential in assigned {
        let client = GeminiClient::new(credential, config.model.clone(), config.generation_timeout)
            .context("failed to build generation client")?;
        generators.push(Arc::new(client));
    }

    let pool = WorkerPool::new(config, jobs, generators)?;
    let summary = pool.run().await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn run_plan_command(args: WorkerArgs) -> anyhow::Result<()> {
    let worker_index = parse_worker_index(&args.worker_index)?;
    let assigned = args.assigned_credentials()?;

    println!(
        "Worker {} uses {} credential(s):",
        worker_index,
        assigned.len()
    );
    for (unit, credential) in assigned.iter().enumerate() {
        println!(
            "  unit {} -> pool #{} {}",
            unit,
            worker_index * args.units_per_worker + unit,
            credential
        );
    }
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!(
        "\n=== Worker {} finished ===",
        summary.worker_index
    );
    println!("Units:          {}", summary.units);
    println!("Articles done:  {}", summary.succeeded);
    println!("Jobs failed:    {}", summary.failed);
    println!("Requests:       {}", summary.requests);
    println!("Success rate:   {:.1}%", summary.success_rate());
    if summary.panicked_units > 0 {
        println!("Panicked units: {}", summary.panicked_units);
    }
    println!();

    for report in &summary.reports {
        println!(
            "  unit {} [{}] done={} failed={} requests={}",
            report.unit, report.exit_reason, report.succeeded, report.failed, report.requests
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("arguments should parse")
    }

    #[test]
    fn test_run_args_to_config() {
        // Every flag is given so exported env vars cannot leak in.
        let cli = parse(&[
            "article-forge",
            "run",
            "--worker-index",
            "1",
            "--api-keys",
            "a\nb",
            "--units-per-worker",
            "2",
            "--jobs-url",
            "http://localhost:8080/jobs_api.php",
            "--model",
            "gemini-test",
            "--min-seconds-per-request",
            "7",
            "--max-attempts",
            "4",
            "--quota-sleep-secs",
            "90",
            "--max-requests",
            "50",
            "--json",
        ]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        let config = args.to_config().expect("config should be valid");
        assert_eq!(config.worker_index, 1);
        assert_eq!(config.units_per_worker, 2);
        assert_eq!(config.jobs.endpoint, "http://localhost:8080/jobs_api.php");
        assert_eq!(config.model, "gemini-test");
        assert_eq!(config.min_request_interval, Duration::from_secs(7));
        assert_eq!(config.max_attempts_per_job, 4);
        assert_eq!(config.default_quota_wait, Duration::from_secs(90));
        assert_eq!(config.max_requests_per_credential, 50);
        assert!(args.json);
    }

    #[test]
    fn test_run_args_invalid_worker_index() {
        let cli = parse(&["article-forge", "run", "--worker-index", "abc"]);
        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };

        assert!(matches!(
            args.to_config(),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "WORKER_INDEX"
        ));
    }

    #[test]
    fn test_plan_allocates_slice() {
        let cli = parse(&[
            "article-forge",
            "plan",
            "--worker-index",
            "1",
            "--units-per-worker",
            "2",
            "--api-keys",
            "k0\nk1\nk2\nk3\nk4",
        ]);
        let Commands::Plan(args) = cli.command else {
            panic!("expected plan command");
        };

        let assigned = args.assigned_credentials().expect("slice should fit");
        let keys: Vec<&str> = assigned.iter().map(Credential::expose).collect();
        assert_eq!(keys, vec!["k2", "k3"]);
    }

    #[test]
    fn test_plan_rejects_short_pool() {
        let args = WorkerArgs {
            worker_index: "2".to_string(),
            api_keys: Some("k0\nk1\nk2\nk3".to_string()),
            units_per_worker: 3,
        };
        assert!(matches!(
            args.assigned_credentials(),
            Err(ConfigError::InsufficientCredentials { available: 4, .. })
        ));
    }

    #[test]
    fn test_missing_pool_is_config_error() {
        let args = WorkerArgs {
            worker_index: "0".to_string(),
            api_keys: None,
            units_per_worker: 3,
        };
        assert!(matches!(
            args.credential_pool(),
            Err(ConfigError::MissingEnvVar(ref name)) if name == "GEMINI_API_KEY"
        ));
    }

    #[test]
    fn test_slug_command_parses() {
        let cli = parse(&["article-forge", "slug", "Hello World"]);
        assert!(matches!(cli.command, Commands::Slug(SlugArgs { ref title }) if title == "Hello World"));
    }
}

//! Deployment orchestrator CLI
//!
//! Commands:
//! - publish: publish a directory of static files
//! - run: dispatch a compute task
//! - auth: report which credential source resolves
//! - list / remove: inspect or decommission live deployments

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use deploy_orchestrator::{Config, Orchestrator};
use launchpad_common::{DeploymentRequest, TaskDescriptor};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "deploy-orchestrator")]
#[command(about = "Publish artifacts onto the first available hosting backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish every file under a directory
    Publish {
        /// Directory containing the site
        dir: PathBuf,

        #[arg(long)]
        project: String,

        #[arg(long)]
        owner: String,

        /// Custom domain to serve the site from
        #[arg(long)]
        domain: Option<String>,

        /// Overall timeout per backend attempt, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Dispatch a compute task
    Run {
        #[arg(long)]
        project: String,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        task_id: String,

        #[arg(long)]
        manifest_url: Option<String>,

        /// Environment override, repeatable (KEY=VALUE)
        #[arg(long = "env", value_parser = parse_env_pair)]
        env: Vec<(String, String)>,

        /// Try the interactive service before the batch job
        #[arg(long)]
        interactive: bool,

        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show which credential source resolves (never prints the token)
    Auth,

    /// List live deployments
    List,

    /// Decommission a live deployment
    Remove {
        slug: String,
    },
}

fn parse_env_pair(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

/// Collect files under `root` keyed by `/`-separated relative path
fn collect_files(root: &Path) -> Result<BTreeMap<String, String>> {
    fn walk(root: &Path, dir: &Path, files: &mut BTreeMap<String, String>) -> Result<()> {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read {}", dir.display()))?
        {
            let path = entry?.path();
            if path.is_dir() {
                walk(root, &path, files)?;
                continue;
            }

            let relative = path
                .strip_prefix(root)
                .context("File outside publish directory")?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            // Artifacts travel as text; a binary file fails the whole publish
            let content = std::fs::read_to_string(&path).with_context(|| {
                format!("Failed to read {} as UTF-8 text", path.display())
            })?;
            files.insert(relative, content);
        }
        Ok(())
    }

    let mut files = BTreeMap::new();
    walk(root, root, &mut files)?;
    Ok(files)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "deploy_orchestrator=debug,deployment_registry=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    let orchestrator = Orchestrator::from_config(&config).await?;

    match cli.command {
        Commands::Publish {
            dir,
            project,
            owner,
            domain,
            timeout,
        } => {
            let files = collect_files(&dir)?;
            info!("Publishing {} files from {}", files.len(), dir.display());

            let mut request = DeploymentRequest::publish(project, owner, files);
            if let Some(domain) = domain {
                request = request.with_custom_domain(domain);
            }
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(secs));
            }

            let result = orchestrator.publish(&request).await?;
            print_json(&result)?;
        }

        Commands::Run {
            project,
            owner,
            task_id,
            manifest_url,
            env,
            interactive,
            timeout,
        } => {
            let mut task = TaskDescriptor::new(task_id);
            task.manifest_url = manifest_url;
            task.env_overrides = env.into_iter().collect();

            let mut request = DeploymentRequest::compute(project, owner, task);
            if let Some(secs) = timeout {
                request = request.with_timeout(Duration::from_secs(secs));
            }

            let result = orchestrator.dispatch_compute(&request, interactive).await?;
            print_json(&result)?;
        }

        Commands::Auth => match orchestrator.credentials().get_access_token().await {
            Some(credential) => println!("credential available from {}", credential.source()),
            None => println!("no credential available"),
        },

        Commands::List => {
            print_json(&orchestrator.list().await?)?;
        }

        Commands::Remove { slug } => {
            let record = orchestrator
                .decommission(&slug)
                .await
                .with_context(|| format!("Failed to decommission {}", slug))?;
            print_json(&record)?;
        }
    }

    Ok(())
}

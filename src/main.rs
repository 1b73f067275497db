//! `branch-integrator`: integrate a verified branch into a shared integration
//! branch of a local git clone.
//!
//! ## Commands
//!
//! - `integrate`: integrate the relevant change, run the build, publish
//! - `resolve`: show which change would be integrated

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use branch_integrator::coordinator::{Coordinator, IntegrationRequest};
use branch_integrator::error::Outcome;
use branch_integrator::git::{CommitIdentity, GitCli, Repository, run_git_sync};
use branch_integrator::queue::BuildQueue;
use branch_integrator::resolve::resolve;
use branch_integrator::types::{
    Branch, BuildResult, ChangeDescriptor, Identity, IntegrationConfig, Sha, StrategyKind,
};

#[derive(Parser)]
#[command(name = "branch-integrator")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Integrate verified branches into a shared integration branch", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Integrate the relevant change, build it, and publish on success
    Integrate {
        #[command(flatten)]
        request: RequestArgs,

        /// Committer of synthesized commits, as "Name <email>"
        #[arg(long, env = "INTEGRATOR_COMMITTER")]
        committer: String,

        /// GPG key used to sign synthesized commits
        #[arg(long, env = "INTEGRATOR_SIGNING_KEY")]
        signing_key: Option<String>,

        /// Shell command run in the clone to build the integrated result;
        /// exit status 0 counts as success. Without it the build succeeds.
        #[arg(long)]
        build_command: Option<String>,

        /// Write the integration report as JSON to this file
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Show which change would be integrated, without touching the clone
    Resolve {
        #[command(flatten)]
        request: RequestArgs,
    },
}

#[derive(Args)]
struct RequestArgs {
    /// Working clone to integrate in
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Read the whole request from a JSON file instead of flags
    #[arg(long, conflicts_with_all = ["branch", "candidate", "candidates_from"])]
    request: Option<PathBuf>,

    /// Integration branch receiving the change
    #[arg(long, default_value = "master")]
    branch: String,

    /// Remote the integration branch lives on
    #[arg(long, default_value = "origin")]
    remote: String,

    /// fast_forward_only, squash or accumulated
    #[arg(long, default_value = "squash")]
    strategy: StrategyKind,

    /// Worst build result that still publishes
    #[arg(long, default_value = "success")]
    required_result: BuildResult,

    /// Remote-qualified candidate branch, optionally pinned as NAME@REVISION
    #[arg(long)]
    candidate: Vec<String>,

    /// Treat every remote branch named <remote>/<PREFIX>... as a candidate
    #[arg(long, value_name = "PREFIX")]
    candidates_from: Option<String>,

    /// Fetch the integration remote first
    #[arg(long)]
    fetch: bool,
}

fn init_tracing(json: bool, verbose: bool) {
    let default = if verbose {
        "branch_integrator=debug"
    } else {
        "branch_integrator=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.json, cli.verbose);

    match cli.command {
        Commands::Integrate {
            request,
            committer,
            signing_key,
            build_command,
            report,
        } => cmd_integrate(
            &request,
            &committer,
            signing_key,
            build_command.as_deref(),
            report.as_deref(),
        ),
        Commands::Resolve { request } => cmd_resolve(&request),
    }
}

fn cmd_integrate(
    args: &RequestArgs,
    committer: &str,
    signing_key: Option<String>,
    build_command: Option<&str>,
    report_path: Option<&Path>,
) -> Result<ExitCode> {
    let committer = Identity::parse(committer).context("Invalid --committer")?;
    let identity = CommitIdentity {
        signing_key,
        ..CommitIdentity::from(committer)
    };
    let repo = GitCli::new(&args.repo, identity);
    let request = build_request(args, &repo)?;
    let queue = BuildQueue::new();

    let report = Coordinator::new(&repo, &queue).integrate(&request, |prepared| {
        info!(head = %prepared.head().short(), "Building integrated result");
        match build_command {
            Some(command) => run_build(&args.repo, command),
            None => BuildResult::Success,
        }
    });

    print!("{}", report);
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
    }

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn cmd_resolve(args: &RequestArgs) -> Result<ExitCode> {
    // Only read-only queries run here, so no committer is needed
    let repo = GitCli::new(&args.repo, CommitIdentity::new("branch-integrator", "none"));
    let request = build_request(args, &repo)?;

    match resolve(&request.changes, &request.config.integration_remote)? {
        Outcome::Completed(change) => {
            println!("{} {}", change.triggering_branch, change.revision);
        }
        Outcome::NothingToDo { reason } => println!("nothing to integrate: {}", reason),
    }
    Ok(ExitCode::SUCCESS)
}

fn build_request(args: &RequestArgs, repo: &GitCli) -> Result<IntegrationRequest> {
    if let Some(path) = &args.request {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request {}", path.display()))?;
        let request: IntegrationRequest = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid request in {}", path.display()))?;
        if args.fetch {
            fetch(repo, &request.config.integration_remote)?;
        }
        return Ok(request);
    }

    if args.fetch {
        fetch(repo, &args.remote)?;
    }

    let mut changes = Vec::new();
    for spec in &args.candidate {
        changes.push(describe_candidate(repo, spec)?);
    }
    if let Some(prefix) = &args.candidates_from {
        for branch in repo.list_remote_branches()? {
            if branch.short_name().starts_with(prefix.as_str()) {
                let remote = branch.remote.clone().unwrap_or_default();
                let revision = branch.head.clone();
                changes.push(ChangeDescriptor::new(remote, branch, revision));
            }
        }
    }
    if changes.is_empty() {
        warn!("No candidates given; nothing will be integrated");
    }

    Ok(IntegrationRequest {
        config: IntegrationConfig::new(&args.branch, args.strategy).with_remote(&args.remote),
        remotes: vec![],
        changes,
        required_result: args.required_result,
    })
}

/// `origin/ready/x` or `origin/ready/x@<revision>`.
fn describe_candidate(repo: &GitCli, spec: &str) -> Result<ChangeDescriptor> {
    let (name, pinned) = match spec.rsplit_once('@') {
        Some((name, revision)) => match Sha::parse(revision) {
            Ok(sha) => (name, Some(sha)),
            Err(_) => (spec, None),
        },
        None => (spec, None),
    };

    let Some(head) = repo.resolve_ref(name)? else {
        bail!("Candidate branch {} not found in {}", name, repo.workdir().display());
    };
    let branch = Branch::remote_tracking(name, head.clone());
    let Some(remote) = branch.remote.clone() else {
        bail!("Candidate {} is not remote-qualified (expected <remote>/<branch>)", name);
    };
    Ok(ChangeDescriptor::new(remote, branch, pinned.unwrap_or(head)))
}

fn fetch(repo: &GitCli, remote: &str) -> Result<()> {
    info!(remote, "Fetching");
    run_git_sync(repo.workdir(), &["fetch", "--prune", remote])
        .with_context(|| format!("Failed to fetch {}", remote))?;
    Ok(())
}

fn run_build(workdir: &Path, command: &str) -> BuildResult {
    info!(command, "Running build");
    match Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .status()
    {
        Ok(status) if status.success() => BuildResult::Success,
        Ok(status) => {
            warn!(%status, "Build failed");
            BuildResult::Failure
        }
        Err(e) => {
            warn!(error = %e, "Could not start build");
            BuildResult::NotBuilt
        }
    }
}

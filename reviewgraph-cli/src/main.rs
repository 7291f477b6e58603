mod cli;

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use tracing::info;
use uuid::Uuid;

use reviewgraph::checkpoint::list_runs;
use reviewgraph::report::formatter;
use reviewgraph::{
    CheckpointStore, Engine, FIX_GENERATION, FileStore, ReviewScope, RunResult, RunStatus,
    build_review_graph, initial_state, load_config,
};

use cli::{Cli, Command, Format, ScopeArg};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.verbosity.tracing_level_filter())
        .with_writer(io::stderr)
        .init();

    match args.command {
        Command::Review {
            path,
            scope,
            files,
            no_auto_fix,
            severity,
            format,
            output,
            run_id,
            checkpoint_dir,
        } => {
            review(
                path,
                scope,
                files,
                no_auto_fix,
                severity,
                format,
                output,
                run_id,
                checkpoint_dir,
            )
            .await
        }
        Command::Resume {
            run_id,
            reject,
            format,
            output,
            checkpoint_dir,
        } => resume(run_id, reject, format, output, checkpoint_dir).await,
        Command::Runs { checkpoint_dir } => {
            for run in list_runs(&checkpoint_dir)? {
                println!("{run}");
            }
            Ok(())
        }
    }
}

fn interrupts() -> HashSet<String> {
    [FIX_GENERATION.to_string()].into()
}

#[allow(clippy::too_many_arguments)]
async fn review(
    path: PathBuf,
    scope: ScopeArg,
    files: Vec<PathBuf>,
    no_auto_fix: bool,
    severity: Option<reviewgraph::Severity>,
    format: Format,
    output: Option<PathBuf>,
    run_id: Option<String>,
    checkpoint_dir: PathBuf,
) -> anyhow::Result<()> {
    if !path.is_dir() {
        bail!("repository path not found: {}", path.display());
    }

    let mut config = load_config(&path)?;
    if no_auto_fix {
        config.auto_fix.enabled = false;
    }
    if let Some(severity) = severity {
        config.severity_threshold = severity;
    }

    let scope = if files.is_empty() {
        scope.into()
    } else {
        ReviewScope::Files
    };

    let graph = build_review_graph(&config)?;
    let engine = Engine::new(graph, Arc::new(FileStore::new(&checkpoint_dir)));
    let run_id = run_id.unwrap_or_else(|| format!("review-{}", Uuid::new_v4()));

    info!(run_id = %run_id, path = %path.display(), "starting review");
    let state = initial_state(path, scope, files, &config);
    let result = engine.run(state, &run_id, &interrupts()).await?;

    finish(result, &run_id, &checkpoint_dir, format, output)
}

async fn resume(
    run_id: String,
    reject: bool,
    format: Format,
    output: Option<PathBuf>,
    checkpoint_dir: PathBuf,
) -> anyhow::Result<()> {
    let store = FileStore::new(&checkpoint_dir);
    let Some(mut checkpoint) = store.load(&run_id)? else {
        bail!(
            "no checkpoint for run `{run_id}` under {}",
            checkpoint_dir.display()
        );
    };

    if reject {
        // withdraw the approval flag; the fix stage will decline
        checkpoint.state.auto_fix_enabled = false;
        store.save(&checkpoint)?;
        info!(run_id = %run_id, "fix generation rejected");
    }

    let config = load_config(&checkpoint.state.repository_path)
        .context("reloading repository config for resume")?;
    let graph = build_review_graph(&config)?;
    let engine = Engine::new(graph, Arc::new(store));

    info!(run_id = %run_id, stage = %checkpoint.stage, "resuming review");
    let initial = checkpoint.state.clone();
    let result = engine.run(initial, &run_id, &interrupts()).await?;

    finish(result, &run_id, &checkpoint_dir, format, output)
}

fn finish(
    result: RunResult,
    run_id: &str,
    checkpoint_dir: &Path,
    format: Format,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    match result.status {
        RunStatus::Paused => {
            let stage = result.paused_at.as_deref().unwrap_or("<unknown>");
            println!("run `{run_id}` paused before `{stage}` awaiting approval");
            println!(
                "  approve: reviewgraph resume {run_id} --checkpoint-dir {}",
                checkpoint_dir.display()
            );
            println!(
                "  reject:  reviewgraph resume {run_id} --reject --checkpoint-dir {}",
                checkpoint_dir.display()
            );
            Ok(())
        }
        RunStatus::Completed => {
            let fmt = formatter(format == Format::Json, result.state.severity_threshold);
            match output {
                Some(path) => {
                    let mut file = fs::File::create(&path)
                        .with_context(|| format!("creating {}", path.display()))?;
                    fmt.write_report(&result.state, &mut file)?;
                    info!(path = %path.display(), "report written");
                }
                None => {
                    let stdout = io::stdout();
                    fmt.write_report(&result.state, &mut stdout.lock())?;
                }
            }
            Ok(())
        }
    }
}

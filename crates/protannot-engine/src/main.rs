//! protannot - Main entry point

use clap::Parser;
use protannot_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use protannot_engine::cli::{merge_id_files, AnnotateArgs, Cli, Commands};
use protannot_engine::config::EndpointConfig;
use protannot_engine::{Collaborators, Pipeline, RunContext};
use std::process;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

#[tokio::main]
async fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    let log_config = LogConfig::builder()
        .level(level)
        .output(LogOutput::Console)
        .log_file_prefix("protannot")
        .build();

    // Environment variables take precedence
    let log_config = log_config.clone().with_env_overrides().unwrap_or(log_config);

    // The run should not fail because logging could not be set up
    let _ = init_logging(&log_config);

    match execute(cli).await {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    }
}

async fn execute(cli: Cli) -> anyhow::Result<String> {
    match cli.command {
        Commands::Annotate(args) => annotate(args).await,
        Commands::MergeIds {
            first,
            second,
            output,
        } => {
            let merged = merge_id_files(&first, &second, &output).await?;
            Ok(format!("Merged {} identifiers into {}", merged, output.display()))
        },
    }
}

async fn annotate(args: AnnotateArgs) -> anyhow::Result<String> {
    let config = args.to_config(EndpointConfig::from_env());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let ctx = RunContext::prepare(config, cancel).await?;
    let collaborators = Collaborators::from_config(&ctx.config).await?;
    let outcome = Pipeline::new(collaborators).run(&ctx).await?;

    let top = outcome
        .bundle
        .top()
        .map(|t| format!(", top {} ({:.2})", t.go_id, t.score))
        .unwrap_or_default();
    Ok(format!(
        "Annotated '{}' with {} GO terms{} -> {}",
        ctx.query.header,
        outcome.bundle.ranked_terms.len(),
        top,
        ctx.output_dir().display()
    ))
}

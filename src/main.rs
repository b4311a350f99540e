use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;

use blocksync::cli::Cli;
use blocksync::logging::{init_logging, Role};
use blocksync::server::{run_server, ServerConfig};
use blocksync::{sync_push, Endpoint, PushRequest, SyncConfig, SyncReport};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let role = if cli.server.is_some() {
        Role::Server
    } else {
        Role::Client
    };
    if let Err(e) = init_logging(role, cli.verbose) {
        eprintln!("{} {:#}", "warning:".yellow().bold(), e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.apply(SyncConfig::load(cli.config.as_deref())?);
    config.validate()?;

    if let Some(dest) = &cli.server {
        let server_config = ServerConfig {
            dest: dest.clone(),
            block_size: config.block_size,
            algorithm: config.hash,
        };
        run_server(server_config)
            .await
            .with_context(|| format!("serving {} failed", dest))?;
        return Ok(());
    }

    let source = cli.source.clone().context("missing source path")?;
    let host = cli.host.as_deref().context("missing destination host")?;
    let dest = cli
        .dest
        .clone()
        .unwrap_or_else(|| source.to_string_lossy().into_owned());
    let endpoint = Endpoint::parse(host)?;

    tracing::info!(
        "Block size is {:.1} MB",
        config.block_size as f64 / (1024.0 * 1024.0)
    );

    let request = PushRequest {
        source,
        endpoint,
        dest,
        show_progress: !cli.no_progress && !cli.json,
    };
    let report = sync_push(&request, &config)
        .await
        .with_context(|| format!("sync of {} failed", request.source.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &SyncReport) {
    println!(
        "{} same: {}, diff: {}, {}/{} blocks, {} bytes sent in {:.1}s",
        "done".green().bold(),
        report.same_blocks,
        report.diff_blocks,
        report.same_blocks + report.diff_blocks,
        report.block_count,
        report.bytes_sent,
        report.elapsed_secs
    );
}

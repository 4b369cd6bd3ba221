//! `cdist config` and `cdist install`

use crate::Context;
use crate::cli::RunArgs;
use crate::config::Settings;
use crate::progress::TerminalProgress;
use crate::ui;
use anyhow::{Context as _, Result, bail};
use declarative::{ConfigRun, RunMode, RunOptions, RunSummary};
use rayon::prelude::*;
use std::path::PathBuf;
use transport::TargetHost;

/// Configure every host on the command line.
///
/// A failing host does not stop the others; the command fails at the end
/// listing every host that failed.
pub fn run(ctx: &Context, args: &RunArgs, mode: RunMode) -> Result<()> {
    let resolved = Settings::load()?.resolve(args, mode)?;
    let emulator = std::env::current_exe().context("Could not locate the cdist binary")?;
    let options = with_context(resolved.options, ctx, emulator);

    if options.conf_dirs.is_empty() {
        bail!("No configuration directory given (use -c or conf_dir in the config file)");
    }

    let hosts = unique_hosts(&args.hosts);
    let results: Vec<(String, Result<RunSummary>)> = if resolved.parallel > 1 && hosts.len() > 1 {
        log::debug!("Configuring {} hosts, {} at a time", hosts.len(), resolved.parallel);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(resolved.parallel)
            .thread_name(|index| format!("cdist-host-{index}"))
            .build()
            .context("Could not start host workers")?;
        pool.install(|| {
            hosts
                .par_iter()
                .map(|host| (host.clone(), configure_host(ctx, host, &options)))
                .collect()
        })
    } else {
        hosts
            .iter()
            .map(|host| (host.clone(), configure_host(ctx, host, &options)))
            .collect()
    };

    let mut total = RunSummary::default();
    let mut failed = Vec::new();
    for (host, result) in results {
        match result {
            Ok(summary) => total.merge(&summary),
            Err(e) => {
                ui::error(&format!("{host}: {e:#}"));
                failed.push(host);
            }
        }
    }

    if !ctx.quiet {
        print_summary(&total, hosts.len() - failed.len(), options.dry_run);
    }

    if !failed.is_empty() {
        bail!("Failed to configure the following hosts: {}", failed.join(" "));
    }
    Ok(())
}

/// Settings that depend on how cdist itself was started.
///
/// Quiet runs keep no stdout/stderr log files.
fn with_context(mut options: RunOptions, ctx: &Context, emulator: PathBuf) -> RunOptions {
    options.emulator = emulator;
    options.log_level = ctx.log_level;
    if ctx.quiet {
        options.save_output_streams = false;
    }
    options
}

fn configure_host(ctx: &Context, host: &str, options: &RunOptions) -> Result<RunSummary> {
    if ctx.verbose > 0 && !ctx.quiet {
        ui::info(&format!("Configuring {host}"));
    }
    let mut progress = TerminalProgress::new(host, ctx.verbose, ctx.quiet);
    let run = ConfigRun::new(TargetHost::new(host), options.clone())
        .with_context(|| format!("Could not prepare run for {host}"))?;
    let summary = run.run(&mut progress)?;
    if !ctx.quiet {
        ui::success(&format!(
            "{host}: {} objects, {} changed",
            summary.objects, summary.changed
        ));
    }
    Ok(summary)
}

/// Hosts in command line order, each once.
fn unique_hosts(hosts: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    hosts
        .iter()
        .filter(|host| seen.insert(host.as_str()))
        .cloned()
        .collect()
}

fn print_summary(total: &RunSummary, hosts: usize, dry_run: bool) {
    ui::header("Summary");
    ui::kv("Hosts", &hosts.to_string());
    ui::kv("Objects", &total.objects.to_string());
    ui::kv("Changed", &total.changed.to_string());
    ui::kv("Time", &ui::format_duration(total.duration));
    if dry_run {
        ui::dim("dry run, no code was executed");
    }
}

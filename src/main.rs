use anyhow::{Context, Result};
use clap::Parser;
use decomp_scan::cache::DecompileCache;
use decomp_scan::cli::{Cli, Commands, OutputFormat, ScanArgs, rewrite_args_for_implicit_scan};
use decomp_scan::config::{
    build_request, load_settings, resolve_cache_dir, resolve_decompiler, resolve_settings_path,
};
use decomp_scan::decompiler::IlSpy;
use decomp_scan::pipeline::{ScanPipeline, ScanReport};
use decomp_scan::progress::{CancelToken, LogSink};
use env_logger::{Builder, Env, Target};
use std::path::Path;
use std::sync::Arc;

fn main() -> Result<()> {
    let cli = Cli::parse_from(rewrite_args_for_implicit_scan(std::env::args().collect()));
    setup_logging(cli.verbose);

    match cli.command.clone() {
        Commands::Scan(args) => scan(&cli, &args)?,
        Commands::CacheStats => {
            let cache = DecompileCache::open(resolve_cache_dir(&cli)?)?;
            println!("{}", serde_json::to_string_pretty(&cache.stats()?)?);
        }
        Commands::CacheClear => {
            let cache = DecompileCache::open(resolve_cache_dir(&cli)?)?;
            cache.clear()?;
            log::info!("Cleared decompile cache at {}", cache.root().display());
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .target(Target::Stderr)
        .init();
}

fn scan(cli: &Cli, args: &ScanArgs) -> Result<()> {
    let settings = load_settings(&resolve_settings_path(cli)?);
    let request = build_request(args, &settings);

    let decompiler = IlSpy::new(resolve_decompiler(cli));
    if request.include_binary() {
        if let Err(err) = decompiler.locate() {
            log::warn!("{err}; modules will be reported as failed");
        }
    }

    let cache = DecompileCache::open(resolve_cache_dir(cli)?)?;
    let mut pipeline = ScanPipeline::new(cache, Arc::new(decompiler));
    if let Some(jobs) = args.jobs {
        pipeline = pipeline.with_workers(jobs);
    }

    let cancel = CancelToken::new();
    {
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            log::warn!("Cancelling: waiting for running decompilations to finish");
            cancel.cancel();
        }) {
            log::warn!("Failed to install Ctrl-C handler: {err}");
        }
    }

    let report = pipeline.run(&request, &mut LogSink::default(), &cancel);
    write_report(&report, args.format, args.output.as_deref())
}

fn write_report(report: &ScanReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let content = match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => render_text(report),
    };

    if let Some(path) = output {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write results: {}", path.display()))?;
    } else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
    }

    Ok(())
}

fn render_text(report: &ScanReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("phase: {:?}\n", report.phase));
    out.push_str(&format!(
        "files: {} scanned of {}\n",
        report.processed, report.total_files
    ));
    out.push_str(&format!(
        "matches: {} files, {} occurrences\n",
        report.results.len(),
        report.total_occurrences
    ));
    for m in &report.results {
        out.push_str(&format!(
            "- {} [{}] {}",
            m.occurrences,
            m.matched_terms.join(", "),
            m.evidence_path().display()
        ));
        if m.decompiled_path.is_some() {
            out.push_str(&format!(" (from {})", m.source_path.display()));
        }
        if let Some(snippet) = &m.snippet {
            out.push_str(&format!("\n    {snippet}"));
        }
        out.push('\n');
    }
    out
}

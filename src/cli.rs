use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "decomp-scan")]
#[command(about = "Search XML files and decompiled .NET modules for terms")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root of the decompilation cache
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Decompiler executable (path or name on PATH)
    #[arg(long, value_name = "FILE", global = true)]
    pub decompiler: Option<PathBuf>,

    /// Settings file providing defaults for a scan
    #[arg(long, value_name = "FILE", global = true)]
    pub settings: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    Scan(ScanArgs),
    CacheStats,
    CacheClear,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ScanArgs {
    /// Directories to scan, separated by ';'
    #[arg(short, long, value_name = "DIRS")]
    pub dirs: Option<String>,

    /// Search terms, separated by ';'
    #[arg(short, long, value_name = "TERMS")]
    pub terms: Option<String>,

    #[arg(long)]
    pub no_text: bool,

    #[arg(long)]
    pub no_binary: bool,

    /// Module file name to skip (repeatable)
    #[arg(short, long, value_name = "NAME")]
    pub whitelist: Vec<String>,

    /// Concurrent decompilations
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

const SUBCOMMANDS: [&str; 4] = ["scan", "cache-stats", "cache-clear", "help"];
const VALUED_GLOBALS: [&str; 3] = ["--cache-dir", "--decompiler", "--settings"];

/// Inserts `scan` when no subcommand is given, so `decomp-scan --dirs ...`
/// works without naming it.
pub fn rewrite_args_for_implicit_scan(mut args: Vec<String>) -> Vec<String> {
    if args.len() <= 1 {
        args.push("scan".to_string());
        return args;
    }

    let mut idx = 1usize;
    while idx < args.len() {
        let a = args[idx].as_str();
        if VALUED_GLOBALS.contains(&a) {
            idx += 2;
            continue;
        }
        if VALUED_GLOBALS.iter().any(|g| a.starts_with(&format!("{g}="))) {
            idx += 1;
            continue;
        }
        if a == "-v" || a == "--verbose" {
            idx += 1;
            continue;
        }
        break;
    }

    let passthrough = ["-h", "--help", "-V", "--version"];
    match args.get(idx) {
        Some(token) if SUBCOMMANDS.contains(&token.as_str()) => {}
        Some(token) if passthrough.contains(&token.as_str()) => {}
        _ => args.insert(idx.min(args.len()), "scan".to_string()),
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn implicit_scan_skips_global_option_values() {
        let rewritten = rewrite_args_for_implicit_scan(args(&[
            "decomp-scan",
            "--cache-dir",
            "/tmp/c",
            "-v",
            "--dirs",
            "/game",
            "--terms",
            "steel",
        ]));
        assert_eq!(rewritten[4], "scan");
        assert_eq!(rewritten[5], "--dirs");

        let cli = Cli::parse_from(rewritten);
        assert!(cli.verbose);
        match cli.command {
            Commands::Scan(scan) => {
                assert_eq!(scan.dirs.as_deref(), Some("/game"));
                assert_eq!(scan.terms.as_deref(), Some("steel"));
                assert_eq!(scan.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn explicit_subcommands_are_left_alone() {
        let raw = args(&["decomp-scan", "--settings=/s.json", "cache-stats"]);
        assert_eq!(rewrite_args_for_implicit_scan(raw.clone()), raw);
        assert_eq!(
            rewrite_args_for_implicit_scan(args(&["decomp-scan"])),
            args(&["decomp-scan", "scan"])
        );
        assert_eq!(
            rewrite_args_for_implicit_scan(args(&["decomp-scan", "--cache-dir", "/c"])),
            args(&["decomp-scan", "--cache-dir", "/c", "scan"])
        );
    }
}

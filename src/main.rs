use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use php_analyzer::analysis::{FileSummary, analyze_file};
use php_analyzer::config::AnalyzerConfig;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

/// Parses PHP files and reports what the analysis front end sees in them.
#[derive(Parser)]
#[command(name = "php-analyzer", version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
    /// Print one JSON document instead of text lines
    #[arg(long)]
    json: bool,
    /// Files or directories to analyze
    #[arg(required = true)]
    paths: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FileReport {
    Analyzed(FileSummary),
    Failed { path: String, error: String },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AnalyzerConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AnalyzerConfig::default(),
    };

    let files = discover(&cli.paths, &config);
    info!(files = files.len(), "analyzing");

    let reports: Vec<FileReport> = files
        .par_iter()
        .map(|path| match analyze_file(path, &config) {
            Ok(summary) => FileReport::Analyzed(summary),
            Err(error) => FileReport::Failed { path: path.display().to_string(), error: error.to_string() },
        })
        .collect();
    let failed = reports.iter().filter(|r| matches!(r, FileReport::Failed { .. })).count();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
        println!("{} files, {} failed", reports.len(), failed);
    }

    Ok(if failed == 0 { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Explicit file arguments are always analyzed; directories are walked for
/// files with a configured suffix.
fn discover(paths: &[PathBuf], config: &AnalyzerConfig) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
            continue;
        }
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(Result::ok) {
            if entry.file_type().is_file() && config.accepts_file(entry.path()) {
                files.push(entry.into_path());
            } else {
                debug!(path = %entry.path().display(), "skipped");
            }
        }
    }
    files
}

fn print_report(report: &FileReport) {
    match report {
        FileReport::Analyzed(summary) => {
            println!(
                "{}: {} tokens, {} statements, {} symbols, {} functions, {} blocks, {} regex literals",
                summary.path,
                summary.tokens,
                summary.statements,
                summary.symbols,
                summary.functions,
                summary.cfg_blocks,
                summary.regex_literals,
            );
            for error in &summary.regex_errors {
                println!("  regex {error}");
            }
        }
        FileReport::Failed { path, error } => println!("{path}: error: {error}"),
    }
}

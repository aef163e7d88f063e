//! Implementation of the `wp-check` command.

use crate::report::{self, Counts};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use rayon::prelude::*;
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use webpipe_index::{analyze, EngineDiagnostic, IndexOptions, DEFAULT_TEMPLATE_ENGINE};

/// Output format for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output for IDE/tooling integration
    Json,
}

/// A diagnostic message in JSON format.
#[derive(Debug, Serialize)]
pub struct JsonDiagnostic {
    /// Source file path
    pub file: String,
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// End line number (1-based)
    pub end_line: usize,
    /// End column number (1-based)
    pub end_column: usize,
    /// Severity: "error", "warning" or "info"
    pub severity: String,
    /// Diagnostic code (e.g., "P0001", "W1001")
    pub code: String,
    /// Diagnostic message
    pub message: String,
}

/// JSON output structure for all diagnostics.
#[derive(Debug, Serialize)]
pub struct JsonOutput {
    /// List of diagnostics
    pub diagnostics: Vec<JsonDiagnostic>,
    /// Number of files checked
    pub file_count: usize,
    /// Total error count
    pub error_count: usize,
    /// Total warning count
    pub warning_count: usize,
}

/// Diagnostics for one checked file.
#[derive(Debug)]
pub struct FileReport {
    /// Path as given on the command line.
    pub path: String,
    /// File contents.
    pub source: String,
    /// Parse and reference diagnostics.
    pub diagnostics: Vec<EngineDiagnostic>,
}

/// Convert a byte offset to (line, column) in 1-based indexing.
fn byte_offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 1;
    let mut col = 1;
    for (i, ch) in source.char_indices() {
        if i >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Validate webpipe files and report problems.
#[derive(Parser, Debug)]
#[command(name = "wp-check", author, version, about, long_about = None)]
pub struct Args {
    /// The webpipe files to check
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,

    /// Show verbose output including timing information
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress all output (just use exit code)
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format (text or json)
    #[arg(long, short = 'f', value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Variable type and step name that hold template content
    #[arg(long, value_name = "NAME", default_value = DEFAULT_TEMPLATE_ENGINE)]
    pub template_engine: String,
}

/// Read and analyze every file, in parallel.
///
/// Reports come back in the order the paths were given.
pub fn check_files(files: &[PathBuf], options: &IndexOptions) -> Result<Vec<FileReport>> {
    files
        .par_iter()
        .map(|file| {
            let source = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let analysis = analyze(&source, options);
            tracing::debug!(
                file = %file.display(),
                declarations = analysis.program.len(),
                "analyzed"
            );
            Ok(FileReport {
                path: file.display().to_string(),
                diagnostics: analysis.all_diagnostics(),
                source,
            })
        })
        .collect()
}

fn json_diagnostics(reports: &[FileReport]) -> Vec<JsonDiagnostic> {
    reports
        .iter()
        .flat_map(|report| {
            report.diagnostics.iter().map(|diag| {
                let (line, column) = byte_offset_to_line_col(&report.source, diag.span.start);
                let (end_line, end_column) =
                    byte_offset_to_line_col(&report.source, diag.span.end);
                JsonDiagnostic {
                    file: report.path.clone(),
                    line,
                    column,
                    end_line,
                    end_column,
                    severity: diag.severity.as_str().to_string(),
                    code: diag.code.clone(),
                    message: diag.message.clone(),
                }
            })
        })
        .collect()
}

/// Run the check and write its output.
///
/// Returns exit code 1 when any file has an error-severity diagnostic.
pub fn run<W: Write>(args: &Args, writer: &mut W, color: bool) -> Result<ExitCode> {
    let start = std::time::Instant::now();
    let options = IndexOptions {
        template_engine: args.template_engine.clone(),
    };

    let reports = check_files(&args.files, &options)?;

    let mut counts = Counts::default();
    for file in &reports {
        counts.add(Counts::of(&file.diagnostics));
    }

    match args.format {
        OutputFormat::Json => {
            let output = JsonOutput {
                diagnostics: json_diagnostics(&reports),
                file_count: reports.len(),
                error_count: counts.errors,
                warning_count: counts.warnings,
            };
            writeln!(writer, "{}", serde_json::to_string_pretty(&output)?)?;
        }
        OutputFormat::Text if !args.quiet => {
            for file in &reports {
                report::report_diagnostics(
                    &file.diagnostics,
                    &file.path,
                    &file.source,
                    color,
                    writer,
                )?;
            }
            if args.verbose {
                writeln!(
                    writer,
                    "\nChecked {} file(s) in {:.2}ms",
                    reports.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                )?;
            }
            report::print_summary(reports.len(), counts, writer)?;
        }
        OutputFormat::Text => {}
    }

    if counts.errors > 0 {
        Ok(ExitCode::from(1))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Main entry point for the check command.
pub fn main() -> ExitCode {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_writer(io::stderr)
            .init();
    }

    let color = matches!(args.format, OutputFormat::Text) && io::stdout().is_terminal();
    let mut stdout = io::stdout().lock();

    match run(&args, &mut stdout, color) {
        Ok(exit_code) => exit_code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

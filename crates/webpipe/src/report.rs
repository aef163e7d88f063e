//! Error reporting with source context.
//!
//! Uses ariadne for pretty-printed diagnostics.

use ariadne::{ColorGenerator, Config, Label, Report, ReportKind, Source};
use std::io::Write;
use webpipe_core::Severity;
use webpipe_index::EngineDiagnostic;

/// Counts of diagnostics by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    /// Error-severity diagnostics.
    pub errors: usize,
    /// Warning-severity diagnostics.
    pub warnings: usize,
}

impl Counts {
    /// Tally a list of diagnostics.
    #[must_use]
    pub fn of(diagnostics: &[EngineDiagnostic]) -> Self {
        let mut counts = Self::default();
        for diag in diagnostics {
            match diag.severity {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => {}
            }
        }
        counts
    }

    /// Add another tally to this one.
    pub fn add(&mut self, other: Self) {
        self.errors += other.errors;
        self.warnings += other.warnings;
    }
}

const fn report_kind(severity: Severity) -> ReportKind<'static> {
    match severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
        Severity::Info => ReportKind::Advice,
    }
}

/// Report diagnostics for one file to the given writer.
pub fn report_diagnostics<W: Write>(
    diagnostics: &[EngineDiagnostic],
    path: &str,
    source: &str,
    color: bool,
    writer: &mut W,
) -> std::io::Result<Counts> {
    let mut colors = ColorGenerator::new();

    for diag in diagnostics {
        // Spans from a stale or truncated buffer are clamped to the text.
        let start = diag.span.start.min(source.len());
        let end = diag.span.end.clamp(start, source.len());

        let mut label = Label::new((path, start..end)).with_message(diag.severity.as_str());
        if color {
            label = label.with_color(colors.next());
        }

        Report::build(report_kind(diag.severity), (path, start..end))
            .with_code(&diag.code)
            .with_message(&diag.message)
            .with_label(label)
            .with_config(Config::default().with_compact(false).with_color(color))
            .finish()
            .write((path, Source::from(source)), &mut *writer)?;
    }

    Ok(Counts::of(diagnostics))
}

/// Print a summary of errors and warnings.
pub fn print_summary<W: Write>(
    files: usize,
    counts: Counts,
    writer: &mut W,
) -> std::io::Result<()> {
    let Counts { errors, warnings } = counts;
    let file_text = if files == 1 { "file" } else { "files" };

    if errors == 0 && warnings == 0 {
        writeln!(writer, "\u{2713} No problems found in {files} {file_text}")?;
        return Ok(());
    }

    let error_text = if errors == 1 { "error" } else { "errors" };
    let warning_text = if warnings == 1 { "warning" } else { "warnings" };

    if errors > 0 && warnings > 0 {
        writeln!(
            writer,
            "\u{2717} {errors} {error_text}, {warnings} {warning_text} in {files} {file_text}"
        )
    } else if errors > 0 {
        writeln!(writer, "\u{2717} {errors} {error_text} in {files} {file_text}")
    } else {
        writeln!(writer, "\u{26A0} {warnings} {warning_text} in {files} {file_text}")
    }
}

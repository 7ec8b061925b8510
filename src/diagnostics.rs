use std::fmt;
use std::io::IsTerminal;
use std::ops::Range;
use std::path::Path;

use ariadne::{Config, Label, Report, ReportKind, Source};

use crate::generator::GenerationError;
use crate::parser::ParseError;
use crate::scanner::LexError;
use crate::TranspileError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticStage {
    Scan,
    Parse,
    Generate,
    Io,
}

impl fmt::Display for DiagnosticStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticStage::Scan => "scan",
            DiagnosticStage::Parse => "parse",
            DiagnosticStage::Generate => "generate",
            DiagnosticStage::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceLabel {
    pub span: Range<usize>,
    pub message: String,
}

/// A stage failure tied to the one source file being translated.
#[derive(Clone, Debug)]
pub struct CompilerDiagnostic {
    pub code: &'static str,
    pub stage: DiagnosticStage,
    pub message: String,
    pub file_id: String,
    pub source: String,
    pub labels: Vec<SourceLabel>,
    pub notes: Vec<String>,
}

impl CompilerDiagnostic {
    pub fn new(code: &'static str, stage: DiagnosticStage, message: impl Into<String>) -> Self {
        Self {
            code,
            stage,
            message: message.into(),
            file_id: file_id_from_path(None),
            source: String::new(),
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_source(mut self, source_path: Option<&Path>, source: &str) -> Self {
        self.file_id = file_id_from_path(source_path);
        self.source = source.to_string();
        self
    }

    pub fn with_label(mut self, span: Range<usize>, message: impl Into<String>) -> Self {
        self.labels.push(SourceLabel {
            span,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn render_plain(&self) -> String {
        self.render_with_color(false)
    }

    pub fn render_terminal_auto(&self) -> String {
        self.render_with_color(std::io::stderr().is_terminal())
    }

    fn render_with_color(&self, use_color: bool) -> String {
        let primary_span = match self.labels.first() {
            Some(label) => sanitize_span(&label.span),
            None => 0..next_char_boundary(&self.source, 0),
        };
        let id = self.file_id.as_str();

        let mut report = Report::build(ReportKind::Error, (id, primary_span))
            .with_code(self.code)
            .with_message(format!("error[{}]: {}", self.stage, self.message))
            .with_config(Config::default().with_color(use_color));
        for label in &self.labels {
            report = report.with_label(
                Label::new((id, sanitize_span(&label.span))).with_message(&label.message),
            );
        }
        for note in &self.notes {
            report = report.with_note(note);
        }

        let mut output = Vec::new();
        match report
            .finish()
            .write((id, Source::from(self.source.as_str())), &mut output)
        {
            Ok(()) => String::from_utf8_lossy(&output).trim_end().to_string(),
            Err(_) => self.fallback_render(),
        }
    }

    fn fallback_render(&self) -> String {
        let mut out = format!("error[{}:{}]: {}", self.stage, self.code, self.message);
        for note in &self.notes {
            out.push_str("\nnote: ");
            out.push_str(note);
        }
        out
    }
}

impl fmt::Display for CompilerDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_plain())
    }
}

pub fn diagnostic_from_lex_error(
    source: &str,
    source_path: Option<&Path>,
    error: &LexError,
) -> CompilerDiagnostic {
    let start = error.position.offset;
    let span = start..next_char_boundary(source, start);
    CompilerDiagnostic::new("JSPY-SCAN-001", DiagnosticStage::Scan, "scanning failed")
        .with_source(source_path, source)
        .with_label(span, "no token pattern matches here")
        .with_note(format!(
            "at line {}, column {}",
            error.position.line, error.position.column
        ))
}

pub fn diagnostic_from_parse_error(
    source: &str,
    source_path: Option<&Path>,
    error: &ParseError,
) -> CompilerDiagnostic {
    let span = error.span().unwrap_or_else(|| end_of_input_span(source));
    CompilerDiagnostic::new("JSPY-PARSE-001", DiagnosticStage::Parse, "parsing failed")
        .with_source(source_path, source)
        .with_label(span, error.to_string())
}

pub fn diagnostic_from_generation_error(
    source: &str,
    source_path: Option<&Path>,
    error: &GenerationError,
) -> CompilerDiagnostic {
    CompilerDiagnostic::new(
        "JSPY-GENERATE-001",
        DiagnosticStage::Generate,
        "code generation failed",
    )
    .with_source(source_path, source)
    .with_note(error.to_string())
}

pub fn diagnostic_from_transpile_error(
    source: &str,
    source_path: Option<&Path>,
    error: &TranspileError,
) -> CompilerDiagnostic {
    match error {
        TranspileError::Lex(error) => diagnostic_from_lex_error(source, source_path, error),
        TranspileError::Parse(error) => diagnostic_from_parse_error(source, source_path, error),
        TranspileError::Generate(error) => {
            diagnostic_from_generation_error(source, source_path, error)
        }
    }
}

pub fn diagnostic_from_anyhow(
    stage: DiagnosticStage,
    code: &'static str,
    message: impl Into<String>,
    error: &anyhow::Error,
) -> CompilerDiagnostic {
    let mut diagnostic = CompilerDiagnostic::new(code, stage, message);
    let mut causes = error.chain();
    if let Some(primary) = causes.next() {
        diagnostic.message = format!("{}: {}", diagnostic.message, primary);
    }
    for cause in causes {
        diagnostic = diagnostic.with_note(format!("caused by: {cause}"));
    }
    diagnostic
}

pub fn file_id_from_path(path: Option<&Path>) -> String {
    path.map(|value| value.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}

pub fn sanitize_span(span: &Range<usize>) -> Range<usize> {
    if span.end <= span.start {
        span.start..span.start.saturating_add(1)
    } else {
        span.clone()
    }
}

/// The last non-whitespace character, where a missing token is reported.
fn end_of_input_span(source: &str) -> Range<usize> {
    match source.trim_end().char_indices().last() {
        Some((idx, c)) => idx..idx + c.len_utf8(),
        None => 0..0,
    }
}

pub fn next_char_boundary(source: &str, start: usize) -> usize {
    if start >= source.len() {
        return start.saturating_add(1);
    }
    let mut iter = source[start..].char_indices();
    let _ = iter.next();
    if let Some((delta, _)) = iter.next() {
        start + delta
    } else {
        source.len()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::scanner::scan;
    use crate::{transpile, GeneratorOptions};

    #[test]
    fn lex_error_conversion_marks_error_byte() {
        let source = "function main() {\n\t#\n}\n";
        let err = scan(source).expect_err("scanner should fail");
        let diagnostic = diagnostic_from_lex_error(source, None, &err);
        assert_eq!(diagnostic.labels.len(), 1);
        let span = diagnostic.labels[0].span.clone();
        assert_eq!(&source[span], "#");
        assert_eq!(diagnostic.notes, vec!["at line 2, column 2"]);
    }

    #[test]
    fn parse_error_at_end_points_at_last_character() {
        let source = "function main() {\n\tprint(1);\n";
        let err = transpile(source, &GeneratorOptions::default()).expect_err("missing brace");
        let diagnostic = diagnostic_from_transpile_error(source, Some(Path::new("a.js")), &err);
        assert_eq!(diagnostic.stage, DiagnosticStage::Parse);
        assert_eq!(diagnostic.file_id, "a.js");
        assert_eq!(&source[diagnostic.labels[0].span.clone()], ";");
        assert!(diagnostic.labels[0].message.contains("`}`"));
    }

    #[test]
    fn generation_error_has_no_labels() {
        let source = "var def = 1;";
        let err = transpile(source, &GeneratorOptions::default()).expect_err("reserved name");
        let diagnostic = diagnostic_from_transpile_error(source, None, &err);
        assert_eq!(diagnostic.code, "JSPY-GENERATE-001");
        assert!(diagnostic.labels.is_empty());
        let text = diagnostic.render_plain();
        assert!(text.contains("code generation failed"));
        assert!(text.contains("`def` is a reserved word"));
        assert!(!text.to_lowercase().contains("help"));
    }

    #[test]
    fn plain_rendering_does_not_contain_ansi_sequences() {
        let source = "print(1)";
        let err = transpile(source, &GeneratorOptions::default()).expect_err("missing `;`");
        let text = diagnostic_from_transpile_error(source, None, &err).render_plain();
        assert!(!text.contains("\u{1b}["));
        assert!(text.contains("JSPY-PARSE-001"));
        assert!(text.contains("<memory>"));
    }

    #[test]
    fn anyhow_chain_becomes_notes() {
        let error = anyhow::anyhow!("disk on fire").context("failed to read a.js");
        let diagnostic =
            diagnostic_from_anyhow(DiagnosticStage::Io, "JSPY-IO-001", "io failed", &error);
        assert_eq!(diagnostic.message, "io failed: failed to read a.js");
        assert_eq!(diagnostic.notes, vec!["caused by: disk on fire"]);
        assert!(diagnostic.render_plain().contains("io failed"));
    }
}

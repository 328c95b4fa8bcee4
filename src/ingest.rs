use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use csv::{Position, ReaderBuilder};
use tracing::{debug, info, warn};

use crate::config::InputFormat;
use crate::handler::HandlerRegistry;
use crate::record::{BuildInfo, CanonicalRecord};
use crate::suite::Suite;

const SNIFF_BYTES: usize = 1024;
const DELIMITER_CANDIDATES: [u8; 4] = [b',', b'\t', b';', b'|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// A line or row could not be normalized and was skipped.
    Parse,
    /// No registered handler accepted the suite.
    UnhandledSuite,
    /// The suite has no charts at all.
    EmptySuite,
    /// Charts exist but none survived filtering.
    NoRenderableCharts,
    /// The JSON build info line was unreadable.
    BuildInfo,
}

impl std::fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiagnosticKind::Parse => write!(f, "parse"),
            DiagnosticKind::UnhandledSuite => write!(f, "unhandled-suite"),
            DiagnosticKind::EmptySuite => write!(f, "empty-suite"),
            DiagnosticKind::NoRenderableCharts => write!(f, "no-renderable-charts"),
            DiagnosticKind::BuildInfo => write!(f, "build-info"),
        }
    }
}

/// Non-fatal finding collected while loading or rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// 0-based line (JSON) or row (CSV) number.
    pub line: Option<usize>,
    pub content: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            line: None,
            content: None,
        }
    }

    pub fn at_line(mut self, line: usize, content: Option<String>) -> Self {
        self.line = Some(line);
        self.content = content;
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] ", self.kind)?;
        if let Some(line) = self.line {
            write!(f, "line {line}: ")?;
        }
        write!(f, "{}", self.message)?;
        if let Some(content) = &self.content {
            write!(f, "\n    {content}")?;
        }
        Ok(())
    }
}

/// Everything loaded from one input file.
#[derive(Debug)]
pub struct Report {
    pub source: PathBuf,
    pub format: InputFormat,
    pub build: Option<Arc<BuildInfo>>,
    pub suites: Vec<Suite>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    pub fn suite(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|suite| suite.name() == name)
    }

    /// Suites a handler was bound to.
    pub fn handled_suites(&self) -> impl Iterator<Item = &Suite> + '_ {
        self.suites.iter().filter(|suite| suite.handler().is_some())
    }

    pub fn diagnostics_of(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.diagnostics
            .iter()
            .filter(move |diagnostic| diagnostic.kind == kind)
    }
}

/// Pick the input format: explicit choice, then extension, then content.
pub fn detect_format(path: &Path, text: &str, explicit: Option<InputFormat>) -> InputFormat {
    if let Some(format) = explicit {
        return format;
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("csv") => return InputFormat::Csv,
        Some("json" | "jsonl" | "ndjson") => return InputFormat::Json,
        _ => {}
    }
    match text.trim_start().as_bytes().first() {
        Some(b'{') => InputFormat::Json,
        _ => InputFormat::Csv,
    }
}

/// Guess the CSV delimiter from the start of `text`.
///
/// A candidate qualifies when it occurs the same, non-zero number of times on
/// every complete sampled line. The highest count wins; ties keep candidate
/// order. Falls back to `,`.
pub fn sniff_delimiter(text: &str) -> u8 {
    let bytes = text.as_bytes();
    let truncated = bytes.len() > SNIFF_BYTES;
    let sample = &bytes[..bytes.len().min(SNIFF_BYTES)];

    let mut lines: Vec<&[u8]> = sample.split(|byte| *byte == b'\n').collect();
    if truncated && lines.len() > 1 {
        lines.pop();
    }
    let lines: Vec<&[u8]> = lines
        .into_iter()
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return b',';
    }

    let mut best: Option<(u8, usize)> = None;
    for candidate in DELIMITER_CANDIDATES {
        let mut counts = lines
            .iter()
            .map(|line| line.iter().filter(|byte| **byte == candidate).count());
        let Some(first) = counts.next() else {
            continue;
        };
        if first == 0 || !counts.all(|count| count == first) {
            continue;
        }
        if best.is_none_or(|(_, count)| first > count) {
            best = Some((candidate, first));
        }
    }
    best.map_or(b',', |(delimiter, _)| delimiter)
}

struct Parsed {
    build: Option<Arc<BuildInfo>>,
    records: Vec<CanonicalRecord>,
    diagnostics: Vec<Diagnostic>,
}

fn parse_failure(
    source: &Path,
    line: usize,
    content: Option<String>,
    err: &anyhow::Error,
) -> Diagnostic {
    warn!(
        source = %source.display(),
        line,
        error = %format!("{err:#}"),
        "skipping malformed record"
    );
    Diagnostic::new(
        DiagnosticKind::Parse,
        format!("skipping due to a parse error: {err:#}"),
    )
    .at_line(line, content)
}

/// The source line a CSV record starts on, without its line terminator.
fn raw_line(text: &str, position: &Position) -> Option<String> {
    let rest = text.get(position.byte() as usize..)?;
    Some(rest.lines().next().unwrap_or_default().to_string())
}

fn parse_csv(source: &Path, text: &str) -> Parsed {
    let delimiter = sniff_delimiter(text);
    debug!(
        source = %source.display(),
        delimiter = %char::from(delimiter).escape_default(),
        "sniffed CSV dialect"
    );

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut header: Option<Vec<String>> = None;
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();

    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(err) => {
                let line = err
                    .position()
                    .map(|position| position.line().saturating_sub(1) as usize)
                    .unwrap_or(index);
                let content = err.position().and_then(|position| raw_line(text, position));
                diagnostics.push(parse_failure(source, line, content, &anyhow::Error::new(err)));
                continue;
            }
        };
        let line = row
            .position()
            .map(|position| position.line().saturating_sub(1) as usize)
            .unwrap_or(index);

        let Some(names) = &header else {
            header = Some(row.iter().map(str::to_string).collect());
            continue;
        };

        match CanonicalRecord::from_csv_row(&row, names) {
            Ok(record) => records.push(record),
            Err(err) => {
                let content = row.position().and_then(|position| raw_line(text, position));
                diagnostics.push(parse_failure(source, line, content, &err));
            }
        }
    }

    Parsed {
        build: None,
        records,
        diagnostics,
    }
}

fn parse_json(source: &Path, text: &str) -> Parsed {
    let mut build = None;
    let mut seen_build_line = false;
    let mut records = Vec::new();
    let mut diagnostics = Vec::new();

    for (line, content) in text.lines().enumerate() {
        if content.trim().is_empty() {
            continue;
        }

        if !seen_build_line {
            seen_build_line = true;
            match BuildInfo::from_json_line(content) {
                Ok(info) => {
                    debug!(
                        source = %source.display(),
                        device = %info.describe(),
                        "read build info"
                    );
                    build = Some(Arc::new(info));
                }
                Err(err) => {
                    warn!(
                        source = %source.display(),
                        line,
                        error = %format!("{err:#}"),
                        "unreadable build info"
                    );
                    diagnostics.push(
                        Diagnostic::new(
                            DiagnosticKind::BuildInfo,
                            format!("unreadable build info: {err:#}"),
                        )
                        .at_line(line, Some(content.to_string())),
                    );
                }
            }
            continue;
        }

        match CanonicalRecord::from_json_line(content) {
            Ok(record) => records.push(record),
            Err(err) => {
                diagnostics.push(parse_failure(source, line, Some(content.to_string()), &err));
            }
        }
    }

    Parsed {
        build,
        records,
        diagnostics,
    }
}

/// Split records into per-suite lists, suites in order of first appearance.
fn group_by_suite(records: Vec<CanonicalRecord>) -> Vec<(String, Vec<CanonicalRecord>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<CanonicalRecord>)> = Vec::new();
    for record in records {
        let slot = match index.get(&record.suite_id) {
            Some(slot) => *slot,
            None => {
                index.insert(record.suite_id.clone(), groups.len());
                groups.push((record.suite_id.clone(), Vec::new()));
                groups.len() - 1
            }
        };
        groups[slot].1.push(record);
    }
    groups
}

/// Build a report from already-read log text.
pub fn report_from_text(
    source: &Path,
    text: &str,
    format: Option<InputFormat>,
    registry: &HandlerRegistry,
) -> Report {
    let format = detect_format(source, text, format);
    let Parsed {
        build,
        records,
        mut diagnostics,
    } = match format {
        InputFormat::Csv => parse_csv(source, text),
        InputFormat::Json => parse_json(source, text),
    };

    let mut suites = Vec::new();
    for (name, entries) in group_by_suite(records) {
        let mut suite = Suite::new(name, source, build.clone(), entries);
        if !suite.bind(registry) {
            info!(suite = %suite.name(), source = %source.display(), "found no handler for suite");
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::UnhandledSuite,
                format!(
                    "Found no handler for suite_id \"{}\" in \"{}\"",
                    suite.name(),
                    source.display()
                ),
            ));
        }
        suites.push(suite);
    }

    debug!(
        source = %source.display(),
        %format,
        suites = suites.len(),
        diagnostics = diagnostics.len(),
        "loaded report"
    );

    Report {
        source: source.to_path_buf(),
        format,
        build,
        suites,
        diagnostics,
    }
}

/// Read a captured log from disk and turn it into dispatched suites.
/// Only I/O failures are errors.
pub fn load_report(
    path: &Path,
    format: Option<InputFormat>,
    registry: &HandlerRegistry,
) -> Result<Report> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read log file {}", path.display()))?;
    Ok(report_from_text(path, &text, format, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MEMORY_CSV: &str = "\
suite_id,timestamp,operation_id,token,value
Memory allocation,1000000000,MemoryAllocOperation,total_allocation_bytes,1048576
Memory allocation,2000000000,MemoryAllocOperation,sys_mem_info.available_memory,2097152
Memory allocation,3000000000,MemoryAllocOperation,total_allocation_bytes,4194304
";

    #[test]
    fn detects_format_from_flag_extension_and_content() {
        let csv = Path::new("run.csv");
        let json = Path::new("run.ndjson");
        let bare = Path::new("run.log");
        assert_eq!(detect_format(csv, "{", None), InputFormat::Csv);
        assert_eq!(detect_format(json, "a,b", None), InputFormat::Json);
        assert_eq!(detect_format(bare, "\n  {\"build\":{}}", None), InputFormat::Json);
        assert_eq!(detect_format(bare, "suite_id,timestamp", None), InputFormat::Csv);
        assert_eq!(
            detect_format(csv, "a,b", Some(InputFormat::Json)),
            InputFormat::Json
        );
    }

    #[test]
    fn sniffs_consistent_delimiters() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("a\tb\n1\t2\n"), b'\t');
        assert_eq!(sniff_delimiter("a|b,c\n1|2,3\n"), b',');
        assert_eq!(sniff_delimiter("a,b;c;d\n1,2;3;4\n"), b';');
        assert_eq!(sniff_delimiter("single\ncolumn\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn sniffing_ignores_truncated_last_line() {
        let mut text = String::from("a;b\n");
        while text.len() < SNIFF_BYTES + 10 {
            text.push_str("1;2\n");
        }
        text.insert_str(SNIFF_BYTES - 2, ";;;");
        let last_complete = text[..SNIFF_BYTES].rfind('\n').unwrap();
        assert!(last_complete < SNIFF_BYTES - 2);
        assert_eq!(sniff_delimiter(&text), b';');
    }

    #[test]
    fn loads_csv_suites_and_binds_handlers() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("memory.csv");
        fs::write(&path, MEMORY_CSV).unwrap();

        let report = load_report(&path, None, &HandlerRegistry::builtin()).unwrap();
        assert_eq!(report.format, InputFormat::Csv);
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.suites.len(), 1);

        let suite = report.suite("Memory allocation").unwrap();
        assert_eq!(suite.handler_name(), Some("memory-allocation"));
        assert_eq!(suite.charts().len(), 2);
        assert_eq!(suite.source(), path.as_path());
    }

    #[test]
    fn malformed_row_is_skipped_with_one_diagnostic() {
        let text = "\
suite_id,timestamp,operation_id,token,value
Memory allocation,1000000000,MemoryAllocOperation,total_allocation_bytes,1
Memory allocation,not-a-time,MemoryAllocOperation,total_allocation_bytes,2
Memory allocation,3000000000,MemoryAllocOperation,total_allocation_bytes,3
";
        let report = report_from_text(
            Path::new("broken.csv"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert_eq!(report.diagnostics.len(), 1);
        let diagnostic = &report.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::Parse);
        assert_eq!(diagnostic.line, Some(2));
        assert_eq!(
            diagnostic.content.as_deref(),
            Some("Memory allocation,not-a-time,MemoryAllocOperation,total_allocation_bytes,2")
        );
        assert_eq!(report.suites[0].entries().len(), 2);
    }

    #[test]
    fn short_row_is_skipped_with_one_diagnostic() {
        let text = "\
suite_id,timestamp,operation_id,token,value
Memory allocation,1000000000,MemoryAllocOperation
Memory allocation,2000000000,MemoryAllocOperation,total_allocation_bytes,2
";
        let report = report_from_text(
            Path::new("short.csv"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].line, Some(1));
        assert_eq!(report.suites.len(), 1);
        assert_eq!(report.suites[0].entries().len(), 1);
    }

    #[test]
    fn parse_diagnostic_keeps_the_raw_line() {
        let text = "\
suite_id;timestamp;operation_id;token;value\r
\"Memory allocation\";\"soon\";MemoryAllocOperation;total_allocation_bytes;1\r
Memory allocation;2000000000;MemoryAllocOperation;total_allocation_bytes;2\r
";
        let report = report_from_text(
            Path::new("quoted.csv"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(
            report.diagnostics[0].content.as_deref(),
            Some("\"Memory allocation\";\"soon\";MemoryAllocOperation;total_allocation_bytes;1")
        );
    }

    #[test]
    fn header_does_not_limit_row_width() {
        let text = "\
suite_id,timestamp,operation_id,token,value
Memory allocation,1000000000,MemoryAllocOperation,total_allocation_bytes,1,cpu3
Memory allocation,2000000000,MemoryAllocOperation,total_allocation_bytes,2,cpu3
";
        let report = report_from_text(
            Path::new("wide.csv"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert!(report.diagnostics.is_empty());
        let suite = report.suite("Memory allocation").unwrap();
        assert_eq!(suite.entries().len(), 2);
        assert_eq!(
            suite.entries()[0].custom_field("column_5").map(|value| value.to_string()),
            Some("cpu3".to_string())
        );
    }

    #[test]
    fn header_content_is_not_validated() {
        let text = "\
# memory run
Memory allocation,1000000000,MemoryAllocOperation,total_allocation_bytes,1
Memory allocation,2000000000,MemoryAllocOperation,total_allocation_bytes,2
";
        let report = report_from_text(
            Path::new("titled.csv"),
            text,
            Some(InputFormat::Csv),
            &HandlerRegistry::builtin(),
        );
        assert!(report.diagnostics.is_empty());
        assert_eq!(report.suites.len(), 1);
        assert_eq!(report.suites[0].entries().len(), 2);
    }

    #[test]
    fn unhandled_suite_is_reported_not_fatal() {
        let text = "\
suite_id,timestamp,operation_id,token,value
Mystery workload,1,SomeOperation,metric,1
";
        let report = report_from_text(
            Path::new("mystery.csv"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert_eq!(report.suites.len(), 1);
        assert!(report.suites[0].charts().is_empty());
        assert_eq!(report.handled_suites().count(), 0);
        let unhandled: Vec<&Diagnostic> = report
            .diagnostics_of(DiagnosticKind::UnhandledSuite)
            .collect();
        assert_eq!(unhandled.len(), 1);
        assert_eq!(
            unhandled[0].message,
            "Found no handler for suite_id \"Mystery workload\" in \"mystery.csv\""
        );
    }

    #[test]
    fn json_reports_carry_build_info() {
        let text = r#"{"build":{"MANUFACTURER":"Google","MODEL":"Pixel 5","SDK_INT":33}}
{"suite_id":"Thermal soak","operation_id":"ThermalOperation","timestamp":0,"field":"temperature_celsius","value":41.5}

{"suite_id":"Thermal soak","operation_id":"ThermalOperation","timestamp":1000000000,"custom":{"temperature_celsius":43.0}}
{"suite_id": "Thermal soak", "timestamp": oops}
"#;
        let report = report_from_text(
            Path::new("thermal.jsonl"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert_eq!(report.format, InputFormat::Json);
        let build = report.build.as_deref().unwrap();
        assert_eq!(build.model.as_deref(), Some("Pixel 5"));

        let parse: Vec<&Diagnostic> = report.diagnostics_of(DiagnosticKind::Parse).collect();
        assert_eq!(parse.len(), 1);
        assert_eq!(parse[0].line, Some(4));

        let suite = report.suite("Thermal soak").unwrap();
        assert_eq!(suite.entries().len(), 2);
        assert_eq!(suite.handler_name(), Some("temperature"));
        assert_eq!(suite.build().and_then(|b| b.sdk_int), Some(33));
        assert_eq!(suite.charts().len(), 1);
    }

    #[test]
    fn unreadable_build_info_is_a_diagnostic() {
        let text = "not json\n{\"suite_id\":\"Thermal\",\"operation_id\":\"op\",\"timestamp\":1,\"field\":\"temperature_celsius\",\"value\":30}\n";
        let report = report_from_text(
            Path::new("thermal.json"),
            text,
            None,
            &HandlerRegistry::builtin(),
        );
        assert!(report.build.is_none());
        assert_eq!(
            report.diagnostics_of(DiagnosticKind::BuildInfo).count(),
            1
        );
        assert_eq!(report.suites[0].entries().len(), 1);
    }

    #[test]
    fn missing_file_is_an_error() {
        let temp = tempdir().unwrap();
        let err = load_report(
            &temp.path().join("absent.csv"),
            None,
            &HandlerRegistry::builtin(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("Failed to read log file"));
    }

    #[test]
    fn suites_keep_first_appearance_order() {
        let text = "\
suite_id,timestamp,operation_id,token,value
B,1,op,f,1
A,2,op,f,2
B,3,op,f,3
";
        let report = report_from_text(Path::new("x.csv"), text, None, &HandlerRegistry::new());
        let names: Vec<&str> = report.suites.iter().map(|suite| suite.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }
}

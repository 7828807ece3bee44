use crate::error::Result;
use crate::utils::constants::MAX_KEY_LEN;
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct FormatReport {
    pub total_records: u64,
    pub valid_records: u64,
    pub violation_count: u64,
    /// First violations found, up to the checker's limit.
    pub violations: Vec<FormatViolation>,
}

impl FormatReport {
    pub fn is_valid(&self) -> bool {
        self.violation_count == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatViolation {
    /// 1-based line number.
    pub line: u64,
    /// Byte offset of the start of the line.
    pub offset: u64,
    pub violation_type: ViolationType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViolationType {
    MissingDelimiter,
    EmptyKey,
    KeyTooLong,
    MalformedValue,
    /// A well-formed value runs straight into more data.
    MissingTerminator,
}

impl fmt::Display for ViolationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationType::MissingDelimiter => "missing delimiter",
            ViolationType::EmptyKey => "empty key",
            ViolationType::KeyTooLong => "key too long",
            ViolationType::MalformedValue => "malformed value",
            ViolationType::MissingTerminator => "missing terminator",
        };
        f.write_str(name)
    }
}

/// Strict record-by-record check of the input format.
///
/// This is far slower than the aggregation path and is meant for diagnosing
/// inputs the fast path rejects or misreads.
pub struct FormatChecker {
    max_violations: usize,
}

impl FormatChecker {
    pub fn new() -> Self {
        Self {
            max_violations: 100,
        }
    }

    pub fn with_max_violations(mut self, max_violations: usize) -> Self {
        self.max_violations = max_violations;
        self
    }

    pub fn check_path(&self, path: &Path) -> Result<FormatReport> {
        debug!("Checking format of {}", path.display());
        let file = File::open(path)?;
        self.check_reader(BufReader::with_capacity(1 << 20, file))
    }

    pub fn check_reader<R: BufRead>(&self, mut reader: R) -> Result<FormatReport> {
        let mut report = FormatReport {
            total_records: 0,
            valid_records: 0,
            violation_count: 0,
            violations: Vec::new(),
        };

        let mut line = Vec::with_capacity(128);
        let mut offset = 0u64;
        loop {
            line.clear();
            let read = reader.read_until(b'\n', &mut line)?;
            if read == 0 {
                break;
            }
            report.total_records += 1;

            match check_record(strip_terminator(&line)) {
                None => report.valid_records += 1,
                Some((violation_type, details)) => {
                    report.violation_count += 1;
                    if report.violations.len() < self.max_violations {
                        report.violations.push(FormatViolation {
                            line: report.total_records,
                            offset,
                            violation_type,
                            details,
                        });
                    }
                }
            }
            offset += read as u64;
        }

        Ok(report)
    }

    pub fn generate_summary(&self, report: &FormatReport) -> String {
        let mut summary = String::new();

        summary.push_str("=== Format Check Report ===\n");
        summary.push_str(&format!("Total Records: {}\n", report.total_records));
        summary.push_str(&format!("Valid Records: {}\n", report.valid_records));
        summary.push_str(&format!("Violations: {}\n", report.violation_count));

        if !report.violations.is_empty() {
            summary.push_str(&format!("\nFirst {} Violations:\n", report.violations.len()));
            for violation in &report.violations {
                summary.push_str(&format!(
                    "  line {} (byte {}): {}: {}\n",
                    violation.line, violation.offset, violation.violation_type, violation.details
                ));
            }
        }

        summary
    }
}

impl Default for FormatChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_terminator(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn check_record(record: &[u8]) -> Option<(ViolationType, String)> {
    let Some(semicolon) = memchr::memchr(b';', record) else {
        return Some((
            ViolationType::MissingDelimiter,
            format!("no ';' in {:?}", String::from_utf8_lossy(record)),
        ));
    };

    let key = &record[..semicolon];
    if key.is_empty() {
        return Some((ViolationType::EmptyKey, "record starts with ';'".to_string()));
    }
    if key.len() > MAX_KEY_LEN {
        return Some((
            ViolationType::KeyTooLong,
            format!("key is {} bytes, limit is {}", key.len(), MAX_KEY_LEN),
        ));
    }

    let value = &record[semicolon + 1..];
    match value_prefix_len(value) {
        Some(len) if len == value.len() => None,
        Some(len) => Some((
            ViolationType::MissingTerminator,
            format!(
                "value {:?} is followed by {:?}",
                String::from_utf8_lossy(&value[..len]),
                String::from_utf8_lossy(&value[len..])
            ),
        )),
        None => Some((
            ViolationType::MalformedValue,
            format!(
                "{:?} is not of the form -?d{{1,2}}.d",
                String::from_utf8_lossy(value)
            ),
        )),
    }
}

/// Length of the longest `-?\d{1,2}\.\d` prefix of `value`.
fn value_prefix_len(value: &[u8]) -> Option<usize> {
    let mut i = usize::from(value.first() == Some(&b'-'));

    let int_digits = value[i..]
        .iter()
        .take(3)
        .take_while(|b| b.is_ascii_digit())
        .count();
    if !(1..=2).contains(&int_digits) {
        return None;
    }
    i += int_digits;

    if value.get(i) != Some(&b'.') || !value.get(i + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    Some(i + 2)
}

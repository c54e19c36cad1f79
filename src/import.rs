//! Bulk task import.
//!
//! Turns the raw contents of a bulk file into a list of [`Task`]s. The input
//! format is line oriented:
//!
//! ```text
//! # comment
//! example.com
//! example.org,MX
//! example.net,AAAA,9.9.9.9
//! ```
//!
//! Whole-input limits (size, line count, encoding) reject the import outright.
//! A malformed line is logged, counted and skipped.

use crate::{
    config::ImportConfig,
    core::{RecordType, UnknownRecordType},
    task::Task,
    validation::{validate_domain, validate_server, DomainError, InvalidServer},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Fields a line may carry: domain, record type, server.
const MAX_FIELDS: usize = 3;

/// Errors that abort the whole import.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    #[error("input is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("input has {lines} lines, the limit is {max}")]
    TooManyLines { lines: usize, max: usize },

    #[error("input is not valid UTF-8")]
    InvalidEncoding,

    #[error("no valid entries found ({skipped} skipped)")]
    NoValidEntries { skipped: usize },
}

/// Why a single line was skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryError {
    #[error("expected at most 3 comma-separated fields, found {0}")]
    TooManyFields(usize),

    #[error("invalid domain: {0}")]
    InvalidDomain(#[from] DomainError),

    #[error(transparent)]
    UnknownRecordType(#[from] UnknownRecordType),

    #[error("invalid DNS server: {0}")]
    InvalidServer(#[from] InvalidServer),
}

/// The tasks produced by a successful import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub tasks: Vec<Task>,
    /// Lines that held an entry but failed validation
    pub skipped: usize,
}

/// Validates bulk input against the configured limits.
#[derive(Debug, Clone)]
pub struct BulkImporter {
    config: ImportConfig,
}

impl BulkImporter {
    pub fn new(config: ImportConfig) -> Self {
        Self { config }
    }

    /// Rejects input from its declared size alone, before anything is read.
    pub fn check_size(&self, declared_size: u64) -> Result<(), ImportError> {
        if declared_size > self.config.max_file_bytes {
            return Err(ImportError::TooLarge {
                size: declared_size,
                max: self.config.max_file_bytes,
            });
        }
        Ok(())
    }

    /// Parses `data` into tasks, using the configured default record type
    /// for lines that do not name one.
    pub fn import(&self, data: &[u8], declared_size: u64) -> Result<ImportOutcome, ImportError> {
        self.import_with_default(data, declared_size, self.config.default_record_type)
    }

    /// Parses `data` into tasks.
    ///
    /// `declared_size` is the size reported by whoever handed over the
    /// buffer; the larger of it and the real length is checked against the
    /// limit before any parsing happens.
    pub fn import_with_default(
        &self,
        data: &[u8],
        declared_size: u64,
        default_type: RecordType,
    ) -> Result<ImportOutcome, ImportError> {
        let actual = u64::try_from(data.len()).unwrap_or(u64::MAX);
        self.check_size(declared_size.max(actual))?;

        let text = std::str::from_utf8(data).map_err(|_| ImportError::InvalidEncoding)?;

        let line_count = text.lines().count();
        if line_count > self.config.max_lines {
            return Err(ImportError::TooManyLines {
                lines: line_count,
                max: self.config.max_lines,
            });
        }

        let mut tasks = Vec::new();
        let mut skipped = 0;
        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match parse_entry(line, default_type) {
                Ok(task) => tasks.push(task),
                Err(e) => {
                    skipped += 1;
                    warn!(line = index + 1, error = %e, "Skipping malformed entry");
                }
            }
        }

        if skipped > 0 {
            metrics::counter!("import_entries_skipped_total").increment(skipped as u64);
        }

        if tasks.is_empty() {
            return Err(ImportError::NoValidEntries { skipped });
        }

        info!(tasks = tasks.len(), skipped, "Bulk import parsed");
        Ok(ImportOutcome { tasks, skipped })
    }
}

/// Parses one `domain[,record_type[,dns_server]]` line.
fn parse_entry(line: &str, default_type: RecordType) -> Result<Task, EntryError> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if fields.len() > MAX_FIELDS {
        return Err(EntryError::TooManyFields(fields.len()));
    }

    let domain = fields[0];
    validate_domain(domain)?;

    let record_type = match fields.get(1).filter(|f| !f.is_empty()) {
        Some(field) => field.parse()?,
        None => default_type,
    };

    let dns_server = match fields.get(2).filter(|f| !f.is_empty()) {
        Some(server) => {
            validate_server(server)?;
            Some(server.to_string())
        }
        None => None,
    };

    debug!(domain, %record_type, ?dns_server, "Parsed entry");
    Ok(Task::new(domain, record_type, dns_server))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn importer() -> BulkImporter {
        BulkImporter::new(ImportConfig::default())
    }

    fn import(text: &str) -> Result<ImportOutcome, ImportError> {
        importer().import_with_default(text.as_bytes(), text.len() as u64, RecordType::A)
    }

    #[test]
    fn mixed_input_skips_only_bad_lines() {
        let outcome = import("example.com,A\ntest.org,MX,8.8.8.8\nbad..domain,A\n").unwrap();
        assert_eq!(outcome.tasks.len(), 2);
        assert_eq!(outcome.skipped, 1);

        assert_eq!(outcome.tasks[0], Task::new("example.com", RecordType::A, None));
        assert_eq!(
            outcome.tasks[1],
            Task::new("test.org", RecordType::Mx, Some("8.8.8.8".into()))
        );
    }

    #[test]
    fn blank_and_comment_lines_are_ignored() {
        let outcome = import("# header comment\n\n   \nexample.com\n#another\n").unwrap();
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.skipped, 0);
    }

    #[test]
    fn default_type_applies_to_missing_and_empty_fields() {
        let outcome = importer()
            .import_with_default(b"a.com\nb.com,,1.1.1.1\n", 22, RecordType::Txt)
            .unwrap();
        assert!(outcome.tasks.iter().all(|t| t.record_type == RecordType::Txt));
        assert_eq!(outcome.tasks[1].dns_server.as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn bad_server_discards_only_its_line() {
        let outcome = import("a.com,A,not a server\nb.com,A,dns.google\n").unwrap();
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.tasks[0].domain, "b.com");
        assert_eq!(outcome.skipped, 1);
    }

    #[test]
    fn unknown_type_and_extra_fields_are_malformed() {
        let outcome = import("a.com,SPF\nb.com,A,8.8.8.8,extra\nc.com\n").unwrap();
        assert_eq!(outcome.tasks.len(), 1);
        assert_eq!(outcome.skipped, 2);
    }

    #[test]
    fn zero_valid_entries_is_fatal() {
        assert_eq!(
            import("bad..domain\n$(reboot).com\n"),
            Err(ImportError::NoValidEntries { skipped: 2 })
        );
        assert_eq!(import("# only comments\n"), Err(ImportError::NoValidEntries { skipped: 0 }));
    }

    #[test]
    fn oversized_input_is_rejected_from_declared_size() {
        let max = ImportConfig::default().max_file_bytes;
        let result = importer().import(b"example.com\n", max + 1);
        assert_eq!(result, Err(ImportError::TooLarge { size: max + 1, max }));
    }

    #[test]
    fn line_limit_is_inclusive() {
        let at_limit = "example.com\n".repeat(10_000);
        assert_eq!(import(&at_limit).unwrap().tasks.len(), 10_000);

        let over_limit = "example.com\n".repeat(10_001);
        assert_eq!(
            import(&over_limit),
            Err(ImportError::TooManyLines { lines: 10_001, max: 10_000 })
        );
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let data = [b'a', 0xff, b'\n'];
        assert_eq!(
            importer().import(&data, data.len() as u64),
            Err(ImportError::InvalidEncoding)
        );
    }

    #[test]
    fn windows_line_endings_are_handled() {
        let outcome = import("a.com,A\r\nb.com,NS\r\n").unwrap();
        assert_eq!(outcome.tasks.len(), 2);
        assert_eq!(outcome.tasks[1].record_type, RecordType::Ns);
    }
}

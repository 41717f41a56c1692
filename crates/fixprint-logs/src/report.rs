use std::io::{self, Write};

use thiserror::Error;

use fixprint_types::TypeRegistry;

use crate::summary::MessageSummary;

#[derive(Debug, Error)]
pub enum ReportError {
    /// The registry and the decoder disagree about the known message types
    #[error("message type '{0}' is missing from the type registry")]
    UnknownType(String),

    #[error("failed to write report")]
    Io(#[from] io::Error),
}

/// Final totals printed after the stream loop stops
#[derive(Clone, Copy, Debug)]
pub struct Report<'a> {
    decoded: u64,
    summary: Option<&'a MessageSummary>,
}

impl<'a> Report<'a> {
    pub fn new(decoded: u64, summary: Option<&'a MessageSummary>) -> Self {
        Self { decoded, summary }
    }

    /// Write the decoded count and, when a summary was kept, one line per type
    ///
    /// All names are resolved before any summary line is written, so a
    /// registry miss leaves only the count line behind.
    pub fn write<W, R>(&self, out: &mut W, registry: &R) -> Result<(), ReportError>
    where
        W: Write,
        R: TypeRegistry + ?Sized,
    {
        writeln!(out, "{} messages decoded.", self.decoded)?;

        if let Some(summary) = self.summary {
            let rows = summary
                .entries()
                .map(|(tag, count)| {
                    registry
                        .display_name(tag)
                        .map(|name| (name, tag, count))
                        .ok_or_else(|| ReportError::UnknownType(tag.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            for (name, tag, count) in rows {
                writeln!(out, "{:<20} (\"{}\")\t{}", name, tag, count)?;
            }
        }

        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Names(HashMap<&'static str, &'static str>);

    impl Names {
        fn fix() -> Self {
            Self(HashMap::from([
                ("D", "NewOrderSingle"),
                ("8", "ExecutionReport"),
                ("0", "Heartbeat"),
            ]))
        }
    }

    impl TypeRegistry for Names {
        fn display_name(&self, tag: &str) -> Option<&str> {
            self.0.get(tag).copied()
        }
    }

    fn render(report: Report<'_>, registry: &Names) -> (Result<(), ReportError>, String) {
        let mut out = Vec::new();
        let result = report.write(&mut out, registry);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_count_only() {
        let (result, out) = render(Report::new(42, None), &Names::fix());
        assert!(result.is_ok());
        assert_eq!(out, "42 messages decoded.\n");
    }

    #[test]
    fn test_empty_summary_prints_no_rows() {
        let summary = MessageSummary::new();
        let (result, out) = render(Report::new(0, Some(&summary)), &Names::fix());
        assert!(result.is_ok());
        assert_eq!(out, "0 messages decoded.\n");
    }

    #[test]
    fn test_summary_rows_in_first_seen_order() {
        let mut summary = MessageSummary::new();
        for tag in ["8", "D", "8", "0"] {
            summary.record(tag);
        }

        let (result, out) = render(Report::new(4, Some(&summary)), &Names::fix());
        assert!(result.is_ok());
        assert_eq!(
            out,
            "4 messages decoded.\n\
             ExecutionReport      (\"8\")\t2\n\
             NewOrderSingle       (\"D\")\t1\n\
             Heartbeat            (\"0\")\t1\n"
        );
    }

    #[test]
    fn test_unknown_type_is_fatal() {
        let mut summary = MessageSummary::new();
        summary.record("D");
        summary.record("U9");

        let (result, out) = render(Report::new(2, Some(&summary)), &Names::fix());
        assert!(matches!(result, Err(ReportError::UnknownType(tag)) if tag == "U9"));
        assert_eq!(out, "2 messages decoded.\n");
    }
}

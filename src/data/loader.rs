// ============================================================
// Layer 4 — JSONL Record Loader
// ============================================================
// Reads a dataset where each line is one JSON object:
//
//   {"question": "...", "answer": "..."}
//
// Extra fields are ignored. Blank (whitespace-only) lines are
// skipped. Any other line that fails to parse, or lacks either
// field, stops the load with the file path and the 1-based line
// number so the broken record can be fixed at the source.

use anyhow::{Context, Result};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use crate::domain::error::GptError;
use crate::domain::qa_pair::QaPair;
use crate::domain::traits::RecordSource;

/// Loads question/answer records from a JSON-lines file.
pub struct JsonlLoader {
    path: PathBuf,
}

impl JsonlLoader {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Non-blank raw lines, untouched. Used by the splitter so the
    /// output files keep the exact bytes of the input.
    pub fn raw_lines(&self) -> Result<Vec<String>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let mut lines = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if !line.trim().is_empty() {
                lines.push(line);
            }
        }
        Ok(lines)
    }
}

impl RecordSource for JsonlLoader {
    fn load_all(&self) -> Result<Vec<QaPair>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let mut records = Vec::new();
        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = parse_line(&line).map_err(|reason| GptError::DataFormat {
                path: self.path.display().to_string(),
                line: idx + 1,
                reason,
            })?;
            records.push(record);
        }

        tracing::info!("Loaded {} records from '{}'", records.len(), self.path.display());
        Ok(records)
    }
}

fn parse_line(line: &str) -> std::result::Result<QaPair, String> {
    serde_json::from_str::<QaPair>(line).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_loads_records_and_skips_blank_lines() {
        let f = write_tmp(
            "{\"question\":\"q1\",\"answer\":\"a1\"}\n\n   \n{\"question\":\"q2\",\"answer\":\"a2\"}\n",
        );
        let records = JsonlLoader::new(f.path()).load_all().unwrap();
        assert_eq!(records, vec![QaPair::new("q1", "a1"), QaPair::new("q2", "a2")]);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let f = write_tmp("{\"question\":\"q1\",\"answer\":\"a1\"}\n{\"question\":\"q2\"}\n");
        let err = JsonlLoader::new(f.path()).load_all().unwrap_err();
        match err.downcast_ref::<GptError>() {
            Some(GptError::DataFormat { line, .. }) => assert_eq!(*line, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_invalid_json_is_fatal() {
        let f = write_tmp("not json\n");
        assert!(JsonlLoader::new(f.path()).load_all().is_err());
    }

    #[test]
    fn test_raw_lines_keep_text() {
        let f = write_tmp("a\n\nb\n");
        assert_eq!(JsonlLoader::new(f.path()).raw_lines().unwrap(), vec!["a", "b"]);
    }
}

//! Snapshot loaders.
//!
//! Two line-oriented formats produce the same canonical key/value mapping:
//!
//! - [`LineFormat::KeyValue`]: `key<separator>value`, e.g. an `etcdctl get`
//!   dump rewritten as `/registry/ranges/serviceips: {...}`.
//! - [`LineFormat::FolderCsv`]: `folder,filename`, a one-level directory to
//!   file relation. Every row becomes the key `folder/filename` with an
//!   empty value.
//!
//! Blank lines and lines starting with `#` are skipped. Lines that do not
//! parse are logged and skipped; only failing to open or read the source
//! aborts a load.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::DEFAULT_SEPARATOR;
use crate::error::LoadError;
use crate::key;

/// Format of a snapshot source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineFormat {
    /// `key<separator>value` per line.
    KeyValue {
        /// Text between key and value.
        separator: String,
    },
    /// `folder,filename` per line.
    FolderCsv,
}

impl Default for LineFormat {
    fn default() -> Self {
        Self::KeyValue {
            separator: DEFAULT_SEPARATOR.to_string(),
        }
    }
}

/// A single source line that did not parse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}: {reason}: {content:?}")]
pub struct MalformedRecord {
    /// 1-based line number.
    pub line: usize,
    /// The offending line as read.
    pub content: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Outcome of a load that did not fail outright.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records inserted into the mapping.
    pub records: usize,
    /// Lines skipped because they did not parse.
    pub skipped: Vec<MalformedRecord>,
}

/// Canonical key to value mapping.
pub type Snapshot = BTreeMap<String, Vec<u8>>;

/// Load a snapshot file from disk.
///
/// Lines are split on `\n` with an optional trailing `\r`. A line that is
/// not valid UTF-8 is a malformed record, not a read failure.
pub fn load_file(path: &Path, format: &LineFormat) -> Result<(Snapshot, LoadReport), LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;

    let mut raw_lines = Vec::new();
    for line in BufReader::new(file).split(b'\n') {
        let mut line = line.map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        raw_lines.push(line);
    }

    let decoded = raw_lines
        .iter()
        .map(|raw| std::str::from_utf8(raw).map_err(|_| raw.as_slice()));
    let (snapshot, report) = parse_decoded(decoded, format);
    info!(
        path = %path.display(),
        records = report.records,
        skipped = report.skipped.len(),
        "Loaded snapshot"
    );
    Ok((snapshot, report))
}

/// Parse already-read lines into a mapping.
pub fn parse_lines<'a>(
    lines: impl IntoIterator<Item = &'a str>,
    format: &LineFormat,
) -> (Snapshot, LoadReport) {
    parse_decoded(lines.into_iter().map(Ok), format)
}

/// Lines that failed to decode arrive as `Err` with their raw bytes.
fn parse_decoded<'a>(
    lines: impl IntoIterator<Item = Result<&'a str, &'a [u8]>>,
    format: &LineFormat,
) -> (Snapshot, LoadReport) {
    let mut snapshot = Snapshot::new();
    let mut report = LoadReport::default();

    for (idx, line) in lines.into_iter().enumerate() {
        let line = match line {
            Ok(line) => line,
            Err(raw) => {
                let content = String::from_utf8_lossy(raw).into_owned();
                skip(&mut report, idx + 1, content, "invalid UTF-8");
                continue;
            }
        };
        if line.trim().is_empty() || line.starts_with('#') {
            continue;
        }

        let parsed = match format {
            LineFormat::KeyValue { separator } => parse_key_value(line, separator),
            LineFormat::FolderCsv => parse_folder_csv(line),
        };

        match parsed {
            Ok((key, value)) => {
                if snapshot.insert(key.clone(), value).is_some() {
                    debug!(key = %key, line = idx + 1, "Duplicate key, later line wins");
                } else {
                    report.records += 1;
                }
            }
            Err(reason) => skip(&mut report, idx + 1, line.to_string(), reason),
        }
    }

    (snapshot, report)
}

fn skip(report: &mut LoadReport, line: usize, content: String, reason: &'static str) {
    let record = MalformedRecord {
        line,
        content,
        reason,
    };
    warn!(%record, "Skipping malformed record");
    report.skipped.push(record);
}

fn parse_key_value(line: &str, separator: &str) -> Result<(String, Vec<u8>), &'static str> {
    let (raw_key, value) = line.split_once(separator).ok_or("missing separator")?;
    let key = key::normalize(raw_key);
    if key.is_empty() {
        return Err("empty key");
    }
    Ok((key, value.as_bytes().to_vec()))
}

fn parse_folder_csv(line: &str) -> Result<(String, Vec<u8>), &'static str> {
    let fields = split_csv_record(line)?;
    let [folder, filename] = fields.as_slice() else {
        return Err("expected two fields");
    };
    if !key::is_valid_segment(folder) || !key::is_valid_segment(filename) {
        return Err("invalid folder or filename");
    }
    Ok((key::join(folder, filename), Vec::new()))
}

/// Split one CSV line into fields.
///
/// Handles double-quoted fields with `""` escapes. Quoted fields spanning
/// several lines are not supported.
fn split_csv_record(line: &str) -> Result<Vec<String>, &'static str> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut chars = line.chars().peekable();
    let mut in_quotes = false;
    let mut quoted = false;

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            ('"', false) if field.is_empty() && !quoted => {
                in_quotes = true;
                quoted = true;
            }
            ('"', false) => return Err("bare quote in field"),
            (',', false) => {
                fields.push(std::mem::take(&mut field));
                quoted = false;
            }
            (c, _) => {
                if quoted && !in_quotes {
                    return Err("text after closing quote");
                }
                field.push(c);
            }
        }
    }

    if in_quotes {
        return Err("unterminated quote");
    }
    fields.push(field);
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn kv() -> LineFormat {
        LineFormat::default()
    }

    #[test]
    fn test_parse_key_value() {
        let (snapshot, report) = parse_lines(
            ["/a/b: v1", "/a/c: v2", "", "# comment: ignored", "/x: with: colons"],
            &kv(),
        );
        assert_eq!(report.records, 3);
        assert!(report.skipped.is_empty());
        assert_eq!(snapshot.get("a/b").map(Vec::as_slice), Some(&b"v1"[..]));
        assert_eq!(snapshot.get("x").map(Vec::as_slice), Some(&b"with: colons"[..]));
        assert!(!snapshot.contains_key("# comment"));
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let (snapshot, report) = parse_lines(["/a: 1", "no separator here", "/b: 2"], &kv());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[0].reason, "missing separator");
    }

    #[test]
    fn test_empty_key_is_malformed() {
        let (snapshot, report) = parse_lines(["/: root value"], &kv());
        assert!(snapshot.is_empty());
        assert_eq!(report.skipped[0].reason, "empty key");
    }

    #[test]
    fn test_custom_separator() {
        let format = LineFormat::KeyValue {
            separator: "=".into(),
        };
        let (snapshot, _) = parse_lines(["a/b=1"], &format);
        assert_eq!(snapshot.get("a/b").map(Vec::as_slice), Some(&b"1"[..]));
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let (snapshot, report) = parse_lines(["/a: 1", "a: 2"], &kv());
        assert_eq!(report.records, 1);
        assert_eq!(snapshot.get("a").map(Vec::as_slice), Some(&b"2"[..]));
    }

    #[test]
    fn test_folder_csv() {
        let (snapshot, report) = parse_lines(
            ["docs,readme.txt", "docs,notes.txt", "\"img\",\"a,b.png\"", "too,many,fields"],
            &LineFormat::FolderCsv,
        );
        assert_eq!(report.records, 3);
        assert_eq!(report.skipped.len(), 1);
        assert!(snapshot.contains_key("docs/readme.txt"));
        assert!(snapshot.contains_key("img/a,b.png"));
        assert_eq!(snapshot.get("docs/notes.txt").map(Vec::len), Some(0));
    }

    #[test]
    fn test_split_csv_record() {
        assert_eq!(split_csv_record("a,b").unwrap(), vec!["a", "b"]);
        assert_eq!(
            split_csv_record("\"say \"\"hi\"\"\",x").unwrap(),
            vec!["say \"hi\"", "x"]
        );
        assert_eq!(split_csv_record("a,").unwrap(), vec!["a", ""]);
        assert!(split_csv_record("\"open").is_err());
        assert!(split_csv_record("\"a\"b,c").is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# etcd dump").unwrap();
        writeln!(file, "/registry/pods/default/nginx: {{\"kind\":\"Pod\"}}").unwrap();
        writeln!(file, "garbage").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "/registry/ranges/serviceips: 10.96.0.0/12").unwrap();

        let (snapshot, report) = load_file(file.path(), &kv()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(
            snapshot.get("registry/ranges/serviceips").map(Vec::as_slice),
            Some(&b"10.96.0.0/12"[..])
        );
    }

    #[test]
    fn test_load_file_skips_invalid_utf8() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"/a: 1\n/bad: \xff\xfe\r\n/b: 2\r\n").unwrap();

        let (snapshot, report) = load_file(file.path(), &kv()).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].line, 2);
        assert_eq!(report.skipped[0].reason, "invalid UTF-8");
        assert_eq!(snapshot.get("a").map(Vec::as_slice), Some(&b"1"[..]));
        // CRLF endings are stripped like LF
        assert_eq!(snapshot.get("b").map(Vec::as_slice), Some(&b"2"[..]));
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_file(Path::new("/nonexistent/kvfs/data.etcd"), &kv()).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
    }
}

//! Record source: synthetic payloads for the insert stage
//!
//! Records are single-line JSON documents. They come either from the
//! built-in template or from a data file with one record per line.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{BenchError, BenchResult};

/// Built-in record, already collapsed to one line
pub const RECORD_TEMPLATE: &str = concat!(
    r#"{"glossary": {"title": "example record", "RecordDiv": {"title": "R", "#,
    r#""RecordList": {"RecordEntry": {"ID": "Record", "SortAs": "Name", "#,
    r#""RecordTerm": "Standard Generalized Markup Language", "Acronym": "SGML", "#,
    r#""Abbrev": "ISO 8879:1986", "RecordDef": {"para": "A meta-markup language, "#,
    r#"used to create markup languages such as DocBook.", "RecordSeeAlso": ["GML", "XML"]}, "#,
    r#""RecordSee": "markup"}}}}}"#
);

/// One source record. Immutable once read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPayload(String);

impl RecordPayload {
    pub fn new(text: impl Into<String>) -> Self {
        RecordPayload(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Base64 (standard alphabet, padded) form sent to the database
    pub fn encode(&self) -> String {
        STANDARD.encode(self.0.as_bytes())
    }
}

/// Where records come from
#[derive(Debug, Clone, Default)]
pub enum RecordSource {
    /// Repeats the built-in template
    #[default]
    Embedded,
    /// Reads a UTF-8 file, one record per line
    File(PathBuf),
}

impl RecordSource {
    /// File source when a path is given, the built-in template otherwise
    pub fn from_path(path: Option<&Path>) -> Self {
        match path {
            Some(p) => RecordSource::File(p.to_path_buf()),
            None => RecordSource::Embedded,
        }
    }

    /// Open the source and read up to `count` records lazily
    ///
    /// Every call opens the source afresh.
    pub fn produce(&self, count: usize) -> BenchResult<Records> {
        match self {
            RecordSource::Embedded => Ok(Records { inner: Inner::Template, remaining: count }),
            RecordSource::File(path) => {
                let file = File::open(path).map_err(|e| {
                    BenchError::DataUnavailable(format!("{}: {}", path.display(), e))
                })?;
                debug!(path = %path.display(), count, "reading records");
                Ok(Records {
                    inner: Inner::File(BufReader::new(file).lines()),
                    remaining: count,
                })
            }
        }
    }
}

enum Inner {
    Template,
    File(Lines<BufReader<File>>),
}

/// Lazy, finite record stream returned by `RecordSource::produce`
pub struct Records {
    inner: Inner,
    remaining: usize,
}

impl Iterator for Records {
    type Item = BenchResult<RecordPayload>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = match &mut self.inner {
            Inner::Template => Some(Ok(RecordPayload::new(RECORD_TEMPLATE))),
            Inner::File(lines) => lines.next().map(|line| {
                line.map(RecordPayload::new)
                    .map_err(|e| BenchError::DataUnavailable(e.to_string()))
            }),
        };
        match item {
            Some(_) => self.remaining -= 1,
            None => self.remaining = 0,
        }
        item
    }
}

/// Write a data file with `count` copies of the built-in record
///
/// Records are separated by newlines; there is no trailing newline.
pub fn generate_file(path: &Path, count: usize) -> BenchResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for i in 0..count {
        out.write_all(RECORD_TEMPLATE.as_bytes())?;
        if i + 1 < count {
            out.write_all(b"\n")?;
        }
    }
    out.flush()?;
    info!(path = %path.display(), count, "test data created");
    Ok(())
}

//! Stats reporter: final counts and per-stage timing lines

use serde::Serialize;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use crate::engine::StageTiming;
use crate::error::BenchResult;

/// Vertex counts at the end of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub structures: u64,
    pub predictions: u64,
    pub endpoints: u64,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "No of structures {}. No of prediction structures {}. No of endpoints {}.",
            self.structures, self.predictions, self.endpoints
        )
    }
}

/// In-memory sink, cloneable so a test can read what the reporter wrote
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "buffer lock poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes report lines to a sink (stdout unless told otherwise)
pub struct StatsReporter {
    sink: Box<dyn Write + Send>,
}

impl Default for StatsReporter {
    fn default() -> Self {
        Self::stdout()
    }
}

impl StatsReporter {
    pub fn stdout() -> Self {
        Self { sink: Box::new(io::stdout()) }
    }

    pub fn with_sink(sink: impl Write + Send + 'static) -> Self {
        Self { sink: Box::new(sink) }
    }

    /// Write a free-form line
    pub fn line(&mut self, text: &str) -> BenchResult<()> {
        writeln!(self.sink, "{}", text)?;
        Ok(())
    }

    /// The final counts line
    pub fn print_stats(&mut self, stats: &GraphStats) -> BenchResult<()> {
        self.line(&stats.to_string())
    }

    /// Total time of a step, plus the per-item average when it has items
    pub fn print_timing(&mut self, timing: &StageTiming) -> BenchResult<()> {
        writeln!(
            self.sink,
            "{} ({}) {} ms",
            timing.operation,
            timing.items,
            timing.elapsed.as_millis()
        )?;
        if let Some(avg) = timing.average_ns() {
            writeln!(self.sink, "Average {} time {} ns", timing.operation, avg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Stage;
    use std::time::Duration;

    #[test]
    fn test_stats_line() {
        let stats = GraphStats { structures: 5, predictions: 5, endpoints: 3 };
        assert_eq!(
            stats.to_string(),
            "No of structures 5. No of prediction structures 5. No of endpoints 3."
        );
    }

    #[test]
    fn test_reporter_writes_to_buffer() {
        let buffer = SharedBuffer::new();
        let mut reporter = StatsReporter::with_sink(buffer.clone());
        reporter.print_stats(&GraphStats::default()).unwrap();
        reporter
            .print_timing(&StageTiming {
                stage: Stage::Insert,
                operation: "Insert input structures".into(),
                items: 4,
                elapsed: Duration::from_millis(2),
            })
            .unwrap();

        let text = buffer.contents();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "No of structures 0. No of prediction structures 0. No of endpoints 0.");
        assert_eq!(lines[1], "Insert input structures (4) 2 ms");
        assert_eq!(lines[2], "Average Insert input structures time 500000 ns");
    }

    #[test]
    fn test_no_average_without_items() {
        let buffer = SharedBuffer::new();
        let mut reporter = StatsReporter::with_sink(buffer.clone());
        reporter
            .print_timing(&StageTiming {
                stage: Stage::Find,
                operation: "Search all endpoints".into(),
                items: 0,
                elapsed: Duration::from_millis(1),
            })
            .unwrap();
        assert_eq!(buffer.contents().lines().count(), 1);
    }
}

//! JSON lines output
//!
//! Each report is written as one JSON object per line:
//!
//! ```json
//! {"uri":"https://example.org/reports/1","page":"https://example.org/reports?page=1","report":{...}}
//! ```

use crate::harvest::Harvested;
use crate::output::traits::{ItemSink, SinkResult};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct Line<'a, T> {
    uri: &'a str,
    page: &'a str,
    report: &'a T,
}

/// Sink writing one JSON object per report
pub struct JsonLinesWriter<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of lines written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write, T: Serialize> ItemSink<T> for JsonLinesWriter<W> {
    fn accept(&mut self, item: &Harvested<T>) -> SinkResult<()> {
        let line = Line {
            uri: item.item_ref.as_str(),
            page: item.page.as_str(),
            report: &item.item,
        };
        serde_json::to_writer(&mut self.writer, &line)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> SinkResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}

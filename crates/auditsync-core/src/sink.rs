//! Hand-off of finished entries to a downstream consumer.

use std::io::Write;

use crate::entry::Entry;

/// Receives the entries of a successful run, in feed order.
pub trait EventSink {
    fn write_entry(&mut self, entry: &Entry) -> std::io::Result<()>;

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes one flattened `key=value ` line per entry.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        WriterSink { writer, written: 0 }
    }

    /// Number of entries written so far.
    pub fn written(&self) -> usize {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for WriterSink<W> {
    fn write_entry(&mut self, entry: &Entry) -> std::io::Result<()> {
        writeln!(self.writer, "{}", entry.flatten())?;
        self.written += 1;
        Ok(())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

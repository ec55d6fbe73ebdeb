use std::io::{self, Write};

/// Staging area between the record writer and the socket.
///
/// While buffering is enabled, records are held back in the order they were
/// written. `inject` places a record at the current end of the held sequence,
/// which is the only way anything gets between two held records. `flush`
/// sends everything held as a single write.
#[derive(Debug)]
pub struct FragmentBuffer<W> {
    inner: W,
    buffering: bool,
    held: Vec<Vec<u8>>,
}

impl<W: Write> FragmentBuffer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buffering: false,
            held: Vec::new(),
        }
    }

    /// Start holding records instead of sending them.
    pub fn enable(&mut self) {
        tracing::debug!("record buffering enabled");
        self.buffering = true;
    }

    /// Stop holding records. Anything already held stays held until `flush`.
    pub fn disable(&mut self) {
        tracing::debug!(held = self.held.len(), "record buffering disabled");
        self.buffering = false;
    }

    /// Number of records waiting for `flush`.
    pub fn held(&self) -> usize {
        self.held.len()
    }

    /// Send or hold one record of the logical message sequence.
    pub fn write_record(&mut self, record: Vec<u8>) -> io::Result<()> {
        if self.buffering {
            tracing::trace!(length = record.len(), "holding record");
            self.held.push(record);
            Ok(())
        } else {
            tracing::trace!(length = record.len(), "writing record");
            self.inner.write_all(&record)?;
            self.inner.flush()
        }
    }

    /// Insert a record that is not part of the logical message sequence at the
    /// current position.
    pub fn inject(&mut self, record: Vec<u8>) -> io::Result<()> {
        tracing::debug!(
            length = record.len(),
            position = self.held.len(),
            buffering = self.buffering,
            "injecting record"
        );
        self.write_record(record)
    }

    /// Send all held records in the order they were buffered.
    pub fn flush(&mut self) -> io::Result<()> {
        if self.held.is_empty() {
            return Ok(());
        }
        let burst = self.held.concat();
        tracing::debug!(
            records = self.held.len(),
            bytes = burst.len(),
            "flushing held records"
        );
        self.held.clear();
        self.inner.write_all(&burst)?;
        self.inner.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

use std::io::Write;

/// Somewhere to publish display and debug frames to.
///
/// Subscribers tell the two frame kinds apart by their first byte.
pub trait FrameSink {
    fn publish(&mut self, frame: &[u8]) -> anyhow::Result<()>;
}

/// Writes every frame, as is, to the wrapped writer.
pub struct WriterSink<W: Write> {
    writer: W,
}

impl<W: Write> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for WriterSink<W> {
    fn publish(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Drops every frame, only keeping count.
#[derive(Default)]
pub struct NullSink {
    pub frames: u64,
}

impl FrameSink for NullSink {
    fn publish(&mut self, _frame: &[u8]) -> anyhow::Result<()> {
        self.frames += 1;
        Ok(())
    }
}

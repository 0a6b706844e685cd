use crate::event::EventSink;
use crate::framer::Framer;
use crate::translator::{TouchState, Translator};
use anyhow::Context;
use std::io::{ErrorKind, Read};
use tracing::{debug, trace, warn};

/// Reads performed per readiness notification before yielding
pub const MAX_READS_PER_DRAIN: usize = 64;

/// Why a drain stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStatus {
    /// No more data right now
    Idle,
    /// Read budget spent while data was still coming
    Budget,
    /// The device reported end of file
    Closed,
}

/// Bytes in, host events out
#[derive(Debug, Clone)]
pub struct InputPipeline {
    framer: Framer,
    translator: Translator,
}

impl InputPipeline {
    pub fn new(translator: Translator) -> Self {
        Self {
            framer: Framer::new(),
            translator,
        }
    }

    pub fn framer(&self) -> &Framer {
        &self.framer
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn translator_mut(&mut self) -> &mut Translator {
        &mut self.translator
    }

    pub fn touch_state(&self) -> &TouchState {
        self.translator.state()
    }

    /// Forget buffered bytes and the touch state
    pub fn reset(&mut self) {
        self.framer.clear();
        self.translator.reset();
    }

    /// Push `bytes` through the framer and post every resulting event.
    ///
    /// Returns the number of packets decoded.
    pub fn process<S: EventSink + ?Sized>(
        &mut self,
        mut bytes: &[u8],
        sink: &mut S,
    ) -> anyhow::Result<usize> {
        let mut packets = 0;
        while !bytes.is_empty() {
            let taken = self.framer.feed(bytes);
            bytes = &bytes[taken..];
            packets += self.dispatch(sink)?;
        }
        Ok(packets)
    }

    /// Read from a non-blocking `reader` until it would block.
    ///
    /// Each read lands directly in the free part of the framing buffer and
    /// is framed and translated before the next read.
    pub fn pump<R, S>(&mut self, reader: &mut R, sink: &mut S) -> anyhow::Result<DrainStatus>
    where
        R: Read + ?Sized,
        S: EventSink + ?Sized,
    {
        let mut packets = 0;
        let mut reads = 0;

        let status = loop {
            if reads == MAX_READS_PER_DRAIN {
                break DrainStatus::Budget;
            }

            if self.framer.remaining() == 0 {
                // Unreachable after a dispatch, but never read into nothing
                debug!("Framing buffer full, dropping {} bytes", self.framer.len());
                self.framer.clear();
            }

            match reader.read(self.framer.spare_capacity_mut()) {
                Ok(0) => break DrainStatus::Closed,
                Ok(count) => {
                    reads += 1;
                    trace!("Read {} bytes", count);
                    self.framer.commit(count);
                    packets += self.dispatch(sink)?;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break DrainStatus::Idle,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!("Read from device failed: {}", e);
                    return Err(e).context("Failed to read from device");
                }
            }
        };

        debug!(
            "Drain finished: {:?} after {} reads, {} packets",
            status, reads, packets
        );
        Ok(status)
    }

    fn dispatch<S: EventSink + ?Sized>(&mut self, sink: &mut S) -> anyhow::Result<usize> {
        let mut packets = 0;
        while let Some(packet) = self.framer.try_extract_packet() {
            let report = self.translator.translate(&packet);
            sink.post_motion(report.motion)?;
            if let Some(button) = report.button {
                sink.post_button(button)?;
            }
            packets += 1;
        }
        Ok(packets)
    }
}

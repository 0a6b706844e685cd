//! Packet framing for the serial byte stream.
//!
//! Reads from a tty can stop anywhere inside a report and line noise can
//! inject stray bytes, so incoming data is collected in a fixed buffer and
//! packets are cut out of it. Anything in front of the first status byte is
//! noise and gets dropped; a status byte without its full body stays buffered
//! until the rest arrives.

use crate::protocol::{PACKET_LEN, Packet, STATUS_MARKER};
use tracing::{trace, warn};

/// Capacity of the framing buffer
pub const FRAME_BUFFER_LEN: usize = 256;

#[derive(Debug, Clone)]
pub struct Framer {
    buffer: [u8; FRAME_BUFFER_LEN],
    fill: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buffer: [0; FRAME_BUFFER_LEN],
            fill: 0,
        }
    }

    /// Number of bytes waiting to be framed
    pub fn len(&self) -> usize {
        self.fill
    }

    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// Free space left in the buffer
    pub fn remaining(&self) -> usize {
        FRAME_BUFFER_LEN - self.fill
    }

    /// The bytes waiting to be framed
    pub fn buffered(&self) -> &[u8] {
        &self.buffer[..self.fill]
    }

    pub fn clear(&mut self) {
        self.fill = 0;
    }

    /// Append as many of `bytes` as fit and return how many were taken
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let count = bytes.len().min(self.remaining());
        self.buffer[self.fill..self.fill + count].copy_from_slice(&bytes[..count]);
        self.fill += count;
        count
    }

    /// Free tail of the buffer, for reading straight from the device.
    ///
    /// Call [`Framer::commit`] with the number of bytes written afterwards.
    pub fn spare_capacity_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[self.fill..]
    }

    /// Mark `count` bytes of the spare capacity as filled
    pub fn commit(&mut self, count: usize) {
        debug_assert!(count <= self.remaining());
        self.fill = (self.fill + count).min(FRAME_BUFFER_LEN);
    }

    /// Cut the next complete packet out of the buffer.
    ///
    /// Returns `None` when no status byte is buffered or when the one found
    /// is still waiting for the rest of its body.
    pub fn try_extract_packet(&mut self) -> Option<Packet> {
        let start = self.buffered().iter().position(|b| b & STATUS_MARKER != 0);

        let Some(start) = start else {
            if self.fill > 0 {
                warn!("Discarding {} bytes without a status byte", self.fill);
            }
            self.fill = 0;
            return None;
        };

        if start > 0 {
            warn!("Discarding {} bytes of noise before status byte", start);
            self.consume(start);
        }

        if self.fill < PACKET_LEN {
            trace!("Partial packet buffered ({} of {} bytes)", self.fill, PACKET_LEN);
            return None;
        }

        let mut bytes = [0u8; PACKET_LEN];
        bytes.copy_from_slice(&self.buffer[..PACKET_LEN]);
        self.consume(PACKET_LEN);

        Some(Packet::new(bytes))
    }

    /// Extract every complete packet currently buffered, in arrival order
    pub fn drain(&mut self) -> Drain<'_> {
        Drain { framer: self }
    }

    /// Drop `count` bytes from the front, shifting the rest down
    fn consume(&mut self, count: usize) {
        self.buffer.copy_within(count..self.fill, 0);
        self.fill -= count;
    }
}

/// Iterator returned by [`Framer::drain`]
pub struct Drain<'a> {
    framer: &'a mut Framer,
}

impl Iterator for Drain<'_> {
    type Item = Packet;

    fn next(&mut self) -> Option<Packet> {
        self.framer.try_extract_packet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_log;
    use proptest::prelude::*;

    fn extract_all(framer: &mut Framer) -> Vec<Packet> {
        framer.drain().collect()
    }

    #[test]
    fn test_leading_noise_is_discarded() {
        let mut framer = Framer::new();
        framer.feed(&[0x05, 0x81, 0x10, 0x20, 0x30, 0x40, 0x81]);

        let packet = framer.try_extract_packet().unwrap();
        assert_eq!(packet.as_bytes(), &[0x81, 0x10, 0x20, 0x30, 0x40]);

        // The trailing status byte waits for its body
        assert_eq!(framer.try_extract_packet(), None);
        assert_eq!(framer.buffered(), &[0x81]);
    }

    #[test]
    fn test_partial_packet_is_retained() {
        let mut framer = Framer::new();
        framer.feed(&[0x81, 0x01, 0x02, 0x00]);

        assert_eq!(framer.try_extract_packet(), None);
        assert_eq!(framer.buffered(), &[0x81, 0x01, 0x02, 0x00]);

        framer.feed(&[0x05]);
        let packets = extract_all(&mut framer);
        assert_eq!(packets, vec![Packet::new([0x81, 0x01, 0x02, 0x00, 0x05])]);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_discarded_noise_is_logged_as_warning() {
        let mut framer = Framer::new();
        framer.feed(&[0x11, 0x22, 0x81, 0x00, 0x01, 0x00, 0x02, 0x33]);

        let (packets, logs) = test_log::capture(|| extract_all(&mut framer));

        assert_eq!(packets.len(), 1);
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("Discarding 2 bytes of noise"), "{}", logs);
        assert!(logs.contains("Discarding 1 bytes without a status byte"), "{}", logs);
    }

    #[test]
    fn test_all_noise_is_dropped() {
        let mut framer = Framer::new();
        framer.feed(&[0x00, 0x12, 0x7F, 0x33]);

        assert_eq!(framer.try_extract_packet(), None);
        assert!(framer.is_empty());
    }

    #[test]
    fn test_multiple_packets_in_one_feed() {
        let mut framer = Framer::new();
        framer.feed(&[
            0x81, 0x00, 0x01, 0x00, 0x02, // first
            0x11, // noise between packets
            0x81, 0x00, 0x03, 0x00, 0x04, // second
            0x80, 0x00, 0x05, 0x00, 0x06, // third
        ]);

        let packets = extract_all(&mut framer);
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0].raw_x(), 1);
        assert_eq!(packets[1].raw_y(), 4);
        assert!(!packets[2].is_down());
        assert!(framer.is_empty());
    }

    #[test]
    fn test_truncated_packet_resyncs_on_next_status() {
        let mut framer = Framer::new();
        // Report cut short after two body bytes, then a full one
        framer.feed(&[0x81, 0x01, 0x02, 0x81, 0x00, 0x07, 0x00, 0x08]);

        // The torn report swallows the next status byte as body
        let first = framer.try_extract_packet().unwrap();
        assert_eq!(first.as_bytes(), &[0x81, 0x01, 0x02, 0x81, 0x00]);

        framer.feed(&[0x81, 0x00, 0x09, 0x00, 0x0A]);
        let rest = extract_all(&mut framer);
        assert_eq!(rest, vec![Packet::new([0x81, 0x00, 0x09, 0x00, 0x0A])]);
    }

    #[test]
    fn test_feed_is_bounded_by_capacity() {
        let mut framer = Framer::new();
        let bytes = [0x81u8; FRAME_BUFFER_LEN + 10];

        assert_eq!(framer.feed(&bytes), FRAME_BUFFER_LEN);
        assert_eq!(framer.remaining(), 0);
        assert_eq!(framer.feed(&bytes), 0);

        let packets = extract_all(&mut framer);
        assert_eq!(packets.len(), FRAME_BUFFER_LEN / PACKET_LEN);
        assert_eq!(framer.len(), FRAME_BUFFER_LEN % PACKET_LEN);
    }

    #[test]
    fn test_spare_capacity_commit() {
        let mut framer = Framer::new();
        let spare = framer.spare_capacity_mut();
        assert_eq!(spare.len(), FRAME_BUFFER_LEN);
        spare[..5].copy_from_slice(&[0x80, 0x00, 0x01, 0x00, 0x02]);
        framer.commit(5);

        assert_eq!(framer.len(), 5);
        assert_eq!(framer.try_extract_packet().map(|p| p.raw_y()), Some(2));
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_packets(
            bytes in proptest::collection::vec(any::<u8>(), 0..600),
            cuts in proptest::collection::vec(1usize..40, 1..64),
        ) {
            let mut whole = Framer::new();
            let mut expected = Vec::new();
            let mut rest = &bytes[..];
            while !rest.is_empty() {
                let taken = whole.feed(rest);
                rest = &rest[taken..];
                expected.extend(whole.drain());
            }

            let mut chunked = Framer::new();
            let mut actual = Vec::new();
            let mut rest = &bytes[..];
            for cut in cuts.iter().cycle() {
                if rest.is_empty() {
                    break;
                }
                let chunk = &rest[..(*cut).min(rest.len())];
                let taken = chunked.feed(chunk);
                rest = &rest[taken..];
                actual.extend(chunked.drain());
            }

            prop_assert_eq!(actual, expected);
            prop_assert_eq!(chunked.buffered(), whole.buffered());
        }

        #[test]
        fn prop_buffer_holds_at_most_a_partial_packet_after_drain(
            bytes in proptest::collection::vec(any::<u8>(), 0..FRAME_BUFFER_LEN),
        ) {
            let mut framer = Framer::new();
            framer.feed(&bytes);
            let _ = framer.drain().count();

            prop_assert!(framer.len() < PACKET_LEN);
            if let Some(first) = framer.buffered().first() {
                prop_assert!(first & STATUS_MARKER != 0);
            }
        }
    }
}

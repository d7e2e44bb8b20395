//! Message buffer and deframer (C5): reads a framed IPFIX message from
//! an [`InputSource`], then deframes its sets into an ordered list for
//! parsing (§4.5).
//!
//! The buffer is reusable across messages (caller-owned) to avoid
//! per-message allocation; its capacity grows monotonically to the
//! largest observed message.

use crate::error::CoreError;

pub const IPFIX_VERSION: u16 = 10;
pub const MESSAGE_HEADER_SIZE: usize = 16;
pub const SET_HEADER_SIZE: usize = 4;

/// External collaborator (§6): a byte-stream the deframer reads
/// messages from. Transport-specific I/O (UDP, TCP, files) is out of
/// scope for the core; only this interface is.
pub trait InputSource {
    /// Read up to `buf.len()` octets. Returns the number of octets
    /// actually read: exactly `buf.len()` on success, `0` on clean
    /// EOF, or fewer on unrecoverable truncation (§6).
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Advisory: whether the source can report how much data is
    /// available without consuming it.
    fn can_peek(&self) -> bool;

    /// Byte offset of the start of the message currently being read,
    /// within this source's stream (stream sources only; datagram
    /// sources may return 0 throughout).
    fn message_offset(&self) -> u64;

    /// Called once a message has been fully deframed, to advance the
    /// source's notion of "current message" bookkeeping.
    fn advance_message_offset(&mut self);

    /// After a format error on a datagram-like source, attempt to
    /// reposition to the next plausible message boundary. Returns
    /// `true` if repositioned, `false` if impossible (e.g. mid-stream
    /// on a TCP connection where no boundary can be inferred).
    fn resync(&mut self) -> bool;
}

/// Decoded 16-octet message header (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u16,
    pub length: u16,
    pub export_time: u32,
    pub sequence_number: u32,
    pub observation_domain_id: u32,
}

impl MessageHeader {
    pub fn decode(buf: &[u8; MESSAGE_HEADER_SIZE]) -> Self {
        MessageHeader {
            version: u16::from_be_bytes([buf[0], buf[1]]),
            length: u16::from_be_bytes([buf[2], buf[3]]),
            export_time: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            sequence_number: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
            observation_domain_id: u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]),
        }
    }

    pub fn encode(&self, out: &mut [u8; MESSAGE_HEADER_SIZE]) {
        out[0..2].copy_from_slice(&self.version.to_be_bytes());
        out[2..4].copy_from_slice(&self.length.to_be_bytes());
        out[4..8].copy_from_slice(&self.export_time.to_be_bytes());
        out[8..12].copy_from_slice(&self.sequence_number.to_be_bytes());
        out[12..16].copy_from_slice(&self.observation_domain_id.to_be_bytes());
    }
}

/// One entry in the deframed set list: a set's ID, total length
/// (including its own 4-octet header), and byte offset within the
/// message buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetListEntry {
    pub id: u16,
    pub len: u16,
    pub offset: usize,
}

impl SetListEntry {
    /// Offset of the set's payload, just past its own header.
    pub fn payload_offset(&self) -> usize {
        self.offset + SET_HEADER_SIZE
    }

    pub fn payload_len(&self) -> usize {
        self.len as usize - SET_HEADER_SIZE
    }
}

/// Result of a deframe attempt (§4.5, step 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeframeOutcome {
    /// A message was fully deframed; `header` and `sets()` are valid.
    Message,
    /// Clean EOF before any bytes of a new message were read.
    NoMessage,
}

/// Caller-owned, reusable buffer that a message is deframed into.
/// Capacity grows monotonically to the largest message seen so the
/// steady-state path performs no further allocation.
pub struct MessageBuffer {
    buf: Vec<u8>,
    filled: usize,
    sets: Vec<SetListEntry>,
    header: Option<MessageHeader>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        MessageBuffer {
            buf: Vec::new(),
            filled: 0,
            sets: Vec::new(),
            header: None,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MessageBuffer {
            buf: vec![0u8; capacity],
            filled: 0,
            sets: Vec::new(),
            header: None,
        }
    }

    fn ensure_capacity(&mut self, needed: usize) {
        if self.buf.len() < needed {
            self.buf.resize(needed, 0);
        }
    }

    /// Full bytes of the message (header included), valid after a
    /// successful [`MessageBuffer::deframe`].
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    pub fn header(&self) -> Option<MessageHeader> {
        self.header
    }

    pub fn sets(&self) -> &[SetListEntry] {
        &self.sets
    }

    /// Read one octet range of exactly `n` bytes from `source` into
    /// `self.buf[at..at+n]`. A short, non-zero read is `Truncated`; a
    /// zero-byte read at `at == 0` is reported to the caller as
    /// [`DeframeOutcome::NoMessage`] by [`MessageBuffer::deframe`].
    fn fill_exact(
        &mut self,
        source: &mut dyn InputSource,
        at: usize,
        n: usize,
    ) -> std::io::Result<usize> {
        self.ensure_capacity(at + n);
        source.read(&mut self.buf[at..at + n])
    }

    /// Run the deframe protocol described in §4.5: read the 16-octet
    /// header, validate version, read the remainder of the message,
    /// then walk the set list.
    pub fn deframe(&mut self, source: &mut dyn InputSource) -> Result<DeframeOutcome, CoreError> {
        self.sets.clear();
        self.header = None;
        self.filled = 0;

        let read = self
            .fill_exact(source, 0, MESSAGE_HEADER_SIZE)
            .map_err(|_| CoreError::Truncated)?;
        if read == 0 {
            return Ok(DeframeOutcome::NoMessage);
        }
        if read != MESSAGE_HEADER_SIZE {
            return Err(CoreError::Truncated);
        }

        let mut header_bytes = [0u8; MESSAGE_HEADER_SIZE];
        header_bytes.copy_from_slice(&self.buf[0..MESSAGE_HEADER_SIZE]);
        let header = MessageHeader::decode(&header_bytes);

        if header.version != IPFIX_VERSION {
            return Err(CoreError::VersionMismatch {
                expected: IPFIX_VERSION,
                got: header.version,
            });
        }
        if (header.length as usize) < MESSAGE_HEADER_SIZE {
            return Err(CoreError::MalformedSet {
                reason: "message length smaller than header",
            });
        }

        let remaining = header.length as usize - MESSAGE_HEADER_SIZE;
        if remaining > 0 {
            let read = self
                .fill_exact(source, MESSAGE_HEADER_SIZE, remaining)
                .map_err(|_| CoreError::Truncated)?;
            if read != remaining {
                return Err(CoreError::Truncated);
            }
        }
        self.filled = header.length as usize;
        self.header = Some(header);

        let mut offset = MESSAGE_HEADER_SIZE;
        while offset < self.filled {
            if offset + SET_HEADER_SIZE > self.filled {
                return Err(CoreError::MalformedSet {
                    reason: "set header overruns message",
                });
            }
            let id = u16::from_be_bytes([self.buf[offset], self.buf[offset + 1]]);
            let len = u16::from_be_bytes([self.buf[offset + 2], self.buf[offset + 3]]);
            if (len as usize) < SET_HEADER_SIZE {
                return Err(CoreError::MalformedSet {
                    reason: "set length shorter than its own header",
                });
            }
            if offset + len as usize > self.filled {
                return Err(CoreError::MalformedSet {
                    reason: "set overruns message",
                });
            }
            self.sets.push(SetListEntry { id, len, offset });
            offset += len as usize;
        }

        source.advance_message_offset();
        Ok(DeframeOutcome::Message)
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        MessageBuffer::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    /// A fixed byte slice played back as an [`InputSource`], one
    /// `read` call draining it completely (TCP-stream style partial
    /// reads are exercised in the ambient `io::tcp` tests instead).
    struct SliceSource<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> InputSource for SliceSource<'a> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = self.data.len() - self.pos;
            if remaining == 0 {
                return Ok(0);
            }
            let n = buf.len().min(remaining);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
        fn can_peek(&self) -> bool {
            true
        }
        fn message_offset(&self) -> u64 {
            self.pos as u64
        }
        fn advance_message_offset(&mut self) {}
        fn resync(&mut self) -> bool {
            false
        }
    }

    fn header_bytes() -> Vec<u8> {
        // version=10 length=16 export_time=0x5F000000 seq=42 domain=7
        hex_literal::hex!("000A 0010 5F000000 0000002A 00000007").to_vec()
    }

    #[test]
    fn header_round_trip_matches_scenario_s1() {
        let mut source = SliceSource {
            data: &header_bytes(),
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        assert_eq!(mb.deframe(&mut source).unwrap(), DeframeOutcome::Message);
        let h = mb.header().unwrap();
        assert_eq!(
            h,
            MessageHeader {
                version: 10,
                length: 16,
                export_time: 0x5F000000,
                sequence_number: 42,
                observation_domain_id: 7,
            }
        );
        assert!(mb.sets().is_empty());
    }

    #[test]
    fn clean_eof_reports_no_message() {
        let mut source = SliceSource { data: &[], pos: 0 };
        let mut mb = MessageBuffer::new();
        assert_eq!(mb.deframe(&mut source).unwrap(), DeframeOutcome::NoMessage);
    }

    #[test]
    fn version_mismatch_is_reported() {
        let mut bytes = header_bytes();
        bytes[1] = 9; // version = 9
        let mut source = SliceSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        assert_eq!(
            mb.deframe(&mut source),
            Err(CoreError::VersionMismatch {
                expected: 10,
                got: 9
            })
        );
    }

    #[test]
    fn truncated_message_is_fatal() {
        let bytes = header_bytes();
        let mut source = SliceSource {
            data: &bytes[0..10],
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        assert_eq!(mb.deframe(&mut source), Err(CoreError::Truncated));
    }

    #[test]
    fn set_list_walks_multiple_sets() {
        // header (length=24) + two 4-byte empty sets
        let mut bytes = header_bytes();
        bytes[2..4].copy_from_slice(&24u16.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes()); // set id 2 (template set)
        bytes.extend_from_slice(&4u16.to_be_bytes()); // set len 4 (empty)
        bytes.extend_from_slice(&256u16.to_be_bytes()); // set id 256 (data set)
        bytes.extend_from_slice(&4u16.to_be_bytes()); // set len 4 (empty)

        let mut source = SliceSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        assert_eq!(mb.deframe(&mut source).unwrap(), DeframeOutcome::Message);
        assert_eq!(mb.sets().len(), 2);
        assert_eq!(mb.sets()[0].id, 2);
        assert_eq!(mb.sets()[1].id, 256);
    }

    #[test]
    fn set_length_too_short_is_malformed() {
        let mut bytes = header_bytes();
        bytes[2..4].copy_from_slice(&20u16.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&2u16.to_be_bytes()); // len=2 < SET_HEADER_SIZE

        let mut source = SliceSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        assert!(matches!(
            mb.deframe(&mut source),
            Err(CoreError::MalformedSet { .. })
        ));
    }
}

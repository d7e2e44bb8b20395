//! Reference exporter: scatter-gather message assembly over an
//! [`ExportDestination`], with the late-bound header described in §9
//! ("Scatter-gather export with late-bound header").
//!
//! This lives alongside the core but is itself a reference
//! collaborator, not part of it (§1): the core only defines the wire
//! layout primitives (`MessageHeader`, `WireTemplate`); assembling a
//! full message from a sequence of encoded chunks and writing it out is
//! an application-level concern.

use crate::error::CoreError;
use crate::message::{MessageHeader, IPFIX_VERSION, MESSAGE_HEADER_SIZE, SET_HEADER_SIZE};
use crate::template::WireTemplate;

/// External collaborator (§6): a byte sink the exporter writes
/// messages to.
pub trait ExportDestination {
    /// Scatter-gather write of `iovecs` as one logical write. Returns
    /// total octets written, or an I/O error.
    fn writev(&mut self, iovecs: &[&[u8]]) -> std::io::Result<usize>;

    /// Soft MTU hint: the exporter should flush before a message would
    /// exceed this size.
    fn preferred_maximum_message_size(&self) -> usize;

    /// When true, every message must be self-contained (templates
    /// re-exported each message); when false, templates emitted once
    /// per session suffice.
    fn is_connectionless(&self) -> bool;
}

/// Encode `wire`'s template record as a complete template set (set
/// header included), ready to hand to [`Exporter::flush_message`] as
/// one chunk.
pub fn encode_template_set_chunk(wire: &WireTemplate) -> Vec<u8> {
    let mut buf = vec![0u8; wire.template_record_len() + SET_HEADER_SIZE];
    buf[0..2].copy_from_slice(&2u16.to_be_bytes()); // template set id
    buf[2..4].copy_from_slice(&((wire.template_record_len() + SET_HEADER_SIZE) as u16).to_be_bytes());
    buf[4..6].copy_from_slice(&wire.id().to_be_bytes());
    buf[6..8].copy_from_slice(&(wire.fields().len() as u16).to_be_bytes());
    let mut xc = crate::transcoder::Transcoder::new(&mut buf[8..]);
    wire.encode_field_specifiers(&mut xc);
    buf
}

/// Wrap `records` (already-encoded data records for `template_id`,
/// concatenated) in a data-set header, ready for
/// [`Exporter::flush_message`].
pub fn encode_data_set_chunk(template_id: u16, records: &[u8]) -> Result<Vec<u8>, CoreError> {
    let total = SET_HEADER_SIZE + records.len();
    if total > u16::MAX as usize {
        return Err(CoreError::EncodeBufferFull);
    }
    let mut buf = Vec::with_capacity(total);
    buf.extend_from_slice(&template_id.to_be_bytes());
    buf.extend_from_slice(&(total as u16).to_be_bytes());
    buf.extend_from_slice(records);
    Ok(buf)
}

/// Assembles and flushes IPFIX messages onto an [`ExportDestination`],
/// tracking the per-session sequence number (§6).
pub struct Exporter<'a> {
    destination: &'a mut dyn ExportDestination,
    sequence_number: u32,
}

impl<'a> Exporter<'a> {
    pub fn new(destination: &'a mut dyn ExportDestination) -> Self {
        Exporter {
            destination,
            sequence_number: 0,
        }
    }

    pub fn sequence_number(&self) -> u32 {
        self.sequence_number
    }

    /// Build one message out of `chunks` (each already a complete set,
    /// template or data), encode the 16-octet header with the final
    /// length filled in last, and write the whole thing in a single
    /// scatter-gather call — the "late-bound header" pattern (§9).
    pub fn flush_message(
        &mut self,
        observation_domain_id: u32,
        export_time: u32,
        chunks: &[Vec<u8>],
    ) -> Result<usize, CoreError> {
        let body_len: usize = chunks.iter().map(Vec::len).sum();
        let total_len = MESSAGE_HEADER_SIZE + body_len;
        if total_len > u16::MAX as usize {
            return Err(CoreError::EncodeBufferFull);
        }

        let header = MessageHeader {
            version: IPFIX_VERSION,
            length: total_len as u16,
            export_time,
            sequence_number: self.sequence_number,
            observation_domain_id,
        };
        let mut header_bytes = [0u8; MESSAGE_HEADER_SIZE];
        header.encode(&mut header_bytes);

        let mut iovecs: Vec<&[u8]> = Vec::with_capacity(1 + chunks.len());
        iovecs.push(&header_bytes);
        for chunk in chunks {
            iovecs.push(chunk.as_slice());
        }

        let written = self
            .destination
            .writev(&iovecs)
            .map_err(|_| CoreError::EncodeBufferFull)?;
        self.sequence_number = self.sequence_number.wrapping_add(1);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::STANDARD_CATALOG;

    struct VecDestination {
        written: Vec<u8>,
        connectionless: bool,
    }

    impl ExportDestination for VecDestination {
        fn writev(&mut self, iovecs: &[&[u8]]) -> std::io::Result<usize> {
            let mut total = 0;
            for iov in iovecs {
                self.written.extend_from_slice(iov);
                total += iov.len();
            }
            Ok(total)
        }
        fn preferred_maximum_message_size(&self) -> usize {
            1472
        }
        fn is_connectionless(&self) -> bool {
            self.connectionless
        }
    }

    #[test]
    fn flush_message_writes_header_with_correctly_computed_length() {
        let mut dest = VecDestination {
            written: Vec::new(),
            connectionless: true,
        };
        let mut exporter = Exporter::new(&mut dest);

        let chunk = vec![0xAAu8; 10];
        exporter
            .flush_message(7, 0x5F000000, std::slice::from_ref(&chunk))
            .unwrap();

        assert_eq!(dest.written.len(), MESSAGE_HEADER_SIZE + 10);
        let length = u16::from_be_bytes([dest.written[2], dest.written[3]]);
        assert_eq!(length as usize, MESSAGE_HEADER_SIZE + 10);
        assert_eq!(&dest.written[MESSAGE_HEADER_SIZE..], &chunk[..]);
    }

    #[test]
    fn sequence_number_increments_once_per_flushed_message() {
        let mut dest = VecDestination {
            written: Vec::new(),
            connectionless: false,
        };
        let mut exporter = Exporter::new(&mut dest);
        exporter.flush_message(1, 0, &[]).unwrap();
        exporter.flush_message(1, 0, &[]).unwrap();
        assert_eq!(exporter.sequence_number(), 2);
    }

    #[test]
    fn template_set_chunk_round_trips_through_field_specifier_encoding() {
        let ie = STANDARD_CATALOG.lookup_by_name("octetDeltaCount").unwrap();
        let mut wire = WireTemplate::new(256);
        wire.add(ie, 8).unwrap();
        wire.activate();

        let chunk = encode_template_set_chunk(&wire);
        assert_eq!(u16::from_be_bytes([chunk[0], chunk[1]]), 2);
        assert_eq!(chunk.len(), wire.template_record_len() + SET_HEADER_SIZE);
        assert_eq!(u16::from_be_bytes([chunk[8], chunk[9]]), ie.number);
        assert_eq!(u16::from_be_bytes([chunk[10], chunk[11]]), 8);
    }

    #[test]
    fn data_set_chunk_larger_than_u16_max_is_rejected() {
        let records = vec![0u8; u16::MAX as usize];
        assert!(matches!(
            encode_data_set_chunk(256, &records),
            Err(CoreError::EncodeBufferFull)
        ));
    }
}

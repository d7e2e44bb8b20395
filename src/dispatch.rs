//! Dispatch (C7): the SAX-style `ContentHandler` interface, the driver
//! that walks a deframed message and fires its events, and two
//! concrete handlers — `PlacementCollector` (matches placements
//! against wire templates and decodes records through a cached plan)
//! and `PrintContentHandler` (logs every event, §11.3).

use std::collections::HashMap;

use crate::error::{CoreError, ErrorContext};
use crate::ie::{IeCatalog, InformationElement};
use crate::message::{MessageBuffer, MessageHeader, SetListEntry};
use crate::plan::{compile_decode_plan, DecodePlan};
use crate::session::Session;
use crate::template::{PlacementTemplate, TemplateField, WireTemplate};
use crate::transcoder::Transcoder;

const SET_ID_TEMPLATE: u16 = 2;
const SET_ID_OPTIONS_TEMPLATE: u16 = 3;

/// SAX-style event sink (§4.7). Every method defaults to `Ok(())` so an
/// implementation only overrides the events it cares about.
///
/// `field_specifier` fires once per field, between the matching
/// `start_*_record`/`end_*_record` pair, in wire order — an
/// implementation that wants to reconstruct the wire template itself
/// (as [`PlacementCollector`] does) accumulates fields there and
/// finalizes on `end_template_record`/`end_options_template_record`.
#[allow(unused_variables)]
pub trait ContentHandler {
    fn start_session(&mut self) -> ErrorContext {
        Ok(())
    }
    fn end_session(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_message(&mut self, header: MessageHeader) -> ErrorContext {
        Ok(())
    }
    fn end_message(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_template_set(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_template_record(&mut self, template_id: u16, field_count: u16) -> ErrorContext {
        Ok(())
    }
    fn field_specifier(&mut self, ie: &'static InformationElement, wire_len: u16) -> ErrorContext {
        Ok(())
    }
    fn end_template_record(&mut self, template_id: u16) -> ErrorContext {
        Ok(())
    }
    fn end_template_set(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_options_template_set(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_options_template_record(
        &mut self,
        template_id: u16,
        field_count: u16,
        scope_field_count: u16,
    ) -> ErrorContext {
        Ok(())
    }
    fn end_options_template_record(&mut self, template_id: u16) -> ErrorContext {
        Ok(())
    }
    fn end_options_template_set(&mut self) -> ErrorContext {
        Ok(())
    }
    fn start_data_set(&mut self, template_id: u16, payload: &[u8]) -> ErrorContext {
        Ok(())
    }
    fn end_data_set(&mut self, template_id: u16) -> ErrorContext {
        Ok(())
    }

    /// Not one of the wire-structure events above: fired when the
    /// driver observes a recoverable error (§7) while walking a
    /// message, immediately before it skips to the next set. Mirrors
    /// the `warning`/`error` callbacks of a conventional SAX
    /// `ErrorHandler` — the ambient logger (§10.2) hangs its `warn`
    /// level off this event.
    fn on_recoverable_error(&mut self, error: &CoreError) -> ErrorContext {
        Ok(())
    }
}

/// Walks a deframed [`MessageBuffer`], maintaining per-domain template
/// and sequence-number state in its own [`Session`], firing
/// [`ContentHandler`] events in wire order (§4.7, §5).
pub struct Parser<'a> {
    catalog: &'a IeCatalog,
    session: Session,
}

impl<'a> Parser<'a> {
    pub fn new(catalog: &'a IeCatalog) -> Self {
        Parser {
            catalog,
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Process one already-deframed message, firing `handler`'s
    /// events. Returns `Err` only for a fatal error (§5, "Cancellation");
    /// recoverable errors are surfaced via
    /// [`ContentHandler::on_recoverable_error`] and the offending set is
    /// skipped.
    pub fn parse_message(
        &mut self,
        mb: &MessageBuffer,
        handler: &mut dyn ContentHandler,
    ) -> ErrorContext {
        let header = match mb.header() {
            Some(h) => h,
            None => return Ok(()),
        };

        handler.start_message(header)?;

        let domain = self.session.domain(header.observation_domain_id);
        if let Err(gap) = domain.observe_sequence(header.sequence_number) {
            handler.on_recoverable_error(&gap)?;
        }

        for set in mb.sets() {
            let result = self.parse_set(mb, *set, handler);
            if let Err(e) = result {
                if e.is_fatal() {
                    return Err(e);
                }
                handler.on_recoverable_error(&e)?;
            }
        }

        handler.end_message()
    }

    fn parse_set(
        &mut self,
        mb: &MessageBuffer,
        set: SetListEntry,
        handler: &mut dyn ContentHandler,
    ) -> Result<(), CoreError> {
        let domain_id = mb.header().expect("checked by caller").observation_domain_id;
        let payload = &mb.bytes()[set.payload_offset()..set.payload_offset() + set.payload_len()];

        match set.id {
            SET_ID_TEMPLATE => {
                handler.start_template_set()?;
                self.parse_template_records(domain_id, payload, handler, false)?;
                handler.end_template_set()?;
            }
            SET_ID_OPTIONS_TEMPLATE => {
                handler.start_options_template_set()?;
                self.parse_template_records(domain_id, payload, handler, true)?;
                handler.end_options_template_set()?;
            }
            tid if tid >= 256 => {
                let defined = self.session.domain(domain_id).lookup(tid).is_some();
                if !defined {
                    return Err(CoreError::UnknownTemplate { tid });
                }
                handler.start_data_set(tid, payload)?;
                handler.end_data_set(tid)?;
            }
            _ => {
                return Err(CoreError::MalformedSet {
                    reason: "reserved set id",
                })
            }
        }
        Ok(())
    }

    /// Decode one or more template (or options template) records
    /// packed back-to-back in a set's payload, firing the matching
    /// `ContentHandler` events and updating the session's per-domain
    /// template table as each record completes.
    fn parse_template_records(
        &mut self,
        domain_id: u32,
        payload: &[u8],
        handler: &mut dyn ContentHandler,
        options: bool,
    ) -> Result<(), CoreError> {
        let mut offset = 0usize;
        while offset + 4 <= payload.len() {
            let template_id = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
            let field_count = u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]);
            offset += 4;

            if field_count == 0 {
                self.session.domain(domain_id).withdraw(template_id);
                if options {
                    handler.start_options_template_record(template_id, 0, 0)?;
                    handler.end_options_template_record(template_id)?;
                } else {
                    handler.start_template_record(template_id, 0)?;
                    handler.end_template_record(template_id)?;
                }
                continue;
            }

            let scope_field_count = if options {
                if offset + 2 > payload.len() {
                    return Err(CoreError::MalformedSet {
                        reason: "options template truncated before scope field count",
                    });
                }
                let v = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
                offset += 2;
                v
            } else {
                0
            };

            if options {
                handler.start_options_template_record(template_id, field_count, scope_field_count)?;
            } else {
                handler.start_template_record(template_id, field_count)?;
            }

            let mut wire = WireTemplate::new(template_id);
            for _ in 0..field_count {
                if offset + 4 > payload.len() {
                    return Err(CoreError::MalformedSet {
                        reason: "template record truncated mid-field",
                    });
                }
                let raw_id = u16::from_be_bytes([payload[offset], payload[offset + 1]]);
                let wire_len = u16::from_be_bytes([payload[offset + 2], payload[offset + 3]]);
                offset += 4;
                let (number, pen) = if raw_id & 0x8000 != 0 {
                    if offset + 4 > payload.len() {
                        return Err(CoreError::MalformedSet {
                            reason: "enterprise number truncated",
                        });
                    }
                    let pen = u32::from_be_bytes([
                        payload[offset],
                        payload[offset + 1],
                        payload[offset + 2],
                        payload[offset + 3],
                    ]);
                    offset += 4;
                    (raw_id & 0x7FFF, pen)
                } else {
                    (raw_id, 0)
                };

                let ie = self.catalog.lookup_by_number(pen, number).ok_or(
                    CoreError::MalformedSet {
                        reason: "template references unknown information element",
                    },
                )?;
                wire.add(ie, wire_len)
                    .map_err(|_| CoreError::MalformedSet {
                        reason: "template add attempted after activation",
                    })?;
                handler.field_specifier(ie, wire_len)?;
            }

            wire.activate();
            self.session.domain(domain_id).define(wire);

            if options {
                handler.end_options_template_record(template_id)?;
            } else {
                handler.end_template_record(template_id)?;
            }
        }
        Ok(())
    }
}

/// One registered interest: a placement template plus the callback
/// invoked for each matching decoded record.
struct Registration {
    placement: PlacementTemplate,
    callback: Box<dyn FnMut(&[u8]) -> ErrorContext>,
}

/// Cached binding of a wire template to one of the registered
/// placements (§4.7): which registration matched, the compiled plan,
/// and the field signature the binding was compiled against (so a
/// template redefinition invalidates it).
struct CachedBinding {
    fields: Vec<TemplateField>,
    registration_index: usize,
    plan: DecodePlan,
}

/// `ContentHandler` that mirrors incoming wire templates purely from
/// the events it receives (it never reaches into a [`Session`]),
/// matches each against the registered placements in registration
/// order, and decodes every data-set record through a cached
/// [`DecodePlan`] (§4.7).
#[derive(Default)]
pub struct PlacementCollector {
    registrations: Vec<Registration>,
    templates: HashMap<u16, WireTemplate>,
    bindings: HashMap<u16, CachedBinding>,
    /// Template currently being assembled from `field_specifier`
    /// events, between a `start_*_record`/`end_*_record` pair.
    building: Option<WireTemplate>,
    /// Mutable copy of the set payload the transcoder walks; reused
    /// across `start_data_set` calls instead of reallocated per set
    /// (§5, §9 — no steady-state allocation on the decode hot path).
    scratch: Vec<u8>,
    /// Decode destination for one record, reused across iterations of
    /// the per-set loop; grows monotonically to the largest binding
    /// extent seen and is re-zeroed before each record.
    record_buf: Vec<u8>,
}

impl PlacementCollector {
    pub fn new() -> Self {
        PlacementCollector::default()
    }

    /// Register interest in records matching `placement`'s IE set.
    /// Placements are tried in registration order; the first whose IE
    /// set is a subset of an incoming wire template's IE set wins that
    /// template (§4.7).
    pub fn register_placement(
        &mut self,
        placement: PlacementTemplate,
        callback: impl FnMut(&[u8]) -> ErrorContext + 'static,
    ) {
        self.registrations.push(Registration {
            placement,
            callback: Box::new(callback),
        });
    }

    fn bind(&mut self, template_id: u16) -> Option<&mut CachedBinding> {
        let wire = self.templates.get(&template_id)?;
        let needs_rebuild = match self.bindings.get(&template_id) {
            Some(cached) => cached.fields.as_slice() != wire.fields(),
            None => true,
        };
        if needs_rebuild {
            self.bindings.remove(&template_id);
            let found = self
                .registrations
                .iter()
                .enumerate()
                .find(|(_, r)| r.placement.is_subset_of(wire));
            let (index, registration) = found?;
            let plan = compile_decode_plan(wire, &registration.placement).ok()?;
            self.bindings.insert(
                template_id,
                CachedBinding {
                    fields: wire.fields().to_vec(),
                    registration_index: index,
                    plan,
                },
            );
        }
        self.bindings.get_mut(&template_id)
    }
}

impl ContentHandler for PlacementCollector {
    fn field_specifier(&mut self, ie: &'static InformationElement, wire_len: u16) -> ErrorContext {
        if let Some(wire) = self.building.as_mut() {
            wire.add(ie, wire_len)
                .map_err(|_| CoreError::TemplateInactive)?;
        }
        Ok(())
    }

    fn start_template_record(&mut self, template_id: u16, _field_count: u16) -> ErrorContext {
        self.building = Some(WireTemplate::new(template_id));
        Ok(())
    }

    fn end_template_record(&mut self, template_id: u16) -> ErrorContext {
        if let Some(mut wire) = self.building.take() {
            wire.activate();
            self.templates.insert(template_id, wire);
            self.bindings.remove(&template_id);
        }
        Ok(())
    }

    fn start_options_template_record(
        &mut self,
        template_id: u16,
        _field_count: u16,
        _scope_field_count: u16,
    ) -> ErrorContext {
        self.building = Some(WireTemplate::new(template_id));
        Ok(())
    }

    fn end_options_template_record(&mut self, template_id: u16) -> ErrorContext {
        self.end_template_record(template_id)
    }

    /// Decode every record in the set through the cached plan,
    /// invoking the matched registration's callback for each one. The
    /// stop condition is the one described in §4.6: advance while the
    /// transcoder reports at least `plan.minlen()` octets remain.
    fn start_data_set(&mut self, template_id: u16, payload: &[u8]) -> ErrorContext {
        if self.bind(template_id).is_none() {
            return Ok(()); // no registered interest in this template
        }
        let (registration_index, minlen) = {
            let binding = self.bindings.get(&template_id).expect("just bound above");
            (binding.registration_index, binding.plan.minlen())
        };
        let record_size = self.registrations[registration_index]
            .placement
            .binding_extent();

        self.scratch.clear();
        self.scratch.extend_from_slice(payload);
        if self.record_buf.len() < record_size {
            self.record_buf.resize(record_size, 0);
        }

        let mut xc = Transcoder::new(&mut self.scratch);
        while xc.avail() >= minlen {
            self.record_buf[..record_size].fill(0);
            let binding = self.bindings.get(&template_id).expect("just bound above");
            binding
                .plan
                .execute(&mut xc, &mut self.record_buf[..record_size])?;
            (self.registrations[registration_index].callback)(&self.record_buf[..record_size])?;
        }
        Ok(())
    }
}

/// Reference `ContentHandler` (§11.3) that logs every event through
/// the ambient logging facility instead of placing values — useful for
/// tracing a stream before any placement code is written.
#[derive(Default)]
pub struct PrintContentHandler;

impl PrintContentHandler {
    pub fn new() -> Self {
        PrintContentHandler
    }
}

impl ContentHandler for PrintContentHandler {
    fn start_message(&mut self, header: MessageHeader) -> ErrorContext {
        log::debug!(
            "message: domain={} seq={} len={}",
            header.observation_domain_id,
            header.sequence_number,
            header.length
        );
        Ok(())
    }

    fn start_template_record(&mut self, template_id: u16, field_count: u16) -> ErrorContext {
        log::debug!("template record {template_id}: {field_count} fields");
        Ok(())
    }

    fn field_specifier(&mut self, ie: &'static InformationElement, wire_len: u16) -> ErrorContext {
        log::trace!("  field {ie} wire_len={wire_len}");
        Ok(())
    }

    fn start_options_template_record(
        &mut self,
        template_id: u16,
        field_count: u16,
        scope_field_count: u16,
    ) -> ErrorContext {
        log::debug!(
            "options template record {template_id}: {field_count} fields ({scope_field_count} scope)"
        );
        Ok(())
    }

    fn start_data_set(&mut self, template_id: u16, payload: &[u8]) -> ErrorContext {
        log::trace!("data set {template_id}: {} payload octets", payload.len());
        Ok(())
    }

    fn on_recoverable_error(&mut self, error: &CoreError) -> ErrorContext {
        log::warn!("recoverable error: {error}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::ie::STANDARD_CATALOG;
    use crate::message::InputSource;

    struct BytesSource<'a> {
        data: &'a [u8],
        pos: usize,
    }

    impl<'a> InputSource for BytesSource<'a> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let remaining = self.data.len() - self.pos;
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

    fn push_header(bytes: &mut Vec<u8>, length: u16, seq: u32, domain: u32) {
        bytes.extend_from_slice(&10u16.to_be_bytes());
        bytes.extend_from_slice(&length.to_be_bytes());
        bytes.extend_from_slice(&0x5F000000u32.to_be_bytes());
        bytes.extend_from_slice(&seq.to_be_bytes());
        bytes.extend_from_slice(&domain.to_be_bytes());
    }

    fn push_template_set_single_field(bytes: &mut Vec<u8>, template_id: u16, ie_number: u16, wire_len: u16) {
        bytes.extend_from_slice(&2u16.to_be_bytes()); // set id 2
        bytes.extend_from_slice(&12u16.to_be_bytes()); // set len
        bytes.extend_from_slice(&template_id.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes()); // field count
        bytes.extend_from_slice(&ie_number.to_be_bytes());
        bytes.extend_from_slice(&wire_len.to_be_bytes());
    }

    fn push_withdrawal(bytes: &mut Vec<u8>, template_id: u16) {
        bytes.extend_from_slice(&2u16.to_be_bytes());
        bytes.extend_from_slice(&8u16.to_be_bytes()); // set len: 4 header + 4 payload
        bytes.extend_from_slice(&template_id.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes()); // field count 0 = withdrawal
    }

    fn push_data_set(bytes: &mut Vec<u8>, template_id: u16, payload: &[u8]) {
        bytes.extend_from_slice(&template_id.to_be_bytes());
        bytes.extend_from_slice(&((4 + payload.len()) as u16).to_be_bytes());
        bytes.extend_from_slice(payload);
    }

    #[test]
    fn placement_collector_decodes_minimal_data_record_scenario_s2() {
        let mut bytes = Vec::new();
        push_header(&mut bytes, 40, 1, 7);
        push_template_set_single_field(&mut bytes, 256, 1, 8); // octetDeltaCount
        push_data_set(&mut bytes, 256, &0x0102030405060708u64.to_be_bytes());

        let mut source = BytesSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        mb.deframe(&mut source).unwrap();

        let catalog = &*STANDARD_CATALOG;
        let mut parser = Parser::new(catalog);

        let octet_delta = catalog.lookup_by_name("octetDeltaCount").unwrap();
        let mut placement = PlacementTemplate::new();
        placement.place(octet_delta, 0, 8);

        let captured: Rc<RefCell<Vec<u64>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = captured.clone();
        let mut collector = PlacementCollector::new();
        collector.register_placement(placement, move |buf| {
            sink.borrow_mut()
                .push(u64::from_ne_bytes(buf[0..8].try_into().unwrap()));
            Ok(())
        });

        parser.parse_message(&mb, &mut collector).unwrap();
        assert_eq!(*captured.borrow(), vec![0x0102030405060708]);
    }

    #[test]
    fn unknown_template_in_data_set_is_recoverable_and_message_continues() {
        let mut bytes = Vec::new();
        push_header(&mut bytes, 24, 1, 7);
        push_data_set(&mut bytes, 999, &[0u8; 4]);

        let mut source = BytesSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        mb.deframe(&mut source).unwrap();

        let catalog = &*STANDARD_CATALOG;
        let mut parser = Parser::new(catalog);

        struct RecordingHandler {
            errors: Vec<CoreError>,
            ended: bool,
        }
        impl ContentHandler for RecordingHandler {
            fn on_recoverable_error(&mut self, error: &CoreError) -> ErrorContext {
                self.errors.push(error.clone());
                Ok(())
            }
            fn end_message(&mut self) -> ErrorContext {
                self.ended = true;
                Ok(())
            }
        }

        let mut handler = RecordingHandler {
            errors: Vec::new(),
            ended: false,
        };
        parser.parse_message(&mb, &mut handler).unwrap();
        assert_eq!(
            handler.errors,
            vec![CoreError::UnknownTemplate { tid: 999 }]
        );
        assert!(handler.ended);
    }

    #[test]
    fn withdrawal_record_removes_template_from_session() {
        let mut bytes = Vec::new();
        push_header(&mut bytes, 16 + 12 + 8, 1, 7);
        push_template_set_single_field(&mut bytes, 256, 1, 8);
        push_withdrawal(&mut bytes, 256);

        let mut source = BytesSource {
            data: &bytes,
            pos: 0,
        };
        let mut mb = MessageBuffer::new();
        mb.deframe(&mut source).unwrap();

        let catalog = &*STANDARD_CATALOG;
        let mut parser = Parser::new(catalog);
        let mut handler = PrintContentHandler::new();
        parser.parse_message(&mb, &mut handler).unwrap();

        assert!(parser
            .session()
            .domain_if_present(7)
            .unwrap()
            .lookup(256)
            .is_none());
    }

    #[test]
    fn sequence_gap_is_surfaced_as_recoverable_not_fatal() {
        let mut first = Vec::new();
        push_header(&mut first, 16, 1, 7);
        let mut second = Vec::new();
        push_header(&mut second, 16, 50, 7);

        let catalog = &*STANDARD_CATALOG;
        let mut parser = Parser::new(catalog);
        let mut handler = PrintContentHandler::new();

        let mut source1 = BytesSource {
            data: &first,
            pos: 0,
        };
        let mut mb1 = MessageBuffer::new();
        mb1.deframe(&mut source1).unwrap();
        parser.parse_message(&mb1, &mut handler).unwrap();

        let mut source2 = BytesSource {
            data: &second,
            pos: 0,
        };
        let mut mb2 = MessageBuffer::new();
        mb2.deframe(&mut source2).unwrap();
        // A gap is recoverable, not fatal: parse_message still returns Ok.
        assert!(parser.parse_message(&mb2, &mut handler).is_ok());
    }
}

//! Template model (C3): wire templates, placement templates, and the
//! struct-template variant used by callers with statically-laid-out
//! record buffers.
//!
//! A wire template is the template as it appears (or will appear) on
//! the wire: an ordered list of `(IE, wire_len)` pairs under a template
//! ID. A placement template is the caller's declared binding of IEs to
//! locations in a flat buffer the caller owns; order is not
//! significant there, only set membership.

use crate::ie::{InformationElement, VARLEN};

/// One field of a wire template: a reference to the catalog IE plus
/// the wire length this template carries it at (which may be a
/// reduced length, or `VARLEN`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateField {
    pub ie: &'static InformationElement,
    pub wire_len: u16,
}

impl TemplateField {
    pub fn is_varlen(&self) -> bool {
        self.wire_len == VARLEN
    }

    /// Octets this field contributes to `minlen`: the wire length
    /// itself, or 1 (the shortest possible varlen prefix) when varlen.
    fn minlen_contribution(&self) -> usize {
        if self.is_varlen() {
            1
        } else {
            self.wire_len as usize
        }
    }

    /// Octets this field contributes to a template record's own
    /// encoded length: 4, or 8 if the IE carries a private enterprise
    /// number.
    fn template_record_contribution(&self) -> usize {
        if self.ie.pen == 0 {
            4
        } else {
            8
        }
    }
}

/// Ordered sequence of fields under a template ID, as it appears on
/// the wire (§3, "Wire Template"). Immutable once [`activate`]d.
#[derive(Debug, Clone)]
pub struct WireTemplate {
    id: u16,
    fields: Vec<TemplateField>,
    active: bool,
    minlen: usize,
    template_record_len: usize,
}

/// Returned by a mutating call made after [`WireTemplate::activate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateInactiveError;

impl WireTemplate {
    /// A new, pre-activation template. `id` must be `>= 256` per the
    /// wire format (§6); this is not enforced here so that a caller
    /// composing a template incrementally can set the ID last, but
    /// [`WireTemplate::activate`] rejects anything smaller.
    pub fn new(id: u16) -> Self {
        WireTemplate {
            id,
            fields: Vec::new(),
            active: false,
            minlen: 0,
            template_record_len: 0,
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Append a field. Only legal before [`activate`]; after that,
    /// templates are immutable (§3, invariant e).
    pub fn add(
        &mut self,
        ie: &'static InformationElement,
        wire_len: u16,
    ) -> Result<(), TemplateInactiveError> {
        if self.active {
            return Err(TemplateInactiveError);
        }
        self.fields.push(TemplateField { ie, wire_len });
        Ok(())
    }

    /// Freeze the template and precompute `minlen` and the
    /// template-record length (§3, invariants b and c). Idempotent.
    pub fn activate(&mut self) {
        if self.active {
            return;
        }
        self.minlen = self
            .fields
            .iter()
            .map(TemplateField::minlen_contribution)
            .sum();
        self.template_record_len = 4
            + self
                .fields
                .iter()
                .map(TemplateField::template_record_contribution)
                .sum::<usize>();
        self.active = true;
    }

    pub fn fields(&self) -> &[TemplateField] {
        &self.fields
    }

    /// Sum of wire lengths with each varlen field contributing its
    /// 1-octet minimum prefix (§3, invariant b). Valid only once
    /// activated.
    pub fn minlen(&self) -> usize {
        self.minlen
    }

    /// `4 * fields_without_pen + 8 * fields_with_pen` (§3, invariant
    /// c), including the 4-octet template header.
    pub fn template_record_len(&self) -> usize {
        self.template_record_len
    }

    pub fn has_varlen_fields(&self) -> bool {
        self.fields.iter().any(TemplateField::is_varlen)
    }

    /// Set membership test used when matching placements (§4.3).
    pub fn contains(&self, ie: &InformationElement) -> bool {
        self.fields.iter().any(|f| f.ie == ie)
    }

    /// Two wire templates are equivalent for redefinition purposes
    /// (§4.4) when their ordered field lists match exactly.
    pub fn same_fields_as(&self, other: &WireTemplate) -> bool {
        self.fields == other.fields
    }

    /// Write this template's own field-specifier list (§6, "Template
    /// record") into `xc`, starting right after the 4-octet template
    /// header (which the caller writes, since it differs between
    /// ordinary and options template sets).
    pub fn encode_field_specifiers(&self, xc: &mut crate::transcoder::Transcoder<'_>) -> bool {
        for f in &self.fields {
            let enterprise_bit = if f.ie.pen != 0 { 0x8000 } else { 0 };
            if !xc.write_u16(f.ie.number | enterprise_bit) {
                return false;
            }
            if !xc.write_u16(f.wire_len) {
                return false;
            }
            if f.ie.pen != 0 && !xc.write_u32(f.ie.pen) {
                return false;
            }
        }
        true
    }
}

/// A single binding recorded by a [`PlacementTemplate`] or
/// [`StructTemplate`]: an IE bound to a `(byte_offset, byte_size)`
/// pair into a flat buffer the caller supplies at execution time
/// (§10.1 — offsets stand in for the originating implementation's raw
/// pointers).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub ie: &'static InformationElement,
    pub offset: usize,
    pub size: usize,
}

/// Caller-declared mapping from IEs to locations in a flat buffer
/// (§3, "Placement Template"). Order of registration is preserved for
/// iteration but is not semantically significant — matching is by set
/// membership only.
#[derive(Debug, Clone, Default)]
pub struct PlacementTemplate {
    bindings: Vec<Binding>,
}

impl PlacementTemplate {
    pub fn new() -> Self {
        PlacementTemplate::default()
    }

    /// Register a binding. `offset`/`size` describe a slot in the flat
    /// buffer that will be supplied to `decode_into`/`encode_from` at
    /// execution time, not at registration time.
    pub fn place(&mut self, ie: &'static InformationElement, offset: usize, size: usize) {
        self.bindings.retain(|b| b.ie != ie);
        self.bindings.push(Binding { ie, offset, size });
    }

    pub fn lookup_placement(&self, ie: &InformationElement) -> Option<Binding> {
        self.bindings.iter().find(|b| b.ie == ie).copied()
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// True iff every IE this placement declares also appears in
    /// `wire`. This is the matching rule used by the placement
    /// collector (§4.7) — the placement is a subset of the wire
    /// template's IE set.
    pub fn is_subset_of(&self, wire: &WireTemplate) -> bool {
        self.bindings.iter().all(|b| wire.contains(b.ie))
    }

    /// Sum of in-memory sizes of bound fields, used by the exporter to
    /// size a contiguously-packed outgoing record buffer (§4.3) when it
    /// is the one choosing the layout.
    pub fn data_record_size(&self) -> usize {
        self.bindings.iter().map(|b| b.size).sum()
    }

    /// `max(offset + size)` over all bindings: the smallest buffer that
    /// can hold every binding at the offset the caller chose for it.
    /// Unlike [`PlacementTemplate::data_record_size`], this accounts for
    /// caller-chosen layouts with gaps or non-contiguous ordering — the
    /// shape a generic decode destination (e.g. `PlacementCollector`'s
    /// scratch buffer) must be sized against.
    pub fn binding_extent(&self) -> usize {
        self.bindings
            .iter()
            .map(|b| b.offset + b.size)
            .max()
            .unwrap_or(0)
    }
}

/// Internal placement variant whose bindings are `IE -> (offset,
/// length)` within a statically-laid-out record struct (§3, "Struct
/// Template"). Structurally identical to [`PlacementTemplate`]; kept
/// as a distinct type because callers reach for it under a different
/// calling convention (a fixed `#[repr(C)]`-style struct rather than an
/// ad hoc set of placements assembled at runtime).
pub type StructTemplate = PlacementTemplate;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::{IEType, STANDARD_CATALOG};

    fn ie(name: &str) -> &'static InformationElement {
        STANDARD_CATALOG.lookup_by_name(name).unwrap()
    }

    #[test]
    fn minlen_counts_varlen_as_one_octet() {
        let mut t = WireTemplate::new(256);
        t.add(ie("octetDeltaCount"), 8).unwrap();
        t.add(ie("applicationName"), VARLEN).unwrap();
        t.activate();
        assert_eq!(t.minlen(), 8 + 1);
    }

    #[test]
    fn template_record_len_accounts_for_enterprise_fields() {
        let mut t = WireTemplate::new(256);
        t.add(ie("octetDeltaCount"), 8).unwrap(); // IETF, 4 octets
        let enterprise = STANDARD_CATALOG.lookup_by_number(55555, 1).unwrap();
        t.add(enterprise, 1).unwrap(); // enterprise, 8 octets
        t.activate();
        assert_eq!(t.template_record_len(), 4 + 4 + 8);
    }

    #[test]
    fn add_after_activate_is_rejected() {
        let mut t = WireTemplate::new(256);
        t.activate();
        assert_eq!(t.add(ie("octetDeltaCount"), 8), Err(TemplateInactiveError));
    }

    #[test]
    fn placement_subset_matching() {
        let mut wire = WireTemplate::new(256);
        wire.add(ie("octetDeltaCount"), 8).unwrap();
        wire.add(ie("packetDeltaCount"), 8).unwrap();
        wire.activate();

        let mut placement = PlacementTemplate::new();
        placement.place(ie("octetDeltaCount"), 0, 8);
        assert!(placement.is_subset_of(&wire));

        placement.place(ie("applicationName"), 8, 0);
        assert!(!placement.is_subset_of(&wire));
    }

    #[test]
    fn ie_equality_by_number_and_pen_means_same_ie_is_not_enterprise() {
        let iana = ie("octetDeltaCount");
        assert_eq!(iana.pen, 0);
    }

    #[test]
    fn data_record_size_sums_bound_field_sizes() {
        let mut placement = PlacementTemplate::new();
        placement.place(ie("octetDeltaCount"), 0, 8);
        placement.place(ie("packetDeltaCount"), 8, 4);
        assert_eq!(placement.data_record_size(), 12);
    }
}

//! Information element (IE) descriptors and the catalog that owns them.
//!
//! The catalog itself is a closed set of 20 semantic types (§4.1); the
//! population of *instances* (which IANA/enterprise IEs exist) is an
//! external concern (the core only consumes a populated catalog), but
//! this module ships a representative seed table so the crate is
//! directly usable.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Sentinel wire length marking a variable-length field.
pub const VARLEN: u16 = 0xFFFF;

/// The closed set of IPFIX abstract data types this core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IEType {
    OctetArray,
    Unsigned8,
    Unsigned16,
    Unsigned32,
    Unsigned64,
    Signed8,
    Signed16,
    Signed32,
    Signed64,
    Float32,
    Float64,
    Boolean,
    MacAddress,
    String,
    DateTimeSeconds,
    DateTimeMilliseconds,
    DateTimeMicroseconds,
    DateTimeNanoseconds,
    Ipv4Address,
    Ipv6Address,
}

impl IEType {
    /// Canonical native size in octets. `OctetArray`/`String` have no
    /// single native size — it is carried per-IE on
    /// [`InformationElement::default_length`] instead; `0` here means
    /// "not fixed by the type".
    pub fn native_size(&self) -> usize {
        use IEType::*;
        match self {
            OctetArray | String => 0,
            Unsigned8 | Signed8 | Boolean => 1,
            Unsigned16 | Signed16 => 2,
            Unsigned32 | Signed32 | Float32 | DateTimeSeconds => 4,
            Unsigned64 | Signed64 | Float64 | DateTimeMilliseconds | DateTimeMicroseconds
            | DateTimeNanoseconds => 8,
            MacAddress => 6,
            Ipv4Address => 4,
            Ipv6Address => 16,
        }
    }

    /// Whether this type's instances may be declared variable-length.
    pub fn is_variable_length(&self) -> bool {
        matches!(self, IEType::OctetArray | IEType::String)
    }

    /// Whether wire bytes for this type need endianness handling
    /// (byte-swapped on a little-endian host) rather than verbatim copy.
    pub fn is_endian_swappable(&self) -> bool {
        use IEType::*;
        matches!(
            self,
            Unsigned8
                | Unsigned16
                | Unsigned32
                | Unsigned64
                | Signed8
                | Signed16
                | Signed32
                | Signed64
                | Float32
                | Float64
                | DateTimeSeconds
                | DateTimeMilliseconds
                | DateTimeMicroseconds
                | DateTimeNanoseconds
                | Ipv4Address
        )
    }

    /// Whether `wire_len` is an admissible reduced-length encoding for
    /// this type (§4.1).
    pub fn allows_reduced_length(&self, wire_len: u16) -> bool {
        use IEType::*;
        match self {
            Unsigned8 | Unsigned16 | Unsigned32 | Unsigned64 | Signed8 | Signed16 | Signed32
            | Signed64 | DateTimeSeconds | DateTimeMilliseconds | DateTimeMicroseconds
            | DateTimeNanoseconds => wire_len >= 1 && wire_len as usize <= self.native_size(),
            Float32 => wire_len == 4,
            Float64 => wire_len == 4 || wire_len == 8,
            Boolean => wire_len == 1,
            MacAddress => wire_len == 6,
            Ipv4Address => wire_len == 4,
            Ipv6Address => wire_len == 16,
            String | OctetArray => wire_len == VARLEN || wire_len >= 1,
        }
    }
}

/// Immutable descriptor for one information element. The catalog owns
/// every instance for the process lifetime; templates hold non-owning
/// `&'static` references.
#[derive(Debug, Clone, Copy)]
pub struct InformationElement {
    pub name: &'static str,
    pub number: u16,
    pub pen: u32,
    pub ie_type: IEType,
    pub default_length: u16,
}

impl InformationElement {
    pub const fn new(
        name: &'static str,
        number: u16,
        pen: u32,
        ie_type: IEType,
        default_length: u16,
    ) -> Self {
        InformationElement {
            name,
            number,
            pen,
            ie_type,
            default_length,
        }
    }

    pub fn is_varlen(&self) -> bool {
        self.default_length == VARLEN
    }

    pub fn native_size(&self) -> usize {
        self.ie_type.native_size()
    }
}

impl PartialEq for InformationElement {
    fn eq(&self, other: &Self) -> bool {
        self.number == other.number && self.pen == other.pen
    }
}
impl Eq for InformationElement {}

impl std::hash::Hash for InformationElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.number.hash(state);
        self.pen.hash(state);
    }
}

impl std::fmt::Display for InformationElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.pen == 0 {
            write!(f, "{}({})", self.name, self.number)
        } else {
            write!(f, "{}({}/{})", self.name, self.pen, self.number)
        }
    }
}

/// A handful of well-known IANA information elements, plus a small set
/// of enterprise-scoped examples (PEN 55555) covering the semantic
/// types no common IANA IE demonstrates on its own (signed integers,
/// the two float widths, a fixed-length octet array). Not exhaustive —
/// IANA registry population is out of scope for the core (§1, §4.1).
static STANDARD_IES: &[InformationElement] = &[
    InformationElement::new("octetDeltaCount", 1, 0, IEType::Unsigned64, 8),
    InformationElement::new("packetDeltaCount", 2, 0, IEType::Unsigned64, 8),
    InformationElement::new("protocolIdentifier", 4, 0, IEType::Unsigned8, 1),
    InformationElement::new("ipClassOfService", 5, 0, IEType::Unsigned8, 1),
    InformationElement::new("tcpControlBits", 6, 0, IEType::Unsigned8, 1),
    InformationElement::new("sourceTransportPort", 7, 0, IEType::Unsigned16, 2),
    InformationElement::new("sourceIPv4Address", 8, 0, IEType::Ipv4Address, 4),
    InformationElement::new("sourceIPv4PrefixLength", 9, 0, IEType::Unsigned8, 1),
    InformationElement::new("ingressInterface", 10, 0, IEType::Unsigned32, 4),
    InformationElement::new("destinationTransportPort", 11, 0, IEType::Unsigned16, 2),
    InformationElement::new("destinationIPv4Address", 12, 0, IEType::Ipv4Address, 4),
    InformationElement::new("destinationIPv4PrefixLength", 13, 0, IEType::Unsigned8, 1),
    InformationElement::new("egressInterface", 14, 0, IEType::Unsigned32, 4),
    InformationElement::new("ipNextHopIPv4Address", 15, 0, IEType::Ipv4Address, 4),
    InformationElement::new("bgpSourceAsNumber", 16, 0, IEType::Unsigned32, 4),
    InformationElement::new("bgpDestinationAsNumber", 17, 0, IEType::Unsigned32, 4),
    InformationElement::new("flowEndSysUpTime", 21, 0, IEType::Unsigned32, 4),
    InformationElement::new("flowStartSysUpTime", 22, 0, IEType::Unsigned32, 4),
    InformationElement::new("sourceIPv6Address", 27, 0, IEType::Ipv6Address, 16),
    InformationElement::new("destinationIPv6Address", 28, 0, IEType::Ipv6Address, 16),
    InformationElement::new("icmpTypeCodeIPv4", 32, 0, IEType::Unsigned16, 2),
    InformationElement::new("samplingInterval", 34, 0, IEType::Unsigned32, 4),
    InformationElement::new("exportedOctetTotalCount", 40, 0, IEType::Unsigned64, 8),
    InformationElement::new("sourceMacAddress", 56, 0, IEType::MacAddress, 6),
    InformationElement::new("destinationMacAddress", 80, 0, IEType::MacAddress, 6),
    InformationElement::new("octetTotalCount", 85, 0, IEType::Unsigned64, 8),
    InformationElement::new("packetTotalCount", 86, 0, IEType::Unsigned64, 8),
    InformationElement::new("fragmentOffset", 88, 0, IEType::Unsigned16, 2),
    InformationElement::new("applicationDescription", 94, 0, IEType::String, VARLEN),
    InformationElement::new("applicationId", 95, 0, IEType::OctetArray, VARLEN),
    InformationElement::new("applicationName", 96, 0, IEType::String, VARLEN),
    InformationElement::new("flowEndReason", 136, 0, IEType::Unsigned8, 1),
    InformationElement::new("observationPointId", 138, 0, IEType::Unsigned64, 8),
    InformationElement::new("flowStartSeconds", 150, 0, IEType::DateTimeSeconds, 4),
    InformationElement::new("flowEndSeconds", 151, 0, IEType::DateTimeSeconds, 4),
    InformationElement::new("flowStartMilliseconds", 152, 0, IEType::DateTimeMilliseconds, 8),
    InformationElement::new("flowEndMilliseconds", 153, 0, IEType::DateTimeMilliseconds, 8),
    InformationElement::new("flowStartMicroseconds", 154, 0, IEType::DateTimeMicroseconds, 8),
    InformationElement::new("flowEndMicroseconds", 155, 0, IEType::DateTimeMicroseconds, 8),
    InformationElement::new("flowStartNanoseconds", 156, 0, IEType::DateTimeNanoseconds, 8),
    InformationElement::new("flowEndNanoseconds", 157, 0, IEType::DateTimeNanoseconds, 8),
    InformationElement::new("isMulticast", 206, 0, IEType::Boolean, 1),
    InformationElement::new("initiatorOctets", 231, 0, IEType::Unsigned64, 8),
    InformationElement::new("responderOctets", 232, 0, IEType::Unsigned64, 8),
    // Enterprise-scoped examples (PEN 55555) covering types no listed
    // IANA IE above demonstrates.
    InformationElement::new("exampleSigned8", 1, 55555, IEType::Signed8, 1),
    InformationElement::new("exampleSigned16", 2, 55555, IEType::Signed16, 2),
    InformationElement::new("exampleSigned32", 3, 55555, IEType::Signed32, 4),
    InformationElement::new("exampleSigned64", 4, 55555, IEType::Signed64, 8),
    InformationElement::new("exampleFloat32", 5, 55555, IEType::Float32, 4),
    InformationElement::new("exampleFloat64", 6, 55555, IEType::Float64, 8),
    InformationElement::new("exampleFixedOctetArray", 7, 55555, IEType::OctetArray, 16),
];

/// Read-only registry of [`InformationElement`]s, keyed by `(pen,
/// number)` and by name. Construction is the caller's (or the ambient
/// seed table's) business; the core only ever reads from it.
pub struct IeCatalog {
    by_key: HashMap<(u32, u16), &'static InformationElement>,
    by_name: HashMap<&'static str, &'static InformationElement>,
}

impl IeCatalog {
    /// A catalog seeded with the built-in example IEs (see
    /// [`STANDARD_IES`]).
    pub fn new() -> Self {
        let mut cat = IeCatalog {
            by_key: HashMap::with_capacity(STANDARD_IES.len()),
            by_name: HashMap::with_capacity(STANDARD_IES.len()),
        };
        for ie in STANDARD_IES {
            cat.insert(ie);
        }
        cat
    }

    /// An empty catalog, for callers who want to build their own
    /// registry from scratch (e.g. a full IANA population).
    pub fn empty() -> Self {
        IeCatalog {
            by_key: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    fn insert(&mut self, ie: &'static InformationElement) {
        self.by_key.insert((ie.pen, ie.number), ie);
        self.by_name.insert(ie.name, ie);
    }

    /// Register an additional statically-allocated IE, e.g. an
    /// enterprise extension not in the built-in seed table.
    pub fn register(&mut self, ie: &'static InformationElement) {
        self.insert(ie);
    }

    pub fn lookup_by_number(&self, pen: u32, number: u16) -> Option<&'static InformationElement> {
        self.by_key.get(&(pen, number)).copied()
    }

    pub fn lookup_by_name(&self, name: &str) -> Option<&'static InformationElement> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl Default for IeCatalog {
    fn default() -> Self {
        IeCatalog::new()
    }
}

/// Process-wide, lazily-initialized catalog seeded with the built-in
/// examples. The core never mutates it after first use (§5).
pub static STANDARD_CATALOG: Lazy<IeCatalog> = Lazy::new(IeCatalog::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_number_and_name_agree() {
        let cat = IeCatalog::new();
        let by_num = cat.lookup_by_number(0, 1).unwrap();
        let by_name = cat.lookup_by_name("octetDeltaCount").unwrap();
        assert_eq!(by_num, by_name);
        assert_eq!(by_num.ie_type, IEType::Unsigned64);
    }

    #[test]
    fn equality_is_by_number_and_pen_only() {
        let a = InformationElement::new("a", 1, 0, IEType::Unsigned8, 1);
        let b = InformationElement::new("different-name", 1, 0, IEType::Unsigned32, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn enterprise_ie_is_distinct_from_iana_ie_with_same_number() {
        let cat = IeCatalog::new();
        let iana = cat.lookup_by_number(0, 1).unwrap();
        let enterprise = cat.lookup_by_number(55555, 1).unwrap();
        assert_ne!(iana, enterprise);
    }

    #[test]
    fn reduced_length_rules_match_type_table() {
        assert!(IEType::Unsigned32.allows_reduced_length(2));
        assert!(!IEType::Float32.allows_reduced_length(2));
        assert!(IEType::Float64.allows_reduced_length(4));
        assert!(IEType::Float64.allows_reduced_length(8));
        assert!(!IEType::MacAddress.allows_reduced_length(4));
        assert!(IEType::Boolean.allows_reduced_length(1));
        assert!(!IEType::Boolean.allows_reduced_length(2));
    }

    #[test]
    fn varlen_ie_reports_variable_length() {
        let cat = IeCatalog::new();
        let app_name = cat.lookup_by_name("applicationName").unwrap();
        assert!(app_name.is_varlen());
        assert!(app_name.ie_type.is_variable_length());
    }
}

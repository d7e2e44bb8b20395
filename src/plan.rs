//! Placement codec (C6): compiles a `(wire template, placement
//! template)` pair into an ordered sequence of typed per-field
//! transfer decisions, then executes that sequence once per record
//! (§4.6). This is the hot path of the whole library; compilation
//! happens once and is cached (by the dispatcher, §4.7) keyed on the
//! wire template's identity, so plan execution never re-enters IE-type
//! dispatch or placement lookup per field.

use crate::error::CoreError;
use crate::ie::{IEType, InformationElement, VARLEN};
use crate::template::{PlacementTemplate, WireTemplate};
use crate::transcoder::Transcoder;
use crate::varlen::{VarlenSlot, VARLEN_SLOT_SIZE};

/// One decode transfer decision (§4.6). Each variant is a small,
/// fixed-size value; a [`DecodePlan`] is just a `Vec` of these, with no
/// further indirection at execution time.
#[derive(Debug, Clone, Copy)]
enum DecodeDecision {
    Skip { wire_len: u16 },
    FixedNoEndian { offset: usize, dst_size: usize, wire_len: u16 },
    FixedOctets { offset: usize, dst_size: usize, wire_len: u16 },
    UnsignedEndian { offset: usize, dst_size: usize, wire_len: u16 },
    SignedEndian { offset: usize, dst_size: usize, wire_len: u16 },
    Float32 { offset: usize },
    Float64 { offset: usize },
    Float32To64 { offset: usize },
    Boolean { offset: usize },
    Varlen { offset: usize },
}

/// One encode transfer decision — the symmetric inverse of
/// [`DecodeDecision`], plus `DoubleToFloat` and `VarlenFromByteArray`
/// (§4.6).
#[derive(Debug, Clone, Copy)]
enum EncodeDecision {
    /// Field present in the wire template but not bound by the
    /// placement: exported as `wire_len` zero octets. Not named in the
    /// source table (which only describes decode's `Skip`); the
    /// natural encode counterpart of an unbound field is a default
    /// value rather than nothing, since every wire template field must
    /// be written to produce a conformant record.
    ZeroFill { wire_len: u16 },
    FixedNoEndian { offset: usize, wire_len: u16 },
    FixedOctets { offset: usize, wire_len: u16 },
    UnsignedEndian { offset: usize, src_size: usize, wire_len: u16 },
    SignedEndian { offset: usize, src_size: usize, wire_len: u16 },
    Float32 { offset: usize },
    Float64 { offset: usize },
    DoubleToFloat { offset: usize },
    Boolean { offset: usize },
    VarlenFromByteArray { offset: usize },
}

/// Compiled decode plan for a `(wire template, placement template)`
/// pair (§3, "Lifecycles" — created lazily, cached by that pair's
/// identity, invalidated when either side changes).
pub struct DecodePlan {
    decisions: Vec<DecodeDecision>,
    minlen: usize,
}

pub struct EncodePlan {
    decisions: Vec<EncodeDecision>,
}

fn reduced_length_ok(wire_len: u16, dst_size: usize) -> bool {
    wire_len as usize <= dst_size || dst_size == 0
}

/// §4.6: compilation must reject an in-memory binding wider than the
/// IE's native size ("in-memory size > native size"). Checked
/// separately from [`reduced_length_ok`] so the two failure reasons
/// stay distinct; also the guard that keeps `write_host_uint`/
/// `read_host_uint` within their 8-octet fixed arms.
fn native_size_ok(dst_size: usize, ie: &InformationElement) -> bool {
    dst_size <= ie.native_size()
}

/// Classify one wire field against its placement binding (or absence
/// thereof) into a [`DecodeDecision`], per the table in §4.6.
fn compile_decode_field(
    ie: &'static InformationElement,
    wire_len: u16,
    placement: &PlacementTemplate,
) -> Result<DecodeDecision, CoreError> {
    let binding = match placement.lookup_placement(ie) {
        Some(b) => b,
        None => return Ok(DecodeDecision::Skip { wire_len }),
    };

    use IEType::*;
    match ie.ie_type {
        MacAddress | Ipv6Address => {
            if binding.size < wire_len as usize {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "destination smaller than fixed wire length",
                });
            }
            Ok(DecodeDecision::FixedNoEndian {
                offset: binding.offset,
                dst_size: binding.size,
                wire_len,
            })
        }
        OctetArray | String if wire_len != VARLEN => Ok(DecodeDecision::FixedOctets {
            offset: binding.offset,
            dst_size: binding.size,
            wire_len,
        }),
        OctetArray | String => {
            if binding.size < VARLEN_SLOT_SIZE {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "destination too small to hold a varlen view",
                });
            }
            Ok(DecodeDecision::Varlen {
                offset: binding.offset,
            })
        }
        Boolean => Ok(DecodeDecision::Boolean {
            offset: binding.offset,
        }),
        Float32 if wire_len == 4 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(DecodeDecision::Float32 {
                offset: binding.offset,
            })
        }
        Float64 if wire_len == 8 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(DecodeDecision::Float64 {
                offset: binding.offset,
            })
        }
        Float64 if wire_len == 4 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(DecodeDecision::Float32To64 {
                offset: binding.offset,
            })
        }
        Float32 | Float64 => Err(CoreError::PlanCompilationError {
            ie: ie.to_string(),
            reason: "unrepresentable reduced-length float encoding",
        }),
        Unsigned8 | Unsigned16 | Unsigned32 | Unsigned64 | DateTimeSeconds
        | DateTimeMilliseconds | DateTimeMicroseconds | DateTimeNanoseconds | Ipv4Address => {
            if !reduced_length_ok(wire_len, binding.size) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "wire length exceeds destination size",
                });
            }
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(DecodeDecision::UnsignedEndian {
                offset: binding.offset,
                dst_size: binding.size,
                wire_len,
            })
        }
        Signed8 | Signed16 | Signed32 | Signed64 => {
            if !reduced_length_ok(wire_len, binding.size) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "wire length exceeds destination size",
                });
            }
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(DecodeDecision::SignedEndian {
                offset: binding.offset,
                dst_size: binding.size,
                wire_len,
            })
        }
    }
}

/// Compile a [`DecodePlan`] for `placement` against `wire`. Requires
/// `placement.is_subset_of(wire)` per the matching rule in §4.7 — this
/// function does not itself check that, so that it can also be used to
/// compile a plan for a struct template or other non-collector caller
/// that matches templates its own way.
pub fn compile_decode_plan(
    wire: &WireTemplate,
    placement: &PlacementTemplate,
) -> Result<DecodePlan, CoreError> {
    let mut decisions = Vec::with_capacity(wire.fields().len());
    for field in wire.fields() {
        decisions.push(compile_decode_field(field.ie, field.wire_len, placement)?);
    }
    Ok(DecodePlan {
        decisions,
        minlen: wire.minlen(),
    })
}

fn compile_encode_field(
    ie: &'static InformationElement,
    wire_len: u16,
    placement: &PlacementTemplate,
) -> Result<EncodeDecision, CoreError> {
    let binding = match placement.lookup_placement(ie) {
        Some(b) => b,
        None => return Ok(EncodeDecision::ZeroFill { wire_len }),
    };

    use IEType::*;
    match ie.ie_type {
        MacAddress | Ipv6Address => {
            if binding.size < wire_len as usize {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "source smaller than fixed wire length",
                });
            }
            Ok(EncodeDecision::FixedNoEndian {
                offset: binding.offset,
                wire_len,
            })
        }
        OctetArray | String if wire_len != VARLEN => Ok(EncodeDecision::FixedOctets {
            offset: binding.offset,
            wire_len,
        }),
        OctetArray | String => {
            if binding.size < VARLEN_SLOT_SIZE {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "source too small to hold a varlen view",
                });
            }
            Ok(EncodeDecision::VarlenFromByteArray {
                offset: binding.offset,
            })
        }
        Boolean => Ok(EncodeDecision::Boolean {
            offset: binding.offset,
        }),
        Float32 if wire_len == 4 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(EncodeDecision::Float32 {
                offset: binding.offset,
            })
        }
        Float64 if wire_len == 8 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(EncodeDecision::Float64 {
                offset: binding.offset,
            })
        }
        Float64 if wire_len == 4 => {
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(EncodeDecision::DoubleToFloat {
                offset: binding.offset,
            })
        }
        Float32 | Float64 => Err(CoreError::PlanCompilationError {
            ie: ie.to_string(),
            reason: "unrepresentable reduced-length float encoding",
        }),
        Unsigned8 | Unsigned16 | Unsigned32 | Unsigned64 | DateTimeSeconds
        | DateTimeMilliseconds | DateTimeMicroseconds | DateTimeNanoseconds | Ipv4Address => {
            if !reduced_length_ok(wire_len, binding.size) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "wire length exceeds source size",
                });
            }
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(EncodeDecision::UnsignedEndian {
                offset: binding.offset,
                src_size: binding.size,
                wire_len,
            })
        }
        Signed8 | Signed16 | Signed32 | Signed64 => {
            if !reduced_length_ok(wire_len, binding.size) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "wire length exceeds source size",
                });
            }
            if !native_size_ok(binding.size, ie) {
                return Err(CoreError::PlanCompilationError {
                    ie: ie.to_string(),
                    reason: "in-memory size exceeds native size",
                });
            }
            Ok(EncodeDecision::SignedEndian {
                offset: binding.offset,
                src_size: binding.size,
                wire_len,
            })
        }
    }
}

pub fn compile_encode_plan(
    wire: &WireTemplate,
    placement: &PlacementTemplate,
) -> Result<EncodePlan, CoreError> {
    let mut decisions = Vec::with_capacity(wire.fields().len());
    for field in wire.fields() {
        decisions.push(compile_encode_field(field.ie, field.wire_len, placement)?);
    }
    Ok(EncodePlan { decisions })
}

impl DecodePlan {
    /// Execute the plan once, decoding one record from `xc` into
    /// `dst`. `xc`'s cursor must sit at the start of the record; on
    /// success it sits just past it. Fixed-size fields land in `dst`
    /// via ordinary slice writes; varlen fields land as a
    /// [`VarlenSlot`] (§4.6, §10.1) borrowing directly from `xc`'s
    /// underlying buffer — valid only for the caller's documented
    /// decode scope (§5).
    pub fn execute(&self, xc: &mut Transcoder<'_>, dst: &mut [u8]) -> Result<(), CoreError> {
        xc.checkpoint();
        for decision in &self.decisions {
            if let Err(e) = self.execute_one(*decision, xc, dst) {
                xc.rollback();
                return Err(e);
            }
        }
        Ok(())
    }

    fn execute_one(
        &self,
        decision: DecodeDecision,
        xc: &mut Transcoder<'_>,
        dst: &mut [u8],
    ) -> Result<(), CoreError> {
        match decision {
            DecodeDecision::Skip { wire_len } => {
                let n = if wire_len == VARLEN {
                    xc.read_varlen_prefix()
                        .ok_or(CoreError::Truncated)? as usize
                } else {
                    wire_len as usize
                };
                if !xc.advance(n) {
                    return Err(CoreError::Truncated);
                }
                Ok(())
            }
            DecodeDecision::FixedNoEndian {
                offset,
                dst_size,
                wire_len,
            } => {
                let bytes = xc
                    .take_bytes(wire_len as usize)
                    .ok_or(CoreError::Truncated)?;
                let slot = &mut dst[offset..offset + dst_size];
                slot[..bytes.len()].copy_from_slice(bytes);
                slot[bytes.len()..].fill(0);
                Ok(())
            }
            DecodeDecision::FixedOctets {
                offset,
                dst_size,
                wire_len,
            } => {
                let bytes = xc
                    .take_bytes(wire_len as usize)
                    .ok_or(CoreError::Truncated)?;
                let n = dst_size.min(bytes.len());
                let slot = &mut dst[offset..offset + dst_size];
                slot[..n].copy_from_slice(&bytes[..n]);
                slot[n..].fill(0);
                Ok(())
            }
            DecodeDecision::UnsignedEndian {
                offset,
                dst_size,
                wire_len,
            } => {
                let value = xc
                    .decode_uint_reduced(wire_len)
                    .ok_or(CoreError::Truncated)?;
                write_host_uint(&mut dst[offset..offset + dst_size], value);
                Ok(())
            }
            DecodeDecision::SignedEndian {
                offset,
                dst_size,
                wire_len,
            } => {
                let value = xc
                    .decode_int_reduced(wire_len)
                    .ok_or(CoreError::Truncated)?;
                write_host_uint(&mut dst[offset..offset + dst_size], value as u64);
                Ok(())
            }
            DecodeDecision::Float32 { offset } => {
                let value = xc.read_f32().ok_or(CoreError::Truncated)?;
                dst[offset..offset + 4].copy_from_slice(&value.to_ne_bytes());
                Ok(())
            }
            DecodeDecision::Float64 { offset } => {
                let value = xc.read_f64().ok_or(CoreError::Truncated)?;
                dst[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
                Ok(())
            }
            DecodeDecision::Float32To64 { offset } => {
                let value = xc.read_f32().ok_or(CoreError::Truncated)? as f64;
                dst[offset..offset + 8].copy_from_slice(&value.to_ne_bytes());
                Ok(())
            }
            DecodeDecision::Boolean { offset } => {
                let value = xc.read_bool().ok_or(CoreError::Truncated)?;
                match value {
                    Ok(b) => {
                        dst[offset] = b as u8;
                        Ok(())
                    }
                    Err(octet) => Err(CoreError::BooleanOutOfRange { value: octet }),
                }
            }
            DecodeDecision::Varlen { offset } => {
                let len = xc.read_varlen_prefix().ok_or(CoreError::Truncated)? as usize;
                let bytes = xc.take_bytes(len).ok_or(CoreError::Truncated)?;
                // SAFETY: the placement compiler verified this binding
                // has room for a VarlenSlot (§4.6); `bytes` borrows
                // from the same buffer `xc` wraps, which outlives the
                // decode scope documented in the varlen module.
                unsafe {
                    VarlenSlot::new(bytes).write_into(dst, offset);
                }
                Ok(())
            }
        }
    }

    /// The wire template's precomputed `minlen` (§3, invariant b) —
    /// used by the caller to decide the stop condition described in
    /// §4.6: advance until the remainder of the set is smaller than
    /// this.
    pub fn minlen(&self) -> usize {
        self.minlen
    }
}

impl EncodePlan {
    /// Execute the plan once, encoding one record from `src` into
    /// `xc`. Mirrors [`DecodePlan::execute`].
    pub fn execute(&self, xc: &mut Transcoder<'_>, src: &[u8]) -> Result<(), CoreError> {
        xc.checkpoint();
        for decision in &self.decisions {
            if let Err(e) = self.execute_one(*decision, xc, src) {
                xc.rollback();
                return Err(e);
            }
        }
        Ok(())
    }

    fn execute_one(
        &self,
        decision: EncodeDecision,
        xc: &mut Transcoder<'_>,
        src: &[u8],
    ) -> Result<(), CoreError> {
        match decision {
            EncodeDecision::ZeroFill { wire_len } => {
                if wire_len == VARLEN {
                    if !xc.write_varlen_prefix(0) {
                        return Err(CoreError::EncodeBufferFull);
                    }
                } else if !xc.put_zeros(wire_len as usize) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::FixedNoEndian { offset, wire_len } => {
                if !xc.put_bytes(&src[offset..offset + wire_len as usize]) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::FixedOctets { offset, wire_len } => {
                let available = &src[offset..];
                let n = (wire_len as usize).min(available.len());
                if !xc.put_bytes(&available[..n]) {
                    return Err(CoreError::EncodeBufferFull);
                }
                if n < wire_len as usize && !xc.put_zeros(wire_len as usize - n) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::UnsignedEndian {
                offset,
                src_size,
                wire_len,
            } => {
                let value = read_host_uint(&src[offset..offset + src_size]);
                if !xc.encode_uint_reduced(value, wire_len) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::SignedEndian {
                offset,
                src_size,
                wire_len,
            } => {
                let value = read_host_uint(&src[offset..offset + src_size]) as i64;
                if !xc.encode_int_reduced(value, wire_len) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::Float32 { offset } => {
                let mut bytes = [0u8; 4];
                bytes.copy_from_slice(&src[offset..offset + 4]);
                if !xc.write_f32(f32::from_ne_bytes(bytes)) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::Float64 { offset } => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&src[offset..offset + 8]);
                if !xc.write_f64(f64::from_ne_bytes(bytes)) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::DoubleToFloat { offset } => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&src[offset..offset + 8]);
                let value = f64::from_ne_bytes(bytes) as f32;
                if !xc.write_f32(value) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::Boolean { offset } => {
                if !xc.write_bool(src[offset] != 0) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
            EncodeDecision::VarlenFromByteArray { offset } => {
                // SAFETY: the encode caller populated this offset with
                // a VarlenSlot (via `VarlenSlot::new(..).write_into`)
                // before calling `execute`, per the same contract
                // documented in the varlen module.
                let bytes = unsafe { VarlenSlot::read_from(src, offset).as_slice() };
                if bytes.len() > u16::MAX as usize {
                    return Err(CoreError::EncodeBufferFull);
                }
                if !xc.write_varlen_prefix(bytes.len() as u16) || !xc.put_bytes(bytes) {
                    return Err(CoreError::EncodeBufferFull);
                }
                Ok(())
            }
        }
    }
}

/// Write a zero-extended host-endian unsigned value into a
/// variable-width destination slot (1/2/4/8 bytes), truncating from
/// the high end if `dst` is narrower than 8 bytes (the same
/// reduced-length convention used on the wire, just applied to the
/// in-memory side).
/// `dst` is at most 8 octets wide here: plan compilation rejects any
/// binding whose in-memory size exceeds the IE's native size
/// (`native_size_ok`), and no native size in the catalog exceeds 8.
/// The `n if n < 8` arm still guards against that invariant being
/// violated rather than trusting it blindly.
fn write_host_uint(dst: &mut [u8], value: u64) {
    match dst.len() {
        1 => dst[0] = value as u8,
        2 => dst.copy_from_slice(&(value as u16).to_ne_bytes()),
        4 => dst.copy_from_slice(&(value as u32).to_ne_bytes()),
        8 => dst.copy_from_slice(&value.to_ne_bytes()),
        n if n < 8 => {
            let bytes = value.to_ne_bytes();
            dst.copy_from_slice(&bytes[..n]);
        }
        n => {
            let bytes = value.to_ne_bytes();
            dst[..8].copy_from_slice(&bytes);
            dst[8..n].fill(0);
        }
    }
}

fn read_host_uint(src: &[u8]) -> u64 {
    match src.len() {
        1 => src[0] as u64,
        2 => u16::from_ne_bytes([src[0], src[1]]) as u64,
        4 => u32::from_ne_bytes([src[0], src[1], src[2], src[3]]) as u64,
        8 => u64::from_ne_bytes(src.try_into().unwrap()),
        n if n < 8 => {
            let mut bytes = [0u8; 8];
            bytes[..n].copy_from_slice(src);
            u64::from_ne_bytes(bytes)
        }
        _ => {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&src[..8]);
            u64::from_ne_bytes(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ie::STANDARD_CATALOG;

    fn ie(name: &str) -> &'static InformationElement {
        STANDARD_CATALOG.lookup_by_name(name).unwrap()
    }

    fn activated_template(id: u16, fields: &[(&str, u16)]) -> WireTemplate {
        let mut t = WireTemplate::new(id);
        for (name, wire_len) in fields {
            t.add(ie(name), *wire_len).unwrap();
        }
        t.activate();
        t
    }

    #[test]
    fn reduced_length_u32_decode_scenario_s4() {
        let wire = activated_template(256, &[("ingressInterface", 2)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("ingressInterface"), 0, 4);
        let plan = compile_decode_plan(&wire, &placement).unwrap();

        let mut wire_bytes = [0xABu8, 0xCD];
        let mut xc = Transcoder::new(&mut wire_bytes);
        let mut dst = [0u8; 4];
        plan.execute(&mut xc, &mut dst).unwrap();
        assert_eq!(u32::from_ne_bytes(dst), 0x0000ABCD);
    }

    #[test]
    fn reduced_length_decode_second_example_from_s4() {
        let wire = activated_template(256, &[("ingressInterface", 2)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("ingressInterface"), 0, 4);
        let plan = compile_decode_plan(&wire, &placement).unwrap();

        let mut wire_bytes = [0x00u8, 0xFF];
        let mut xc = Transcoder::new(&mut wire_bytes);
        let mut dst = [0u8; 4];
        plan.execute(&mut xc, &mut dst).unwrap();
        assert_eq!(u32::from_ne_bytes(dst), 0x000000FF);
    }

    #[test]
    fn unbound_field_is_skipped_in_decode() {
        let wire = activated_template(
            256,
            &[("octetDeltaCount", 8), ("packetDeltaCount", 8)],
        );
        let mut placement = PlacementTemplate::new();
        placement.place(ie("packetDeltaCount"), 0, 8);
        let plan = compile_decode_plan(&wire, &placement).unwrap();

        let mut wire_bytes = [0u8; 16];
        wire_bytes[8..16].copy_from_slice(&42u64.to_be_bytes());
        let mut xc = Transcoder::new(&mut wire_bytes);
        let mut dst = [0u8; 8];
        plan.execute(&mut xc, &mut dst).unwrap();
        assert_eq!(u64::from_ne_bytes(dst), 42);
    }

    #[test]
    fn reduced_length_mac_is_rejected_at_compile_time() {
        let wire = activated_template(256, &[("sourceMacAddress", 4)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("sourceMacAddress"), 0, 6);
        assert!(matches!(
            compile_decode_plan(&wire, &placement),
            Err(CoreError::PlanCompilationError { .. })
        ));
    }

    #[test]
    fn boolean_out_of_range_is_recoverable_and_rolls_back_cursor() {
        let wire = activated_template(256, &[("isMulticast", 1)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("isMulticast"), 0, 1);
        let plan = compile_decode_plan(&wire, &placement).unwrap();

        let mut wire_bytes = [0x00u8];
        let mut xc = Transcoder::new(&mut wire_bytes);
        let mut dst = [0u8; 1];
        let before = xc.cur();
        let err = plan.execute(&mut xc, &mut dst).unwrap_err();
        assert_eq!(err, CoreError::BooleanOutOfRange { value: 0 });
        assert_eq!(xc.cur(), before);
    }

    #[test]
    fn in_memory_size_larger_than_native_size_is_rejected() {
        let wire = activated_template(256, &[("ingressInterface", 4)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("ingressInterface"), 0, 16); // native size is 4
        let err = compile_decode_plan(&wire, &placement).unwrap_err();
        assert_eq!(
            err,
            CoreError::PlanCompilationError {
                ie: ie("ingressInterface").to_string(),
                reason: "in-memory size exceeds native size",
            }
        );
    }

    #[test]
    fn oversized_float_binding_is_rejected_on_both_plans() {
        let float_ie = STANDARD_CATALOG.lookup_by_number(55555, 5).unwrap(); // exampleFloat32
        let mut wire = WireTemplate::new(256);
        wire.add(float_ie, 4).unwrap();
        wire.activate();

        let mut placement = PlacementTemplate::new();
        placement.place(float_ie, 0, 8); // native size is 4
        assert!(matches!(
            compile_decode_plan(&wire, &placement),
            Err(CoreError::PlanCompilationError { .. })
        ));
        assert!(matches!(
            compile_encode_plan(&wire, &placement),
            Err(CoreError::PlanCompilationError { .. })
        ));
    }

    #[test]
    fn encode_decode_round_trip_for_varlen_field() {
        let wire = activated_template(256, &[("applicationName", VARLEN)]);
        let mut placement = PlacementTemplate::new();
        placement.place(ie("applicationName"), 0, VARLEN_SLOT_SIZE);

        let encode_plan = compile_encode_plan(&wire, &placement).unwrap();
        let decode_plan = compile_decode_plan(&wire, &placement).unwrap();

        let payload = b"hi".to_vec();
        let mut src = vec![0u8; VARLEN_SLOT_SIZE];
        unsafe {
            VarlenSlot::new(&payload).write_into(&mut src, 0);
        }

        let mut wire_bytes = [0u8; 8];
        {
            let mut xc = Transcoder::new(&mut wire_bytes);
            encode_plan.execute(&mut xc, &src).unwrap();
        }
        assert_eq!(&wire_bytes[0..3], &[0x02, b'h', b'i']);

        let mut dst = vec![0u8; VARLEN_SLOT_SIZE];
        {
            let mut xc = Transcoder::new(&mut wire_bytes);
            decode_plan.execute(&mut xc, &mut dst).unwrap();
        }
        unsafe {
            let slot = VarlenSlot::read_from(&dst, 0);
            assert_eq!(slot.as_slice(), payload.as_slice());
        }
    }

    #[test]
    fn minlen_matches_sum_of_skip_and_bound_field_wire_lengths() {
        let wire = activated_template(
            256,
            &[("octetDeltaCount", 8), ("packetDeltaCount", 8)],
        );
        let placement = PlacementTemplate::new(); // nothing bound -> all Skip
        let plan = compile_decode_plan(&wire, &placement).unwrap();
        assert_eq!(plan.minlen(), wire.minlen());
        assert_eq!(plan.minlen(), 16);
    }

    #[test]
    fn unbound_encode_field_zero_fills() {
        let wire = activated_template(
            256,
            &[("octetDeltaCount", 8), ("packetDeltaCount", 8)],
        );
        let mut placement = PlacementTemplate::new();
        placement.place(ie("packetDeltaCount"), 0, 8);
        let plan = compile_encode_plan(&wire, &placement).unwrap();

        let src = 7u64.to_ne_bytes();
        let mut wire_bytes = [0xFFu8; 16];
        let mut xc = Transcoder::new(&mut wire_bytes);
        plan.execute(&mut xc, &src).unwrap();
        assert_eq!(&wire_bytes[0..8], &[0u8; 8]); // zero-filled unbound field
        assert_eq!(&wire_bytes[8..16], &7u64.to_be_bytes());
    }
}

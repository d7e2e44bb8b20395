//! Byte-cursor transcoder (C2): the single place wire bytes are read
//! from or written to a buffer. Every other component reaches the
//! buffer only through this type.
//!
//! Invariant maintained at every public boundary: `base <= check <=
//! cur <= max <= buf.len()`. No operation ever panics on a short
//! buffer; short operations return `false`/`None` and leave `cur`
//! untouched.

/// A read/write cursor over a caller-owned byte buffer.
pub struct Transcoder<'a> {
    buf: &'a mut [u8],
    base: usize,
    check: usize,
    cur: usize,
    max: usize,
    windows: Vec<(usize, usize, usize, usize)>,
}

impl<'a> Transcoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        let max = buf.len();
        Transcoder {
            buf,
            base: 0,
            check: 0,
            cur: 0,
            max,
            windows: Vec::new(),
        }
    }

    pub fn cur(&self) -> usize {
        self.cur
    }

    pub fn base(&self) -> usize {
        self.base
    }

    /// Octets available to read/write before hitting the current
    /// window's upper bound.
    pub fn avail(&self) -> usize {
        self.max - self.cur
    }

    /// Size of the current window.
    pub fn len(&self) -> usize {
        self.max - self.base
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Save `cur` so a failed multi-field operation can roll back.
    pub fn checkpoint(&mut self) {
        self.check = self.cur;
    }

    /// Restore `cur` to the last checkpoint.
    pub fn rollback(&mut self) {
        self.cur = self.check;
    }

    /// Temporarily restrict the cursor to `[offset, offset+length)` of
    /// the underlying buffer (not of the current window) — used when
    /// decoding a single set within a larger message buffer. Returns
    /// `false` without changing anything if the window would escape
    /// the buffer.
    pub fn focus(&mut self, offset: usize, length: usize) -> bool {
        if offset.checked_add(length).map_or(true, |end| end > self.buf.len()) {
            return false;
        }
        self.windows.push((self.base, self.max, self.cur, self.check));
        self.base = offset;
        self.cur = offset;
        self.check = offset;
        self.max = offset + length;
        true
    }

    /// Restore the window saved by the matching [`Transcoder::focus`].
    pub fn defocus(&mut self) {
        if let Some((base, max, cur, check)) = self.windows.pop() {
            self.base = base;
            self.max = max;
            self.cur = cur;
            self.check = check;
        }
    }

    fn fits(&self, n: usize) -> bool {
        self.cur.checked_add(n).map_or(false, |end| end <= self.max)
    }

    /// Advance past `n` octets without reading them (used by `Skip`
    /// decode decisions).
    pub fn advance(&mut self, n: usize) -> bool {
        if !self.fits(n) {
            return false;
        }
        self.cur += n;
        true
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> bool {
        if !self.fits(bytes.len()) {
            return false;
        }
        let start = self.cur;
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        self.cur += bytes.len();
        true
    }

    pub fn put_zeros(&mut self, n: usize) -> bool {
        if !self.fits(n) {
            return false;
        }
        let start = self.cur;
        self.buf[start..start + n].fill(0);
        self.cur += n;
        true
    }

    /// Read `n` octets and advance past them.
    pub fn take_bytes(&mut self, n: usize) -> Option<&[u8]> {
        if !self.fits(n) {
            return None;
        }
        let start = self.cur;
        self.cur += n;
        Some(&self.buf[start..start + n])
    }

    /// Read `n` octets without advancing.
    pub fn peek_bytes(&self, n: usize) -> Option<&[u8]> {
        if !self.fits(n) {
            return None;
        }
        Some(&self.buf[self.cur..self.cur + n])
    }

    /// Mutable view of `n` octets at `cur`, advancing past them. Used
    /// by plan execution to write a varlen slot in place.
    pub fn take_bytes_mut(&mut self, n: usize) -> Option<&mut [u8]> {
        if !self.fits(n) {
            return None;
        }
        let start = self.cur;
        self.cur += n;
        Some(&mut self.buf[start..start + n])
    }

    pub fn write_u16(&mut self, v: u16) -> bool {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn write_u32(&mut self, v: u32) -> bool {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        self.take_bytes(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        self.take_bytes(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Encode `value` as a big-endian integer truncated (from the high
    /// end) to `wire_len` octets, `wire_len` in `1..=8`.
    pub fn encode_uint_reduced(&mut self, value: u64, wire_len: u16) -> bool {
        let wl = wire_len as usize;
        if wl == 0 || wl > 8 {
            return false;
        }
        let full = value.to_be_bytes();
        self.put_bytes(&full[8 - wl..])
    }

    /// Decode a zero-extended unsigned integer from `wire_len` octets.
    pub fn decode_uint_reduced(&mut self, wire_len: u16) -> Option<u64> {
        let wl = wire_len as usize;
        if wl == 0 || wl > 8 {
            return None;
        }
        let bytes = self.take_bytes(wl)?;
        let mut full = [0u8; 8];
        full[8 - wl..].copy_from_slice(bytes);
        Some(u64::from_be_bytes(full))
    }

    pub fn encode_int_reduced(&mut self, value: i64, wire_len: u16) -> bool {
        self.encode_uint_reduced(value as u64, wire_len)
    }

    /// Decode a sign-extended signed integer from `wire_len` octets.
    pub fn decode_int_reduced(&mut self, wire_len: u16) -> Option<i64> {
        let wl = wire_len as usize;
        if wl == 0 || wl > 8 {
            return None;
        }
        let bytes = self.take_bytes(wl)?;
        let mut full = [if bytes[0] & 0x80 != 0 { 0xFF } else { 0x00 }; 8];
        full[8 - wl..].copy_from_slice(bytes);
        Some(i64::from_be_bytes(full))
    }

    pub fn write_f32(&mut self, v: f32) -> bool {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn read_f32(&mut self) -> Option<f32> {
        self.take_bytes(4)
            .map(|b| f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn write_f64(&mut self, v: f64) -> bool {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn read_f64(&mut self) -> Option<f64> {
        self.take_bytes(8).map(|b| {
            let mut arr = [0u8; 8];
            arr.copy_from_slice(b);
            f64::from_be_bytes(arr)
        })
    }

    /// RFC 2579 boolean quirk, deliberately preserved: `true -> 1`,
    /// `false -> 2`.
    pub fn write_bool(&mut self, v: bool) -> bool {
        self.put_bytes(&[if v { 1 } else { 2 }])
    }

    /// `Ok(true)` for wire `1`, `Ok(false)` for wire `2`, `Err(octet)`
    /// for anything else (caller surfaces `BooleanOutOfRange`).
    pub fn read_bool(&mut self) -> Option<Result<bool, u8>> {
        let b = self.take_bytes(1)?[0];
        Some(match b {
            1 => Ok(true),
            2 => Ok(false),
            other => Err(other),
        })
    }

    pub fn write_varlen_prefix(&mut self, len: u16) -> bool {
        if len < 255 {
            self.put_bytes(&[len as u8])
        } else {
            let mut buf = [0u8; 3];
            buf[0] = 0xFF;
            buf[1..].copy_from_slice(&len.to_be_bytes());
            self.put_bytes(&buf)
        }
    }

    /// Returns the decoded payload length; the 1- or 3-octet prefix
    /// has already been consumed.
    pub fn read_varlen_prefix(&mut self) -> Option<u16> {
        let first = self.take_bytes(1)?[0];
        if first == 0xFF {
            let rest = self.take_bytes(2)?;
            Some(u16::from_be_bytes([rest[0], rest[1]]))
        } else {
            Some(first as u16)
        }
    }
}

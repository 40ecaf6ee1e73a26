// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bit-addressable cursors over byte storage.
//!
//! LLRP packs header and field values at arbitrary bit offsets, MSB-first and
//! big-endian across byte boundaries. Two cursor types mirror the read/write
//! split used elsewhere in the codec:
//!
//! - [`BitWriter`] - owned, growable, supports rewinding the cursor to
//!   backpatch length fields written as placeholders.
//! - [`BitReader`] - borrowed, bounds-checked view that can be sliced into
//!   sub-views; a sub-view never lets a read run past its bound, which is
//!   what makes skipping unknown trailing TLV content safe.
//!
//! Signed reads take one sign bit plus an (n-1)-bit magnitude and extend the
//! sign by OR-ing a precomputed high-bit mask, reproducing two's-complement
//! widening exactly (a width-8 `-1` decodes to native `-1`, not 255).

use crate::error::{Error, Result};

/// Growable bit-level write cursor.
///
/// `position` and `size` are bit offsets; `size` tracks the highest bit ever
/// written, so rewinding to backpatch a length field does not shrink the
/// buffer.
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    pos: usize,
    size: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            data: Vec::with_capacity((bits + 7) / 8),
            pos: 0,
            size: 0,
        }
    }

    /// Current cursor position in bits.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Move the cursor; used to backpatch placeholder length fields.
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Highest bit offset written so far.
    pub fn size_bits(&self) -> usize {
        self.size
    }

    /// Size in whole bytes, rounding the last partial byte up.
    pub fn byte_len(&self) -> usize {
        (self.size + 7) / 8
    }

    pub fn put_bool(&mut self, bit: bool) {
        let byte = self.pos / 8;
        while self.data.len() <= byte {
            self.data.push(0);
        }
        let mask = 0x80u8 >> (self.pos % 8);
        if bit {
            self.data[byte] |= mask;
        } else {
            self.data[byte] &= !mask;
        }
        self.pos += 1;
        if self.pos > self.size {
            self.size = self.pos;
        }
    }

    /// Write the low `bits` bits of `value`, MSB first.
    pub fn put_u64(&mut self, value: u64, bits: u32) {
        debug_assert!(bits <= 64);
        for i in (0..bits).rev() {
            self.put_bool((value >> i) & 1 == 1);
        }
    }

    /// Write a signed value as its `bits`-wide two's-complement pattern.
    pub fn put_i64(&mut self, value: i64, bits: u32) {
        let raw = if bits >= 64 {
            value as u64
        } else {
            (value as u64) & ((1u64 << bits) - 1)
        };
        self.put_u64(raw, bits);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        if self.pos % 8 == 0 {
            // Aligned fast path.
            let byte = self.pos / 8;
            let end = byte + bytes.len();
            if self.data.len() < end {
                self.data.resize(end, 0);
            }
            self.data[byte..end].copy_from_slice(bytes);
            self.pos += bytes.len() * 8;
            if self.pos > self.size {
                self.size = self.pos;
            }
        } else {
            for b in bytes {
                self.put_u64(u64::from(*b), 8);
            }
        }
    }

    /// Write `count` zero bits (reserved fields, padding).
    pub fn put_reserved(&mut self, count: usize) {
        for _ in 0..count {
            self.put_bool(false);
        }
    }

    /// Consume the writer, returning the written bytes. A trailing partial
    /// byte is zero-padded.
    pub fn into_bytes(mut self) -> Vec<u8> {
        self.data.truncate(self.byte_len());
        let want = self.byte_len();
        if self.data.len() < want {
            self.data.resize(want, 0);
        }
        self.data
    }
}

/// Bounded bit-level read cursor over borrowed bytes.
///
/// Sub-views created by [`BitReader::slice`] share the backing storage but
/// carry their own position and bound.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    /// Absolute bit offset of this view within `data`.
    start: usize,
    /// Length of this view in bits.
    len: usize,
    /// Position relative to `start`.
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            start: 0,
            len: data.len() * 8,
            pos: 0,
        }
    }

    /// Length of this view in bits.
    pub fn len_bits(&self) -> usize {
        self.len
    }

    /// Position relative to the start of this view, in bits.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining_bits(&self) -> usize {
        self.len.saturating_sub(self.pos)
    }

    /// Move the cursor within the view (rewind or skip forward).
    pub fn set_position(&mut self, pos: usize) -> Result<()> {
        if pos > self.len {
            return Err(Error::Truncated {
                offset: self.start + self.pos,
                requested: pos.saturating_sub(self.pos),
            });
        }
        self.pos = pos;
        Ok(())
    }

    /// Skip `bits` bits (reserved fields).
    pub fn advance(&mut self, bits: usize) -> Result<()> {
        self.set_position(self.pos + bits)
    }

    /// Bounded sub-view starting at bit `start` (relative to this view).
    ///
    /// Fails if the requested range extends past this view's bound; a
    /// declared length that overruns the actual data is a truncated buffer,
    /// not a smaller view.
    pub fn slice(&self, start: usize, len: usize) -> Result<BitReader<'a>> {
        if start + len > self.len {
            return Err(Error::Truncated {
                offset: self.start + start,
                requested: len,
            });
        }
        Ok(BitReader {
            data: self.data,
            start: self.start + start,
            len,
            pos: 0,
        })
    }

    fn check(&self, bits: usize) -> Result<()> {
        if self.pos + bits > self.len {
            return Err(Error::Truncated {
                offset: self.start + self.pos,
                requested: bits,
            });
        }
        Ok(())
    }

    fn bit_at(&self, rel: usize) -> bool {
        let abs = self.start + rel;
        (self.data[abs / 8] & (0x80 >> (abs % 8))) != 0
    }

    pub fn get_bool(&mut self) -> Result<bool> {
        self.check(1)?;
        let bit = self.bit_at(self.pos);
        self.pos += 1;
        Ok(bit)
    }

    /// Read one bit without consuming it (TV/TLV discrimination).
    pub fn peek_bool(&self) -> Result<bool> {
        self.check(1)?;
        Ok(self.bit_at(self.pos))
    }

    /// Read `bits` bits as an unsigned value, MSB first.
    pub fn get_u64(&mut self, bits: u32) -> Result<u64> {
        debug_assert!(bits <= 64);
        self.check(bits as usize)?;
        let mut value = 0u64;
        for _ in 0..bits {
            value = (value << 1) | u64::from(self.bit_at(self.pos));
            self.pos += 1;
        }
        Ok(value)
    }

    /// Read `bits` bits and sign-extend: one sign bit, then an (n-1)-bit
    /// magnitude OR-ed with the high-bit mask when the sign bit is set.
    pub fn get_i64(&mut self, bits: u32) -> Result<i64> {
        if bits == 0 {
            return Ok(0);
        }
        let sign = self.get_bool()?;
        let magnitude = self.get_u64(bits - 1)?;
        if sign {
            Ok(((!0u64) << (bits - 1) | magnitude) as i64)
        } else {
            Ok(magnitude as i64)
        }
    }

    pub fn get_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.check(count * 8)?;
        let abs = self.start + self.pos;
        if abs % 8 == 0 {
            // Aligned fast path.
            let byte = abs / 8;
            self.pos += count * 8;
            return Ok(self.data[byte..byte + count].to_vec());
        }
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.get_u64(8)? as u8);
        }
        Ok(out)
    }
}

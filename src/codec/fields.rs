// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field-level wire encoding.
//!
//! Each [`FieldKind`] maps to exactly one [`FieldValue`] variant. Vector
//! kinds carry a 16-bit element count prefix; `U1v` counts bits and pads to
//! a byte boundary, `Utf8v` counts bytes, `BytesToEnd` consumes the rest of
//! the enclosing bounded view. 64-bit and 96-bit values are written as
//! consecutive big-endian 32-bit chunks, which is identical to one wide
//! big-endian integer.

use crate::bits::{BitReader, BitWriter};
use crate::error::{Error, Result};
use crate::message::{BitList, FieldValue};
use crate::schema::{FieldDescriptor, FieldKind};

fn mismatch(desc: &FieldDescriptor) -> Error {
    Error::FieldTypeMismatch {
        property: desc.name.to_string(),
    }
}

fn check_enum(desc: &FieldDescriptor, value: u64) -> Result<()> {
    if let Some(en) = &desc.enumeration {
        if !en.contains(value) {
            return Err(Error::InvalidEnumValue {
                enumeration: en.name.to_string(),
                value,
            });
        }
    }
    Ok(())
}

pub(crate) fn encode_field(
    w: &mut BitWriter,
    desc: &FieldDescriptor,
    value: &FieldValue,
) -> Result<()> {
    w.put_reserved(desc.reserved_before as usize);
    match (desc.kind, value) {
        (FieldKind::U1, FieldValue::Bool(v)) => w.put_bool(*v),
        (FieldKind::U2, FieldValue::U2(v)) => {
            if *v > 0x3 {
                return Err(mismatch(desc));
            }
            w.put_u64(u64::from(*v), 2);
        }
        (FieldKind::U8, FieldValue::U8(v)) => w.put_u64(u64::from(*v), 8),
        (FieldKind::S8, FieldValue::I8(v)) => w.put_i64(i64::from(*v), 8),
        (FieldKind::U16, FieldValue::U16(v)) => w.put_u64(u64::from(*v), 16),
        (FieldKind::S16, FieldValue::I16(v)) => w.put_i64(i64::from(*v), 16),
        (FieldKind::U32, FieldValue::U32(v)) => w.put_u64(u64::from(*v), 32),
        (FieldKind::S32, FieldValue::I32(v)) => w.put_i64(i64::from(*v), 32),
        (FieldKind::U64, FieldValue::U64(v)) => w.put_u64(*v, 64),
        (FieldKind::S64, FieldValue::I64(v)) => w.put_i64(*v, 64),
        (FieldKind::U96, FieldValue::U96(v)) => {
            if *v >> 96 != 0 {
                return Err(mismatch(desc));
            }
            w.put_u64((*v >> 64) as u64, 32);
            w.put_u64(*v as u64, 64);
        }
        (FieldKind::Utf8v, FieldValue::Utf8(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() > u16::MAX as usize {
                return Err(Error::InvalidLength {
                    context: "utf8 string",
                    length: bytes.len(),
                });
            }
            w.put_u64(bytes.len() as u64, 16);
            w.put_bytes(bytes);
        }
        (FieldKind::U1v, FieldValue::Bits(list)) => {
            if list.len() > u16::MAX as usize {
                return Err(Error::InvalidLength {
                    context: "bit list",
                    length: list.len(),
                });
            }
            w.put_u64(list.len() as u64, 16);
            for bit in list.iter() {
                w.put_bool(bit);
            }
            // Pad the bit data to a byte boundary.
            w.put_reserved((8 - list.len() % 8) % 8);
        }
        (FieldKind::U8v, FieldValue::U8v(v)) => {
            encode_count(w, "u8 vector", v.len())?;
            w.put_bytes(v);
        }
        (FieldKind::S8v, FieldValue::I8v(v)) => {
            encode_count(w, "s8 vector", v.len())?;
            for e in v {
                w.put_i64(i64::from(*e), 8);
            }
        }
        (FieldKind::U16v, FieldValue::U16v(v)) => {
            encode_count(w, "u16 vector", v.len())?;
            for e in v {
                w.put_u64(u64::from(*e), 16);
            }
        }
        (FieldKind::S16v, FieldValue::I16v(v)) => {
            encode_count(w, "s16 vector", v.len())?;
            for e in v {
                w.put_i64(i64::from(*e), 16);
            }
        }
        (FieldKind::U32v, FieldValue::U32v(v)) => {
            encode_count(w, "u32 vector", v.len())?;
            for e in v {
                w.put_u64(u64::from(*e), 32);
            }
        }
        (FieldKind::S32v, FieldValue::I32v(v)) => {
            encode_count(w, "s32 vector", v.len())?;
            for e in v {
                w.put_i64(i64::from(*e), 32);
            }
        }
        (FieldKind::U64v, FieldValue::U64v(v)) => {
            encode_count(w, "u64 vector", v.len())?;
            for e in v {
                w.put_u64(*e, 64);
            }
        }
        (FieldKind::S64v, FieldValue::I64v(v)) => {
            encode_count(w, "s64 vector", v.len())?;
            for e in v {
                w.put_i64(*e, 64);
            }
        }
        (FieldKind::BytesToEnd, FieldValue::Bytes(v)) => w.put_bytes(v),
        _ => return Err(mismatch(desc)),
    }
    w.put_reserved(desc.reserved_after as usize);
    Ok(())
}

fn encode_count(w: &mut BitWriter, context: &'static str, count: usize) -> Result<()> {
    if count > u16::MAX as usize {
        return Err(Error::InvalidLength { context, length: count });
    }
    w.put_u64(count as u64, 16);
    Ok(())
}

pub(crate) fn decode_field(r: &mut BitReader<'_>, desc: &FieldDescriptor) -> Result<FieldValue> {
    r.advance(desc.reserved_before as usize)?;
    let value = match desc.kind {
        FieldKind::U1 => {
            let v = r.get_bool()?;
            check_enum(desc, u64::from(v))?;
            FieldValue::Bool(v)
        }
        FieldKind::U2 => {
            let v = r.get_u64(2)?;
            check_enum(desc, v)?;
            FieldValue::U2(v as u8)
        }
        FieldKind::U8 => {
            let v = r.get_u64(8)?;
            check_enum(desc, v)?;
            FieldValue::U8(v as u8)
        }
        FieldKind::S8 => FieldValue::I8(r.get_i64(8)? as i8),
        FieldKind::U16 => {
            let v = r.get_u64(16)?;
            check_enum(desc, v)?;
            FieldValue::U16(v as u16)
        }
        FieldKind::S16 => FieldValue::I16(r.get_i64(16)? as i16),
        FieldKind::U32 => {
            let v = r.get_u64(32)?;
            check_enum(desc, v)?;
            FieldValue::U32(v as u32)
        }
        FieldKind::S32 => FieldValue::I32(r.get_i64(32)? as i32),
        FieldKind::U64 => FieldValue::U64(r.get_u64(64)?),
        FieldKind::S64 => FieldValue::I64(r.get_i64(64)?),
        FieldKind::U96 => {
            let high = r.get_u64(32)?;
            let low = r.get_u64(64)?;
            FieldValue::U96((u128::from(high) << 64) | u128::from(low))
        }
        FieldKind::Utf8v => {
            let len = r.get_u64(16)? as usize;
            let bytes = r.get_bytes(len)?;
            let s = String::from_utf8(bytes).map_err(|_| Error::InvalidLength {
                context: "utf8 string",
                length: len,
            })?;
            FieldValue::Utf8(s)
        }
        FieldKind::U1v => {
            let len = r.get_u64(16)? as usize;
            let mut list = BitList::new();
            for _ in 0..len {
                list.push(r.get_bool()?);
            }
            r.advance((8 - len % 8) % 8)?;
            FieldValue::Bits(list)
        }
        FieldKind::U8v => {
            let len = r.get_u64(16)? as usize;
            FieldValue::U8v(r.get_bytes(len)?)
        }
        FieldKind::S8v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_i64(8)? as i8);
            }
            FieldValue::I8v(v)
        }
        FieldKind::U16v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_u64(16)? as u16);
            }
            FieldValue::U16v(v)
        }
        FieldKind::S16v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_i64(16)? as i16);
            }
            FieldValue::I16v(v)
        }
        FieldKind::U32v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_u64(32)? as u32);
            }
            FieldValue::U32v(v)
        }
        FieldKind::S32v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_i64(32)? as i32);
            }
            FieldValue::I32v(v)
        }
        FieldKind::U64v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_u64(64)?);
            }
            FieldValue::U64v(v)
        }
        FieldKind::S64v => {
            let len = r.get_u64(16)? as usize;
            let mut v = Vec::with_capacity(len);
            for _ in 0..len {
                v.push(r.get_i64(64)?);
            }
            FieldValue::I64v(v)
        }
        FieldKind::BytesToEnd => {
            let count = r.remaining_bits() / 8;
            FieldValue::Bytes(r.get_bytes(count)?)
        }
    };
    r.advance(desc.reserved_after as usize)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumDescriptor, FieldFormat};
    use std::sync::Arc;

    fn roundtrip(desc: &FieldDescriptor, value: FieldValue) {
        let mut w = BitWriter::new();
        encode_field(&mut w, desc, &value).unwrap();
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_field(&mut r, desc).unwrap(), value);
    }

    #[test]
    fn test_scalar_fields() {
        roundtrip(&FieldDescriptor::new("f", FieldKind::U8), FieldValue::U8(200));
        roundtrip(&FieldDescriptor::new("f", FieldKind::S16), FieldValue::I16(-300));
        roundtrip(&FieldDescriptor::new("f", FieldKind::U64), FieldValue::U64(u64::MAX));
        roundtrip(&FieldDescriptor::new("f", FieldKind::S64), FieldValue::I64(i64::MIN));
    }

    #[test]
    fn test_u96_chunked_layout() {
        let desc = FieldDescriptor::new("EPC", FieldKind::U96);
        let value = 0x0123_4567_89AB_CDEF_0011_2233u128;
        let mut w = BitWriter::new();
        encode_field(&mut w, &desc, &FieldValue::U96(value)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes.len(), 12);
        // Big-endian across the whole 96 bits.
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[11], 0x33);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_field(&mut r, &desc).unwrap(), FieldValue::U96(value));
    }

    #[test]
    fn test_bit_list_padding() {
        let desc = FieldDescriptor::new("f", FieldKind::U1v);
        let list: BitList = [true, false, true].into_iter().collect();
        let mut w = BitWriter::new();
        encode_field(&mut w, &desc, &FieldValue::Bits(list.clone())).unwrap();
        let bytes = w.into_bytes();
        // 16-bit count plus one padded byte of bit data.
        assert_eq!(bytes, vec![0, 3, 0b1010_0000]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_field(&mut r, &desc).unwrap(), FieldValue::Bits(list));
        assert_eq!(r.remaining_bits(), 0);
    }

    #[test]
    fn test_vectors_and_strings() {
        roundtrip(
            &FieldDescriptor::new("f", FieldKind::U16v),
            FieldValue::U16v(vec![1, 0xFFFF, 42]),
        );
        roundtrip(
            &FieldDescriptor::new("f", FieldKind::S32v),
            FieldValue::I32v(vec![-1, i32::MIN, 7]),
        );
        roundtrip(
            &FieldDescriptor::new("f", FieldKind::Utf8v).format(FieldFormat::Dec),
            FieldValue::Utf8("reader-01".to_string()),
        );
        roundtrip(&FieldDescriptor::new("f", FieldKind::Utf8v), FieldValue::Utf8(String::new()));
    }

    #[test]
    fn test_bytes_to_end_takes_rest_of_view() {
        let desc = FieldDescriptor::new("f", FieldKind::BytesToEnd);
        let mut w = BitWriter::new();
        encode_field(&mut w, &desc, &FieldValue::Bytes(vec![9, 8, 7])).unwrap();
        let bytes = w.into_bytes();
        let mut r = BitReader::new(&bytes);
        assert_eq!(
            decode_field(&mut r, &desc).unwrap(),
            FieldValue::Bytes(vec![9, 8, 7])
        );
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let desc = FieldDescriptor::new("Status", FieldKind::U16);
        let mut w = BitWriter::new();
        let err = encode_field(&mut w, &desc, &FieldValue::U32(1)).unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { property } if property == "Status"));
    }

    #[test]
    fn test_enum_membership_checked_on_decode() {
        let en = Arc::new(EnumDescriptor {
            name: "StatusType",
            entries: vec![("Success", 0), ("Failure", 1)],
        });
        let desc = FieldDescriptor::new("Status", FieldKind::U16).enumeration(en);
        let bytes = [0x00, 0x07];
        let mut r = BitReader::new(&bytes);
        let err = decode_field(&mut r, &desc).unwrap_err();
        assert!(matches!(err, Error::InvalidEnumValue { value: 7, .. }));
    }

    #[test]
    fn test_reserved_after_skipped() {
        let desc = FieldDescriptor::new("f", FieldKind::U2).reserved_after(6);
        let mut w = BitWriter::new();
        encode_field(&mut w, &desc, &FieldValue::U2(0b11)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0b1100_0000]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_field(&mut r, &desc).unwrap(), FieldValue::U2(3));
        // The trailing reserved bits were consumed, not left for the next
        // field.
        assert_eq!(r.remaining_bits(), 0);
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let mut w = BitWriter::new();
        let err = encode_field(
            &mut w,
            &FieldDescriptor::new("f", FieldKind::U2),
            &FieldValue::U2(4),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { .. }));

        let err = encode_field(
            &mut w,
            &FieldDescriptor::new("f", FieldKind::U96),
            &FieldValue::U96(1u128 << 96),
        )
        .unwrap_err();
        assert!(matches!(err, Error::FieldTypeMismatch { .. }));
    }

    #[test]
    fn test_reserved_bits_skipped() {
        let desc = FieldDescriptor::new("f", FieldKind::U1).reserved_before(7);
        let mut w = BitWriter::new();
        encode_field(&mut w, &desc, &FieldValue::Bool(true)).unwrap();
        let bytes = w.into_bytes();
        assert_eq!(bytes, vec![0x01]);
        let mut r = BitReader::new(&bytes);
        assert_eq!(decode_field(&mut r, &desc).unwrap(), FieldValue::Bool(true));
    }
}

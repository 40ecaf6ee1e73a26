// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema-driven message decoder.
//!
//! Decoding walks the type descriptor's property slots in order, matching
//! wire elements against each slot:
//!
//! - An element whose type is known but does not belong to the current slot
//!   rewinds the cursor and leaves the slot absent, so a later slot can
//!   claim it.
//! - An unknown builtin type number is a hard error; the schema-implied
//!   length of TV parameters makes skipping impossible, and a builtin TLV
//!   the registry has never heard of indicates a version mismatch worth
//!   surfacing.
//! - An unknown custom TLV is skipped using its declared length, leaving
//!   the cursor exactly past it; vendor extensions from a newer peer must
//!   not break the session.
//! - A known TLV's body is decoded through a bounded sub-view and the outer
//!   cursor then jumps to the declared end, so padding or unknown trailing
//!   fields inside a parameter are ignored.
//!
//! A frame that ends before the remaining slots are reached is tolerated as
//! long as every slot left empty was optional.

use log::{debug, trace};

use crate::bits::BitReader;
use crate::codec::encoder::{CUSTOM_TYPE_NUM, PROTOCOL_VERSION};
use crate::codec::fields::decode_field;
use crate::error::{Error, Result};
use crate::message::{Message, Parameter, PropertyValue, TypeId};
use crate::schema::{PropertyDescriptor, PropertyKind, Registry, TypeDescriptor};

/// Minimum encoded message size: header fields only.
pub(crate) const MESSAGE_HEADER_LEN: usize = 10;

/// Smallest legal TLV: 6 reserved bits, 10-bit type, 16-bit length.
const TLV_HEADER_LEN: usize = 4;

/// A custom TLV additionally carries 32-bit vendor and subtype.
const CUSTOM_TLV_HEADER_LEN: usize = TLV_HEADER_LEN + 8;

pub struct BinaryDecoder<'a> {
    registry: &'a Registry,
}

enum MatchOutcome {
    /// Element decoded and belongs to the slot under consideration.
    Matched(Parameter),
    /// Element belongs to a different slot; cursor rewound.
    NotMine,
    /// Unknown custom element skipped; cursor past its declared length.
    Skipped,
}

impl<'a> BinaryDecoder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Decode one complete frame. Bytes beyond the header's declared length
    /// are ignored; a frame shorter than its declared length fails.
    pub fn decode_message(&self, data: &[u8]) -> Result<Message> {
        let mut r = BitReader::new(data);
        let _reserved = r.get_u64(3)?;
        let version = r.get_u64(3)?;
        if version != u64::from(PROTOCOL_VERSION) {
            debug!("message carries protocol version {}, continuing", version);
        }
        let type_num = r.get_u64(10)? as u16;
        let length = r.get_u64(32)? as usize;
        if length < MESSAGE_HEADER_LEN {
            return Err(Error::InvalidLength {
                context: "message header",
                length,
            });
        }
        let message_id = r.get_u64(32)? as u32;

        let (type_id, desc) = if type_num == CUSTOM_TYPE_NUM {
            let vendor = r.get_u64(32)? as u32;
            let subtype = r.get_u64(8)? as u32;
            let desc = self.registry.custom_message(vendor, subtype)?.as_ref();
            (TypeId::Custom { vendor, subtype }, desc)
        } else {
            let desc = self.registry.message(type_num)?.as_ref();
            (TypeId::Builtin(type_num), desc)
        };

        let header_bits = r.position();
        if length * 8 < header_bits {
            // Custom messages carry a longer header than the declared length.
            return Err(Error::InvalidLength {
                context: "message header",
                length,
            });
        }
        // Bounding the body to the declared length rejects truncated input
        // and ignores trailing bytes past the frame.
        let outer = BitReader::new(data);
        let mut body = outer.slice(header_bits, length * 8 - header_bits)?;
        body.advance(desc.reserved_bits as usize)?;
        let properties = self.decode_properties(&mut body, desc)?;

        trace!("decoded {} id={}", desc.name, message_id);
        Ok(Message {
            type_id,
            message_id,
            properties,
        })
    }

    fn decode_properties(
        &self,
        r: &mut BitReader<'_>,
        desc: &TypeDescriptor,
    ) -> Result<Vec<PropertyValue>> {
        let mut out = Vec::with_capacity(desc.properties.len());
        for prop in &desc.properties {
            match &prop.kind {
                PropertyKind::Field(fd) => {
                    if r.remaining_bits() == 0 {
                        if prop.required {
                            return Err(missing(desc, prop));
                        }
                        out.push(PropertyValue::Absent);
                        continue;
                    }
                    out.push(PropertyValue::Field(decode_field(r, fd)?));
                }
                PropertyKind::Parameter { .. } => {
                    let mut items = Vec::new();
                    // The smallest element (a bare TV header) is one byte;
                    // anything shorter is padding.
                    while r.remaining_bits() > 8 {
                        match self.try_match_parameter(r, prop)? {
                            MatchOutcome::Matched(param) => {
                                items.push(param);
                                if !prop.repeated {
                                    break;
                                }
                            }
                            MatchOutcome::NotMine => break,
                            MatchOutcome::Skipped => continue,
                        }
                    }
                    if items.is_empty() {
                        if prop.required {
                            return Err(missing(desc, prop));
                        }
                        out.push(PropertyValue::Absent);
                    } else {
                        out.push(PropertyValue::Params(items));
                    }
                }
            }
        }
        Ok(out)
    }

    fn try_match_parameter(
        &self,
        r: &mut BitReader<'_>,
        prop: &PropertyDescriptor,
    ) -> Result<MatchOutcome> {
        let start = r.position();
        if r.peek_bool()? {
            self.match_tv(r, prop, start)
        } else {
            self.match_tlv(r, prop, start)
        }
    }

    fn match_tv(
        &self,
        r: &mut BitReader<'_>,
        prop: &PropertyDescriptor,
        start: usize,
    ) -> Result<MatchOutcome> {
        r.advance(1)?;
        let num = r.get_u64(7)? as u16;
        let desc = self.registry.parameter(num)?.as_ref();
        if !prop.accepts(desc.id) {
            r.set_position(start)?;
            return Ok(MatchOutcome::NotMine);
        }
        // TV bodies have no length header; fields are decoded in place.
        let mut param = Parameter::new(desc.id);
        for field_prop in &desc.properties {
            match &field_prop.kind {
                PropertyKind::Field(fd) => {
                    param.properties.push(PropertyValue::Field(decode_field(r, fd)?));
                }
                PropertyKind::Parameter { .. } => {
                    // TV parameters cannot nest; a descriptor that says
                    // otherwise is malformed.
                    return Err(Error::FieldTypeMismatch {
                        property: field_prop.name.to_string(),
                    });
                }
            }
        }
        Ok(MatchOutcome::Matched(param))
    }

    fn match_tlv(
        &self,
        r: &mut BitReader<'_>,
        prop: &PropertyDescriptor,
        start: usize,
    ) -> Result<MatchOutcome> {
        r.advance(6)?;
        let num = r.get_u64(10)? as u16;
        let length = r.get_u64(16)? as usize;
        if length < TLV_HEADER_LEN {
            return Err(Error::InvalidLength {
                context: "tlv parameter",
                length,
            });
        }
        let end = start + length * 8;

        let (type_id, desc) = if num == CUSTOM_TYPE_NUM {
            if length < CUSTOM_TLV_HEADER_LEN {
                return Err(Error::InvalidLength {
                    context: "custom tlv parameter",
                    length,
                });
            }
            let vendor = r.get_u64(32)? as u32;
            let subtype = r.get_u64(32)? as u32;
            match self.registry.custom_parameter(vendor, subtype) {
                Some(desc) => (TypeId::Custom { vendor, subtype }, desc.as_ref()),
                None => {
                    debug!(
                        "skipping unknown custom parameter vendor={} subtype={} ({} bytes)",
                        vendor, subtype, length
                    );
                    r.set_position(end)?;
                    return Ok(MatchOutcome::Skipped);
                }
            }
        } else {
            (TypeId::Builtin(num), self.registry.parameter(num)?.as_ref())
        };

        if !prop.accepts(type_id) {
            r.set_position(start)?;
            return Ok(MatchOutcome::NotMine);
        }

        let mut body = r.slice(r.position(), end - r.position())?;
        body.advance(desc.reserved_bits as usize)?;
        let properties = self.decode_properties(&mut body, desc)?;
        // Jump to the declared end regardless of how much the body decode
        // consumed; the remainder is padding or unknown trailing content.
        r.set_position(end)?;
        Ok(MatchOutcome::Matched(Parameter { type_id, properties }))
    }
}

fn missing(desc: &TypeDescriptor, prop: &PropertyDescriptor) -> Error {
    Error::MissingRequired {
        type_name: desc.name.to_string(),
        property: prop.name.to_string(),
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema-driven message encoder.
//!
//! Length fields are written as placeholders, then backpatched once the
//! enclosed content size is known. TLV parameter content is padded with zero
//! bits to a byte boundary before the length is patched, so parameter
//! lengths are always whole bytes.

use crate::bits::BitWriter;
use crate::codec::fields::encode_field;
use crate::error::{Error, Result};
use crate::message::{Message, Parameter, PropertyValue, TypeId};
use crate::schema::{PropertyDescriptor, PropertyKind, Registry, TypeDescriptor};

/// Protocol version stamped into every message header.
pub(crate) const PROTOCOL_VERSION: u8 = 1;

/// Wire type number signalling a custom (vendor extension) message or
/// parameter.
pub(crate) const CUSTOM_TYPE_NUM: u16 = 1023;

pub struct BinaryEncoder<'a> {
    registry: &'a Registry,
}

impl<'a> BinaryEncoder<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Encode `message` into a complete frame, header included.
    pub fn encode_message(&self, message: &Message) -> Result<Vec<u8>> {
        let desc = self.registry.message_by_id(message.type_id)?.as_ref();
        let mut w = BitWriter::new();

        w.put_reserved(3);
        w.put_u64(u64::from(PROTOCOL_VERSION), 3);
        let type_num = match message.type_id {
            TypeId::Builtin(num) => num,
            TypeId::Custom { .. } => CUSTOM_TYPE_NUM,
        };
        w.put_u64(u64::from(type_num), 10);
        let length_pos = w.position();
        w.put_u64(0, 32); // placeholder, patched below
        w.put_u64(u64::from(message.message_id), 32);
        if let TypeId::Custom { vendor, subtype } = message.type_id {
            // The registry rejects subtypes above 0xFF at registration.
            w.put_u64(u64::from(vendor), 32);
            w.put_u64(u64::from(subtype), 8);
        }

        w.put_reserved(desc.reserved_bits as usize);
        self.encode_properties(&mut w, desc, &message.properties)?;

        pad_to_byte(&mut w, 0);
        let total = w.byte_len();
        w.set_position(length_pos);
        w.put_u64(total as u64, 32);
        Ok(w.into_bytes())
    }

    /// Encode a single parameter (TV or TLV, header included).
    pub fn encode_parameter(&self, w: &mut BitWriter, param: &Parameter) -> Result<()> {
        let desc = self.registry.parameter_by_id(param.type_id)?.as_ref();
        if desc.is_tv() {
            self.encode_tv(w, desc, param)
        } else {
            self.encode_tlv(w, desc, param)
        }
    }

    fn encode_tv(&self, w: &mut BitWriter, desc: &TypeDescriptor, param: &Parameter) -> Result<()> {
        let num = match desc.id {
            TypeId::Builtin(num) => num,
            // is_tv() excludes custom ids.
            TypeId::Custom { .. } => unreachable!(),
        };
        w.put_bool(true);
        w.put_u64(u64::from(num), 7);
        self.encode_properties(w, desc, &param.properties)
    }

    fn encode_tlv(&self, w: &mut BitWriter, desc: &TypeDescriptor, param: &Parameter) -> Result<()> {
        let start = w.position();
        w.put_reserved(6);
        let type_num = match desc.id {
            TypeId::Builtin(num) => num,
            TypeId::Custom { .. } => CUSTOM_TYPE_NUM,
        };
        w.put_u64(u64::from(type_num), 10);
        let length_pos = w.position();
        w.put_u64(0, 16); // placeholder, patched below
        if let TypeId::Custom { vendor, subtype } = desc.id {
            w.put_u64(u64::from(vendor), 32);
            w.put_u64(u64::from(subtype), 32);
        }

        w.put_reserved(desc.reserved_bits as usize);
        self.encode_properties(w, desc, &param.properties)?;

        pad_to_byte(w, start);
        let end = w.position();
        let total_bytes = (end - start) / 8;
        if total_bytes > u16::MAX as usize {
            return Err(Error::InvalidLength {
                context: "tlv parameter",
                length: total_bytes,
            });
        }
        w.set_position(length_pos);
        w.put_u64(total_bytes as u64, 16);
        w.set_position(end);
        Ok(())
    }

    fn encode_properties(
        &self,
        w: &mut BitWriter,
        desc: &TypeDescriptor,
        properties: &[PropertyValue],
    ) -> Result<()> {
        for (index, prop) in desc.properties.iter().enumerate() {
            let value = properties.get(index).unwrap_or(&PropertyValue::Absent);
            match (&prop.kind, value) {
                (PropertyKind::Field(fd), PropertyValue::Field(fv)) => {
                    encode_field(w, fd, fv)?;
                }
                (PropertyKind::Parameter { .. }, PropertyValue::Params(params)) => {
                    if params.is_empty() && prop.required {
                        return Err(missing(desc, prop));
                    }
                    for param in params {
                        if !prop.accepts(param.type_id) {
                            return Err(Error::FieldTypeMismatch {
                                property: prop.name.to_string(),
                            });
                        }
                        self.encode_parameter(w, param)?;
                    }
                }
                (_, PropertyValue::Absent) => {
                    if prop.required {
                        return Err(missing(desc, prop));
                    }
                }
                // Field value in a parameter slot or vice versa.
                _ => {
                    return Err(Error::FieldTypeMismatch {
                        property: prop.name.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

fn missing(desc: &TypeDescriptor, prop: &PropertyDescriptor) -> Error {
    Error::MissingRequired {
        type_name: desc.name.to_string(),
        property: prop.name.to_string(),
    }
}

/// Zero-pad so the distance from `origin` is a whole number of bytes.
fn pad_to_byte(w: &mut BitWriter, origin: usize) {
    let rem = (w.position() - origin) % 8;
    if rem != 0 {
        w.put_reserved(8 - rem);
    }
}

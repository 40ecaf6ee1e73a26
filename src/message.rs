// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Decoded message and parameter representation.
//!
//! The codec works against a generic tree: a [`Message`] or [`Parameter`]
//! holds one [`PropertyValue`] per property slot of its schema type, in
//! schema order. Field values are carried as the [`FieldValue`] variant
//! matching the field's schema kind, so a decode of an encode compares equal
//! with `==`.

use std::fmt;

/// Identity of a message or parameter type on the wire.
///
/// Builtin types use a plain type number; custom extensions live under the
/// reserved type number 1023 and are identified by vendor and subtype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Builtin(u16),
    Custom { vendor: u32, subtype: u32 },
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeId::Builtin(num) => write!(f, "type {}", num),
            TypeId::Custom { vendor, subtype } => {
                write!(f, "custom vendor {} subtype {}", vendor, subtype)
            }
        }
    }
}

/// A sequence of individual bits, used for the `U1v` field kind.
///
/// On the wire a bit list carries a 16-bit bit count followed by the bits
/// packed MSB-first and padded to a byte boundary; padding bits are not part
/// of the list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitList {
    bits: Vec<bool>,
}

impl BitList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from packed bytes, keeping the first `len` bits.
    pub fn from_bytes(bytes: &[u8], len: usize) -> Self {
        let mut bits = Vec::with_capacity(len);
        for i in 0..len {
            bits.push((bytes[i / 8] & (0x80 >> (i % 8))) != 0);
        }
        Self { bits }
    }

    pub fn len(&self) -> usize {
        self.bits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<bool> {
        self.bits.get(index).copied()
    }

    pub fn push(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.bits.iter().copied()
    }
}

impl FromIterator<bool> for BitList {
    fn from_iter<T: IntoIterator<Item = bool>>(iter: T) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

/// A single field value, one variant per schema field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    U2(u8),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    /// 96-bit unsigned value (EPC identifiers), stored in the low 96 bits.
    U96(u128),
    Utf8(String),
    Bits(BitList),
    U8v(Vec<u8>),
    I8v(Vec<i8>),
    U16v(Vec<u16>),
    I16v(Vec<i16>),
    U32v(Vec<u32>),
    I32v(Vec<i32>),
    U64v(Vec<u64>),
    I64v(Vec<i64>),
    /// Raw bytes running to the end of the enclosing parameter.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Bool(_) => "Bool",
            FieldValue::U2(_) => "U2",
            FieldValue::U8(_) => "U8",
            FieldValue::I8(_) => "I8",
            FieldValue::U16(_) => "U16",
            FieldValue::I16(_) => "I16",
            FieldValue::U32(_) => "U32",
            FieldValue::I32(_) => "I32",
            FieldValue::U64(_) => "U64",
            FieldValue::I64(_) => "I64",
            FieldValue::U96(_) => "U96",
            FieldValue::Utf8(_) => "Utf8",
            FieldValue::Bits(_) => "Bits",
            FieldValue::U8v(_) => "U8v",
            FieldValue::I8v(_) => "I8v",
            FieldValue::U16v(_) => "U16v",
            FieldValue::I16v(_) => "I16v",
            FieldValue::U32v(_) => "U32v",
            FieldValue::I32v(_) => "I32v",
            FieldValue::U64v(_) => "U64v",
            FieldValue::I64v(_) => "I64v",
            FieldValue::Bytes(_) => "Bytes",
        }
    }
}

/// Contents of one property slot.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Optional property not present.
    Absent,
    /// A field property.
    Field(FieldValue),
    /// A parameter property; non-repeated slots hold zero or one element.
    Params(Vec<Parameter>),
}

impl PropertyValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, PropertyValue::Absent)
    }

    pub fn as_field(&self) -> Option<&FieldValue> {
        match self {
            PropertyValue::Field(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_params(&self) -> &[Parameter] {
        match self {
            PropertyValue::Params(params) => params,
            _ => &[],
        }
    }
}

/// A decoded parameter: its wire identity plus one value per property slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub type_id: TypeId,
    pub properties: Vec<PropertyValue>,
}

impl Parameter {
    pub fn new(type_id: TypeId) -> Self {
        Self {
            type_id,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, index: usize) -> &PropertyValue {
        self.properties.get(index).unwrap_or(&PropertyValue::Absent)
    }

    /// Set property slot `index`, growing intermediate slots as absent.
    pub fn set_property(&mut self, index: usize, value: PropertyValue) -> &mut Self {
        if self.properties.len() <= index {
            self.properties.resize(index + 1, PropertyValue::Absent);
        }
        self.properties[index] = value;
        self
    }

    pub fn set_field(&mut self, index: usize, value: FieldValue) -> &mut Self {
        self.set_property(index, PropertyValue::Field(value))
    }

    pub fn add_param(&mut self, index: usize, param: Parameter) -> &mut Self {
        if self.properties.len() <= index {
            self.properties.resize(index + 1, PropertyValue::Absent);
        }
        match &mut self.properties[index] {
            PropertyValue::Params(params) => params.push(param),
            slot => *slot = PropertyValue::Params(vec![param]),
        }
        self
    }
}

/// A decoded message: wire identity, message id, and property slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub type_id: TypeId,
    /// Correlates a response with the request that triggered it.
    pub message_id: u32,
    pub properties: Vec<PropertyValue>,
}

impl Message {
    pub fn new(type_id: TypeId, message_id: u32) -> Self {
        Self {
            type_id,
            message_id,
            properties: Vec::new(),
        }
    }

    pub fn property(&self, index: usize) -> &PropertyValue {
        self.properties.get(index).unwrap_or(&PropertyValue::Absent)
    }

    pub fn set_property(&mut self, index: usize, value: PropertyValue) -> &mut Self {
        if self.properties.len() <= index {
            self.properties.resize(index + 1, PropertyValue::Absent);
        }
        self.properties[index] = value;
        self
    }

    pub fn set_field(&mut self, index: usize, value: FieldValue) -> &mut Self {
        self.set_property(index, PropertyValue::Field(value))
    }

    pub fn add_param(&mut self, index: usize, param: Parameter) -> &mut Self {
        if self.properties.len() <= index {
            self.properties.resize(index + 1, PropertyValue::Absent);
        }
        match &mut self.properties[index] {
            PropertyValue::Params(params) => params.push(param),
            slot => *slot = PropertyValue::Params(vec![param]),
        }
        self
    }
}

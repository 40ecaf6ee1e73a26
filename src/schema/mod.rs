// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema descriptors driving the binary codec.
//!
//! LLRP is schema-driven: the wire form of a message or parameter is fully
//! determined by its [`TypeDescriptor`], an ordered list of property slots
//! where each slot is either a field (inline scalar/vector data) or a nested
//! parameter. The codec walks descriptors rather than hand-written per-type
//! code, so vendor extensions are supported by registering descriptors at
//! runtime.
//!
//! Descriptors are immutable once a [`Registry`] is built; lookups hand out
//! shared `Arc` references.

mod core_types;
mod registry;

pub use core_types::{
    core_registry, register_core_types, ConnectionAttemptStatus, MSG_KEEPALIVE,
    MSG_KEEPALIVE_ACK, MSG_READER_EVENT_NOTIFICATION, PARAM_CONNECTION_ATTEMPT_EVENT,
    PARAM_READER_EVENT_NOTIFICATION_DATA, PARAM_UPTIME, PARAM_UTC_TIMESTAMP,
};
pub use registry::{Registry, RegistryBuilder};

use std::sync::Arc;

use crate::message::TypeId;

/// Wire representation of a field.
///
/// `v`-suffixed kinds are variable-length vectors carrying a 16-bit element
/// count prefix (`U1v` counts bits and pads to a byte boundary; `Utf8v`
/// counts bytes). `BytesToEnd` consumes the rest of the enclosing value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U1,
    U2,
    U8,
    S8,
    U16,
    S16,
    U32,
    S32,
    U64,
    S64,
    U96,
    U1v,
    U8v,
    S8v,
    U16v,
    S16v,
    U32v,
    S32v,
    U64v,
    S64v,
    Utf8v,
    BytesToEnd,
}

impl FieldKind {
    /// Fixed bit width, or `None` for variable-length kinds.
    pub fn fixed_bits(self) -> Option<u32> {
        match self {
            FieldKind::U1 => Some(1),
            FieldKind::U2 => Some(2),
            FieldKind::U8 | FieldKind::S8 => Some(8),
            FieldKind::U16 | FieldKind::S16 => Some(16),
            FieldKind::U32 | FieldKind::S32 => Some(32),
            FieldKind::U64 | FieldKind::S64 => Some(64),
            FieldKind::U96 => Some(96),
            _ => None,
        }
    }
}

/// Display hint for tooling; does not affect the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldFormat {
    #[default]
    Dec,
    Hex,
    Datetime,
}

/// A named integer enumeration constraining a field's values.
#[derive(Debug)]
pub struct EnumDescriptor {
    pub name: &'static str,
    pub entries: Vec<(&'static str, u64)>,
}

impl EnumDescriptor {
    pub fn contains(&self, value: u64) -> bool {
        self.entries.iter().any(|(_, v)| *v == value)
    }

    pub fn name_of(&self, value: u64) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(_, v)| *v == value)
            .map(|(n, _)| *n)
    }
}

/// One field within a type.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub kind: FieldKind,
    pub format: FieldFormat,
    /// Reserved (zero) bits written immediately before this field.
    pub reserved_before: u32,
    /// Reserved (zero) bits written immediately after this field.
    pub reserved_after: u32,
    /// Enumeration the decoded value must belong to, if any.
    pub enumeration: Option<Arc<EnumDescriptor>>,
}

impl FieldDescriptor {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            format: FieldFormat::Dec,
            reserved_before: 0,
            reserved_after: 0,
            enumeration: None,
        }
    }

    pub fn format(mut self, format: FieldFormat) -> Self {
        self.format = format;
        self
    }

    pub fn reserved_before(mut self, bits: u32) -> Self {
        self.reserved_before = bits;
        self
    }

    pub fn reserved_after(mut self, bits: u32) -> Self {
        self.reserved_after = bits;
        self
    }

    pub fn enumeration(mut self, desc: Arc<EnumDescriptor>) -> Self {
        self.enumeration = Some(desc);
        self
    }
}

/// What a property slot contains.
#[derive(Debug, Clone)]
pub enum PropertyKind {
    Field(FieldDescriptor),
    /// Nested parameter; `allowed` lists the concrete types accepted by this
    /// slot (a choice slot lists several).
    Parameter { allowed: Vec<TypeId> },
}

/// One property slot of a type, in wire order.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    pub name: &'static str,
    pub required: bool,
    pub repeated: bool,
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    pub fn field(desc: FieldDescriptor) -> Self {
        Self {
            name: desc.name,
            required: true,
            repeated: false,
            kind: PropertyKind::Field(desc),
        }
    }

    pub fn param(name: &'static str, allowed: Vec<TypeId>) -> Self {
        Self {
            name,
            required: true,
            repeated: false,
            kind: PropertyKind::Parameter { allowed },
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn repeated(mut self) -> Self {
        self.repeated = true;
        self
    }

    /// Whether a parameter of type `candidate` may occupy this slot.
    pub fn accepts(&self, candidate: TypeId) -> bool {
        match &self.kind {
            PropertyKind::Parameter { allowed } => allowed.contains(&candidate),
            PropertyKind::Field(_) => false,
        }
    }
}

/// Complete wire description of one message or parameter type.
#[derive(Debug)]
pub struct TypeDescriptor {
    pub name: &'static str,
    pub id: TypeId,
    /// Reserved (zero) bits at the start of the body, before any property.
    pub reserved_bits: u32,
    pub properties: Vec<PropertyDescriptor>,
    /// For request messages, the type of the expected response.
    pub response_type: Option<TypeId>,
}

impl TypeDescriptor {
    pub fn new(name: &'static str, id: TypeId) -> Self {
        Self {
            name,
            id,
            reserved_bits: 0,
            properties: Vec::new(),
            response_type: None,
        }
    }

    pub fn reserved_bits(mut self, bits: u32) -> Self {
        self.reserved_bits = bits;
        self
    }

    pub fn property(mut self, prop: PropertyDescriptor) -> Self {
        self.properties.push(prop);
        self
    }

    pub fn response_type(mut self, id: TypeId) -> Self {
        self.response_type = Some(id);
        self
    }

    /// TV parameters (builtin type numbers 0..=127) carry a compact header
    /// with no explicit length.
    pub fn is_tv(&self) -> bool {
        matches!(self.id, TypeId::Builtin(num) if num < 128)
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Runtime registry of type descriptors.
//!
//! Four namespaces keyed separately: builtin messages by type number, custom
//! messages by `(vendor, subtype)`, and the same split for parameters. Type
//! number ranges are validated at registration so the codec can trust the
//! registry's contents.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::message::TypeId;
use crate::schema::TypeDescriptor;

/// Immutable lookup table built by [`RegistryBuilder`].
#[derive(Debug, Default)]
pub struct Registry {
    messages: HashMap<u16, Arc<TypeDescriptor>>,
    custom_messages: HashMap<(u32, u32), Arc<TypeDescriptor>>,
    parameters: HashMap<u16, Arc<TypeDescriptor>>,
    custom_parameters: HashMap<(u32, u32), Arc<TypeDescriptor>>,
}

impl Registry {
    pub fn message(&self, type_num: u16) -> Result<&Arc<TypeDescriptor>> {
        self.messages
            .get(&type_num)
            .ok_or(Error::UnknownMessageType(type_num))
    }

    pub fn custom_message(&self, vendor: u32, subtype: u32) -> Result<&Arc<TypeDescriptor>> {
        self.custom_messages
            .get(&(vendor, subtype))
            .ok_or(Error::UnknownCustomMessage { vendor, subtype })
    }

    pub fn parameter(&self, type_num: u16) -> Result<&Arc<TypeDescriptor>> {
        self.parameters
            .get(&type_num)
            .ok_or(Error::UnknownParameterType(type_num))
    }

    /// Unknown custom parameters are skippable on decode, so this lookup is
    /// an `Option` rather than an error.
    pub fn custom_parameter(&self, vendor: u32, subtype: u32) -> Option<&Arc<TypeDescriptor>> {
        self.custom_parameters.get(&(vendor, subtype))
    }

    pub fn message_by_id(&self, id: TypeId) -> Result<&Arc<TypeDescriptor>> {
        match id {
            TypeId::Builtin(num) => self.message(num),
            TypeId::Custom { vendor, subtype } => self.custom_message(vendor, subtype),
        }
    }

    pub fn parameter_by_id(&self, id: TypeId) -> Result<&Arc<TypeDescriptor>> {
        match id {
            TypeId::Builtin(num) => self.parameter(num),
            TypeId::Custom { vendor, subtype } => self
                .custom_parameter(vendor, subtype)
                .ok_or(Error::UnknownParameterType(1023)),
        }
    }
}

/// Accumulates descriptors, validating type number ranges and duplicates.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message descriptor. Builtin message type numbers occupy
    /// 10 bits with 1023 reserved for the custom escape; custom message
    /// subtypes occupy 8 bits on the wire.
    pub fn register_message(&mut self, desc: TypeDescriptor) -> Result<&mut Self> {
        let desc = Arc::new(desc);
        match desc.id {
            TypeId::Builtin(num) => {
                if num > 1022 {
                    return Err(Error::InvalidTypeNumber {
                        name: desc.name.to_string(),
                        type_num: num,
                    });
                }
                if self.registry.messages.insert(num, desc.clone()).is_some() {
                    return Err(Error::DuplicateType(desc.name.to_string()));
                }
            }
            TypeId::Custom { vendor, subtype } => {
                // The message header carries only 8 bits of subtype.
                if subtype > 0xFF {
                    return Err(Error::InvalidSubtype {
                        name: desc.name.to_string(),
                        subtype,
                    });
                }
                if self
                    .registry
                    .custom_messages
                    .insert((vendor, subtype), desc.clone())
                    .is_some()
                {
                    return Err(Error::DuplicateType(desc.name.to_string()));
                }
            }
        }
        Ok(self)
    }

    /// Register a parameter descriptor. Builtin parameter type numbers span
    /// 0..=127 for TV and 128..=1022 for TLV; 1023 is the custom escape.
    pub fn register_parameter(&mut self, desc: TypeDescriptor) -> Result<&mut Self> {
        let desc = Arc::new(desc);
        match desc.id {
            TypeId::Builtin(num) => {
                if num > 1022 {
                    return Err(Error::InvalidTypeNumber {
                        name: desc.name.to_string(),
                        type_num: num,
                    });
                }
                if self.registry.parameters.insert(num, desc.clone()).is_some() {
                    return Err(Error::DuplicateType(desc.name.to_string()));
                }
            }
            TypeId::Custom { vendor, subtype } => {
                if self
                    .registry
                    .custom_parameters
                    .insert((vendor, subtype), desc.clone())
                    .is_some()
                {
                    return Err(Error::DuplicateType(desc.name.to_string()));
                }
            }
        }
        Ok(self)
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

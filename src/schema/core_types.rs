// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Core type descriptors required by the transport layer.
//!
//! The connection handshake and keepalive machinery depend on a handful of
//! well-known types: KEEPALIVE / KEEPALIVE_ACK, READER_EVENT_NOTIFICATION
//! and the parameters carried inside it. Full protocol bindings register
//! their generated descriptors on top of these.

use std::sync::Arc;

use crate::error::Result;
use crate::message::TypeId;
use crate::schema::{
    EnumDescriptor, FieldDescriptor, FieldFormat, FieldKind, PropertyDescriptor, Registry,
    RegistryBuilder, TypeDescriptor,
};

pub const MSG_KEEPALIVE: u16 = 62;
pub const MSG_READER_EVENT_NOTIFICATION: u16 = 63;
pub const MSG_KEEPALIVE_ACK: u16 = 72;

pub const PARAM_UTC_TIMESTAMP: u16 = 128;
pub const PARAM_UPTIME: u16 = 129;
pub const PARAM_READER_EVENT_NOTIFICATION_DATA: u16 = 246;
pub const PARAM_CONNECTION_ATTEMPT_EVENT: u16 = 256;

/// Status carried by a ConnectionAttemptEvent during the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAttemptStatus {
    Success,
    FailedReaderExists,
    FailedClientExists,
    FailedOther,
    AnotherConnectionAttempted,
}

impl ConnectionAttemptStatus {
    pub fn value(self) -> u16 {
        match self {
            ConnectionAttemptStatus::Success => 0,
            ConnectionAttemptStatus::FailedReaderExists => 1,
            ConnectionAttemptStatus::FailedClientExists => 2,
            ConnectionAttemptStatus::FailedOther => 3,
            ConnectionAttemptStatus::AnotherConnectionAttempted => 4,
        }
    }

    pub fn from_value(value: u16) -> Option<Self> {
        match value {
            0 => Some(ConnectionAttemptStatus::Success),
            1 => Some(ConnectionAttemptStatus::FailedReaderExists),
            2 => Some(ConnectionAttemptStatus::FailedClientExists),
            3 => Some(ConnectionAttemptStatus::FailedOther),
            4 => Some(ConnectionAttemptStatus::AnotherConnectionAttempted),
            _ => None,
        }
    }
}

fn connection_attempt_status_enum() -> Arc<EnumDescriptor> {
    Arc::new(EnumDescriptor {
        name: "ConnectionAttemptStatusType",
        entries: vec![
            ("Success", 0),
            ("Failed_A_Reader_Initiated_Connection_Already_Exists", 1),
            ("Failed_A_Client_Initiated_Connection_Already_Exists", 2),
            ("Failed_Reason_Other_Than_A_Connection_Already_Exists", 3),
            ("Another_Connection_Attempted", 4),
        ],
    })
}

/// Register the core messages and parameters into `builder`.
pub fn register_core_types(builder: &mut RegistryBuilder) -> Result<()> {
    builder.register_parameter(
        TypeDescriptor::new("UTCTimestamp", TypeId::Builtin(PARAM_UTC_TIMESTAMP)).property(
            PropertyDescriptor::field(
                FieldDescriptor::new("Microseconds", FieldKind::U64)
                    .format(FieldFormat::Datetime),
            ),
        ),
    )?;

    builder.register_parameter(
        TypeDescriptor::new("Uptime", TypeId::Builtin(PARAM_UPTIME)).property(
            PropertyDescriptor::field(
                FieldDescriptor::new("Microseconds", FieldKind::U64)
                    .format(FieldFormat::Datetime),
            ),
        ),
    )?;

    builder.register_parameter(
        TypeDescriptor::new(
            "ConnectionAttemptEvent",
            TypeId::Builtin(PARAM_CONNECTION_ATTEMPT_EVENT),
        )
        .property(PropertyDescriptor::field(
            FieldDescriptor::new("Status", FieldKind::U16)
                .enumeration(connection_attempt_status_enum()),
        )),
    )?;

    builder.register_parameter(
        TypeDescriptor::new(
            "ReaderEventNotificationData",
            TypeId::Builtin(PARAM_READER_EVENT_NOTIFICATION_DATA),
        )
        .property(PropertyDescriptor::param(
            "Timestamp",
            vec![
                TypeId::Builtin(PARAM_UTC_TIMESTAMP),
                TypeId::Builtin(PARAM_UPTIME),
            ],
        ))
        .property(
            PropertyDescriptor::param(
                "ConnectionAttemptEvent",
                vec![TypeId::Builtin(PARAM_CONNECTION_ATTEMPT_EVENT)],
            )
            .optional(),
        ),
    )?;

    builder.register_message(
        TypeDescriptor::new("KEEPALIVE", TypeId::Builtin(MSG_KEEPALIVE))
            .response_type(TypeId::Builtin(MSG_KEEPALIVE_ACK)),
    )?;

    builder.register_message(TypeDescriptor::new(
        "KEEPALIVE_ACK",
        TypeId::Builtin(MSG_KEEPALIVE_ACK),
    ))?;

    builder.register_message(
        TypeDescriptor::new(
            "READER_EVENT_NOTIFICATION",
            TypeId::Builtin(MSG_READER_EVENT_NOTIFICATION),
        )
        .property(PropertyDescriptor::param(
            "ReaderEventNotificationData",
            vec![TypeId::Builtin(PARAM_READER_EVENT_NOTIFICATION_DATA)],
        )),
    )?;

    Ok(())
}

/// A registry holding only the core types.
pub fn core_registry() -> Registry {
    let mut builder = RegistryBuilder::new();
    // Core descriptors are internally consistent; registration cannot fail.
    register_core_types(&mut builder).unwrap();
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_registry_contents() {
        let registry = core_registry();
        assert_eq!(registry.message(MSG_KEEPALIVE).unwrap().name, "KEEPALIVE");
        assert_eq!(
            registry.message(MSG_KEEPALIVE).unwrap().response_type,
            Some(TypeId::Builtin(MSG_KEEPALIVE_ACK))
        );
        assert!(registry.message(MSG_KEEPALIVE_ACK).unwrap().response_type.is_none());
        assert_eq!(
            registry
                .parameter(PARAM_CONNECTION_ATTEMPT_EVENT)
                .unwrap()
                .name,
            "ConnectionAttemptEvent"
        );
    }

    #[test]
    fn test_notification_data_slots() {
        let registry = core_registry();
        let desc = registry
            .parameter(PARAM_READER_EVENT_NOTIFICATION_DATA)
            .unwrap();
        assert_eq!(desc.properties.len(), 2);
        assert!(desc.properties[0].required);
        assert!(desc.properties[0].accepts(TypeId::Builtin(PARAM_UPTIME)));
        assert!(!desc.properties[1].required);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ConnectionAttemptStatus::Success,
            ConnectionAttemptStatus::FailedClientExists,
            ConnectionAttemptStatus::AnotherConnectionAttempted,
        ] {
            assert_eq!(
                ConnectionAttemptStatus::from_value(status.value()),
                Some(status)
            );
        }
        assert_eq!(ConnectionAttemptStatus::from_value(5), None);
    }
}

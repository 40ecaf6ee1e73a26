// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # LLRP - Low Level Reader Protocol
//!
//! A pure Rust implementation of the EPCglobal LLRP binary protocol and its
//! TCP transport, for talking to RFID readers from controller applications
//! (or emulating a reader for testing).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llrp::schema::core_registry;
//! use llrp::{EndpointConfig, LlrpClient, LlrpEndpoint, Message, Result, TypeId};
//!
//! struct Controller;
//! impl LlrpEndpoint for Controller {
//!     fn message_received(&self, message: Message) {
//!         println!("notification: {:?}", message.type_id);
//!     }
//! }
//!
//! fn main() -> Result<()> {
//!     let client = LlrpClient::connect(
//!         "192.168.1.50:5084".parse().unwrap(),
//!         Arc::new(core_registry()),
//!         EndpointConfig::default(),
//!         Arc::new(Controller),
//!     )?;
//!
//!     // Request/response with automatic correlation by message id.
//!     let keepalive = Message::new(TypeId::Builtin(62), 1);
//!     let ack = client.transact(&keepalive)?;
//!     println!("reader answered {:?}", ack.type_id);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                      Application Layer                       |
//! |        LlrpClient / LlrpServer -> LlrpEndpoint callbacks     |
//! +--------------------------------------------------------------+
//! |                       Message Layer                          |
//! |   transact correlation | KEEPALIVE handling | handshake      |
//! +--------------------------------------------------------------+
//! |                        Codec Layer                           |
//! |   schema-driven encode/decode | TV/TLV parameters | bits     |
//! +--------------------------------------------------------------+
//! |                      Transport Layer                         |
//! |        stream framing | mio poll loop | single peer          |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | A decoded LLRP message: type, id, property tree |
//! | [`Registry`] | Runtime table of type descriptors driving the codec |
//! | [`LlrpClient`] | Controller-side connected endpoint |
//! | [`LlrpServer`] | Reader-side listening endpoint |
//! | [`BinaryEncoder`] / [`BinaryDecoder`] | Standalone wire codec |
//!
//! ## Modules Overview
//!
//! - [`schema`] - Type descriptors and the registry (start here)
//! - [`codec`] - Binary encoder/decoder
//! - [`transport`] - TCP endpoints and the I/O thread
//! - [`bits`] - Bit-level cursors underlying the codec
//!
//! ## See Also
//!
//! - [LLRP Specification](https://www.gs1.org/standards/epc-rfid/llrp)

pub mod bits;
pub mod codec;
pub mod config;
pub mod error;
pub mod message;
pub mod schema;
pub mod transport;

pub use codec::{BinaryDecoder, BinaryEncoder};
pub use config::{EndpointConfig, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_PORT, DEFAULT_TIMEOUT};
pub use error::{Error, Result};
pub use message::{BitList, FieldValue, Message, Parameter, PropertyValue, TypeId};
pub use schema::{Registry, RegistryBuilder};
pub use transport::{LlrpClient, LlrpEndpoint, LlrpServer};

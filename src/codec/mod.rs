// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary wire codec.
//!
//! [`BinaryEncoder`] and [`BinaryDecoder`] translate between [`Message`]
//! trees and complete frames, driven entirely by the descriptors in a
//! [`Registry`](crate::schema::Registry).
//!
//! [`Message`]: crate::message::Message

mod decoder;
mod encoder;
mod fields;

pub use decoder::BinaryDecoder;
pub use encoder::BinaryEncoder;

pub(crate) use decoder::MESSAGE_HEADER_LEN;

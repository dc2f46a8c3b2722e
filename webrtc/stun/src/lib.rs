//! STUN Module - Session Traversal Utilities for NAT
//!
//! Implementation of STUN (RFC 5389) with the attributes ICE connectivity
//! checks need (RFC 8445): USERNAME, MESSAGE-INTEGRITY, FINGERPRINT, PRIORITY,
//! USE-CANDIDATE, ICE-CONTROLLED and ICE-CONTROLLING.

mod attribute_type;
mod client;
mod errors;
mod integrity;
mod message;
mod message_builder;
mod message_header;
mod message_type;
mod xor_mapped_address;

pub use attribute_type::AttributeType;
pub use client::{StunClient, binding_request};
pub use errors::StunError;
pub use message::{Message, RawAttribute};
pub use message_builder::MessageBuilder;
pub use message_header::{MAGIC_COOKIE, MessageHeader, is_stun_message};
pub use message_type::MessageType;

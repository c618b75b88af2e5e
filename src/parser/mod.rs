//! Parsers for the contents of a WhatsApp export.
//!
//! Three layers, lowest first:
//! - [`line`]: recognizes a single timestamped message header line.
//! - [`chat`]: assembles a full transcript into a [`ParsedChat`],
//!   merging continuation lines and assigning deterministic IDs.
//! - [`vcf`]: extracts contact cards shared inside the export.
//!
//! [`ParsedChat`]: crate::message::ParsedChat

pub mod chat;
pub mod line;
pub mod vcf;

pub use chat::parse_chat;
pub use line::{ParsedLine, looks_like_chat, parse_line};
pub use vcf::{ContactInfo, parse_vcf};

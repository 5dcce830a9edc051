//! Resource tree codecs
//!
//! Each codec converts between a resource file format and a flat key → value
//! mapping. They are plain tree transforms; nothing here talks to the network.

pub mod apple;
pub mod json;
pub mod xml;

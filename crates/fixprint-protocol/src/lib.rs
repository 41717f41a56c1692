//! FIX protocol support for fixprint
//!
//! This crate provides the tag=value decoder and the dictionary that names
//! message types and fields. The dictionary doubles as the type registry used
//! when printing the message summary.

mod decoder;
mod dictionary;
mod message;

pub use decoder::{FixDecoder, FixError};
pub use dictionary::{
    Dictionary, DictionaryError, DictionaryOverlay, FieldDef, FieldLocation, FieldOverlay,
    FieldType,
};
pub use message::{Field, FixMessage};

// Re-export traits used in our public API
pub use fixprint_types::{DecodedMessage, Decoder, TypeRegistry};

//! Shared types for fixprint
//!
//! This crate contains the seams between the log streaming loop and the
//! protocol it decodes. The loop only ever sees these traits, so any decoder
//! and name registry can be plugged in.

use std::error::Error;
use std::fmt;

// ============================================================================
// Decoding
// ============================================================================

/// A message reconstructed from one log line
pub trait DecodedMessage: fmt::Display {
    /// Short discriminator used to group messages in the summary
    fn type_tag(&self) -> &str;
}

/// Turns the payload of one log line into a message
pub trait Decoder {
    type Message: DecodedMessage;
    type Error: Error + Send + Sync + 'static;

    /// Decode a single non-empty line payload
    fn decode(&self, line: &[u8]) -> Result<Self::Message, Self::Error>;
}

impl<D: Decoder + ?Sized> Decoder for &D {
    type Message = D::Message;
    type Error = D::Error;

    fn decode(&self, line: &[u8]) -> Result<Self::Message, Self::Error> {
        (**self).decode(line)
    }
}

// ============================================================================
// Name Registry
// ============================================================================

/// Resolves a message type tag to a human readable name
pub trait TypeRegistry {
    /// Returns `None` when the tag is unknown to the registry
    fn display_name(&self, tag: &str) -> Option<&str>;
}

impl<R: TypeRegistry + ?Sized> TypeRegistry for &R {
    fn display_name(&self, tag: &str) -> Option<&str> {
        (**self).display_name(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    struct Tagged(String);

    impl fmt::Display for Tagged {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "<{}>", self.0)
        }
    }

    impl DecodedMessage for Tagged {
        fn type_tag(&self) -> &str {
            &self.0
        }
    }

    impl Decoder for Upper {
        type Message = Tagged;
        type Error = std::str::Utf8Error;

        fn decode(&self, line: &[u8]) -> Result<Tagged, Self::Error> {
            Ok(Tagged(std::str::from_utf8(line)?.to_uppercase()))
        }
    }

    fn decode_with<D: Decoder>(decoder: D, line: &[u8]) -> Result<D::Message, D::Error> {
        decoder.decode(line)
    }

    #[test]
    fn test_decoder_through_reference() {
        let decoder = Upper;
        let msg = decode_with(&decoder, b"abc").unwrap();
        assert_eq!(msg.type_tag(), "ABC");
        assert_eq!(msg.to_string(), "<ABC>");
    }

    #[test]
    fn test_decoder_error_propagates() {
        assert!(decode_with(&Upper, &[0xff, 0xfe]).is_err());
    }
}

use std::sync::Arc;

use chrono::NaiveDateTime;
use thiserror::Error;

use fixprint_types::Decoder;

use crate::dictionary::{Dictionary, FieldLocation, FieldType};
use crate::message::{Field, FixMessage};

const SOH: u8 = 0x01;

/// Delimiter written by loggers that replace SOH with something printable
const PRINTABLE_DELIMITER: u8 = b'|';

const TAG_BEGIN_STRING: u32 = 8;
const TAG_BODY_LENGTH: u32 = 9;
const TAG_MSG_TYPE: u32 = 35;
const TAG_CHECKSUM: u32 = 10;

const UTC_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H:%M:%S%.f";

#[derive(Debug, Error)]
pub enum FixError {
    #[error("field {position} is not in tag=value form")]
    MalformedField { position: usize },

    #[error("invalid tag '{0}'")]
    InvalidTag(String),

    #[error("tag {tag} has an empty value")]
    EmptyValue { tag: u32 },

    #[error("tag {tag} is not valid UTF-8")]
    Encoding { tag: u32 },

    #[error("missing required tag {0}")]
    Missing(u32),

    #[error("expected tag {expected} at field {position}, found tag {found}")]
    OutOfOrder {
        expected: u32,
        found: u32,
        position: usize,
    },

    #[error("{0} field(s) after CheckSum")]
    AfterCheckSum(usize),

    #[error("begin string '{found}' does not match '{expected}'")]
    BeginString { expected: String, found: String },

    #[error("body length {declared} does not match actual length {actual}")]
    BodyLength { declared: usize, actual: usize },

    #[error("checksum '{0}' is not three digits")]
    CheckSumFormat(String),

    #[error("checksum {declared} does not match computed {computed:03}")]
    CheckSum { declared: u8, computed: u8 },

    #[error("unknown message type '{0}'")]
    UnknownMsgType(String),

    #[error("tag {tag} value '{value}' is not a valid {kind:?}")]
    InvalidValue {
        tag: u32,
        value: String,
        kind: FieldType,
    },
}

/// One tag=value pair located in the raw line
struct RawField<'a> {
    tag: u32,
    value: &'a [u8],
    /// Offset of the first tag byte
    start: usize,
    /// Offset of the delimiter that ends the field (or the line length)
    end: usize,
}

/// Decodes FIX tag=value messages against a dictionary
#[derive(Clone, Debug)]
pub struct FixDecoder<'d> {
    dictionary: &'d Dictionary,
    validate_checksum: bool,
}

impl<'d> FixDecoder<'d> {
    pub fn new(dictionary: &'d Dictionary) -> Self {
        Self {
            dictionary,
            validate_checksum: true,
        }
    }

    /// Enable or disable CheckSum (tag 10) validation
    pub fn with_checksum_validation(mut self, enabled: bool) -> Self {
        self.validate_checksum = enabled;
        self
    }

    fn check_framing(&self, line: &[u8], delimiter: u8, fields: &[RawField<'_>]) -> Result<(), FixError> {
        let begin_string = expect_tag(fields, 0, TAG_BEGIN_STRING)?;
        let body_length = expect_tag(fields, 1, TAG_BODY_LENGTH)?;
        expect_tag(fields, 2, TAG_MSG_TYPE)?;

        let checksum_index = fields
            .iter()
            .position(|f| f.tag == TAG_CHECKSUM)
            .ok_or(FixError::Missing(TAG_CHECKSUM))?;
        let trailing = fields.len() - checksum_index - 1;
        if trailing > 0 {
            return Err(FixError::AfterCheckSum(trailing));
        }
        let checksum = &fields[checksum_index];

        let found = String::from_utf8_lossy(begin_string.value);
        if found != self.dictionary.begin_string() {
            return Err(FixError::BeginString {
                expected: self.dictionary.begin_string().to_string(),
                found: found.into_owned(),
            });
        }

        let declared = parse_ascii::<usize>(body_length.value).ok_or_else(|| FixError::InvalidValue {
            tag: TAG_BODY_LENGTH,
            value: String::from_utf8_lossy(body_length.value).into_owned(),
            kind: FieldType::Int,
        })?;
        let actual = checksum.start - (body_length.end + 1);
        if declared != actual {
            return Err(FixError::BodyLength { declared, actual });
        }

        if self.validate_checksum {
            if checksum.value.len() != 3 {
                return Err(FixError::CheckSumFormat(
                    String::from_utf8_lossy(checksum.value).into_owned(),
                ));
            }
            let declared = parse_ascii::<u8>(checksum.value).ok_or_else(|| {
                FixError::CheckSumFormat(String::from_utf8_lossy(checksum.value).into_owned())
            })?;
            let computed = compute_checksum(&line[..checksum.start], delimiter);
            if declared != computed {
                return Err(FixError::CheckSum { declared, computed });
            }
        }

        Ok(())
    }

    fn resolve(&self, raw: &RawField<'_>) -> Result<Field, FixError> {
        let value = std::str::from_utf8(raw.value)
            .map_err(|_| FixError::Encoding { tag: raw.tag })?
            .to_string();

        let Some(def) = self.dictionary.field(raw.tag) else {
            return Ok(Field {
                tag: raw.tag,
                name: None,
                value,
                description: None,
                location: FieldLocation::Body,
            });
        };

        if !is_valid(def.kind, &value) {
            return Err(FixError::InvalidValue {
                tag: raw.tag,
                value,
                kind: def.kind,
            });
        }

        let description = if raw.tag == TAG_MSG_TYPE {
            self.dictionary.message_name(&value).cloned()
        } else {
            def.describe(&value).cloned()
        };

        Ok(Field {
            tag: raw.tag,
            name: Some(Arc::clone(&def.name)),
            value,
            description,
            location: def.location,
        })
    }
}

impl Decoder for FixDecoder<'_> {
    type Message = FixMessage;
    type Error = FixError;

    fn decode(&self, line: &[u8]) -> Result<FixMessage, FixError> {
        let delimiter = detect_delimiter(line);
        let raw_fields = split_fields(line, delimiter)?;
        self.check_framing(line, delimiter, &raw_fields)?;

        let msg_type = String::from_utf8_lossy(raw_fields[2].value).into_owned();
        let name = self
            .dictionary
            .message_name(&msg_type)
            .cloned()
            .ok_or_else(|| FixError::UnknownMsgType(msg_type.clone()))?;

        let fields = raw_fields
            .iter()
            .map(|raw| self.resolve(raw))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::trace!(msg_type = %msg_type, fields = fields.len(), "decoded message");
        Ok(FixMessage::new(msg_type, name, fields))
    }
}

/// SOH when the line contains one, otherwise '|'
fn detect_delimiter(line: &[u8]) -> u8 {
    if line.contains(&SOH) {
        SOH
    } else {
        PRINTABLE_DELIMITER
    }
}

fn split_fields(line: &[u8], delimiter: u8) -> Result<Vec<RawField<'_>>, FixError> {
    let mut fields = Vec::new();
    let mut pos = 0;

    while pos < line.len() {
        let end = line[pos..]
            .iter()
            .position(|&b| b == delimiter)
            .map_or(line.len(), |i| pos + i);
        let piece = &line[pos..end];
        let position = fields.len() + 1;

        let eq = piece
            .iter()
            .position(|&b| b == b'=')
            .ok_or(FixError::MalformedField { position })?;
        let (tag_bytes, value) = (&piece[..eq], &piece[eq + 1..]);

        let tag = parse_ascii::<u32>(tag_bytes)
            .filter(|&tag| tag > 0)
            .ok_or_else(|| FixError::InvalidTag(String::from_utf8_lossy(tag_bytes).into_owned()))?;
        if value.is_empty() {
            return Err(FixError::EmptyValue { tag });
        }

        fields.push(RawField {
            tag,
            value,
            start: pos,
            end,
        });
        pos = end + 1;
    }

    Ok(fields)
}

fn expect_tag<'f, 'a>(
    fields: &'f [RawField<'a>],
    index: usize,
    tag: u32,
) -> Result<&'f RawField<'a>, FixError> {
    match fields.get(index) {
        Some(field) if field.tag == tag => Ok(field),
        Some(field) => Err(FixError::OutOfOrder {
            expected: tag,
            found: field.tag,
            position: index + 1,
        }),
        None => Err(FixError::Missing(tag)),
    }
}

/// Sum of all bytes modulo 256, counting each delimiter as SOH
fn compute_checksum(bytes: &[u8], delimiter: u8) -> u8 {
    bytes
        .iter()
        .map(|&b| if b == delimiter { SOH } else { b })
        .fold(0u8, |sum, b| sum.wrapping_add(b))
}

/// Parse a non-empty run of ASCII digits
fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    if bytes.is_empty() || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn is_valid(kind: FieldType, value: &str) -> bool {
    match kind {
        FieldType::String => true,
        FieldType::Char => value.chars().count() == 1,
        FieldType::Int => value.parse::<i64>().is_ok(),
        FieldType::Float => is_fix_float(value),
        FieldType::Boolean => matches!(value, "Y" | "N"),
        FieldType::UtcTimestamp => NaiveDateTime::parse_from_str(value, UTC_TIMESTAMP_FORMAT).is_ok(),
    }
}

/// FIX floats are plain decimals: optional sign, digits, at most one point, no exponent
fn is_fix_float(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1
}

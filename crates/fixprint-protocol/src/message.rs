use std::fmt;
use std::sync::Arc;

use fixprint_types::DecodedMessage;

use crate::dictionary::FieldLocation;

/// A single decoded tag=value pair
#[derive(Clone, Debug)]
pub struct Field {
    pub tag: u32,

    /// Field name from the dictionary (None for unknown tags)
    pub name: Option<Arc<str>>,

    pub value: String,

    /// Enumerated value description, e.g. "Buy" for Side=1
    pub description: Option<Arc<str>>,

    pub location: FieldLocation,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} ({}): ", name, self.tag)?,
            None => write!(f, "{}: ", self.tag)?,
        }
        match &self.description {
            Some(description) => write!(f, "{} ({})", description, self.value),
            None => f.write_str(&self.value),
        }
    }
}

/// A FIX message decoded from one log line
#[derive(Clone, Debug)]
pub struct FixMessage {
    msg_type: String,
    name: Arc<str>,
    fields: Vec<Field>,
}

impl FixMessage {
    pub(crate) fn new(msg_type: String, name: Arc<str>, fields: Vec<Field>) -> Self {
        Self {
            msg_type,
            name,
            fields,
        }
    }

    /// Value of tag 35
    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    /// Dictionary name of the message type
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All fields in wire order
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// First value of a tag
    pub fn get(&self, tag: u32) -> Option<&str> {
        self.fields
            .iter()
            .find(|field| field.tag == tag)
            .map(|field| field.value.as_str())
    }
}

impl DecodedMessage for FixMessage {
    fn type_tag(&self) -> &str {
        &self.msg_type
    }
}

impl fmt::Display for FixMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (\"{}\")", self.name, self.msg_type)?;

        let sections = [
            ("Header", FieldLocation::Header),
            ("Body", FieldLocation::Body),
            ("Trailer", FieldLocation::Trailer),
        ];

        for (label, location) in sections {
            let mut fields = self
                .fields
                .iter()
                .filter(|field| field.location == location)
                .peekable();
            if fields.peek().is_none() {
                continue;
            }

            write!(f, "\n\t{}", label)?;
            for field in fields {
                write!(f, "\n\t\t{}", field)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: u32, name: Option<&str>, value: &str, location: FieldLocation) -> Field {
        Field {
            tag,
            name: name.map(Arc::from),
            value: value.to_string(),
            description: None,
            location,
        }
    }

    #[test]
    fn test_field_display() {
        let mut side = field(54, Some("Side"), "1", FieldLocation::Body);
        assert_eq!(side.to_string(), "Side (54): 1");

        side.description = Some(Arc::from("Buy"));
        assert_eq!(side.to_string(), "Side (54): Buy (1)");

        let unknown = field(5001, None, "7", FieldLocation::Body);
        assert_eq!(unknown.to_string(), "5001: 7");
    }

    #[test]
    fn test_message_display_groups_sections() {
        let msg = FixMessage::new(
            "0".to_string(),
            Arc::from("Heartbeat"),
            vec![
                field(8, Some("BeginString"), "FIX.4.2", FieldLocation::Header),
                field(112, Some("TestReqID"), "t1", FieldLocation::Body),
                field(10, Some("CheckSum"), "001", FieldLocation::Trailer),
            ],
        );

        assert_eq!(
            msg.to_string(),
            "Heartbeat (\"0\")\n\tHeader\n\t\tBeginString (8): FIX.4.2\n\tBody\n\t\tTestReqID (112): t1\n\tTrailer\n\t\tCheckSum (10): 001"
        );
        assert_eq!(msg.type_tag(), "0");
        assert_eq!(msg.get(112), Some("t1"));
        assert_eq!(msg.get(58), None);
    }

    #[test]
    fn test_message_display_skips_empty_sections() {
        let msg = FixMessage::new(
            "0".to_string(),
            Arc::from("Heartbeat"),
            vec![field(10, Some("CheckSum"), "001", FieldLocation::Trailer)],
        );
        assert_eq!(msg.to_string(), "Heartbeat (\"0\")\n\tTrailer\n\t\tCheckSum (10): 001");
    }
}

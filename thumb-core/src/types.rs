use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of stored content (the hex SHA-1 of its bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentId(pub String);

impl ContentId {
    /// Create from existing string
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ContentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Content identity computed while streaming.
///
/// `hash` is only `None` before ingestion has completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attributes {
    pub hash: Option<String>,
    pub size: u64,
    pub content_type: Option<String>,
}

impl Attributes {
    pub fn new(hash: impl Into<String>, size: u64, content_type: Option<String>) -> Self {
        Self {
            hash: Some(hash.into()),
            size,
            content_type,
        }
    }

    /// The content id, once the hash is known
    pub fn id(&self) -> Option<ContentId> {
        self.hash.as_deref().map(ContentId::from)
    }
}

/// Metadata record for stored content.
///
/// `chunk_size` and `number_of_chunks` describe the storage layout. Content is
/// never split today, so a descriptor built from [`Attributes`] always has a
/// single chunk spanning the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub hash: Option<String>,
    pub size: u64,
    pub content_type: Option<String>,
    pub chunk_size: u64,
    pub number_of_chunks: u64,
}

impl Descriptor {
    pub fn id(&self) -> Option<ContentId> {
        self.hash.as_deref().map(ContentId::from)
    }

    pub fn attributes(&self) -> Attributes {
        Attributes {
            hash: self.hash.clone(),
            size: self.size,
            content_type: self.content_type.clone(),
        }
    }
}

impl From<Attributes> for Descriptor {
    fn from(attributes: Attributes) -> Self {
        Self {
            hash: attributes.hash,
            size: attributes.size,
            content_type: attributes.content_type,
            chunk_size: attributes.size,
            number_of_chunks: 1,
        }
    }
}

/// A descriptor together with the number of owners referencing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorEntry {
    pub descriptor: Descriptor,
    pub refcount: u64,
}

impl DescriptorEntry {
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            refcount: 1,
        }
    }
}

/// Result of releasing one reference to a descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Other owners remain
    Released { remaining: u64 },
    /// The last reference was dropped and the entry removed
    Removed,
    /// No entry existed for the id
    Missing,
}

impl DeleteOutcome {
    /// Numeric form: remaining refcount, `0` when removed, `-1` when missing.
    pub fn refcount(&self) -> i64 {
        match self {
            DeleteOutcome::Released { remaining } => *remaining as i64,
            DeleteOutcome::Removed => 0,
            DeleteOutcome::Missing => -1,
        }
    }

    pub fn is_removed(&self) -> bool {
        matches!(self, DeleteOutcome::Removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_from_attributes_is_single_chunk() {
        let attrs = Attributes::new("abc", 73544, Some("image/jpeg".to_string()));
        let descriptor = Descriptor::from(attrs.clone());

        assert_eq!(descriptor.chunk_size, 73544);
        assert_eq!(descriptor.number_of_chunks, 1);
        assert_eq!(descriptor.attributes(), attrs);
        assert_eq!(descriptor.id(), Some(ContentId::from("abc")));
    }

    #[test]
    fn delete_outcome_numeric_contract() {
        assert_eq!(DeleteOutcome::Released { remaining: 3 }.refcount(), 3);
        assert_eq!(DeleteOutcome::Removed.refcount(), 0);
        assert_eq!(DeleteOutcome::Missing.refcount(), -1);
    }

    #[test]
    fn attributes_serialize_camel_case() {
        let attrs = Attributes::new("abc", 4, Some("text/plain".to_string()));
        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["contentType"], "text/plain");
        assert_eq!(json["size"], 4);
    }
}

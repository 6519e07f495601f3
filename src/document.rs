//! Documents: the unit of ingestion and retrieval.
//!
//! A [`Document`] holds already-decoded strings. [`RawDocument`] is the
//! boundary form used by the api layer, carrying bytes and a wide priority
//! so that malformed input is rejected with `InvalidDocument` rather than at
//! some lower layer.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SatchelError};
use crate::schema::Field;

/// Maximum id length in bytes.
pub const MAX_ID_BYTES: usize = 512;

/// A document of the fixed schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub content: String,
}

impl Document {
    /// Create a document with only an id.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Document {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Start building a document.
    pub fn builder<S: Into<String>>(id: S) -> DocumentBuilder {
        DocumentBuilder::new(id)
    }

    /// The string value of a stored text or keyword field.
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::Id => Some(&self.id),
            Field::Title => Some(&self.title),
            Field::Category => Some(&self.category),
            Field::Summary => Some(&self.summary),
            Field::Content => Some(&self.content),
            Field::Priority => None,
        }
    }

    /// Check the document against the schema.
    pub fn validate(&self) -> Result<()> {
        validate_id(&self.id)
    }

    /// Rough heap footprint, used to enforce the staging memory budget.
    pub fn approximate_size(&self) -> usize {
        std::mem::size_of::<Document>()
            + self.id.len()
            + self.title.len()
            + self.category.len()
            + self.summary.len()
            + self.content.len()
    }
}

fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(SatchelError::invalid_document("id must not be empty"));
    }

    if id.len() > MAX_ID_BYTES {
        return Err(SatchelError::invalid_document(format!(
            "id is {} bytes, limit is {MAX_ID_BYTES}",
            id.len()
        )));
    }

    if id.chars().any(char::is_control) {
        return Err(SatchelError::invalid_document(
            "id must not contain control characters",
        ));
    }

    // Ids are keyword terms; the keyword analyzer trims, so a padded id could
    // never be looked up by its stored value.
    if id.trim() != id {
        return Err(SatchelError::invalid_document(
            "id must not have leading or trailing whitespace",
        ));
    }

    Ok(())
}

/// Builder for [`Document`].
///
/// # Examples
///
/// ```
/// use satchel::document::Document;
///
/// let doc = Document::builder("med-001")
///     .title("Treating burns")
///     .category("medical")
///     .priority(2)
///     .content("Cool the burn under running water.")
///     .build();
///
/// assert_eq!(doc.priority, 2);
/// assert!(doc.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    document: Document,
}

impl DocumentBuilder {
    /// Create a new builder for the given id.
    pub fn new<S: Into<String>>(id: S) -> Self {
        DocumentBuilder {
            document: Document::new(id),
        }
    }

    pub fn title<S: Into<String>>(mut self, title: S) -> Self {
        self.document.title = title.into();
        self
    }

    pub fn category<S: Into<String>>(mut self, category: S) -> Self {
        self.document.category = category.into();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.document.priority = priority;
        self
    }

    pub fn summary<S: Into<String>>(mut self, summary: S) -> Self {
        self.document.summary = summary.into();
        self
    }

    pub fn content<S: Into<String>>(mut self, content: S) -> Self {
        self.document.content = content.into();
        self
    }

    /// Build the document.
    pub fn build(self) -> Document {
        self.document
    }
}

/// A document as it arrives from a foreign caller: unchecked bytes and a
/// priority wider than the schema allows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocument {
    pub id: Vec<u8>,
    pub title: Vec<u8>,
    pub category: Vec<u8>,
    pub priority: u32,
    pub summary: Vec<u8>,
    pub content: Vec<u8>,
}

impl RawDocument {
    /// Decode and validate into a [`Document`].
    pub fn into_document(self) -> Result<Document> {
        let priority = u8::try_from(self.priority).map_err(|_| {
            SatchelError::invalid_document(format!(
                "priority {} is out of range 0..=255",
                self.priority
            ))
        })?;

        let document = Document {
            id: decode_utf8(Field::Id, self.id)?,
            title: decode_utf8(Field::Title, self.title)?,
            category: decode_utf8(Field::Category, self.category)?,
            priority,
            summary: decode_utf8(Field::Summary, self.summary)?,
            content: decode_utf8(Field::Content, self.content)?,
        };
        document.validate()?;

        Ok(document)
    }
}

impl TryFrom<RawDocument> for Document {
    type Error = SatchelError;

    fn try_from(raw: RawDocument) -> Result<Self> {
        raw.into_document()
    }
}

impl From<&Document> for RawDocument {
    fn from(doc: &Document) -> Self {
        RawDocument {
            id: doc.id.as_bytes().to_vec(),
            title: doc.title.as_bytes().to_vec(),
            category: doc.category.as_bytes().to_vec(),
            priority: doc.priority as u32,
            summary: doc.summary.as_bytes().to_vec(),
            content: doc.content.as_bytes().to_vec(),
        }
    }
}

fn decode_utf8(field: Field, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| {
        SatchelError::invalid_document(format!(
            "{field} is not valid UTF-8 (at byte {})",
            e.utf8_error().valid_up_to()
        ))
    })
}

//! Core domain types for citesync records and pipeline results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag added once a record has been through the pipeline; gates re-processing.
pub const PROCESSED_TAG: &str = "zotero:processed";

// ---------------------------------------------------------------------------
// ItemType
// ---------------------------------------------------------------------------

/// Record item type. Only the three web-ish types are listed by the batch run;
/// anything else read from the store is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    Webpage,
    BlogPost,
    ForumPost,
    Other(String),
}

impl ItemType {
    /// The item types the batch run pages through, in listing order.
    pub const LISTED: [ItemType; 3] = [ItemType::Webpage, ItemType::BlogPost, ItemType::ForumPost];

    /// Wire name used by the record store.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Webpage => "webpage",
            Self::BlogPost => "blogPost",
            Self::ForumPost => "forumPost",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "webpage" => Self::Webpage,
            "blogPost" => Self::BlogPost,
            "forumPost" => Self::ForumPost,
            _ => Self::Other(value),
        }
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A single tag on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub tag: String,
    /// 0 = manual, 1 = automatic.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<u8>,
}

impl Tag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            kind: None,
        }
    }
}

/// A record creator. Two-field names use `first_name`/`last_name`; single-field
/// names (organisations) use `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub creator_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Creator {
    /// Build an `author` creator from a split name.
    pub fn author(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            creator_type: "author".into(),
            first_name: Some(first_name.into()),
            last_name: Some(last_name.into()),
            name: None,
        }
    }

    /// Human-readable name for logs and reports.
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        format!("{first} {last}").trim().to_string()
    }
}

/// The editable fields of a record (the store's `data` object).
///
/// Fields the pipeline never touches are kept in `extra` and written back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordData {
    pub item_type: ItemType,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub title: String,
    /// Free text as stored; normalized to `YYYY-MM-DD` when reconciled.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub creators: Vec<Creator>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blog_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forum_title: Option<String>,
    /// Platform marker.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordData {
    /// A bare record of the given type pointing at `url`.
    pub fn new(item_type: ItemType, url: impl Into<String>) -> Self {
        Self {
            item_type,
            url: url.into(),
            title: String::new(),
            date: String::new(),
            creators: Vec::new(),
            tags: Vec::new(),
            blog_title: None,
            forum_title: None,
            website_type: None,
            extra: Map::new(),
        }
    }

    /// Exact, case-sensitive tag lookup.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.tag == tag)
    }

    /// Append `tag` unless an equal tag already exists. Returns whether it was added.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        if self.has_tag(tag) {
            return false;
        }
        self.tags.push(Tag::new(tag));
        true
    }

    /// Drop whichever of `blogTitle`/`forumTitle` the item type does not allow.
    pub fn enforce_title_field(&mut self) {
        match self.item_type {
            ItemType::ForumPost => self.blog_title = None,
            ItemType::BlogPost => self.forum_title = None,
            _ => {}
        }
    }

    /// The publication/forum title, whichever is set.
    pub fn container_title(&self) -> Option<&str> {
        self.forum_title
            .as_deref()
            .or(self.blog_title.as_deref())
            .filter(|t| !t.is_empty())
    }
}

/// A record as held by the store: identity plus editable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    #[serde(default)]
    pub version: u64,
    pub data: RecordData,
}

impl Record {
    pub fn new(key: impl Into<String>, data: RecordData) -> Self {
        Self {
            key: key.into(),
            version: 0,
            data,
        }
    }

    /// First `max` characters of the title, for log lines.
    pub fn title_preview(&self, max: usize) -> String {
        self.data.title.chars().take(max).collect()
    }
}

// ---------------------------------------------------------------------------
// Classification & extraction results
// ---------------------------------------------------------------------------

/// Platforms the pipeline knows how to enrich.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Substack,
    LinkedIn,
}

impl Platform {
    /// Display label, used as the record tag.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Substack => "Substack",
            Self::LinkedIn => "LinkedIn",
        }
    }

    /// Value written to the platform marker field.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Substack => "Substack Newsletter",
            Self::LinkedIn => "LinkedIn",
        }
    }

    /// Reverse of [`Platform::marker`].
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "Substack Newsletter" => Some(Self::Substack),
            "LinkedIn" => Some(Self::LinkedIn),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Short-form content shapes recognisable from a Substack URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSubtype {
    Note,
    Chat,
}

impl ContentSubtype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Chat => "chat",
        }
    }
}

/// Outcome of site classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    pub platform: Option<Platform>,
    pub content_subtype: Option<ContentSubtype>,
}

impl ClassificationResult {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Kind of content the extracted metadata describes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Note,
    Chat,
    Post,
    Comment,
    #[default]
    Unknown,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Chat => "chat",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Unknown => "unknown",
        }
    }
}

/// Metadata derived from a page's target structured-data node.
///
/// Every field is empty when nothing usable was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    pub title: String,
    /// Raw full author string, not split.
    pub author: String,
    /// Raw date string from the source.
    pub date: String,
    pub publisher: String,
    /// The structured-data `@type` observed on the target node, verbatim.
    pub source_type: String,
    pub content_type: ContentType,
}

impl ExtractedMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty()
            && self.author.is_empty()
            && self.date.is_empty()
            && self.publisher.is_empty()
            && self.source_type.is_empty()
    }
}

/// A "topic updated" notification from the streaming endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotification {
    pub topic: String,
    pub version: u64,
}

// ---------------------------------------------------------------------------
// RunStats
// ---------------------------------------------------------------------------

/// Running counters for a batch run or a streaming session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub processed: usize,
    pub urls_cleaned: usize,
    pub substack_found: usize,
    pub linkedin_found: usize,
    pub updated: usize,
    pub errors: usize,
}

impl RunStats {
    /// Count a platform detection.
    pub fn record_detection(&mut self, platform: Platform) {
        match platform {
            Platform::Substack => self.substack_found += 1,
            Platform::LinkedIn => self.linkedin_found += 1,
        }
    }

    pub fn detected(&self, platform: Platform) -> usize {
        match platform {
            Platform::Substack => self.substack_found,
            Platform::LinkedIn => self.linkedin_found,
        }
    }
}

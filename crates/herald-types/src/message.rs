//! Outbound message vocabulary shared by the delivery pipeline and the
//! workflow layer.
//!
//! Adapters consume these types; workflows and the orchestrator produce
//! them. Provider-specific wire shapes never appear here.

use serde::{Deserialize, Serialize};

/// A single selectable option presented to the user (inline button, quick
/// reply, or list row, depending on the channel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageOption {
    /// Text shown to the user.
    pub title: String,
    /// Opaque payload returned when the option is selected.
    pub payload: String,
    /// Optional URL for link-style options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl MessageOption {
    /// Create a plain option with a title and callback payload.
    pub fn new(title: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
            url: None,
        }
    }

    /// Create a link option.
    pub fn link(
        title: impl Into<String>,
        payload: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            payload: payload.into(),
            url: Some(url.into()),
        }
    }
}

/// Reference to a media object hosted outside the pipeline.
///
/// Herald never carries raw media bytes through the delivery path; adapters
/// pass the reference to the provider, which fetches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    /// Publicly resolvable URL or provider media id.
    pub url: String,
    /// Optional filename hint for document sends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl MediaRef {
    /// Create a media reference from a URL or provider id.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            filename: None,
        }
    }

    /// Attach a filename hint.
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// An outbound payload, dispatched to the adapter method matching its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundPayload {
    /// Plain text message.
    Text { text: String },
    /// Text with an ordered list of selectable options.
    Options {
        text: String,
        options: Vec<MessageOption>,
    },
    /// Image with an optional caption.
    Image {
        image: MediaRef,
        caption: Option<String>,
    },
    /// Document with an optional caption.
    Document {
        document: MediaRef,
        caption: Option<String>,
    },
}

impl OutboundPayload {
    /// Create a plain text payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an options payload.
    pub fn options(text: impl Into<String>, options: Vec<MessageOption>) -> Self {
        Self::Options {
            text: text.into(),
            options,
        }
    }

    /// The user-visible text of this payload, if any.
    pub fn text_content(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::Options { text, .. } => Some(text),
            Self::Image { caption, .. } | Self::Document { caption, .. } => caption.as_deref(),
        }
    }

    /// Whether this payload carries media.
    pub fn is_media(&self) -> bool {
        matches!(self, Self::Image { .. } | Self::Document { .. })
    }
}

/// Profile data fetched from a channel for a recipient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileData {
    /// Display name, when the provider exposes one.
    pub name: Option<String>,
    /// BCP-47 locale tag, when the provider exposes one.
    pub locale: Option<String>,
    /// Raw provider metadata, passed through untouched.
    #[serde(default)]
    pub raw: serde_json::Value,
}

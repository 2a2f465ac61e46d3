//! Tag detection and extraction over complete model responses.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::error::Result;

/// The five tag names the protocol recognizes. Anything else is plain text.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TagName {
    /// Model asks for a capability, described in prose.
    ToolAssistant,
    /// Host describes the tool it resolved for a capability request.
    ToolResponse,
    /// Model invokes a concrete tool.
    FunctionCall,
    /// Host reports the outcome of a function call.
    FunctionCallResponse,
    /// Model's terminal answer.
    FinalResponse,
}

impl TagName {
    pub fn open(self) -> String {
        format!("<{}>", self.as_ref())
    }

    pub fn close(self) -> String {
        format!("</{}>", self.as_ref())
    }
}

/// Outcome of looking for a tag. Callers must handle all three cases: a
/// present-but-undecodable tag is a protocol violation, not an absence.
#[derive(Debug, Clone, PartialEq)]
pub enum TagMatch<T> {
    Absent,
    Present(T),
    Malformed { raw: String, error: String },
}

impl<T> TagMatch<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, Self::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The decoded value, discarding the absent/malformed distinction.
    pub fn present(self) -> Option<T> {
        match self {
            Self::Present(value) => Some(value),
            _ => None,
        }
    }
}

/// Text between the first `<tag>` and the first `</tag>` after it.
///
/// A second opening tag used as a closer does not count as a close.
fn inner_text(text: &str, tag: TagName) -> Option<&str> {
    let open = tag.open();
    let close = tag.close();
    let start = text.find(&open)? + open.len();
    let len = text[start..].find(&close)?;
    Some(&text[start..start + len])
}

/// Whether `text` contains an opening and a subsequent closing `tag`.
pub fn has_tag(text: &str, tag: TagName) -> bool {
    inner_text(text, tag).is_some()
}

/// Extract and JSON-decode the payload of `tag` into `T`.
///
/// Empty (whitespace-only) content counts as absent. Valid JSON of the wrong
/// shape is malformed.
pub fn decode<T: DeserializeOwned>(text: &str, tag: TagName) -> TagMatch<T> {
    let Some(inner) = inner_text(text, tag) else {
        return TagMatch::Absent;
    };
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return TagMatch::Absent;
    }
    match serde_json::from_str::<T>(trimmed) {
        Ok(value) => TagMatch::Present(value),
        Err(e) => TagMatch::Malformed {
            raw: trimmed.to_string(),
            error: e.to_string(),
        },
    }
}

/// Extract the payload of `tag` as an untyped JSON value.
pub fn extract(text: &str, tag: TagName) -> TagMatch<serde_json::Value> {
    decode(text, tag)
}

/// Serialize `payload` into the tag wire format.
pub fn render<T: Serialize>(tag: TagName, payload: &T) -> Result<String> {
    let json = serde_json::to_string(payload)?;
    Ok(format!("{}{}{}", tag.open(), json, tag.close()))
}

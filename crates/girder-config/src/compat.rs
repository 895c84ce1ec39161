//! Protocol compatibility knobs.
//!
//! The base protocol leaves two details open to interpretation: whether
//! the `Content-Length` header is matched case-sensitively, and which unit
//! a `Position.character` counts. Both are explicit configuration here so
//! a deployment can pick the semantics its editor expects instead of
//! inheriting a silent default.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the framer matches the `Content-Length` header.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HeaderCompat {
    /// Match `Content-Length: ` literally, including case and the
    /// trailing space.
    #[default]
    Strict,
    /// Accept any ASCII casing of the header name.
    CaseInsensitive,
}

/// Unit in which `Position.character` columns are counted.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PositionEncoding {
    /// Columns are byte offsets into the UTF-8 line.
    #[default]
    #[serde(rename = "utf8")]
    #[strum(serialize = "utf8")]
    Utf8ByteOffset,
    /// Columns are UTF-16 code units, the protocol's default encoding.
    #[serde(rename = "utf16")]
    #[strum(serialize = "utf16")]
    Utf16CodeUnit,
}

//! Log output selection.
//!
//! All telemetry goes to stderr because stdout carries protocol
//! frames. This enumeration picks the layout of those stderr lines:
//! compact single-line events for a human watching the server, or one
//! JSON object per event for log collectors. Parsing is ASCII
//! case-insensitive so `GIRDER_LOG_FORMAT=JSON` works as well as
//! `json`.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Layout used for telemetry lines on stderr.
#[derive(
    Clone, Copy, Debug, Default, Display, EnumString, Eq, PartialEq, Deserialize, Serialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Single-line human-readable events.
    #[default]
    Compact,
    /// One JSON object per event, for ingestion by logging stacks.
    Json,
}

impl LogFormat {
    /// Whether events should be rendered as JSON objects.
    #[must_use]
    pub fn is_json(self) -> bool {
        matches!(self, Self::Json)
    }
}

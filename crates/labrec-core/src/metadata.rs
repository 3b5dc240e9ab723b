//! Experiment artifacts: metadata.json, the STATUS file, timestamps
//!
//! Every file name and wire format written into an experiment directory
//! is defined here.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::Result;

pub const METADATA_FILE: &str = "metadata.json";
pub const ARGS_FILE: &str = "args.json";
pub const DEFAULT_ARGS_FILE: &str = "default_args.json";
pub const STATUS_FILE: &str = "STATUS";
pub const STDOUT_FILE: &str = "stdout";
pub const STDERR_FILE: &str = "stderr";
pub const SUMMARY_FILE: &str = "summary.json";

/// Timestamp format used in metadata.json: ISO-8601 with microseconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// First line of the traceback block an ERROR status may carry.
pub const TRACEBACK_HEADER: &str = "Traceback (most recent call last):";

/// Contents of `metadata.json`.
///
/// `end-time` is absent while the experiment is RUNNING.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "githead-sha")]
    pub githead_sha: String,
    #[serde(rename = "githead-message")]
    pub githead_message: String,
    #[serde(rename = "start-time", with = "timestamp")]
    pub start_time: NaiveDateTime,
    #[serde(
        rename = "end-time",
        with = "timestamp_opt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub end_time: Option<NaiveDateTime>,
    pub description: String,
    pub command: String,
}

impl Metadata {
    pub fn load(dir: &Path) -> Result<Self> {
        let content = fs::read_to_string(dir.join(METADATA_FILE))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(dir.join(METADATA_FILE), content)?;
        Ok(())
    }

    /// The current wall-clock time, at the precision metadata records.
    pub fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}

/// Terminal disposition recorded in the STATUS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Running,
    Success,
    /// Optionally carries a traceback block whose first line is
    /// [`TRACEBACK_HEADER`].
    Error(Option<String>),
}

impl Status {
    pub fn first_line(&self) -> &'static str {
        match self {
            Status::Running => "RUNNING",
            Status::Success => "SUCCESS",
            Status::Error(_) => "ERROR",
        }
    }

    /// Render the STATUS file contents.
    pub fn render(&self) -> String {
        match self {
            Status::Error(Some(trace)) => {
                format!("ERROR\n{}\n", trace.trim_end_matches('\n'))
            }
            other => format!("{}\n", other.first_line()),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::write(dir.join(STATUS_FILE), self.render())?;
        Ok(())
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.first_line())
    }
}

mod timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

mod timestamp_opt {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dt: &Option<NaiveDateTime>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        match dt {
            Some(dt) => s.serialize_str(&dt.format(TIMESTAMP_FORMAT).to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(s) => NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}

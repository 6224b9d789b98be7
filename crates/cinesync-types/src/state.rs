//! Keys and status values persisted by the ETL state store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// State key holding the [`EtlStatus`] of the write path.
pub const ETL_PROCESS_KEY: &str = "etl_process";

// ---------------------------------------------------------------------------
// Watermarks
// ---------------------------------------------------------------------------

/// Identifies one persisted watermark.
///
/// The films sub-pipeline owns three keys: its own table plus the genre and
/// person tables it fans out from. The person and genre index sub-pipelines
/// each own a separate key so that committing one never moves the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkKey {
    Filmwork,
    Genre,
    Person,
    PersonIndex,
    GenreIndex,
}

impl WatermarkKey {
    pub const ALL: [WatermarkKey; 5] = [
        Self::Filmwork,
        Self::Genre,
        Self::Person,
        Self::PersonIndex,
        Self::GenreIndex,
    ];

    /// Storage key string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filmwork => "filmwork",
            Self::Genre => "genre",
            Self::Person => "person",
            Self::PersonIndex => "person_index",
            Self::GenreIndex => "genre_index",
        }
    }
}

impl fmt::Display for WatermarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Process status
// ---------------------------------------------------------------------------

/// Lifecycle status of the ETL process as recorded in the state store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EtlStatus {
    Started,
    Stopped,
}

impl EtlStatus {
    /// Wire-format string for storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for EtlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EtlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "started" => Ok(Self::Started),
            "stopped" => Ok(Self::Stopped),
            other => Err(format!("unknown etl status '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermark_keys_are_distinct() {
        let names: std::collections::HashSet<_> =
            WatermarkKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names.len(), WatermarkKey::ALL.len());
    }

    #[test]
    fn watermark_key_serde_matches_as_str() {
        for key in WatermarkKey::ALL {
            let json = serde_json::to_string(&key).unwrap();
            assert_eq!(json, format!("\"{}\"", key.as_str()));
        }
    }

    #[test]
    fn etl_status_parse_roundtrip() {
        for status in [EtlStatus::Started, EtlStatus::Stopped] {
            assert_eq!(status.as_str().parse::<EtlStatus>().unwrap(), status);
        }
        assert!("paused".parse::<EtlStatus>().is_err());
    }
}

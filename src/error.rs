//! Error taxonomy shared by every creation-side operation.

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum DraftError {
    /// Malformed interval or duration string.
    #[error("format error: {0}")]
    Format(String),

    /// Unknown draft, track, segment or catalog entry.
    #[error("not found: {0}")]
    NotFound(String),

    /// Segment kind does not match the kind of the target track.
    #[error("track '{track}' is a {actual} track, cannot hold {expected} segments")]
    TypeMismatch {
        track: String,
        expected: String,
        actual: String,
    },

    /// Candidate placement intersects a committed placement on the same track.
    #[error("segment {candidate} overlaps existing segment {existing} on track '{track}'")]
    Overlap {
        track: String,
        candidate: String,
        existing: String,
    },

    /// Parameter outside its declared bounds.
    #[error("out of range: {0}")]
    Range(String),

    /// Requested on-track time exceeds what the localized source provides.
    #[error("requested {requested} on track but material only provides {available}")]
    Duration { requested: String, available: String },

    /// Track naming rule violated (missing or duplicate name).
    #[error("track name conflict: {0}")]
    NameConflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    #[error("download error: {0}")]
    Http(#[from] reqwest::Error),
}

impl DraftError {
    /// Short category label used in tool responses.
    pub(crate) fn category(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::NotFound(_) => "not_found",
            Self::TypeMismatch { .. } => "type_mismatch",
            Self::Overlap { .. } => "overlap",
            Self::Range(_) => "range",
            Self::Duration { .. } => "duration",
            Self::NameConflict(_) => "name_conflict",
            Self::Io(_) | Self::Http(_) => "io",
            Self::Json(_) => "json",
            Self::Index(_) => "index",
        }
    }
}

pub(crate) type DraftResult<T> = Result<T, DraftError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = DraftError::TypeMismatch {
            track: "bgm".into(),
            expected: "video".into(),
            actual: "audio".into(),
        };
        assert_eq!(
            err.to_string(),
            "track 'bgm' is a audio track, cannot hold video segments"
        );

        let err = DraftError::Overlap {
            track: "main".into(),
            candidate: "4s-6s".into(),
            existing: "0s-5s".into(),
        };
        assert!(err.to_string().contains("4s-6s"));
        assert!(err.to_string().contains("main"));
    }

    #[test]
    fn test_category() {
        assert_eq!(DraftError::Format("x".into()).category(), "format");
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        assert_eq!(DraftError::from(io).category(), "io");
    }
}

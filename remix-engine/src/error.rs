//! Remix failure kinds, tagged with the source and stage that failed

use remix_codec::{DecodeError, EncodeError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which input of the request a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceRole {
    /// Clip at this position in playback order (0-indexed)
    Clip(usize),
    /// The optional background music track
    Background,
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceRole::Clip(index) => write!(f, "clip #{}", index + 1),
            SourceRole::Background => f.write_str("background music"),
        }
    }
}

/// Per-clip processing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformStage {
    Speed,
    /// Sample rate / channel normalization to the timeline format
    Conform,
}

impl fmt::Display for TransformStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransformStage::Speed => "change speed of",
            TransformStage::Conform => "conform",
        })
    }
}

/// Errors surfaced by [`crate::Remixer::remix`]
#[derive(Error, Debug)]
pub enum RemixError {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("File not found for {role}: {reference}")]
    NotFound { role: SourceRole, reference: String },
    #[error("Failed to decode {role} ({reference}): {source}")]
    Decode {
        role: SourceRole,
        reference: String,
        #[source]
        source: DecodeError,
    },
    #[error("Failed to {stage} {role} ({reference}): {source}")]
    Transform {
        role: SourceRole,
        reference: String,
        stage: TransformStage,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Composition failed: {0}")]
    Composition(String),
    #[error("Failed to encode mix: {0}")]
    Encode(#[from] EncodeError),
    #[error("Remix exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// Coarse classification for callers that only need to branch on the kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Decode,
    Transform,
    Composition,
    Encode,
    Timeout,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Decode => "decode_error",
            ErrorKind::Transform => "transform_error",
            ErrorKind::Composition => "composition_error",
            ErrorKind::Encode => "encode_error",
            ErrorKind::Timeout => "timeout",
        }
    }

    /// Conventional HTTP status for this kind
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation => 400,
            ErrorKind::NotFound => 404,
            _ => 500,
        }
    }
}

impl RemixError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RemixError::Validation(_) => ErrorKind::Validation,
            RemixError::NotFound { .. } => ErrorKind::NotFound,
            RemixError::Decode { .. } => ErrorKind::Decode,
            RemixError::Transform { .. } => ErrorKind::Transform,
            RemixError::Composition(_) => ErrorKind::Composition,
            RemixError::Encode(_) => ErrorKind::Encode,
            RemixError::DeadlineExceeded(_) => ErrorKind::Timeout,
        }
    }

    /// Reference of the input that failed, if the failure is tied to one
    pub fn reference(&self) -> Option<&str> {
        match self {
            RemixError::NotFound { reference, .. }
            | RemixError::Decode { reference, .. }
            | RemixError::Transform { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// Message safe to hand back across the service boundary.
    ///
    /// Caller mistakes are reported verbatim; internal failures only by kind.
    pub fn public_message(&self) -> String {
        match self {
            RemixError::Validation(_) => self.to_string(),
            RemixError::NotFound {
                role: SourceRole::Background,
                reference,
            } => format!("Background file not found: {}", reference),
            RemixError::NotFound { reference, .. } => format!("File not found: {}", reference),
            RemixError::Decode { role, .. } => format!("Could not read audio for {}", role),
            RemixError::Transform { role, .. } => format!("Could not edit {}", role),
            RemixError::Composition(_) => "Could not assemble the remix".to_string(),
            RemixError::Encode(_) => "Could not export the remix".to_string(),
            RemixError::DeadlineExceeded(_) => "Remix took too long".to_string(),
        }
    }

    pub(crate) fn transform(
        role: SourceRole,
        reference: &str,
        stage: TransformStage,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        RemixError::Transform {
            role,
            reference: reference.to_string(),
            stage,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_status() {
        let err = RemixError::Validation("No clips provided".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.kind().status_code(), 400);

        let err = RemixError::NotFound {
            role: SourceRole::Clip(0),
            reference: "/uploads/a.wav".into(),
        };
        assert_eq!(err.kind().status_code(), 404);
        assert_eq!(err.reference(), Some("/uploads/a.wav"));
        assert_eq!(err.public_message(), "File not found: /uploads/a.wav");

        let err = RemixError::Composition("empty".into());
        assert_eq!(err.kind().status_code(), 500);
        assert_eq!(err.kind().as_str(), "composition_error");
        assert!(err.reference().is_none());
    }

    #[test]
    fn test_background_not_found_message() {
        let err = RemixError::NotFound {
            role: SourceRole::Background,
            reference: "/uploads/bg.mp3".into(),
        };
        assert_eq!(err.public_message(), "Background file not found: /uploads/bg.mp3");
        assert!(err.to_string().contains("background music"));
    }

    #[test]
    fn test_internal_details_stay_internal() {
        let err = RemixError::Decode {
            role: SourceRole::Clip(2),
            reference: "/uploads/c.ogg".into(),
            source: DecodeError::Decode("bad huffman table".into()),
        };
        assert!(err.to_string().contains("bad huffman table"));
        assert!(!err.public_message().contains("huffman"));
        assert_eq!(err.public_message(), "Could not read audio for clip #3");
    }
}

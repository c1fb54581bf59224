//! Remix request model and its JSON wire format
//!
//! ```json
//! {
//!   "clips": [{"url": "/uploads/a.mp3", "trimStart": 1.5, "trimEnd": 4, "speed": 2}],
//!   "backgroundMusic": "/uploads/bed.mp3"
//! }
//! ```
//!
//! The older `{"urls": [...]}` shape is still accepted; each url becomes a
//! clip with no edits.

use crate::error::RemixError;
use serde::{Deserialize, Serialize};

/// One clip as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipWire {
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Request body as it appears on the wire
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemixRequestWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clips: Option<Vec<ClipWire>>,
    /// Legacy form: plain references, no edits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_music: Option<String>,
}

/// Slowest accepted playback rate
pub const MIN_SPEED: f64 = 0.01;

/// Edits applied to a single clip
#[derive(Debug, Clone, PartialEq)]
pub struct ClipEdit {
    /// Reference resolvable to encoded audio bytes
    pub source: String,
    /// Seconds to skip from the start
    pub trim_start_secs: f64,
    /// Where to stop, in seconds; `None` keeps the rest of the clip
    pub trim_end_secs: Option<f64>,
    /// Playback rate multiplier (>1 faster, <1 slower)
    pub speed: f64,
}

impl ClipEdit {
    /// Clip played in full at normal speed
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            trim_start_secs: 0.0,
            trim_end_secs: None,
            speed: 1.0,
        }
    }

    pub fn with_trim(mut self, start_secs: f64, end_secs: Option<f64>) -> Self {
        self.trim_start_secs = start_secs;
        self.trim_end_secs = end_secs;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    fn validate(&self, index: usize) -> Result<(), RemixError> {
        let clip = index + 1;
        if self.source.trim().is_empty() {
            return Err(RemixError::Validation(format!(
                "clip #{} has no source url",
                clip
            )));
        }
        if !self.trim_start_secs.is_finite() || self.trim_start_secs < 0.0 {
            return Err(RemixError::Validation(format!(
                "clip #{} has invalid trimStart {}",
                clip, self.trim_start_secs
            )));
        }
        if let Some(end) = self.trim_end_secs {
            if !end.is_finite() || end < 0.0 {
                return Err(RemixError::Validation(format!(
                    "clip #{} has invalid trimEnd {}",
                    clip, end
                )));
            }
        }
        if !self.speed.is_finite() || self.speed < MIN_SPEED {
            return Err(RemixError::Validation(format!(
                "clip #{} has invalid speed {} (minimum {})",
                clip, self.speed, MIN_SPEED
            )));
        }
        Ok(())
    }
}

impl From<ClipWire> for ClipEdit {
    fn from(wire: ClipWire) -> Self {
        Self {
            source: wire.url,
            trim_start_secs: wire.trim_start.unwrap_or(0.0),
            trim_end_secs: wire.trim_end,
            speed: wire.speed.unwrap_or(1.0),
        }
    }
}

/// Ordered clips (playback order) plus an optional background track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemixRequest {
    pub clips: Vec<ClipEdit>,
    pub background: Option<String>,
}

impl RemixRequest {
    pub fn new(clips: Vec<ClipEdit>, background: Option<String>) -> Self {
        Self { clips, background }
    }

    /// Parse the JSON wire format. Shape is checked later by [`RemixRequest::validate`].
    pub fn from_json(body: &str) -> Result<Self, RemixError> {
        let wire: RemixRequestWire = serde_json::from_str(body)
            .map_err(|e| RemixError::Validation(format!("malformed request body: {}", e)))?;
        Ok(Self::from(wire))
    }

    /// Check that the request can be processed at all
    pub fn validate(&self) -> Result<(), RemixError> {
        if self.clips.is_empty() {
            return Err(RemixError::Validation("No file URLs provided".into()));
        }
        for (index, clip) in self.clips.iter().enumerate() {
            clip.validate(index)?;
        }
        if let Some(background) = &self.background {
            if background.trim().is_empty() {
                return Err(RemixError::Validation(
                    "background music reference is empty".into(),
                ));
            }
        }
        Ok(())
    }
}

impl From<RemixRequestWire> for RemixRequest {
    fn from(wire: RemixRequestWire) -> Self {
        let clips = match (wire.clips, wire.urls) {
            (Some(clips), _) => clips.into_iter().map(ClipEdit::from).collect(),
            (None, Some(urls)) => urls.into_iter().map(ClipEdit::new).collect(),
            (None, None) => Vec::new(),
        };

        // An empty string means "no background", as the upload form sends it
        let background = wire.background_music.filter(|bg| !bg.trim().is_empty());

        Self { clips, background }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_request() {
        let body = r#"{
            "clips": [
                {"url": "/uploads/a.mp3", "trimStart": 1.5, "trimEnd": 4, "speed": 2},
                {"url": "/uploads/b.wav"}
            ],
            "backgroundMusic": "/uploads/bed.mp3"
        }"#;
        let request = RemixRequest::from_json(body).unwrap();
        assert_eq!(request.clips.len(), 2);
        assert_eq!(
            request.clips[0],
            ClipEdit::new("/uploads/a.mp3")
                .with_trim(1.5, Some(4.0))
                .with_speed(2.0)
        );
        assert_eq!(request.clips[1], ClipEdit::new("/uploads/b.wav"));
        assert_eq!(request.background.as_deref(), Some("/uploads/bed.mp3"));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_parse_legacy_urls() {
        let body = r#"{"urls": ["/uploads/a.mp3", "/uploads/b.mp3"]}"#;
        let request = RemixRequest::from_json(body).unwrap();
        assert_eq!(
            request.clips,
            vec![ClipEdit::new("/uploads/a.mp3"), ClipEdit::new("/uploads/b.mp3")]
        );
        assert!(request.background.is_none());
    }

    #[test]
    fn test_clips_win_over_urls() {
        let body = r#"{"clips": [{"url": "/uploads/x.wav"}], "urls": ["/uploads/y.wav"]}"#;
        let request = RemixRequest::from_json(body).unwrap();
        assert_eq!(request.clips, vec![ClipEdit::new("/uploads/x.wav")]);
    }

    #[test]
    fn test_empty_background_is_absent() {
        let body = r#"{"clips": [{"url": "/uploads/x.wav"}], "backgroundMusic": ""}"#;
        let request = RemixRequest::from_json(body).unwrap();
        assert!(request.background.is_none());
    }

    #[test]
    fn test_empty_clip_list_is_invalid() {
        let request = RemixRequest::from_json(r#"{"clips": []}"#).unwrap();
        assert!(matches!(request.validate(), Err(RemixError::Validation(_))));

        let request = RemixRequest::from_json("{}").unwrap();
        assert!(matches!(request.validate(), Err(RemixError::Validation(_))));
    }

    #[test]
    fn test_malformed_body() {
        assert!(matches!(
            RemixRequest::from_json("not json"),
            Err(RemixError::Validation(_))
        ));
        assert!(matches!(
            RemixRequest::from_json(r#"{"clips": [{"url": 5}]}"#),
            Err(RemixError::Validation(_))
        ));
    }

    #[test]
    fn test_descriptor_validation() {
        let bad = [
            ClipEdit::new(""),
            ClipEdit::new("/uploads/a.wav").with_speed(0.0),
            ClipEdit::new("/uploads/a.wav").with_speed(-1.0),
            ClipEdit::new("/uploads/a.wav").with_speed(f64::NAN),
            ClipEdit::new("/uploads/a.wav").with_trim(-1.0, None),
            ClipEdit::new("/uploads/a.wav").with_trim(0.0, Some(f64::INFINITY)),
        ];
        for clip in bad {
            let request = RemixRequest::new(vec![clip.clone()], None);
            assert!(
                matches!(request.validate(), Err(RemixError::Validation(_))),
                "{:?} should be rejected",
                clip
            );
        }
    }

    #[test]
    fn test_speed_floor() {
        let slow = |speed| {
            RemixRequest::new(vec![ClipEdit::new("/uploads/a.wav").with_speed(speed)], None)
        };
        assert!(matches!(slow(1e-6).validate(), Err(RemixError::Validation(_))));
        assert!(matches!(slow(0.009).validate(), Err(RemixError::Validation(_))));
        assert!(slow(MIN_SPEED).validate().is_ok());
        assert!(slow(0.5).validate().is_ok());
    }

    #[test]
    fn test_inverted_trim_is_allowed() {
        let clip = ClipEdit::new("/uploads/a.wav").with_trim(5.0, Some(1.0));
        assert!(RemixRequest::new(vec![clip], None).validate().is_ok());
    }

    #[test]
    fn test_wire_serialization_skips_defaults() {
        let wire = RemixRequestWire {
            clips: Some(vec![ClipWire {
                url: "/uploads/a.wav".into(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let json = serde_json::to_string(&wire).unwrap();
        assert_eq!(json, r#"{"clips":[{"url":"/uploads/a.wav"}]}"#);
    }
}

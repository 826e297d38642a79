//! Voice parameters and per-transport normalization
//!
//! Callers hand the orchestrator generic voice parameters; the effective
//! values sent to the synthesis engine depend on the transport. Telephony
//! engines take numeric percentage rate strings, interactive sessions keep
//! the generic keyword.

use serde::{Deserialize, Serialize};

/// Generic speaking rate keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SpeechRate {
    XSlow,
    Slow,
    #[default]
    Medium,
    Fast,
    XFast,
}

impl SpeechRate {
    /// Parse a keyword, defaulting to Medium for unknown values
    pub fn parse(s: &str) -> Self {
        match s {
            "x-slow" => Self::XSlow,
            "slow" => Self::Slow,
            "fast" => Self::Fast,
            "x-fast" => Self::XFast,
            _ => Self::Medium,
        }
    }

    /// Generic keyword form
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::XSlow => "x-slow",
            Self::Slow => "slow",
            Self::Medium => "medium",
            Self::Fast => "fast",
            Self::XFast => "x-fast",
        }
    }

    /// Telephony engines take a signed percentage relative to the default rate
    pub fn telephony_percent(&self) -> &'static str {
        match self {
            Self::XSlow => "-40%",
            Self::Slow => "-20%",
            Self::Medium => "+0%",
            Self::Fast => "+20%",
            Self::XFast => "+40%",
        }
    }
}

/// Voice parameters for one playback request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceParams {
    /// Engine voice name
    pub voice: String,
    /// Speaking style (engine-specific)
    pub style: Option<String>,
    /// Speaking rate: a generic keyword ("medium") or an engine-native
    /// value ("+20%")
    pub rate: Option<String>,
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            voice: "en-IN-NeerjaNeural".to_string(),
            style: None,
            rate: Some("medium".to_string()),
        }
    }
}

impl VoiceParams {
    pub fn new(voice: impl Into<String>) -> Self {
        Self {
            voice: voice.into(),
            style: None,
            rate: None,
        }
    }

    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    /// Map a generic keyword rate to the telephony percentage form
    ///
    /// Engine-native values (anything already containing '%') pass through
    /// unchanged.
    pub fn normalized_for_telephony(&self) -> Self {
        let rate = self.rate.as_deref().map(|r| {
            if r.contains('%') {
                r.to_string()
            } else {
                SpeechRate::parse(r).telephony_percent().to_string()
            }
        });

        Self {
            voice: self.voice.clone(),
            style: self.style.clone(),
            rate,
        }
    }

    /// Strip style and rate overrides, keeping only the voice name
    ///
    /// Used for the synthesis retry path: some engines reject a styled
    /// request that succeeds unstyled.
    pub fn without_overrides(&self) -> Self {
        Self {
            voice: self.voice.clone(),
            style: None,
            rate: None,
        }
    }

    /// Warm-up signature covering everything the engine caches per voice
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.voice,
            self.style.as_deref().unwrap_or(""),
            self.rate.as_deref().unwrap_or("")
        )
    }
}

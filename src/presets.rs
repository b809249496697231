//! Named request presets. Applying one only touches format and frame rate.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::{JobRequest, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preset {
    #[default]
    #[serde(rename = "Custom")]
    Custom,
    #[serde(rename = "MP4 60fps")]
    Mp4At60,
    #[serde(rename = "MP4 30fps")]
    Mp4At30,
    #[serde(rename = "WebM 30fps")]
    WebmAt30,
    #[serde(rename = "GIF 10fps")]
    GifAt10,
}

impl Preset {
    pub fn label(self) -> &'static str {
        match self {
            Preset::Custom => "Custom",
            Preset::Mp4At60 => "MP4 60fps",
            Preset::Mp4At30 => "MP4 30fps",
            Preset::WebmAt30 => "WebM 30fps",
            Preset::GifAt10 => "GIF 10fps",
        }
    }

    /// Format and target FPS, or None for `Custom`.
    fn settings(self) -> Option<(OutputFormat, &'static str)> {
        match self {
            Preset::Custom => None,
            Preset::Mp4At60 => Some((OutputFormat::Mp4, "60")),
            Preset::Mp4At30 => Some((OutputFormat::Mp4, "30")),
            Preset::WebmAt30 => Some((OutputFormat::Webm, "30")),
            Preset::GifAt10 => Some((OutputFormat::Gif, "10")),
        }
    }

    pub fn apply(self, request: &mut JobRequest) {
        let Some((format, fps)) = self.settings() else {
            return;
        };
        request.format = format;
        request.fps_enabled = true;
        request.target_fps = Some(fps.to_string());
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

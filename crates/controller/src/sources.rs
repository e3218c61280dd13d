// Built-in demo video sources

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceFormat {
    /// Adaptive HLS manifest
    Hls,
    /// Progressive MP4 download
    Mp4,
}

/// A stream the player can be pointed at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSource {
    pub url: &'static str,
    pub title: &'static str,
    pub quality: &'static str,
    pub description: Option<&'static str>,
    pub format: SourceFormat,
}

impl VideoSource {
    /// Title shown above the player, e.g. "Mux Test Stream - Chile"
    pub fn title_for(&self, context: &str) -> String {
        if context.is_empty() {
            self.title.to_string()
        } else {
            format!("{} - {}", self.title, context)
        }
    }
}

pub const HLS_SOURCES: [VideoSource; 3] = [
    VideoSource {
        url: "https://test-streams.mux.dev/x36xhzz/x36xhzz.m3u8",
        title: "Mux Test Stream",
        quality: "HD 1080p",
        description: Some("High quality adaptive HLS stream from Mux"),
        format: SourceFormat::Hls,
    },
    VideoSource {
        url: "https://demo.unified-streaming.com/k8s/features/stable/video/tears-of-steel/tears-of-steel.ism/.m3u8",
        title: "Tears of Steel",
        quality: "HD 720p",
        description: Some("Open source film demo stream"),
        format: SourceFormat::Hls,
    },
    VideoSource {
        url: "https://multiplatform-f.akamaihd.net/i/multi/will/bunny/big_buck_bunny_,640x360_400,640x360_700,640x360_1000,950x540_1500,.f4v.csmil/master.m3u8",
        title: "Big Buck Bunny",
        quality: "Multi-quality",
        description: Some("Adaptive bitrate HLS stream"),
        format: SourceFormat::Hls,
    },
];

/// Progressive sources for engines that cannot play the HLS ones
pub const FALLBACK_SOURCES: [VideoSource; 2] = [
    VideoSource {
        url: "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4",
        title: "Big Buck Bunny (MP4)",
        quality: "HD 720p",
        description: Some("Standard MP4 video for compatibility"),
        format: SourceFormat::Mp4,
    },
    VideoSource {
        url: "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ElephantsDream.mp4",
        title: "Elephants Dream (MP4)",
        quality: "HD 720p",
        description: Some("Open source film in MP4 format"),
        format: SourceFormat::Mp4,
    },
];

pub fn primary_source() -> &'static VideoSource {
    &HLS_SOURCES[0]
}

pub fn all_sources() -> impl Iterator<Item = &'static VideoSource> {
    HLS_SOURCES.iter().chain(FALLBACK_SOURCES.iter())
}

/// First HLS source matching the preferred quality, else the primary one
pub fn source_by_quality(prefer_hd: bool) -> &'static VideoSource {
    let wanted = if prefer_hd { "1080p" } else { "720p" };
    HLS_SOURCES
        .iter()
        .find(|source| source.quality.contains(wanted))
        .unwrap_or_else(primary_source)
}

/// Next source to try after `uri` failed.
///
/// Any HLS or unknown source falls back to the first MP4; each MP4 falls
/// back to the next one. `None` once the fallbacks are exhausted.
pub fn fallback_for(uri: &str) -> Option<&'static VideoSource> {
    match FALLBACK_SOURCES.iter().position(|source| source.url == uri) {
        Some(index) => FALLBACK_SOURCES.get(index + 1),
        None => FALLBACK_SOURCES.first(),
    }
}

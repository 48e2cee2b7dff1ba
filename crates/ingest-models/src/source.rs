//! Source URL parsing.
//!
//! Tokens are bound to the video they were minted for, so callers need a
//! stable video id to build the token context from.

use thiserror::Error;
use url::Url;

/// Errors that can occur during video id extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceUrlError {
    #[error("URL could not be parsed: {0}")]
    Unparseable(String),

    #[error("URL is not a supported video URL")]
    UnsupportedHost,

    #[error("Video ID not found in URL")]
    VideoIdNotFound,

    #[error("Video ID has invalid format")]
    InvalidVideoId,
}

pub type SourceUrlResult<T> = Result<T, SourceUrlError>;

const VIDEO_ID_LEN: usize = 11;

/// Extract the 11-character video id from a watch, short, embed or shorts URL.
pub fn extract_video_id(raw: &str) -> SourceUrlResult<String> {
    let url = Url::parse(raw.trim()).map_err(|e| SourceUrlError::Unparseable(e.to_string()))?;
    let host = url
        .host_str()
        .map(|h| h.trim_start_matches("www.").trim_start_matches("m.").to_ascii_lowercase())
        .ok_or(SourceUrlError::UnsupportedHost)?;

    let candidate = match host.as_str() {
        "youtu.be" => url.path_segments().and_then(|mut s| s.next()).map(str::to_string),
        "youtube.com" | "music.youtube.com" => {
            let from_query = url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned());
            from_query.or_else(|| {
                let segments: Vec<&str> = url.path_segments()?.collect();
                match segments.as_slice() {
                    ["embed" | "v" | "shorts" | "live", id, ..] => Some((*id).to_string()),
                    _ => None,
                }
            })
        }
        _ => return Err(SourceUrlError::UnsupportedHost),
    };

    let id = candidate
        .filter(|id| !id.is_empty())
        .ok_or(SourceUrlError::VideoIdNotFound)?;
    validate_video_id(&id)?;
    Ok(id)
}

fn validate_video_id(id: &str) -> SourceUrlResult<()> {
    let valid = id.len() == VIDEO_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SourceUrlError::InvalidVideoId)
    }
}

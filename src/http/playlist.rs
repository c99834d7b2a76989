//! Single-variant HLS master playlist for `/m3u8/{id}`.

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use url::Url;

use crate::config::HLS_CONTENT_TYPE;

/// Render a master playlist with one variant pointing at `variant`.
pub fn master_playlist(variant: &Url, bandwidth: u64) -> String {
    format!(
        "#EXTM3U\n\
         #EXT-X-VERSION:3\n\
         #EXT-X-INDEPENDENT-SEGMENTS\n\
         #EXT-X-STREAM-INF:BANDWIDTH={bandwidth}\n\
         {variant}\n"
    )
}

pub fn playlist_response(variant: &Url, bandwidth: u64) -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(HLS_CONTENT_TYPE)),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        master_playlist(variant, bandwidth),
    )
        .into_response()
}

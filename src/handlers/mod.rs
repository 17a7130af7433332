pub mod dev;
pub mod pledges;
pub mod public;
pub mod webhooks;

use axum::http::{HeaderName, HeaderValue, header};

/// Headers for responses that depend on the session cookie.
pub(crate) fn no_cache_headers() -> [(HeaderName, HeaderValue); 3] {
    [
        (
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, max-age=0"),
        ),
        (header::PRAGMA, HeaderValue::from_static("no-cache")),
        (header::VARY, HeaderValue::from_static("Cookie")),
    ]
}

//! Capture-time stamping of dynamic entries.
//!
//! Staleness is judged from a header the worker writes itself, so it does not
//! depend on whatever cache-control the origin sends.

use std::time::Duration;
use swcache_core::Response;

/// Header carrying the capture time in epoch milliseconds.
pub const CAPTURE_HEADER: &str = "x-sw-cached-at";

/// Return the response with its capture time set to `now_ms`.
pub fn stamp(mut response: Response, now_ms: i64) -> Response {
    response.set_header(CAPTURE_HEADER, now_ms.to_string());
    response
}

pub fn captured_at(response: &Response) -> Option<i64> {
    response.header(CAPTURE_HEADER)?.trim().parse().ok()
}

/// A response is stale when its stamp is missing, unreadable, or older than
/// `stale_after`. Stamps from the future count as fresh.
pub fn is_stale(response: &Response, now_ms: i64, stale_after: Duration) -> bool {
    let Some(captured) = captured_at(response) else {
        return true;
    };
    let limit = i64::try_from(stale_after.as_millis()).unwrap_or(i64::MAX);
    now_ms.saturating_sub(captured) > limit
}

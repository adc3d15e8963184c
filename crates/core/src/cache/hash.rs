//! Request-keyed cache key generation.

use sha2::{Digest, Sha256};
use url::Url;

/// Compute the cache key of a request.
///
/// The fragment never reaches the network, so it is dropped; the method is
/// upper-cased. Host case and default ports are already normalized by `Url`.
pub fn compute_cache_key(method: &str, url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);

    let mut hasher = Sha256::new();
    hasher.update(method.trim().to_ascii_uppercase().as_bytes());
    hasher.update(b"\n");
    hasher.update(url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use sha2::{Digest, Sha256};

/// Version tag mixed into the hash so the key scheme can change without
/// colliding with keys derived by an older scheme.
const INSTANCE_KEY_VERSION: &str = "v1";

/// Deterministic storage key for the instance identified by
/// `(cluster_id, url)`: padded URL-safe base64 of
/// `sha256("v1 <cluster_id> <url>")`.
///
/// Stores without a native unique constraint write instances under this key
/// with a create-if-absent primitive, which makes registration idempotent.
pub fn instance_key(cluster_id: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(INSTANCE_KEY_VERSION.as_bytes());
    hasher.update(b" ");
    hasher.update(cluster_id.as_bytes());
    hasher.update(b" ");
    hasher.update(url.as_bytes());
    URL_SAFE.encode(hasher.finalize())
}

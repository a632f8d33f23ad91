/// Hash a byte slice with BLAKE3, returning the hex-encoded digest.
///
/// Used to fingerprint serialized manifests so repeated builds can be compared
/// without diffing the full document.
#[must_use]
pub fn content_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

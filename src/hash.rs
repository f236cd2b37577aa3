use sha1::{Digest, Sha1};

/// Computes the Git blob object id of `bytes`.
///
/// The digest covers `"blob <len>\0"` followed by the content, so a local file
/// hashes to the same `sha` GitHub reports for it in a contents listing.
pub fn blob_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", bytes.len()).as_bytes());
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

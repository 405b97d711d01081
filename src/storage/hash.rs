use sha2::{Digest, Sha256};

use crate::state::data::FILE_HASH_MAX;

/// Content hash stored in `file_hash`: the SHA-256 hex digest cut to the column width.
pub fn content_hash(data: &[u8]) -> String {
    let mut hex = hex::encode(Sha256::digest(data));
    hex.truncate(FILE_HASH_MAX);
    hex
}

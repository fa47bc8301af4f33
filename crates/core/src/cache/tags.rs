//! Tag record encoding.
//!
//! A tag record is an ordinary cache entry whose value lists the keys tagged
//! with it, joined by [`DELIMITER`]. Keys are not escaped, so a key containing
//! the delimiter cannot be represented.

use crate::Error;

pub const DELIMITER: char = ',';

/// Join dependent keys into a tag record value.
pub fn encode_keys<S: AsRef<str>>(keys: &[S]) -> Vec<u8> {
    let mut out = String::new();
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        out.push_str(key.as_ref());
    }
    out.into_bytes()
}

/// Split a tag record value into its dependent keys, in stored order.
///
/// An empty value decodes to a single empty key.
pub fn decode_keys(value: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(value).split(DELIMITER).map(str::to_owned).collect()
}

/// Ensure a key can be listed in a tag record.
pub fn check_taggable(key: &str) -> Result<(), Error> {
    if key.contains(DELIMITER) { Err(Error::UntaggableKey(key.to_string())) } else { Ok(()) }
}

/// Add `key` to an existing (possibly absent) tag record value.
///
/// Empty entries are dropped and the key is only appended once.
pub fn append_key(existing: Option<&[u8]>, key: &str) -> Vec<u8> {
    let mut keys: Vec<String> = existing
        .map(decode_keys)
        .unwrap_or_default()
        .into_iter()
        .filter(|k| !k.is_empty())
        .collect();

    if !keys.iter().any(|k| k == key) {
        keys.push(key.to_string());
    }

    encode_keys(&keys)
}

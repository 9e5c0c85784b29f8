//! Stable record identifiers derived from target identity.

/// Domain tag mixed into every identifier.
const DOMAIN: &str = "hostwatch-state-v1";

/// Derive a hex record identifier from identity attributes.
///
/// Each part is length-prefixed and absent parts get their own marker, so
/// `[Some("ab"), None]`, `[Some("a"), Some("b")]` and `[Some("ab"), Some("")]`
/// all produce different identifiers.
pub fn storage_id<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut hasher = blake3::Hasher::new();
    hasher.update(DOMAIN.as_bytes());
    hasher.update(b":");
    for part in parts {
        match part {
            Some(s) => {
                hasher.update(b"s");
                hasher.update(&(s.len() as u64).to_le_bytes());
                hasher.update(s.as_bytes());
            }
            None => {
                hasher.update(b"n");
            }
        }
    }
    hasher.finalize().to_hex().to_string()
}

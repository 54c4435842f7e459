use sha2::{Digest, Sha256};

use crate::types::UpdateConfig;

/// Serialize `config` with its checksum field cleared. This is the byte
/// sequence both checksum forms are computed over; map ordering in
/// [`UpdateConfig`] keeps it deterministic.
fn canonical_json(config: &UpdateConfig) -> Option<String> {
    let mut stripped = config.clone();
    stripped.checksum = None;
    serde_json::to_string(&stripped).ok()
}

/// Legacy 32-bit rolling hash used by older control planes: `h = h * 31 + c`
/// over UTF-16 code units, wrapping, rendered as lowercase hex of the
/// absolute value.
#[must_use]
pub fn legacy_hash(input: &str) -> String {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit));
    }
    format!("{:x}", i64::from(hash).unsigned_abs())
}

/// Compute the preferred checksum for `config`: a `sha256:`-prefixed digest
/// of its canonical JSON.
#[must_use]
pub fn compute_checksum(config: &UpdateConfig) -> Option<String> {
    let canonical = canonical_json(config)?;
    Some(format!(
        "sha256:{:x}",
        Sha256::digest(canonical.as_bytes())
    ))
}

fn parse_sha256_digest(digest: &str) -> Option<String> {
    let (algorithm, hash) = digest.split_once(':')?;
    if !algorithm.eq_ignore_ascii_case("sha256") {
        return None;
    }
    if hash.len() != 64 || !hash.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(hash.to_ascii_lowercase())
}

/// Verify the integrity claim carried by `config`.
///
/// An absent checksum makes no claim and passes. A `sha256:`-prefixed value
/// is compared against the SHA-256 of the canonical JSON; any other value is
/// treated as a legacy rolling hash. Comparison ignores ASCII case.
#[must_use]
pub fn verify_config_checksum(config: &UpdateConfig) -> bool {
    let Some(claimed) = config.checksum.as_deref() else {
        return true;
    };
    let Some(canonical) = canonical_json(config) else {
        return false;
    };

    if let Some(expected) = parse_sha256_digest(claimed) {
        let actual = format!("{:x}", Sha256::digest(canonical.as_bytes()));
        actual == expected
    } else {
        legacy_hash(&canonical).eq_ignore_ascii_case(claimed)
    }
}

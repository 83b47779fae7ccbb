//! V8 version fingerprinting: the four-part version tuple embedded in a
//! `.jsc` file is never stored directly, only as a 32-bit Murmur-style hash
//! recomputed here and matched against a table of known releases.

use std::collections::HashMap;

fn hash_value_unsigned(v: u32) -> u32 {
    let v = v.wrapping_shl(15).wrapping_sub(v).wrapping_sub(1);
    let v = v ^ (v >> 12);
    let v = v.wrapping_add(v.wrapping_shl(2));
    let v = v ^ (v >> 4);
    let v = v.wrapping_mul(2057);
    v ^ (v >> 16)
}

fn hash_combine(seed: u32, value: u32) -> u32 {
    let value = value.wrapping_mul(0xCC9E_2D51);
    let value = value.rotate_left(15);
    let value = value.wrapping_mul(0x1B87_3593);
    let seed = seed ^ value;
    let seed = seed.rotate_left(19);
    seed.wrapping_mul(5).wrapping_add(0xE654_6B64)
}

fn hash_combine64(seed: u64, value: u64) -> u64 {
    const M: u64 = 0xC6A4_A793_5BD1_E995;
    let value = value.wrapping_mul(M);
    let value = value ^ (value >> 47);
    let value = value.wrapping_mul(M);
    let seed = seed ^ value;
    seed.wrapping_mul(M)
}

/// 32-bit version fingerprint, folding `(patch, build, minor, major)` in
/// that order.
pub fn version_hash(major: u32, minor: u32, build: u32, patch: u32) -> u32 {
    let mut seed = 0u32;
    seed = hash_combine(seed, hash_value_unsigned(patch));
    seed = hash_combine(seed, hash_value_unsigned(build));
    seed = hash_combine(seed, hash_value_unsigned(minor));
    seed = hash_combine(seed, hash_value_unsigned(major));
    seed
}

/// 64-bit version fingerprint, truncated to 32 bits to match the on-disk
/// field width.
pub fn version_hash64(major: u32, minor: u32, build: u32, patch: u32) -> u32 {
    let mut seed = 0u64;
    seed = hash_combine64(seed, hash_value_unsigned(patch) as u64);
    seed = hash_combine64(seed, hash_value_unsigned(build) as u64);
    seed = hash_combine64(seed, hash_value_unsigned(minor) as u64);
    seed = hash_combine64(seed, hash_value_unsigned(major) as u64);
    seed as u32
}

/// Table of known `major.minor.build.patch` version strings, indexed by
/// both hash variants, used to recover the V8 version and pointer bitness
/// from the 32-bit hash stored at file offset 4.
pub struct VersionCatalog {
    by_hash32: HashMap<u32, String>,
    by_hash64: HashMap<u32, String>,
}

impl VersionCatalog {
    pub fn load() -> Self {
        let versions: Vec<String> =
            serde_json::from_str(include_str!("../data/v8_versions.json"))
                .expect("embedded v8_versions.json must parse");
        Self::from_versions(&versions)
    }

    fn from_versions(versions: &[String]) -> Self {
        let mut by_hash32 = HashMap::new();
        let mut by_hash64 = HashMap::new();
        for ver in versions {
            let parts: Vec<&str> = ver.split('.').collect();
            let [major, minor, build, patch]: [u32; 4] = match parts.as_slice() {
                [a, b, c, d] => {
                    let Ok(a) = a.parse() else { continue };
                    let Ok(b) = b.parse() else { continue };
                    let Ok(c) = c.parse() else { continue };
                    let Ok(d) = d.parse() else { continue };
                    [a, b, c, d]
                }
                _ => continue,
            };
            let h32 = version_hash(major, minor, build, patch);
            let h64 = version_hash64(major, minor, build, patch);
            by_hash32.insert(h32, ver.clone());
            by_hash64.insert(h64, ver.clone());
        }
        Self {
            by_hash32,
            by_hash64,
        }
    }

    pub fn detect_version(&self, hash_val: u32) -> &str {
        if let Some(v) = self.by_hash32.get(&hash_val) {
            return v;
        }
        if let Some(v) = self.by_hash64.get(&hash_val) {
            return v;
        }
        "Unknown"
    }

    /// `Some(true)` = 32-bit, `Some(false)` = 64-bit, `None` = hash matches
    /// neither table.
    pub fn detect_bitness(&self, hash_val: u32) -> Option<bool> {
        if self.by_hash32.contains_key(&hash_val) {
            return Some(true);
        }
        if self.by_hash64.contains_key(&hash_val) {
            return Some(false);
        }
        None
    }
}

impl Default for VersionCatalog {
    fn default() -> Self {
        Self::load()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(6, 2, 414, 54)]
    #[case(7, 4, 288, 28)]
    fn hash_is_stable(#[case] major: u32, #[case] minor: u32, #[case] build: u32, #[case] patch: u32) {
        let a = version_hash(major, minor, build, patch);
        let b = version_hash(major, minor, build, patch);
        assert_eq!(a, b);
        let a64 = version_hash64(major, minor, build, patch);
        let b64 = version_hash64(major, minor, build, patch);
        assert_eq!(a64, b64);
    }

    #[test]
    fn catalog_detects_known_version() {
        let cat = VersionCatalog::from_versions(&["6.2.414.54".to_string()]);
        let h = version_hash(6, 2, 414, 54);
        assert_eq!(cat.detect_version(h), "6.2.414.54");
        assert_eq!(cat.detect_bitness(h), Some(true));
    }

    #[test]
    fn catalog_unknown_hash() {
        let cat = VersionCatalog::from_versions(&["6.2.414.54".to_string()]);
        assert_eq!(cat.detect_bitness(0xDEAD_BEEF), None);
        assert_eq!(cat.detect_version(0xDEAD_BEEF), "Unknown");
    }
}

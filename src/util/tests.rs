#![allow(clippy::unwrap_used, reason = "allow in test files")]

use super::*;

#[test]
fn scalar_caps_disable_both_tiers() {
    let caps = CpuCaps::scalar();
    assert!(!caps.avx2);
    assert!(!caps.sse41);
    assert_eq!(caps, CpuCaps::default());
}

#[test]
fn detect_is_stable() {
    assert_eq!(CpuCaps::detect(), CpuCaps::detect());
}

#[cfg(not(feature = "no_simd"))]
#[test]
fn detect_matches_feature_queries() {
    let caps = CpuCaps::detect();
    assert_eq!(caps.avx2, has_avx2());
    assert_eq!(caps.sse41, has_sse41());
}

#[cfg(feature = "no_simd")]
#[test]
fn no_simd_detects_nothing() {
    assert_eq!(CpuCaps::detect(), CpuCaps::scalar());
}

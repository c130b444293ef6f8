pub mod math;

#[cfg(test)]
mod tests;

use cfg_if::cfg_if;

#[cfg(target_arch = "x86_64")]
cpufeatures::new!(cpuid_avx2, "avx2");
#[cfg(target_arch = "x86_64")]
cpufeatures::new!(cpuid_sse41, "sse4.1");

/// Whether the wide (256-bit) SIMD tier can run on this CPU.
#[must_use]
pub fn has_avx2() -> bool {
    cfg_if! {
        if #[cfg(target_arch = "x86_64")] {
            cpuid_avx2::get()
        } else {
            false
        }
    }
}

/// Whether the narrow (128-bit) SIMD tier can run on this CPU.
#[must_use]
pub fn has_sse41() -> bool {
    cfg_if! {
        if #[cfg(target_arch = "x86_64")] {
            cpuid_sse41::get()
        } else {
            false
        }
    }
}

/// The two capability queries the kernel table is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuCaps {
    pub avx2: bool,
    pub sse41: bool,
}

impl CpuCaps {
    /// Queries the running CPU. Both flags are false off x86_64 or with `no_simd`.
    #[must_use]
    pub fn detect() -> Self {
        cfg_if! {
            if #[cfg(feature = "no_simd")] {
                Self::scalar()
            } else {
                Self {
                    avx2: has_avx2(),
                    sse41: has_sse41(),
                }
            }
        }
    }

    /// Capabilities that bind every primitive to its scalar body.
    #[must_use]
    pub const fn scalar() -> Self {
        Self {
            avx2: false,
            sse41: false,
        }
    }
}

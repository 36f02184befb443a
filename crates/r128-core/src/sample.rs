//! Sample types

/// Type alias for internal samples (always f64 to bound long-run drift)
pub type Sample = f64;

/// Stereo sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    #[inline]
    pub const fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Duplicate a mono sample onto both sides
    #[inline]
    pub const fn mono(value: Sample) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    #[inline]
    pub fn to_mid_side(self) -> MidSideSample {
        MidSideSample {
            mid: (self.left + self.right) * 0.5,
            side: (self.left - self.right) * 0.5,
        }
    }
}

/// Mid/Side sample pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[repr(C)]
pub struct MidSideSample {
    pub mid: Sample,
    pub side: Sample,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_has_no_side() {
        let ms = StereoSample::mono(0.25).to_mid_side();
        assert_eq!(ms.mid, 0.25);
        assert_eq!(ms.side, 0.0);
    }

    #[test]
    fn test_inverted_has_no_mid() {
        let ms = StereoSample::new(0.5, -0.5).to_mid_side();
        assert_eq!(ms.mid, 0.0);
        assert_eq!(ms.side, 0.5);
    }
}

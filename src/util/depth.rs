//! Search depth, measured in fractional plies.

pub type Depth = i32;

pub const ONE_PLY: Depth = 2;
pub const DEPTH_ZERO: Depth = 0;
pub const DEPTH_QS_CHECKS: Depth = -ONE_PLY;
pub const DEPTH_QS_NO_CHECKS: Depth = -2 * ONE_PLY;
pub const DEPTH_QS_RECAPTURES: Depth = -5 * ONE_PLY;
/// Depth of entries that carry only a static evaluation.
pub const DEPTH_NONE: Depth = -6 * ONE_PLY;

/// Depth as stored in a hash entry: one byte, offset so that `DEPTH_NONE` is zero.
/// Depths beyond the representable range saturate.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct CompactDepthStorage(u8);

impl CompactDepthStorage {
    pub const NULL: Self = Self(0);

    pub const fn inner(self) -> u8 {
        self.0
    }

    pub const fn from_inner(inner: u8) -> Self {
        Self(inner)
    }
}

impl From<Depth> for CompactDepthStorage {
    fn from(depth: Depth) -> Self {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Self((depth - DEPTH_NONE).clamp(0, 255) as u8)
    }
}

impl From<CompactDepthStorage> for Depth {
    fn from(depth: CompactDepthStorage) -> Self {
        Self::from(depth.0) + DEPTH_NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_preserves_search_depths() {
        for depth in [DEPTH_NONE, DEPTH_QS_NO_CHECKS, DEPTH_QS_CHECKS, DEPTH_ZERO, ONE_PLY, 17, 200] {
            assert_eq!(Depth::from(CompactDepthStorage::from(depth)), depth);
        }
        assert_eq!(CompactDepthStorage::from(DEPTH_NONE), CompactDepthStorage::NULL);
        assert_eq!(Depth::from(CompactDepthStorage::from(10_000)), 255 + DEPTH_NONE);
    }
}

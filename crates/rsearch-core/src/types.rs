//! Basic scalar types shared by the coordinator and search kernels.

use std::fmt;

/// Search score from the side to move's point of view.
pub type Score = i32;

/// Remaining search depth in plies.
pub type Depth = i32;

/// Upper bound of any score returned by a kernel. `-SCORE_INF..=SCORE_INF`
/// is the root window.
pub const SCORE_INF: Score = 1 << 30;

/// Default maximum node height (distance from the root node).
pub const DEFAULT_MAX_HEIGHT: usize = 127;

/// Opaque move token.
///
/// The coordinator never interprets a move; it only stores, orders and
/// hands moves back to the kernel. Encoding is up to the kernel, except that
/// the raw value 0 is reserved for [`Move::NONE`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Move(u32);

impl Move {
    pub const NONE: Move = Move(0);

    #[inline]
    pub const fn from_u32(raw: u32) -> Self {
        Move(raw)
    }

    #[inline]
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "Move(none)")
        } else {
            write!(f, "Move({})", self.0)
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "m{}", self.0)
        }
    }
}

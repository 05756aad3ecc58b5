//! Integer rectangles exchanged during transform negotiation.

/// `D2D1_RECT_L`: an axis-aligned rectangle with exclusive right/bottom edges.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// `D2D_RECT_F`: the floating point bounding box form.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct RectF {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

/// Lowest coordinate that keeps `right - left` representable in an `i32`.
pub const SAFE_MIN: i32 = i32::MIN / 2;
/// Highest coordinate that keeps `right - left` representable in an `i32`.
pub const SAFE_MAX: i32 = i32::MAX / 2;

impl Rect {
    /// The "unbounded" sentinel: every edge saturated.
    pub const INFINITE: Rect = Rect {
        left: i32::MIN,
        top: i32::MIN,
        right: i32::MAX,
        bottom: i32::MAX,
    };

    pub const EMPTY: Rect = Rect {
        left: 0,
        top: 0,
        right: 0,
        bottom: 0,
    };

    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_infinite(&self) -> bool {
        *self == Self::INFINITE
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Width as `i64`, so the infinite rectangle does not overflow.
    pub fn width(&self) -> i64 {
        self.right as i64 - self.left as i64
    }

    pub fn height(&self) -> i64 {
        self.bottom as i64 - self.top as i64
    }

    /// Smallest rectangle containing both operands.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    /// Clamp every edge into `[SAFE_MIN, SAFE_MAX]` so extents can be computed
    /// in 32-bit arithmetic. The infinite sentinel becomes the largest safe
    /// rectangle.
    pub fn clamp_to_safe_range(&self) -> Rect {
        Rect {
            left: self.left.clamp(SAFE_MIN, SAFE_MAX),
            top: self.top.clamp(SAFE_MIN, SAFE_MAX),
            right: self.right.clamp(SAFE_MIN, SAFE_MAX),
            bottom: self.bottom.clamp(SAFE_MIN, SAFE_MAX),
        }
    }

    /// Convert a bounding box, rounding outwards and saturating to the `i32`
    /// range. NaN edges and infinite floats saturate to the sentinel edges.
    pub fn from_bounds(bounds: RectF) -> Rect {
        fn saturate(value: f32, fallback: i32) -> i32 {
            if value.is_nan() {
                fallback
            } else {
                // `as` saturates out-of-range floats.
                value as i32
            }
        }

        Rect {
            left: saturate(bounds.left.floor(), i32::MIN),
            top: saturate(bounds.top.floor(), i32::MIN),
            right: saturate(bounds.right.ceil(), i32::MAX),
            bottom: saturate(bounds.bottom.ceil(), i32::MAX),
        }
    }

    /// The bounding box form. Saturated edges map to infinite floats.
    pub fn to_bounds(&self) -> RectF {
        fn widen(value: i32) -> f32 {
            match value {
                i32::MIN => f32::NEG_INFINITY,
                i32::MAX => f32::INFINITY,
                v => v as f32,
            }
        }

        RectF {
            left: widen(self.left),
            top: widen(self.top),
            right: widen(self.right),
            bottom: widen(self.bottom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        prop_oneof![
            8 => (any::<i32>(), any::<i32>(), any::<i32>(), any::<i32>())
                .prop_map(|(l, t, r, b)| Rect::new(l, t, r, b)),
            1 => Just(Rect::INFINITE),
            1 => Just(Rect::EMPTY),
        ]
    }

    proptest! {
        #[test]
        fn union_is_idempotent(r in rect_strategy()) {
            prop_assert_eq!(r.union(&r), r);
        }

        #[test]
        fn union_is_commutative(a in rect_strategy(), b in rect_strategy()) {
            prop_assert_eq!(a.union(&b), b.union(&a));
        }

        #[test]
        fn union_with_infinite_is_infinite(r in rect_strategy()) {
            prop_assert!(r.union(&Rect::INFINITE).is_infinite());
            prop_assert!(Rect::INFINITE.union(&r).is_infinite());
        }

        #[test]
        fn clamped_extents_fit_in_i32(r in rect_strategy()) {
            let c = r.clamp_to_safe_range();
            prop_assert!(i32::try_from(c.width()).is_ok());
            prop_assert!(i32::try_from(c.height()).is_ok());
        }
    }

    #[test]
    fn infinite_round_trips_through_bounds() {
        let bounds = Rect::INFINITE.to_bounds();
        assert_eq!(bounds.left, f32::NEG_INFINITY);
        assert_eq!(Rect::from_bounds(bounds), Rect::INFINITE);
    }

    #[test]
    fn from_bounds_rounds_outwards() {
        let rect = Rect::from_bounds(RectF {
            left: 0.5,
            top: -0.5,
            right: 10.2,
            bottom: 3.0,
        });
        assert_eq!(rect, Rect::new(0, -1, 11, 3));
    }

    #[test]
    fn infinite_extents_do_not_overflow() {
        assert_eq!(Rect::INFINITE.width(), u32::MAX as i64);
        assert!(!Rect::INFINITE.is_empty());
        assert!(Rect::EMPTY.is_empty());
    }
}

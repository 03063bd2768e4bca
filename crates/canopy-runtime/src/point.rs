//! Row/column positions in the source text.

use std::{fmt, ops};

/// A position in the source text, counted in rows and byte columns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Point {
    pub row: u32,
    pub column: u32,
}

impl Point {
    pub const ZERO: Self = Self::new(0, 0);

    /// The sentinel used for open-ended positions.
    pub const MAX: Self = Self::new(u32::MAX, u32::MAX);

    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.column)
    }
}

/// Move `self` forward by the extent `rhs`.
///
/// An extent spanning one or more line breaks lands on its own column.
impl ops::Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        if rhs.row > 0 {
            Self::new(self.row.wrapping_add(rhs.row), rhs.column)
        } else {
            Self::new(self.row, self.column.wrapping_add(rhs.column))
        }
    }
}

/// The extent from `rhs` to `self`.
impl ops::Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        if self.row > rhs.row {
            Self::new(self.row - rhs.row, self.column)
        } else {
            Self::new(0, self.column.wrapping_sub(rhs.column))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_across_rows_takes_the_extent_column() {
        assert_eq!(Point::new(2, 7) + Point::new(0, 3), Point::new(2, 10));
        assert_eq!(Point::new(2, 7) + Point::new(1, 3), Point::new(3, 3));
    }

    #[test]
    fn sub_keeps_the_minuend_column_on_later_rows() {
        assert_eq!(Point::new(5, 4) - Point::new(2, 9), Point::new(3, 4));
        assert_eq!(Point::new(2, 9) - Point::new(2, 4), Point::new(0, 5));
    }

    #[test]
    fn add_inverts_sub() {
        let base = Point::new(3, 8);
        for p in [Point::new(3, 8), Point::new(3, 20), Point::new(7, 1)] {
            assert_eq!(base + (p - base), p);
        }
    }
}

//! Propagation of text edits onto previously computed positions.
//!
//! Positions before an edit stay where they are, positions at or after the
//! end of the replaced text move by the edit's delta, and positions inside
//! the replaced text collapse onto its boundary. Byte arithmetic wraps on
//! overflow; for ranges a wrapped result is detected and saturated to the
//! open-ended sentinel.

use crate::point::Point;

/// A description of a single text replacement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct InputEdit {
    pub start_byte: u32,
    pub old_end_byte: u32,
    pub new_end_byte: u32,
    pub start_point: Point,
    pub old_end_point: Point,
    pub new_end_point: Point,
}

impl InputEdit {
    /// Map a position at or after the old end of the edit onto the new text.
    fn shift(&self, byte: u32, point: Point) -> (u32, Point) {
        (
            self.new_end_byte.wrapping_add(byte.wrapping_sub(self.old_end_byte)),
            self.new_end_point + (point - self.old_end_point),
        )
    }
}

/// Recompute a position after `edit`, returning the moved point together
/// with its new byte offset.
pub fn edit_point(point: Point, byte: u32, edit: &InputEdit) -> (Point, u32) {
    if byte >= edit.old_end_byte {
        let (byte, point) = edit.shift(byte, point);
        (point, byte)
    } else if byte > edit.start_byte {
        (edit.new_end_point, edit.new_end_byte)
    } else {
        (point, byte)
    }
}

/// A half-open span of the source text.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Range {
    pub start_byte: u32,
    pub end_byte: u32,
    pub start_point: Point,
    pub end_point: Point,
}

impl Range {
    /// The range covering the whole input, whatever its length.
    pub const ALL: Self = Self {
        start_byte: 0,
        end_byte: u32::MAX,
        start_point: Point::ZERO,
        end_point: Point::MAX,
    };

    pub fn is_open_ended(&self) -> bool {
        self.end_byte == u32::MAX
    }

    /// Adjust both ends of the range for `edit`.
    ///
    /// An end inside the replaced text is clamped to the start of the edit.
    /// An open-ended range keeps its end.
    pub fn edit(&mut self, edit: &InputEdit) {
        if self.end_byte >= edit.old_end_byte {
            if !self.is_open_ended() {
                let (byte, point) = edit.shift(self.end_byte, self.end_point);
                (self.end_byte, self.end_point) = saturate(byte, point, edit);
            }
        } else if self.end_byte > edit.start_byte {
            self.end_byte = edit.start_byte;
            self.end_point = edit.start_point;
        }

        if self.start_byte >= edit.old_end_byte {
            let (byte, point) = edit.shift(self.start_byte, self.start_point);
            (self.start_byte, self.start_point) = saturate(byte, point, edit);
        } else if self.start_byte > edit.start_byte {
            self.start_byte = edit.start_byte;
            self.start_point = edit.start_point;
        }
    }
}

/// Apply `edit` to every range in `ranges`.
pub fn edit_ranges(ranges: &mut [Range], edit: &InputEdit) {
    for range in ranges {
        range.edit(edit);
    }
}

// a shifted position can only land below the new end by wrapping around.
fn saturate(byte: u32, point: Point, edit: &InputEdit) -> (u32, Point) {
    if byte < edit.new_end_byte {
        (u32::MAX, Point::MAX)
    } else {
        (byte, point)
    }
}

//! Runtime-side position bookkeeping for `canopy` generated parsers.

pub mod edit;
pub mod point;

pub use crate::{
    edit::{edit_point, edit_ranges, InputEdit, Range},
    point::Point,
};

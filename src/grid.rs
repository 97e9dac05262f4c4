// src/grid.rs

//! Patch grid partitioning.
//!
//! The final image is cut into a grid of fixed-size patches; every patch is
//! configured, built, and rendered by its own external process before the
//! results are stitched back together. This module owns the coordinate type
//! and the enumeration order.

use std::fmt;

/// Grid position of one patch, in patch units (not pixels).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PatchCoord {
    pub x: u32,
    pub y: u32,
}

impl PatchCoord {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for PatchCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Number of patch columns and rows for the given image/patch dimensions.
///
/// Integer division: when the image dimensions are not multiples of the patch
/// dimensions, the remainder strip is dropped. `config::validate` warns about
/// this at startup.
pub fn grid_dims(
    image_width: u32,
    image_height: u32,
    patch_width: u32,
    patch_height: u32,
) -> (u32, u32) {
    (image_width / patch_width, image_height / patch_height)
}

/// Enumerate all patch coordinates, row-major over (y, x).
///
/// The order is deterministic: (0,0), (1,0), ..., (0,1), (1,1), ...
pub fn partition(
    image_width: u32,
    image_height: u32,
    patch_width: u32,
    patch_height: u32,
) -> Vec<PatchCoord> {
    let (cols, rows) = grid_dims(image_width, image_height, patch_width, patch_height);

    let mut coords = Vec::with_capacity((cols as usize) * (rows as usize));
    for y in 0..rows {
        for x in 0..cols {
            coords.push(PatchCoord::new(x, y));
        }
    }
    coords
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_by_two_grid_row_major() {
        let coords = partition(20, 20, 10, 10);
        assert_eq!(
            coords,
            vec![
                PatchCoord::new(0, 0),
                PatchCoord::new(1, 0),
                PatchCoord::new(0, 1),
                PatchCoord::new(1, 1),
            ]
        );
    }

    #[test]
    fn count_matches_floor_division() {
        let coords = partition(600, 400, 10, 10);
        assert_eq!(coords.len(), 60 * 40);
    }

    #[test]
    fn remainder_is_dropped() {
        // 25/10 = 2 columns, the trailing 5 pixels are not covered.
        let coords = partition(25, 20, 10, 10);
        assert_eq!(grid_dims(25, 20, 10, 10), (2, 2));
        assert_eq!(coords.len(), 4);
    }

    #[test]
    fn patch_larger_than_image_yields_empty_grid() {
        assert!(partition(5, 5, 10, 10).is_empty());
    }

    #[test]
    fn partition_is_deterministic() {
        assert_eq!(partition(60, 40, 10, 10), partition(60, 40, 10, 10));
    }
}

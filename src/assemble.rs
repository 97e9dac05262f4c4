// src/assemble.rs

//! Composite image assembly.
//!
//! After the Run stage every patch process has written one image file; this
//! module stitches them into the final composite. The canvas is sized from
//! the patch grid (`cols·patch_width × rows·patch_height`) — the
//! concatenation of all rendered patches, which equals the configured image
//! dimensions whenever they divide evenly.

use std::path::PathBuf;

use image::RgbImage;
use tracing::{debug, info};

use crate::config::{OutputSection, Parameters};
use crate::errors::{RaypatchError, Result};
use crate::grid::{self, PatchCoord};
use crate::pipeline::patch_output_path;

/// Stitch every patch image into the composite and write it out.
///
/// Fails on the first absent patch file; by the time this runs the Run stage
/// has fully settled, so the failure ends the run without any process
/// cleanup. Returns the composite path.
pub fn compose(
    params: &Parameters,
    output: &OutputSection,
    patches: &[PatchCoord],
) -> Result<PathBuf> {
    let (cols, rows) = grid::grid_dims(
        params.image_width,
        params.image_height,
        params.patch_width,
        params.patch_height,
    );
    let canvas_width = cols * params.patch_width;
    let canvas_height = rows * params.patch_height;
    let mut canvas = RgbImage::new(canvas_width, canvas_height);

    for &patch in patches {
        let path = patch_output_path(&output.patch_path, patch);
        if !path.exists() {
            return Err(RaypatchError::MissingPatchOutput { patch, path });
        }

        let tile = image::open(&path)?.to_rgb8();
        let expected = (params.patch_width, params.patch_height);
        let actual = (tile.width(), tile.height());
        if actual != expected {
            return Err(RaypatchError::PatchSizeMismatch {
                patch,
                expected,
                actual,
            });
        }

        let x_offset = i64::from(patch.x * params.patch_width);
        let y_offset = i64::from(patch.y * params.patch_height);
        image::imageops::replace(&mut canvas, &tile, x_offset, y_offset);
        debug!(patch = %patch, path = ?path, "placed patch on canvas");
    }

    let composite = PathBuf::from(&output.composite_path);
    if let Some(parent) = composite.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    canvas.save(&composite)?;

    info!(
        path = ?composite,
        width = canvas_width,
        height = canvas_height,
        "composite image saved"
    );
    Ok(composite)
}

//! Map image export.
//!
//! Pixels are shaded by occupancy: 255 (white) free, 0 (black) occupied,
//! mid-grey unknown. Image row 0 is the grid's top row, so +y points up.

use super::occupancy_grid::{CellState, OccupancyGrid};
use crate::core::Pose;
use crate::error::Result;
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Radius of the robot marker, pixels
pub const ROBOT_MARKER_RADIUS: i32 = 5;

const ROBOT_MARKER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

#[inline]
fn shade(value: f32) -> u8 {
    ((1.0 - value.clamp(0.0, 1.0)) * 255.0).round() as u8
}

impl OccupancyGrid {
    /// Export map as a grayscale image.
    pub fn to_grayscale(&self) -> GrayImage {
        let (width, height) = (self.width() as u32, self.height() as u32);
        GrayImage::from_fn(width, height, |px, py| {
            let cy = (height - 1 - py) as usize;
            let value = self.get(px as usize, cy).unwrap_or(super::UNKNOWN);
            Luma([shade(value)])
        })
    }

    /// Export map as RGB, optionally with a filled disk at `pose`.
    pub fn to_rgb(&self, pose: Option<&Pose>) -> RgbImage {
        let gray = self.to_grayscale();
        let mut image = RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
            let Luma([v]) = *gray.get_pixel(x, y);
            Rgb([v, v, v])
        });

        if let Some(pose) = pose {
            let (cx, cy) = self.geometry().world_to_cell_signed(pose.x, pose.y);
            let py = self.height() as i32 - 1 - cy;
            draw_disk(&mut image, cx, py, ROBOT_MARKER_RADIUS, ROBOT_MARKER_COLOR);
        }

        image
    }

    /// Count cells by state: (free, unknown, occupied).
    pub fn count_cells(&self) -> (usize, usize, usize) {
        let mut free = 0;
        let mut unknown = 0;
        let mut occupied = 0;

        for &value in self.cells() {
            match self.classify(value) {
                CellState::Free => free += 1,
                CellState::Unknown => unknown += 1,
                CellState::Occupied => occupied += 1,
            }
        }

        (free, unknown, occupied)
    }
}

/// Filled disk, clipped to the image.
fn draw_disk(image: &mut RgbImage, cx: i32, cy: i32, radius: i32, color: Rgb<u8>) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy > radius * radius {
                continue;
            }
            let (x, y) = (cx + dx, cy + dy);
            if (0..w).contains(&x) && (0..h).contains(&y) {
                image.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Write a map image; format follows the extension (`.png`, `.pgm`).
///
/// PGM is grayscale only, so the robot marker is dropped for it.
pub fn save_map_image<P: AsRef<Path>>(
    grid: &OccupancyGrid,
    pose: Option<&Pose>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    let is_pgm = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pgm"));

    if is_pgm {
        write_pgm(&grid.to_grayscale(), path)?;
    } else {
        grid.to_rgb(pose).save(path)?;
    }

    log::info!(
        "Saved {}x{} map to {}",
        grid.width(),
        grid.height(),
        path.display()
    );
    Ok(())
}

/// Binary PGM (P5), already Y-flipped by [`OccupancyGrid::to_grayscale`].
fn write_pgm(image: &GrayImage, path: &Path) -> Result<()> {
    let mut file = BufWriter::new(File::create(path)?);
    writeln!(file, "P5")?;
    writeln!(file, "{} {}", image.width(), image.height())?;
    writeln!(file, "255")?;
    file.write_all(image.as_raw())?;
    file.flush()?;
    Ok(())
}

pub mod moments;
pub mod rotated_rect;

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use moments::Moments;
use rotated_rect::RotatedRect;

use crate::{
    utils::{draw_line, draw_polygon, GrayImage},
    vision::segmentation::LabelGrid,
};

const BOX_THICKNESS: u32 = 4;
const AXIS_THICKNESS: u32 = 2;
const ANNOTATION_VALUE: u8 = 255;

/// Shape descriptors used for classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectFeatures {
    /// Share of the oriented bounding box covered by the region, in (0, 100].
    pub percent_filled: f64,
    /// Long side over short side of the oriented bounding box, always >= 1.
    pub aspect_ratio: f64,
}

impl ObjectFeatures {
    pub fn new(percent_filled: f64, aspect_ratio: f64) -> Self {
        Self {
            percent_filled,
            aspect_ratio,
        }
    }
}

/// Everything computed for one labeled region of a frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionDescriptor {
    pub label: u32,
    pub pixel_count: usize,
    pub features: ObjectFeatures,
    pub centroid: Point2<f64>,
    pub orientation: f64,
    pub rect: RotatedRect,
}

pub fn extract_features(grid: &LabelGrid) -> Vec<RegionDescriptor> {
    let count = grid.component_count() as usize;
    if count == 0 {
        return Vec::new();
    }

    let mut regions: Vec<Vec<(i64, i64)>> = vec![Vec::new(); count];
    for r in 0..grid.nrows() {
        for c in 0..grid.ncols() {
            let label = grid.get(r, c);
            if label != 0 {
                regions[label as usize - 1].push((c as i64, r as i64));
            }
        }
    }

    regions
        .into_par_iter()
        .enumerate()
        .filter_map(|(i, pixels)| describe_region(i as u32 + 1, &pixels))
        .collect()
}

fn describe_region(label: u32, pixels: &[(i64, i64)]) -> Option<RegionDescriptor> {
    let points: Vec<Point2<f64>> = pixels.iter().map(|(x, y)| Point2::new(*x as f64, *y as f64)).collect();
    let moments = Moments::from_points(&points);
    let centroid = moments.centroid()?;
    let rect = RotatedRect::min_area(pixels)?;

    let percent_filled = (100.0 * pixels.len() as f64 / rect.area()).min(100.0);
    Some(RegionDescriptor {
        label,
        pixel_count: pixels.len(),
        features: ObjectFeatures::new(percent_filled, rect.aspect_ratio()),
        centroid,
        orientation: moments.orientation(),
        rect,
    })
}

/// Display image of the labels with each region's oriented box and axis of least moment.
pub fn draw_annotations(grid: &LabelGrid, regions: &[RegionDescriptor]) -> GrayImage {
    let mut img = grid.to_display();
    for region in regions {
        draw_polygon(&mut img, &region.rect.corners(), ANNOTATION_VALUE, BOX_THICKNESS);

        let half_length = region.rect.width / 2.0;
        let offset = Vector2::new(region.orientation.cos(), region.orientation.sin()) * half_length;
        draw_line(
            &mut img,
            region.centroid + offset,
            region.centroid - offset,
            ANNOTATION_VALUE,
            AXIS_THICKNESS,
        );
    }
    img
}

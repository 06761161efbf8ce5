use nalgebra::{DMatrix, Vector3};

use crate::{
    utils::{clamp_to_u8, ColorImage, GrayImage, Mask},
    VisionConfig,
};

const BLUR_KERNEL: [u32; 5] = [1, 2, 4, 2, 1];
const BLUR_KERNEL_SUM: f64 = 10.0;

/// Result of turning a colour frame into a binary mask.
#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub mask: Mask,
    pub threshold: f64,
}

pub fn preprocess_frame(img: &ColorImage, config: &VisionConfig) -> Preprocessed {
    let blurred = blur5x5(img);
    let gray = to_greyscale(&blurred);
    let threshold = dynamic_threshold(&gray, config);
    log::debug!("Dynamic threshold for frame: {threshold:.2}");

    Preprocessed {
        mask: threshold_image(&gray, threshold),
        threshold,
    }
}

/// Separable [1, 2, 4, 2, 1] / 10 blur, rows first then columns.
///
/// Pixels closer than two pixels to the border are copied through unfiltered.
pub fn blur5x5(img: &ColorImage) -> ColorImage {
    let rows = img.nrows();
    let cols = img.ncols();
    let mut dst = img.clone();
    if rows < 5 || cols < 5 {
        return dst;
    }

    // Row pass, kept in f64 so the column pass sees unrounded values
    let mut row_pass = DMatrix::from_element(rows, cols, Vector3::new(0.0, 0.0, 0.0));
    for r in 0..rows {
        for c in 2..cols - 2 {
            let mut acc = Vector3::new(0.0, 0.0, 0.0);
            for (k, weight) in BLUR_KERNEL.iter().enumerate() {
                acc += img[(r, c + k - 2)].cast::<f64>() * *weight as f64;
            }
            row_pass[(r, c)] = acc / BLUR_KERNEL_SUM;
        }
    }

    for r in 2..rows - 2 {
        for c in 2..cols - 2 {
            let mut acc = Vector3::new(0.0, 0.0, 0.0);
            for (k, weight) in BLUR_KERNEL.iter().enumerate() {
                acc += row_pass[(r + k - 2, c)] * *weight as f64;
            }
            let v = acc / BLUR_KERNEL_SUM;
            dst[(r, c)] = v.map(clamp_to_u8);
        }
    }

    dst
}

/// Luma of a BGR frame, 0.299 R + 0.587 G + 0.114 B.
pub fn to_greyscale(img: &ColorImage) -> GrayImage {
    img.map(|bgr| {
        clamp_to_u8(0.114 * bgr.x as f64 + 0.587 * bgr.y as f64 + 0.299 * bgr.z as f64)
    })
}

/// Splits the intensities into two clusters with k-means and returns the midpoint of the centres.
pub fn dynamic_threshold(gray: &GrayImage, config: &VisionConfig) -> f64 {
    let mut histogram = [0u64; 256];
    for v in gray.iter() {
        histogram[*v as usize] += 1;
    }

    let (Some(min), Some(max)) = (
        histogram.iter().position(|n| *n > 0),
        histogram.iter().rposition(|n| *n > 0),
    ) else {
        return 0.0;
    };

    let mut centres = [min as f64, max as f64];
    for _ in 0..config.kmeans_max_iterations {
        let mut sums = [0.0; 2];
        let mut counts = [0u64; 2];
        for (intensity, n) in histogram.iter().enumerate().filter(|(_, n)| **n > 0) {
            let v = intensity as f64;
            let nearest = if (v - centres[0]).abs() <= (v - centres[1]).abs() { 0 } else { 1 };
            sums[nearest] += v * *n as f64;
            counts[nearest] += n;
        }

        let mut shift: f64 = 0.0;
        for i in 0..2 {
            if counts[i] > 0 {
                let updated = sums[i] / counts[i] as f64;
                shift = shift.max((updated - centres[i]).abs());
                centres[i] = updated;
            }
        }
        if shift < config.kmeans_epsilon {
            break;
        }
    }

    (centres[0] + centres[1]) / 2.0
}

/// Dark pixels (below `thresh`) are foreground.
pub fn threshold_image(gray: &GrayImage, thresh: f64) -> Mask {
    gray.map(|v| (v as f64) < thresh)
}

pub fn mask_to_image(mask: &Mask, max_value: u8) -> GrayImage {
    mask.map(|fg| if fg { max_value } else { 0 })
}

pub fn dilate(mask: &Mask, kernel_size: usize) -> Mask {
    morph(mask, kernel_size, true)
}

pub fn erode(mask: &Mask, kernel_size: usize) -> Mask {
    morph(mask, kernel_size, false)
}

/// Morphological closing (dilate then erode) with a square kernel of ones.
pub fn close(mask: &Mask, kernel_size: usize) -> Mask {
    if kernel_size <= 1 {
        return mask.clone();
    }
    erode(&dilate(mask, kernel_size), kernel_size)
}

fn morph(mask: &Mask, kernel_size: usize, dilation: bool) -> Mask {
    let rows = mask.nrows() as i64;
    let cols = mask.ncols() as i64;
    let before = (kernel_size.max(1) as i64 - 1) / 2;
    let after = kernel_size.max(1) as i64 - 1 - before;

    DMatrix::from_fn(mask.nrows(), mask.ncols(), |r, c| {
        let mut neighbours = (-before..=after)
            .flat_map(|dy| (-before..=after).map(move |dx| (r as i64 + dy, c as i64 + dx)))
            .filter(|(y, x)| *y >= 0 && *y < rows && *x >= 0 && *x < cols)
            .map(|(y, x)| mask[(y as usize, x as usize)]);

        if dilation {
            neighbours.any(|v| v)
        } else {
            neighbours.all(|v| v)
        }
    })
}

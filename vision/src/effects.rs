use std::{fmt, str::FromStr};

use anyhow::{anyhow, bail};
use nalgebra::{DMatrix, Matrix3, Vector3};

use crate::utils::{clamp_to_u8, ColorImage};

pub use crate::preprocess::blur5x5;

/// Signed per-channel gradient image.
pub type GradientImage = DMatrix<Vector3<i16>>;

const DEFAULT_QUANTIZE_LEVELS: u32 = 10;
const COMIC_EDGE_THRESHOLD: u8 = 20;

/// Each channel becomes the average of the three.
pub fn greyscale(img: &ColorImage) -> ColorImage {
    img.map(|p| {
        let avg = ((p.x as u16 + p.y as u16 + p.z as u16) / 3) as u8;
        Vector3::new(avg, avg, avg)
    })
}

pub fn sepia(img: &ColorImage) -> ColorImage {
    // Rows produce B, G, R from an input of B, G, R
    #[rustfmt::skip]
    let tone = Matrix3::new(
        0.131, 0.534, 0.272,
        0.168, 0.686, 0.349,
        0.189, 0.769, 0.393,
    );
    img.map(|p| (tone * p.cast::<f64>()).map(clamp_to_u8))
}

/// Horizontal gradient, positive where the image gets brighter to the right.
pub fn sobel_x_3x3(img: &ColorImage) -> GradientImage {
    sobel(img, |get| {
        let column = |dx: i32| get(-1, dx) + get(0, dx) * 2 + get(1, dx);
        column(1) - column(-1)
    })
}

/// Vertical gradient, positive where the image gets brighter downwards.
pub fn sobel_y_3x3(img: &ColorImage) -> GradientImage {
    sobel(img, |get| {
        let row = |dy: i32| get(dy, -1) + get(dy, 0) * 2 + get(dy, 1);
        row(1) - row(-1)
    })
}

fn sobel(img: &ColorImage, kernel: impl Fn(&dyn Fn(i32, i32) -> Vector3<i16>) -> Vector3<i16>) -> GradientImage {
    let rows = img.nrows();
    let cols = img.ncols();
    let mut dst = DMatrix::from_element(rows, cols, Vector3::new(0, 0, 0));
    if rows < 3 || cols < 3 {
        return dst;
    }

    for r in 1..rows - 1 {
        for c in 1..cols - 1 {
            let get = |dy: i32, dx: i32| {
                img[((r as i32 + dy) as usize, (c as i32 + dx) as usize)].cast::<i16>()
            };
            dst[(r, c)] = kernel(&get);
        }
    }
    dst
}

/// Per-channel Euclidean length of the two gradients.
pub fn magnitude(sx: &GradientImage, sy: &GradientImage) -> anyhow::Result<ColorImage> {
    if sx.shape() != sy.shape() {
        bail!("Gradient images differ in size: {:?} and {:?}", sx.shape(), sy.shape());
    }
    Ok(sx.zip_map(sy, |gx, gy| {
        gx.zip_map(&gy, |x, y| clamp_to_u8(((x as f64).powi(2) + (y as f64).powi(2)).sqrt()))
    }))
}

/// Blurs, then snaps every channel down to a multiple of `255 / levels`.
///
/// The top of the range can form one extra bucket, e.g. 0, 127 and 254 for two levels.
pub fn blur_quantize(img: &ColorImage, levels: u32) -> anyhow::Result<ColorImage> {
    if levels == 0 {
        bail!("Quantization needs at least one level");
    }
    let bucket = (255 / levels).max(1);
    Ok(blur5x5(img).map(|p| p.map(|v| ((v as u32 / bucket) * bucket).min(255) as u8)))
}

/// Quantized colours with strong edges drawn in black.
pub fn comic_book(img: &ColorImage, levels: u32) -> anyhow::Result<ColorImage> {
    let mag = magnitude(&sobel_x_3x3(img), &sobel_y_3x3(img))?;
    let mut out = blur_quantize(img, levels)?;
    for (pixel, edge) in out.iter_mut().zip(mag.iter()) {
        if edge.max() > COMIC_EDGE_THRESHOLD {
            *pixel = Vector3::new(0, 0, 0);
        }
    }
    Ok(out)
}

/// Named filters of the live effects viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Grey,
    Sepia,
    Blur,
    SobelX,
    SobelY,
    Magnitude,
    Quantize,
    Comic,
}

impl Effect {
    pub const ALL: [Effect; 8] = [
        Effect::Grey,
        Effect::Sepia,
        Effect::Blur,
        Effect::SobelX,
        Effect::SobelY,
        Effect::Magnitude,
        Effect::Quantize,
        Effect::Comic,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Effect::Grey => "grey",
            Effect::Sepia => "sepia",
            Effect::Blur => "blur",
            Effect::SobelX => "sobel-x",
            Effect::SobelY => "sobel-y",
            Effect::Magnitude => "magnitude",
            Effect::Quantize => "quantize",
            Effect::Comic => "comic",
        }
    }

    /// Applies the effect. `levels` is only used by the quantizing effects, `None` means the default.
    pub fn apply(&self, img: &ColorImage, levels: Option<u32>) -> anyhow::Result<ColorImage> {
        let levels = levels.unwrap_or(DEFAULT_QUANTIZE_LEVELS);
        match self {
            Effect::Grey => Ok(greyscale(img)),
            Effect::Sepia => Ok(sepia(img)),
            Effect::Blur => Ok(blur5x5(img)),
            Effect::SobelX => Ok(gradient_to_display(&sobel_x_3x3(img))),
            Effect::SobelY => Ok(gradient_to_display(&sobel_y_3x3(img))),
            Effect::Magnitude => magnitude(&sobel_x_3x3(img), &sobel_y_3x3(img)),
            Effect::Quantize => blur_quantize(img, levels),
            Effect::Comic => comic_book(img, levels),
        }
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Effect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Effect::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| anyhow!("Unknown effect {s:?}, expected one of: {}", Effect::ALL.map(|e| e.name()).join(", ")))
    }
}

/// Absolute gradient values, like `convertScaleAbs`.
pub fn gradient_to_display(grad: &GradientImage) -> ColorImage {
    grad.map(|g| g.map(|v| v.unsigned_abs().min(255) as u8))
}

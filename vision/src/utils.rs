use nalgebra::{DMatrix, Point2, Vector3};

/// Colour frame in BGR channel order, indexed `(row, col)`.
pub type ColorImage = DMatrix<Vector3<u8>>;
pub type GrayImage = DMatrix<u8>;
/// Foreground (`true`) / background (`false`) pixels.
pub type Mask = DMatrix<bool>;

#[inline(always)]
pub fn clamp_to_u8(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Draws a line of the given thickness, clipping everything outside the image.
pub fn draw_line(img: &mut GrayImage, from: Point2<f64>, to: Point2<f64>, value: u8, thickness: u32) {
    let steps = (to - from).abs().max().ceil().max(1.0) as usize;
    let radius = thickness.max(1) as f64 / 2.0;
    let reach = radius.ceil() as i64;

    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let p = from + (to - from) * t;
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                if (dx * dx + dy * dy) as f64 > radius * radius {
                    continue;
                }
                let x = p.x.round() as i64 + dx;
                let y = p.y.round() as i64 + dy;
                if x >= 0 && y >= 0 && (y as usize) < img.nrows() && (x as usize) < img.ncols() {
                    img[(y as usize, x as usize)] = value;
                }
            }
        }
    }
}

/// Draws the closed polygon through `corners`.
pub fn draw_polygon(img: &mut GrayImage, corners: &[Point2<f64>], value: u8, thickness: u32) {
    for (i, from) in corners.iter().enumerate() {
        let to = corners[(i + 1) % corners.len()];
        draw_line(img, *from, to, value, thickness);
    }
}

use std::f64::consts::PI;

use nalgebra::{DMatrix, Point2, Rotation2, Vector2, Vector3};
use rand::Rng;
use vision::ColorImage;

const BACKGROUND: u8 = 215;
const BACKGROUND_NOISE: i16 = 12;
const OBJECT_SHADE: u8 = 45;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Box,
    Pen,
    Disc,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 3] = [ObjectKind::Box, ObjectKind::Pen, ObjectKind::Disc];

    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Box => "box",
            ObjectKind::Pen => "pen",
            ObjectKind::Disc => "disc",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimObject {
    pub kind: ObjectKind,
    pub center: Point2<f64>,
    /// Full side lengths. For a disc both are the diameter.
    pub size: Vector2<f64>,
    pub angle: f64,
}

impl SimObject {
    /// Random size and rotation, placed so the whole object stays inside the frame.
    pub fn random(kind: ObjectKind, rng: &mut impl Rng, width: usize, height: usize) -> Self {
        let size = match kind {
            ObjectKind::Box => Vector2::new(rng.gen_range(120.0..150.0), rng.gen_range(110.0..125.0)),
            ObjectKind::Pen => Vector2::new(rng.gen_range(280.0..310.0), rng.gen_range(48.0..56.0)),
            ObjectKind::Disc => Vector2::repeat(2.0 * rng.gen_range(65.0..85.0)),
        };
        let margin = size.norm() / 2.0 + 2.0;
        let center = Point2::new(
            random_coord(rng, width as f64, margin),
            random_coord(rng, height as f64, margin),
        );

        Self {
            kind,
            center,
            size,
            angle: rng.gen_range(0.0..PI),
        }
    }

    pub fn contains(&self, p: Point2<f64>) -> bool {
        let local = Rotation2::new(-self.angle) * (p - self.center);
        match self.kind {
            ObjectKind::Disc => local.norm() <= self.size.x / 2.0,
            ObjectKind::Box | ObjectKind::Pen => {
                local.x.abs() <= self.size.x / 2.0 && local.y.abs() <= self.size.y / 2.0
            }
        }
    }
}

fn random_coord(rng: &mut impl Rng, extent: f64, margin: f64) -> f64 {
    if extent <= 2.0 * margin {
        extent / 2.0
    } else {
        rng.gen_range(margin..extent - margin)
    }
}

/// Light noisy table with the objects drawn on top in a dark shade.
pub fn render(objects: &[SimObject], width: usize, height: usize, rng: &mut impl Rng) -> ColorImage {
    DMatrix::from_fn(height, width, |r, c| {
        let p = Point2::new(c as f64, r as f64);
        if objects.iter().any(|o| o.contains(p)) {
            Vector3::repeat(OBJECT_SHADE)
        } else {
            let v = (BACKGROUND as i16 + rng.gen_range(-BACKGROUND_NOISE..=BACKGROUND_NOISE)).clamp(0, 255) as u8;
            Vector3::repeat(v)
        }
    })
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn random_objects_stay_in_frame() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            for kind in ObjectKind::ALL {
                let o = SimObject::random(kind, &mut rng, 640, 480);
                let reach = o.size.norm() / 2.0;
                assert!(o.center.x - reach >= 0.0 && o.center.x + reach <= 640.0);
                assert!(o.center.y - reach >= 0.0 && o.center.y + reach <= 480.0);
            }
        }
    }

    #[test]
    fn rotated_bar_covers_its_axis() {
        let bar = SimObject {
            kind: ObjectKind::Pen,
            center: Point2::new(50.0, 50.0),
            size: Vector2::new(40.0, 4.0),
            angle: PI / 2.0,
        };
        assert!(bar.contains(Point2::new(50.0, 68.0)));
        assert!(!bar.contains(Point2::new(68.0, 50.0)));
    }

    #[test]
    fn render_draws_dark_objects() {
        let mut rng = StdRng::seed_from_u64(1);
        let disc = SimObject {
            kind: ObjectKind::Disc,
            center: Point2::new(20.0, 20.0),
            size: Vector2::repeat(10.0),
            angle: 0.0,
        };
        let img = render(&[disc], 40, 30, &mut rng);
        assert_eq!(img.shape(), (30, 40));
        assert_eq!(img[(20, 20)], Vector3::repeat(OBJECT_SHADE));
        assert!(img[(0, 0)].x >= BACKGROUND - BACKGROUND_NOISE as u8);
    }
}

use nalgebra::Point2;

/// Spatial moments of a binary region, up to second order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu02: f64,
    pub mu11: f64,
}

impl Moments {
    /// Points are pixel coordinates, x = column and y = row.
    pub fn from_points(points: &[Point2<f64>]) -> Self {
        let m00 = points.len() as f64;
        if points.is_empty() {
            return Self::default();
        }
        let m10: f64 = points.iter().map(|p| p.x).sum();
        let m01: f64 = points.iter().map(|p| p.y).sum();
        let (cx, cy) = (m10 / m00, m01 / m00);

        let mut moments = Self { m00, m10, m01, ..Default::default() };
        for p in points {
            let dx = p.x - cx;
            let dy = p.y - cy;
            moments.mu20 += dx * dx;
            moments.mu02 += dy * dy;
            moments.mu11 += dx * dy;
        }
        moments
    }

    pub fn centroid(&self) -> Option<Point2<f64>> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(Point2::new(self.m10 / self.m00, self.m01 / self.m00))
    }

    /// Angle of the axis of least second moment, in radians from the x axis.
    pub fn orientation(&self) -> f64 {
        0.5 * (2.0 * self.mu11).atan2(self.mu20 - self.mu02)
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_4;

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn centroid_of_rectangle() {
        let points: Vec<_> = (0..4)
            .flat_map(|y| (0..10).map(move |x| Point2::new(x as f64, y as f64)))
            .collect();
        let m = Moments::from_points(&points);
        assert_eq!(m.m00, 40.0);
        let c = m.centroid().unwrap();
        assert_relative_eq!(c.x, 4.5);
        assert_relative_eq!(c.y, 1.5);
        assert_relative_eq!(m.orientation(), 0.0);
    }

    #[test]
    fn tall_region_points_down() {
        let points: Vec<_> = (0..10).map(|y| Point2::new(0.0, y as f64)).collect();
        let m = Moments::from_points(&points);
        assert_relative_eq!(m.orientation().abs(), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn diagonal_line_is_45_degrees() {
        let points: Vec<_> = (0..10).map(|i| Point2::new(i as f64, i as f64)).collect();
        let m = Moments::from_points(&points);
        assert_relative_eq!(m.orientation(), FRAC_PI_4, epsilon = 1e-12);
    }

    #[test]
    fn empty_region_has_no_centroid() {
        assert_eq!(Moments::from_points(&[]).centroid(), None);
    }
}

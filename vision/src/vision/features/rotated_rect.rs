use itertools::Itertools;
use nalgebra::{Point2, Vector2};

/// Oriented rectangle. `width` runs along `angle` and is never shorter than `height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point2<f64>,
    pub width: f64,
    pub height: f64,
    /// Direction of the width side, radians from the x axis.
    pub angle: f64,
}

impl RotatedRect {
    /// Smallest rectangle covering the pixels at `points` (x = column, y = row).
    ///
    /// Rotating calipers over the convex hull. Every side covers whole pixels, so a lone pixel is
    /// 1x1 and an axis aligned n x m block is exactly n x m.
    pub fn min_area(points: &[(i64, i64)]) -> Option<Self> {
        let hull = convex_hull(points);
        match hull.len() {
            0 => return None,
            1 => {
                let (x, y) = hull[0];
                return Some(Self {
                    center: Point2::new(x as f64, y as f64),
                    width: 1.0,
                    height: 1.0,
                    angle: 0.0,
                });
            }
            _ => {}
        }

        let hull: Vec<Vector2<f64>> = hull.iter().map(|(x, y)| Vector2::new(*x as f64, *y as f64)).collect();
        let mut best: Option<(f64, Self)> = None;

        for (a, b) in hull.iter().copied().circular_tuple_windows::<(Vector2<f64>, Vector2<f64>)>() {
            let edge = b - a;
            if edge.norm() == 0.0 {
                continue;
            }
            let axis_u = edge.normalize();
            let axis_v = Vector2::new(-axis_u.y, axis_u.x);

            let Some((u_min, u_max)) = hull.iter().map(|p| p.dot(&axis_u)).minmax_by(f64::total_cmp).into_option() else {
                continue;
            };
            let Some((v_min, v_max)) = hull.iter().map(|p| p.dot(&axis_v)).minmax_by(f64::total_cmp).into_option() else {
                continue;
            };

            let len_u = u_max - u_min + 1.0;
            let len_v = v_max - v_min + 1.0;
            let area = len_u * len_v;
            if best.as_ref().map_or(true, |(best_area, _)| area < *best_area) {
                let center = axis_u * ((u_min + u_max) / 2.0) + axis_v * ((v_min + v_max) / 2.0);
                let (width, height, axis) = if len_u >= len_v {
                    (len_u, len_v, axis_u)
                } else {
                    (len_v, len_u, axis_v)
                };
                best = Some((
                    area,
                    Self {
                        center: Point2::from(center),
                        width,
                        height,
                        angle: axis.y.atan2(axis.x),
                    },
                ));
            }
        }

        best.map(|(_, rect)| rect)
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    pub fn aspect_ratio(&self) -> f64 {
        self.width / self.height
    }

    /// Corners in drawing order.
    pub fn corners(&self) -> [Point2<f64>; 4] {
        let along = Vector2::new(self.angle.cos(), self.angle.sin()) * (self.width / 2.0);
        let across = Vector2::new(-self.angle.sin(), self.angle.cos()) * (self.height / 2.0);
        [
            self.center - along - across,
            self.center + along - across,
            self.center + along + across,
            self.center - along + across,
        ]
    }
}

fn cross(o: (i64, i64), a: (i64, i64), b: (i64, i64)) -> i64 {
    (a.0 - o.0) * (b.1 - o.1) - (a.1 - o.1) * (b.0 - o.0)
}

/// Monotonic chain convex hull, counter-clockwise without collinear points.
pub fn convex_hull(points: &[(i64, i64)]) -> Vec<(i64, i64)> {
    let pts: Vec<(i64, i64)> = points.iter().copied().sorted_unstable().dedup().collect();
    if pts.len() <= 2 {
        return pts;
    }

    let mut lower: Vec<(i64, i64)> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<(i64, i64)> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

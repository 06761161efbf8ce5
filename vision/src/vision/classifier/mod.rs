pub mod confusion;
pub mod database;

use database::FeatureDatabase;

use crate::vision::features::ObjectFeatures;

pub const UNKNOWN_LABEL: &str = "Unknown";
/// Standard deviations below this are clamped so a constant feature can't divide by zero.
pub const MIN_STD_DEV: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: String,
    /// Scaled distance to the matched entry, `None` when nothing could be matched.
    pub distance: Option<f64>,
}

/// Nearest neighbour matching against a snapshot of the feature database.
pub struct Classifier {
    entries: Vec<(String, ObjectFeatures)>,
    std_dev: ObjectFeatures,
}

impl Classifier {
    pub fn new(database: &FeatureDatabase) -> Self {
        Self {
            entries: database.iter().map(|(label, features)| (label.to_string(), *features)).collect(),
            std_dev: database.std_dev(),
        }
    }

    pub fn std_dev(&self) -> ObjectFeatures {
        self.std_dev
    }

    pub fn classify(&self, sample: &ObjectFeatures) -> Classification {
        let mut best: Option<(&str, f64)> = None;
        // Strict comparison keeps the first label in sorted order on ties
        for (label, features) in &self.entries {
            let distance = scaled_distance(sample, features, &self.std_dev);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((label.as_str(), distance));
            }
        }

        match best {
            Some((label, distance)) => {
                log::debug!("Closest match {label} at scaled distance {distance:.4}");
                Classification {
                    label: label.to_string(),
                    distance: Some(distance),
                }
            }
            None => Classification {
                label: UNKNOWN_LABEL.to_string(),
                distance: None,
            },
        }
    }
}

/// Euclidean distance with each feature divided by its standard deviation.
pub fn scaled_distance(a: &ObjectFeatures, b: &ObjectFeatures, std_dev: &ObjectFeatures) -> f64 {
    let sd_percent = std_dev.percent_filled.max(MIN_STD_DEV);
    let sd_aspect = std_dev.aspect_ratio.max(MIN_STD_DEV);

    let d_percent = (a.percent_filled - b.percent_filled) / sd_percent;
    let d_aspect = (a.aspect_ratio - b.aspect_ratio) / sd_aspect;
    (d_percent * d_percent + d_aspect * d_aspect).sqrt()
}

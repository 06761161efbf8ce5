use std::{
    collections::BTreeMap,
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};

use crate::vision::features::ObjectFeatures;

pub const DEFAULT_DATABASE_PATH: &str = "object_db.txt";

/// Labeled feature vectors, backed by an append-only text file with one
/// `label,percentFilled,aspectRatio` record per line.
///
/// The file is read once and only appended to afterwards; the last record for a label wins.
#[derive(Debug, Clone)]
pub struct FeatureDatabase {
    path: PathBuf,
    entries: BTreeMap<String, ObjectFeatures>,
}

impl FeatureDatabase {
    /// Database that lives only in memory until something is appended.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            entries: BTreeMap::new(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let mut db = Self::new(path);
        db.reload()?;
        Ok(db)
    }

    /// Throws away the in-memory entries and parses the file again. A missing file is an empty database.
    pub fn reload(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No feature database at {}, starting empty", self.path.display());
                return Ok(());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read feature database {}", self.path.display())),
        };

        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(line) {
                Some((label, features)) => {
                    self.entries.insert(label, features);
                }
                None => log::warn!("Skipping malformed record on line {} of {}", line_no + 1, self.path.display()),
            }
        }
        log::debug!("Loaded {} labels from {}", self.entries.len(), self.path.display());

        Ok(())
    }

    /// Appends one record to the file and makes it visible in memory.
    pub fn append(&mut self, label: &str, features: ObjectFeatures) -> anyhow::Result<()> {
        let label = validate_label(label)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open feature database {}", self.path.display()))?;
        file.write_all(format_record(label, &features).as_bytes())
            .with_context(|| format!("Failed to write to feature database {}", self.path.display()))?;

        self.entries.insert(label.to_string(), features);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, label: &str) -> Option<&ObjectFeatures> {
        self.entries.get(label)
    }

    /// Entries sorted by label.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectFeatures)> {
        self.entries.iter().map(|(label, features)| (label.as_str(), features))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Population standard deviation of each feature. Zero for an empty database.
    pub fn std_dev(&self) -> ObjectFeatures {
        if self.entries.is_empty() {
            return ObjectFeatures::new(0.0, 0.0);
        }
        let n = self.entries.len() as f64;
        let mean_percent = self.entries.values().map(|f| f.percent_filled).sum::<f64>() / n;
        let mean_aspect = self.entries.values().map(|f| f.aspect_ratio).sum::<f64>() / n;

        let var_percent = self.entries.values().map(|f| (f.percent_filled - mean_percent).powi(2)).sum::<f64>() / n;
        let var_aspect = self.entries.values().map(|f| (f.aspect_ratio - mean_aspect).powi(2)).sum::<f64>() / n;

        ObjectFeatures::new(var_percent.sqrt(), var_aspect.sqrt())
    }
}

/// Trims `label` and checks it can be stored as the first field of a record.
pub fn validate_label(label: &str) -> anyhow::Result<&str> {
    let label = label.trim();
    if label.is_empty() {
        bail!("Object label can't be empty");
    }
    if label.contains([',', '\n', '\r']) {
        bail!("Object label {label:?} can't contain commas or line breaks");
    }
    Ok(label)
}

pub fn parse_record(line: &str) -> Option<(String, ObjectFeatures)> {
    let (label, rest) = line.split_once(',')?;
    let label = label.trim();
    if label.is_empty() {
        return None;
    }
    let (percent, aspect) = rest.split_once(',')?;
    let percent: f64 = percent.trim().parse().ok()?;
    let aspect: f64 = aspect.trim().parse().ok()?;
    if !percent.is_finite() || !aspect.is_finite() {
        return None;
    }

    Some((label.to_string(), ObjectFeatures::new(percent, aspect)))
}

pub fn format_record(label: &str, features: &ObjectFeatures) -> String {
    format!("{label},{},{}\n", features.percent_filled, features.aspect_ratio)
}

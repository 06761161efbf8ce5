pub mod union_find;

use std::collections::HashMap;

use nalgebra::DMatrix;
use union_find::UnionFind;

use crate::utils::{GrayImage, Mask};

pub const DEFAULT_MIN_COMPONENT_SIZE: usize = 10_000;

/// Per-pixel component labels. 0 is background, components are numbered densely from 1.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelGrid {
    labels: DMatrix<u32>,
    component_count: u32,
}

impl LabelGrid {
    pub fn empty(rows: usize, cols: usize) -> Self {
        Self {
            labels: DMatrix::zeros(rows, cols),
            component_count: 0,
        }
    }

    pub fn as_matrix(&self) -> &DMatrix<u32> {
        &self.labels
    }

    pub fn nrows(&self) -> usize {
        self.labels.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.labels.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> u32 {
        self.labels[(row, col)]
    }

    pub fn component_count(&self) -> u32 {
        self.component_count
    }

    pub fn labels(&self) -> impl Iterator<Item = u32> {
        1..=self.component_count
    }

    pub fn component_mask(&self, label: u32) -> Mask {
        self.labels.map(|l| l == label && label != 0)
    }

    pub fn pixel_count(&self, label: u32) -> usize {
        if label == 0 {
            return 0;
        }
        self.labels.iter().filter(|l| **l == label).count()
    }

    /// Labels stretched over 0..=255 so a colour map can be applied for display.
    pub fn to_display(&self) -> GrayImage {
        if self.component_count == 0 {
            return DMatrix::zeros(self.nrows(), self.ncols());
        }
        let scale = 255.0 / self.component_count as f64;
        self.labels.map(|l| (l as f64 * scale).round().min(255.0) as u8)
    }
}

/// Two-pass union-find labeling with 4-connectivity.
///
/// Components with fewer than `min_size` pixels are dropped to background. The survivors are
/// renumbered from 1 in the order a row-major scan first meets them, so the same mask always
/// gives the same grid.
pub fn label_components(mask: &Mask, min_size: usize) -> LabelGrid {
    let rows = mask.nrows();
    let cols = mask.ncols();
    let index = |r: usize, c: usize| r * cols + c;

    // * first pass, join every foreground pixel with its north and west neighbours
    let mut uf = UnionFind::new(rows * cols);
    for r in 0..rows {
        for c in 0..cols {
            if !mask[(r, c)] {
                continue;
            }
            if r > 0 && mask[(r - 1, c)] {
                uf.union(index(r, c), index(r - 1, c));
            }
            if c > 0 && mask[(r, c - 1)] {
                uf.union(index(r, c), index(r, c - 1));
            }
        }
    }

    // * second pass, resolve roots and count pixels per root
    let mut roots: DMatrix<Option<usize>> = DMatrix::from_element(rows, cols, None);
    let mut component_sizes: HashMap<usize, usize> = HashMap::new();
    for r in 0..rows {
        for c in 0..cols {
            if mask[(r, c)] {
                let root = uf.find(index(r, c));
                roots[(r, c)] = Some(root);
                *component_sizes.entry(root).or_insert(0) += 1;
            }
        }
    }

    // * drop small components and renumber in first-encounter order
    let mut labels = DMatrix::zeros(rows, cols);
    let mut new_labels: HashMap<usize, u32> = HashMap::new();
    let mut next_label = 1;
    for r in 0..rows {
        for c in 0..cols {
            let Some(root) = roots[(r, c)] else {
                continue;
            };
            if component_sizes[&root] < min_size {
                continue;
            }
            let label = *new_labels.entry(root).or_insert_with(|| {
                let label = next_label;
                next_label += 1;
                label
            });
            labels[(r, c)] = label;
        }
    }

    log::debug!(
        "Labeled {} components, {} kept with at least {min_size} px",
        component_sizes.len(),
        new_labels.len()
    );

    LabelGrid {
        labels,
        component_count: new_labels.len() as u32,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_from(rows: &[&str]) -> Mask {
        DMatrix::from_fn(rows.len(), rows[0].len(), |r, c| rows[r].as_bytes()[c] == b'#')
    }

    #[test]
    fn separate_blobs_get_separate_labels() {
        let mask = mask_from(&["##..#", "##..#", ".....", "..###"]);
        let grid = label_components(&mask, 1);

        assert_eq!(grid.component_count(), 3);
        assert_eq!(grid.get(0, 0), 1);
        assert_eq!(grid.get(1, 1), 1);
        assert_eq!(grid.get(0, 4), 2);
        assert_eq!(grid.get(1, 4), 2);
        assert_eq!(grid.get(3, 2), 3);
        assert_eq!(grid.get(2, 2), 0);
    }

    #[test]
    fn diagonal_neighbours_are_not_connected() {
        let mask = mask_from(&["#.", ".#"]);
        let grid = label_components(&mask, 1);
        assert_eq!(grid.component_count(), 2);
        assert_ne!(grid.get(0, 0), grid.get(1, 1));
    }

    #[test]
    fn u_shape_merges_into_one_label() {
        // The two arms only meet on the last row, the first pass has to merge two roots there
        let mask = mask_from(&["#...#", "#...#", "#####"]);
        let grid = label_components(&mask, 1);
        assert_eq!(grid.component_count(), 1);
        assert_eq!(grid.get(0, 0), grid.get(0, 4));
        assert_eq!(grid.pixel_count(1), 9);
    }

    #[test]
    fn small_components_become_background() {
        let mask = mask_from(&["#....", ".....", "..###", "..###"]);
        let grid = label_components(&mask, 4);
        assert_eq!(grid.component_count(), 1);
        assert_eq!(grid.get(0, 0), 0);
        assert_eq!(grid.get(2, 2), 1);
        assert_eq!(grid.pixel_count(1), 6);
    }

    #[test]
    fn renumbering_follows_row_major_order() {
        // The blob on the right starts on an earlier row, so it has to come first
        let mask = mask_from(&["....#", "#...#", "#...."]);
        let grid = label_components(&mask, 1);
        assert_eq!(grid.get(0, 4), 1);
        assert_eq!(grid.get(1, 0), 2);
    }

    #[test]
    fn labeling_is_deterministic() {
        let mask = DMatrix::from_fn(40, 60, |r, c| (r / 7 + c / 5) % 3 == 0);
        assert_eq!(label_components(&mask, 3), label_components(&mask, 3));
    }

    #[test]
    fn empty_mask_has_no_components() {
        let grid = label_components(&DMatrix::from_element(0, 0, false), 1);
        assert_eq!(grid.component_count(), 0);
        assert_eq!(grid.labels().count(), 0);

        let grid = label_components(&DMatrix::from_element(3, 3, false), 1);
        assert_eq!(grid.to_display(), DMatrix::<u8>::zeros(3, 3));
    }

    #[test]
    fn component_mask_selects_one_label() {
        let mask = mask_from(&["#.#"]);
        let grid = label_components(&mask, 1);
        let second = grid.component_mask(2);
        assert_eq!(second, mask_from(&["..#"]));
        assert_eq!(grid.component_mask(0), mask_from(&["..."]));
    }

    #[test]
    fn display_image_stretches_labels() {
        let mask = mask_from(&["#.#"]);
        let grid = label_components(&mask, 1);
        let display = grid.to_display();
        assert_eq!(display[(0, 0)], 128);
        assert_eq!(display[(0, 1)], 0);
        assert_eq!(display[(0, 2)], 255);
    }
}

pub mod classifier;
pub mod features;
pub mod segmentation;

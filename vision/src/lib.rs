pub mod effects;
pub mod preprocess;
pub mod session;
pub mod utils;
pub mod vision;

pub use session::{analyze, Command, FrameAnalysis, FrameReport, LabelRequest, RecognitionSession, RegionClassification};
pub use utils::{ColorImage, GrayImage, Mask};
pub use vision::{
    classifier::{
        confusion::ConfusionMatrix,
        database::{FeatureDatabase, DEFAULT_DATABASE_PATH},
        Classification, Classifier, UNKNOWN_LABEL,
    },
    features::{ObjectFeatures, RegionDescriptor},
    segmentation::{label_components, LabelGrid, DEFAULT_MIN_COMPONENT_SIZE},
};

/// Tunables of the recognition chain.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionConfig {
    /// Components with fewer pixels than this are treated as background.
    pub min_component_size: usize,
    /// Value foreground pixels get in the displayed masks.
    pub threshold_max_value: u8,
    /// Side of the square structuring element used to close the mask. 0 or 1 disables closing.
    pub closing_kernel_size: usize,
    pub kmeans_max_iterations: usize,
    /// k-means stops once no centre moves more than this.
    pub kmeans_epsilon: f64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            min_component_size: DEFAULT_MIN_COMPONENT_SIZE,
            threshold_max_value: 255,
            closing_kernel_size: 3,
            kmeans_max_iterations: 10,
            kmeans_epsilon: 1.0,
        }
    }
}

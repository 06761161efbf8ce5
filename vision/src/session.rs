use crate::{
    preprocess::{close, mask_to_image, preprocess_frame},
    utils::{ColorImage, GrayImage, Mask},
    vision::{
        classifier::{
            confusion::ConfusionMatrix,
            database::{validate_label, FeatureDatabase},
            Classification, Classifier,
        },
        features::{draw_annotations, extract_features, RegionDescriptor},
        segmentation::{label_components, LabelGrid},
    },
    VisionConfig,
};

/// Keyboard commands of the live recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Store the features of every region in the database.
    Capture,
    /// Turn on the classification overlay. Stays on once enabled.
    Classify,
    /// While classifying, ask for ground truth and update the confusion matrix.
    Evaluate,
    Quit,
}

impl Command {
    pub fn from_key(key: i32) -> Option<Self> {
        match u8::try_from(key).ok()? {
            b'n' => Some(Command::Capture),
            b'c' => Some(Command::Classify),
            b'e' => Some(Command::Evaluate),
            b'q' => Some(Command::Quit),
            _ => None,
        }
    }

    /// Whether the frame carrying this command should print its classification results.
    pub fn reports_results(&self) -> bool {
        matches!(self, Command::Classify | Command::Evaluate)
    }
}

/// What a label prompt is asked for, with the region's label in the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelRequest {
    Training(u32),
    GroundTruth(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionClassification {
    pub region: u32,
    pub classification: Classification,
    pub ground_truth: Option<String>,
}

/// Everything produced for one frame, mostly for display.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub threshold: f64,
    pub mask: GrayImage,
    pub cleaned: GrayImage,
    pub labels: LabelGrid,
    pub regions: Vec<RegionDescriptor>,
    pub annotated: GrayImage,
    pub classifications: Vec<RegionClassification>,
    pub captured: usize,
    pub skipped: bool,
}

impl FrameReport {
    pub fn skipped() -> Self {
        Self {
            threshold: 0.0,
            mask: GrayImage::zeros(0, 0),
            cleaned: GrayImage::zeros(0, 0),
            labels: LabelGrid::empty(0, 0),
            regions: Vec::new(),
            annotated: GrayImage::zeros(0, 0),
            classifications: Vec::new(),
            captured: 0,
            skipped: true,
        }
    }

    /// One line summary like `Label 1: box 2: pen`, empty when nothing was classified.
    pub fn classification_text(&self) -> String {
        if self.classifications.is_empty() {
            return String::new();
        }
        let mut text = String::from("Label");
        for c in &self.classifications {
            text.push_str(&format!(" {}: {}", c.region, c.classification.label));
        }
        text
    }
}

/// State that lives for the whole run: database, confusion matrix and whether classification is on.
pub struct RecognitionSession {
    config: VisionConfig,
    database: FeatureDatabase,
    confusion: ConfusionMatrix,
    classifying: bool,
}

impl RecognitionSession {
    pub fn new(config: VisionConfig, database: FeatureDatabase) -> Self {
        Self {
            config,
            database,
            confusion: ConfusionMatrix::new(),
            classifying: false,
        }
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    pub fn database(&self) -> &FeatureDatabase {
        &self.database
    }

    pub fn database_mut(&mut self) -> &mut FeatureDatabase {
        &mut self.database
    }

    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    pub fn is_classifying(&self) -> bool {
        self.classifying
    }

    /// Console summary of a classified frame: the label line, the squared confusion matrix and the accuracy.
    pub fn results_summary(&self, report: &FrameReport) -> String {
        let mut summary = match report.classification_text() {
            text if text.is_empty() => String::from("No objects to classify"),
            text => text,
        };
        summary.push_str(&format!("\nConfusion matrix:\n{}", self.confusion));
        if let Some(accuracy) = self.confusion.accuracy() {
            summary.push_str(&format!("Accuracy: {:.1}%\n", accuracy * 100.0));
        }
        summary
    }

    /// Runs the whole chain on one frame and carries out `command`.
    ///
    /// `prompt` supplies labels for captured regions and ground truth during evaluation.
    pub fn process_frame(
        &mut self,
        frame: &ColorImage,
        command: Option<Command>,
        mut prompt: impl FnMut(LabelRequest) -> anyhow::Result<String>,
    ) -> anyhow::Result<FrameReport> {
        if frame.is_empty() {
            log::warn!("Empty frame, skipping");
            return Ok(FrameReport::skipped());
        }

        let FrameAnalysis { threshold, mask, cleaned, labels, regions } = analyze(frame, &self.config);
        log::debug!("{} regions in frame", regions.len());

        let mut captured = 0;
        if command == Some(Command::Capture) {
            for region in &regions {
                let answer = prompt(LabelRequest::Training(region.label))?;
                let label = match validate_label(&answer) {
                    Ok(label) => label,
                    Err(e) => {
                        log::warn!("Not storing region {}: {e}", region.label);
                        continue;
                    }
                };
                self.database.append(label, region.features)?;
                log::info!(
                    "Stored {label}: {:.2}% filled, aspect ratio {:.3}",
                    region.features.percent_filled,
                    region.features.aspect_ratio
                );
                captured += 1;
            }
        }

        if command == Some(Command::Classify) {
            self.classifying = true;
        }

        let mut classifications = Vec::new();
        if self.classifying {
            let classifier = Classifier::new(&self.database);
            for region in &regions {
                let classification = classifier.classify(&region.features);
                let ground_truth = if command == Some(Command::Evaluate) {
                    let answer = prompt(LabelRequest::GroundTruth(region.label))?;
                    self.evaluate(region.label, &answer, &classification)
                } else {
                    None
                };

                classifications.push(RegionClassification {
                    region: region.label,
                    classification,
                    ground_truth,
                });
            }
            self.confusion.normalize_to_square();
        }

        Ok(FrameReport {
            threshold,
            mask: mask_to_image(&mask, self.config.threshold_max_value),
            cleaned: mask_to_image(&cleaned, self.config.threshold_max_value),
            annotated: draw_annotations(&labels, &regions),
            labels,
            regions,
            classifications,
            captured,
            skipped: false,
        })
    }

    /// Records one ground truth answer, returning it trimmed. Unusable answers leave the matrix alone.
    fn evaluate(&mut self, region: u32, answer: &str, classification: &Classification) -> Option<String> {
        let truth = match validate_label(answer) {
            Ok(truth) => truth,
            Err(e) => {
                log::warn!("Not evaluating region {region}: {e}");
                return None;
            }
        };
        if truth == classification.label {
            log::info!("Region {region}: correct classification as {truth}");
        } else {
            log::info!("Region {region}: classified as {} but is {truth}", classification.label);
        }
        self.confusion.record(truth, &classification.label);
        Some(truth.to_string())
    }
}

/// Intermediate results of the recognition chain for one frame.
#[derive(Debug, Clone)]
pub struct FrameAnalysis {
    pub threshold: f64,
    pub mask: Mask,
    pub cleaned: Mask,
    pub labels: LabelGrid,
    pub regions: Vec<RegionDescriptor>,
}

/// Preprocess, clean, label and describe one frame.
pub fn analyze(frame: &ColorImage, config: &VisionConfig) -> FrameAnalysis {
    let preprocessed = preprocess_frame(frame, config);
    let cleaned = close(&preprocessed.mask, config.closing_kernel_size);
    let labels = label_components(&cleaned, config.min_component_size);
    let regions = extract_features(&labels);

    FrameAnalysis {
        threshold: preprocessed.threshold,
        mask: preprocessed.mask,
        cleaned,
        labels,
        regions,
    }
}

#[cfg(test)]
mod tests {
    use nalgebra::{DMatrix, Vector3};

    use super::*;

    fn config() -> VisionConfig {
        VisionConfig {
            min_component_size: 50,
            ..VisionConfig::default()
        }
    }

    /// Light background with a dark square above a dark bar.
    fn scene() -> ColorImage {
        DMatrix::from_fn(80, 100, |r, c| {
            let square = (10..30).contains(&r) && (10..30).contains(&c);
            let bar = (50..60).contains(&r) && (40..80).contains(&c);
            if square || bar {
                Vector3::new(30, 30, 30)
            } else {
                Vector3::new(200, 200, 200)
            }
        })
    }

    fn session(dir: &tempfile::TempDir) -> RecognitionSession {
        RecognitionSession::new(config(), FeatureDatabase::new(dir.path().join("object_db.txt")))
    }

    fn by_region(request: LabelRequest) -> anyhow::Result<String> {
        let region = match request {
            LabelRequest::Training(region) | LabelRequest::GroundTruth(region) => region,
        };
        Ok(if region == 1 { "box" } else { "pen" }.to_string())
    }

    #[test]
    fn keys_map_to_commands() {
        assert_eq!(Command::from_key('n' as i32), Some(Command::Capture));
        assert_eq!(Command::from_key('c' as i32), Some(Command::Classify));
        assert_eq!(Command::from_key('e' as i32), Some(Command::Evaluate));
        assert_eq!(Command::from_key('q' as i32), Some(Command::Quit));
        assert_eq!(Command::from_key('x' as i32), None);
        assert_eq!(Command::from_key(-1), None);
    }

    #[test]
    fn classify_and_evaluate_frames_report_results() {
        assert!(Command::Classify.reports_results());
        assert!(Command::Evaluate.reports_results());
        assert!(!Command::Capture.reports_results());
        assert!(!Command::Quit.reports_results());
    }

    #[test]
    fn results_summary_lists_labels_then_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.process_frame(&scene(), Some(Command::Capture), by_region).unwrap();

        let report = session.process_frame(&scene(), Some(Command::Classify), by_region).unwrap();
        assert_eq!(session.results_summary(&report), "Label 1: box 2: pen\nConfusion matrix:\n");

        let report = session.process_frame(&scene(), Some(Command::Evaluate), by_region).unwrap();
        assert_eq!(
            session.results_summary(&report),
            "Label 1: box 2: pen\nConfusion matrix:\nbox: box=1 pen=0\npen: box=0 pen=1\nAccuracy: 100.0%\n"
        );

        let empty = ColorImage::from_element(20, 20, Vector3::new(200, 200, 200));
        let report = session.process_frame(&empty, Some(Command::Classify), by_region).unwrap();
        assert!(session.results_summary(&report).starts_with("No objects to classify\n"));
    }

    #[test]
    fn empty_frame_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let report = session
            .process_frame(&ColorImage::from_element(0, 0, Vector3::new(0, 0, 0)), Some(Command::Capture), |_| {
                panic!("no regions to label")
            })
            .unwrap();
        assert!(report.skipped);
        assert!(session.database().is_empty());
    }

    #[test]
    fn analysis_finds_both_objects() {
        let analysis = analyze(&scene(), &config());
        assert!(analysis.threshold > 30.0 && analysis.threshold < 200.0);
        assert_eq!(analysis.labels.component_count(), 2);
        assert_eq!(analysis.regions.len(), 2);
        assert!(analysis.regions[1].features.aspect_ratio > analysis.regions[0].features.aspect_ratio);
    }

    #[test]
    fn capture_stores_every_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut asked = Vec::new();
        let report = session
            .process_frame(&scene(), Some(Command::Capture), |request| {
                asked.push(request);
                by_region(request)
            })
            .unwrap();

        assert_eq!(asked, vec![LabelRequest::Training(1), LabelRequest::Training(2)]);
        assert_eq!(report.captured, 2);
        assert!(report.classifications.is_empty());
        assert_eq!(session.database().len(), 2);

        // Records reach the file too
        let reloaded = FeatureDatabase::load(dir.path().join("object_db.txt")).unwrap();
        assert_eq!(reloaded.get("box"), session.database().get("box"));
    }

    #[test]
    fn classification_stays_on_and_evaluation_fills_confusion() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.process_frame(&scene(), Some(Command::Capture), by_region).unwrap();

        let report = session
            .process_frame(&scene(), None, |_| panic!("no prompt without a command"))
            .unwrap();
        assert!(report.classifications.is_empty());

        session.process_frame(&scene(), Some(Command::Classify), by_region).unwrap();
        assert!(session.is_classifying());

        let report = session
            .process_frame(&scene(), None, |_| panic!("no prompt while only classifying"))
            .unwrap();
        assert_eq!(report.classification_text(), "Label 1: box 2: pen");
        assert!(session.confusion().is_empty());

        let report = session.process_frame(&scene(), Some(Command::Evaluate), by_region).unwrap();
        assert_eq!(report.classifications[0].ground_truth.as_deref(), Some("box"));
        assert_eq!(session.confusion().count("box", "box"), 1);
        assert_eq!(session.confusion().count("pen", "pen"), 1);
        assert_eq!(session.confusion().accuracy(), Some(1.0));
    }

    #[test]
    fn evaluate_without_classification_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let report = session
            .process_frame(&scene(), Some(Command::Evaluate), |_| panic!("not classifying"))
            .unwrap();
        assert!(report.classifications.is_empty());
        assert!(session.confusion().is_empty());
    }

    #[test]
    fn unusable_training_label_skips_only_that_region() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let mut asked = Vec::new();
        let report = session
            .process_frame(&scene(), Some(Command::Capture), |request| {
                asked.push(request);
                Ok(if asked.len() == 1 { "a,b" } else { "pen" }.to_string())
            })
            .unwrap();

        assert_eq!(asked, vec![LabelRequest::Training(1), LabelRequest::Training(2)]);
        assert_eq!(report.captured, 1);
        assert!(!report.skipped);
        assert_eq!(session.database().len(), 1);
        assert!(session.database().get("pen").is_some());
    }

    #[test]
    fn ground_truth_is_trimmed_and_blank_answers_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        session.process_frame(&scene(), Some(Command::Capture), by_region).unwrap();
        session.process_frame(&scene(), Some(Command::Classify), by_region).unwrap();

        let report = session
            .process_frame(&scene(), Some(Command::Evaluate), |request| {
                Ok(match request {
                    LabelRequest::GroundTruth(1) => "  box ".to_string(),
                    _ => "   ".to_string(),
                })
            })
            .unwrap();

        assert_eq!(report.classifications[0].ground_truth.as_deref(), Some("box"));
        assert_eq!(report.classifications[1].ground_truth, None);
        assert_eq!(session.confusion().total(), 1);
        assert_eq!(session.confusion().count("box", "box"), 1);
        assert!(!session.confusion().labels().iter().any(|l| l.trim().is_empty()));
    }

    #[test]
    fn prompt_errors_propagate() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session(&dir);
        let result = session.process_frame(&scene(), Some(Command::Capture), |_| anyhow::bail!("stdin closed"));
        assert!(result.is_err());
        assert!(session.database().is_empty());
    }
}

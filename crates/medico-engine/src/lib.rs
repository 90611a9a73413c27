use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use medico_contracts::forms::AnswerMap;
use medico_contracts::panels::PanelSpec;
use medico_contracts::schema::FeatureSchema;
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Binary class label mapped from a classifier's raw output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Negative,
    Positive,
}

impl Verdict {
    pub fn is_positive(&self) -> bool {
        matches!(self, Verdict::Positive)
    }

    pub fn label(&self) -> i64 {
        match self {
            Verdict::Negative => 0,
            Verdict::Positive => 1,
        }
    }
}

/// The one capability a trained model exposes: an ordered numeric vector
/// in, a class label out.
pub trait Classifier: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> &'static str;
    fn n_features(&self) -> usize;
    fn predict(&self, features: &[f64]) -> Result<i64>;
}

/// Linear decision rule: label 1 when `w . x + b >= 0`.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weights: Vec<f64>,
    bias: f64,
}

impl Classifier for LinearClassifier {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn n_features(&self) -> usize {
        self.weights.len()
    }

    fn predict(&self, features: &[f64]) -> Result<i64> {
        if features.len() != self.weights.len() {
            bail!(
                "linear model expects {} features, got {}",
                self.weights.len(),
                features.len()
            );
        }
        let score: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(weight, value)| weight * value)
            .sum::<f64>()
            + self.bias;
        Ok(if score >= 0.0 { 1 } else { 0 })
    }
}

/// Axis-aligned decision tree; splits go left when
/// `x[feature] <= threshold`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        label: i64,
    },
}

#[derive(Debug, Clone)]
pub struct TreeClassifier {
    n_features: usize,
    root: TreeNode,
}

impl Classifier for TreeClassifier {
    fn kind(&self) -> &'static str {
        "tree"
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<i64> {
        if features.len() != self.n_features {
            bail!(
                "tree model expects {} features, got {}",
                self.n_features,
                features.len()
            );
        }
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { label } => return Ok(*label),
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let Some(value) = features.get(*feature) else {
                        bail!("tree split references feature index {feature} out of range");
                    };
                    node = if *value <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// On-disk artifact shapes. Artifacts are produced offline by the training
/// tooling; this crate only deserializes them.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelArtifact {
    Linear { weights: Vec<f64>, bias: f64 },
    Tree { n_features: usize, root: TreeNode },
}

impl ModelArtifact {
    fn into_classifier(self) -> Result<Box<dyn Classifier>> {
        match self {
            ModelArtifact::Linear { weights, bias } => {
                if weights.is_empty() {
                    bail!("linear model has no weights");
                }
                Ok(Box::new(LinearClassifier { weights, bias }))
            }
            ModelArtifact::Tree { n_features, root } => {
                if n_features == 0 {
                    bail!("tree model declares zero features");
                }
                Ok(Box::new(TreeClassifier { n_features, root }))
            }
        }
    }
}

/// Read and parse one model artifact, returning the classifier and the
/// sha256 hex digest of the artifact bytes.
pub fn load_classifier(path: &Path) -> Result<(Box<dyn Classifier>, String)> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read model artifact {}", path.display()))?;
    let digest = artifact_digest(&bytes);
    let artifact: ModelArtifact = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse model artifact {}", path.display()))?;
    Ok((artifact.into_classifier()?, digest))
}

fn artifact_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct LoadedModel {
    pub panel_id: String,
    pub path: PathBuf,
    pub digest: String,
    classifier: Box<dyn Classifier>,
}

impl LoadedModel {
    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }
}

/// One artifact that failed to load at startup. Recoverable: the panel
/// stays reachable and dispatch against it reports a prediction error.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub panel_id: String,
    pub path: PathBuf,
    pub message: String,
}

/// Mapping from panel id to loaded classifier, built once at startup and
/// immutable afterwards.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: IndexMap<String, LoadedModel>,
}

impl ModelRegistry {
    /// Attempt to load every panel's artifact from `models_dir`. Failures
    /// are collected per panel, never fatal; failed ids are absent from
    /// the registry.
    pub fn load(models_dir: &Path, panels: &[PanelSpec]) -> (Self, Vec<LoadFailure>) {
        let mut models = IndexMap::new();
        let mut failures = Vec::new();
        for panel in panels {
            let path = models_dir.join(panel.model_file);
            match load_classifier(&path) {
                Ok((classifier, digest)) => {
                    models.insert(
                        panel.id.to_string(),
                        LoadedModel {
                            panel_id: panel.id.to_string(),
                            path,
                            digest,
                            classifier,
                        },
                    );
                }
                Err(err) => failures.push(LoadFailure {
                    panel_id: panel.id.to_string(),
                    path,
                    message: format!("{err:#}"),
                }),
            }
        }
        (Self { models }, failures)
    }

    pub fn get(&self, panel_id: &str) -> Option<&LoadedModel> {
        self.models.get(panel_id)
    }

    pub fn classifier(&self, panel_id: &str) -> Option<&dyn Classifier> {
        self.models.get(panel_id).map(|model| model.classifier())
    }

    pub fn contains(&self, panel_id: &str) -> bool {
        self.models.contains_key(panel_id)
    }

    pub fn models(&self) -> impl Iterator<Item = &LoadedModel> {
        self.models.values()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Coerce the collected answers into the input vector in schema order and
/// run the classifier.
///
/// Every failure mode (absent model, missing answer, arity mismatch,
/// inference error, out-of-range label) is an `Err`; the caller withholds
/// the verdict and reports the message. Nothing panics past this boundary.
pub fn predict_panel(
    classifier: Option<&dyn Classifier>,
    schema: &FeatureSchema,
    answers: &AnswerMap,
) -> Result<Verdict> {
    let Some(classifier) = classifier else {
        bail!("no trained model loaded for this panel");
    };

    let mut vector = Vec::with_capacity(schema.len());
    for name in schema.feature_names() {
        match answers.get(name.as_str()) {
            Some(value) => vector.push(value.as_f64()),
            None => bail!("missing value for feature '{name}'"),
        }
    }

    if classifier.n_features() != vector.len() {
        bail!(
            "model expects {} features, schema provides {}",
            classifier.n_features(),
            vector.len()
        );
    }

    match classifier.predict(&vector)? {
        0 => Ok(Verdict::Negative),
        1 => Ok(Verdict::Positive),
        other => bail!("classifier returned unexpected label {other}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use indexmap::IndexMap;
    use medico_contracts::forms::{render_widgets, AnswerMap, RawValue};
    use medico_contracts::panels::PANELS;
    use medico_contracts::schema::{FeatureSchema, FeatureSpec};
    use serde_json::json;

    use super::{
        load_classifier, predict_panel, Classifier, LinearClassifier, ModelRegistry, Verdict,
    };

    fn age_sex_schema() -> FeatureSchema {
        let mut features = IndexMap::new();
        features.insert(
            "age".to_string(),
            FeatureSpec {
                description: "Age in years".to_string(),
                choices: None,
            },
        );
        features.insert(
            "sex".to_string(),
            FeatureSpec {
                description: "Sex of the person".to_string(),
                choices: Some(vec!["Male".to_string(), "Female".to_string()]),
            },
        );
        FeatureSchema::new(features)
    }

    #[derive(Debug)]
    struct Probe {
        n_features: usize,
        label: i64,
        seen: Mutex<Vec<Vec<f64>>>,
    }

    impl Probe {
        fn new(n_features: usize, label: i64) -> Self {
            Self {
                n_features,
                label,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl Classifier for Probe {
        fn kind(&self) -> &'static str {
            "probe"
        }

        fn n_features(&self) -> usize {
            self.n_features
        }

        fn predict(&self, features: &[f64]) -> anyhow::Result<i64> {
            self.seen.lock().unwrap().push(features.to_vec());
            Ok(self.label)
        }
    }

    #[test]
    fn dispatch_builds_vector_in_schema_order() -> anyhow::Result<()> {
        let schema = age_sex_schema();
        let widgets = render_widgets(&schema);
        let mut answers = AnswerMap::new();
        // Insert out of schema order on purpose.
        answers.insert("sex".to_string(), widgets[1].parse_response("Female")?);
        answers.insert("age".to_string(), widgets[0].parse_response("50")?);

        let probe = Probe::new(2, 1);
        let verdict = predict_panel(Some(&probe), &schema, &answers)?;
        assert_eq!(verdict, Verdict::Positive);
        assert!(verdict.is_positive());
        assert_eq!(*probe.seen.lock().unwrap(), vec![vec![50.0, 1.0]]);
        Ok(())
    }

    #[test]
    fn dispatch_is_idempotent_for_unchanged_input() -> anyhow::Result<()> {
        let schema = age_sex_schema();
        let mut answers = AnswerMap::new();
        answers.insert("age".to_string(), RawValue::Number(50.0));
        answers.insert("sex".to_string(), RawValue::Choice(1));

        let probe = Probe::new(2, 0);
        predict_panel(Some(&probe), &schema, &answers)?;
        predict_panel(Some(&probe), &schema, &answers)?;
        let seen = probe.seen.lock().unwrap();
        assert_eq!(seen[0], seen[1]);
        Ok(())
    }

    #[test]
    fn dispatch_without_model_is_a_prediction_error() {
        let schema = age_sex_schema();
        let err = predict_panel(None, &schema, &AnswerMap::new())
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("no trained model"), "unexpected error: {err}");
    }

    #[test]
    fn dispatch_reports_missing_answers_and_arity_mismatch() {
        let schema = age_sex_schema();
        let probe = Probe::new(2, 0);

        let mut partial = AnswerMap::new();
        partial.insert("age".to_string(), RawValue::Number(50.0));
        let err = predict_panel(Some(&probe), &schema, &partial)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("missing value for feature 'sex'"), "unexpected error: {err}");

        let narrow = Probe::new(5, 0);
        let mut full = partial;
        full.insert("sex".to_string(), RawValue::Choice(0));
        let err = predict_panel(Some(&narrow), &schema, &full)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("expects 5 features"), "unexpected error: {err}");
    }

    #[test]
    fn out_of_range_label_is_a_prediction_error() {
        let schema = age_sex_schema();
        let mut answers = AnswerMap::new();
        answers.insert("age".to_string(), RawValue::Number(1.0));
        answers.insert("sex".to_string(), RawValue::Choice(0));
        let probe = Probe::new(2, 2);
        let err = predict_panel(Some(&probe), &schema, &answers)
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("unexpected label 2"), "unexpected error: {err}");
    }

    #[test]
    fn linear_classifier_splits_on_sign() -> anyhow::Result<()> {
        let model = LinearClassifier {
            weights: vec![1.0, -2.0],
            bias: -1.0,
        };
        assert_eq!(model.predict(&[5.0, 1.0])?, 1);
        assert_eq!(model.predict(&[1.0, 1.0])?, 0);
        assert!(model.predict(&[1.0]).is_err());
        Ok(())
    }

    #[test]
    fn tree_artifact_round_trips_through_loader() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("tree_model.json");
        std::fs::write(
            &path,
            serde_json::to_string_pretty(&json!({
                "kind": "tree",
                "n_features": 2,
                "root": {
                    "feature": 0,
                    "threshold": 40.0,
                    "left": {"label": 0},
                    "right": {
                        "feature": 1,
                        "threshold": 0.5,
                        "left": {"label": 0},
                        "right": {"label": 1}
                    }
                }
            }))?,
        )?;

        let (classifier, digest) = load_classifier(&path)?;
        assert_eq!(classifier.kind(), "tree");
        assert_eq!(classifier.n_features(), 2);
        assert_eq!(digest.len(), 64);
        assert_eq!(classifier.predict(&[30.0, 1.0])?, 0);
        assert_eq!(classifier.predict(&[50.0, 0.0])?, 0);
        assert_eq!(classifier.predict(&[50.0, 1.0])?, 1);
        Ok(())
    }

    #[test]
    fn loader_rejects_unknown_kind() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("odd_model.json");
        std::fs::write(&path, json!({"kind": "svm", "weights": [1.0]}).to_string())?;
        let err = load_classifier(&path)
            .err()
            .map(|err| format!("{err:#}"))
            .unwrap_or_default();
        assert!(err.contains("failed to parse model artifact"), "unexpected error: {err}");
        Ok(())
    }

    #[test]
    fn registry_reports_missing_artifacts_without_aborting() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let linear = json!({"kind": "linear", "weights": [0.1], "bias": 0.0}).to_string();
        std::fs::write(temp.path().join("heart_model.json"), &linear)?;
        std::fs::write(temp.path().join("diabetes_model.json"), &linear)?;
        // parkinsons_model.json intentionally absent.

        let (registry, failures) = ModelRegistry::load(temp.path(), PANELS);
        assert_eq!(registry.len(), 2);
        // Registry and its boxed classifiers are debug-printable.
        assert!(format!("{registry:?}").contains("heart"));
        assert!(registry.contains("heart"));
        assert!(registry.classifier("diabetes").is_some());
        assert!(!registry.contains("parkinsons"));

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].panel_id, "parkinsons");
        assert!(failures[0].message.contains("failed to read model artifact"));

        // A missing model still dispatches as a recoverable error.
        let schema = age_sex_schema();
        assert!(predict_panel(registry.classifier("parkinsons"), &schema, &AnswerMap::new()).is_err());
        Ok(())
    }
}

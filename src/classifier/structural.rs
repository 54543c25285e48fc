use std::io::ErrorKind;
use std::path::Path;

use linfa::prelude::*;
use linfa::Dataset;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{arr2, Array1, Ix1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::ProbabilityModel;
use crate::config::ModelConfig;
use crate::error::ModelError;
use crate::models::{FeatureVector, N_FEATURES};

/// Bumped whenever the artifact layout or the feature order changes.
pub const FORMAT_VERSION: u32 = 2;

type Tree = DecisionTree<f64, usize>;

/// Class index of phishing rows in the training targets.
const PHISHING: usize = 1;

/// On-disk form of a trained structural model.
#[derive(Deserialize)]
struct ModelArtifact {
    format_version: u32,
    n_features: usize,
    trees: Vec<Tree>,
}

#[derive(Serialize)]
struct ModelArtifactRef<'a> {
    format_version: u32,
    n_features: usize,
    trees: &'a [Tree],
}

/// How the classifier reached its ready state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    Loaded,
    Trained,
}

impl std::fmt::Display for ModelOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelOrigin::Loaded => write!(f, "loaded"),
            ModelOrigin::Trained => write!(f, "trained"),
        }
    }
}

/// Bagged `linfa-trees` ensemble over [`FeatureVector`]s. Immutable once built.
pub struct StructuralClassifier {
    trees: Vec<Tree>,
    origin: ModelOrigin,
}

impl StructuralClassifier {
    /// Load the persisted model, or train and persist a new one when the
    /// artifact is missing, unreadable, or incompatible.
    pub fn load_or_train(config: &ModelConfig) -> Result<Self, ModelError> {
        let path = config.path.display();
        match Self::load(&config.path) {
            Ok(classifier) => {
                info!(%path, "Loaded existing structural model");
                Ok(classifier)
            }
            Err(ModelError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                info!(%path, "No structural model found, training on synthetic data");
                Self::train_and_persist(config)
            }
            Err(e) => {
                warn!(%path, error = %e, "Error loading structural model, retraining");
                Self::train_and_persist(config)
            }
        }
    }

    /// Train on the synthetic fixture and write the artifact. A failed write is
    /// logged; the freshly trained model is still returned.
    pub fn train_and_persist(config: &ModelConfig) -> Result<Self, ModelError> {
        let classifier = Self::train(config.n_estimators, config.seed)?;
        let path = config.path.display();
        match classifier.save(&config.path) {
            Ok(()) => info!(%path, trees = config.n_estimators, "Structural model trained and saved"),
            Err(e) => warn!(%path, error = %e, "Structural model trained but not saved"),
        }
        Ok(classifier)
    }

    /// Fit `n_estimators` Gini trees, each on a bootstrap resample of the
    /// fixture. Deterministic for a given `seed`.
    pub fn train(n_estimators: usize, seed: u64) -> Result<Self, ModelError> {
        if n_estimators == 0 {
            return Err(ModelError::Training(
                "ensemble needs at least one tree".to_string(),
            ));
        }

        let dataset = training_data();
        let mut rng = StdRng::seed_from_u64(seed);
        let params = DecisionTree::params()
            .split_quality(SplitQuality::Gini)
            .max_depth(None);

        let trees = dataset
            .bootstrap_samples(dataset.records().nrows(), &mut rng)
            .take(n_estimators)
            .map(|sample| {
                params
                    .fit(&sample)
                    .map_err(|e| ModelError::Training(e.to_string()))
            })
            .collect::<Result<Vec<Tree>, ModelError>>()?;

        Ok(StructuralClassifier {
            trees,
            origin: ModelOrigin::Trained,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = std::fs::read(path).map_err(|e| ModelError::io(path, e))?;
        let artifact: ModelArtifact = serde_json::from_slice(&bytes)?;

        if artifact.format_version != FORMAT_VERSION {
            return Err(ModelError::Incompatible(format!(
                "format version {} (expected {})",
                artifact.format_version, FORMAT_VERSION
            )));
        }
        if artifact.n_features != N_FEATURES {
            return Err(ModelError::Incompatible(format!(
                "{} features (expected {})",
                artifact.n_features, N_FEATURES
            )));
        }
        if artifact.trees.is_empty() {
            return Err(ModelError::Incompatible("ensemble has no trees".to_string()));
        }
        if artifact
            .trees
            .iter()
            .any(|t| t.features().iter().any(|&f| f >= N_FEATURES))
        {
            return Err(ModelError::Incompatible(
                "split on a feature index out of range".to_string(),
            ));
        }

        Ok(StructuralClassifier {
            trees: artifact.trees,
            origin: ModelOrigin::Loaded,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::io(parent, e))?;
        }
        let artifact = ModelArtifactRef {
            format_version: FORMAT_VERSION,
            n_features: N_FEATURES,
            trees: &self.trees,
        };
        let json = serde_json::to_vec_pretty(&artifact)?;
        std::fs::write(path, json).map_err(|e| ModelError::io(path, e))
    }

    /// Probability that the URL behind `features` is malicious.
    ///
    /// Trees are grown until their leaves are pure, so the share of trees
    /// voting phishing equals the mean leaf probability.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        let record = arr2(&[features.to_array()]);
        let votes = self
            .trees
            .iter()
            .filter(|tree| {
                let labels: Array1<usize> = tree.predict(&record);
                labels.get(0) == Some(&PHISHING)
            })
            .count();
        (votes as f64 / self.trees.len() as f64).clamp(0.0, 1.0)
    }

    pub fn origin(&self) -> ModelOrigin {
        self.origin
    }
}

impl ProbabilityModel for StructuralClassifier {
    type Input = FeatureVector;

    fn probability(&self, input: &FeatureVector) -> f64 {
        self.predict(input)
    }
}

/// Synthetic calibration set: five legitimate rows (target 0) followed by
/// five phishing rows (target 1).
const TRAINING_ROWS: [[f64; N_FEATURES]; 10] = [
    [20.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0], // https://google.com
    [25.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0], // https://facebook.com
    [30.0, 3.0, 2.0, 0.0, 0.0, 1.0, 0.0, 0.0], // https://mail.google.com
    [15.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0], // http://example.com
    [40.0, 2.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0], // https://stack-overflow.com
    [60.0, 4.0, 3.0, 1.0, 1.0, 0.0, 1.0, 1.0], // http://192.168.1.1/login...
    [80.0, 5.0, 4.0, 0.0, 1.0, 0.0, 0.0, 1.0], // http://secure-login.bank.com.update-info...
    [55.0, 3.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0], // ftp://phishing@site.com
    [90.0, 6.0, 5.0, 1.0, 1.0, 0.0, 0.0, 1.0], // http://10.0.0.1/verify-account...
    [70.0, 4.0, 3.0, 0.0, 1.0, 0.0, 0.0, 1.0], // http://apple-id-verify.com.suspicious.net
];

const TRAINING_TARGETS: [usize; 10] = [0, 0, 0, 0, 0, 1, 1, 1, 1, 1];

pub fn training_data() -> Dataset<f64, usize, Ix1> {
    Dataset::new(arr2(&TRAINING_ROWS), Array1::from(TRAINING_TARGETS.to_vec()))
}

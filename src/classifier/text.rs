use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::bert::{BertSpamClassifier, ModelFiles};
use super::{ProbabilityModel, NEUTRAL_SCORE};
use crate::config::TextConfig;
use crate::error::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextLabel {
    /// Malicious / phishing / spam.
    Spam,
    /// Benign.
    Ham,
}

/// A label and the classifier's confidence in that label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: TextLabel,
    pub confidence: f64,
}

pub trait TextClassifier: Send + Sync {
    /// Short backend name reported by the health endpoint.
    fn name(&self) -> &'static str {
        "custom"
    }

    fn classify(&self, text: &str) -> Result<Classification, ModelError>;
}

/// Lexicon file layout:
///
/// ```toml
/// bias = -1.5
///
/// [weights]
/// login = 1.2
/// wikipedia = -1.0
/// ```
#[derive(Debug, Deserialize)]
struct LexiconFile {
    bias: f64,
    #[serde(default)]
    weights: HashMap<String, f64>,
}

const BUILTIN_BIAS: f64 = -1.5;

const BUILTIN_WEIGHTS: &[(&str, f64)] = &[
    ("login", 1.2),
    ("signin", 1.2),
    ("logon", 1.0),
    ("verify", 1.4),
    ("verification", 1.2),
    ("validate", 1.0),
    ("account", 0.8),
    ("secure", 0.9),
    ("security", 0.6),
    ("update", 0.8),
    ("confirm", 1.0),
    ("password", 1.4),
    ("credential", 1.2),
    ("bank", 0.9),
    ("banking", 0.9),
    ("billing", 0.9),
    ("invoice", 0.6),
    ("wallet", 0.8),
    ("paypal", 1.2),
    ("suspended", 1.5),
    ("locked", 1.2),
    ("unlock", 1.0),
    ("urgent", 1.5),
    ("alert", 0.8),
    ("free", 1.2),
    ("win", 1.2),
    ("winner", 1.5),
    ("prize", 1.5),
    ("claim", 1.2),
    ("bonus", 1.0),
    ("gift", 1.0),
    ("reward", 1.0),
    ("webscr", 1.5),
    ("exe", 1.0),
    ("tinyurl", 1.0),
    ("wikipedia", -1.0),
    ("github", -0.8),
    ("google", -0.6),
    ("docs", -0.4),
];

/// Logistic scorer over keyword hits: `p = sigmoid(bias + Σ weight(token))`.
#[derive(Debug)]
pub struct LexiconClassifier {
    bias: f64,
    weights: HashMap<String, f64>,
    token_re: Regex,
}

impl LexiconClassifier {
    pub fn new(bias: f64, weights: HashMap<String, f64>) -> Result<Self, ModelError> {
        if !bias.is_finite() {
            return Err(ModelError::Lexicon(format!("bias {} is not finite", bias)));
        }
        if let Some((token, w)) = weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(ModelError::Lexicon(format!(
                "weight {} for '{}' is not finite",
                w, token
            )));
        }

        let token_re =
            Regex::new(r"[a-z0-9]+").map_err(|e| ModelError::Lexicon(e.to_string()))?;

        Ok(LexiconClassifier {
            bias,
            weights: weights
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
            token_re,
        })
    }

    pub fn builtin() -> Result<Self, ModelError> {
        let weights = BUILTIN_WEIGHTS
            .iter()
            .map(|&(token, w)| (token.to_string(), w))
            .collect();
        Self::new(BUILTIN_BIAS, weights)
    }

    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|e| ModelError::io(path, e))?;
        let lexicon: LexiconFile =
            toml::from_str(&content).map_err(|e| ModelError::Lexicon(e.to_string()))?;
        Self::new(lexicon.bias, lexicon.weights)
    }

    fn logit(&self, text: &str) -> f64 {
        let lower = text.to_lowercase();
        self.bias
            + self
                .token_re
                .find_iter(&lower)
                .filter_map(|m| self.weights.get(m.as_str()))
                .sum::<f64>()
    }
}

impl TextClassifier for LexiconClassifier {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn classify(&self, text: &str) -> Result<Classification, ModelError> {
        let p = sigmoid(self.logit(text));
        if !p.is_finite() {
            return Err(ModelError::Inference(format!("non-finite score {}", p)));
        }

        Ok(if p >= 0.5 {
            Classification {
                label: TextLabel::Spam,
                confidence: p,
            }
        } else {
            Classification {
                label: TextLabel::Ham,
                confidence: 1.0 - p,
            }
        })
    }
}

fn load_transformer(config: &TextConfig) -> Result<BertSpamClassifier, ModelError> {
    let files = match &config.model_dir {
        Some(dir) => ModelFiles::in_dir(dir)?,
        None => ModelFiles::in_hf_cache(&config.model_id)?,
    };
    BertSpamClassifier::load(&files)
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Turns a [`TextClassifier`] verdict into a risk probability.
///
/// Returns [`NEUTRAL_SCORE`] whenever there is no usable signal: no
/// classifier, empty text, or a classifier failure.
pub struct TextRiskAnalyzer {
    classifier: Option<Box<dyn TextClassifier>>,
    max_chars: usize,
}

impl TextRiskAnalyzer {
    pub fn new(classifier: Box<dyn TextClassifier>, max_chars: usize) -> Self {
        TextRiskAnalyzer {
            classifier: Some(classifier),
            max_chars,
        }
    }

    pub fn unavailable(max_chars: usize) -> Self {
        TextRiskAnalyzer {
            classifier: None,
            max_chars,
        }
    }

    /// Build the analyzer described by `config`: the BERT model when
    /// `transformer` is on and a snapshot can be loaded, otherwise the
    /// lexicon. Initialization failures are logged and leave the analyzer
    /// unavailable rather than failing startup.
    pub fn from_config(config: &TextConfig) -> Self {
        if !config.enabled {
            info!("Text classifier disabled");
            return Self::unavailable(config.max_chars);
        }

        if config.transformer {
            match load_transformer(config) {
                Ok(classifier) => {
                    info!(model = %config.model_id, "Transformer text classifier loaded");
                    return Self::new(Box::new(classifier), config.max_chars);
                }
                Err(e) => warn!(error = %e, "Transformer unavailable, falling back to lexicon"),
            }
        }

        let loaded = match &config.lexicon {
            Some(path) => LexiconClassifier::from_file(path),
            None => LexiconClassifier::builtin(),
        };

        match loaded {
            Ok(classifier) => {
                let source = config
                    .lexicon
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "builtin".to_string());
                info!(lexicon = %source, "Text classifier loaded");
                Self::new(Box::new(classifier), config.max_chars)
            }
            Err(e) => {
                warn!(error = %e, "Error loading text classifier, using neutral score");
                Self::unavailable(config.max_chars)
            }
        }
    }

    /// Name of the active classifier, if any.
    pub fn backend(&self) -> Option<&'static str> {
        self.classifier.as_ref().map(|c| c.name())
    }

    /// Probability that `text` signals phishing intent.
    pub fn analyze(&self, text: &str) -> f64 {
        let Some(classifier) = &self.classifier else {
            return NEUTRAL_SCORE;
        };
        if text.is_empty() {
            return NEUTRAL_SCORE;
        }

        let end = text
            .char_indices()
            .nth(self.max_chars)
            .map(|(i, _)| i)
            .unwrap_or(text.len());
        let input = &text[..end];

        let outcome = catch_unwind(AssertUnwindSafe(|| classifier.classify(input)));
        match outcome {
            Ok(Ok(Classification { label, confidence })) => {
                let confidence = confidence.clamp(0.0, 1.0);
                debug!(?label, confidence, "Text classified");
                match label {
                    TextLabel::Spam => confidence,
                    TextLabel::Ham => 1.0 - confidence,
                }
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Text classification failed, using neutral score");
                NEUTRAL_SCORE
            }
            Err(_) => {
                warn!("Text classifier panicked, using neutral score");
                NEUTRAL_SCORE
            }
        }
    }
}

impl ProbabilityModel for TextRiskAnalyzer {
    type Input = str;

    fn probability(&self, input: &str) -> f64 {
        self.analyze(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use crate::classifier::bert::tests::write_tiny_model;
    use std::sync::Arc;
    use tempfile::tempdir;

    struct Fixed(Classification);

    impl TextClassifier for Fixed {
        fn classify(&self, _text: &str) -> Result<Classification, ModelError> {
            Ok(self.0)
        }
    }

    struct Failing;

    impl TextClassifier for Failing {
        fn classify(&self, _text: &str) -> Result<Classification, ModelError> {
            Err(ModelError::Inference("boom".to_string()))
        }
    }

    struct Panicking;

    impl TextClassifier for Panicking {
        fn classify(&self, _text: &str) -> Result<Classification, ModelError> {
            panic!("classifier crashed")
        }
    }

    struct Recording(Arc<AtomicUsize>);

    impl TextClassifier for Recording {
        fn classify(&self, text: &str) -> Result<Classification, ModelError> {
            self.0.store(text.chars().count(), Ordering::SeqCst);
            Ok(Classification {
                label: TextLabel::Spam,
                confidence: 0.9,
            })
        }
    }

    fn fixed(label: TextLabel, confidence: f64) -> TextRiskAnalyzer {
        TextRiskAnalyzer::new(Box::new(Fixed(Classification { label, confidence })), 512)
    }

    #[test]
    fn test_neutral_when_unavailable_or_empty() {
        let unavailable = TextRiskAnalyzer::unavailable(512);
        assert_eq!(unavailable.analyze(""), 0.5);
        assert_eq!(unavailable.analyze("URL: http://10.0.0.1/verify"), 0.5);

        assert_eq!(fixed(TextLabel::Spam, 0.99).analyze(""), 0.5);
    }

    #[test]
    fn test_label_mapping() {
        assert_eq!(fixed(TextLabel::Spam, 0.8).analyze("x"), 0.8);
        assert!((fixed(TextLabel::Ham, 0.8).analyze("x") - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_failures_degrade_to_neutral() {
        assert_eq!(TextRiskAnalyzer::new(Box::new(Failing), 512).analyze("x"), 0.5);
        assert_eq!(TextRiskAnalyzer::new(Box::new(Panicking), 512).analyze("x"), 0.5);
    }

    #[test]
    fn test_truncates_to_max_chars() {
        let seen = Arc::new(AtomicUsize::new(0));
        let analyzer = TextRiskAnalyzer::new(Box::new(Recording(seen.clone())), 512);

        analyzer.analyze(&"é".repeat(600));
        assert_eq!(seen.load(Ordering::SeqCst), 512);

        analyzer.analyze("short");
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_builtin_lexicon() {
        let classifier = LexiconClassifier::builtin().unwrap();

        let phish = classifier
            .classify("URL: http://secure-login.bank.com.update-info/verify-account")
            .unwrap();
        assert_eq!(phish.label, TextLabel::Spam);
        assert!(phish.confidence > 0.9);

        let plain = classifier.classify("URL: https://google.com").unwrap();
        assert_eq!(plain.label, TextLabel::Ham);

        let analyzer = TextRiskAnalyzer::new(Box::new(classifier), 512);
        assert!(analyzer.analyze("URL: https://google.com") < 0.5);
    }

    #[test]
    fn test_lexicon_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.toml");
        std::fs::write(&path, "bias = 0.0\n\n[weights]\nInvoice = 3.0\n").unwrap();

        let classifier = LexiconClassifier::from_file(&path).unwrap();
        let c = classifier.classify("your INVOICE is ready").unwrap();
        assert_eq!(c.label, TextLabel::Spam);

        // No matching tokens: sigmoid(0) = 0.5 counts as Spam at exactly 0.5.
        let c = classifier.classify("hello").unwrap();
        assert_eq!(c.label, TextLabel::Spam);
        assert_eq!(c.confidence, 0.5);
    }

    #[test]
    fn test_bad_lexicon_leaves_analyzer_unavailable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lexicon.toml");
        std::fs::write(&path, "weights = 12").unwrap();

        let config = TextConfig {
            transformer: false,
            lexicon: Some(path),
            ..TextConfig::default()
        };
        let analyzer = TextRiskAnalyzer::from_config(&config);
        assert_eq!(analyzer.backend(), None);
        assert_eq!(analyzer.analyze("URL: https://paypal-login.example"), 0.5);

        let missing = TextConfig {
            transformer: false,
            lexicon: Some(dir.path().join("nope.toml")),
            ..TextConfig::default()
        };
        assert_eq!(TextRiskAnalyzer::from_config(&missing).backend(), None);
    }

    #[test]
    fn test_disabled_by_config() {
        let config = TextConfig {
            enabled: false,
            ..TextConfig::default()
        };
        let analyzer = TextRiskAnalyzer::from_config(&config);
        assert_eq!(analyzer.backend(), None);
        assert_eq!(analyzer.probability("URL: x"), 0.5);
    }

    #[test]
    fn test_transformer_snapshot_is_preferred() {
        let dir = tempdir().unwrap();
        write_tiny_model(dir.path(), [0.0, 2.0]);
        let config = TextConfig {
            model_dir: Some(dir.path().to_path_buf()),
            ..TextConfig::default()
        };

        let analyzer = TextRiskAnalyzer::from_config(&config);
        assert_eq!(analyzer.backend(), Some("bert"));
        let p = analyzer.analyze("URL: http://example.com/login");
        assert!((p - 1.0 / (1.0 + (-2.0f64).exp())).abs() < 1e-5);
    }

    #[test]
    fn test_missing_transformer_falls_back_to_lexicon() {
        let dir = tempdir().unwrap();
        let config = TextConfig {
            model_dir: Some(dir.path().to_path_buf()),
            ..TextConfig::default()
        };

        let analyzer = TextRiskAnalyzer::from_config(&config);
                assert_eq!(analyzer.backend(), Some("lexicon"));

        let unavailable = TextConfig {
            model_dir: Some(dir.path().to_path_buf()),
            lexicon: Some(dir.path().join("nope.toml")),
            ..TextConfig::default()
        };
        let analyzer = TextRiskAnalyzer::from_config(&unavailable);
        assert_eq!(analyzer.backend(), None);
        assert_eq!(analyzer.analyze("URL: http://x"), 0.5);
    }
}

use std::sync::Arc;

use tracing::debug;

use crate::classifier::structural::{ModelOrigin, StructuralClassifier};
use crate::classifier::text::TextRiskAnalyzer;
use crate::classifier::ProbabilityModel;
use crate::config::Config;
use crate::error::ModelError;
use crate::features::extract;
use crate::fusion::fuse;
use crate::models::{Assessment, FeatureVector};

pub type StructuralModel = dyn ProbabilityModel<Input = FeatureVector>;
pub type TextModel = dyn ProbabilityModel<Input = str>;

/// Readiness of both models, reported by the health endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelStatus {
    pub structural: Option<ModelOrigin>,
    /// Active text classifier backend; `None` when text scores are neutral.
    pub text_backend: Option<&'static str>,
}

/// Runs one URL through feature extraction, both models, and fusion.
///
/// Models are read-only after construction, so one engine can serve any
/// number of concurrent requests.
#[derive(Clone)]
pub struct RiskEngine {
    structural: Arc<StructuralModel>,
    text: Arc<TextModel>,
    status: ModelStatus,
}

impl RiskEngine {
    pub fn new(structural: Arc<StructuralModel>, text: Arc<TextModel>, status: ModelStatus) -> Self {
        RiskEngine {
            structural,
            text,
            status,
        }
    }

    /// Load (or train) the structural model and build the text analyzer.
    pub fn from_config(config: &Config) -> Result<Self, ModelError> {
        let structural = StructuralClassifier::load_or_train(&config.model)?;
        let text = TextRiskAnalyzer::from_config(&config.text);
        let status = ModelStatus {
            structural: Some(structural.origin()),
            text_backend: text.backend(),
        };
        Ok(Self::new(Arc::new(structural), Arc::new(text), status))
    }

    pub fn analyze(&self, url: &str) -> Assessment {
        let features = extract(url);
        let structural_score = self.structural.probability(&features);

        // The URL string stands in for page content.
        let text = format!("URL: {}", url);
        let text_score = self.text.probability(&text);

        let fusion = fuse(structural_score, text_score);
        debug!(url, structural_score, text_score, fused = fusion.score, tier = %fusion.tier, "URL scored");

        Assessment {
            url: url.to_string(),
            features,
            structural_score,
            text_score,
            fusion,
        }
    }

    pub fn status(&self) -> ModelStatus {
        self.status
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::text::{LexiconClassifier, TextRiskAnalyzer};
    use crate::models::{AnalysisResponse, RiskTier};

    pub(crate) struct Constant(pub f64);

    impl ProbabilityModel for Constant {
        type Input = FeatureVector;

        fn probability(&self, _input: &FeatureVector) -> f64 {
            self.0
        }
    }

    /// Engine with a fixed structural score and an unavailable text model.
    pub(crate) fn stub_engine(structural: f64) -> RiskEngine {
        RiskEngine::new(
            Arc::new(Constant(structural)),
            Arc::new(TextRiskAnalyzer::unavailable(512)),
            ModelStatus {
                structural: None,
                text_backend: None,
            },
        )
    }

    #[test]
    fn test_fuses_component_scores() {
        let a = stub_engine(1.0).analyze("http://10.0.0.1/verify");
        assert_eq!(a.text_score, 0.5);
        assert!((a.fusion.score - 0.8).abs() < 1e-12);
        assert_eq!(a.fusion.tier, RiskTier::High);
        assert_eq!(a.features.has_ip, 1);
        assert_eq!(a.url, "http://10.0.0.1/verify");
    }

    #[test]
    fn test_response_is_consistent_with_weights() {
        let a = stub_engine(0.37).analyze("example.com");
        let r = AnalysisResponse::from(&a);
        let recombined = r.details.ml_score * 0.6 + r.details.ai_score * 0.4;
        assert!((r.confidence_score - recombined).abs() < 0.01);
        assert_eq!(r.url, "example.com");
    }

    #[test]
    fn test_real_models_produce_probabilities() {
        let engine = RiskEngine::new(
            Arc::new(StructuralClassifier::train(10, 42).unwrap()),
            Arc::new(TextRiskAnalyzer::unavailable(512)),
            ModelStatus {
                structural: Some(ModelOrigin::Trained),
                text_backend: None,
            },
        );
        for url in ["", "google.com", "http://192.168.1.1/login", "https://a@b-c.d.e.f"] {
            let a = engine.analyze(url);
            assert!((0.0..=1.0).contains(&a.structural_score));
            assert!((0.0..=1.0).contains(&a.fusion.score));
        }
    }

    #[test]
    fn test_concurrent_analysis_matches_sequential() {
        let lexicon = LexiconClassifier::builtin().unwrap();
        let engine = RiskEngine::new(
            Arc::new(StructuralClassifier::train(10, 42).unwrap()),
            Arc::new(TextRiskAnalyzer::new(Box::new(lexicon), 512)),
            ModelStatus {
                structural: Some(ModelOrigin::Trained),
                text_backend: Some("lexicon"),
            },
        );
        let urls = [
            "https://google.com",
            "http://192.168.1.1/login",
            "secure-login.bank.com.update-info.example.net/verify?id=1",
            "ftp://phishing@site.com",
            "",
        ];
        let expected: Vec<Assessment> = urls.iter().map(|u| engine.analyze(u)).collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let engine = engine.clone();
                    scope.spawn(move || {
                        (0..25)
                            .flat_map(|_| urls.iter().map(|u| engine.analyze(u)).collect::<Vec<_>>())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            for handle in handles {
                let seen = handle.join().unwrap();
                for chunk in seen.chunks(urls.len()) {
                    assert_eq!(chunk, expected.as_slice());
                }
            }
        });
    }
}

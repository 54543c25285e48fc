use serde::{Deserialize, Serialize};

/// Number of structural features. Part of the persisted-model contract.
pub const N_FEATURES: usize = 8;

/// Lexical features of a single URL, in model input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeatureVector {
    pub url_length: u32,
    pub num_dots: u32,
    pub num_subdomains: u32,
    pub has_ip: u8,
    pub has_http: u8,
    pub has_https: u8,
    pub has_at_symbol: u8,
    pub has_hyphen: u8,
}

impl FeatureVector {
    pub const NAMES: [&'static str; N_FEATURES] = [
        "url_length",
        "num_dots",
        "num_subdomains",
        "has_ip",
        "has_http",
        "has_https",
        "has_at_symbol",
        "has_hyphen",
    ];

    /// The vector as model input. Order must never change without retraining.
    pub fn to_array(&self) -> [f64; N_FEATURES] {
        [
            f64::from(self.url_length),
            f64::from(self.num_dots),
            f64::from(self.num_subdomains),
            f64::from(self.has_ip),
            f64::from(self.has_http),
            f64::from(self.has_https),
            f64::from(self.has_at_symbol),
            f64::from(self.has_hyphen),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn status(&self) -> RiskStatus {
        match self {
            RiskTier::Low => RiskStatus::Safe,
            RiskTier::Medium => RiskStatus::Suspicious,
            RiskTier::High => RiskStatus::Phishing,
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskTier::Low => write!(f, "Low"),
            RiskTier::Medium => write!(f, "Medium"),
            RiskTier::High => write!(f, "High"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskStatus {
    Safe,
    Suspicious,
    #[serde(rename = "Fake/Phishing")]
    Phishing,
}

impl std::fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskStatus::Safe => write!(f, "Safe"),
            RiskStatus::Suspicious => write!(f, "Suspicious"),
            RiskStatus::Phishing => write!(f, "Fake/Phishing"),
        }
    }
}

/// Outcome of the weighted fusion of both component scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fusion {
    pub score: f64,
    pub tier: RiskTier,
}

impl Fusion {
    pub fn status(&self) -> RiskStatus {
        self.tier.status()
    }
}

/// Everything the engine computed for one URL.
#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub url: String,
    pub features: FeatureVector,
    pub structural_score: f64,
    pub text_score: f64,
    pub fusion: Fusion,
}

/// Response payload shared by the HTTP API and `analyze --format json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub url: String,
    pub status: RiskStatus,
    pub confidence_score: f64,
    pub risk_level: RiskTier,
    pub details: ScoreDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDetails {
    pub ml_score: f64,
    pub ai_score: f64,
}

impl From<&Assessment> for AnalysisResponse {
    fn from(a: &Assessment) -> Self {
        AnalysisResponse {
            url: a.url.clone(),
            status: a.fusion.status(),
            confidence_score: as_percentage(a.fusion.score),
            risk_level: a.fusion.tier,
            details: ScoreDetails {
                ml_score: as_percentage(a.structural_score),
                ai_score: as_percentage(a.text_score),
            },
        }
    }
}

/// Scale a probability to a percentage rounded to two decimals.
///
/// Approximates a correctly rounded `round(p * 100, 2)`. Rounding is half
/// away from zero on the already-scaled product, so an exact tie or a product
/// carrying representation error can differ from it by 0.01.
pub fn as_percentage(p: f64) -> f64 {
    (p * 100.0 * 100.0).round() / 100.0
}

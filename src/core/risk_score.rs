//! Risk Scoring Module
//! Provides a granular 0-100 score alongside the boolean suspicion verdict
//!
//! The score never overrides `suspicious`; it ranks findings in gray areas.

use serde::{Deserialize, Serialize};

use crate::models::types::{RiskSignal, Severity, SignalKind};

/// Granular risk score (0-100)
/// - 0-20: Low risk
/// - 21-40: Moderate
/// - 41-60: Elevated (manual review recommended)
/// - 61-80: High
/// - 81-100: Critical
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Overall score (0-100)
    pub total: u8,
    /// Individual component scores
    pub components: RiskComponents,
    /// Confidence level (0-100), lowered by degraded inputs
    pub confidence: u8,
    /// Human-readable recommendation
    pub recommendation: String,
    /// Detailed breakdown for transparency
    pub breakdown: Vec<ScoreFactor>,
}

/// Individual risk components
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RiskComponents {
    /// Early-holder concentration (0-100)
    pub concentration: u8,
    /// Early dumping activity (0-100)
    pub dumping: u8,
    /// Largest creator-origin transfer relative to volume (0-100)
    pub creator_share: u8,
    /// Rug-pull indicators (0-100)
    pub rug_pull: u8,
    /// Laundering signals (0-100)
    pub laundering: u8,
}

/// Individual factor contributing to score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub name: String,
    pub score: u8,
    pub weight: f32,
    pub reason: String,
}

impl RiskScore {
    /// Create a new risk score from components
    pub fn calculate(components: RiskComponents, factors: Vec<ScoreFactor>, degradations: usize) -> Self {
        let weights = [
            (components.concentration, 0.30),
            (components.rug_pull, 0.20),
            (components.dumping, 0.20),
            (components.laundering, 0.15),
            (components.creator_share, 0.15),
        ];

        let total: f32 = weights
            .iter()
            .map(|(score, weight)| *score as f32 * weight)
            .sum();

        let total = (total.round() as u8).min(100);
        let confidence = Self::calculate_confidence(&factors, degradations);
        let recommendation = Self::generate_recommendation(total, confidence);

        Self {
            total,
            components,
            confidence,
            recommendation,
            breakdown: factors,
        }
    }

    /// Confidence grows with evaluated factors and drops per degraded input
    fn calculate_confidence(factors: &[ScoreFactor], degradations: usize) -> u8 {
        if factors.is_empty() {
            return 30;
        }

        let base = (factors.len() * 15).min(75) as u8;
        let complete_bonus = if degradations == 0 { 20 } else { 0 };
        let penalty = (degradations * 10).min(50) as u8;

        (base + complete_bonus).saturating_sub(penalty).clamp(10, 95)
    }

    /// Generate human-readable recommendation
    fn generate_recommendation(score: u8, confidence: u8) -> String {
        let risk_level = match score {
            0..=20 => "✅ LOW RISK",
            21..=40 => "🟡 MODERATE RISK",
            41..=60 => "🟠 ELEVATED RISK",
            61..=80 => "🔴 HIGH RISK",
            _ => "💀 CRITICAL RISK",
        };

        let confidence_note = match confidence {
            0..=40 => "(Low confidence - degraded inputs)",
            41..=70 => "(Medium confidence)",
            _ => "(High confidence)",
        };

        let action = match score {
            0..=20 => "No material fraud indicators.",
            21..=40 => "Monitor holder distribution and creator activity.",
            41..=60 => "Manual review recommended before interacting.",
            61..=80 => "Strong fraud indicators. Treat as high risk.",
            _ => "Multiple fraud patterns detected. Avoid.",
        };

        format!("{} {} - {}", risk_level, confidence_note, action)
    }
}

/// Builder for creating risk scores from detector output
pub struct RiskScoreBuilder {
    factors: Vec<ScoreFactor>,
    components: RiskComponents,
    degradations: usize,
}

impl RiskScoreBuilder {
    pub fn new() -> Self {
        Self {
            factors: Vec::new(),
            components: RiskComponents::default(),
            degradations: 0,
        }
    }

    /// Top-holder concentration in percent
    pub fn with_concentration(mut self, concentration: f64) -> Self {
        let score = if concentration > 90.0 {
            95
        } else if concentration > 70.0 {
            80
        } else if concentration > 50.0 {
            60
        } else if concentration > 30.0 {
            35
        } else if concentration > 10.0 {
            15
        } else {
            5
        };

        self.components.concentration = score;
        self.factors.push(ScoreFactor {
            name: "Holder concentration".to_string(),
            score,
            weight: 0.30,
            reason: format!("Top holders received {:.1}% within 24h", concentration),
        });

        self
    }

    /// Value dumped within 7 days relative to total volume
    pub fn with_dumps(mut self, dumped: f64, total_transferred: f64, dumpers: usize) -> Self {
        let share = if total_transferred > 0.0 {
            100.0 * dumped / total_transferred
        } else {
            0.0
        };
        let score = if share > 50.0 {
            90
        } else if share > 25.0 {
            70
        } else if share > 10.0 {
            45
        } else if dumpers > 0 {
            20
        } else {
            5
        };

        self.components.dumping = score;
        self.factors.push(ScoreFactor {
            name: "Early dumping".to_string(),
            score,
            weight: 0.20,
            reason: format!("{} addresses dumped {:.1}% of volume", dumpers, share),
        });

        self
    }

    /// Largest creator-origin transfer relative to volume
    pub fn with_creator_share(mut self, largest: f64, total_transferred: f64) -> Self {
        let share = if total_transferred > 0.0 {
            100.0 * largest / total_transferred
        } else {
            0.0
        };
        let score = if share > 50.0 {
            90
        } else if share > 20.0 {
            70
        } else if share > 5.0 {
            50
        } else if share > 1.0 {
            20
        } else {
            5
        };

        self.components.creator_share = score;
        self.factors.push(ScoreFactor {
            name: "Creator-origin transfers".to_string(),
            score,
            weight: 0.15,
            reason: format!("Largest creator-origin transfer is {:.1}% of volume", share),
        });

        self
    }

    pub fn with_rug_pull(mut self, signals: &[RiskSignal]) -> Self {
        let drain = signals.iter().any(|s| s.kind == SignalKind::BalanceDrain);
        let withdrawal = signals.iter().any(|s| s.kind == SignalKind::LargeWithdrawal);
        let score = match (drain, withdrawal) {
            (true, true) => 90,
            (false, true) => 75,
            (true, false) => 45,
            (false, false) => 5,
        };

        self.components.rug_pull = score;
        self.factors.push(ScoreFactor {
            name: "Rug-pull indicators".to_string(),
            score,
            weight: 0.20,
            reason: format!(
                "Balance drain: {}, large withdrawal: {}",
                if drain { "YES" } else { "no" },
                if withdrawal { "YES" } else { "no" }
            ),
        });

        self
    }

    pub fn with_laundering(mut self, signals: &[RiskSignal]) -> Self {
        let high = signals.iter().filter(|s| s.severity == Severity::High).count();
        let score = if high > 0 {
            85
        } else if !signals.is_empty() {
            50
        } else {
            5
        };

        self.components.laundering = score;
        self.factors.push(ScoreFactor {
            name: "Laundering signals".to_string(),
            score,
            weight: 0.15,
            reason: format!("{} signals ({} high severity)", signals.len(), high),
        });

        self
    }

    /// Number of degraded inputs (dropped events, failed lookups)
    pub fn with_degradations(mut self, count: usize) -> Self {
        self.degradations = count;
        self
    }

    /// Build final risk score
    pub fn build(self) -> RiskScore {
        RiskScore::calculate(self.components, self.factors, self.degradations)
    }
}

impl Default for RiskScoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

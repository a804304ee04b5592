/// Weighted keyword rules for the transcript heuristic detector
use crate::error::{Result, SkipError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Seconds a sponsor block is assumed to last when no end phrase is found
pub const DEFAULT_FALLBACK_DURATION: f64 = 45.0;

/// A compiled pattern and the confidence a match contributes
#[derive(Debug, Clone)]
pub struct DetectionRule {
    pub pattern: Regex,
    pub weight: f64,
}

impl DetectionRule {
    /// Compile a case-insensitive rule
    pub fn new(pattern: &str, weight: f64) -> Result<Self> {
        let pattern = Regex::new(&format!("(?i){}", pattern))?;
        Ok(Self { pattern, weight })
    }
}

/// Highest weight among the rules matching `text`, if any
pub fn best_match(rules: &[DetectionRule], text: &str) -> Option<f64> {
    if text.trim().is_empty() {
        return None;
    }
    rules
        .iter()
        .filter(|rule| rule.pattern.is_match(text))
        .map(|rule| rule.weight)
        .fold(None, |best, weight| match best {
            Some(b) if b >= weight => Some(b),
            _ => Some(weight),
        })
}

/// A named bundle of start/end rules plus the span limits they operate under
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub name: String,
    pub start_rules: Vec<DetectionRule>,
    pub end_rules: Vec<DetectionRule>,
    /// Added to the detected start (usually negative)
    pub start_padding: f64,
    /// Added to the detected end (usually positive)
    pub end_padding: f64,
    pub min_segment_length: f64,
    /// Forward search window for an end phrase, in seconds of cue time
    pub max_segment_length: f64,
    pub min_confidence: f64,
    /// Span length used when no end phrase clears the threshold
    pub fallback_duration: f64,
}

impl RuleSet {
    /// Built-in sponsor read detection rules.
    ///
    /// A built-in pattern that fails to compile is logged and left out rather
    /// than failing construction; use [`RuleSetConfig::compile`] for strict
    /// handling of user patterns.
    pub fn sponsor_default() -> Self {
        let config = RuleSetConfig::default();
        let compile_lenient = |patterns: &[PatternConfig]| -> Vec<DetectionRule> {
            patterns
                .iter()
                .filter_map(|p| match DetectionRule::new(&p.pattern, p.weight) {
                    Ok(rule) => Some(rule),
                    Err(e) => {
                        warn!("⚠️ Skipping built-in pattern {:?}: {}", p.pattern, e);
                        None
                    }
                })
                .collect()
        };

        RuleSet {
            start_rules: compile_lenient(&config.start_patterns),
            end_rules: compile_lenient(&config.end_patterns),
            name: config.name,
            start_padding: config.start_padding,
            end_padding: config.end_padding,
            min_segment_length: config.min_segment_length,
            max_segment_length: config.max_segment_length,
            min_confidence: config.min_confidence,
            fallback_duration: config.fallback_duration,
        }
    }
}

/// Serializable pattern/weight pair as it appears in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatternConfig {
    pub pattern: String,
    pub weight: f64,
}

impl PatternConfig {
    fn new(pattern: &str, weight: f64) -> Self {
        Self {
            pattern: pattern.to_string(),
            weight,
        }
    }
}

/// Configuration form of a [`RuleSet`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleSetConfig {
    pub name: String,
    pub start_patterns: Vec<PatternConfig>,
    pub end_patterns: Vec<PatternConfig>,
    pub start_padding: f64,
    pub end_padding: f64,
    pub min_segment_length: f64,
    pub max_segment_length: f64,
    pub min_confidence: f64,
    pub fallback_duration: f64,
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        Self {
            name: "sponsor".to_string(),
            start_patterns: vec![
                PatternConfig::new(r"\bthis video is sponsored by\b", 1.0),
                PatternConfig::new(r"\b(today'?s|this) (video|episode) is brought to you by\b", 1.0),
                PatternConfig::new(r"\bbrought to you by\b", 0.9),
                PatternConfig::new(r"\bsponsor(ed|ship|ing)?\b", 0.8),
                PatternConfig::new(r"\b(paid promotion|sponsored content|ad break)\b", 0.8),
                PatternConfig::new(r"\b(partnering|partnered) with\b", 0.75),
                PatternConfig::new(r"\bthanks to .+ for sponsoring\b", 0.95),
                PatternConfig::new(r"\b(thanks to|shout ?out to)\b", 0.5),
                PatternConfig::new(r"\buse (my )?code\b", 0.6),
            ],
            end_patterns: vec![
                PatternConfig::new(r"\b(now )?back to (the )?(video|episode|topic)\b", 1.0),
                PatternConfig::new(r"\banyway(s)?,? (back|let'?s)\b", 0.9),
                PatternConfig::new(r"\b(link|links) (is |are )?in the description\b", 0.85),
                PatternConfig::new(r"\bin the description below\b", 0.8),
                PatternConfig::new(r"\bnow,? (let'?s|we)\b", 0.7),
                PatternConfig::new(r"\blet'?s get (started|into it|back)\b", 0.75),
                PatternConfig::new(r"\bcheck (them|it) out\b", 0.7),
                PatternConfig::new(r"\b(first \d+|\d+% off)\b", 0.5),
            ],
            start_padding: -2.0,
            end_padding: 4.0,
            min_segment_length: 5.0,
            max_segment_length: 120.0,
            min_confidence: 0.7,
            fallback_duration: DEFAULT_FALLBACK_DURATION,
        }
    }
}

impl RuleSetConfig {
    /// Compile every pattern; any invalid regex is a configuration error
    pub fn compile(&self) -> Result<RuleSet> {
        let compile_all = |patterns: &[PatternConfig]| -> Result<Vec<DetectionRule>> {
            patterns
                .iter()
                .map(|p| DetectionRule::new(&p.pattern, p.weight))
                .collect()
        };

        if self.min_segment_length < 0.0 || self.max_segment_length <= 0.0 {
            return Err(SkipError::Config(format!(
                "rule set '{}' has invalid segment length bounds",
                self.name
            )));
        }
        if self.fallback_duration <= 0.0 {
            return Err(SkipError::Config(format!(
                "rule set '{}' needs a positive fallback duration",
                self.name
            )));
        }

        Ok(RuleSet {
            name: self.name.clone(),
            start_rules: compile_all(&self.start_patterns)?,
            end_rules: compile_all(&self.end_patterns)?,
            start_padding: self.start_padding,
            end_padding: self.end_padding,
            min_segment_length: self.min_segment_length,
            max_segment_length: self.max_segment_length,
            min_confidence: self.min_confidence,
            fallback_duration: self.fallback_duration,
        })
    }
}

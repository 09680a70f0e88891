//! Classification rule tables.
//!
//! A [`RuleTable`] is an ordered list of `predicate → value` pairs; the first
//! matching rule wins. Tables are plain data and can be loaded from JSON to
//! replace the built-in keyword heuristics.
//!
//! Keyword matching is heuristic: "sim card phishing" classifies as
//! `sim_swap` because that rule comes first. Tables keep that behavior
//! rather than guessing intent.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::{FraudType, ReceivedChannel};

/// Lowercase, trim, and collapse every run of non-alphanumerics to a space.
///
/// `"Contact-Center"`, `"contact_center"` and `" CONTACT  center "` all
/// become `"contact center"`.
pub fn normalize_label(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// A test against a normalized label.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Whole label equals the value.
    Equals { value: String },
    /// Label contains the value anywhere.
    Contains { value: String },
    /// Label contains the value as a whole word.
    Word {
        value: String,
        #[serde(skip)]
        compiled: OnceCell<Option<Regex>>,
    },
    /// Label matches a regular expression.
    Regex {
        pattern: String,
        #[serde(skip)]
        compiled: OnceCell<Option<Regex>>,
    },
}

impl Predicate {
    pub fn equals(value: &str) -> Self {
        Predicate::Equals { value: value.to_string() }
    }

    pub fn contains(value: &str) -> Self {
        Predicate::Contains { value: value.to_string() }
    }

    pub fn word(value: &str) -> Self {
        Predicate::Word {
            value: value.to_string(),
            compiled: OnceCell::new(),
        }
    }

    pub fn regex(pattern: &str) -> Self {
        Predicate::Regex {
            pattern: pattern.to_string(),
            compiled: OnceCell::new(),
        }
    }

    /// Test an already-normalized label.
    pub fn matches(&self, label: &str) -> bool {
        match self {
            Predicate::Equals { value } => normalize_label(value) == label,
            Predicate::Contains { value } => {
                let needle = normalize_label(value);
                !needle.is_empty() && label.contains(&needle)
            }
            Predicate::Word { value, compiled } => compiled
                .get_or_init(|| {
                    let pattern = format!(r"\b{}\b", regex::escape(&normalize_label(value)));
                    Regex::new(&pattern).ok()
                })
                .as_ref()
                .is_some_and(|re| re.is_match(label)),
            // An invalid pattern never matches.
            Predicate::Regex { pattern, compiled } => compiled
                .get_or_init(|| Regex::new(pattern).ok())
                .as_ref()
                .is_some_and(|re| re.is_match(label)),
        }
    }
}

/// One `predicate → value` mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule<T> {
    pub when: Predicate,
    pub value: T,
}

/// Ordered rule list; first match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleTable<T> {
    pub rules: Vec<Rule<T>>,
}

impl<T: Copy> RuleTable<T> {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule (builder style).
    pub fn rule(mut self, when: Predicate, value: T) -> Self {
        self.rules.push(Rule { when, value });
        self
    }

    /// Classify free text. Blank input never matches.
    pub fn classify(&self, raw: &str) -> Option<T> {
        let label = normalize_label(raw);
        if label.is_empty() {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.when.matches(&label))
            .map(|rule| rule.value)
    }
}

impl<T: Copy> Default for RuleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Built-in fraud-type keyword table. Unmatched text is `other`.
pub fn fraud_type_rules() -> RuleTable<FraudType> {
    RuleTable::new()
        .rule(Predicate::equals("scam_investment"), FraudType::ScamInvestment)
        .rule(Predicate::equals("ato"), FraudType::Ato)
        .rule(Predicate::equals("sim_swap"), FraudType::SimSwap)
        .rule(Predicate::equals("phishing"), FraudType::Phishing)
        .rule(Predicate::equals("social_engineering"), FraudType::SocialEngineering)
        .rule(Predicate::equals("other"), FraudType::Other)
        .rule(Predicate::regex(r"\bsim ?swap"), FraudType::SimSwap)
        .rule(Predicate::word("sim"), FraudType::SimSwap)
        .rule(Predicate::contains("phish"), FraudType::Phishing)
        .rule(Predicate::contains("account takeover"), FraudType::Ato)
        .rule(Predicate::contains("takeover"), FraudType::Ato)
        .rule(Predicate::word("ato"), FraudType::Ato)
        .rule(Predicate::contains("social engineering"), FraudType::SocialEngineering)
        .rule(Predicate::contains("impersonat"), FraudType::SocialEngineering)
        .rule(Predicate::contains("vishing"), FraudType::SocialEngineering)
        .rule(Predicate::contains("investment"), FraudType::ScamInvestment)
        .rule(Predicate::contains("scam"), FraudType::ScamInvestment)
}

/// Built-in received-channel table. The enumeration is closed: unmatched
/// text is a validation failure, not a fallback.
pub fn channel_rules() -> RuleTable<ReceivedChannel> {
    RuleTable::new()
        .rule(Predicate::equals("branch"), ReceivedChannel::Branch)
        .rule(Predicate::regex(r"^(contact|call) ?cent(er|re)$"), ReceivedChannel::ContactCenter)
        .rule(Predicate::equals("cc"), ReceivedChannel::ContactCenter)
        .rule(Predicate::regex(r"^mobile ?app$"), ReceivedChannel::MobileApp)
        .rule(Predicate::regex(r"^e ?mail$"), ReceivedChannel::Email)
}

/// Both classifier tables used by the row validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifiers {
    pub fraud_types: RuleTable<FraudType>,
    pub channels: RuleTable<ReceivedChannel>,
}

impl Classifiers {
    pub fn fraud_type(&self, raw: &str) -> FraudType {
        self.fraud_types.classify(raw).unwrap_or_default()
    }

    pub fn channel(&self, raw: &str) -> Option<ReceivedChannel> {
        self.channels.classify(raw)
    }

    /// Load custom tables from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl Default for Classifiers {
    fn default() -> Self {
        Self {
            fraud_types: fraud_type_rules(),
            channels: channel_rules(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label(" Contact-Center "), "contact center");
        assert_eq!(normalize_label("MOBILE_APP"), "mobile app");
        assert_eq!(normalize_label("--"), "");
    }

    #[test]
    fn test_channel_synonyms() {
        let rules = channel_rules();
        for raw in ["contact_center", "Contact Center", "CALL-CENTRE", "contactcenter", "CC"] {
            assert_eq!(rules.classify(raw), Some(ReceivedChannel::ContactCenter), "{raw}");
        }
        assert_eq!(rules.classify("Branch"), Some(ReceivedChannel::Branch));
        assert_eq!(rules.classify("mobile app"), Some(ReceivedChannel::MobileApp));
        assert_eq!(rules.classify("E-mail"), Some(ReceivedChannel::Email));
    }

    #[test]
    fn test_channel_is_closed() {
        let rules = channel_rules();
        assert_eq!(rules.classify("fax"), None);
        assert_eq!(rules.classify("branch office"), None);
        assert_eq!(rules.classify(""), None);
    }

    #[test]
    fn test_fraud_type_keywords() {
        let c = Classifiers::default();
        assert_eq!(c.fraud_type("Investment scam via WhatsApp"), FraudType::ScamInvestment);
        assert_eq!(c.fraud_type("ATO"), FraudType::Ato);
        assert_eq!(c.fraud_type("Account Takeover"), FraudType::Ato);
        assert_eq!(c.fraud_type("SIM swap"), FraudType::SimSwap);
        assert_eq!(c.fraud_type("phishing link"), FraudType::Phishing);
        assert_eq!(c.fraud_type("Caller impersonating bank staff"), FraudType::SocialEngineering);
        assert_eq!(c.fraud_type("card skimming"), FraudType::Other);
        assert_eq!(c.fraud_type(""), FraudType::Other);
    }

    #[test]
    fn test_ato_needs_whole_word() {
        let c = Classifiers::default();
        // "impersonator" contains "ato" but is not the ATO keyword
        assert_eq!(c.fraud_type("impersonator"), FraudType::SocialEngineering);
        assert_eq!(c.fraud_type("tomato"), FraudType::Other);
    }

    #[test]
    fn test_first_match_wins() {
        let c = Classifiers::default();
        assert_eq!(c.fraud_type("sim card phishing"), FraudType::SimSwap);
    }

    #[test]
    fn test_table_from_json() {
        let json = r#"{
            "fraud_types": { "rules": [
                { "when": { "type": "contains", "value": "crypto" }, "value": "scam_investment" }
            ]},
            "channels": { "rules": [
                { "when": { "type": "regex", "pattern": "^walk in$" }, "value": "branch" }
            ]}
        }"#;
        let c: Classifiers = serde_json::from_str(json).unwrap();
        assert_eq!(c.fraud_type("Crypto doubling"), FraudType::ScamInvestment);
        assert_eq!(c.fraud_type("phishing"), FraudType::Other);
        assert_eq!(c.channel("Walk-In"), Some(ReceivedChannel::Branch));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        let table = RuleTable::new().rule(Predicate::regex("(unclosed"), FraudType::Ato);
        assert_eq!(table.classify("anything"), None);
    }
}

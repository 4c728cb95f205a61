//! Console model identification from free-text names and responses
//!
//! Rules are evaluated in order and the first match wins. Within a family the
//! specific variants come first; the general rule for the family carries an
//! exclusion pattern so it never shadows a variant when evaluated on its own.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::model::{ConsoleModel, Family};

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Built-in rule table: (pattern, exclusion, model)
const BUILTIN_RULES: &[(&str, Option<&str>, ConsoleModel)] = &[
    // Midas
    (r"M32.*LIVE", None, ConsoleModel::M32Live),
    (r"M32R\b", None, ConsoleModel::M32R),
    (r"M32C\b", None, ConsoleModel::M32C),
    (r"M32", Some(r"M32[RC]\b|M32.*LIVE"), ConsoleModel::M32),
    // Behringer X32
    (r"X32.*COMPACT", None, ConsoleModel::X32Compact),
    (r"X32.*PRODUCER", None, ConsoleModel::X32Producer),
    (r"X32.*RACK", None, ConsoleModel::X32Rack),
    (r"X32.*CORE", None, ConsoleModel::X32Core),
    (
        r"X32",
        Some(r"X32.*(COMPACT|PRODUCER|RACK|CORE)"),
        ConsoleModel::X32,
    ),
    // Behringer Wing
    (r"WING.*RACK", None, ConsoleModel::WingRack),
    (r"WING.*COMPACT", None, ConsoleModel::WingCompact),
    (r"WING", Some(r"WING.*(RACK|COMPACT)"), ConsoleModel::Wing),
];

/// Tokens that identify a family when no rule matched
const FAMILY_TOKENS: &[(&str, Family)] = &[(r"X32|M32", Family::X32M32), (r"WING", Family::Wing)];

/// How sure the classifier is about a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// A model rule matched
    #[default]
    Exact,
    /// Only a family token matched; the family's default model was assumed
    FamilyDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub model: ConsoleModel,
    pub confidence: Confidence,
}

/// One ordered (pattern, model) rule
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pattern: Regex,
    exclude: Option<Regex>,
    model: ConsoleModel,
}

impl ClassificationRule {
    /// Build a case-insensitive rule
    pub fn new(
        pattern: &str,
        exclude: Option<&str>,
        model: ConsoleModel,
    ) -> Result<Self, ClassifierError> {
        Ok(Self {
            pattern: compile(pattern)?,
            exclude: exclude.map(compile).transpose()?,
            model,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
            && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(text))
    }
}

fn compile(pattern: &str) -> Result<Regex, ClassifierError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| ClassifierError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Ordered rule set plus family fallback
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Vec<ClassificationRule>,
    family_tokens: Vec<(Regex, Family)>,
}

impl Classifier {
    /// Classifier with the built-in X32/M32/Wing rules
    pub fn builtin() -> Result<Self, ClassifierError> {
        let rules = BUILTIN_RULES
            .iter()
            .map(|(pattern, exclude, model)| ClassificationRule::new(pattern, *exclude, *model))
            .collect::<Result<Vec<_>, _>>()?;
        Self::with_rules(rules)
    }

    /// Classifier with a custom rule list; evaluation order is list order
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Result<Self, ClassifierError> {
        let family_tokens = FAMILY_TOKENS
            .iter()
            .map(|(pattern, family)| Ok((compile(pattern)?, *family)))
            .collect::<Result<Vec<_>, ClassifierError>>()?;
        Ok(Self {
            rules,
            family_tokens,
        })
    }

    /// Map free text to a console model, `None` when nothing matches
    pub fn classify(&self, text: &str) -> Option<Classification> {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matches(text)) {
            return Some(Classification {
                model: rule.model,
                confidence: Confidence::Exact,
            });
        }

        let family = self
            .family_tokens
            .iter()
            .find(|(token, _)| token.is_match(text))
            .map(|(_, family)| *family)?;

        trace!(text, family = %family, "Falling back to family default model");
        Some(Classification {
            model: family.default_model(),
            confidence: Confidence::FamilyDefault,
        })
    }
}

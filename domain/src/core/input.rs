//! Consensus input value objects
//!
//! [`ConsensusInput`] is the validated topic plus ordered source texts a
//! caller submits; [`GenerationOptions`] carries the enumerated request
//! options that used to travel as an ad-hoc object.

use super::error::DomainError;
use serde::{Deserialize, Serialize};

/// Maximum topic length in characters
pub const MAX_TOPIC_CHARS: usize = 1_000;
/// Maximum number of source texts per job
pub const MAX_SOURCES: usize = 20;
/// Maximum combined source length in characters
pub const MAX_SOURCE_CHARS: usize = 200_000;

/// Requested analysis depth
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    #[default]
    Standard,
    Detailed,
}

impl Depth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Depth::Standard => "standard",
            Depth::Detailed => "detailed",
        }
    }
}

impl std::fmt::Display for Depth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Depth {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Depth::Standard),
            "detailed" => Ok(Depth::Detailed),
            other => Err(DomainError::validation(
                "options.depth",
                format!("unknown depth '{}', expected standard or detailed", other),
            )),
        }
    }
}

/// Options accepted alongside a generation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    pub depth: Depth,
    /// Include per-phase traces when the result is fetched
    pub include_metadata: bool,
}

/// Topic and ordered sources to reach consensus on (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusInput {
    topic: String,
    sources: Vec<String>,
}

impl ConsensusInput {
    /// Validate and build an input.
    ///
    /// The topic is trimmed; blank sources are dropped while the order of
    /// the remaining ones is preserved.
    pub fn new(topic: impl Into<String>, sources: Vec<String>) -> Result<Self, DomainError> {
        let topic = topic.into().trim().to_string();
        if topic.is_empty() {
            return Err(DomainError::validation("topic", "must not be empty"));
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(DomainError::validation(
                "topic",
                format!("must be at most {} characters", MAX_TOPIC_CHARS),
            ));
        }

        let sources: Vec<String> = sources
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();
        if sources.len() > MAX_SOURCES {
            return Err(DomainError::validation(
                "sources",
                format!("at most {} sources are allowed", MAX_SOURCES),
            ));
        }
        let total: usize = sources.iter().map(|s| s.chars().count()).sum();
        if total > MAX_SOURCE_CHARS {
            return Err(DomainError::validation(
                "sources",
                format!("combined length must be at most {} characters", MAX_SOURCE_CHARS),
            ));
        }

        Ok(Self { topic, sources })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Character count of the topic
    pub fn topic_chars(&self) -> usize {
        self.topic.chars().count()
    }

    /// Character count of all sources concatenated
    pub fn source_chars(&self) -> usize {
        self.sources.iter().map(|s| s.chars().count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_trims_topic_and_drops_blank_sources() {
        let input = ConsensusInput::new(
            "  Should we adopt Rust?  ",
            vec!["first".into(), "   ".into(), "second".into()],
        )
        .unwrap();
        assert_eq!(input.topic(), "Should we adopt Rust?");
        assert_eq!(input.sources(), &["first".to_string(), "second".to_string()]);
        assert_eq!(input.source_chars(), 11);
    }

    #[test]
    fn test_empty_topic_rejected() {
        let err = ConsensusInput::new("   ", vec![]).unwrap_err();
        assert!(matches!(err, DomainError::Validation { field: "topic", .. }));
    }

    #[test]
    fn test_limits_enforced() {
        let long_topic = "x".repeat(MAX_TOPIC_CHARS + 1);
        assert!(ConsensusInput::new(long_topic, vec![]).is_err());

        let many = vec!["s".to_string(); MAX_SOURCES + 1];
        assert!(ConsensusInput::new("topic", many).is_err());

        let huge = vec!["y".repeat(MAX_SOURCE_CHARS + 1)];
        assert!(ConsensusInput::new("topic", huge).is_err());
    }

    #[test]
    fn test_depth_parse() {
        assert_eq!("Detailed".parse::<Depth>().unwrap(), Depth::Detailed);
        assert!("deep".parse::<Depth>().is_err());
    }

    #[test]
    fn test_options_deserialize_camel_case() {
        let opts: GenerationOptions =
            serde_json::from_str(r#"{"depth":"detailed","includeMetadata":true}"#).unwrap();
        assert_eq!(opts.depth, Depth::Detailed);
        assert!(opts.include_metadata);

        let defaults: GenerationOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, GenerationOptions::default());
    }
}

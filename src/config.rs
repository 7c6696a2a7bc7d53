//! Process-wide enrichment configuration, read once at cold start.

use std::collections::HashSet;

/// Which target functions to decorate and with what attribute.
///
/// Loaded from the environment at cold start, immutable afterwards, shared
/// read-only across invocations.
#[derive(Clone, Debug)]
pub struct EnrichmentRule {
    target_names: HashSet<String>,
    attribute_key: String,
    attribute_value: String,
}

/// What a failed record reports back to Firehose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Report `ProcessingFailed`; Firehose retries and eventually backs the
    /// record up, so nothing is lost.
    #[default]
    Retry,
    /// Report `Dropped`; the record is discarded permanently.
    Drop,
}

/// Malformed configuration. Fatal at startup, before any record is handled.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Empty(&'static str),
    InvalidPolicy(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "required environment variable {} is not set", var),
            ConfigError::Empty(var) => write!(f, "environment variable {} is empty", var),
            ConfigError::InvalidPolicy(value) => write!(
                f,
                "ON_FAILURE must be \"retry\" or \"drop\", got {:?}",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

impl EnrichmentRule {
    /// Load the rule from environment variables.
    ///
    /// `TARGET_FUNCTION_NAMES` is a comma-separated list of function names;
    /// `ATTRIBUTE_KEY` and `ATTRIBUTE_VALUE` are the pair to inject. All
    /// three are required and non-empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        let names = required("TARGET_FUNCTION_NAMES")?;
        let attribute_key = required("ATTRIBUTE_KEY")?;
        let attribute_value = required("ATTRIBUTE_VALUE")?;
        Self::from_parts(&names, attribute_key, attribute_value)
    }

    fn from_parts(
        names: &str,
        attribute_key: String,
        attribute_value: String,
    ) -> Result<Self, ConfigError> {
        let target_names: HashSet<String> = names
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();
        if target_names.is_empty() {
            return Err(ConfigError::Empty("TARGET_FUNCTION_NAMES"));
        }
        Ok(Self {
            target_names,
            attribute_key,
            attribute_value,
        })
    }

    /// Construct a rule directly, for tests and embedding.
    pub fn new<I, S>(target_names: I, attribute_key: &str, attribute_value: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            target_names: target_names.into_iter().map(Into::into).collect(),
            attribute_key: attribute_key.to_string(),
            attribute_value: attribute_value.to_string(),
        }
    }

    /// Exact-equality membership test against the target set.
    pub fn is_target(&self, function_name: &str) -> bool {
        self.target_names.contains(function_name)
    }

    pub fn attribute_key(&self) -> &str {
        &self.attribute_key
    }

    pub fn attribute_value(&self) -> &str {
        &self.attribute_value
    }
}

impl FailurePolicy {
    /// Read the policy from `ON_FAILURE`. Unset defaults to `Retry`.
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var("ON_FAILURE") {
            Err(_) => Ok(Self::default()),
            Ok(value) => Self::parse(&value),
        }
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "retry" => Ok(FailurePolicy::Retry),
            "drop" => Ok(FailurePolicy::Drop),
            _ => Err(ConfigError::InvalidPolicy(value.to_string())),
        }
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    let value = std::env::var(var).map_err(|_| ConfigError::Missing(var))?;
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(var));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_names_with_whitespace() {
        let rule = EnrichmentRule::from_parts(
            " my-fn , other-fn,, third-fn ",
            "env".to_string(),
            "dev".to_string(),
        )
        .unwrap();
        assert!(rule.is_target("my-fn"));
        assert!(rule.is_target("other-fn"));
        assert!(rule.is_target("third-fn"));
        assert!(!rule.is_target("my-fn "));
        assert!(!rule.is_target("unknown-fn"));
    }

    #[test]
    fn all_blank_name_list_is_an_error() {
        let err = EnrichmentRule::from_parts(" , ,", "env".to_string(), "dev".to_string())
            .unwrap_err();
        assert!(matches!(err, ConfigError::Empty("TARGET_FUNCTION_NAMES")));
    }

    #[test]
    fn matching_is_exact_not_substring() {
        let rule = EnrichmentRule::new(["target-fn"], "env", "dev");
        assert!(rule.is_target("target-fn"));
        assert!(!rule.is_target("target-fn-2"));
        assert!(!rule.is_target("target"));
    }

    #[test]
    fn failure_policy_parses_case_insensitively() {
        assert_eq!(FailurePolicy::parse("retry").unwrap(), FailurePolicy::Retry);
        assert_eq!(FailurePolicy::parse("DROP").unwrap(), FailurePolicy::Drop);
        assert!(matches!(
            FailurePolicy::parse("explode").unwrap_err(),
            ConfigError::InvalidPolicy(_)
        ));
    }
}

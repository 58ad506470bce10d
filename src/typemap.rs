//! Column type resolution
//!
//! Maps a column's native type name to a Rust type through an ordered list
//! of rules. The first matching rule wins; the reserved `default` rule
//! supplies the fallback.

use std::{fs, path::Path, sync::OnceLock};

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, error, trace, warn};

use crate::error::PgdaoError;

/// Name of the reserved fallback rule
pub const DEFAULT_RULE: &str = "default";

/// Prefix marking a `db_types` entry as a regular expression
const PATTERN_PREFIX: &str = "re/";

const BUILTIN_TYPE_MAP: &str = include_str!("typemap.toml");

/// A single native type -> Rust type mapping
#[derive(Debug, Clone, Deserialize)]
pub struct TypeRule {
    pub name: String,
    /// Literal native type names, or `re/<pattern>` entries
    pub db_types: Vec<String>,
    pub not_null_type: String,
    pub nullable_type: String,

    /// Compiled on first use
    #[serde(skip)]
    patterns: OnceLock<Vec<Regex>>,
}

impl TypeRule {
    pub fn new(
        name: impl Into<String>,
        db_types: Vec<String>,
        not_null_type: impl Into<String>,
        nullable_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            db_types,
            not_null_type: not_null_type.into(),
            nullable_type: nullable_type.into(),
            patterns: OnceLock::new(),
        }
    }

    /// Check if a native type matches this rule
    pub fn matches(&self, native_type: &str) -> bool {
        let literal = self
            .db_types
            .iter()
            .any(|t| !t.starts_with(PATTERN_PREFIX) && t == native_type);

        literal || self.patterns().iter().any(|re| re.is_match(native_type))
    }

    fn pattern_sources(&self) -> impl Iterator<Item = &str> {
        self.db_types
            .iter()
            .filter_map(|t| t.strip_prefix(PATTERN_PREFIX))
    }

    fn patterns(&self) -> &[Regex] {
        self.patterns.get_or_init(|| {
            self.pattern_sources()
                .filter_map(|source| match Regex::new(source) {
                    Ok(re) => Some(re),
                    Err(e) => {
                        warn!(rule = ?self.name, pattern = ?source, error = ?e, "Ignoring invalid type pattern");
                        None
                    }
                })
                .collect()
        })
    }

    fn validate(&self) -> Result<(), PgdaoError> {
        for source in self.pattern_sources() {
            Regex::new(source).map_err(|e| {
                error!(rule = ?self.name, pattern = ?source, error = ?e, "Invalid type pattern");
                PgdaoError::Config(format!(
                    "Invalid pattern '{}' in type rule '{}': {}",
                    source, self.name, e
                ))
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TypeMapFile {
    #[serde(default, rename = "rule")]
    rules: Vec<TypeRule>,
}

/// Ordered set of type rules plus the fallback rule
#[derive(Debug, Clone)]
pub struct TypeRuleSet {
    rules: Vec<TypeRule>,
    default: TypeRule,
}

impl TypeRuleSet {
    /// Build a rule set; exactly one rule must be named `default`
    pub fn new(rules: Vec<TypeRule>) -> Result<Self, PgdaoError> {
        let mut default = None;
        let mut ordered: Vec<TypeRule> = Vec::with_capacity(rules.len());

        for rule in rules {
            rule.validate()?;

            let duplicate = ordered.iter().any(|r| r.name == rule.name)
                || (rule.name == DEFAULT_RULE && default.is_some());
            if duplicate {
                return Err(PgdaoError::Config(format!(
                    "Duplicate type rule '{}'",
                    rule.name
                )));
            }

            if rule.name == DEFAULT_RULE {
                default = Some(rule);
            } else {
                ordered.push(rule);
            }
        }

        let default = default.ok_or_else(|| {
            PgdaoError::Config(format!("Type map has no '{DEFAULT_RULE}' rule"))
        })?;

        Ok(Self {
            rules: ordered,
            default,
        })
    }

    /// The rule set shipped with pgdao
    pub fn builtin() -> Self {
        Self::from_toml(BUILTIN_TYPE_MAP).expect("Failed to load built-in type map")
    }

    /// Parse a rule set from TOML text
    pub fn from_toml(text: &str) -> Result<Self, PgdaoError> {
        let file: TypeMapFile = toml::from_str(text)
            .map_err(|e| PgdaoError::Config(format!("Invalid type map: {e}")))?;
        Self::new(file.rules)
    }

    /// Load a rule set from a TOML file
    pub fn load(path: &Path) -> Result<Self, PgdaoError> {
        debug!(path = ?path, "Loading type map");
        let text = fs::read_to_string(path).map_err(|e| {
            error!(path = ?path, error = ?e, "Failed to read type map");
            PgdaoError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Resolve the Rust type for a native type
    ///
    /// Nothing matching falls back to the default rule's not-null type, even
    /// for nullable columns.
    pub fn resolve(&self, native_type: &str, not_null: bool) -> &str {
        match self.rules.iter().find(|rule| rule.matches(native_type)) {
            Some(rule) => {
                trace!(native_type = ?native_type, rule = ?rule.name, "Resolved type");
                if not_null {
                    &rule.not_null_type
                } else {
                    &rule.nullable_type
                }
            }
            None => {
                warn!(native_type = ?native_type, fallback = ?self.default.not_null_type, "No type rule matched");
                &self.default.not_null_type
            }
        }
    }

    /// Check if a rule with this name exists
    pub fn contains(&self, name: &str) -> bool {
        name == DEFAULT_RULE || self.rules.iter().any(|r| r.name == name)
    }

    /// Append a rule after the existing ones
    pub fn push(&mut self, rule: TypeRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[TypeRule] {
        &self.rules
    }

    pub fn default_rule(&self) -> &TypeRule {
        &self.default
    }
}

impl Default for TypeRuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(name: &str, db_types: &[&str], not_null: &str, nullable: &str) -> TypeRule {
        TypeRule::new(
            name,
            db_types.iter().map(|s| s.to_string()).collect(),
            not_null,
            nullable,
        )
    }

    fn default_rule() -> TypeRule {
        rule("default", &["*"], "Fallback", "Option<Fallback>")
    }

    #[test]
    fn test_builtin_resolves_common_types() {
        let rules = TypeRuleSet::builtin();
        assert_eq!(rules.resolve("integer", true), "i32");
        assert_eq!(rules.resolve("integer", false), "Option<i32>");
        assert_eq!(rules.resolve("character varying", true), "String");
        assert_eq!(rules.resolve("text", false), "Option<String>");
        assert_eq!(
            rules.resolve("timestamp with time zone", true),
            "chrono::DateTime<chrono::Utc>"
        );
        assert_eq!(rules.resolve("jsonb", true), "serde_json::Value");
    }

    #[test]
    fn test_builtin_patterns() {
        let rules = TypeRuleSet::builtin();
        assert_eq!(rules.resolve("text[]", true), "Vec<String>");
        assert_eq!(rules.resolve("character varying[]", false), "Option<Vec<String>>");
    }

    #[test]
    fn test_builtin_network_types() {
        let rules = TypeRuleSet::builtin();
        assert_eq!(rules.resolve("inet", true), "std::net::IpAddr");
        assert_eq!(rules.resolve("cidr", true), "cidr::IpCidr");
        assert_eq!(rules.resolve("cidr", false), "Option<cidr::IpCidr>");
    }

    #[test]
    fn test_builtin_unbindable_types_fall_back() {
        let rules = TypeRuleSet::builtin();
        assert_eq!(rules.resolve("money", true), "String");
        assert_eq!(rules.resolve("time with time zone", false), "String");
    }

    #[test]
    fn test_fallback_ignores_nullability() {
        let rules = TypeRuleSet::builtin();
        assert_eq!(rules.resolve("tsvector", true), "String");
        assert_eq!(rules.resolve("tsvector", false), "String");
    }

    #[test]
    fn test_first_match_wins() {
        let rules = TypeRuleSet::new(vec![
            rule("first", &["re/^int"], "First", "Option<First>"),
            rule("second", &["integer"], "Second", "Option<Second>"),
            default_rule(),
        ])
        .unwrap();
        assert_eq!(rules.resolve("integer", true), "First");
    }

    #[test]
    fn test_pattern_entries_are_not_literals() {
        let rules = TypeRuleSet::new(vec![
            rule("pat", &["re/^money$"], "Money", "Option<Money>"),
            default_rule(),
        ])
        .unwrap();
        assert_eq!(rules.resolve("re/^money$", true), "Fallback");
        assert_eq!(rules.resolve("money", true), "Money");
    }

    #[test]
    fn test_missing_default_rule() {
        let result = TypeRuleSet::new(vec![rule("int", &["integer"], "i32", "Option<i32>")]);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_duplicate_rule() {
        let result = TypeRuleSet::new(vec![
            rule("int", &["integer"], "i32", "Option<i32>"),
            rule("int", &["bigint"], "i64", "Option<i64>"),
            default_rule(),
        ]);
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = TypeRuleSet::new(vec![
            rule("broken", &["re/(unclosed"], "X", "Option<X>"),
            default_rule(),
        ]);
        assert!(result.unwrap_err().to_string().contains("broken"));
    }

    #[test]
    fn test_invalid_pattern_never_matches() {
        let broken = rule("broken", &["re/(unclosed", "box"], "X", "Option<X>");
        assert!(!broken.matches("(unclosed"));
        assert!(broken.matches("box"));
    }

    #[test]
    fn test_from_toml() {
        let text = r#"
            [[rule]]
            name = "money"
            db_types = ["money"]
            not_null_type = "i64"
            nullable_type = "Option<i64>"

            [[rule]]
            name = "default"
            db_types = ["*"]
            not_null_type = "Vec<u8>"
            nullable_type = "Option<Vec<u8>>"
        "#;
        let rules = TypeRuleSet::from_toml(text).unwrap();
        assert_eq!(rules.rules().len(), 1);
        assert_eq!(rules.resolve("money", false), "Option<i64>");
        assert_eq!(rules.resolve("integer", false), "Vec<u8>");
        assert!(rules.contains("money"));
        assert!(rules.contains("default"));
        assert!(!rules.contains("integer"));
    }

    #[test]
    fn test_from_toml_invalid() {
        let result = TypeRuleSet::from_toml("[[rule]]\nname = 1");
        assert!(result.is_err());
    }

    #[test]
    fn test_push_appends_rule() {
        let mut rules = TypeRuleSet::builtin();
        rules.push(rule("mood", &["mood"], "Mood", "NullMood"));
        assert!(rules.contains("mood"));
        assert_eq!(rules.resolve("mood", false), "NullMood");
    }
}

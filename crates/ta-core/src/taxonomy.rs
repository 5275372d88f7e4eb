//! Classification taxonomies.
//!
//! Three schemes are supported: the CERT incident taxonomy, an open
//! model-defined scheme, and NIST SP 800-61r2 categories. Dispatch is a
//! closed enum so a missing taxonomy arm is a compile error rather than a
//! fallthrough on a string literal.

use serde::{Deserialize, Serialize};

/// Fixed CERT category names.
pub const CERT_CATEGORIES: &[&str] = &["DoS", "Fraud", "Intrusion", "Scan", "Web", "Other"];

/// Fixed NIST SP 800-61r2 category names.
pub const NIST_CATEGORIES: &[&str] = &[
    "CAT 0", "CAT 1", "CAT 2", "CAT 3", "CAT 4", "CAT 5", "CAT 6",
];

/// A classification scheme selector, as sent in categorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Taxonomy {
    /// CERT incident taxonomy (fixed category set).
    Cert,
    /// Open scheme where the model chooses its own categories.
    Llm,
    /// NIST SP 800-61r2 categories (fixed category set).
    Nist,
}

impl Taxonomy {
    /// All taxonomies in the order a full analysis run processes them.
    pub const ALL: [Taxonomy; 3] = [Taxonomy::Cert, Taxonomy::Llm, Taxonomy::Nist];

    /// Upper-case display name, as used in result payloads and progress text.
    pub fn display_name(self) -> &'static str {
        match self {
            Taxonomy::Cert => "CERT",
            Taxonomy::Llm => "LLM",
            Taxonomy::Nist => "NIST",
        }
    }

    /// The allowed category set, or `None` for the open scheme.
    pub fn allowed_categories(self) -> Option<&'static [&'static str]> {
        match self {
            Taxonomy::Cert => Some(CERT_CATEGORIES),
            Taxonomy::Llm => None,
            Taxonomy::Nist => Some(NIST_CATEGORIES),
        }
    }

    /// Whether `category` is acceptable under this taxonomy.
    ///
    /// The open scheme accepts any non-empty category name.
    pub fn is_valid_category(self, category: &str) -> bool {
        match self.allowed_categories() {
            Some(allowed) => allowed.contains(&category),
            None => !category.trim().is_empty(),
        }
    }

    /// The categorization type carried in result payloads.
    pub fn categorization_type(self) -> CategorizationType {
        match self {
            Taxonomy::Cert => CategorizationType::Cert,
            Taxonomy::Llm => CategorizationType::Llm,
            Taxonomy::Nist => CategorizationType::Nist,
        }
    }
}

impl std::fmt::Display for Taxonomy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Result-side taxonomy tag (`CERT` | `LLM` | `NIST` on the wire).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CategorizationType {
    Cert,
    Llm,
    Nist,
}

impl From<Taxonomy> for CategorizationType {
    fn from(taxonomy: Taxonomy) -> Self {
        taxonomy.categorization_type()
    }
}

impl std::fmt::Display for CategorizationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CategorizationType::Cert => write!(f, "CERT"),
            CategorizationType::Llm => write!(f, "LLM"),
            CategorizationType::Nist => write!(f, "NIST"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_side_serialization_is_lowercase() {
        assert_eq!(serde_json::to_string(&Taxonomy::Cert).unwrap(), "\"cert\"");
        assert_eq!(serde_json::to_string(&Taxonomy::Nist).unwrap(), "\"nist\"");
        let parsed: Taxonomy = serde_json::from_str("\"llm\"").unwrap();
        assert_eq!(parsed, Taxonomy::Llm);
    }

    #[test]
    fn test_result_side_serialization_is_uppercase() {
        assert_eq!(
            serde_json::to_string(&CategorizationType::Nist).unwrap(),
            "\"NIST\""
        );
    }

    #[test]
    fn test_fixed_category_validation() {
        assert!(Taxonomy::Cert.is_valid_category("Scan"));
        assert!(!Taxonomy::Cert.is_valid_category("CAT 2"));
        assert!(Taxonomy::Nist.is_valid_category("CAT 2"));
        assert!(!Taxonomy::Nist.is_valid_category("CAT 9"));
    }

    #[test]
    fn test_open_scheme_accepts_any_nonempty_category() {
        assert!(Taxonomy::Llm.is_valid_category("Credential Stuffing"));
        assert!(!Taxonomy::Llm.is_valid_category("   "));
    }
}

//! Classification records and aggregated categorization results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::taxonomy::CategorizationType;
use crate::usage::TokenUsage;

/// The category assigned to one incident under one taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Incident id this classification refers to.
    pub id: String,
    /// Assigned category (fixed set or model-defined, depending on taxonomy).
    pub category: String,
    /// Model-provided justification for the category choice.
    pub reason: String,
    /// Classification timestamp as reported by the engine.
    pub timestamp: String,
}

/// One entry of the per-category histogram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Aggregated categorization output for a batch or an accumulated stream.
///
/// `total_categories` and `category_counts` are always derived from the
/// `classifications` list; `total_incidents` is the number of classified
/// incidents in this snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationResult {
    pub classifications: Vec<Classification>,
    pub total_incidents: usize,
    pub total_categories: usize,
    pub category_counts: Vec<CategoryCount>,
    /// Model id that produced the classifications.
    pub model: String,
    pub categorization_type: CategorizationType,
    /// Token usage attached to this snapshot (per-batch on the wire,
    /// accumulated in consumer snapshots).
    pub usage: TokenUsage,
}

impl CategorizationResult {
    /// Builds a result from a classification list, recomputing the category
    /// statistics over exactly that list.
    pub fn from_classifications(
        classifications: Vec<Classification>,
        model: impl Into<String>,
        categorization_type: CategorizationType,
        usage: TokenUsage,
    ) -> Self {
        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for classification in &classifications {
            *counts.entry(classification.category.as_str()).or_insert(0) += 1;
        }

        let category_counts: Vec<CategoryCount> = counts
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();

        Self {
            total_incidents: classifications.len(),
            total_categories: category_counts.len(),
            category_counts,
            classifications,
            model: model.into(),
            categorization_type,
            usage,
        }
    }

    /// An empty result for a categorization that classified nothing.
    pub fn empty(
        model: impl Into<String>,
        categorization_type: CategorizationType,
    ) -> Self {
        Self::from_classifications(Vec::new(), model, categorization_type, TokenUsage::default())
    }

    /// Looks up the classification for one incident id.
    pub fn classification_for(&self, incident_id: &str) -> Option<&Classification> {
        self.classifications.iter().find(|c| c.id == incident_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classification(id: &str, category: &str) -> Classification {
        Classification {
            id: id.to_string(),
            category: category.to_string(),
            reason: "test".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_category_stats_are_recomputed() {
        let result = CategorizationResult::from_classifications(
            vec![
                classification("a", "Scan"),
                classification("b", "Scan"),
                classification("c", "DoS"),
            ],
            "test-model",
            CategorizationType::Cert,
            TokenUsage::new(10, 5, 15),
        );

        assert_eq!(result.total_incidents, 3);
        assert_eq!(result.total_categories, 2);
        let dos = result
            .category_counts
            .iter()
            .find(|c| c.category == "DoS")
            .unwrap();
        assert_eq!(dos.count, 1);
        let scan = result
            .category_counts
            .iter()
            .find(|c| c.category == "Scan")
            .unwrap();
        assert_eq!(scan.count, 2);
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let result = CategorizationResult::empty("m", CategorizationType::Llm);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["totalIncidents"], 0);
        assert_eq!(json["totalCategories"], 0);
        assert_eq!(json["categorizationType"], "LLM");
        assert!(json["categoryCounts"].as_array().unwrap().is_empty());
    }
}

//! Analysis run documents.
//!
//! A full analysis run fetches incidents, categorizes them under all three
//! taxonomies, generates one recommendation per incident, and persists the
//! aggregate as a [`SavedAnalysis`] document. Human evaluations attach to
//! individual incidents of a saved document; aggregate evaluation statistics
//! are recomputed on every attach/detach.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classification::{CategoryCount, CategorizationResult};
use crate::incident::Incident;
use crate::recommendation::TicketRecommendation;
use crate::taxonomy::Taxonomy;
use crate::usage::{estimate_cost, CostEstimate, TokenUsage};

/// Pipeline steps of a full analysis run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepId {
    Fetch,
    Cert,
    Llm,
    Nist,
    Recommendations,
    Complete,
}

impl StepId {
    /// All steps in pipeline order.
    pub const ALL: [StepId; 6] = [
        StepId::Fetch,
        StepId::Cert,
        StepId::Llm,
        StepId::Nist,
        StepId::Recommendations,
        StepId::Complete,
    ];

    /// The step tracking one taxonomy's categorization stream.
    pub fn for_taxonomy(taxonomy: Taxonomy) -> StepId {
        match taxonomy {
            Taxonomy::Cert => StepId::Cert,
            Taxonomy::Llm => StepId::Llm,
            Taxonomy::Nist => StepId::Nist,
        }
    }

    /// Human-readable step name.
    pub fn display_name(self) -> &'static str {
        match self {
            StepId::Fetch => "Fetching most recent incidents",
            StepId::Cert => "Categorizing with CERT",
            StepId::Llm => "Categorizing with LLM",
            StepId::Nist => "Categorizing with NIST",
            StepId::Recommendations => "Generating recommendations",
            StepId::Complete => "Analysis complete",
        }
    }
}

/// Status of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

/// Observable state of one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStep {
    pub id: StepId,
    pub name: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_text: Option<String>,
}

impl AnalysisStep {
    /// A step in its initial `pending` state.
    pub fn pending(id: StepId) -> Self {
        Self {
            id,
            name: id.display_name().to_string(),
            status: StepStatus::Pending,
            progress: None,
            progress_text: None,
        }
    }

    /// The initial step list for a fresh run.
    pub fn initial_steps() -> Vec<AnalysisStep> {
        StepId::ALL.iter().copied().map(AnalysisStep::pending).collect()
    }
}

/// One incident's outcomes across the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentAnalysis {
    pub incident: Incident,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<TicketRecommendation>,
}

impl IncidentAnalysis {
    /// Builds the analysis row for one incident from whichever categorization
    /// results completed.
    pub fn build(
        incident: Incident,
        categorizations: &CategorizationSet,
        recommendation: Option<TicketRecommendation>,
    ) -> Self {
        let pick = |result: &Option<CategorizationResult>| {
            result
                .as_ref()
                .and_then(|r| r.classification_for(&incident.id))
                .map(|c| (c.category.clone(), c.reason.clone()))
        };
        let cert = pick(&categorizations.cert);
        let llm = pick(&categorizations.llm);
        let nist = pick(&categorizations.nist);

        Self {
            incident,
            cert_category: cert.as_ref().map(|(c, _)| c.clone()),
            cert_reason: cert.map(|(_, r)| r),
            llm_category: llm.as_ref().map(|(c, _)| c.clone()),
            llm_reason: llm.map(|(_, r)| r),
            nist_category: nist.as_ref().map(|(c, _)| c.clone()),
            nist_reason: nist.map(|(_, r)| r),
            recommendation,
        }
    }
}

/// The categorization results of a run, by taxonomy. A failed taxonomy
/// leaves its slot empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorizationSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<CategorizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<CategorizationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist: Option<CategorizationResult>,
}

impl CategorizationSet {
    pub fn get(&self, taxonomy: Taxonomy) -> Option<&CategorizationResult> {
        match taxonomy {
            Taxonomy::Cert => self.cert.as_ref(),
            Taxonomy::Llm => self.llm.as_ref(),
            Taxonomy::Nist => self.nist.as_ref(),
        }
    }

    pub fn set(&mut self, taxonomy: Taxonomy, result: CategorizationResult) {
        match taxonomy {
            Taxonomy::Cert => self.cert = Some(result),
            Taxonomy::Llm => self.llm = Some(result),
            Taxonomy::Nist => self.nist = Some(result),
        }
    }

    /// Number of taxonomies that produced a result.
    pub fn completed_count(&self) -> usize {
        [&self.cert, &self.llm, &self.nist]
            .iter()
            .filter(|r| r.is_some())
            .count()
    }

    /// First available model id across the results.
    pub fn model_id(&self) -> Option<&str> {
        [&self.cert, &self.llm, &self.nist]
            .iter()
            .find_map(|r| r.as_ref().map(|r| r.model.as_str()))
    }
}

/// Human evaluation of one analyzed incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentEvaluation {
    pub incident_id: String,
    pub evaluator_email: String,
    pub evaluation_timestamp: DateTime<Utc>,
    pub categorization: CategorizationJudgement,
    pub recommendation: RecommendationRating,
}

/// Per-taxonomy correctness judgement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationJudgement {
    #[serde(default)]
    pub comments: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_correct: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist_correct: Option<bool>,
}

/// Recommendation quality rating (0-5 stars).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRating {
    #[serde(default)]
    pub comments: String,
    pub rating: u8,
}

/// Per-incident row of a persisted analysis document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedIncidentRecord {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist_category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_usage: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<IncidentEvaluation>,
}

impl From<&IncidentAnalysis> for AnalyzedIncidentRecord {
    fn from(analysis: &IncidentAnalysis) -> Self {
        Self {
            id: analysis.incident.id.clone(),
            cert_category: analysis.cert_category.clone(),
            cert_reason: analysis.cert_reason.clone(),
            llm_category: analysis.llm_category.clone(),
            llm_reason: analysis.llm_reason.clone(),
            nist_category: analysis.nist_category.clone(),
            nist_reason: analysis.nist_reason.clone(),
            recommendation_id: analysis.recommendation.as_ref().map(|r| r.id.clone()),
            recommendation_text: analysis
                .recommendation
                .as_ref()
                .map(|r| r.recommendation.clone()),
            recommendation_timestamp: analysis.recommendation.as_ref().map(|r| r.timestamp),
            recommendation_usage: analysis.recommendation.as_ref().and_then(|r| r.usage),
            evaluation: None,
        }
    }
}

/// Recommendation token totals across a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationTokenTotals {
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub average_tokens_per_recommendation: u64,
}

/// Categorization token totals, per taxonomy and combined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationTokenTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cert: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm: Option<TokenUsage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nist: Option<TokenUsage>,
    pub total: TokenUsage,
}

/// Combined usage and estimated cost of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokensAndCosts {
    pub total_tokens: TokenUsage,
    pub estimated_costs: CostEstimate,
}

/// Correct / total counters for one taxonomy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccuracyCount {
    pub correct: usize,
    pub total: usize,
}

/// Aggregate statistics over the attached evaluations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationStats {
    pub total_evaluations: usize,
    pub average_recommendation_rating: f64,
    pub categorization_accuracy: CategorizationAccuracy,
}

/// Accuracy counters per taxonomy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizationAccuracy {
    pub cert: AccuracyCount,
    pub llm: AccuracyCount,
    pub nist: AccuracyCount,
}

impl EvaluationStats {
    /// Recomputes statistics over the evaluations currently attached to
    /// `incidents`. Returns `None` when no incident is evaluated.
    pub fn compute(incidents: &[AnalyzedIncidentRecord]) -> Option<EvaluationStats> {
        let evaluations: Vec<&IncidentEvaluation> =
            incidents.iter().filter_map(|i| i.evaluation.as_ref()).collect();
        if evaluations.is_empty() {
            return None;
        }

        let rating_sum: u64 = evaluations
            .iter()
            .map(|e| e.recommendation.rating as u64)
            .sum();

        let accuracy = |pick: fn(&CategorizationJudgement) -> Option<bool>| AccuracyCount {
            correct: evaluations
                .iter()
                .filter(|e| pick(&e.categorization) == Some(true))
                .count(),
            total: evaluations
                .iter()
                .filter(|e| pick(&e.categorization).is_some())
                .count(),
        };

        Some(EvaluationStats {
            total_evaluations: evaluations.len(),
            average_recommendation_rating: rating_sum as f64 / evaluations.len() as f64,
            categorization_accuracy: CategorizationAccuracy {
                cert: accuracy(|j| j.cert_correct),
                llm: accuracy(|j| j.llm_correct),
                nist: accuracy(|j| j.nist_correct),
            },
        })
    }
}

/// Summary block of a saved analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    /// Taxonomies that produced a result (0-3).
    pub total_categorized: usize,
    pub total_recommendations: usize,
    /// Percentage of incidents that received a recommendation.
    pub success_rate: u32,
    pub categories_by_type: CategoriesByType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_tokens: Option<RecommendationTokenTotals>,
    pub categorization_tokens: CategorizationTokenTotals,
    pub total_tokens_and_costs: TokensAndCosts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evaluation_stats: Option<EvaluationStats>,
}

/// Per-taxonomy category histograms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoriesByType {
    pub cert: Vec<CategoryCount>,
    pub llm: Vec<CategoryCount>,
    pub nist: Vec<CategoryCount>,
}

/// A persisted analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnalysis {
    /// Document id (`ANL-<base36 millis>-<suffix>`).
    pub analysis_id: String,
    pub timestamp: DateTime<Utc>,
    pub user_email: String,
    /// Incidents actually analyzed.
    pub total_incidents: usize,
    /// Incident count requested for the run.
    pub incident_count: usize,
    pub model: String,
    pub incidents: Vec<AnalyzedIncidentRecord>,
    pub summary: AnalysisSummary,
}

impl SavedAnalysis {
    /// Builds the document for a completed run.
    pub fn build(
        user_email: impl Into<String>,
        results: &[IncidentAnalysis],
        categorizations: &CategorizationSet,
        requested_count: usize,
    ) -> Self {
        let incidents: Vec<AnalyzedIncidentRecord> =
            results.iter().map(AnalyzedIncidentRecord::from).collect();

        let recommendations_with_usage: Vec<&TicketRecommendation> = results
            .iter()
            .filter_map(|r| r.recommendation.as_ref())
            .filter(|r| r.usage.is_some())
            .collect();
        let recommendation_tokens = if recommendations_with_usage.is_empty() {
            None
        } else {
            let mut total = TokenUsage::default();
            for rec in &recommendations_with_usage {
                if let Some(usage) = &rec.usage {
                    total.accumulate(usage);
                }
            }
            Some(RecommendationTokenTotals {
                total_prompt_tokens: total.prompt_tokens,
                total_completion_tokens: total.completion_tokens,
                total_tokens: total.total_tokens,
                average_tokens_per_recommendation: (total.total_tokens as f64
                    / recommendations_with_usage.len() as f64)
                    .round() as u64,
            })
        };

        let mut categorization_total = TokenUsage::default();
        let usage_of = |result: &Option<CategorizationResult>| result.as_ref().map(|r| r.usage);
        for usage in [
            usage_of(&categorizations.cert),
            usage_of(&categorizations.llm),
            usage_of(&categorizations.nist),
        ]
        .into_iter()
        .flatten()
        {
            categorization_total.accumulate(&usage);
        }

        let mut all_tokens = categorization_total;
        if let Some(rec_tokens) = &recommendation_tokens {
            all_tokens.accumulate(&TokenUsage::new(
                rec_tokens.total_prompt_tokens,
                rec_tokens.total_completion_tokens,
                rec_tokens.total_tokens,
            ));
        }

        let model = categorizations.model_id().unwrap_or("unknown").to_string();
        let total_recommendations = results.iter().filter(|r| r.recommendation.is_some()).count();
        let success_rate = if results.is_empty() {
            0
        } else {
            ((total_recommendations as f64 / results.len() as f64) * 100.0).round() as u32
        };

        let histogram = |result: &Option<CategorizationResult>| {
            result
                .as_ref()
                .map(|r| r.category_counts.clone())
                .unwrap_or_default()
        };

        Self {
            analysis_id: generate_analysis_id(),
            timestamp: Utc::now(),
            user_email: user_email.into(),
            total_incidents: results.len(),
            incident_count: requested_count,
            model: model.clone(),
            incidents,
            summary: AnalysisSummary {
                total_categorized: categorizations.completed_count(),
                total_recommendations,
                success_rate,
                categories_by_type: CategoriesByType {
                    cert: histogram(&categorizations.cert),
                    llm: histogram(&categorizations.llm),
                    nist: histogram(&categorizations.nist),
                },
                recommendation_tokens,
                categorization_tokens: CategorizationTokenTotals {
                    cert: usage_of(&categorizations.cert),
                    llm: usage_of(&categorizations.llm),
                    nist: usage_of(&categorizations.nist),
                    total: categorization_total,
                },
                total_tokens_and_costs: TokensAndCosts {
                    total_tokens: all_tokens,
                    estimated_costs: estimate_cost(&all_tokens, &model),
                },
                evaluation_stats: None,
            },
        }
    }

    /// Attaches (or replaces) the evaluation of one incident and recomputes
    /// the aggregate statistics. Returns false if the incident is not part of
    /// this analysis.
    pub fn attach_evaluation(&mut self, evaluation: IncidentEvaluation) -> bool {
        let Some(record) = self
            .incidents
            .iter_mut()
            .find(|i| i.id == evaluation.incident_id)
        else {
            return false;
        };
        record.evaluation = Some(evaluation);
        self.summary.evaluation_stats = EvaluationStats::compute(&self.incidents);
        true
    }

    /// Removes the evaluation of one incident and recomputes the aggregate
    /// statistics. Returns false if no evaluation was attached.
    pub fn detach_evaluation(&mut self, incident_id: &str) -> bool {
        let Some(record) = self
            .incidents
            .iter_mut()
            .find(|i| i.id == incident_id && i.evaluation.is_some())
        else {
            return false;
        };
        record.evaluation = None;
        self.summary.evaluation_stats = EvaluationStats::compute(&self.incidents);
        true
    }
}

/// Generates an analysis document id: `ANL-<base36 millis>-<suffix>`.
pub fn generate_analysis_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("ANL-{}-{}", to_base36(millis), &suffix[..5]).to_uppercase()
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::Classification;
    use crate::taxonomy::CategorizationType;

    fn classification(id: &str, category: &str) -> Classification {
        Classification {
            id: id.to_string(),
            category: category.to_string(),
            reason: "because".to_string(),
            timestamp: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn result(
        ctype: CategorizationType,
        classifications: Vec<Classification>,
        usage: TokenUsage,
    ) -> CategorizationResult {
        CategorizationResult::from_classifications(classifications, "test-model", ctype, usage)
    }

    fn sample_run() -> (Vec<IncidentAnalysis>, CategorizationSet) {
        let incidents: Vec<Incident> = (0..2)
            .map(|i| Incident {
                id: format!("INC-{}", i),
                content: format!("incident {}", i),
                timestamp: Utc::now(),
                source: None,
            })
            .collect();

        let mut categorizations = CategorizationSet::default();
        categorizations.set(
            Taxonomy::Cert,
            result(
                CategorizationType::Cert,
                vec![classification("INC-0", "Scan"), classification("INC-1", "DoS")],
                TokenUsage::new(100, 50, 150),
            ),
        );
        categorizations.set(
            Taxonomy::Nist,
            result(
                CategorizationType::Nist,
                vec![classification("INC-0", "CAT 5")],
                TokenUsage::new(80, 40, 120),
            ),
        );

        let results: Vec<IncidentAnalysis> = incidents
            .into_iter()
            .enumerate()
            .map(|(i, incident)| {
                let recommendation = if i == 0 {
                    Some(TicketRecommendation::new(
                        incident.id.clone(),
                        "Patch the host.",
                        Some(TokenUsage::new(30, 70, 100)),
                    ))
                } else {
                    None
                };
                IncidentAnalysis::build(incident, &categorizations, recommendation)
            })
            .collect();

        (results, categorizations)
    }

    #[test]
    fn test_incident_analysis_picks_per_taxonomy_classifications() {
        let (results, _) = sample_run();
        assert_eq!(results[0].cert_category.as_deref(), Some("Scan"));
        assert_eq!(results[0].nist_category.as_deref(), Some("CAT 5"));
        assert!(results[0].llm_category.is_none());
        assert_eq!(results[1].cert_category.as_deref(), Some("DoS"));
        assert!(results[1].nist_category.is_none());
    }

    #[test]
    fn test_saved_analysis_summary() {
        let (results, categorizations) = sample_run();
        let saved = SavedAnalysis::build("analyst@example.com", &results, &categorizations, 100);

        assert!(saved.analysis_id.starts_with("ANL-"));
        assert_eq!(saved.total_incidents, 2);
        assert_eq!(saved.incident_count, 100);
        assert_eq!(saved.model, "test-model");
        assert_eq!(saved.summary.total_categorized, 2);
        assert_eq!(saved.summary.total_recommendations, 1);
        assert_eq!(saved.summary.success_rate, 50);

        let cat_tokens = &saved.summary.categorization_tokens;
        assert_eq!(cat_tokens.total.total_tokens, 270);
        assert!(cat_tokens.llm.is_none());

        let rec_tokens = saved.summary.recommendation_tokens.as_ref().unwrap();
        assert_eq!(rec_tokens.total_tokens, 100);
        assert_eq!(rec_tokens.average_tokens_per_recommendation, 100);

        assert_eq!(
            saved.summary.total_tokens_and_costs.total_tokens.total_tokens,
            370
        );
        assert!(saved.summary.evaluation_stats.is_none());
    }

    #[test]
    fn test_evaluation_attach_and_detach_recompute_stats() {
        let (results, categorizations) = sample_run();
        let mut saved = SavedAnalysis::build("analyst@example.com", &results, &categorizations, 2);

        let attached = saved.attach_evaluation(IncidentEvaluation {
            incident_id: "INC-0".to_string(),
            evaluator_email: "reviewer@example.com".to_string(),
            evaluation_timestamp: Utc::now(),
            categorization: CategorizationJudgement {
                comments: "cert looks right".to_string(),
                cert_correct: Some(true),
                llm_correct: None,
                nist_correct: Some(false),
            },
            recommendation: RecommendationRating {
                comments: "actionable".to_string(),
                rating: 4,
            },
        });
        assert!(attached);

        let stats = saved.summary.evaluation_stats.as_ref().unwrap();
        assert_eq!(stats.total_evaluations, 1);
        assert_eq!(stats.average_recommendation_rating, 4.0);
        assert_eq!(stats.categorization_accuracy.cert.correct, 1);
        assert_eq!(stats.categorization_accuracy.cert.total, 1);
        assert_eq!(stats.categorization_accuracy.nist.correct, 0);
        assert_eq!(stats.categorization_accuracy.nist.total, 1);
        assert_eq!(stats.categorization_accuracy.llm.total, 0);

        assert!(saved.detach_evaluation("INC-0"));
        assert!(saved.summary.evaluation_stats.is_none());
        assert!(!saved.detach_evaluation("INC-0"));
    }

    #[test]
    fn test_attach_evaluation_for_unknown_incident_is_rejected() {
        let (results, categorizations) = sample_run();
        let mut saved = SavedAnalysis::build("analyst@example.com", &results, &categorizations, 2);
        let attached = saved.attach_evaluation(IncidentEvaluation {
            incident_id: "INC-missing".to_string(),
            evaluator_email: "reviewer@example.com".to_string(),
            evaluation_timestamp: Utc::now(),
            categorization: CategorizationJudgement::default(),
            recommendation: RecommendationRating::default(),
        });
        assert!(!attached);
    }

    #[test]
    fn test_base36_encoding() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}

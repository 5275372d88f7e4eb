//! Batch classification over the Gemini client.
//!
//! One prompt per taxonomy; all three go through the same engine interface.
//! The model is instructed to return every batch id exactly once, but that
//! is a prompt-level contract only; callers validate ids against the batch.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{instrument, warn};

use ta_core::{
    BatchClassification, Classification, ClassificationEngine, EngineError, Incident, Taxonomy,
};

use crate::gemini::{GeminiClient, GenerateRequest, GenerationConfig};

const CLASSIFICATION_TEMPERATURE: f64 = 0.1;
const CLASSIFICATION_MAX_TOKENS: u32 = 4000;

const CERT_CATEGORY_GUIDE: &str = "\
DoS: denial-of-service attacks taking a service, device, or network out of operation.\n\
Fraud: attempts to obtain an advantage, financial or otherwise, through deception; includes \
phishing pages and malware used to steal information or credentials.\n\
Intrusion: a successful attack resulting in unauthorized access to a computer or network.\n\
Scan: network scanning, password brute forcing, and other unsuccessful attacks against \
publicly reachable network services.\n\
Web: attacks specifically compromising web servers or defacing websites.\n\
Other: incidents that fit none of the previous categories.";

const NIST_CATEGORY_GUIDE: &str = "\
CAT 0: exercises, network defense testing, or simulations.\n\
CAT 1: unauthorized logical or physical access.\n\
CAT 2: denial of service disrupting normal network or service operation.\n\
CAT 3: successful installation of malicious code (virus, worm, trojan, or other malware).\n\
CAT 4: improper usage violating acceptable computing policies.\n\
CAT 5: scans, probes, reconnaissance, or unsuccessful access attempts.\n\
CAT 6: potential incidents under investigation (unexplained anomalies or reports).";

/// [`ClassificationEngine`] backed by Gemini structured output.
pub struct GeminiClassificationEngine {
    client: Arc<GeminiClient>,
}

impl GeminiClassificationEngine {
    pub fn new(client: Arc<GeminiClient>) -> Self {
        Self { client }
    }

    fn build_prompt(&self, batch: &[Incident], taxonomy: Taxonomy) -> String {
        let batch_ids: Vec<&str> = batch.iter().map(|i| i.id.as_str()).collect();
        let incidents_json = serde_json::to_string(batch).unwrap_or_default();
        let ids_json = serde_json::to_string(&batch_ids).unwrap_or_default();

        let task = match taxonomy {
            Taxonomy::Cert => format!(
                "Analyze the following {} security incidents and classify each one into one \
                 of the CERT categories:\n{}",
                batch.len(),
                CERT_CATEGORY_GUIDE
            ),
            Taxonomy::Llm => format!(
                "Analyze the following {} security incidents and create appropriate \
                 categories for them. Be consistent when naming categories.",
                batch.len()
            ),
            Taxonomy::Nist => format!(
                "Analyze the following {} security incidents and classify each one according \
                 to the NIST SP 800-61r2 categories:\n{}",
                batch.len(),
                NIST_CATEGORY_GUIDE
            ),
        };

        format!(
            "You are an information security specialist.\n{task}\n\n\
             CRITICAL RULES:\n\
             1. Each id must appear EXACTLY ONCE in the classifications.\n\
             2. The total number of classifications MUST equal the number of incidents ({count}).\n\
             3. Use ONLY the ids listed below, unmodified.\n\
             4. Do NOT duplicate any id.\n\n\
             Available ids: {ids}\n\n\
             Return a JSON object with a \"classifications\" array whose entries carry only \
             the fields id, category, reason and timestamp. Explain in the reason field why \
             you chose that category. Do NOT include incident content in the result; use the \
             content only for the analysis.\n\n\
             Incidents: {incidents}",
            task = task,
            count = batch.len(),
            ids = ids_json,
            incidents = incidents_json,
        )
    }

    fn parse_classifications(
        &self,
        text: &str,
        taxonomy: Taxonomy,
    ) -> Result<Vec<Classification>, EngineError> {
        let parsed: RawClassificationResponse = serde_json::from_str(text).map_err(|e| {
            EngineError::InvalidResponse(format!("classification payload was not valid JSON: {}", e))
        })?;

        let mut classifications = Vec::with_capacity(parsed.classifications.len());
        for raw in parsed.classifications {
            if !taxonomy.is_valid_category(&raw.category) {
                warn!(
                    taxonomy = %taxonomy,
                    category = %raw.category,
                    "Dropping classification with category outside the taxonomy"
                );
                continue;
            }
            classifications.push(Classification {
                id: raw.id,
                category: raw.category,
                reason: raw.reason,
                timestamp: raw.timestamp.unwrap_or_default(),
            });
        }
        Ok(classifications)
    }
}

#[async_trait]
impl ClassificationEngine for GeminiClassificationEngine {
    #[instrument(skip(self, batch), fields(taxonomy = %taxonomy, batch_len = batch.len()))]
    async fn classify(
        &self,
        batch: &[Incident],
        taxonomy: Taxonomy,
    ) -> Result<BatchClassification, EngineError> {
        let prompt = self.build_prompt(batch, taxonomy);
        let generated = self
            .client
            .generate(GenerateRequest::single_turn(
                None,
                &prompt,
                GenerationConfig::json(CLASSIFICATION_TEMPERATURE, CLASSIFICATION_MAX_TOKENS),
            ))
            .await?;

        let classifications = self.parse_classifications(&generated.text, taxonomy)?;
        Ok(BatchClassification {
            classifications,
            model: self.client.model().to_string(),
            usage: generated.usage,
        })
    }

    fn model_id(&self) -> &str {
        self.client.model()
    }
}

#[derive(Debug, Deserialize)]
struct RawClassificationResponse {
    #[serde(default)]
    classifications: Vec<RawClassification>,
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    id: String,
    category: String,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::GeminiConfig;

    fn engine() -> GeminiClassificationEngine {
        let client = GeminiClient::new(GeminiConfig::new("test-key")).unwrap();
        GeminiClassificationEngine::new(Arc::new(client))
    }

    fn incidents(n: usize) -> Vec<Incident> {
        (0..n)
            .map(|i| Incident::new(format!("incident {}", i), "test"))
            .collect()
    }

    #[test]
    fn test_prompt_embeds_ids_and_rules() {
        let engine = engine();
        let batch = incidents(3);
        let prompt = engine.build_prompt(&batch, Taxonomy::Cert);

        assert!(prompt.contains("EXACTLY ONCE"));
        assert!(prompt.contains(&batch[0].id));
        assert!(prompt.contains("CERT categories"));
        assert!(prompt.contains("DoS:"));

        let nist_prompt = engine.build_prompt(&batch, Taxonomy::Nist);
        assert!(nist_prompt.contains("NIST SP 800-61r2"));
        assert!(nist_prompt.contains("CAT 5:"));

        let llm_prompt = engine.build_prompt(&batch, Taxonomy::Llm);
        assert!(llm_prompt.contains("create appropriate"));
    }

    #[test]
    fn test_parse_drops_foreign_categories_for_fixed_taxonomies() {
        let engine = engine();
        let payload = r#"{"classifications": [
            {"id": "a", "category": "Scan", "reason": "probing", "timestamp": "t"},
            {"id": "b", "category": "NotACategory", "reason": "?", "timestamp": "t"}
        ]}"#;
        let parsed = engine.parse_classifications(payload, Taxonomy::Cert).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "a");
    }

    #[test]
    fn test_parse_keeps_open_scheme_categories() {
        let engine = engine();
        let payload = r#"{"classifications": [
            {"id": "a", "category": "Supply Chain Compromise", "reason": "vendor", "timestamp": "t"}
        ]}"#;
        let parsed = engine.parse_classifications(payload, Taxonomy::Llm).unwrap();
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_parse_rejects_invalid_json() {
        let engine = engine();
        let err = engine
            .parse_classifications("not json", Taxonomy::Cert)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidResponse(_)));
    }
}

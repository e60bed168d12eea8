//! Optional enrichment of fields the rules left `unknown`.

use super::RuleClassifier;
use crate::error::Result;
use crate::types::{is_resolved, Field, UrlRecord};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

/// External classifier consulted for a single unresolved field.
///
/// `Ok(None)` means the collaborator could not decide either.
#[async_trait]
pub trait TextClassifier: Send + Sync {
    async fn classify_unknown(&self, field: Field, tokens: &[String]) -> Result<Option<String>>;
}

/// Counters reported after an enrichment pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichStats {
    pub requested: usize,
    pub resolved: usize,
    pub failed: usize,
}

/// Ask `classifier` about every `unknown` action or object, one call per field.
///
/// Resolved fields are never sent. Failures leave the field `unknown`. At most
/// `concurrency` calls are in flight; results are applied in record order.
/// Every record with a newly resolved field is passed through
/// [`RuleClassifier::rederive`].
pub async fn enrich_records(
    records: &mut [UrlRecord],
    classifier: &dyn TextClassifier,
    rules: &RuleClassifier,
    concurrency: usize,
) -> EnrichStats {
    let mut requests = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        if !record.has_action() {
            requests.push((idx, Field::Action, record.tokens.clone()));
        }
        if !record.has_object() {
            requests.push((idx, Field::Object, record.tokens.clone()));
        }
    }

    let mut stats = EnrichStats {
        requested: requests.len(),
        ..EnrichStats::default()
    };
    if requests.is_empty() {
        return stats;
    }

    let answers: Vec<_> = stream::iter(requests)
        .map(|(idx, field, tokens)| async move {
            let answer = classifier.classify_unknown(field, &tokens).await;
            (idx, field, answer)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut changed = Vec::new();
    for (idx, field, answer) in answers {
        let record = &mut records[idx];
        match answer {
            Ok(Some(tag)) if is_resolved(tag.trim()) => {
                let tag = tag.trim().to_string();
                debug!(url = %record.url, %field, %tag, "enriched field");
                match field {
                    Field::Action => record.action = tag,
                    Field::Object => record.object = tag,
                }
                record.notes.push_str(&format!("; {field}=enriched"));
                if changed.last() != Some(&idx) {
                    changed.push(idx);
                }
                stats.resolved += 1;
            }
            Ok(_) => {}
            Err(e) => {
                warn!(url = %record.url, %field, "enrichment failed, keeping unknown: {e}");
                stats.failed += 1;
            }
        }
    }

    for idx in changed {
        rules.rederive(&mut records[idx]);
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::normalizer::normalize;
    use crate::types::UNKNOWN;
    use std::sync::Mutex;

    /// Answers from a fixed table and records every call it receives.
    struct ScriptedClassifier {
        calls: Mutex<Vec<(Field, Vec<String>)>>,
        fail: bool,
    }

    impl ScriptedClassifier {
        fn new(fail: bool) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl TextClassifier for ScriptedClassifier {
        async fn classify_unknown(&self, field: Field, tokens: &[String]) -> Result<Option<String>> {
            self.calls.lock().unwrap().push((field, tokens.to_vec()));
            if self.fail {
                return Err(Error::Enrichment("backend unavailable".into()));
            }
            Ok(match (field, tokens.first().map(String::as_str)) {
                (Field::Action, Some("headshots")) => Some("generate".into()),
                (Field::Object, Some("eraser")) => Some("unknown".into()),
                _ => None,
            })
        }
    }

    fn records(rules: &RuleClassifier, urls: &[&str]) -> Vec<UrlRecord> {
        urls.iter()
            .map(|u| rules.classify_url(normalize(u).unwrap(), None))
            .collect()
    }

    #[tokio::test]
    async fn test_only_unknown_fields_are_sent() {
        let rules = RuleClassifier::default();
        let mut recs = records(
            &rules,
            &[
                "https://example.com/remove-background",
                "https://example.com/headshots/linkedin",
            ],
        );
        let scripted = ScriptedClassifier::new(false);
        let stats = enrich_records(&mut recs, &scripted, &rules, 4).await;

        let calls = scripted.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, Field::Action);
        assert_eq!(stats.requested, 1);
        assert_eq!(stats.resolved, 1);

        assert_eq!(recs[0].action, "remove");
        assert_eq!(recs[1].action, "generate");
        assert_eq!(recs[1].object, "headshot");
        assert_eq!(recs[1].intent_category, "generate-headshot");
        assert!(recs[1].notes.contains("action=enriched; intent=derived (rederived)"));
        assert_eq!(recs[1].description, "Generate a new headshot from a prompt or source material.");
    }

    #[tokio::test]
    async fn test_unknown_answer_stays_unknown_and_category_rederives() {
        let rules = RuleClassifier::default();
        let mut recs = records(&rules, &["https://example.com/eraser"]);
        assert_eq!(recs[0].intent_category, UNKNOWN);

        let scripted = ScriptedClassifier::new(false);
        let stats = enrich_records(&mut recs, &scripted, &rules, 1).await;
        assert_eq!(stats.resolved, 0);
        assert_eq!(recs[0].object, UNKNOWN);
    }

    #[tokio::test]
    async fn test_failures_never_fail_the_pass() {
        let rules = RuleClassifier::default();
        let mut recs = records(&rules, &["https://example.com/about", "https://example.com/team"]);
        let before = recs.clone();

        let scripted = ScriptedClassifier::new(true);
        let stats = enrich_records(&mut recs, &scripted, &rules, 2).await;
        assert_eq!(stats.requested, 4);
        assert_eq!(stats.failed, 4);
        assert_eq!(recs, before);
    }
}

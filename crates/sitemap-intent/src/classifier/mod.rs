//! Rule-based URL intent classification.
//!
//! Slug tokens are matched against three ordered dictionaries (action, object,
//! scene); the resolved action/object pair is then looked up in the intent
//! table. Anything without a match is the literal `unknown`.

pub mod enrich;
pub mod heuristics;
pub mod rules;

pub use enrich::{enrich_records, TextClassifier};
pub use rules::{Dictionary, IntentRule, IntentSource, IntentTable, KeywordSpec, MatchKind, RuleSet};

use crate::normalizer::NormalizedUrl;
use crate::types::{is_resolved, UrlRecord, UNKNOWN};
use rules::KeywordMatch;
use std::collections::HashSet;

/// Tags assigned to one URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub action: String,
    pub object: String,
    pub scene: String,
    pub intent_category: String,
    pub notes: String,
}

/// Deterministic, side-effect-free classifier.
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    actions: Dictionary,
    objects: Dictionary,
    scenes: Dictionary,
    intents: IntentTable,
    stemming: bool,
    stopwords: HashSet<String>,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self::from_rules(&RuleSet::default())
    }
}

impl RuleClassifier {
    /// Classifier with exact matching only.
    pub fn new(
        actions: Dictionary,
        objects: Dictionary,
        scenes: Dictionary,
        intents: IntentTable,
    ) -> Self {
        Self {
            actions,
            objects,
            scenes,
            intents,
            stemming: false,
            stopwords: HashSet::new(),
        }
    }

    pub fn from_rules(rules: &RuleSet) -> Self {
        Self::new(
            rules.action_dictionary(),
            rules.object_dictionary(),
            rules.scene_dictionary(),
            rules.intent_table(),
        )
        .with_stemming(rules.stemming)
        .with_stopwords(rules.stopwords.iter().map(String::as_str))
    }

    pub fn with_stemming(mut self, enabled: bool) -> Self {
        self.stemming = enabled;
        self
    }

    pub fn with_stopwords<'a>(mut self, words: impl IntoIterator<Item = &'a str>) -> Self {
        self.stopwords = words.into_iter().map(str::to_lowercase).collect();
        self
    }

    /// `tokens` without stopwords, order kept.
    pub fn filter_tokens(&self, tokens: &[String]) -> Vec<String> {
        tokens
            .iter()
            .filter(|t| !self.stopwords.contains(t.as_str()))
            .cloned()
            .collect()
    }

    /// Classify a token list. `path` only feeds the notes.
    pub fn classify(&self, tokens: &[String], path: &str) -> Classification {
        let action = self.actions.lookup(tokens, self.stemming);
        let object = self.objects.lookup(tokens, self.stemming);
        let scene = self.scenes.lookup(tokens, self.stemming);

        let mut notes = Vec::with_capacity(4);
        if tokens.is_empty() {
            notes.push(format!("no slug tokens in '{path}'"));
        }
        notes.push(describe("action", action.as_ref()));
        notes.push(describe("object", object.as_ref()));
        notes.push(describe("scene", scene.as_ref()));

        let action = action.map(|m| m.tag).unwrap_or_else(|| UNKNOWN.to_string());
        let object = object.map(|m| m.tag).unwrap_or_else(|| UNKNOWN.to_string());
        let scene = scene.map(|m| m.tag).unwrap_or_else(|| UNKNOWN.to_string());

        let (intent_category, source) = self.intent_for(&action, &object);
        notes.push(match source {
            Some(source) => format!("intent={}", source_label(source)),
            None => "intent=none".to_string(),
        });

        Classification {
            action,
            object,
            scene,
            intent_category,
            notes: notes.join("; "),
        }
    }

    /// Intent category for an action/object pair, `unknown` when no rule applies.
    pub fn intent_for(&self, action: &str, object: &str) -> (String, Option<IntentSource>) {
        let action = is_resolved(action).then_some(action);
        let object = is_resolved(object).then_some(object);
        match self.intents.lookup(action, object) {
            Some((category, source)) => (category, Some(source)),
            None => (UNKNOWN.to_string(), None),
        }
    }

    /// Build a full record for a normalized URL.
    pub fn classify_url(&self, normalized: NormalizedUrl, lastmod: Option<String>) -> UrlRecord {
        let c = self.classify(&normalized.tokens, &normalized.path);
        let mut record = UrlRecord {
            url: normalized.url,
            path: normalized.path,
            depth: normalized.depth,
            tokens: normalized.tokens,
            action: c.action,
            object: c.object,
            scene: c.scene,
            intent_category: c.intent_category,
            notes: c.notes,
            description: String::new(),
            filtered_tokens: Vec::new(),
            similar_keywords: Vec::new(),
            lastmod,
            is_new: false,
        };
        self.annotate(&mut record);
        record
    }

    /// Refresh the fields that depend on `action` and `object` after either
    /// changed outside the rules.
    ///
    /// Pair-table categories are kept. Any other category, including
    /// `unknown`, is looked up again so a newly resolved pair can take
    /// precedence over an action-only, object-only, or derived hit.
    pub fn rederive(&self, record: &mut UrlRecord) {
        if !self.has_pair_rule(record) {
            let (category, source) = self.intent_for(&record.action, &record.object);
            record.intent_category = category;
            let label = source.map(source_label).unwrap_or("none");
            record.notes.push_str(&format!("; intent={label} (rederived)"));
        }
        self.annotate(record);
    }

    fn has_pair_rule(&self, record: &UrlRecord) -> bool {
        self.intents
            .lookup(Some(record.action.as_str()), Some(record.object.as_str()))
            .is_some_and(|(category, source)| {
                source == IntentSource::Pair && category == record.intent_category
            })
    }

    /// Fill `filtered_tokens`, `similar_keywords` and `description`.
    fn annotate(&self, record: &mut UrlRecord) {
        record.filtered_tokens = self.filter_tokens(&record.tokens);
        let action_synonyms = if record.has_action() {
            self.actions.keywords_for(&record.action)
        } else {
            Vec::new()
        };
        let object_synonyms = if record.has_object() {
            self.objects.keywords_for(&record.object)
        } else {
            Vec::new()
        };
        let words = if record.filtered_tokens.is_empty() {
            &record.tokens
        } else {
            &record.filtered_tokens
        };
        record.similar_keywords =
            heuristics::related_keywords(&action_synonyms, &object_synonyms, words, &self.stopwords);
        record.description = heuristics::describe_intent(&record.action, &record.object);
    }
}

fn describe(field: &str, hit: Option<&KeywordMatch>) -> String {
    match hit {
        Some(m) => {
            let kind = match m.kind {
                MatchKind::Exact => "exact",
                MatchKind::Stem => "stem",
            };
            format!("{field}={} ({kind} '{}' @{})", m.tag, m.keyword, m.position)
        }
        None => format!("{field}=none"),
    }
}

fn source_label(source: IntentSource) -> &'static str {
    match source {
        IntentSource::Pair => "pair",
        IntentSource::ActionOnly => "action-only",
        IntentSource::ObjectOnly => "object-only",
        IntentSource::Derived => "derived",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::normalize;

    fn toks(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn scenario_classifier() -> RuleClassifier {
        let mut intents = IntentTable::default();
        intents.push_pair("remove", "background", "remove-background");
        RuleClassifier::new(
            Dictionary::from_pairs([("remove", "remove")]),
            Dictionary::from_pairs([("background", "background")]),
            Dictionary::new(),
            intents,
        )
    }

    #[test]
    fn test_remove_background_scenario() {
        let c = scenario_classifier().classify(&toks(&["remove", "background"]), "/remove-background");
        assert_eq!(c.action, "remove");
        assert_eq!(c.object, "background");
        assert_eq!(c.intent_category, "remove-background");
        assert_eq!(c.scene, UNKNOWN);
        assert!(c.notes.contains("intent=pair"));
    }

    #[test]
    fn test_unmatched_tokens_are_unknown() {
        let classifier = RuleClassifier::default();
        let c = classifier.classify(&toks(&["about", "team"]), "/about/team");
        assert_eq!(c.action, UNKNOWN);
        assert_eq!(c.object, UNKNOWN);
        assert_eq!(c.scene, UNKNOWN);
        assert_eq!(c.intent_category, UNKNOWN);
    }

    #[test]
    fn test_pair_without_table_row_is_unknown() {
        let c = scenario_classifier().classify(&toks(&["remove", "noise"]), "/remove-noise");
        assert_eq!(c.action, "remove");
        assert_eq!(c.object, UNKNOWN);
        assert_eq!(c.intent_category, UNKNOWN);
    }

    #[test]
    fn test_default_rules_use_synonyms_and_derive() {
        let classifier = RuleClassifier::default();
        let c = classifier.classify(&toks(&["tools", "erase", "bg"]), "/tools/erase-bg");
        assert_eq!(c.action, "erase");
        assert_eq!(c.object, "background");
        assert_eq!(c.intent_category, "erase-background");

        let c = classifier.classify(&toks(&["linkedin", "headshot"]), "/linkedin-headshot");
        assert_eq!(c.action, UNKNOWN);
        assert_eq!(c.object, "headshot");
        assert_eq!(c.scene, "linkedin");
        assert_eq!(c.intent_category, "general-headshot");
    }

    #[test]
    fn test_classification_is_deterministic() {
        let classifier = RuleClassifier::default();
        let a = classifier.classify_url(
            normalize("https://example.com/ai/upscale-photo-4k").unwrap(),
            Some("2026-01-01".into()),
        );
        let b = classifier.classify_url(
            normalize("https://example.com/ai/upscale-photo-4k").unwrap(),
            Some("2026-01-01".into()),
        );
        assert_eq!(a, b);
        assert_eq!(a.action, "upscale");
        assert_eq!(a.object, "photo");
        assert!(!a.is_new);
    }

    #[test]
    fn test_record_annotations() {
        let classifier = RuleClassifier::default();
        let rec = classifier.classify_url(normalize("https://example.com/ai/remove-bg").unwrap(), None);
        assert_eq!(rec.tokens, toks(&["ai", "remove", "bg"]));
        assert_eq!(rec.filtered_tokens, toks(&["remove", "bg"]));
        assert_eq!(rec.description, "Cut the subject out of its background for reuse.");
        // Synonyms first, then the filtered tokens, never a stopword.
        assert_eq!(rec.similar_keywords[..4], toks(&["delete", "strip", "remover", "removal"]));
        assert!(rec.similar_keywords.contains(&"backdrop".to_string()));
        assert!(!rec.similar_keywords.contains(&"ai".to_string()));

        let rec = classifier.classify_url(normalize("https://example.com/blog/about").unwrap(), None);
        assert!(rec.filtered_tokens.is_empty());
        assert!(rec.description.is_empty());
    }

    #[test]
    fn test_rederive_prefers_new_pair_row() {
        let mut rules = RuleSet::default();
        rules.intents.push(IntentRule {
            action: Some("generate".into()),
            object: Some("headshot".into()),
            category: "ai-headshots".into(),
        });
        let classifier = RuleClassifier::from_rules(&rules);
        let mut rec = classifier.classify_url(normalize("https://example.com/headshots/linkedin").unwrap(), None);
        assert_eq!(rec.intent_category, "general-headshot");

        rec.action = "generate".into();
        classifier.rederive(&mut rec);
        assert_eq!(rec.intent_category, "ai-headshots");
        assert!(rec.notes.ends_with("intent=pair (rederived)"));
        assert_eq!(rec.description, "Generate a new headshot from a prompt or source material.");
    }

    #[test]
    fn test_root_path_notes() {
        let c = RuleClassifier::default().classify(&[], "/");
        assert_eq!(c.intent_category, UNKNOWN);
        assert!(c.notes.starts_with("no slug tokens"));
    }
}

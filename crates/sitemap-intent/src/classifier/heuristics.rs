//! Plain-language descriptions and related keywords for classified URLs.

use crate::types::is_resolved;
use std::collections::HashSet;

/// One-sentence reading of an action/object pair. Empty when neither side
/// is resolved.
pub fn describe_intent(action: &str, object: &str) -> String {
    let object = is_resolved(object).then_some(object);
    let target = object.unwrap_or("content");
    if !is_resolved(action) {
        return object
            .map(|o| format!("Utility around {o}."))
            .unwrap_or_default();
    }
    match (action, object) {
        ("remove", Some("background")) => {
            "Cut the subject out of its background for reuse.".to_string()
        }
        ("remove", _) => format!("Remove unwanted parts or artifacts from the {target}."),
        ("unblur", _) => format!("Turn a blurry {target} into a clear, readable one."),
        ("enhance", _) => format!("Improve the quality of the {target}: sharpness, contrast, detail."),
        ("upscale", _) => format!("Increase the resolution of the {target} without losing quality."),
        ("denoise", _) => format!("Reduce noise and grain in the {target}."),
        ("restore", _) => format!("Repair a damaged or old {target}."),
        ("convert", _) => format!("Convert the {target} to another format."),
        ("generate", _) => format!("Generate a new {target} from a prompt or source material."),
        ("colorize", _) => format!("Add or correct color in the {target}."),
        ("blur", _) => format!("Blur the {target} for focus or privacy."),
        ("fix", _) => format!("Fix defects in the {target}."),
        ("sharpen", _) => format!("Sharpen edges and detail in the {target}."),
        ("compress", _) => format!("Make the {target} smaller on disk."),
        (other, _) => format!("{} the {target}.", capitalize(other)),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Synonyms of the action, then of the object, then the remaining tokens,
/// without stopwords or repeats.
pub fn related_keywords(
    action_synonyms: &[&str],
    object_synonyms: &[&str],
    tokens: &[String],
    stopwords: &HashSet<String>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    action_synonyms
        .iter()
        .chain(object_synonyms)
        .copied()
        .chain(tokens.iter().map(String::as_str))
        .filter(|w| !stopwords.contains(*w))
        .filter(|w| seen.insert(*w))
        .map(str::to_string)
        .collect()
}

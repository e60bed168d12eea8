//! Ordered keyword dictionaries and the intent-category table.
//!
//! Every lookup is first-match-wins over declaration order. Two dictionaries
//! holding the same keywords in a different order may classify the same slug
//! differently; that ordering is part of the rule set.

use serde::{Deserialize, Serialize};

/// How a keyword matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Stem,
}

/// A dictionary hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatch {
    pub tag: String,
    pub keyword: String,
    /// Index of the first matched token.
    pub position: usize,
    pub kind: MatchKind,
}

#[derive(Debug, Clone)]
struct Keyword {
    raw: String,
    words: Vec<String>,
    stems: Vec<String>,
    tag: String,
}

/// An ordered list of `(pattern, tag)` pairs.
///
/// A pattern is a keyword or a phrase (`reduce-noise`, `remove background`)
/// and matches consecutive slug tokens.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<Keyword>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(pattern, tag)` pairs, keeping their order.
    pub fn from_pairs<I, P, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, T)>,
        P: AsRef<str>,
        T: Into<String>,
    {
        let mut dict = Self::new();
        for (pattern, tag) in pairs {
            dict.push(pattern.as_ref(), tag);
        }
        dict
    }

    /// Append an entry. Patterns that tokenize to nothing are ignored.
    pub fn push(&mut self, pattern: &str, tag: impl Into<String>) {
        let words = split_pattern(pattern);
        if words.is_empty() {
            return;
        }
        let stems = words.iter().map(|w| stem(w)).collect();
        self.entries.push(Keyword {
            raw: pattern.to_string(),
            words,
            stems,
            tag: tag.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Patterns tagged `tag`, other than the tag itself, in declaration order.
    pub fn keywords_for(&self, tag: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.tag == tag && e.raw != tag)
            .map(|e| e.raw.as_str())
            .collect()
    }

    /// Find the first entry, in declaration order, present in `tokens`.
    ///
    /// The exact pass runs over every entry before the stem pass starts, so a
    /// later exact keyword still beats an earlier stem-only match.
    pub fn lookup(&self, tokens: &[String], stemming: bool) -> Option<KeywordMatch> {
        for entry in &self.entries {
            if let Some(position) = find_run(tokens, &entry.words) {
                return Some(entry.hit(position, MatchKind::Exact));
            }
        }
        if !stemming {
            return None;
        }
        let stemmed: Vec<String> = tokens.iter().map(|t| stem(t)).collect();
        for entry in &self.entries {
            if let Some(position) = find_run(&stemmed, &entry.stems) {
                return Some(entry.hit(position, MatchKind::Stem));
            }
        }
        None
    }
}

impl Keyword {
    fn hit(&self, position: usize, kind: MatchKind) -> KeywordMatch {
        KeywordMatch {
            tag: self.tag.clone(),
            keyword: self.raw.clone(),
            position,
            kind,
        }
    }
}

/// Earliest index where `needle` occurs as a contiguous run of `haystack`.
fn find_run(haystack: &[String], needle: &[String]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn split_pattern(pattern: &str) -> Vec<String> {
    pattern
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Light suffix stripper: plural `s`, then the first matching common ending
/// when at least three characters would remain.
pub fn stem(token: &str) -> String {
    let mut word = token.to_lowercase();
    if word.ends_with('s') && !word.ends_with("ss") {
        word.pop();
    }
    const SUFFIXES: [&str; 9] = ["ing", "ed", "ment", "ness", "ers", "er", "able", "ible", "ion"];
    for suffix in SUFFIXES {
        if word.ends_with(suffix) && word.len() - suffix.len() > 2 {
            word.truncate(word.len() - suffix.len());
            return word;
        }
    }
    word
}

/// Where an intent category came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentSource {
    Pair,
    ActionOnly,
    ObjectOnly,
    Derived,
}

/// One row of the intent table. A row with both sides set is a pair rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentRule {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub object: Option<String>,
    pub category: String,
}

/// Ordered `(action, object) -> category` lookup.
#[derive(Debug, Clone, Default)]
pub struct IntentTable {
    rules: Vec<IntentRule>,
    derive_fallback: bool,
}

impl IntentTable {
    pub fn new(rules: Vec<IntentRule>) -> Self {
        Self {
            rules,
            derive_fallback: false,
        }
    }

    /// Synthesize `action-object`, `action-general`, or `general-object` when
    /// no row matches.
    pub fn with_derive_fallback(mut self, enabled: bool) -> Self {
        self.derive_fallback = enabled;
        self
    }

    pub fn push_pair(&mut self, action: &str, object: &str, category: &str) {
        self.rules.push(IntentRule {
            action: Some(action.to_string()),
            object: Some(object.to_string()),
            category: category.to_string(),
        });
    }

    /// Look up a category. `None` for an unresolved side means `unknown`.
    ///
    /// Preference: pair rows, then action-only rows, then object-only rows.
    pub fn lookup(
        &self,
        action: Option<&str>,
        object: Option<&str>,
    ) -> Option<(String, IntentSource)> {
        if let (Some(a), Some(o)) = (action, object) {
            let pair = self.rules.iter().find(|r| {
                r.action.as_deref() == Some(a) && r.object.as_deref() == Some(o)
            });
            if let Some(rule) = pair {
                return Some((rule.category.clone(), IntentSource::Pair));
            }
        }
        if let Some(a) = action {
            let only = self
                .rules
                .iter()
                .find(|r| r.object.is_none() && r.action.as_deref() == Some(a));
            if let Some(rule) = only {
                return Some((rule.category.clone(), IntentSource::ActionOnly));
            }
        }
        if let Some(o) = object {
            let only = self
                .rules
                .iter()
                .find(|r| r.action.is_none() && r.object.as_deref() == Some(o));
            if let Some(rule) = only {
                return Some((rule.category.clone(), IntentSource::ObjectOnly));
            }
        }
        if !self.derive_fallback {
            return None;
        }
        let derived = match (action, object) {
            (Some(a), Some(o)) => format!("{a}-{o}"),
            (Some(a), None) => format!("{a}-general"),
            (None, Some(o)) => format!("general-{o}"),
            (None, None) => return None,
        };
        Some((derived, IntentSource::Derived))
    }
}

/// A dictionary entry as written in a config file: either a bare word that
/// tags itself, or an explicit keyword with its canonical tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeywordSpec {
    Word(String),
    Mapped { keyword: String, tag: String },
}

impl KeywordSpec {
    fn pair(&self) -> (&str, &str) {
        match self {
            KeywordSpec::Word(w) => (w, w),
            KeywordSpec::Mapped { keyword, tag } => (keyword, tag),
        }
    }
}

/// Serializable rule set: the three dictionaries plus the intent table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    pub actions: Vec<KeywordSpec>,
    pub objects: Vec<KeywordSpec>,
    pub scenes: Vec<KeywordSpec>,
    pub intents: Vec<IntentRule>,
    pub derive_intent_fallback: bool,
    pub stemming: bool,
    /// Navigation and boilerplate tokens left out of `filtered_tokens` and
    /// `similar_keywords`.
    pub stopwords: Vec<String>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let words = |list: &[&str]| -> Vec<KeywordSpec> {
            list.iter().map(|w| KeywordSpec::Word(w.to_string())).collect()
        };
        let mapped = |table: &[(&str, &[&str])]| -> Vec<KeywordSpec> {
            table
                .iter()
                .flat_map(|(tag, syns)| {
                    syns.iter().map(move |s| KeywordSpec::Mapped {
                        keyword: s.to_string(),
                        tag: tag.to_string(),
                    })
                })
                .collect()
        };

        let mut actions = words(DEFAULT_ACTIONS);
        actions.extend(mapped(ACTION_SYNONYMS));
        let mut objects = words(DEFAULT_OBJECTS);
        objects.extend(mapped(OBJECT_SYNONYMS));

        Self {
            actions,
            objects,
            scenes: mapped(DEFAULT_SCENES),
            intents: Vec::new(),
            derive_intent_fallback: true,
            stemming: true,
            stopwords: DEFAULT_STOPWORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl RuleSet {
    pub fn action_dictionary(&self) -> Dictionary {
        Dictionary::from_pairs(self.actions.iter().map(KeywordSpec::pair))
    }

    pub fn object_dictionary(&self) -> Dictionary {
        Dictionary::from_pairs(self.objects.iter().map(KeywordSpec::pair))
    }

    pub fn scene_dictionary(&self) -> Dictionary {
        Dictionary::from_pairs(self.scenes.iter().map(KeywordSpec::pair))
    }

    pub fn intent_table(&self) -> IntentTable {
        IntentTable::new(self.intents.clone()).with_derive_fallback(self.derive_intent_fallback)
    }
}

const DEFAULT_ACTIONS: &[&str] = &[
    "enhance", "sharpen", "upscale", "denoise", "restore", "remove", "erase", "clean", "convert",
    "generate", "create", "compress", "blur", "unblur", "colorize", "fix", "repair", "replace",
    "fill",
];

const DEFAULT_OBJECTS: &[&str] = &[
    "image", "photo", "picture", "avatar", "headshot", "logo", "background", "watermark", "text",
    "pdf", "video", "gif", "resume", "document", "face", "noise", "blur", "meme", "poster",
    "banner",
];

/// Synonym → canonical action. Words already in `DEFAULT_ACTIONS` are left
/// out here: the base-word entry precedes these and always wins. `edit` has
/// no base entry, so it lists itself.
const ACTION_SYNONYMS: &[(&str, &[&str])] = &[
    ("unblur", &["deblur", "clarify", "clear"]),
    ("enhance", &["improve", "boost", "refine", "enhancement", "enhancer"]),
    ("upscale", &["enlarge", "increase-resolution", "rescale", "upscaler", "resize"]),
    ("remove", &["delete", "strip", "remover", "removal"]),
    ("denoise", &["reduce-noise", "clean-noise"]),
    ("restore", &["recover", "restoration"]),
    ("convert", &["transform", "turn-into", "converter", "change"]),
    ("generate", &["make", "produce", "generator", "creation", "maker"]),
    ("colorize", &["add-color", "recolor", "colour"]),
    ("blur", &["soften", "apply-blur", "blurred"]),
    ("fix", &["correct"]),
    ("sharpen", &["enhance-edges"]),
    ("compress", &["shrink", "reduce-size", "compression"]),
    ("edit", &["edit", "editor", "modify"]),
];

const OBJECT_SYNONYMS: &[(&str, &[&str])] = &[
    ("image", &["pic", "images", "pics", "jpg", "png"]),
    ("photo", &["photos"]),
    ("picture", &["pictures"]),
    ("video", &["clip", "footage", "movie", "videos", "clips", "mp4"]),
    ("text", &["copy", "txt", "word"]),
    ("audio", &["audio", "sound", "voice", "mp3", "wav", "speech"]),
    ("background", &["bg", "backdrop"]),
    ("noise", &["grain"]),
    ("watermark", &["stamp", "logo-mark"]),
    ("headshot", &["portrait", "selfie"]),
    ("logo", &["brand-mark", "icon"]),
    ("resume", &["cv", "curriculum-vitae"]),
];

const DEFAULT_STOPWORDS: &[&str] = &[
    "login", "log", "signin", "signup", "account", "profile", "dashboard", "pricing", "price",
    "prices", "plan", "plans", "faq", "help", "support", "contact", "blog", "blogs", "tag", "tags",
    "category", "categories", "news", "about", "docs", "doc", "documentation", "api", "developer",
    "developers", "status", "privacy", "policy", "terms", "changelog", "roadmap", "careers", "jobs",
    "download", "downloads", "guide", "guides", "tutorial", "tutorials", "template", "templates",
    "example", "examples", "sample", "samples", "home", "landing", "app", "apps", "www", "ai",
];

const DEFAULT_SCENES: &[(&str, &[&str])] = &[
    ("linkedin", &["linkedin"]),
    ("instagram", &["instagram", "insta"]),
    ("youtube", &["youtube", "thumbnail"]),
    ("tiktok", &["tiktok"]),
    ("ecommerce", &["ecommerce", "shopify", "amazon", "etsy", "product"]),
    ("passport", &["passport", "visa"]),
    ("wedding", &["wedding"]),
    ("real-estate", &["real-estate", "realestate", "property"]),
    ("print", &["print", "printing"]),
    ("presentation", &["presentation", "slides"]),
];

//! Flat artifacts: the raw record CSV, the keyword table, and plain URL lists.

use crate::error::Result;
use crate::types::{is_resolved, UrlRecord};
use std::io::Write;

pub const RECORD_COLUMNS: [&str; 11] = [
    "url",
    "path",
    "depth",
    "tokens",
    "action",
    "object",
    "scene",
    "intent_category",
    "notes",
    "lastmod",
    "is_new",
];

/// Write one CSV row per record, tokens space-joined.
pub fn write_records_csv<W: Write>(writer: W, records: &[UrlRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(RECORD_COLUMNS)?;
    for r in records {
        let depth = r.depth.to_string();
        let tokens = r.tokens.join(" ");
        csv.write_record([
            r.url.as_str(),
            r.path.as_str(),
            depth.as_str(),
            tokens.as_str(),
            r.action.as_str(),
            r.object.as_str(),
            r.scene.as_str(),
            r.intent_category.as_str(),
            r.notes.as_str(),
            r.lastmod.as_deref().unwrap_or(""),
            if r.is_new { "true" } else { "false" },
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub const KEYWORD_COLUMNS: [&str; 8] = [
    "keywords",
    "action",
    "object",
    "scene",
    "intent_category",
    "note",
    "similar_keywords",
    "url",
];

/// Write the keyword table: filtered tokens, tags, description and related
/// keywords per URL.
///
/// Rows with no filtered token, no resolved tag and no category carry no
/// signal and are left out.
pub fn write_keyword_table_csv<W: Write>(writer: W, records: &[UrlRecord]) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(KEYWORD_COLUMNS)?;
    for r in records {
        let signal = !r.filtered_tokens.is_empty()
            || r.has_action()
            || r.has_object()
            || is_resolved(&r.intent_category);
        if !signal {
            continue;
        }
        let keywords = r.filtered_tokens.join(" ");
        let similar = r.similar_keywords.join(" ");
        csv.write_record([
            keywords.as_str(),
            r.action.as_str(),
            r.object.as_str(),
            r.scene.as_str(),
            r.intent_category.as_str(),
            r.description.as_str(),
            similar.as_str(),
            r.url.as_str(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Write one URL per line.
pub fn write_url_list<W, I, S>(mut writer: W, urls: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for url in urls {
        writeln!(writer, "{}", url.as_ref())?;
    }
    writer.flush()?;
    Ok(())
}

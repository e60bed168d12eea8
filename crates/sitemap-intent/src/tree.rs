//! Fold classified records into a directory tree.
//!
//! The path grouping mirrors the URL hierarchy; the intent and object
//! groupings produce a flat, one-level tree under a synthetic root.

use crate::error::{Error, Result};
use crate::types::{is_resolved, GroupBy, SortMode, UrlRecord};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Group name for records without a value for the grouping key.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One node of the directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    pub name: String,
    pub path: String,
    /// Records at or beneath this node.
    pub count: usize,
    pub children: Vec<DirectoryNode>,
    /// Records whose path ends exactly here.
    pub records: Vec<UrlRecord>,
}

impl DirectoryNode {
    fn new(name: &str, path: &str) -> Self {
        Self {
            name: name.to_string(),
            path: path.to_string(),
            count: 0,
            children: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Find a descendant by its path.
    pub fn find(&self, path: &str) -> Option<&DirectoryNode> {
        if self.path == path {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(path))
    }

    /// Recompute `count` for this subtree from the attached records.
    fn recount(&mut self) -> usize {
        let below: usize = self.children.iter_mut().map(|c| c.recount()).sum();
        self.count = self.records.len() + below;
        self.count
    }

    fn sort(&mut self, mode: SortMode) {
        self.children.sort_by(|a, b| compare_nodes(a, b, mode));
        for child in &mut self.children {
            child.sort(mode);
        }
    }
}

/// Order two siblings.
fn compare_nodes(a: &DirectoryNode, b: &DirectoryNode, mode: SortMode) -> Ordering {
    let by_name = || compare_names(&a.name, &b.name);
    match mode {
        SortMode::Name => by_name(),
        SortMode::Count => b.count.cmp(&a.count).then_with(by_name),
    }
}

/// Case-insensitive ordering with the exact string as a final tie-break.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Build a tree over `records` using the chosen grouping and sibling order.
pub fn build_tree(records: &[UrlRecord], group_by: GroupBy, sort: SortMode) -> DirectoryNode {
    let mut root = match group_by {
        GroupBy::Path => build_path_tree(records),
        GroupBy::IntentCategory => build_flat_tree(records, |r| r.intent_category.as_str()),
        GroupBy::Object => build_flat_tree(records, |r| r.object.as_str()),
    };
    root.recount();
    root.sort(sort);
    root
}

/// A node under construction, with a name index over its children.
struct Branch {
    node: DirectoryNode,
    index: HashMap<String, usize>,
    children: Vec<Branch>,
}

impl Branch {
    fn new(name: &str, path: &str) -> Self {
        Self {
            node: DirectoryNode::new(name, path),
            index: HashMap::new(),
            children: Vec::new(),
        }
    }

    fn child(&mut self, segment: &str, path: &str) -> &mut Branch {
        let children = &mut self.children;
        let idx = *self.index.entry(segment.to_string()).or_insert_with(|| {
            children.push(Branch::new(segment, path));
            children.len() - 1
        });
        &mut self.children[idx]
    }

    fn finish(self) -> DirectoryNode {
        let mut node = self.node;
        node.children = self.children.into_iter().map(Branch::finish).collect();
        node
    }
}

fn build_path_tree(records: &[UrlRecord]) -> DirectoryNode {
    let mut root = Branch::new("/", "/");
    for record in records {
        let mut branch = &mut root;
        let mut prefix = String::new();
        for segment in record.path.split('/').filter(|s| !s.is_empty()) {
            prefix.push('/');
            prefix.push_str(segment);
            branch = branch.child(segment, &prefix);
        }
        branch.node.records.push(record.clone());
    }
    root.finish()
}

fn build_flat_tree<F>(records: &[UrlRecord], key: F) -> DirectoryNode
where
    F: Fn(&UrlRecord) -> &str,
{
    let mut root = DirectoryNode::new("/", "/");
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        let value = key(record);
        let name = if is_resolved(value) { value } else { UNCATEGORIZED };
        let idx = *index.entry(name.to_string()).or_insert_with(|| {
            root.children
                .push(DirectoryNode::new(name, &format!("/{name}")));
            root.children.len() - 1
        });
        root.children[idx].records.push(record.clone());
    }
    root
}

/// Check the count invariant everywhere and that the root covers `total`.
pub fn verify_counts(root: &DirectoryNode, total: usize) -> Result<()> {
    if root.count != total {
        return Err(Error::CountMismatch {
            path: root.path.clone(),
            expected: total,
            actual: root.count,
        });
    }
    verify_node(root)
}

fn verify_node(node: &DirectoryNode) -> Result<()> {
    let expected = node.records.len() + node.children.iter().map(|c| c.count).sum::<usize>();
    if node.count != expected {
        return Err(Error::CountMismatch {
            path: node.path.clone(),
            expected,
            actual: node.count,
        });
    }
    node.children.iter().try_for_each(verify_node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::RuleClassifier;
    use crate::normalizer::normalize;

    fn records(urls: &[&str]) -> Vec<UrlRecord> {
        let rules = RuleClassifier::default();
        urls.iter()
            .map(|u| rules.classify_url(normalize(u).unwrap(), None))
            .collect()
    }

    fn assert_invariant(node: &DirectoryNode) {
        let below: usize = node.children.iter().map(|c| c.count).sum();
        assert_eq!(node.count, node.records.len() + below, "at {}", node.path);
        node.children.iter().for_each(assert_invariant);
    }

    #[test]
    fn test_path_tree_counts() {
        let recs = records(&[
            "https://example.com/",
            "https://example.com/features",
            "https://example.com/features/edit",
            "https://example.com/features/edit/crop",
            "https://example.com/features/upscale",
            "https://example.com/blog/post-1",
        ]);
        let tree = build_tree(&recs, GroupBy::Path, SortMode::Count);

        assert_eq!(tree.count, 6);
        assert_eq!(tree.records.len(), 1);
        assert_invariant(&tree);
        verify_counts(&tree, recs.len()).unwrap();

        let features = tree.find("/features").unwrap();
        assert_eq!(features.count, 4);
        assert_eq!(features.records.len(), 1);
        let edit = tree.find("/features/edit").unwrap();
        assert_eq!(edit.count, 2);
        assert_eq!(edit.records[0].path, "/features/edit");

        // Blog has no record of its own, only a descendant.
        let blog = tree.find("/blog").unwrap();
        assert!(blog.records.is_empty());
        assert_eq!(blog.count, 1);

        assert_eq!(tree.children[0].name, "features");
        assert_eq!(tree.children[1].name, "blog");
    }

    #[test]
    fn test_name_sort_is_case_insensitive() {
        let recs = records(&[
            "https://example.com/b",
            "https://example.com/Zeta",
            "https://example.com/alpha",
            "https://example.com/alpha/x",
        ]);
        let tree = build_tree(&recs, GroupBy::Path, SortMode::Name);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "b", "Zeta"]);
    }

    #[test]
    fn test_count_ties_fall_back_to_name() {
        let recs = records(&["https://example.com/b", "https://example.com/a"]);
        let tree = build_tree(&recs, GroupBy::Path, SortMode::Count);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_flat_intent_grouping() {
        let mut recs = records(&[
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
            "https://example.com/4",
            "https://example.com/5",
            "https://example.com/6",
        ]);
        for (rec, cat) in recs.iter_mut().zip(["x", "x", "y", "y", "y", "unknown"]) {
            rec.intent_category = cat.to_string();
        }
        let tree = build_tree(&recs, GroupBy::IntentCategory, SortMode::Count);
        assert_eq!(tree.count, 6);
        assert!(tree.records.is_empty());
        let summary: Vec<_> = tree
            .children
            .iter()
            .map(|c| (c.name.as_str(), c.path.as_str(), c.count, c.children.len()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("y", "/y", 3, 0),
                ("x", "/x", 2, 0),
                ("Uncategorized", "/Uncategorized", 1, 0),
            ]
        );
        verify_counts(&tree, 6).unwrap();
    }

    #[test]
    fn test_wide_directory_keeps_every_sibling() {
        let urls: Vec<String> = (0..20_000)
            .map(|i| format!("https://example.com/p{i}"))
            .chain((0..20_000).map(|i| format!("https://example.com/p{i}/detail")))
            .collect();
        let url_refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let recs = records(&url_refs);
        let tree = build_tree(&recs, GroupBy::Path, SortMode::Count);

        assert_eq!(tree.children.len(), 20_000);
        assert!(tree.children.iter().all(|c| c.count == 2 && c.records.len() == 1));
        assert_eq!(tree.find("/p19999/detail").unwrap().count, 1);
        verify_counts(&tree, 40_000).unwrap();
    }

    #[test]
    fn test_object_grouping_uses_uncategorized() {
        let recs = records(&["https://example.com/upscale-video", "https://example.com/pricing"]);
        let tree = build_tree(&recs, GroupBy::Object, SortMode::Name);
        let names: Vec<_> = tree.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Uncategorized", "video"]);
    }

    #[test]
    fn test_verify_counts_reports_drift() {
        let recs = records(&["https://example.com/a/b"]);
        let mut tree = build_tree(&recs, GroupBy::Path, SortMode::Name);
        assert!(matches!(
            verify_counts(&tree, 2),
            Err(Error::CountMismatch { expected: 2, actual: 1, .. })
        ));
        tree.children[0].count = 5;
        tree.count = 1;
        match verify_counts(&tree, 1) {
            Err(Error::CountMismatch { path, .. }) => assert_eq!(path, "/"),
            other => panic!("expected mismatch, got {other:?}"),
        }
    }
}

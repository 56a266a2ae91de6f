//! The accumulated forest of extracted and clicked elements.
//!
//! Nodes live in an arena and refer to their children by index. A record
//! belongs under the node whose link target is the page the record was found
//! on; records nobody links to sit at the root.

use crate::results::ElementRecord;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
struct TreeNode {
    /// Always stored with empty `children`; structure lives in the arena
    record: ElementRecord,
    children: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ElementRecord>", into = "Vec<ElementRecord>")]
pub struct ResultTree {
    nodes: Vec<TreeNode>,
    roots: Vec<usize>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records at every level
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
    }

    /// Merges a record and, independently, each record nested under it.
    ///
    /// Every record is placed under the first node (depth first) whose `href`
    /// equals the record's `url`, or at the root if there is none, unless a
    /// sibling there already has the same text, url and href. Returns how many
    /// records were inserted.
    pub fn merge(&mut self, record: ElementRecord) -> usize {
        let mut inserted = 0;
        let mut pending = vec![record];
        while let Some(mut record) = pending.pop() {
            let nested = std::mem::take(&mut record.children);
            if self.insert(record) {
                inserted += 1;
            }
            pending.extend(nested.into_iter().rev());
        }
        inserted
    }

    pub fn merge_all(&mut self, records: impl IntoIterator<Item = ElementRecord>) -> usize {
        records.into_iter().map(|r| self.merge(r)).sum()
    }

    fn insert(&mut self, record: ElementRecord) -> bool {
        let parent = self.find_parent(&record.url);
        let siblings = match parent {
            Some(p) => &self.nodes[p].children,
            None => &self.roots,
        };
        if siblings
            .iter()
            .any(|&s| self.nodes[s].record.same_entry(&record))
        {
            ::log::trace!("Skipping duplicate record: {}", record.text);
            return false;
        }

        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            record,
            children: Vec::new(),
        });
        match parent {
            Some(p) => self.nodes[p].children.push(index),
            None => self.roots.push(index),
        }
        true
    }

    /// First node in depth-first order linking to `url`, ignoring fragments
    fn find_parent(&self, url: &str) -> Option<usize> {
        let url = without_fragment(url);
        if url.is_empty() {
            return None;
        }
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if without_fragment(&node.record.href) == url {
                return Some(index);
            }
            stack.extend(node.children.iter().rev());
        }
        None
    }

    /// Every PDF record with a link, in depth-first order
    pub fn pdf_records(&self) -> Vec<ElementRecord> {
        self.depth_first()
            .map(|index| &self.nodes[index].record)
            .filter(|r| r.is_pdf && !r.href.is_empty())
            .cloned()
            .collect()
    }

    fn depth_first(&self) -> impl Iterator<Item = usize> + '_ {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        std::iter::from_fn(move || {
            let index = stack.pop()?;
            stack.extend(self.nodes[index].children.iter().rev());
            Some(index)
        })
    }

    /// The tree as nested records
    pub fn to_records(&self) -> Vec<ElementRecord> {
        self.roots.iter().map(|&r| self.build(r)).collect()
    }

    fn build(&self, index: usize) -> ElementRecord {
        let node = &self.nodes[index];
        let mut record = node.record.clone();
        record.children = node.children.iter().map(|&c| self.build(c)).collect();
        record
    }

    fn push_subtree(&mut self, mut record: ElementRecord) -> usize {
        let nested = std::mem::take(&mut record.children);
        let index = self.nodes.len();
        self.nodes.push(TreeNode {
            record,
            children: Vec::new(),
        });
        for child in nested {
            let child_index = self.push_subtree(child);
            self.nodes[index].children.push(child_index);
        }
        index
    }
}

/// A link and the page it was found on name the same page when they differ only by `#fragment`
fn without_fragment(url: &str) -> &str {
    url.split_once('#').map_or(url, |(page, _)| page)
}

/// Restores a persisted tree exactly as it was saved
impl From<Vec<ElementRecord>> for ResultTree {
    fn from(records: Vec<ElementRecord>) -> Self {
        let mut tree = Self::new();
        for record in records {
            let index = tree.push_subtree(record);
            tree.roots.push(index);
        }
        tree
    }
}

impl From<ResultTree> for Vec<ElementRecord> {
    fn from(tree: ResultTree) -> Self {
        tree.to_records()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(text: &str, url: &str, href: &str) -> ElementRecord {
        ElementRecord {
            text: text.to_string(),
            url: url.to_string(),
            href: href.to_string(),
            html: String::new(),
            pattern_used: "//a".to_string(),
            tag_name: "A".to_string(),
            element_id: String::new(),
            class_name: String::new(),
            is_pdf: href.ends_with(".pdf"),
            pdf_info: None,
            children: Vec::new(),
        }
    }

    #[test]
    fn test_identical_records_merge_once() {
        let mut tree = ResultTree::new();
        let parent = record("Reports", "https://a.test/", "https://a.test/reports");
        assert_eq!(tree.merge(parent.clone()), 1);

        let child = record("Q1", "https://a.test/reports", "https://a.test/q1.pdf");
        assert_eq!(tree.merge(child.clone()), 1);
        assert_eq!(tree.merge(child), 0);
        assert_eq!(tree.merge(parent), 0);

        let records = tree.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].children.len(), 1);
    }

    #[test]
    fn test_record_attaches_under_linking_node() {
        let mut tree = ResultTree::new();
        tree.merge(record("Home", "https://a.test/", "https://a.test/x"));
        tree.merge(record("Other", "https://a.test/", "https://a.test/y"));
        tree.merge(record("Y item", "https://a.test/y", ""));
        tree.merge(record("Loose", "https://b.test/", ""));

        let records = tree.to_records();
        assert_eq!(records.len(), 3);
        assert!(records[0].children.is_empty());
        assert_eq!(records[1].children[0].text, "Y item");
        assert_eq!(records[2].text, "Loose");
    }

    #[test]
    fn test_anchor_link_is_parent_of_its_page() {
        let mut tree = ResultTree::new();
        tree.merge(record("Section", "https://a.test/", "https://a.test/b#sec"));
        tree.merge(record("On B", "https://a.test/b", ""));

        let records = tree.to_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].children[0].text, "On B");
    }

    #[test]
    fn test_nested_children_are_merged_individually() {
        let mut tree = ResultTree::new();
        tree.merge(record("Existing", "https://a.test/", "https://a.test/b"));

        // the same link found again with one new and one known child
        let mut again = record("Existing again", "https://a.test/start", "https://a.test/b");
        again.children = vec![
            record("From B", "https://a.test/b", "https://a.test/c"),
            record("From B", "https://a.test/b", "https://a.test/c"),
        ];
        assert_eq!(tree.merge(again), 2);

        let records = tree.to_records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].children.len(), 1);
        assert_eq!(records[0].children[0].text, "From B");
        assert!(records[1].children.is_empty());
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn test_persisted_shape_round_trips() {
        let mut tree = ResultTree::new();
        let mut top = record("Top", "https://a.test/", "https://a.test/docs");
        top.children = vec![
            record("Guide", "https://a.test/docs", "https://a.test/guide.pdf"),
            record("Notes", "https://a.test/docs", "https://a.test/notes.pdf"),
        ];
        tree.merge(top);

        let json = serde_json::to_string(&tree).unwrap();
        let restored: ResultTree = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.to_records(), tree.to_records());

        let pdfs: Vec<String> = restored.pdf_records().into_iter().map(|r| r.text).collect();
        assert_eq!(pdfs, vec!["Guide", "Notes"]);
    }

    #[test]
    fn test_clear() {
        let mut tree = ResultTree::new();
        tree.merge(record("Home", "https://a.test/", ""));
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.to_records().is_empty());
    }
}

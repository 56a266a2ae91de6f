//! Session state shared by every action: toggles, credential, the remembered
//! click target, the result tree and the pattern inputs.
//!
//! Every mutation is written through to the backing store before it becomes
//! visible in memory, so a failed write leaves the session as it was.

use crate::classifier::is_clickable;
use crate::dom::{Document, NodeId};
use crate::error::StoreError;
use crate::results::ElementRecord;
use crate::store::{KeyValueStore, keys};
use crate::tree::ResultTree;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Pattern expressions in insertion order, without duplicates or blanks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct PatternList(Vec<String>);

impl PatternList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the patterns not already present; returns how many were added
    pub fn merge<I, S>(&mut self, patterns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let before = self.0.len();
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if !pattern.is_empty() && !self.0.iter().any(|p| p == pattern) {
                self.0.push(pattern.to_string());
            }
        }
        self.0.len() - before
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<String>> for PatternList {
    fn from(patterns: Vec<String>) -> Self {
        let mut list = Self::new();
        list.merge(patterns);
        list
    }
}

impl From<PatternList> for Vec<String> {
    fn from(list: PatternList) -> Self {
        list.0
    }
}

/// The element picked in inspector mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedElement {
    pub xpath: String,
    pub html: String,
    #[serde(default)]
    pub text: String,
}

pub struct Session<S: KeyValueStore> {
    store: S,
    save_elements: bool,
    check_xpath: bool,
    api_key: Option<String>,
    last_right_clicked: Option<NodeId>,
    tree: ResultTree,
    patterns: PatternList,
    last_selected: Option<SelectedElement>,
}

impl<S: KeyValueStore> Session<S> {
    /// Restores the persisted session; missing keys start out empty
    pub fn load(store: S) -> Result<Self, StoreError> {
        let session = Self {
            save_elements: read(&store, keys::SAVE_ELEMENTS_STATE)?.unwrap_or(false),
            check_xpath: read(&store, keys::CHECK_XPATH_STATE)?.unwrap_or(false),
            api_key: read(&store, keys::GEMINI_API_KEY)?.filter(|k: &String| !k.is_empty()),
            last_right_clicked: None,
            tree: read(&store, keys::SAVED_ELEMENTS_TREE)?.unwrap_or_default(),
            patterns: read(&store, keys::XPATH_INPUT_DATA)?.unwrap_or_default(),
            last_selected: read(&store, keys::LAST_SELECTED_ELEMENT)?,
            store,
        };
        ::log::debug!(
            "Loaded session with {} records and {} patterns",
            session.tree.len(),
            session.patterns.len()
        );
        Ok(session)
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Writes the whole session in one store operation
    pub fn persist(&mut self) -> Result<(), StoreError> {
        let mut entries = Map::new();
        entries.insert(keys::SAVED_ELEMENTS_TREE.into(), serde_json::to_value(&self.tree)?);
        entries.insert(keys::XPATH_INPUT_DATA.into(), serde_json::to_value(&self.patterns)?);
        entries.insert(keys::SAVE_ELEMENTS_STATE.into(), json!(self.save_elements));
        entries.insert(keys::CHECK_XPATH_STATE.into(), json!(self.check_xpath));
        if let Some(selected) = &self.last_selected {
            entries.insert(keys::LAST_SELECTED_ELEMENT.into(), serde_json::to_value(selected)?);
        }
        self.store.set_many(entries)
    }

    pub fn save_elements(&self) -> bool {
        self.save_elements
    }

    pub fn set_save_elements(&mut self, save: bool) -> Result<(), StoreError> {
        self.store.set(keys::SAVE_ELEMENTS_STATE, json!(save))?;
        self.save_elements = save;
        Ok(())
    }

    pub fn check_xpath(&self) -> bool {
        self.check_xpath
    }

    pub fn set_check_xpath(&mut self, check: bool) -> Result<(), StoreError> {
        self.store.set(keys::CHECK_XPATH_STATE, json!(check))?;
        self.check_xpath = check;
        Ok(())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn set_api_key(&mut self, key: &str) -> Result<(), StoreError> {
        let key = key.trim();
        self.store.set(keys::GEMINI_API_KEY, json!(key))?;
        self.api_key = Some(key.to_string()).filter(|k| !k.is_empty());
        Ok(())
    }

    /// Uses `key` for this session only, unless a stored key exists
    pub fn seed_api_key(&mut self, key: Option<String>) {
        if self.api_key.is_none() {
            self.api_key = key.filter(|k| !k.trim().is_empty());
        }
    }

    pub fn last_right_clicked(&self) -> Option<NodeId> {
        self.last_right_clicked
    }

    /// Remembers the element under the pointer when a context menu opened
    pub fn remember_right_click(&mut self, element: Option<NodeId>) {
        self.last_right_clicked = element;
    }

    pub fn tree(&self) -> &ResultTree {
        &self.tree
    }

    /// Merges records into the tree; returns how many were new
    pub fn merge_records(&mut self, records: Vec<ElementRecord>) -> Result<usize, StoreError> {
        let mut tree = self.tree.clone();
        let inserted = tree.merge_all(records);
        if inserted > 0 {
            self.store
                .set(keys::SAVED_ELEMENTS_TREE, serde_json::to_value(&tree)?)?;
            self.tree = tree;
        }
        Ok(inserted)
    }

    pub fn patterns(&self) -> &PatternList {
        &self.patterns
    }

    /// Adds new patterns after the existing ones; returns how many were new
    pub fn merge_patterns<I, P>(&mut self, patterns: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let mut list = self.patterns.clone();
        let added = list.merge(patterns);
        if added > 0 {
            self.store
                .set(keys::XPATH_INPUT_DATA, serde_json::to_value(&list)?)?;
            self.patterns = list;
        }
        Ok(added)
    }

    /// Replaces the pattern inputs
    pub fn set_patterns(&mut self, patterns: Vec<String>) -> Result<(), StoreError> {
        let list = PatternList::from(patterns);
        self.store
            .set(keys::XPATH_INPUT_DATA, serde_json::to_value(&list)?)?;
        self.patterns = list;
        Ok(())
    }

    /// Empties the result tree and pattern inputs, on disk and in memory together
    pub fn clear(&mut self) -> Result<(), StoreError> {
        let mut entries = Map::new();
        entries.insert(keys::SAVED_ELEMENTS_TREE.into(), Value::Array(Vec::new()));
        entries.insert(keys::XPATH_INPUT_DATA.into(), Value::Array(Vec::new()));
        self.store.set_many(entries)?;

        self.tree.clear();
        self.patterns = PatternList::new();
        ::log::info!("Cleared saved elements and patterns");
        Ok(())
    }

    /// Records a click on `element` when click tracking is on and the element is clickable
    pub fn track_click(
        &mut self,
        doc: &Document,
        element: NodeId,
    ) -> Result<Option<ElementRecord>, StoreError> {
        if !self.save_elements || !is_clickable(doc, Some(element)) {
            return Ok(None);
        }
        let record = ElementRecord::from_element(doc, element, &doc.xpath_for(element));
        self.merge_records(vec![record.clone()])?;
        ::log::debug!("Tracked click on {}", record.pattern_used);
        Ok(Some(record))
    }

    /// Selects and highlights an element in inspector mode
    pub fn inspect(
        &mut self,
        doc: &mut Document,
        element: NodeId,
    ) -> Result<SelectedElement, StoreError> {
        doc.set_highlight(Some(element));
        let selected = SelectedElement {
            xpath: doc.xpath_for(element),
            html: doc.outer_html(element),
            text: doc.text_content(element).trim().to_string(),
        };
        self.store
            .set(keys::LAST_SELECTED_ELEMENT, serde_json::to_value(&selected)?)?;
        self.last_selected = Some(selected.clone());
        Ok(selected)
    }

    pub fn last_selected(&self) -> Option<&SelectedElement> {
        self.last_selected.as_ref()
    }
}

fn read<T: DeserializeOwned, S: KeyValueStore>(store: &S, key: &str) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::parse_document;
    use crate::store::{JsonFileStore, MemoryStore};

    fn page() -> Document {
        parse_document(
            "<div id=\"menu\"><a href=\"/docs\">Docs</a><p>plain</p></div>",
            "https://example.com/",
        )
    }

    fn find(doc: &Document, tag: &str) -> NodeId {
        doc.elements().find(|&id| doc.tag(id) == Some(tag)).unwrap()
    }

    #[test]
    fn test_pattern_list_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut session = Session::load(JsonFileStore::new(&path)).unwrap();
        session
            .set_patterns(vec!["//a[@class='x']".to_string()])
            .unwrap();
        session.merge_patterns(["//li", "//a[@class='x']", " "]).unwrap();

        let reloaded = Session::load(JsonFileStore::new(&path)).unwrap();
        assert_eq!(reloaded.patterns().as_slice(), ["//a[@class='x']", "//li"]);
    }

    #[test]
    fn test_toggles_and_key_persist() {
        let mut session = Session::load(MemoryStore::new()).unwrap();
        assert!(!session.save_elements());
        session.set_save_elements(true).unwrap();
        session.set_check_xpath(true).unwrap();
        session.set_api_key(" k-123 ").unwrap();

        let reloaded = Session::load(session.store().clone()).unwrap();
        assert!(reloaded.save_elements());
        assert!(reloaded.check_xpath());
        assert_eq!(reloaded.api_key(), Some("k-123"));
    }

    #[test]
    fn test_seeded_key_does_not_override_stored_key() {
        let mut session = Session::load(MemoryStore::new()).unwrap();
        session.seed_api_key(Some("from-env".to_string()));
        assert_eq!(session.api_key(), Some("from-env"));

        session.set_api_key("stored").unwrap();
        let mut reloaded = Session::load(session.store().clone()).unwrap();
        reloaded.seed_api_key(Some("from-env".to_string()));
        assert_eq!(reloaded.api_key(), Some("stored"));
    }

    #[test]
    fn test_persist_writes_every_key() {
        let doc = page();
        let mut session = Session::load(MemoryStore::new()).unwrap();
        session.set_save_elements(true).unwrap();
        session.track_click(&doc, find(&doc, "a")).unwrap();
        session.merge_patterns(["//a"]).unwrap();

        let mut copy = Session::load(MemoryStore::new()).unwrap();
        copy.save_elements = true;
        copy.tree = session.tree().clone();
        copy.patterns = session.patterns().clone();
        copy.persist().unwrap();

        let store = copy.store();
        assert_eq!(store.get(keys::SAVE_ELEMENTS_STATE).unwrap(), Some(json!(true)));
        assert_eq!(store.get(keys::XPATH_INPUT_DATA).unwrap(), Some(json!(["//a"])));
        let reloaded = Session::load(store.clone()).unwrap();
        assert_eq!(reloaded.tree().to_records(), session.tree().to_records());
    }

    #[test]
    fn test_track_click_respects_toggle_and_classifier() {
        let doc = page();
        let mut session = Session::load(MemoryStore::new()).unwrap();
        let link = find(&doc, "a");

        assert_eq!(session.track_click(&doc, link).unwrap(), None);

        session.set_save_elements(true).unwrap();
        assert_eq!(session.track_click(&doc, find(&doc, "p")).unwrap(), None);
        let record = session.track_click(&doc, link).unwrap().unwrap();
        assert_eq!(record.text, "Docs");
        assert_eq!(record.pattern_used, "//*[@id=\"menu\"]/a[1]");
        assert_eq!(session.tree().len(), 1);

        // a second click on the same link is deduplicated
        session.track_click(&doc, link).unwrap();
        assert_eq!(session.tree().len(), 1);
    }

    #[test]
    fn test_clear_resets_store_and_memory() {
        let doc = page();
        let mut session = Session::load(MemoryStore::new()).unwrap();
        session.set_save_elements(true).unwrap();
        session.track_click(&doc, find(&doc, "a")).unwrap();
        session.merge_patterns(["//a"]).unwrap();

        session.clear().unwrap();
        assert!(session.tree().is_empty());
        assert!(session.patterns().is_empty());

        let reloaded = Session::load(session.store().clone()).unwrap();
        assert!(reloaded.tree().is_empty());
        assert!(reloaded.patterns().is_empty());
        assert!(reloaded.save_elements());
    }

    #[test]
    fn test_inspect_remembers_selection() {
        let mut doc = page();
        let mut session = Session::load(MemoryStore::new()).unwrap();
        let p = find(&doc, "p");
        let selected = session.inspect(&mut doc, p).unwrap();
        assert_eq!(doc.highlighted(), Some(p));
        assert_eq!(selected.xpath, "//*[@id=\"menu\"]/p[1]");
        assert_eq!(selected.html, "<p>plain</p>");

        let reloaded = Session::load(session.store().clone()).unwrap();
        assert_eq!(reloaded.last_selected(), Some(&selected));
    }
}

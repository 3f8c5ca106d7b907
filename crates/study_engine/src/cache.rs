//! The last extracted document, kept in a [`KvStore`] under the same keys
//! the web client used.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use study_core::{Concept, ExtractedDocument};
use study_logging::study_warn;

use crate::types::{normalize_concepts, RawConcept};
use crate::{KvStore, StoreError};

pub const CONCEPTS_KEY: &str = "extractedConcepts";
pub const INFO_KEY: &str = "extractedInfo";
pub const URL_KEY: &str = "extractedUrl";
pub const DOCUMENT_ID_KEY: &str = "extractedDocumentId";
pub const CHAT_SESSION_KEY: &str = "chatSessionId";
pub const LEARN_EXPLANATIONS_KEY: &str = "learnExplanations";

const EXTRACTED_KEYS: [&str; 5] = [
    CONCEPTS_KEY,
    INFO_KEY,
    URL_KEY,
    DOCUMENT_ID_KEY,
    LEARN_EXPLANATIONS_KEY,
];

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedInfo {
    url: String,
    #[serde(default)]
    text_length: u64,
    #[serde(default)]
    chunks_indexed: u32,
    #[serde(default)]
    document_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
}

#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn KvStore>,
}

impl ContentCache {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn KvStore> {
        &self.store
    }

    /// Whether dependent commands may run: both the concepts and the info
    /// entries are present and non-empty. Nothing is checked for staleness.
    pub fn has_extracted_content(&self) -> bool {
        self.present(CONCEPTS_KEY) && self.present(INFO_KEY)
    }

    fn present(&self, key: &str) -> bool {
        self.store
            .get(key)
            .is_some_and(|value| !value.trim().is_empty())
    }

    /// Replaces whatever was cached with `document`. On failure the previous
    /// entries are put back, or cleared if that fails too.
    pub fn write_document(&self, document: &ExtractedDocument) -> Result<(), StoreError> {
        let concepts: Vec<RawConcept> = document.concepts.iter().map(RawConcept::from).collect();
        let info = CachedInfo {
            url: document.url.clone(),
            text_length: document.text_length,
            chunks_indexed: document.chunks_indexed,
            document_id: Some(document.document_id.clone()),
            title: document.title.clone(),
            summary: document.summary.clone(),
        };
        let concepts = serde_json::to_string(&concepts)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        let info =
            serde_json::to_string(&info).map_err(|err| StoreError::Serialize(err.to_string()))?;

        let previous: Vec<(&str, Option<String>)> = EXTRACTED_KEYS
            .iter()
            .map(|key| (*key, self.store.get(key)))
            .collect();
        let written = self.replace_entries(&concepts, &info, document);
        if let Err(err) = &written {
            study_warn!("Cache write failed, restoring previous document: {}", err);
            self.restore(&previous);
        }
        written
    }

    fn replace_entries(
        &self,
        concepts: &str,
        info: &str,
        document: &ExtractedDocument,
    ) -> Result<(), StoreError> {
        self.store.set(CONCEPTS_KEY, concepts)?;
        self.store.set(INFO_KEY, info)?;
        self.store.set(URL_KEY, &document.url)?;
        self.store.set(DOCUMENT_ID_KEY, &document.document_id)?;
        // Explanations belong to the previous document.
        self.store.remove(LEARN_EXPLANATIONS_KEY)
    }

    fn restore(&self, previous: &[(&str, Option<String>)]) {
        let restored = previous.iter().try_for_each(|(key, value)| match value {
            Some(value) => self.store.set(key, value),
            None => self.store.remove(key),
        });
        if let Err(err) = restored {
            study_warn!("Could not restore cached document, clearing it: {}", err);
            if let Err(err) = self.clear_extracted() {
                study_warn!("Could not clear cached document: {}", err);
            }
        }
    }

    /// A previously fetched explanation for `concept`, if any.
    pub fn explanation(&self, concept: &str) -> Option<String> {
        self.explanations().remove(concept)
    }

    /// Adds or replaces the explanation for `concept`, keeping the others.
    pub fn store_explanation(&self, concept: &str, explanation: &str) -> Result<(), StoreError> {
        let mut explanations = self.explanations();
        explanations.insert(concept.to_string(), explanation.to_string());
        let raw = serde_json::to_string(&explanations)
            .map_err(|err| StoreError::Serialize(err.to_string()))?;
        self.store.set(LEARN_EXPLANATIONS_KEY, &raw)
    }

    fn explanations(&self) -> BTreeMap<String, String> {
        let Some(raw) = self.store.get(LEARN_EXPLANATIONS_KEY) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|err| {
            study_warn!("Ignoring unreadable cached explanations: {}", err);
            BTreeMap::new()
        })
    }

    /// The cached concepts in canonical form. Older entries holding bare
    /// labels are resolved here as well.
    pub fn concepts(&self) -> Vec<Concept> {
        let Some(raw) = self.store.get(CONCEPTS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<RawConcept>>(&raw) {
            Ok(concepts) => normalize_concepts(concepts),
            Err(err) => {
                study_warn!("Ignoring unreadable cached concepts: {}", err);
                Vec::new()
            }
        }
    }

    pub fn document_id(&self) -> Option<String> {
        self.store
            .get(DOCUMENT_ID_KEY)
            .filter(|id| !id.trim().is_empty())
    }

    pub fn url(&self) -> Option<String> {
        self.store.get(URL_KEY).filter(|url| !url.trim().is_empty())
    }

    pub fn load_document(&self) -> Option<ExtractedDocument> {
        if !self.has_extracted_content() {
            return None;
        }
        let raw = self.store.get(INFO_KEY)?;
        let info: CachedInfo = match serde_json::from_str(&raw) {
            Ok(info) => info,
            Err(err) => {
                study_warn!("Ignoring unreadable cached document info: {}", err);
                return None;
            }
        };
        Some(ExtractedDocument {
            document_id: self
                .document_id()
                .or(info.document_id)
                .unwrap_or_default(),
            url: self.url().unwrap_or(info.url),
            title: info.title,
            summary: info.summary,
            text_length: info.text_length,
            chunks_indexed: info.chunks_indexed,
            concepts: self.concepts(),
        })
    }

    /// Forgets the extracted document.
    pub fn clear_extracted(&self) -> Result<(), StoreError> {
        for key in EXTRACTED_KEYS {
            self.store.remove(key)?;
        }
        Ok(())
    }

    /// Forgets everything this client stored, including the chat session.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.clear_extracted()?;
        self.store.remove(CHAT_SESSION_KEY)
    }
}

/// A topic derived from extracted content, in its canonical form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Concept {
    pub title: String,
    pub description: Option<String>,
}

impl Concept {
    /// Concept from a bare label. Blank labels yield `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        let title = label.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            description: None,
        })
    }

    /// Concept from a loosely shaped record; `title` wins over `name`.
    pub fn from_fields(
        title: Option<&str>,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Option<Self> {
        let title = [title, name]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())?;
        let description = description
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned);
        Some(Self {
            title: title.to_string(),
            description,
        })
    }
}

/// The last successfully extracted document, as cached client-side.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExtractedDocument {
    pub document_id: String,
    pub url: String,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub text_length: u64,
    pub chunks_indexed: u32,
    pub concepts: Vec<Concept>,
}

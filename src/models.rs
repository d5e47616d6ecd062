use std::collections::BTreeMap;

/// Normalized catalog record. Immutable once fetched; `description` has
/// already had HTML entities unescaped.
#[derive(Debug, Clone)]
pub struct ProductRecord {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub product_type: Option<String>,
    /// Comma-separated tag list, verbatim from the API.
    pub tags: Option<String>,
    pub variants: Vec<Variant>,
    pub metafields: BTreeMap<String, String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub title: String,
    pub price: String,
}

/// One rendered request for the completion API. Built fresh per call, never
/// persisted.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub subject: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Outcome of one completion call; consumed immediately by the report writer.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub subject: String,
    pub text: Option<String>,
    pub failure_reason: Option<String>,
}

impl GenerationResult {
    pub fn success(subject: impl Into<String>, text: String) -> Self {
        Self {
            subject: subject.into(),
            text: Some(text),
            failure_reason: None,
        }
    }

    pub fn failure(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            text: None,
            failure_reason: Some(reason.into()),
        }
    }
}

pub mod cache;
pub mod config;
pub mod context;
pub mod document;
pub mod expand;
pub mod exposure;
pub mod fetch;
pub mod gateway;
pub mod kv;
pub mod markdown;
pub mod progress;
pub mod reference;
pub mod sync;
pub mod warning;
pub mod webflow;

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
#[error("{context}: {detail}")]
pub struct Error {
    pub context: Box<ErrorContext>,
    pub detail: Box<ErrorDetail>,
}

/// The kind of sync unit an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Site,
    Page,
    Collection,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Unit::Site => write!(f, "site"),
            Unit::Page => write!(f, "page"),
            Unit::Collection => write!(f, "collection"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub unit: Unit,
    pub id: Option<String>,
}

impl ErrorContext {
    fn new(unit: Unit, id: &str) -> Self {
        Self {
            unit,
            id: Some(id).filter(|id| !id.is_empty()).map(str::to_owned),
        }
    }

    pub fn site(id: &str) -> Self {
        Self::new(Unit::Site, id)
    }

    pub fn page(id: &str) -> Self {
        Self::new(Unit::Page, id)
    }

    pub fn collection(id: &str) -> Self {
        Self::new(Unit::Collection, id)
    }

    pub fn error(&self, detail: ErrorDetail) -> Error {
        Error {
            context: Box::new(self.clone()),
            detail: Box::new(detail),
        }
    }

    pub fn store<E: std::error::Error + Send + Sync + 'static>(&self, e: E) -> Error {
        self.error(ErrorDetail::Store(Box::new(e)))
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.id {
            Some(id) => write!(f, "{}({id})", self.unit),
            None => write!(f, "{}", self.unit),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ErrorDetail {
    #[error("Missing configuration: {0}")]
    MissingConfig(&'static str),
    #[error("Site not found")]
    SiteNotFound,
    #[error("API error: {0}")]
    Api(webflow::Error),
    #[error("Store error: {0}")]
    Store(Box<dyn std::error::Error + Send + Sync>),
    #[error("Failed to encode: {0}")]
    Encode(serde_json::Error),
}

impl<E: std::error::Error + Send + Sync + 'static> From<exposure::SettingsError<E>> for ErrorDetail {
    fn from(error: exposure::SettingsError<E>) -> Self {
        match error {
            exposure::SettingsError::Store(e) => ErrorDetail::Store(Box::new(e)),
            exposure::SettingsError::Encode(e) => ErrorDetail::Encode(e),
        }
    }
}

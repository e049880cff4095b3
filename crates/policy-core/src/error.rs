use thiserror::Error;

/// Failure of a cache mutation or a read-through load.
///
/// The in-memory index is left untouched whenever one of these is returned.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("{collection} store failed to {operation} `{key}`")]
    Store {
        collection: &'static str,
        operation: StoreOperation,
        key: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("{collection} store rejected {operation} of `{key}`")]
    Rejected {
        collection: &'static str,
        operation: StoreOperation,
        key: String,
    },
}

impl CacheError {
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Store { key, .. } | Self::Rejected { key, .. } => key,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOperation {
    LoadAll,
    LoadOne,
    Upsert,
    Delete,
}

impl core::fmt::Display for StoreOperation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::LoadAll => "load all of",
            Self::LoadOne => "load",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        })
    }
}

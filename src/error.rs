use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing run settings
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {field}: '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Errors that can occur when resolving a language/provider link on a page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No language mapping or provider links found for language '{language}'")]
    LanguageUnavailable { language: String },

    #[error("No matching download found for language '{language}' and provider '{provider}'")]
    ProviderUnavailable { language: String, provider: String },
}

/// Errors raised by the catalog collaborators (page fetching and scraping)
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to fetch page {url}: {source}")]
    FetchFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Errors that can occur during a single transport attempt
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request failed for {url}: {source}")]
    HttpFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Failed to create file {path}: {source}")]
    FileCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write to file {path}: {source}")]
    FileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Stream error while downloading {url}: {source}")]
    StreamFailed {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Downloaded file {0} is empty or missing")]
    EmptyOutput(PathBuf),

    #[error("Failed to run media tool {tool}: {source}")]
    RemuxSpawnFailed {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Media tool exited with {status} for {url}")]
    RemuxFailed { url: String, status: String },
}

/// Errors that can occur when loading or persisting the run ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Failed to read ledger file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write ledger file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse ledger JSON in {path}: {source}")]
    JsonParseFailed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize ledger: {0}")]
    JsonSerializeFailed(#[from] serde_json::Error),
}

/// Conditions that must hold before any download starts
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("No read permission on {0}. Check that you own the folder and may read it")]
    NoReadPermission(PathBuf),

    #[error("No write permission on {0}. Check that you own the folder and may write to it")]
    NoWritePermission(PathBuf),

    #[error("Name is still the default. Pass the show name as it appears in the site URL")]
    DefaultName,

    #[error("Media tool {0} is not installed or could not be run")]
    RemuxToolUnavailable(PathBuf),

    #[error("Failed to create directory {path}: {source}")]
    CreateDirectoryFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Top-level errors for a run
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Single episode S{season:02}E{episode:02} aborted: {source}")]
    EpisodeAborted {
        season: u32,
        episode: u32,
        #[source]
        source: ResolveError,
    },
}

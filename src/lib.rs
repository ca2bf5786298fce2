pub mod catalog;
pub mod config;
pub mod error;
pub mod http;
pub mod ledger;
pub mod progress;
pub mod resolver;
pub mod scheduler;
pub mod state;
pub mod transport;

// Re-export main types for convenience
pub use catalog::{Catalog, RedirectLink, SiteCatalog};
pub use config::{
    DownloadMode, MediaType, Provider, RunConfig, SeasonOverride, ThrottleConfig, TransportKind,
};
pub use error::{
    CatalogError, ConfigError, LedgerError, PreconditionError, ResolveError, RunError,
    TransportError,
};
pub use http::{ConnectionRetry, HttpClient, HttpResponse, ReqwestClient};
pub use ledger::RunLedger;
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use resolver::{LanguageMap, resolve_provider_link};
pub use scheduler::{LanguagePolicy, RunSummary, Scheduler, preflight, run_show};
pub use transport::{DirectTransport, HlsTransport, RetryPolicy, Transport, Transports};

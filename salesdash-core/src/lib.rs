pub mod aggregate;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod ingest;
pub mod models;
pub mod query;

pub use api::{HttpApiClient, SalesApi};
pub use config::SalesdashConfig;
pub use dashboard::{ClientsView, Dashboard, ShownClients, ViewUpdate};
pub use error::{ApiError, SalesdashError};
pub use filters::{ClientFilters, DateRange, FilterSelection, FilterStore, UseCaseStatus, ALL};
pub use ingest::{IngestNotice, NoticeKind};
pub use query::{QueryCache, QueryState};

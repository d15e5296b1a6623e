pub mod config;
pub mod enrich;
pub mod errors;
pub mod filter;
pub mod logging;
pub mod metrics;
pub mod record;
pub mod store;

pub use config::FilterConfig;
pub use errors::{FilterError, FilterResult};
pub use filter::{filter_by_type, FilterEngine, FilterOutput};
pub use record::Record;
pub use store::RecordStore;

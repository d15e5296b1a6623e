//! Concurrent, partitioned filtering of a delimited record file.
//!
//! A call to [`filter_by_type`] runs in five steps:
//!
//! 1. **Validation**: `items` and `items_per_worker` must be positive.
//! 2. **Planning** ([`planner`]): the file is split into
//!    `ceil(items / items_per_worker)` byte ranges whose edges are moved
//!    forward onto record boundaries.
//! 3. **Scanning** ([`worker`], [`scanner`]): one worker per range decodes
//!    only its own bytes, tests each id against the predicate and publishes
//!    matches on a bounded channel until its range ends or it has published
//!    `items_per_worker` records.
//! 4. **Collection** ([`collector`]): the calling thread selects over the
//!    match and completion channels until `items` records have arrived or
//!    every worker has finished.
//! 5. **Shutdown**: outstanding workers are cancelled and joined.
//!
//! ```rust,ignore
//! let config = FilterConfig { data_file: "pokemon.csv".into(), ..Default::default() };
//! let odd = filter_by_type(&config, "odd", 5, 3)?;
//! assert!(odd.len() <= 5);
//! ```
//!
//! Results arrive in whatever order workers produce them. Set
//! `sort_results` in [`crate::config::FilterConfig`] to sort by id.
pub mod cancel;
pub mod collector;
pub mod engine;
pub mod planner;
pub mod predicate;
pub mod scanner;
pub mod source;
pub mod worker;

pub use collector::Finish;
pub use engine::{filter_by_type, FilterEngine, FilterOutput};
pub use planner::{plan_chunks, ChunkDescriptor, Target};
pub use predicate::{FilterRegistry, IdPredicate, Parity};
pub use scanner::RecordScanner;

//! `hnstories` library.
//!
//! The core is an order-preserving fan-out (`fanout`): one concurrent fetch per
//! identifier, results returned in input order, failures collected until every
//! fetch has finished. `orchestrator` wires an item source and a fetcher to it,
//! and `hn` provides both for the Hacker News API.
//!
//! Invariants:
//! - `result[i]` always corresponds to `ids[i]`
//! - no fetch is abandoned; the call returns only after all of them terminate
//! - at most one error is reported per call (lowest input index wins)

pub mod config;
pub mod error;
pub mod fanout;
pub mod hn;
pub mod orchestrator;

pub use config::{FanoutOptions, HnConfig};
pub use error::FanoutError;
pub use fanout::fan_out;
pub use hn::{HnClient, Story};
pub use orchestrator::{fetch_all, fetch_ids, Fetcher, ItemSource};

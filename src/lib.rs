//! PESOS - feed synchronization service
//!
//! Periodically fetches the RSS, Atom and JSON feeds users subscribe to,
//! stores every new entry once per subscriber and tracks failing feeds.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod sync;
pub mod web;

pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{PesosError, Result};
pub use feed::{
    FeedFetcher, FetchError, HttpFetcher, Item, ItemRepository, ParseError, Source,
    SourceRepository,
};
pub use sync::{
    ManualClock, RunError, RunOptions, RunReport, RunStats, SyncScheduler, SyncService,
};
pub use web::{create_router, AppState, WebServer};

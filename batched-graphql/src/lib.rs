//! Batched GraphQL serves a relational data set (users, profiles, posts, member types and the
//! subscription edges between users) through a single GraphQL endpoint, without falling into the
//! N+1 fetch problem that naturally arises when a graph-shaped query is resolved field by field.
//!
//! The crate consists of a few layers:
//!
//! * A [loader](loader) layer, which sits between the GraphQL execution engine and the
//!   persistence collaborator. Every key requested while one pass of field resolvers runs is
//!   [coalesced](loader::scheduler) into a single grouped fetch, and each result is
//!   [cached](loader::cache) for the rest of the request. Entity-specific
//!   [facades](loader::facade) adapt "where column IN keys" queries to the positional contract of
//!   the scheduler, for both one-to-one and one-to-many relationships.
//! * A [query-shape guard](guard) which rejects pathologically deep queries before any data is
//!   fetched.
//! * An [executor](executor), the single entrypoint for requests, which parses, guards, and
//!   executes a query against the [object graph](graphql) with a fresh set of
//!   [loaders](loaders::Loaders) bound to that request alone.
//!
//! Persistence itself is external. The executor reaches it only through the [`Store`](store::Store)
//! trait; an [in-memory implementation](store::memory) is included for testing and for the
//! command line tool.

// Lets the derive macros refer to this crate by name from inside the crate itself.
extern crate self as batched_graphql;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

pub mod executor;
pub mod graphql;
pub mod guard;
pub mod key;
pub mod loader;
pub mod loaders;
pub mod model;
pub mod prelude;
pub mod record;
pub mod store;

/// The depth limit used when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Configuration of an [`Executor`](executor::Executor).
///
/// Configuration is fixed when the executor is constructed; it cannot be overridden per request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct Config {
    /// The maximum nesting depth of a query. Root fields are at depth 0.
    #[cfg_attr(
        feature = "cli",
        arg(long, env = "BATCHED_GRAPHQL_MAX_DEPTH", default_value_t = DEFAULT_MAX_DEPTH)
    )]
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Initialize tracing.
pub fn init_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        // A hook may already be installed by the embedding application.
        color_eyre::install().ok();
        tracing_subscriber::fmt()
            .with_ansi(true)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    });
}

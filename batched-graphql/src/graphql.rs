//! The GraphQL object graph.
//!
//! Root fields read from the store directly, or through the loaders when they look up a single
//! record. Every relationship between records is resolved through the request's
//! [`Loaders`](crate::loaders::Loaders), which async-graphql hands to resolvers as request data.
//! Because async-graphql resolves the fields of sibling objects concurrently, a relationship
//! requested on every element of a list costs one store query, not one per element.

use async_graphql::{EmptySubscription, Schema};

mod mutation;
mod query;
mod scalars;

pub use mutation::Mutation;
pub use query::Query;

/// The schema of the object graph.
pub type AppSchema = Schema<Query, Mutation, EmptySubscription>;

/// Build the schema.
///
/// The schema holds no data. Each request must be given its own
/// [`Loaders`](crate::loaders::Loaders) as request data.
pub fn build_schema() -> AppSchema {
    Schema::build(Query, Mutation, EmptySubscription).finish()
}

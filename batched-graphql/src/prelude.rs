//! Common items that you will always want in scope when serving the object graph.

pub use crate::{
    executor::{Executor, QueryRequest},
    key::{EntityId, FetchKey, InvalidKey, MemberTypeId},
    loader::{Fetch, LoadError, Loader},
    model::*,
    store::{memory::MemoryStore, SharedStore, Store, StoreError},
    Config,
};
pub use async_graphql::{self, value, Response};

//! The persistence collaborator.
//!
//! The executor never talks to a database directly. Everything it reads or writes goes through the
//! [`Store`] trait, which a deployment implements on top of its real persistence layer. Lookups are
//! all of the form "every record where column IN keys", so that a loader can fetch a whole batch of
//! keys in one call. They return matching records in any order, and simply leave out keys that
//! match nothing: a missing record is never an error.

use crate::key::{EntityId, MemberTypeId};
use crate::model::*;
use async_trait::async_trait;
use snafu::Snafu;
use std::sync::Arc;

pub mod memory;

/// Errors reported by a [`Store`].
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StoreError {
    /// A mutation referred to a record which does not exist.
    #[snafu(display("{record} {id} not found"))]
    NotFound { record: &'static str, id: String },
    /// A mutation would violate an integrity constraint.
    #[snafu(display("constraint violated: {message}"))]
    Constraint { message: String },
    /// The store could not be reached.
    #[snafu(display("store unavailable: {message}"))]
    Unavailable { message: String },
}

/// A store shared by every request an executor serves.
pub type SharedStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync {
    async fn users_by_id(&self, ids: &[EntityId]) -> Result<Vec<User>, StoreError>;
    async fn posts_by_id(&self, ids: &[EntityId]) -> Result<Vec<Post>, StoreError>;
    async fn posts_by_author_id(&self, ids: &[EntityId]) -> Result<Vec<Post>, StoreError>;
    async fn profiles_by_id(&self, ids: &[EntityId]) -> Result<Vec<Profile>, StoreError>;
    async fn profiles_by_user_id(&self, ids: &[EntityId]) -> Result<Vec<Profile>, StoreError>;
    async fn profiles_by_member_type_id(
        &self,
        ids: &[MemberTypeId],
    ) -> Result<Vec<Profile>, StoreError>;
    async fn member_types_by_id(&self, ids: &[MemberTypeId])
        -> Result<Vec<MemberType>, StoreError>;
    /// Subscription edges whose subscriber is any of `ids`.
    async fn subscriptions_by_subscriber_id(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<SubscriptionEdge>, StoreError>;
    /// Subscription edges whose author is any of `ids`.
    async fn subscriptions_by_author_id(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<SubscriptionEdge>, StoreError>;

    async fn users(&self) -> Result<Vec<User>, StoreError>;
    async fn posts(&self) -> Result<Vec<Post>, StoreError>;
    async fn profiles(&self) -> Result<Vec<Profile>, StoreError>;
    async fn member_types(&self) -> Result<Vec<MemberType>, StoreError>;

    async fn create_user(&self, input: CreateUserInput) -> Result<User, StoreError>;
    async fn change_user(&self, id: &EntityId, input: ChangeUserInput) -> Result<User, StoreError>;
    /// Delete a user along with their profile, posts and subscription edges.
    async fn delete_user(&self, id: &EntityId) -> Result<(), StoreError>;

    async fn create_post(&self, input: CreatePostInput) -> Result<Post, StoreError>;
    async fn change_post(&self, id: &EntityId, input: ChangePostInput) -> Result<Post, StoreError>;
    async fn delete_post(&self, id: &EntityId) -> Result<(), StoreError>;

    async fn create_profile(&self, input: CreateProfileInput) -> Result<Profile, StoreError>;
    async fn change_profile(
        &self,
        id: &EntityId,
        input: ChangeProfileInput,
    ) -> Result<Profile, StoreError>;
    async fn delete_profile(&self, id: &EntityId) -> Result<(), StoreError>;

    /// Make `subscriber` follow `author`.
    async fn subscribe(
        &self,
        subscriber: &EntityId,
        author: &EntityId,
    ) -> Result<SubscriptionEdge, StoreError>;
    /// Make `subscriber` stop following `author`.
    async fn unsubscribe(&self, subscriber: &EntityId, author: &EntityId)
        -> Result<(), StoreError>;
}

//! Records of the object graph, and the inputs mutations accept.
//!
//! Each record is both a row of the persistence collaborator and a GraphQL object. The scalar
//! fields are exposed directly; relationships between records are resolved through the request's
//! [loaders](crate::loaders) by the resolvers in [`graphql`](crate::graphql).

use crate::key::{EntityId, MemberTypeId};
use crate::record::Record;
use async_graphql::{InputObject, SimpleObject};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, SimpleObject, Record, Serialize, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[record(column)]
    pub id: EntityId,
    pub name: String,
    pub balance: f64,
}

/// Personal details of a user. A user has at most one profile.
#[derive(Clone, Debug, PartialEq, SimpleObject, Record, Serialize, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[record(column)]
    pub id: EntityId,
    pub is_male: bool,
    pub year_of_birth: i32,
    /// The user this profile describes.
    #[record(column)]
    pub user_id: EntityId,
    /// The tier the user is subscribed at.
    #[record(column)]
    pub member_type_id: MemberTypeId,
}

#[derive(Clone, Debug, PartialEq, SimpleObject, Record, Serialize, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[record(column)]
    pub id: EntityId,
    pub title: String,
    pub content: String,
    #[record(column)]
    pub author_id: EntityId,
}

/// A subscription tier.
#[derive(Clone, Debug, PartialEq, SimpleObject, Record, Serialize, Deserialize)]
#[graphql(complex)]
#[serde(rename_all = "camelCase")]
pub struct MemberType {
    #[record(column)]
    pub id: MemberTypeId,
    pub discount: f64,
    pub posts_limit_per_month: i32,
}

/// One user following the posts of another.
///
/// Subscription edges are not exposed as GraphQL objects; they only connect users.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Record, Serialize, Deserialize)]
#[record(module(subscription))]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionEdge {
    /// The user who subscribed.
    #[record(column)]
    pub subscriber_id: EntityId,
    /// The user being followed.
    #[record(column)]
    pub author_id: EntityId,
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateUserInput {
    pub name: String,
    pub balance: f64,
}

/// Fields of a user to overwrite. Omitted fields are left unchanged.
#[derive(Clone, Debug, Default, InputObject)]
pub struct ChangeUserInput {
    pub name: Option<String>,
    pub balance: Option<f64>,
}

#[derive(Clone, Debug, InputObject)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub author_id: EntityId,
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct ChangePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone, Debug, InputObject)]
pub struct CreateProfileInput {
    pub is_male: bool,
    pub year_of_birth: i32,
    pub user_id: EntityId,
    pub member_type_id: MemberTypeId,
}

#[derive(Clone, Debug, Default, InputObject)]
pub struct ChangeProfileInput {
    pub is_male: Option<bool>,
    pub year_of_birth: Option<i32>,
    pub member_type_id: Option<MemberTypeId>,
}

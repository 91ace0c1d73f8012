//! In-memory instantiation of the [`Store`](super::Store) interface.
//!
//! This store is a handful of vectors behind a lock. It is useful for testing in isolation from an
//! actual database, and as the backing store of the command line tool. Besides serving queries, it
//! records every lookup it receives, so tests can count round trips, and it can be told to fail, so
//! tests can observe how errors propagate.

use super::{ConstraintSnafu, NotFoundSnafu, Store, StoreError, UnavailableSnafu};
use crate::key::{EntityId, MemberTypeId};
use crate::model::*;
use crate::record::{Column, Record};
use async_std::sync::{Mutex, RwLock};
use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;

/// The contents of every table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Tables {
    pub users: Vec<User>,
    pub posts: Vec<Post>,
    pub profiles: Vec<Profile>,
    pub member_types: Vec<MemberType>,
    pub subscriptions: Vec<SubscriptionEdge>,
}

/// A query received by a [`MemoryStore`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// The name of the [`Store`] method.
    pub query: &'static str,
    /// The keys the query selected by, if any.
    pub keys: Vec<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    calls: Mutex<Vec<Call>>,
    failure: Mutex<Option<String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables: RwLock::new(tables),
            ..Default::default()
        }
    }

    /// A store containing only the standard member types.
    pub fn with_member_types() -> Self {
        Self::with_tables(Tables {
            member_types: vec![
                MemberType {
                    id: MemberTypeId::Basic,
                    discount: 2.3,
                    posts_limit_per_month: 20,
                },
                MemberType {
                    id: MemberTypeId::Business,
                    discount: 7.7,
                    posts_limit_per_month: 100,
                },
            ],
            ..Default::default()
        })
    }

    /// Load the store from a JSON document shaped like [`Tables`].
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        Ok(Self::with_tables(serde_json::from_str(json)?))
    }

    /// A copy of the current contents of every table.
    pub async fn snapshot(&self) -> Tables {
        self.tables.read().await.clone()
    }

    /// Every query received so far, in order.
    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    /// Forget the queries received so far.
    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock().await = Some(message.into());
    }

    /// Undo [`fail_with`](Self::fail_with).
    pub async fn recover(&self) {
        *self.failure.lock().await = None;
    }

    async fn check_available(&self) -> Result<(), StoreError> {
        match &*self.failure.lock().await {
            Some(message) => UnavailableSnafu { message }.fail(),
            None => Ok(()),
        }
    }

    async fn log(&self, query: &'static str, keys: Vec<String>) -> Result<(), StoreError> {
        self.calls.lock().await.push(Call { query, keys });
        self.check_available().await
    }

    /// Every row of `table` whose column `C` is one of `keys`, in table order.
    async fn select<R, C>(
        &self,
        query: &'static str,
        table: impl FnOnce(&Tables) -> &Vec<R>,
        keys: &[C::Key],
    ) -> Result<Vec<R>, StoreError>
    where
        R: Record,
        C: Column<R>,
        C::Key: Display,
    {
        tracing::info!(
            "SELECT * FROM {} WHERE {} IN ({})",
            R::NAME,
            C::NAME,
            keys.iter().join(", ")
        );
        self.log(query, keys.iter().map(|key| key.to_string()).collect())
            .await?;

        let keys = keys.iter().collect::<HashSet<_>>();
        let tables = self.tables.read().await;
        Ok(table(&*tables)
            .iter()
            .filter(|row| keys.contains(C::of(row)))
            .cloned()
            .collect())
    }

    async fn select_all<R: Record>(
        &self,
        query: &'static str,
        table: impl FnOnce(&Tables) -> &Vec<R>,
    ) -> Result<Vec<R>, StoreError> {
        tracing::info!("SELECT * FROM {}", R::NAME);
        self.log(query, vec![]).await?;
        Ok(table(&*self.tables.read().await).clone())
    }
}

fn not_found<R: Record>(id: &impl Display) -> StoreError {
    NotFoundSnafu {
        record: R::NAME,
        id: id.to_string(),
    }
    .build()
}

fn find_mut<'a, R, C>(rows: &'a mut [R], key: &C::Key) -> Result<&'a mut R, StoreError>
where
    R: Record,
    C: Column<R>,
    C::Key: Display,
{
    rows.iter_mut()
        .find(|row| C::of(row) == key)
        .ok_or_else(|| not_found::<R>(key))
}

fn user_exists(tables: &Tables, id: &EntityId) -> Result<(), StoreError> {
    if tables.users.iter().any(|user| &user.id == id) {
        Ok(())
    } else {
        Err(not_found::<User>(id))
    }
}

fn member_type_exists(tables: &Tables, id: MemberTypeId) -> Result<(), StoreError> {
    if tables.member_types.iter().any(|ty| ty.id == id) {
        Ok(())
    } else {
        ConstraintSnafu {
            message: format!("member type {id} does not exist"),
        }
        .fail()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn users_by_id(&self, ids: &[EntityId]) -> Result<Vec<User>, StoreError> {
        self.select::<_, user::Id>("users_by_id", |t| &t.users, ids)
            .await
    }

    async fn posts_by_id(&self, ids: &[EntityId]) -> Result<Vec<Post>, StoreError> {
        self.select::<_, post::Id>("posts_by_id", |t| &t.posts, ids)
            .await
    }

    async fn posts_by_author_id(&self, ids: &[EntityId]) -> Result<Vec<Post>, StoreError> {
        self.select::<_, post::AuthorId>("posts_by_author_id", |t| &t.posts, ids)
            .await
    }

    async fn profiles_by_id(&self, ids: &[EntityId]) -> Result<Vec<Profile>, StoreError> {
        self.select::<_, profile::Id>("profiles_by_id", |t| &t.profiles, ids)
            .await
    }

    async fn profiles_by_user_id(&self, ids: &[EntityId]) -> Result<Vec<Profile>, StoreError> {
        self.select::<_, profile::UserId>("profiles_by_user_id", |t| &t.profiles, ids)
            .await
    }

    async fn profiles_by_member_type_id(
        &self,
        ids: &[MemberTypeId],
    ) -> Result<Vec<Profile>, StoreError> {
        self.select::<_, profile::MemberTypeId>("profiles_by_member_type_id", |t| &t.profiles, ids)
            .await
    }

    async fn member_types_by_id(
        &self,
        ids: &[MemberTypeId],
    ) -> Result<Vec<MemberType>, StoreError> {
        self.select::<_, member_type::Id>("member_types_by_id", |t| &t.member_types, ids)
            .await
    }

    async fn subscriptions_by_subscriber_id(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<SubscriptionEdge>, StoreError> {
        self.select::<_, subscription::SubscriberId>(
            "subscriptions_by_subscriber_id",
            |t| &t.subscriptions,
            ids,
        )
        .await
    }

    async fn subscriptions_by_author_id(
        &self,
        ids: &[EntityId],
    ) -> Result<Vec<SubscriptionEdge>, StoreError> {
        self.select::<_, subscription::AuthorId>(
            "subscriptions_by_author_id",
            |t| &t.subscriptions,
            ids,
        )
        .await
    }

    async fn users(&self) -> Result<Vec<User>, StoreError> {
        self.select_all("users", |t| &t.users).await
    }

    async fn posts(&self) -> Result<Vec<Post>, StoreError> {
        self.select_all("posts", |t| &t.posts).await
    }

    async fn profiles(&self) -> Result<Vec<Profile>, StoreError> {
        self.select_all("profiles", |t| &t.profiles).await
    }

    async fn member_types(&self) -> Result<Vec<MemberType>, StoreError> {
        self.select_all("member_types", |t| &t.member_types).await
    }

    async fn create_user(&self, input: CreateUserInput) -> Result<User, StoreError> {
        self.check_available().await?;
        let user = User {
            id: EntityId::random(),
            name: input.name,
            balance: input.balance,
        };
        tracing::info!("INSERT INTO User VALUES ({})", user.id);
        self.tables.write().await.users.push(user.clone());
        Ok(user)
    }

    async fn change_user(&self, id: &EntityId, input: ChangeUserInput) -> Result<User, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        let user = find_mut::<_, user::Id>(&mut tables.users, id)?;
        if let Some(name) = input.name {
            user.name = name;
        }
        if let Some(balance) = input.balance {
            user.balance = balance;
        }
        Ok(user.clone())
    }

    async fn delete_user(&self, id: &EntityId) -> Result<(), StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        user_exists(&tables, id)?;
        tracing::info!("DELETE FROM User WHERE id = {id}");
        tables.users.retain(|user| &user.id != id);
        tables.profiles.retain(|profile| &profile.user_id != id);
        tables.posts.retain(|post| &post.author_id != id);
        tables
            .subscriptions
            .retain(|edge| &edge.subscriber_id != id && &edge.author_id != id);
        Ok(())
    }

    async fn create_post(&self, input: CreatePostInput) -> Result<Post, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        user_exists(&tables, &input.author_id)?;
        let post = Post {
            id: EntityId::random(),
            title: input.title,
            content: input.content,
            author_id: input.author_id,
        };
        tracing::info!("INSERT INTO Post VALUES ({})", post.id);
        tables.posts.push(post.clone());
        Ok(post)
    }

    async fn change_post(&self, id: &EntityId, input: ChangePostInput) -> Result<Post, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        let post = find_mut::<_, post::Id>(&mut tables.posts, id)?;
        if let Some(title) = input.title {
            post.title = title;
        }
        if let Some(content) = input.content {
            post.content = content;
        }
        Ok(post.clone())
    }

    async fn delete_post(&self, id: &EntityId) -> Result<(), StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        find_mut::<_, post::Id>(&mut tables.posts, id)?;
        tracing::info!("DELETE FROM Post WHERE id = {id}");
        tables.posts.retain(|post| &post.id != id);
        Ok(())
    }

    async fn create_profile(&self, input: CreateProfileInput) -> Result<Profile, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        user_exists(&tables, &input.user_id)?;
        member_type_exists(&tables, input.member_type_id)?;
        if tables
            .profiles
            .iter()
            .any(|profile| profile.user_id == input.user_id)
        {
            return ConstraintSnafu {
                message: format!("user {} already has a profile", input.user_id),
            }
            .fail();
        }

        let profile = Profile {
            id: EntityId::random(),
            is_male: input.is_male,
            year_of_birth: input.year_of_birth,
            user_id: input.user_id,
            member_type_id: input.member_type_id,
        };
        tracing::info!("INSERT INTO Profile VALUES ({})", profile.id);
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn change_profile(
        &self,
        id: &EntityId,
        input: ChangeProfileInput,
    ) -> Result<Profile, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        if let Some(member_type_id) = input.member_type_id {
            member_type_exists(&tables, member_type_id)?;
        }
        let profile = find_mut::<_, profile::Id>(&mut tables.profiles, id)?;
        if let Some(is_male) = input.is_male {
            profile.is_male = is_male;
        }
        if let Some(year_of_birth) = input.year_of_birth {
            profile.year_of_birth = year_of_birth;
        }
        if let Some(member_type_id) = input.member_type_id {
            profile.member_type_id = member_type_id;
        }
        Ok(profile.clone())
    }

    async fn delete_profile(&self, id: &EntityId) -> Result<(), StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        find_mut::<_, profile::Id>(&mut tables.profiles, id)?;
        tracing::info!("DELETE FROM Profile WHERE id = {id}");
        tables.profiles.retain(|profile| &profile.id != id);
        Ok(())
    }

    async fn subscribe(
        &self,
        subscriber: &EntityId,
        author: &EntityId,
    ) -> Result<SubscriptionEdge, StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        user_exists(&tables, subscriber)?;
        user_exists(&tables, author)?;

        let edge = SubscriptionEdge {
            subscriber_id: subscriber.clone(),
            author_id: author.clone(),
        };
        if tables.subscriptions.contains(&edge) {
            return ConstraintSnafu {
                message: format!("user {subscriber} is already subscribed to {author}"),
            }
            .fail();
        }
        tracing::info!("INSERT INTO SubscriptionEdge VALUES ({subscriber}, {author})");
        tables.subscriptions.push(edge.clone());
        Ok(edge)
    }

    async fn unsubscribe(
        &self,
        subscriber: &EntityId,
        author: &EntityId,
    ) -> Result<(), StoreError> {
        self.check_available().await?;
        let mut tables = self.tables.write().await;
        let before = tables.subscriptions.len();
        tables
            .subscriptions
            .retain(|edge| !(&edge.subscriber_id == subscriber && &edge.author_id == author));
        if tables.subscriptions.len() == before {
            return Err(not_found::<SubscriptionEdge>(&format!(
                "{subscriber} -> {author}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::init_logging;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(CreateUserInput {
                name: name.into(),
                balance: 0.0,
            })
            .await
            .unwrap()
    }

    #[async_std::test]
    async fn test_select_keeps_table_order() {
        init_logging();

        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        let carol = user(&store, "carol").await;

        let found = store
            .users_by_id(&[carol.id.clone(), EntityId::random(), alice.id.clone()])
            .await
            .unwrap();
        assert_eq!(found, [alice.clone(), carol.clone()]);
        assert_eq!(store.users().await.unwrap(), [alice, bob, carol.clone()]);

        let calls = store.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].query, "users_by_id");
        assert_eq!(calls[0].keys.len(), 3);
        assert_eq!(calls[0].keys[0], carol.id.to_string());
        assert_eq!(calls[1], Call { query: "users", keys: vec![] });
    }

    #[async_std::test]
    async fn test_delete_user_cascades() {
        init_logging();

        let store = MemoryStore::with_member_types();
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        store
            .create_profile(CreateProfileInput {
                is_male: false,
                year_of_birth: 1990,
                user_id: alice.id.clone(),
                member_type_id: MemberTypeId::Basic,
            })
            .await
            .unwrap();
        store
            .create_post(CreatePostInput {
                title: "hello".into(),
                content: "world".into(),
                author_id: alice.id.clone(),
            })
            .await
            .unwrap();
        store.subscribe(&bob.id, &alice.id).await.unwrap();
        store.subscribe(&alice.id, &bob.id).await.unwrap();

        store.delete_user(&alice.id).await.unwrap();
        let tables = store.snapshot().await;
        assert_eq!(tables.users, [bob]);
        assert!(tables.profiles.is_empty());
        assert!(tables.posts.is_empty());
        assert!(tables.subscriptions.is_empty());

        assert_eq!(
            store.delete_user(&alice.id).await,
            Err(StoreError::NotFound {
                record: "User",
                id: alice.id.to_string(),
            })
        );
    }

    #[async_std::test]
    async fn test_constraints() {
        init_logging();

        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let missing = EntityId::random();

        let post = CreatePostInput {
            title: "t".into(),
            content: "c".into(),
            author_id: missing.clone(),
        };
        assert!(matches!(
            store.create_post(post).await,
            Err(StoreError::NotFound { record: "User", .. })
        ));

        // There are no member types in this store.
        let profile = CreateProfileInput {
            is_male: true,
            year_of_birth: 2000,
            user_id: alice.id.clone(),
            member_type_id: MemberTypeId::Business,
        };
        assert!(matches!(
            store.create_profile(profile).await,
            Err(StoreError::Constraint { .. })
        ));

        store.subscribe(&alice.id, &alice.id).await.unwrap();
        assert!(matches!(
            store.subscribe(&alice.id, &alice.id).await,
            Err(StoreError::Constraint { .. })
        ));
        store.unsubscribe(&alice.id, &alice.id).await.unwrap();
        assert!(matches!(
            store.unsubscribe(&alice.id, &alice.id).await,
            Err(StoreError::NotFound { record: "SubscriptionEdge", .. })
        ));
    }

    #[async_std::test]
    async fn test_one_profile_per_user() {
        init_logging();

        let store = MemoryStore::with_member_types();
        let alice = user(&store, "alice").await;
        let input = CreateProfileInput {
            is_male: false,
            year_of_birth: 1985,
            user_id: alice.id.clone(),
            member_type_id: MemberTypeId::Basic,
        };
        let profile = store.create_profile(input.clone()).await.unwrap();
        assert!(matches!(
            store.create_profile(input).await,
            Err(StoreError::Constraint { .. })
        ));

        let changed = store
            .change_profile(
                &profile.id,
                ChangeProfileInput {
                    member_type_id: Some(MemberTypeId::Business),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(changed.member_type_id, MemberTypeId::Business);
        assert_eq!(changed.year_of_birth, 1985);
    }

    #[async_std::test]
    async fn test_failure_injection() {
        init_logging();

        let store = MemoryStore::with_member_types();
        store.fail_with("disk on fire").await;
        assert_eq!(
            store.member_types().await,
            Err(StoreError::Unavailable {
                message: "disk on fire".into()
            })
        );
        store.recover().await;
        assert_eq!(store.member_types().await.unwrap().len(), 2);
    }

    #[test]
    fn test_from_json() {
        let id = "0c7dc2e0-1de8-4b0c-8a2e-3f4a5b6c7d8e";
        let store = MemoryStore::from_json(&format!(
            r#"{{
                "users": [{{ "id": "{}", "name": "alice", "balance": 1.5 }}],
                "memberTypes": [{{ "id": "basic", "discount": 1.0, "postsLimitPerMonth": 3 }}]
            }}"#,
            id.to_uppercase()
        ))
        .unwrap();
        let tables = async_std::task::block_on(store.snapshot());
        assert_eq!(tables.users[0].id.as_str(), id);
        assert_eq!(tables.member_types[0].id, MemberTypeId::Basic);
        assert!(tables.posts.is_empty());

        assert!(MemoryStore::from_json(r#"{ "users": [{ "id": "nope" }] }"#).is_err());
    }
}

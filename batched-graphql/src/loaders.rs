//! The loaders serving one request.

use crate::key::{EntityId, InvalidKey, MemberTypeId};
use crate::loader::{Loader, OneToMany, OneToOne, Source};
use crate::model::*;
use crate::store::{SharedStore, StoreError};
use async_trait::async_trait;

macro_rules! sources {
    ($($(#[$meta:meta])* $name:ident: $record:ty, by $column:ty, $key:ty => $query:ident;)*) => {
        $(
            $(#[$meta])*
            pub struct $name(SharedStore);

            #[async_trait]
            impl Source for $name {
                type Record = $record;
                type By = $column;
                type Error = StoreError;

                const NAME: &'static str = stringify!($query);

                async fn find(&self, keys: &[$key]) -> Result<Vec<$record>, StoreError> {
                    self.0.$query(keys).await
                }
            }
        )*
    };
}

sources! {
    /// Users by ID.
    UsersById: User, by user::Id, EntityId => users_by_id;
    /// Posts by ID.
    PostsById: Post, by post::Id, EntityId => posts_by_id;
    /// Posts by the ID of their author.
    PostsByAuthor: Post, by post::AuthorId, EntityId => posts_by_author_id;
    /// Profiles by ID.
    ProfilesById: Profile, by profile::Id, EntityId => profiles_by_id;
    /// Profiles by the ID of the user they describe.
    ProfilesByUser: Profile, by profile::UserId, EntityId => profiles_by_user_id;
    /// Profiles by member type.
    ProfilesByMemberType: Profile, by profile::MemberTypeId, MemberTypeId => profiles_by_member_type_id;
    /// Member types by ID.
    MemberTypesById: MemberType, by member_type::Id, MemberTypeId => member_types_by_id;
    /// Subscription edges by subscriber.
    SubscriptionsBySubscriber: SubscriptionEdge, by subscription::SubscriberId, EntityId
        => subscriptions_by_subscriber_id;
    /// Subscription edges by author.
    SubscriptionsByAuthor: SubscriptionEdge, by subscription::AuthorId, EntityId
        => subscriptions_by_author_id;
}

/// Every loader the object graph resolves relationships through.
///
/// A fresh set is created for each request and dropped when the request completes, so nothing
/// fetched on behalf of one request is ever visible to another.
pub struct Loaders {
    store: SharedStore,
    pub user: Loader<OneToOne<UsersById>>,
    pub post: Loader<OneToOne<PostsById>>,
    pub profile: Loader<OneToOne<ProfilesById>>,
    pub profile_by_user: Loader<OneToOne<ProfilesByUser>>,
    pub member_type: Loader<OneToOne<MemberTypesById>>,
    pub posts_by_author: Loader<OneToMany<PostsByAuthor>>,
    pub profiles_by_member_type: Loader<OneToMany<ProfilesByMemberType>>,
    pub subscriptions_by_subscriber: Loader<OneToMany<SubscriptionsBySubscriber>>,
    pub subscriptions_by_author: Loader<OneToMany<SubscriptionsByAuthor>>,
}

impl Loaders {
    pub fn new(store: SharedStore) -> Self {
        Self {
            user: Loader::new(OneToOne(UsersById(store.clone()))),
            post: Loader::new(OneToOne(PostsById(store.clone()))),
            profile: Loader::new(OneToOne(ProfilesById(store.clone()))),
            profile_by_user: Loader::new(OneToOne(ProfilesByUser(store.clone()))),
            member_type: Loader::new(OneToOne(MemberTypesById(store.clone()))),
            posts_by_author: Loader::new(OneToMany(PostsByAuthor(store.clone()))),
            profiles_by_member_type: Loader::new(OneToMany(ProfilesByMemberType(store.clone()))),
            subscriptions_by_subscriber: Loader::new(OneToMany(SubscriptionsBySubscriber(
                store.clone(),
            ))),
            subscriptions_by_author: Loader::new(OneToMany(SubscriptionsByAuthor(store.clone()))),
            store,
        }
    }

    /// The store these loaders fetch from.
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// Make records listed outside of the loaders visible to later loads.
    ///
    /// Entries which are already cached are kept.
    pub async fn prime_users(
        &self,
        users: impl IntoIterator<Item = User>,
    ) -> Result<(), InvalidKey> {
        self.user.prime_many(users, |user| user.id.clone()).await
    }

    pub async fn prime_posts(
        &self,
        posts: impl IntoIterator<Item = Post>,
    ) -> Result<(), InvalidKey> {
        self.post.prime_many(posts, |post| post.id.clone()).await
    }

    /// Prime profiles both by their own ID and by the user they describe.
    pub async fn prime_profiles(
        &self,
        profiles: impl IntoIterator<Item = Profile>,
    ) -> Result<(), InvalidKey> {
        for profile in profiles {
            self.profile_by_user
                .prime(profile.user_id.clone(), profile.clone())
                .await?;
            self.profile.prime(profile.id.clone(), profile).await?;
        }
        Ok(())
    }

    pub async fn prime_member_types(
        &self,
        member_types: impl IntoIterator<Item = MemberType>,
    ) -> Result<(), InvalidKey> {
        self.member_type
            .prime_many(member_types, |member_type| member_type.id)
            .await
    }

    /// A user was created or changed.
    pub async fn wrote_user(&self, user: &User) -> Result<(), InvalidKey> {
        self.user.replace(user.id.clone(), user.clone()).await
    }

    /// A user was deleted, along with everything that refers to it.
    pub async fn deleted_user(&self) {
        self.user.clear_all().await;
        self.post.clear_all().await;
        self.profile.clear_all().await;
        self.profile_by_user.clear_all().await;
        self.posts_by_author.clear_all().await;
        self.profiles_by_member_type.clear_all().await;
        self.subscriptions_by_subscriber.clear_all().await;
        self.subscriptions_by_author.clear_all().await;
    }

    /// A post was created or changed.
    pub async fn wrote_post(&self, post: &Post) -> Result<(), InvalidKey> {
        self.post.replace(post.id.clone(), post.clone()).await?;
        self.posts_by_author.clear(post.author_id.clone()).await
    }

    pub async fn deleted_post(&self, id: &EntityId) -> Result<(), InvalidKey> {
        self.post.clear(id.clone()).await?;
        self.posts_by_author.clear_all().await;
        Ok(())
    }

    /// A profile was created or changed.
    pub async fn wrote_profile(&self, profile: &Profile) -> Result<(), InvalidKey> {
        self.profile
            .replace(profile.id.clone(), profile.clone())
            .await?;
        self.profile_by_user
            .replace(profile.user_id.clone(), profile.clone())
            .await?;
        // The profile may have moved from another member type.
        self.profiles_by_member_type.clear_all().await;
        Ok(())
    }

    pub async fn deleted_profile(&self, id: &EntityId) -> Result<(), InvalidKey> {
        self.profile.clear(id.clone()).await?;
        self.profile_by_user.clear_all().await;
        self.profiles_by_member_type.clear_all().await;
        Ok(())
    }

    /// A subscription from `subscriber` to `author` was added or removed.
    pub async fn wrote_subscription(
        &self,
        subscriber: &EntityId,
        author: &EntityId,
    ) -> Result<(), InvalidKey> {
        self.subscriptions_by_subscriber
            .clear(subscriber.clone())
            .await?;
        self.subscriptions_by_author.clear(author.clone()).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        init_logging,
        loader::LoadError,
        store::{memory::MemoryStore, Store},
    };
    use futures::join;
    use std::sync::Arc;

    async fn seed() -> (Arc<MemoryStore>, User, User) {
        let store = Arc::new(MemoryStore::with_member_types());
        let alice = store
            .create_user(CreateUserInput {
                name: "alice".into(),
                balance: 10.0,
            })
            .await
            .unwrap();
        let bob = store
            .create_user(CreateUserInput {
                name: "bob".into(),
                balance: 20.0,
            })
            .await
            .unwrap();
        (store, alice, bob)
    }

    #[async_std::test]
    async fn test_invalid_key_does_not_affect_siblings() {
        init_logging();

        let (store, alice, _) = seed().await;
        let loaders = Loaders::new(store.clone());
        let (good, bad) = join!(
            loaders.user.load(alice.id.clone()),
            loaders.user.load(EntityId::from_raw("definitely-not-a-uuid"))
        );
        assert_eq!(good, Ok(Some(alice.clone())));
        assert!(matches!(
            bad,
            Err(LoadError::InvalidKey {
                source: InvalidKey { .. }
            })
        ));

        let calls = store.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].keys, [alice.id.to_string()]);
    }

    #[async_std::test]
    async fn test_partial_absence() {
        init_logging();

        let (store, alice, _) = seed().await;
        let loaders = Loaders::new(store.clone());
        let missing = EntityId::random();
        let results = loaders
            .user
            .load_many([alice.id.clone(), missing.clone()])
            .await;
        assert_eq!(results, [Ok(Some(alice)), Ok(None)]);

        // An author with no posts has an empty list, not a missing one.
        assert_eq!(loaders.posts_by_author.load(missing).await, Ok(Some(vec![])));
    }

    #[async_std::test]
    async fn test_keys_are_normalized_before_caching() {
        init_logging();

        let (store, alice, _) = seed().await;
        let loaders = Loaders::new(store.clone());
        let upper = EntityId::from_raw(alice.id.as_str().to_uppercase());
        let (a, b) = join!(loaders.user.load(alice.id.clone()), loaders.user.load(upper));
        assert_eq!(a, b);
        assert_eq!(store.calls().await[0].keys, [alice.id.to_string()]);
    }

    #[async_std::test]
    async fn test_request_isolation() {
        init_logging();

        let (store, alice, _) = seed().await;

        let first = Loaders::new(store.clone());
        assert_eq!(first.user.load(alice.id.clone()).await.unwrap().unwrap().name, "alice");

        store
            .change_user(
                &alice.id,
                ChangeUserInput {
                    name: Some("alicia".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The first request keeps seeing what it already loaded; a new request sees the change.
        assert_eq!(first.user.load(alice.id.clone()).await.unwrap().unwrap().name, "alice");
        let second = Loaders::new(store.clone());
        assert_eq!(second.user.load(alice.id.clone()).await.unwrap().unwrap().name, "alicia");
        assert_eq!(store.calls().await.len(), 2);
    }

    #[async_std::test]
    async fn test_loaders_fail_independently() {
        init_logging();

        let (store, alice, bob) = seed().await;
        store.subscribe(&alice.id, &bob.id).await.unwrap();
        let loaders = Loaders::new(store.clone());
        assert_eq!(
            loaders.subscriptions_by_subscriber.load(alice.id.clone()).await,
            Ok(Some(vec![SubscriptionEdge {
                subscriber_id: alice.id.clone(),
                author_id: bob.id.clone(),
            }]))
        );

        store.fail_with("timeout").await;
        let err = loaders.user.load(bob.id.clone()).await.unwrap_err();
        assert_eq!(
            err,
            LoadError::BatchFetch {
                loader: "users_by_id",
                message: "store unavailable: timeout".into(),
            }
        );
        // Results loaded before the failure are still served from the cache.
        assert!(loaders
            .subscriptions_by_subscriber
            .load(alice.id.clone())
            .await
            .is_ok());
    }

    #[async_std::test]
    async fn test_writes_refresh_cached_relationships() {
        init_logging();

        let (store, alice, bob) = seed().await;
        let loaders = Loaders::new(store.clone());
        assert_eq!(loaders.subscriptions_by_author.load(bob.id.clone()).await, Ok(Some(vec![])));
        assert_eq!(loaders.user.load(alice.id.clone()).await.unwrap().unwrap().name, "alice");

        let edge = store.subscribe(&alice.id, &bob.id).await.unwrap();
        loaders.wrote_subscription(&alice.id, &bob.id).await.unwrap();
        assert_eq!(
            loaders.subscriptions_by_author.load(bob.id.clone()).await,
            Ok(Some(vec![edge]))
        );

        let alicia = store
            .change_user(
                &alice.id,
                ChangeUserInput {
                    name: Some("alicia".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        loaders.wrote_user(&alicia).await.unwrap();
        assert_eq!(loaders.user.load(alice.id.clone()).await, Ok(Some(alicia)));

        // The refreshed user came from the write, not from another fetch.
        let users_by_id = store
            .calls()
            .await
            .into_iter()
            .filter(|call| call.query == "users_by_id")
            .count();
        assert_eq!(users_by_id, 1);
    }
}

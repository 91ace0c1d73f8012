use crate::key::EntityId;
use crate::loaders::Loaders;
use crate::model::*;
use crate::store::StoreError;
use async_graphql::{Context, Object, Result};

/// Writes go straight to the store. After each write the request's loaders are brought up to date:
/// records written replace whatever was cached under their keys, and cached relationships the write
/// may have changed are forgotten. So fields selected after a write, in the same mutation or nested
/// in its result, never see data from before it.
pub struct Mutation;

#[Object]
impl Mutation {
    async fn create_user(&self, ctx: &Context<'_>, dto: CreateUserInput) -> Result<User> {
        let loaders = ctx.data::<Loaders>()?;
        let user = loaders.store().create_user(dto).await?;
        loaders.wrote_user(&user).await?;
        Ok(user)
    }

    async fn change_user(
        &self,
        ctx: &Context<'_>,
        id: EntityId,
        dto: ChangeUserInput,
    ) -> Result<User> {
        let loaders = ctx.data::<Loaders>()?;
        let user = loaders.store().change_user(&id, dto).await?;
        loaders.wrote_user(&user).await?;
        Ok(user)
    }

    async fn delete_user(&self, ctx: &Context<'_>, id: EntityId) -> Result<EntityId> {
        let loaders = ctx.data::<Loaders>()?;
        loaders.store().delete_user(&id).await?;
        loaders.deleted_user().await;
        Ok(id)
    }

    async fn create_post(&self, ctx: &Context<'_>, dto: CreatePostInput) -> Result<Post> {
        let loaders = ctx.data::<Loaders>()?;
        let post = loaders.store().create_post(dto).await?;
        loaders.wrote_post(&post).await?;
        Ok(post)
    }

    async fn change_post(
        &self,
        ctx: &Context<'_>,
        id: EntityId,
        dto: ChangePostInput,
    ) -> Result<Post> {
        let loaders = ctx.data::<Loaders>()?;
        let post = loaders.store().change_post(&id, dto).await?;
        loaders.wrote_post(&post).await?;
        Ok(post)
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: EntityId) -> Result<EntityId> {
        let loaders = ctx.data::<Loaders>()?;
        loaders.store().delete_post(&id).await?;
        loaders.deleted_post(&id).await?;
        Ok(id)
    }

    async fn create_profile(&self, ctx: &Context<'_>, dto: CreateProfileInput) -> Result<Profile> {
        let loaders = ctx.data::<Loaders>()?;
        let profile = loaders.store().create_profile(dto).await?;
        loaders.wrote_profile(&profile).await?;
        Ok(profile)
    }

    async fn change_profile(
        &self,
        ctx: &Context<'_>,
        id: EntityId,
        dto: ChangeProfileInput,
    ) -> Result<Profile> {
        let loaders = ctx.data::<Loaders>()?;
        let profile = loaders.store().change_profile(&id, dto).await?;
        loaders.wrote_profile(&profile).await?;
        Ok(profile)
    }

    async fn delete_profile(&self, ctx: &Context<'_>, id: EntityId) -> Result<EntityId> {
        let loaders = ctx.data::<Loaders>()?;
        loaders.store().delete_profile(&id).await?;
        loaders.deleted_profile(&id).await?;
        Ok(id)
    }

    /// Subscribe the user `user_id` to the posts of `author_id`, returning the subscriber.
    async fn subscribe_to(
        &self,
        ctx: &Context<'_>,
        user_id: EntityId,
        author_id: EntityId,
    ) -> Result<User> {
        let loaders = ctx.data::<Loaders>()?;
        loaders.store().subscribe(&user_id, &author_id).await?;
        loaders.wrote_subscription(&user_id, &author_id).await?;
        match loaders.user.load(user_id.clone()).await? {
            Some(user) => Ok(user),
            None => Err(StoreError::NotFound {
                record: "User",
                id: user_id.to_string(),
            }
            .into()),
        }
    }

    /// Remove a subscription, returning the ID of the former subscriber.
    async fn unsubscribe_from(
        &self,
        ctx: &Context<'_>,
        user_id: EntityId,
        author_id: EntityId,
    ) -> Result<EntityId> {
        let loaders = ctx.data::<Loaders>()?;
        loaders.store().unsubscribe(&user_id, &author_id).await?;
        loaders.wrote_subscription(&user_id, &author_id).await?;
        Ok(user_id)
    }
}

use crate::key::{EntityId, MemberTypeId};
use crate::loaders::Loaders;
use crate::model::*;
use async_graphql::{ComplexObject, Context, Object, Result};

pub struct Query;

#[Object]
impl Query {
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let loaders = ctx.data::<Loaders>()?;
        let users = loaders.store().users().await?;
        loaders.prime_users(users.clone()).await?;
        Ok(users)
    }

    async fn user(&self, ctx: &Context<'_>, id: EntityId) -> Result<Option<User>> {
        Ok(ctx.data::<Loaders>()?.user.load(id).await?)
    }

    async fn posts(&self, ctx: &Context<'_>) -> Result<Vec<Post>> {
        let loaders = ctx.data::<Loaders>()?;
        let posts = loaders.store().posts().await?;
        loaders.prime_posts(posts.clone()).await?;
        Ok(posts)
    }

    async fn post(&self, ctx: &Context<'_>, id: EntityId) -> Result<Option<Post>> {
        Ok(ctx.data::<Loaders>()?.post.load(id).await?)
    }

    async fn profiles(&self, ctx: &Context<'_>) -> Result<Vec<Profile>> {
        let loaders = ctx.data::<Loaders>()?;
        let profiles = loaders.store().profiles().await?;
        loaders.prime_profiles(profiles.clone()).await?;
        Ok(profiles)
    }

    async fn profile(&self, ctx: &Context<'_>, id: EntityId) -> Result<Option<Profile>> {
        Ok(ctx.data::<Loaders>()?.profile.load(id).await?)
    }

    async fn member_types(&self, ctx: &Context<'_>) -> Result<Vec<MemberType>> {
        let loaders = ctx.data::<Loaders>()?;
        let member_types = loaders.store().member_types().await?;
        loaders.prime_member_types(member_types.clone()).await?;
        Ok(member_types)
    }

    async fn member_type(&self, ctx: &Context<'_>, id: MemberTypeId) -> Result<Option<MemberType>> {
        Ok(ctx.data::<Loaders>()?.member_type.load(id).await?)
    }
}

/// Resolve users by ID, skipping any which no longer exist.
async fn users_by_id(
    loaders: &Loaders,
    ids: impl IntoIterator<Item = EntityId>,
) -> Result<Vec<User>> {
    Ok(loaders
        .user
        .load_many(ids)
        .await
        .into_iter()
        .filter_map(std::result::Result::transpose)
        .collect::<Result<_, _>>()?)
}

#[ComplexObject]
impl User {
    async fn profile(&self, ctx: &Context<'_>) -> Result<Option<Profile>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders.profile_by_user.load(self.id.clone()).await?)
    }

    async fn posts(&self, ctx: &Context<'_>) -> Result<Vec<Post>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders
            .posts_by_author
            .load(self.id.clone())
            .await?
            .unwrap_or_default())
    }

    /// The users this user is subscribed to.
    async fn user_subscribed_to(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let loaders = ctx.data::<Loaders>()?;
        let edges = loaders
            .subscriptions_by_subscriber
            .load(self.id.clone())
            .await?
            .unwrap_or_default();
        users_by_id(loaders, edges.into_iter().map(|edge| edge.author_id)).await
    }

    /// The users subscribed to this user.
    async fn subscribed_to_user(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let loaders = ctx.data::<Loaders>()?;
        let edges = loaders
            .subscriptions_by_author
            .load(self.id.clone())
            .await?
            .unwrap_or_default();
        users_by_id(loaders, edges.into_iter().map(|edge| edge.subscriber_id)).await
    }
}

#[ComplexObject]
impl Profile {
    async fn member_type(&self, ctx: &Context<'_>) -> Result<Option<MemberType>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders.member_type.load(self.member_type_id).await?)
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders.user.load(self.user_id.clone()).await?)
    }
}

#[ComplexObject]
impl Post {
    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders.user.load(self.author_id.clone()).await?)
    }
}

#[ComplexObject]
impl MemberType {
    async fn profiles(&self, ctx: &Context<'_>) -> Result<Vec<Profile>> {
        let loaders = ctx.data::<Loaders>()?;
        Ok(loaders
            .profiles_by_member_type
            .load(self.id)
            .await?
            .unwrap_or_default())
    }
}

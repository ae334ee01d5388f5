//! Typed facade over the dispatcher
//!
//! Callers get Rust types in and out; the facade serializes arguments into
//! the operation's JSON shape and decodes the result. `call` stays
//! available for untyped callers such as the gateway.

use std::sync::Arc;

use dispatch::{Availability, Dispatcher};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use session::Session;
use transport::{FailurePolicy, RefreshCoordinator, Transport};

use crate::backend::Op;
use crate::catalog;
use crate::error::{Error, Result};
use crate::local::LocalApi;
use crate::models::*;
use crate::remote::RemoteApi;

#[derive(Clone)]
pub struct SocialClient {
    dispatcher: Arc<Dispatcher>,
    refresh: Arc<RefreshCoordinator>,
}

impl SocialClient {
    pub fn new(dispatcher: Arc<Dispatcher>, refresh: Arc<RefreshCoordinator>) -> Self {
        Self {
            dispatcher,
            refresh,
        }
    }

    /// Wire the remote service behind `transport` to a freshly seeded local
    /// fallback.
    pub fn build(
        transport: Arc<Transport>,
        availability: Arc<Availability>,
        force_fallback: bool,
        policy: FailurePolicy,
    ) -> Result<Self> {
        let refresh = transport.refresh_coordinator().clone();
        let store = transport.credential_store().clone();
        let dispatcher = catalog::dispatcher(
            Arc::new(RemoteApi::new(transport)),
            Arc::new(LocalApi::seeded()),
            store,
            availability,
            force_fallback,
            policy,
        )?;
        Ok(Self::new(Arc::new(dispatcher), refresh))
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn refresh_coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.refresh
    }

    pub async fn session(&self) -> Session {
        self.refresh.credential_store().get().await
    }

    /// Untyped entry point: operation name plus JSON arguments.
    pub async fn call(&self, name: &str, args: Value) -> Result<Value> {
        Ok(self.dispatcher.call(name, args).await?)
    }

    async fn run<A: Serialize, T: DeserializeOwned>(&self, op: Op, args: A) -> Result<T> {
        let args = serde_json::to_value(args).map_err(|e| Error::Decode(e.to_string()))?;
        let value = self.dispatcher.call(op.name(), args).await?;
        serde_json::from_value(value).map_err(|e| Error::Decode(e.to_string()))
    }

    /// Clear the session and notify hard-logout subscribers.
    pub async fn logout(&self) {
        self.refresh.hard_logout("user logged out").await;
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        self.run(
            Op::Login,
            LoginRequest {
                username: username.into(),
                password: password.into(),
            },
        )
        .await
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        self.run(Op::Register, req).await
    }

    pub async fn ping(&self) -> Result<Ping> {
        self.run(Op::Ping, Value::Null).await
    }

    pub async fn status(&self) -> Result<Ping> {
        self.run(Op::Status, Value::Null).await
    }

    pub async fn profile(&self, user_id: &str) -> Result<User> {
        self.run(Op::GetProfile, json!({"userId": user_id})).await
    }

    pub async fn profile_by_username(&self, username: &str) -> Result<User> {
        self.run(Op::GetProfileByUsername, json!({"username": username}))
            .await
    }

    pub async fn update_profile(&self, user_id: &str, changes: ProfileChanges) -> Result<User> {
        self.run(
            Op::UpdateProfile,
            ProfileUpdate {
                user_id: user_id.into(),
                changes,
            },
        )
        .await
    }

    pub async fn search_users(&self, query: &str, by: UserSearch) -> Result<Vec<User>> {
        self.run(
            Op::SearchUsers,
            SearchRequest {
                query: query.to_string(),
                by,
            },
        )
        .await
    }

    pub async fn follow(&self, user_id: &str, target_id: &str) -> Result<Message> {
        self.run(
            Op::FollowUser,
            json!({"userId": user_id, "targetId": target_id}),
        )
        .await
    }

    pub async fn unfollow(&self, user_id: &str, target_id: &str) -> Result<Message> {
        self.run(
            Op::UnfollowUser,
            json!({"userId": user_id, "targetId": target_id}),
        )
        .await
    }

    pub async fn list_posts(&self) -> Result<Vec<Post>> {
        self.run(Op::ListPosts, Value::Null).await
    }

    pub async fn post(&self, post_id: &str) -> Result<Post> {
        self.run(Op::GetPost, json!({"postId": post_id})).await
    }

    pub async fn user_posts(&self, user_id: &str) -> Result<Vec<Post>> {
        self.run(Op::ListUserPosts, json!({"userId": user_id})).await
    }

    pub async fn community_posts(&self, community_id: &str) -> Result<Vec<Post>> {
        self.run(Op::ListCommunityPosts, json!({"communityId": community_id}))
            .await
    }

    pub async fn feed(&self, page: u64, size: u64) -> Result<FeedPage> {
        self.run(Op::GetFeed, PageRequest { page, size }).await
    }

    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        self.run(Op::CreatePost, post).await
    }

    pub async fn update_post(&self, post_id: &str, changes: PostChanges) -> Result<Post> {
        self.run(
            Op::UpdatePost,
            PostUpdate {
                post_id: post_id.into(),
                changes,
            },
        )
        .await
    }

    pub async fn delete_post(&self, post_id: &str) -> Result<Message> {
        self.run(Op::DeletePost, json!({"postId": post_id})).await
    }

    pub async fn search_posts(&self, query: &str, by: PostSearch) -> Result<Vec<Post>> {
        self.run(
            Op::SearchPosts,
            SearchRequest {
                query: query.to_string(),
                by,
            },
        )
        .await
    }

    pub async fn comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.run(Op::ListComments, json!({"postId": post_id})).await
    }

    pub async fn create_comment(&self, post_id: &str, content: &str) -> Result<Comment> {
        self.run(
            Op::CreateComment,
            NewComment {
                post_id: post_id.into(),
                content: content.into(),
            },
        )
        .await
    }

    pub async fn delete_comment(&self, comment_id: &str) -> Result<Message> {
        self.run(Op::DeleteComment, json!({"commentId": comment_id}))
            .await
    }

    pub async fn update_comment(&self, comment_id: &str, content: &str) -> Result<Comment> {
        self.run(
            Op::UpdateComment,
            CommentUpdate {
                comment_id: comment_id.into(),
                content: content.into(),
            },
        )
        .await
    }

    pub async fn likes(&self, post_id: &str) -> Result<Vec<Like>> {
        self.run(Op::ListLikes, json!({"postId": post_id})).await
    }

    pub async fn toggle_like(&self, post_id: &str) -> Result<LikeState> {
        self.run(Op::ToggleLike, json!({"postId": post_id})).await
    }

    pub async fn is_liked(&self, post_id: &str) -> Result<bool> {
        let state: LikeState = self.run(Op::CheckLike, json!({"postId": post_id})).await?;
        Ok(state.liked)
    }

    pub async fn communities(&self) -> Result<Vec<Community>> {
        self.run(Op::ListCommunities, Value::Null).await
    }

    pub async fn community(&self, community_id: &str) -> Result<Community> {
        self.run(Op::GetCommunity, json!({"communityId": community_id}))
            .await
    }

    pub async fn create_community(&self, community: NewCommunity) -> Result<Community> {
        self.run(Op::CreateCommunity, community).await
    }

    pub async fn update_community(
        &self,
        community_id: &str,
        changes: CommunityChanges,
    ) -> Result<Community> {
        self.run(
            Op::UpdateCommunity,
            CommunityUpdate {
                community_id: community_id.into(),
                changes,
            },
        )
        .await
    }

    pub async fn delete_community(&self, community_id: &str) -> Result<Message> {
        self.run(Op::DeleteCommunity, json!({"communityId": community_id}))
            .await
    }

    pub async fn join_community(&self, community_id: &str) -> Result<Message> {
        self.run(Op::JoinCommunity, json!({"communityId": community_id}))
            .await
    }

    pub async fn leave_community(&self, community_id: &str) -> Result<Message> {
        self.run(Op::LeaveCommunity, json!({"communityId": community_id}))
            .await
    }

    pub async fn my_communities(&self) -> Result<Vec<Community>> {
        self.run(Op::ListUserCommunities, Value::Null).await
    }

    pub async fn search_communities(
        &self,
        query: &str,
        by: CommunitySearch,
    ) -> Result<Vec<Community>> {
        self.run(
            Op::SearchCommunities,
            SearchRequest {
                query: query.to_string(),
                by,
            },
        )
        .await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        self.run(Op::ListNotifications, Value::Null).await
    }

    pub async fn unread_notifications(&self) -> Result<Vec<Notification>> {
        self.run(Op::ListUnreadNotifications, Value::Null).await
    }

    pub async fn unread_count(&self) -> Result<u64> {
        let count: UnreadCount = self.run(Op::UnreadCount, Value::Null).await?;
        Ok(count.count)
    }

    pub async fn mark_notification_read(&self, notification_id: &str) -> Result<Message> {
        self.run(
            Op::MarkNotificationRead,
            json!({"notificationId": notification_id}),
        )
        .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<Message> {
        self.run(Op::MarkAllNotificationsRead, Value::Null).await
    }

    pub async fn delete_notification(&self, notification_id: &str) -> Result<Message> {
        self.run(
            Op::DeleteNotification,
            json!({"notificationId": notification_id}),
        )
        .await
    }
}

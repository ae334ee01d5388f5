//! Primary implementation: the remote REST service
//!
//! Each operation is one request through the authenticated `Transport`.
//! Login, register, ping and status are sent without credentials.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use transport::{ApiRequest, Error, Result, Transport};

use crate::backend::SocialBackend;
use crate::models::*;

pub struct RemoteApi {
    transport: Arc<Transport>,
}

impl RemoteApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.transport.call_json(&request).await
    }
}

/// Reject ids that would change the request path.
fn segment(id: &str) -> Result<&str> {
    if id.is_empty() || id.contains(['/', '?', '#', '%']) {
        return Err(Error::InvalidRequest(format!("invalid id: {id:?}")));
    }
    Ok(id)
}

fn body<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidRequest(e.to_string()))
}

impl SocialBackend for RemoteApi {
    async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        self.fetch(ApiRequest::post("/auth/login").json(body(&req)?).anonymous())
            .await
    }

    async fn register(&self, req: RegisterRequest) -> Result<User> {
        self.fetch(
            ApiRequest::post("/auth/register")
                .json(body(&req)?)
                .anonymous(),
        )
        .await
    }

    async fn ping(&self) -> Result<Ping> {
        self.fetch(ApiRequest::get("/ping").anonymous()).await
    }

    async fn status(&self) -> Result<Ping> {
        self.fetch(ApiRequest::get("/api-status").anonymous()).await
    }

    async fn get_profile(&self, req: UserRef) -> Result<User> {
        self.fetch(ApiRequest::get(format!("/users/{}", segment(&req.user_id)?)))
            .await
    }

    async fn get_profile_by_username(&self, req: UsernameRef) -> Result<User> {
        self.fetch(ApiRequest::get(format!(
            "/users/profile/{}",
            segment(&req.username)?
        )))
        .await
    }

    async fn update_profile(&self, req: ProfileUpdate) -> Result<User> {
        self.fetch(
            ApiRequest::put(format!("/users/{}", segment(&req.user_id)?))
                .json(body(&req.changes)?),
        )
        .await
    }

    async fn search_users(&self, req: SearchRequest<UserSearch>) -> Result<Vec<User>> {
        self.fetch(ApiRequest::get("/users/search").query(req.by.param(), &req.query))
            .await
    }

    async fn follow_user(&self, req: FollowRequest) -> Result<Message> {
        self.fetch(ApiRequest::post(format!(
            "/users/{}/follow/{}",
            segment(&req.user_id)?,
            segment(&req.target_id)?
        )))
        .await
    }

    async fn unfollow_user(&self, req: FollowRequest) -> Result<Message> {
        self.fetch(ApiRequest::post(format!(
            "/users/{}/unfollow/{}",
            segment(&req.user_id)?,
            segment(&req.target_id)?
        )))
        .await
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        self.fetch(ApiRequest::get("/posts")).await
    }

    async fn get_post(&self, req: PostRef) -> Result<Post> {
        self.fetch(ApiRequest::get(format!("/posts/{}", segment(&req.post_id)?)))
            .await
    }

    async fn list_user_posts(&self, req: UserRef) -> Result<Vec<Post>> {
        self.fetch(ApiRequest::get(format!(
            "/posts/user/{}",
            segment(&req.user_id)?
        )))
        .await
    }

    async fn list_community_posts(&self, req: CommunityRef) -> Result<Vec<Post>> {
        self.fetch(ApiRequest::get(format!(
            "/posts/community/{}",
            segment(&req.community_id)?
        )))
        .await
    }

    async fn get_feed(&self, req: PageRequest) -> Result<FeedPage> {
        self.fetch(
            ApiRequest::get("/posts/feed")
                .query("page", req.page)
                .query("size", req.size),
        )
        .await
    }

    async fn create_post(&self, req: NewPost) -> Result<Post> {
        self.fetch(ApiRequest::post("/posts").json(body(&req)?)).await
    }

    async fn update_post(&self, req: PostUpdate) -> Result<Post> {
        self.fetch(
            ApiRequest::put(format!("/posts/{}", segment(&req.post_id)?))
                .json(body(&req.changes)?),
        )
        .await
    }

    async fn delete_post(&self, req: PostRef) -> Result<Message> {
        self.fetch(ApiRequest::delete(format!(
            "/posts/{}",
            segment(&req.post_id)?
        )))
        .await
    }

    async fn search_posts(&self, req: SearchRequest<PostSearch>) -> Result<Vec<Post>> {
        self.fetch(ApiRequest::get("/posts/search").query(req.by.param(), &req.query))
            .await
    }

    async fn list_comments(&self, req: PostRef) -> Result<Vec<Comment>> {
        self.fetch(ApiRequest::get(format!(
            "/comments/post/{}",
            segment(&req.post_id)?
        )))
        .await
    }

    async fn create_comment(&self, req: NewComment) -> Result<Comment> {
        self.fetch(ApiRequest::post("/comments").json(body(&req)?))
            .await
    }

    async fn update_comment(&self, req: CommentUpdate) -> Result<Comment> {
        self.fetch(
            ApiRequest::put(format!("/comments/{}", segment(&req.comment_id)?))
                .json(serde_json::json!({ "content": req.content })),
        )
        .await
    }

    async fn delete_comment(&self, req: CommentRef) -> Result<Message> {
        self.fetch(ApiRequest::delete(format!(
            "/comments/{}",
            segment(&req.comment_id)?
        )))
        .await
    }

    async fn list_likes(&self, req: PostRef) -> Result<Vec<Like>> {
        self.fetch(ApiRequest::get(format!(
            "/likes/post/{}",
            segment(&req.post_id)?
        )))
        .await
    }

    async fn toggle_like(&self, req: PostRef) -> Result<LikeState> {
        self.fetch(ApiRequest::post("/likes").json(body(&req)?)).await
    }

    async fn check_like(&self, req: PostRef) -> Result<LikeState> {
        self.fetch(ApiRequest::get("/likes/check").query("postId", &req.post_id))
            .await
    }

    async fn list_communities(&self) -> Result<Vec<Community>> {
        self.fetch(ApiRequest::get("/communities")).await
    }

    async fn get_community(&self, req: CommunityRef) -> Result<Community> {
        self.fetch(ApiRequest::get(format!(
            "/communities/{}",
            segment(&req.community_id)?
        )))
        .await
    }

    async fn create_community(&self, req: NewCommunity) -> Result<Community> {
        self.fetch(ApiRequest::post("/communities").json(body(&req)?))
            .await
    }

    async fn update_community(&self, req: CommunityUpdate) -> Result<Community> {
        self.fetch(
            ApiRequest::put(format!("/communities/{}", segment(&req.community_id)?))
                .json(body(&req.changes)?),
        )
        .await
    }

    async fn delete_community(&self, req: CommunityRef) -> Result<Message> {
        self.fetch(ApiRequest::delete(format!(
            "/communities/{}",
            segment(&req.community_id)?
        )))
        .await
    }

    async fn join_community(&self, req: CommunityRef) -> Result<Message> {
        self.fetch(ApiRequest::post(format!(
            "/communities/{}/join",
            segment(&req.community_id)?
        )))
        .await
    }

    async fn leave_community(&self, req: CommunityRef) -> Result<Message> {
        self.fetch(ApiRequest::post(format!(
            "/communities/{}/leave",
            segment(&req.community_id)?
        )))
        .await
    }

    async fn list_user_communities(&self) -> Result<Vec<Community>> {
        self.fetch(ApiRequest::get("/communities/user")).await
    }

    async fn search_communities(
        &self,
        req: SearchRequest<CommunitySearch>,
    ) -> Result<Vec<Community>> {
        self.fetch(ApiRequest::get("/communities/search").query(req.by.param(), &req.query))
            .await
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>> {
        self.fetch(ApiRequest::get("/notifications")).await
    }

    async fn list_unread_notifications(&self) -> Result<Vec<Notification>> {
        self.fetch(ApiRequest::get("/notifications/unread")).await
    }

    async fn unread_count(&self) -> Result<UnreadCount> {
        self.fetch(ApiRequest::get("/notifications/count")).await
    }

    async fn mark_notification_read(&self, req: NotificationRef) -> Result<Message> {
        self.fetch(ApiRequest::post(format!(
            "/notifications/{}/read",
            segment(&req.notification_id)?
        )))
        .await
    }

    async fn mark_all_notifications_read(&self) -> Result<Message> {
        self.fetch(ApiRequest::post("/notifications/read-all")).await
    }

    async fn delete_notification(&self, req: NotificationRef) -> Result<Message> {
        self.fetch(ApiRequest::delete(format!(
            "/notifications/{}",
            segment(&req.notification_id)?
        )))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segments_are_checked() {
        assert_eq!(segment("42").unwrap(), "42");
        assert!(segment("").is_err());
        assert!(segment("1/../admin").is_err());
        assert!(segment("1?x=y").is_err());
    }
}

//! The operation set and the contract both implementations satisfy
//!
//! `SocialBackend` is implemented by `RemoteApi` (primary) and `LocalApi`
//! (fallback). Because both go through the same typed signatures and the
//! same `handle` adapter, a caller cannot tell from a result which one
//! produced it.

use std::future::Future;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use transport::{Error, Result};

use crate::models::*;

/// Every named operation exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Login,
    Register,
    Ping,
    Status,
    GetProfile,
    GetProfileByUsername,
    UpdateProfile,
    SearchUsers,
    FollowUser,
    UnfollowUser,
    ListPosts,
    GetPost,
    ListUserPosts,
    ListCommunityPosts,
    GetFeed,
    CreatePost,
    UpdatePost,
    DeletePost,
    SearchPosts,
    ListComments,
    CreateComment,
    UpdateComment,
    DeleteComment,
    ListLikes,
    ToggleLike,
    CheckLike,
    ListCommunities,
    GetCommunity,
    CreateCommunity,
    UpdateCommunity,
    DeleteCommunity,
    JoinCommunity,
    LeaveCommunity,
    ListUserCommunities,
    SearchCommunities,
    ListNotifications,
    ListUnreadNotifications,
    UnreadCount,
    MarkNotificationRead,
    MarkAllNotificationsRead,
    DeleteNotification,
}

impl Op {
    pub const ALL: [Op; 41] = [
        Op::Login,
        Op::Register,
        Op::Ping,
        Op::Status,
        Op::GetProfile,
        Op::GetProfileByUsername,
        Op::UpdateProfile,
        Op::SearchUsers,
        Op::FollowUser,
        Op::UnfollowUser,
        Op::ListPosts,
        Op::GetPost,
        Op::ListUserPosts,
        Op::ListCommunityPosts,
        Op::GetFeed,
        Op::CreatePost,
        Op::UpdatePost,
        Op::DeletePost,
        Op::SearchPosts,
        Op::ListComments,
        Op::CreateComment,
        Op::UpdateComment,
        Op::DeleteComment,
        Op::ListLikes,
        Op::ToggleLike,
        Op::CheckLike,
        Op::ListCommunities,
        Op::GetCommunity,
        Op::CreateCommunity,
        Op::UpdateCommunity,
        Op::DeleteCommunity,
        Op::JoinCommunity,
        Op::LeaveCommunity,
        Op::ListUserCommunities,
        Op::SearchCommunities,
        Op::ListNotifications,
        Op::ListUnreadNotifications,
        Op::UnreadCount,
        Op::MarkNotificationRead,
        Op::MarkAllNotificationsRead,
        Op::DeleteNotification,
    ];

    /// Name under which the operation is bound in the dispatcher.
    pub fn name(self) -> &'static str {
        match self {
            Op::Login => "login",
            Op::Register => "register",
            Op::Ping => "ping",
            Op::GetProfile => "getProfile",
            Op::SearchUsers => "searchUsers",
            Op::FollowUser => "followUser",
            Op::UnfollowUser => "unfollowUser",
            Op::ListPosts => "listPosts",
            Op::GetPost => "getPost",
            Op::ListUserPosts => "listUserPosts",
            Op::GetFeed => "getFeed",
            Op::CreatePost => "createPost",
            Op::DeletePost => "deletePost",
            Op::SearchPosts => "searchPosts",
            Op::ListComments => "listComments",
            Op::CreateComment => "createComment",
            Op::DeleteComment => "deleteComment",
            Op::ListLikes => "listLikes",
            Op::ToggleLike => "toggleLike",
            Op::ListCommunities => "listCommunities",
            Op::GetCommunity => "getCommunity",
            Op::JoinCommunity => "joinCommunity",
            Op::LeaveCommunity => "leaveCommunity",
            Op::ListNotifications => "listNotifications",
            Op::UnreadCount => "unreadCount",
            Op::MarkNotificationRead => "markNotificationRead",
            Op::MarkAllNotificationsRead => "markAllNotificationsRead",
            Op::Status => "status",
            Op::GetProfileByUsername => "getProfileByUsername",
            Op::UpdateProfile => "updateProfile",
            Op::ListCommunityPosts => "listCommunityPosts",
            Op::UpdatePost => "updatePost",
            Op::UpdateComment => "updateComment",
            Op::CheckLike => "checkLike",
            Op::CreateCommunity => "createCommunity",
            Op::UpdateCommunity => "updateCommunity",
            Op::DeleteCommunity => "deleteCommunity",
            Op::ListUserCommunities => "listUserCommunities",
            Op::SearchCommunities => "searchCommunities",
            Op::ListUnreadNotifications => "listUnreadNotifications",
            Op::DeleteNotification => "deleteNotification",
        }
    }

    pub fn from_name(name: &str) -> Option<Op> {
        Op::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// Typed operation set. Futures are `Send` so implementations can be bound
/// into the dispatcher and driven from any runtime thread.
pub trait SocialBackend: Send + Sync + 'static {
    fn login(&self, req: LoginRequest) -> impl Future<Output = Result<AuthResponse>> + Send;
    fn register(&self, req: RegisterRequest) -> impl Future<Output = Result<User>> + Send;
    fn ping(&self) -> impl Future<Output = Result<Ping>> + Send;
    /// Service status banner; same shape as `ping`.
    fn status(&self) -> impl Future<Output = Result<Ping>> + Send;

    fn get_profile(&self, req: UserRef) -> impl Future<Output = Result<User>> + Send;
    fn get_profile_by_username(
        &self,
        req: UsernameRef,
    ) -> impl Future<Output = Result<User>> + Send;
    fn update_profile(&self, req: ProfileUpdate) -> impl Future<Output = Result<User>> + Send;
    fn search_users(
        &self,
        req: SearchRequest<UserSearch>,
    ) -> impl Future<Output = Result<Vec<User>>> + Send;
    fn follow_user(&self, req: FollowRequest) -> impl Future<Output = Result<Message>> + Send;
    fn unfollow_user(&self, req: FollowRequest) -> impl Future<Output = Result<Message>> + Send;

    fn list_posts(&self) -> impl Future<Output = Result<Vec<Post>>> + Send;
    fn get_post(&self, req: PostRef) -> impl Future<Output = Result<Post>> + Send;
    fn list_user_posts(&self, req: UserRef) -> impl Future<Output = Result<Vec<Post>>> + Send;
    fn list_community_posts(
        &self,
        req: CommunityRef,
    ) -> impl Future<Output = Result<Vec<Post>>> + Send;
    fn get_feed(&self, req: PageRequest) -> impl Future<Output = Result<FeedPage>> + Send;
    fn create_post(&self, req: NewPost) -> impl Future<Output = Result<Post>> + Send;
    fn update_post(&self, req: PostUpdate) -> impl Future<Output = Result<Post>> + Send;
    fn delete_post(&self, req: PostRef) -> impl Future<Output = Result<Message>> + Send;
    fn search_posts(
        &self,
        req: SearchRequest<PostSearch>,
    ) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn list_comments(&self, req: PostRef) -> impl Future<Output = Result<Vec<Comment>>> + Send;
    fn create_comment(&self, req: NewComment) -> impl Future<Output = Result<Comment>> + Send;
    fn update_comment(&self, req: CommentUpdate)
    -> impl Future<Output = Result<Comment>> + Send;
    fn delete_comment(&self, req: CommentRef) -> impl Future<Output = Result<Message>> + Send;

    fn list_likes(&self, req: PostRef) -> impl Future<Output = Result<Vec<Like>>> + Send;
    fn toggle_like(&self, req: PostRef) -> impl Future<Output = Result<LikeState>> + Send;
    /// Whether the current user likes the post, without changing it.
    fn check_like(&self, req: PostRef) -> impl Future<Output = Result<LikeState>> + Send;

    fn list_communities(&self) -> impl Future<Output = Result<Vec<Community>>> + Send;
    fn get_community(&self, req: CommunityRef) -> impl Future<Output = Result<Community>> + Send;
    fn create_community(
        &self,
        req: NewCommunity,
    ) -> impl Future<Output = Result<Community>> + Send;
    fn update_community(
        &self,
        req: CommunityUpdate,
    ) -> impl Future<Output = Result<Community>> + Send;
    fn delete_community(
        &self,
        req: CommunityRef,
    ) -> impl Future<Output = Result<Message>> + Send;
    fn join_community(&self, req: CommunityRef) -> impl Future<Output = Result<Message>> + Send;
    fn leave_community(&self, req: CommunityRef)
    -> impl Future<Output = Result<Message>> + Send;
    /// Communities the current user is a member of.
    fn list_user_communities(&self) -> impl Future<Output = Result<Vec<Community>>> + Send;
    fn search_communities(
        &self,
        req: SearchRequest<CommunitySearch>,
    ) -> impl Future<Output = Result<Vec<Community>>> + Send;

    fn list_notifications(&self) -> impl Future<Output = Result<Vec<Notification>>> + Send;
    fn list_unread_notifications(
        &self,
    ) -> impl Future<Output = Result<Vec<Notification>>> + Send;
    fn unread_count(&self) -> impl Future<Output = Result<UnreadCount>> + Send;
    fn mark_notification_read(
        &self,
        req: NotificationRef,
    ) -> impl Future<Output = Result<Message>> + Send;
    fn mark_all_notifications_read(&self) -> impl Future<Output = Result<Message>> + Send;
    fn delete_notification(
        &self,
        req: NotificationRef,
    ) -> impl Future<Output = Result<Message>> + Send;
}

/// Run `op` on `backend` with untyped JSON arguments.
///
/// Arguments that do not match the operation's shape are rejected as
/// `InvalidRequest` before the backend is touched. `null` is accepted as
/// "no arguments".
pub async fn handle<B: SocialBackend>(backend: &B, op: Op, args: Value) -> Result<Value> {
    match op {
        Op::Login => reply(backend.login(parse(args)?).await),
        Op::Register => reply(backend.register(parse(args)?).await),
        Op::Ping => reply(backend.ping().await),
        Op::GetProfile => reply(backend.get_profile(parse(args)?).await),
        Op::SearchUsers => reply(backend.search_users(parse(args)?).await),
        Op::FollowUser => reply(backend.follow_user(parse(args)?).await),
        Op::UnfollowUser => reply(backend.unfollow_user(parse(args)?).await),
        Op::ListPosts => reply(backend.list_posts().await),
        Op::GetPost => reply(backend.get_post(parse(args)?).await),
        Op::ListUserPosts => reply(backend.list_user_posts(parse(args)?).await),
        Op::GetFeed => reply(backend.get_feed(parse(args)?).await),
        Op::CreatePost => reply(backend.create_post(parse(args)?).await),
        Op::DeletePost => reply(backend.delete_post(parse(args)?).await),
        Op::SearchPosts => reply(backend.search_posts(parse(args)?).await),
        Op::ListComments => reply(backend.list_comments(parse(args)?).await),
        Op::CreateComment => reply(backend.create_comment(parse(args)?).await),
        Op::DeleteComment => reply(backend.delete_comment(parse(args)?).await),
        Op::ListLikes => reply(backend.list_likes(parse(args)?).await),
        Op::ToggleLike => reply(backend.toggle_like(parse(args)?).await),
        Op::ListCommunities => reply(backend.list_communities().await),
        Op::GetCommunity => reply(backend.get_community(parse(args)?).await),
        Op::JoinCommunity => reply(backend.join_community(parse(args)?).await),
        Op::LeaveCommunity => reply(backend.leave_community(parse(args)?).await),
        Op::ListNotifications => reply(backend.list_notifications().await),
        Op::UnreadCount => reply(backend.unread_count().await),
        Op::MarkNotificationRead => reply(backend.mark_notification_read(parse(args)?).await),
        Op::MarkAllNotificationsRead => reply(backend.mark_all_notifications_read().await),
        Op::Status => reply(backend.status().await),
        Op::GetProfileByUsername => reply(backend.get_profile_by_username(parse(args)?).await),
        Op::UpdateProfile => reply(backend.update_profile(parse(args)?).await),
        Op::ListCommunityPosts => reply(backend.list_community_posts(parse(args)?).await),
        Op::UpdatePost => reply(backend.update_post(parse(args)?).await),
        Op::UpdateComment => reply(backend.update_comment(parse(args)?).await),
        Op::CheckLike => reply(backend.check_like(parse(args)?).await),
        Op::CreateCommunity => reply(backend.create_community(parse(args)?).await),
        Op::UpdateCommunity => reply(backend.update_community(parse(args)?).await),
        Op::DeleteCommunity => reply(backend.delete_community(parse(args)?).await),
        Op::ListUserCommunities => reply(backend.list_user_communities().await),
        Op::SearchCommunities => reply(backend.search_communities(parse(args)?).await),
        Op::ListUnreadNotifications => reply(backend.list_unread_notifications().await),
        Op::DeleteNotification => reply(backend.delete_notification(parse(args)?).await),
    }
}

fn parse<T: DeserializeOwned>(args: Value) -> Result<T> {
    let args = if args.is_null() {
        Value::Object(serde_json::Map::new())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| Error::InvalidRequest(e.to_string()))
}

fn reply<T: Serialize>(result: Result<T>) -> Result<Value> {
    serde_json::to_value(result?).map_err(|e| Error::Decode(e.to_string()))
}

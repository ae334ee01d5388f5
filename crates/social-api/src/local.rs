//! Fallback implementation: an in-memory copy of the service
//!
//! Serves every operation from a small seeded dataset so the client keeps
//! working while the remote service is unreachable or switched off. Writes
//! live only as long as the process. Mutations act on behalf of the user
//! who last logged in locally (the first seeded user until then).

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;
use transport::{Error, Result};

use crate::backend::SocialBackend;
use crate::models::*;

const DEFAULT_AVATAR: &str = "https://via.placeholder.com/150";

pub struct LocalApi {
    data: Mutex<Dataset>,
}

struct Dataset {
    users: Vec<User>,
    /// user id → password
    passwords: HashMap<String, String>,
    /// Stored without embedded likes/comments; see `hydrate`.
    posts: Vec<Post>,
    comments: Vec<Comment>,
    likes: Vec<Like>,
    communities: Vec<Community>,
    notifications: Vec<Notification>,
    acting_user: String,
    next_id: u64,
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl LocalApi {
    /// Two users, three posts, one comment, two likes, one community and
    /// one unread notification.
    pub fn seeded() -> Self {
        Self {
            data: Mutex::new(Dataset::seed()),
        }
    }

    /// Id of the user local mutations are attributed to.
    pub async fn acting_user(&self) -> String {
        self.data.lock().await.acting_user.clone()
    }
}

impl Default for LocalApi {
    fn default() -> Self {
        Self::seeded()
    }
}

impl Dataset {
    fn seed() -> Self {
        let ts = now();
        let user = |id: &str, bio: &str, following: &str, interests: [&str; 2]| User {
            id: id.into(),
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            full_name: format!("User {}", if id == "1" { "One" } else { "Two" }),
            bio: bio.into(),
            profile_picture: DEFAULT_AVATAR.into(),
            followers: vec![following.into()],
            following: vec![following.into()],
            interests: interests.iter().map(|s| s.to_string()).collect(),
            created_at: ts.clone(),
            updated_at: ts.clone(),
        };
        let post = |id: &str, user_id: &str, caption: &str, tags: [&str; 2]| Post {
            id: id.into(),
            user_id: user_id.into(),
            username: format!("user{user_id}"),
            caption: caption.into(),
            image_url: String::new(),
            tags: tags.iter().map(|s| s.to_string()).collect(),
            likes: Vec::new(),
            comments: Vec::new(),
            community_id: None,
            created_at: ts.clone(),
            updated_at: ts.clone(),
            likes_count: 0,
            comments_count: 0,
            location: None,
        };
        let like = |id: &str, user_id: &str| Like {
            id: id.into(),
            post_id: "1".into(),
            user_id: user_id.into(),
            username: format!("user{user_id}"),
            created_at: ts.clone(),
        };

        Self {
            users: vec![
                user("1", "Photographer and hiker", "2", ["photography", "nature"]),
                user("2", "Always on the road", "1", ["travel", "food"]),
            ],
            passwords: HashMap::from([
                ("1".to_string(), "password".to_string()),
                ("2".to_string(), "password".to_string()),
            ]),
            posts: vec![
                Post {
                    community_id: Some("1".into()),
                    ..post("1", "1", "Sunrise over the ridge", ["nature", "photography"])
                },
                post("2", "1", "Trying a new lens", ["photography", "gear"]),
                post("3", "2", "Street food in Bangkok", ["travel", "food"]),
            ],
            comments: vec![Comment {
                id: "1".into(),
                post_id: "1".into(),
                user_id: "2".into(),
                username: "user2".into(),
                content: "Beautiful light!".into(),
                created_at: ts.clone(),
                updated_at: ts.clone(),
                user_profile_pic: DEFAULT_AVATAR.into(),
            }],
            likes: vec![like("1", "2"), like("2", "1")],
            communities: vec![Community {
                id: "1".into(),
                name: "Landscape Photography".into(),
                description: "Share your best outdoor shots".into(),
                creator_id: "1".into(),
                cover_image: String::new(),
                members: vec!["1".into(), "2".into()],
                tags: vec!["photography".into(), "nature".into()],
                created_at: ts.clone(),
                updated_at: ts.clone(),
                member_count: 2,
                post_count: 1,
            }],
            notifications: vec![Notification {
                id: "1".into(),
                user_id: "1".into(),
                sender_id: "2".into(),
                sender_username: "user2".into(),
                sender_profile_pic: DEFAULT_AVATAR.into(),
                kind: "LIKE".into(),
                post_id: Some("1".into()),
                community_id: None,
                message: "user2 liked your post".into(),
                read: false,
                created_at: ts,
            }],
            acting_user: "1".into(),
            next_id: 100,
        }
    }

    fn next_id(&mut self) -> String {
        let id = self.next_id;
        self.next_id += 1;
        id.to_string()
    }

    fn user(&self, id: &str) -> Result<&User> {
        self.users
            .iter()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::not_found("user"))
    }

    fn user_mut(&mut self, id: &str) -> Result<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::not_found("user"))
    }

    fn post_index(&self, id: &str) -> Result<usize> {
        self.posts
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| Error::not_found("post"))
    }

    fn community_mut(&mut self, id: &str) -> Result<&mut Community> {
        self.communities
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("community"))
    }

    fn comment_mut(&mut self, id: &str) -> Result<&mut Comment> {
        self.comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| Error::not_found("comment"))
    }

    /// A post with its likes, comments and counters filled in.
    fn hydrate(&self, post: &Post) -> Post {
        let mut post = post.clone();
        post.likes = self
            .likes
            .iter()
            .filter(|l| l.post_id == post.id)
            .cloned()
            .collect();
        post.comments = self
            .comments
            .iter()
            .filter(|c| c.post_id == post.id)
            .cloned()
            .collect();
        post.likes_count = post.likes.len() as u64;
        post.comments_count = post.comments.len() as u64;
        post
    }

    fn hydrate_where(&self, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
        self.posts
            .iter()
            .filter(|p| keep(p))
            .map(|p| self.hydrate(p))
            .collect()
    }

    fn acting_username(&self) -> String {
        self.user(&self.acting_user)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn clean_tags(tags: &[String]) -> Vec<String> {
    tags.iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

impl SocialBackend for LocalApi {
    async fn login(&self, req: LoginRequest) -> Result<AuthResponse> {
        let mut data = self.data.lock().await;
        let user = data
            .users
            .iter()
            .find(|u| u.username == req.username)
            .cloned()
            .filter(|u| data.passwords.get(&u.id) == Some(&req.password))
            .ok_or_else(|| Error::Auth {
                status: 401,
                message: "invalid credentials".into(),
            })?;

        let serial = data.next_id();
        data.acting_user = user.id.clone();
        debug!(user_id = %user.id, "local login");
        Ok(AuthResponse {
            tokens: session::TokenPair {
                token: format!("local-access-{}-{serial}", user.id),
                refresh_token: format!("local-refresh-{}-{serial}", user.id),
            },
            user,
        })
    }

    async fn register(&self, req: RegisterRequest) -> Result<User> {
        let mut data = self.data.lock().await;
        if data.users.iter().any(|u| u.username == req.username) {
            return Err(Error::Validation {
                status: 409,
                message: "username already exists".into(),
            });
        }

        let ts = now();
        let user = User {
            id: data.next_id(),
            username: req.username,
            email: req.email,
            full_name: req.full_name,
            bio: req.bio,
            profile_picture: DEFAULT_AVATAR.into(),
            followers: Vec::new(),
            following: Vec::new(),
            interests: req.interests,
            created_at: ts.clone(),
            updated_at: ts,
        };
        data.passwords.insert(user.id.clone(), req.password);
        data.users.push(user.clone());
        Ok(user)
    }

    async fn ping(&self) -> Result<Ping> {
        Ok(Ping {
            status: "success".into(),
            message: "local fallback is serving requests".into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn status(&self) -> Result<Ping> {
        Ok(Ping {
            status: "success".into(),
            message: "local API is running".into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn get_profile(&self, req: UserRef) -> Result<User> {
        self.data.lock().await.user(&req.user_id).cloned()
    }

    async fn get_profile_by_username(&self, req: UsernameRef) -> Result<User> {
        let data = self.data.lock().await;
        data.users
            .iter()
            .find(|u| u.username == req.username)
            .cloned()
            .ok_or_else(|| Error::not_found("user"))
    }

    async fn update_profile(&self, req: ProfileUpdate) -> Result<User> {
        let mut data = self.data.lock().await;
        let user = data.user_mut(&req.user_id)?;
        let changes = req.changes;
        if let Some(full_name) = changes.full_name {
            user.full_name = full_name;
        }
        if let Some(bio) = changes.bio {
            user.bio = bio;
        }
        if let Some(picture) = changes.profile_picture {
            user.profile_picture = picture;
        }
        if let Some(interests) = changes.interests {
            user.interests = interests;
        }
        user.updated_at = now();
        Ok(user.clone())
    }

    async fn search_users(&self, req: SearchRequest<UserSearch>) -> Result<Vec<User>> {
        let data = self.data.lock().await;
        Ok(data
            .users
            .iter()
            .filter(|u| match req.by {
                UserSearch::Username => contains_ci(&u.username, &req.query),
                UserSearch::Interest => u.interests.iter().any(|i| contains_ci(i, &req.query)),
            })
            .cloned()
            .collect())
    }

    async fn follow_user(&self, req: FollowRequest) -> Result<Message> {
        let mut data = self.data.lock().await;
        data.user(&req.target_id)?;
        let follower = data.user_mut(&req.user_id)?;
        if !follower.following.contains(&req.target_id) {
            follower.following.push(req.target_id.clone());
            let target = data.user_mut(&req.target_id)?;
            target.followers.push(req.user_id.clone());
        }
        Ok(Message::new("User followed successfully"))
    }

    async fn unfollow_user(&self, req: FollowRequest) -> Result<Message> {
        let mut data = self.data.lock().await;
        data.user(&req.target_id)?;
        data.user_mut(&req.user_id)?
            .following
            .retain(|id| *id != req.target_id);
        data.user_mut(&req.target_id)?
            .followers
            .retain(|id| *id != req.user_id);
        Ok(Message::new("User unfollowed successfully"))
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        Ok(self.data.lock().await.hydrate_where(|_| true))
    }

    async fn get_post(&self, req: PostRef) -> Result<Post> {
        let data = self.data.lock().await;
        let index = data.post_index(&req.post_id)?;
        Ok(data.hydrate(&data.posts[index]))
    }

    async fn list_user_posts(&self, req: UserRef) -> Result<Vec<Post>> {
        Ok(self
            .data
            .lock()
            .await
            .hydrate_where(|p| p.user_id == req.user_id))
    }

    async fn list_community_posts(&self, req: CommunityRef) -> Result<Vec<Post>> {
        let data = self.data.lock().await;
        if !data.communities.iter().any(|c| c.id == req.community_id) {
            return Err(Error::not_found("community"));
        }
        Ok(data.hydrate_where(|p| p.community_id.as_ref() == Some(&req.community_id)))
    }

    async fn get_feed(&self, req: PageRequest) -> Result<FeedPage> {
        if req.size == 0 {
            return Err(Error::InvalidRequest("page size must be positive".into()));
        }
        let data = self.data.lock().await;
        let total = data.posts.len() as u64;
        let content = data
            .posts
            .iter()
            .skip(req.page.saturating_mul(req.size) as usize)
            .take(req.size as usize)
            .map(|p| data.hydrate(p))
            .collect();
        Ok(FeedPage {
            content,
            total_pages: total.div_ceil(req.size),
        })
    }

    async fn create_post(&self, req: NewPost) -> Result<Post> {
        let mut data = self.data.lock().await;
        if let Some(community_id) = &req.community_id {
            data.community_mut(community_id)?.post_count += 1;
        }

        let ts = now();
        let post = Post {
            id: data.next_id(),
            user_id: data.acting_user.clone(),
            username: data.acting_username(),
            caption: req.caption,
            image_url: String::new(),
            tags: clean_tags(&req.tags),
            likes: Vec::new(),
            comments: Vec::new(),
            community_id: req.community_id,
            created_at: ts.clone(),
            updated_at: ts,
            likes_count: 0,
            comments_count: 0,
            location: None,
        };
        data.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, req: PostUpdate) -> Result<Post> {
        let mut data = self.data.lock().await;
        let index = data.post_index(&req.post_id)?;
        let post = &mut data.posts[index];
        if let Some(caption) = req.changes.caption {
            post.caption = caption;
        }
        if let Some(tags) = req.changes.tags {
            post.tags = clean_tags(&tags);
        }
        post.updated_at = now();
        Ok(data.hydrate(&data.posts[index]))
    }

    async fn delete_post(&self, req: PostRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let index = data.post_index(&req.post_id)?;
        let post = data.posts.remove(index);
        data.comments.retain(|c| c.post_id != post.id);
        data.likes.retain(|l| l.post_id != post.id);
        if let Some(community_id) = &post.community_id {
            if let Ok(community) = data.community_mut(community_id) {
                community.post_count = community.post_count.saturating_sub(1);
            }
        }
        Ok(Message::new("Post deleted successfully"))
    }

    async fn search_posts(&self, req: SearchRequest<PostSearch>) -> Result<Vec<Post>> {
        Ok(self.data.lock().await.hydrate_where(|p| match req.by {
            PostSearch::Tag => p.tags.iter().any(|t| contains_ci(t, &req.query)),
            PostSearch::Caption => contains_ci(&p.caption, &req.query),
        }))
    }

    async fn list_comments(&self, req: PostRef) -> Result<Vec<Comment>> {
        let data = self.data.lock().await;
        Ok(data
            .comments
            .iter()
            .filter(|c| c.post_id == req.post_id)
            .cloned()
            .collect())
    }

    async fn create_comment(&self, req: NewComment) -> Result<Comment> {
        let mut data = self.data.lock().await;
        data.post_index(&req.post_id)?;

        let ts = now();
        let comment = Comment {
            id: data.next_id(),
            post_id: req.post_id,
            user_id: data.acting_user.clone(),
            username: data.acting_username(),
            content: req.content,
            created_at: ts.clone(),
            updated_at: ts,
            user_profile_pic: DEFAULT_AVATAR.into(),
        };
        data.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, req: CommentUpdate) -> Result<Comment> {
        if req.content.trim().is_empty() {
            return Err(Error::InvalidRequest("comment content is empty".into()));
        }
        let mut data = self.data.lock().await;
        let comment = data.comment_mut(&req.comment_id)?;
        comment.content = req.content;
        comment.updated_at = now();
        Ok(comment.clone())
    }

    async fn delete_comment(&self, req: CommentRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let index = data
            .comments
            .iter()
            .position(|c| c.id == req.comment_id)
            .ok_or_else(|| Error::not_found("comment"))?;
        data.comments.remove(index);
        Ok(Message::new("Comment deleted successfully"))
    }

    async fn list_likes(&self, req: PostRef) -> Result<Vec<Like>> {
        let data = self.data.lock().await;
        Ok(data
            .likes
            .iter()
            .filter(|l| l.post_id == req.post_id)
            .cloned()
            .collect())
    }

    async fn toggle_like(&self, req: PostRef) -> Result<LikeState> {
        let mut data = self.data.lock().await;
        data.post_index(&req.post_id)?;

        let user_id = data.acting_user.clone();
        if let Some(index) = data
            .likes
            .iter()
            .position(|l| l.post_id == req.post_id && l.user_id == user_id)
        {
            data.likes.remove(index);
            return Ok(LikeState { liked: false });
        }

        let like = Like {
            id: data.next_id(),
            post_id: req.post_id,
            user_id,
            username: data.acting_username(),
            created_at: now(),
        };
        data.likes.push(like);
        Ok(LikeState { liked: true })
    }

    async fn check_like(&self, req: PostRef) -> Result<LikeState> {
        let data = self.data.lock().await;
        data.post_index(&req.post_id)?;
        let liked = data
            .likes
            .iter()
            .any(|l| l.post_id == req.post_id && l.user_id == data.acting_user);
        Ok(LikeState { liked })
    }

    async fn list_communities(&self) -> Result<Vec<Community>> {
        Ok(self.data.lock().await.communities.clone())
    }

    async fn get_community(&self, req: CommunityRef) -> Result<Community> {
        let mut data = self.data.lock().await;
        data.community_mut(&req.community_id).map(|c| c.clone())
    }

    async fn create_community(&self, req: NewCommunity) -> Result<Community> {
        if req.name.trim().is_empty() {
            return Err(Error::InvalidRequest("community name is empty".into()));
        }
        let mut data = self.data.lock().await;
        let ts = now();
        let creator = data.acting_user.clone();
        let community = Community {
            id: data.next_id(),
            name: req.name,
            description: req.description,
            creator_id: creator.clone(),
            cover_image: req.cover_image,
            members: vec![creator],
            tags: clean_tags(&req.tags),
            created_at: ts.clone(),
            updated_at: ts,
            member_count: 1,
            post_count: 0,
        };
        data.communities.push(community.clone());
        Ok(community)
    }

    async fn update_community(&self, req: CommunityUpdate) -> Result<Community> {
        let mut data = self.data.lock().await;
        let community = data.community_mut(&req.community_id)?;
        let changes = req.changes;
        if let Some(name) = changes.name {
            community.name = name;
        }
        if let Some(description) = changes.description {
            community.description = description;
        }
        if let Some(cover_image) = changes.cover_image {
            community.cover_image = cover_image;
        }
        if let Some(tags) = changes.tags {
            community.tags = clean_tags(&tags);
        }
        community.updated_at = now();
        Ok(community.clone())
    }

    /// Posts in the community stay, detached from it.
    async fn delete_community(&self, req: CommunityRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let index = data
            .communities
            .iter()
            .position(|c| c.id == req.community_id)
            .ok_or_else(|| Error::not_found("community"))?;
        data.communities.remove(index);
        for post in &mut data.posts {
            if post.community_id.as_ref() == Some(&req.community_id) {
                post.community_id = None;
            }
        }
        Ok(Message::new("Community deleted successfully"))
    }

    async fn join_community(&self, req: CommunityRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let user_id = data.acting_user.clone();
        let community = data.community_mut(&req.community_id)?;
        if !community.members.contains(&user_id) {
            community.members.push(user_id);
            community.member_count = community.members.len() as u64;
        }
        Ok(Message::new("Joined community successfully"))
    }

    async fn leave_community(&self, req: CommunityRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let user_id = data.acting_user.clone();
        let community = data.community_mut(&req.community_id)?;
        community.members.retain(|id| *id != user_id);
        community.member_count = community.members.len() as u64;
        Ok(Message::new("Left community successfully"))
    }

    async fn list_user_communities(&self) -> Result<Vec<Community>> {
        let data = self.data.lock().await;
        Ok(data
            .communities
            .iter()
            .filter(|c| c.members.contains(&data.acting_user))
            .cloned()
            .collect())
    }

    async fn search_communities(
        &self,
        req: SearchRequest<CommunitySearch>,
    ) -> Result<Vec<Community>> {
        let data = self.data.lock().await;
        Ok(data
            .communities
            .iter()
            .filter(|c| match req.by {
                CommunitySearch::Name => contains_ci(&c.name, &req.query),
                CommunitySearch::Tag => c.tags.iter().any(|t| contains_ci(t, &req.query)),
            })
            .cloned()
            .collect())
    }

    async fn list_notifications(&self) -> Result<Vec<Notification>> {
        Ok(self.data.lock().await.notifications.clone())
    }

    async fn list_unread_notifications(&self) -> Result<Vec<Notification>> {
        let data = self.data.lock().await;
        Ok(data
            .notifications
            .iter()
            .filter(|n| !n.read)
            .cloned()
            .collect())
    }

    async fn unread_count(&self) -> Result<UnreadCount> {
        let data = self.data.lock().await;
        let count = data.notifications.iter().filter(|n| !n.read).count() as u64;
        Ok(UnreadCount { count })
    }

    async fn mark_notification_read(&self, req: NotificationRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let notification = data
            .notifications
            .iter_mut()
            .find(|n| n.id == req.notification_id)
            .ok_or_else(|| Error::not_found("notification"))?;
        notification.read = true;
        Ok(Message::new("Notification marked as read"))
    }

    async fn mark_all_notifications_read(&self) -> Result<Message> {
        let mut data = self.data.lock().await;
        for notification in &mut data.notifications {
            notification.read = true;
        }
        Ok(Message::new("All notifications marked as read"))
    }

    async fn delete_notification(&self, req: NotificationRef) -> Result<Message> {
        let mut data = self.data.lock().await;
        let index = data
            .notifications
            .iter()
            .position(|n| n.id == req.notification_id)
            .ok_or_else(|| Error::not_found("notification"))?;
        data.notifications.remove(index);
        Ok(Message::new("Notification deleted successfully"))
    }
}

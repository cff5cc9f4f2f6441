use crate::error::{AppError, Result};
use crate::store::{DocumentStore, Entity, Query, Subscription, fetch};
use crate::visibility;
use chrono::Utc;
use conecta_protocol::{CreatePost, MAX_POST_LENGTH, Post, SocialView, User, ValidationError};
use serde::Serialize;
use std::sync::Arc;

/// What the social hub shows for a requested view
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "view", rename_all = "lowercase")]
pub enum SocialPane {
    Feed { posts: Vec<Post> },
    Messages { contacts: Vec<User> },
    Profile { user: User },
}

#[derive(Clone)]
pub struct SocialService {
    store: Arc<dyn DocumentStore>,
}

impl SocialService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn newest_first() -> Query {
        Query::collection(Post::COLLECTION).order_by_desc("timestamp")
    }

    pub fn subscribe(&self) -> Subscription<Post> {
        Subscription::start(self.store.clone(), Self::newest_first())
    }

    /// The feed, newest first. Users without feed access are refused.
    pub async fn feed(&self, current: &User) -> Result<Vec<Post>> {
        if !visibility::feed_enabled(current) {
            return Err(AppError::forbidden("The feed is not available for owners"));
        }
        Ok(fetch(self.store.as_ref(), &Self::newest_first()).await?)
    }

    pub async fn publish(&self, author: &User, input: CreatePost) -> Result<Post> {
        if !visibility::feed_enabled(author) {
            return Err(AppError::forbidden("The feed is not available for owners"));
        }
        let text = input.text.trim();
        if text.is_empty() {
            return Err(ValidationError::Empty("text").into());
        }
        let len = text.chars().count();
        if len > MAX_POST_LENGTH {
            return Err(ValidationError::PostTooLong {
                len,
                max: MAX_POST_LENGTH,
            }
            .into());
        }

        let mut post = Post {
            id: String::new(),
            author_id: author.id.clone(),
            text: text.to_string(),
            timestamp: Utc::now(),
        };
        post.id = self.store.add(Post::COLLECTION, post.to_fields()?).await?;

        tracing::debug!(post_id = %post.id, "Post published");
        Ok(post)
    }

    /// Resolve a requested view. Asking for the feed without access lands on
    /// direct messages instead.
    pub async fn view(
        &self,
        current: &User,
        requested: SocialView,
        contacts: Vec<User>,
    ) -> Result<SocialPane> {
        match visibility::select_social_view(current, requested) {
            SocialView::Feed => Ok(SocialPane::Feed {
                posts: self.feed(current).await?,
            }),
            SocialView::Messages => Ok(SocialPane::Messages {
                contacts: contacts.into_iter().filter(|u| u.id != current.id).collect(),
            }),
            SocialView::Profile => Ok(SocialPane::Profile {
                user: current.clone(),
            }),
        }
    }
}

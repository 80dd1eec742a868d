use chrono::{DateTime, Utc};
use uuid::Uuid;

use kevin_types::{Comment, CommentId, FeedPost, PostId};

/// Identity of a comment as seen by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EchoId {
    /// Stored by the server
    Server(CommentId),
    /// Local stand-in for an append that has not settled yet
    Placeholder(Uuid),
}

#[derive(Debug, Clone, PartialEq)]
pub struct EchoComment {
    pub id: EchoId,
    pub post_id: PostId,
    pub username: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl EchoComment {
    pub fn is_placeholder(&self) -> bool {
        matches!(self.id, EchoId::Placeholder(_))
    }
}

impl From<Comment> for EchoComment {
    fn from(comment: Comment) -> Self {
        Self {
            id: EchoId::Server(comment.id),
            post_id: comment.post_id,
            username: comment.username,
            text: comment.text,
            created_at: comment.created_at,
        }
    }
}

/// A user intent applied to the echo before the server has answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalMutation {
    ToggleLike { username: String },
    AppendComment { username: String, text: String },
}

/// Client-visible state of one post at a point in time
#[derive(Debug, Clone, PartialEq)]
pub struct EchoSnapshot {
    pub likes: Vec<String>,
    pub comments: Vec<EchoComment>,
}

/// What an applied mutation changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Membership of the actor after the toggle
    Liked(bool),
    Appended(Uuid),
}

/// Receipt of an optimistic apply, needed to roll it back
#[derive(Debug, Clone)]
pub struct Applied {
    mutation: LocalMutation,
    effect: Effect,
    snapshot: EchoSnapshot,
    generation: u64,
}

impl Applied {
    pub fn mutation(&self) -> &LocalMutation {
        &self.mutation
    }

    pub fn effect(&self) -> Effect {
        self.effect
    }

    /// State of the post just before the apply
    pub fn snapshot(&self) -> &EchoSnapshot {
        &self.snapshot
    }

    pub fn placeholder(&self) -> Option<Uuid> {
        match self.effect {
            Effect::Appended(id) => Some(id),
            Effect::Liked(_) => None,
        }
    }
}

/// Local echo of one post's likes and comments.
///
/// Every change bumps `generation`, which lets a rollback tell whether
/// anything else touched the echo after its own apply.
#[derive(Debug, Clone)]
pub struct PostEcho {
    post_id: PostId,
    likes: Vec<String>,
    comments: Vec<EchoComment>,
    generation: u64,
}

impl PostEcho {
    pub fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            likes: Vec::new(),
            comments: Vec::new(),
            generation: 0,
        }
    }

    pub fn from_feed_post(feed_post: &FeedPost) -> Self {
        Self {
            post_id: feed_post.post.id,
            likes: feed_post.likes.clone(),
            comments: feed_post.comments.iter().cloned().map(EchoComment::from).collect(),
            generation: 0,
        }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    pub fn likes(&self) -> &[String] {
        &self.likes
    }

    pub fn comments(&self) -> &[EchoComment] {
        &self.comments
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, username: &str) -> bool {
        self.likes.iter().any(|u| u == username)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> EchoSnapshot {
        EchoSnapshot {
            likes: self.likes.clone(),
            comments: self.comments.clone(),
        }
    }

    /// Apply a mutation immediately and return what is needed to undo it
    pub fn apply(&mut self, mutation: LocalMutation) -> Applied {
        let snapshot = self.snapshot();

        let effect = match &mutation {
            LocalMutation::ToggleLike { username } => {
                let liked = !self.is_liked_by(username);
                self.write_like(username, liked);
                Effect::Liked(liked)
            }
            LocalMutation::AppendComment { username, text } => {
                let placeholder = Uuid::new_v4();
                self.comments.push(EchoComment {
                    id: EchoId::Placeholder(placeholder),
                    post_id: self.post_id,
                    username: username.clone(),
                    text: text.clone(),
                    created_at: Utc::now(),
                });
                Effect::Appended(placeholder)
            }
        };

        self.generation += 1;
        Applied {
            mutation,
            effect,
            snapshot,
            generation: self.generation,
        }
    }

    /// Undo an apply.
    ///
    /// Restores the snapshot wholesale when nothing happened since the apply,
    /// otherwise reverts only this mutation so other pending intents survive.
    pub fn rollback(&mut self, applied: &Applied) {
        if self.generation == applied.generation {
            self.likes = applied.snapshot.likes.clone();
            self.comments = applied.snapshot.comments.clone();
        } else {
            match (&applied.mutation, applied.effect) {
                (LocalMutation::ToggleLike { username }, Effect::Liked(liked)) => {
                    self.write_like(username, !liked);
                }
                (_, Effect::Appended(placeholder)) => {
                    self.comments.retain(|c| c.id != EchoId::Placeholder(placeholder));
                }
                (LocalMutation::AppendComment { .. }, Effect::Liked(_)) => {}
            }
        }
        self.generation += 1;
    }

    /// Swap in the authoritative comments.
    ///
    /// Placeholders of appends still in flight stay at the tail; `settled`
    /// is the placeholder the new list already accounts for.
    pub fn replace_comments(&mut self, authoritative: Vec<Comment>, settled: Option<Uuid>) {
        let pending: Vec<EchoComment> = self
            .comments
            .drain(..)
            .filter(|c| match c.id {
                EchoId::Placeholder(id) => Some(id) != settled,
                EchoId::Server(_) => false,
            })
            .collect();

        self.comments = authoritative.into_iter().map(EchoComment::from).collect();
        self.comments.extend(pending);
        self.generation += 1;
    }

    /// Align one actor's membership with the server
    pub fn set_like(&mut self, username: &str, liked: bool) {
        if self.is_liked_by(username) != liked {
            self.write_like(username, liked);
            self.generation += 1;
        }
    }

    pub fn replace_likes(&mut self, usernames: Vec<String>) {
        self.likes = usernames;
        self.generation += 1;
    }

    fn write_like(&mut self, username: &str, liked: bool) {
        if liked {
            if !self.is_liked_by(username) {
                self.likes.push(username.to_string());
            }
        } else {
            self.likes.retain(|u| u != username);
        }
    }
}

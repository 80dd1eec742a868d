use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use uuid::Uuid;

use kevin_types::{
    validate_comment_text, validate_post_id, validate_username, Comment, ErrorKind, Identity,
    PostId, ValidationError,
};

use super::gateway::MutationGateway;
use super::outbox::{OperationKind, Outbox, PendingOp};
use super::registry::{lock_echo, EchoRegistry, SharedEcho};
use super::single_flight::SingleFlight;
use super::store::LocalMutation;
use crate::api::ApiError;

/// Lifecycle of one optimistic mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationPhase {
    Idle,
    /// Applied locally, waiting for the server
    Optimistic,
    Reconciled,
    RolledBack,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Illegal mutation transition from {from:?} to {to:?}")]
pub struct IllegalTransition {
    pub from: MutationPhase,
    pub to: MutationPhase,
}

impl MutationPhase {
    pub fn can_advance_to(self, next: MutationPhase) -> bool {
        use MutationPhase::*;
        matches!(
            (self, next),
            (Idle, Optimistic) | (Optimistic, Reconciled) | (Optimistic, RolledBack)
        )
    }

    pub fn advance(&mut self, next: MutationPhase) -> Result<(), IllegalTransition> {
        if !self.can_advance_to(next) {
            return Err(IllegalTransition {
                from: *self,
                to: next,
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_settled(self) -> bool {
        matches!(self, MutationPhase::Reconciled | MutationPhase::RolledBack)
    }
}

/// A mutation that did not go through. The echo has already been rolled back.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct MutationFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Outbox token, absent when the mutation never got that far
    pub token: Option<Uuid>,
}

impl MutationFailure {
    fn from_api(action: &str, err: &ApiError, token: Option<Uuid>) -> Self {
        let message = match err.kind() {
            ErrorKind::Validation => format!("Validation Error: {}", err),
            ErrorKind::NotFound => format!("Could not {}: the post no longer exists", action),
            ErrorKind::Upload => format!("Could not {}: the upload failed", action),
            ErrorKind::Storage => format!("Could not {}: the server could not save it", action),
            ErrorKind::Unknown => format!(
                "Could not {}. Check your connection and try again ({})",
                action, err
            ),
        };
        Self {
            kind: err.kind(),
            message,
            token,
        }
    }

    fn outbox(err: anyhow::Error) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: format!("Could not record the pending change: {:#}", err),
            token: None,
        }
    }
}

impl From<ValidationError> for MutationFailure {
    fn from(err: ValidationError) -> Self {
        Self {
            kind: ErrorKind::Validation,
            message: format!("Validation Error: {}", err),
            token: None,
        }
    }
}

impl From<IllegalTransition> for MutationFailure {
    fn from(err: IllegalTransition) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: err.to_string(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LikeOutcome {
    pub post_id: PostId,
    pub token: Uuid,
    pub liked: bool,
    pub like_count: usize,
    pub phase: MutationPhase,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentOutcome {
    pub comment: Comment,
    pub token: Uuid,
    /// False when the write succeeded but the follow-up read did not,
    /// in which case the placeholder is still shown
    pub refreshed: bool,
    pub phase: MutationPhase,
}

#[derive(Debug, Default)]
pub struct ReplayReport {
    pub replayed: Vec<Uuid>,
    pub failed: Vec<MutationFailure>,
    /// Rejected for good by the server and removed from the outbox
    pub discarded: usize,
}

/// Drives optimistic mutations: applies them to the echo, sends them through
/// the gateway and settles the echo with the answer.
pub struct Reconciler<G> {
    gateway: G,
    outbox: Arc<Mutex<Outbox>>,
    flights: SingleFlight<(PostId, String)>,
}

impl<G: MutationGateway> Reconciler<G> {
    pub fn new(gateway: G, outbox: Outbox) -> Self {
        Self {
            gateway,
            outbox: Arc::new(Mutex::new(outbox)),
            flights: SingleFlight::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Operations still waiting for a confirmation
    pub fn pending(&self) -> Vec<PendingOp> {
        self.outbox().entries().to_vec()
    }

    /// Toggle the actor's like on the echo's post.
    ///
    /// Toggles by the same actor on the same post run one after another, so
    /// each one starts from the state the previous one settled on.
    pub async fn toggle_like(
        &self,
        identity: &Identity,
        echo: &SharedEcho,
    ) -> Result<LikeOutcome, MutationFailure> {
        let username = identity.username().to_string();
        let post_id = lock_echo(echo).post_id();
        validate_post_id(post_id)?;
        validate_username(&username)?;

        let _flight = self.flights.acquire((post_id, username.clone())).await;

        let token = self
            .outbox()
            .record(OperationKind::ToggleLike {
                post_id,
                username: username.clone(),
            })
            .map_err(MutationFailure::outbox)?;

        let mut phase = MutationPhase::Idle;
        let applied = lock_echo(echo).apply(LocalMutation::ToggleLike {
            username: username.clone(),
        });
        phase.advance(MutationPhase::Optimistic)?;
        log::debug!("{} toggled like on post {} optimistically ({})", username, post_id, token);

        match self.gateway.toggle_like(post_id, &username, token).await {
            Ok(response) => {
                let like_count = {
                    let mut echo = lock_echo(echo);
                    echo.set_like(&username, response.liked);
                    echo.like_count()
                };
                self.settle(token);
                phase.advance(MutationPhase::Reconciled)?;

                Ok(LikeOutcome {
                    post_id,
                    token,
                    liked: response.liked,
                    like_count,
                    phase,
                })
            }
            Err(err) => {
                lock_echo(echo).rollback(&applied);
                // Rolled back and reported, so it must not come back on sync
                self.discard(token);
                phase.advance(MutationPhase::RolledBack)?;
                log::warn!("Like on post {} rolled back: {}", post_id, err);

                Err(MutationFailure::from_api("like this post", &err, Some(token)))
            }
        }
    }

    /// Append a comment, shown at once with a placeholder id
    pub async fn add_comment(
        &self,
        identity: &Identity,
        echo: &SharedEcho,
        text: &str,
    ) -> Result<CommentOutcome, MutationFailure> {
        let username = identity.username().to_string();
        let post_id = lock_echo(echo).post_id();
        validate_post_id(post_id)?;
        validate_username(&username)?;
        validate_comment_text(text)?;

        let token = self
            .outbox()
            .record(OperationKind::AddComment {
                post_id,
                username: username.clone(),
                text: text.to_string(),
            })
            .map_err(MutationFailure::outbox)?;

        let mut phase = MutationPhase::Idle;
        let applied = lock_echo(echo).apply(LocalMutation::AppendComment {
            username: username.clone(),
            text: text.to_string(),
        });
        phase.advance(MutationPhase::Optimistic)?;

        match self.gateway.add_comment(post_id, &username, text, token).await {
            Ok(comment) => {
                self.settle(token);

                let refreshed = match self.gateway.fetch_comments(post_id).await {
                    Ok(comments) => {
                        lock_echo(echo).replace_comments(comments, applied.placeholder());
                        true
                    }
                    Err(err) => {
                        log::warn!("Comment {} saved but refresh failed: {}", comment.id, err);
                        false
                    }
                };
                phase.advance(MutationPhase::Reconciled)?;

                Ok(CommentOutcome {
                    comment,
                    token,
                    refreshed,
                    phase,
                })
            }
            Err(err) => {
                lock_echo(echo).rollback(&applied);
                self.discard(token);
                phase.advance(MutationPhase::RolledBack)?;
                log::warn!("Comment on post {} rolled back: {}", post_id, err);

                Err(MutationFailure::from_api("post your comment", &err, Some(token)))
            }
        }
    }

    /// Send every outbox entry again with its original token.
    ///
    /// Entries only survive when their outcome is unknown, e.g. the process
    /// died before the answer arrived. The server applies a token at most
    /// once, so entries that did reach it are answered from its record
    /// instead of applied twice.
    pub async fn replay(&self, registry: &EchoRegistry) -> ReplayReport {
        let mut report = ReplayReport::default();

        for entry in self.pending() {
            if let Err(e) = self.outbox().retry(entry.token) {
                log::warn!("Failed to update outbox entry {}: {:#}", entry.token, e);
            }

            let echo = registry.echo_for(entry.op.post_id());
            let result = self.resend(&entry.op, entry.token, &echo).await;

            match result {
                Ok(()) => {
                    self.settle(entry.token);
                    report.replayed.push(entry.token);
                }
                Err(err) => {
                    if let OperationKind::ToggleLike { post_id, .. } = &entry.op {
                        self.refresh_likes(*post_id, &echo).await;
                    }
                    let failure =
                        MutationFailure::from_api(action_of(&entry.op), &err, Some(entry.token));
                    if matches!(err.kind(), ErrorKind::Validation | ErrorKind::NotFound) {
                        self.discard(entry.token);
                        report.discarded += 1;
                    } else {
                        self.mark_failed(entry.token, &err);
                    }
                    report.failed.push(failure);
                }
            }
        }

        log::info!(
            "Replayed {} operations, {} failed",
            report.replayed.len(),
            report.failed.len()
        );
        report
    }

    async fn resend(&self, op: &OperationKind, token: Uuid, echo: &SharedEcho) -> Result<(), ApiError> {
        match op {
            OperationKind::ToggleLike { post_id, username } => {
                let _flight = self.flights.acquire((*post_id, username.clone())).await;
                let response = self.gateway.toggle_like(*post_id, username, token).await?;
                lock_echo(echo).replace_likes(response.likes);
            }
            OperationKind::AddComment {
                post_id,
                username,
                text,
            } => {
                self.gateway.add_comment(*post_id, username, text, token).await?;
                match self.gateway.fetch_comments(*post_id).await {
                    Ok(comments) => lock_echo(echo).replace_comments(comments, None),
                    Err(err) => log::warn!("Refresh after replay failed: {}", err),
                }
            }
        }
        Ok(())
    }

    /// Best effort: show the server's likes when a replayed toggle failed
    async fn refresh_likes(&self, post_id: PostId, echo: &SharedEcho) {
        match self.gateway.fetch_likes(post_id).await {
            Ok(likes) => lock_echo(echo).replace_likes(likes),
            Err(err) => log::debug!("Could not refresh likes for post {}: {}", post_id, err),
        }
    }

    fn outbox(&self) -> MutexGuard<'_, Outbox> {
        self.outbox.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self, token: Uuid) {
        if let Err(e) = self.outbox().complete(token) {
            log::warn!("Failed to clear outbox entry {}: {:#}", token, e);
        }
    }

    fn mark_failed(&self, token: Uuid, err: &ApiError) {
        if let Err(e) = self.outbox().fail(token, err.to_string()) {
            log::warn!("Failed to mark outbox entry {} as failed: {:#}", token, e);
        }
    }

    fn discard(&self, token: Uuid) {
        if let Err(e) = self.outbox().discard(token) {
            log::warn!("Failed to discard outbox entry {}: {:#}", token, e);
        }
    }
}

fn action_of(op: &OperationKind) -> &'static str {
    match op {
        OperationKind::ToggleLike { .. } => "like this post",
        OperationKind::AddComment { .. } => "post your comment",
    }
}

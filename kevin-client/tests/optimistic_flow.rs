use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use proptest::prelude::*;
use tempfile::TempDir;
use uuid::Uuid;

use kevin::api::{ApiError, ApiResult};
use kevin::echo::*;
use kevin_types::{
    validate_comment_text, validate_post_id, validate_username, Comment, ErrorKind, Identity,
    PostId, ToggleLikeResponse,
};

/// In-memory stand-in for the server, with switches to make calls fail
#[derive(Default)]
struct FakeGateway {
    likes: Mutex<HashMap<PostId, Vec<String>>>,
    comments: Mutex<Vec<Comment>>,
    like_tokens: Mutex<HashMap<Uuid, bool>>,
    comment_tokens: Mutex<HashMap<Uuid, Comment>>,
    fail_mutations: AtomicBool,
    fail_fetch: AtomicBool,
    calls: AtomicUsize,
    latency: Option<Duration>,
}

impl FakeGateway {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Default::default()
        }
    }

    fn server_likes(&self, post_id: PostId) -> Vec<String> {
        self.likes.lock().unwrap().get(&post_id).cloned().unwrap_or_default()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn network(&self) -> ApiResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl MutationGateway for FakeGateway {
    async fn toggle_like(
        &self,
        post_id: PostId,
        username: &str,
        token: Uuid,
    ) -> ApiResult<ToggleLikeResponse> {
        validate_post_id(post_id)?;
        validate_username(username)?;
        self.network().await?;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Storage("Database operation failed".to_string()));
        }

        let mut likes = self.likes.lock().unwrap();
        let post_likes = likes.entry(post_id).or_default();
        let mut tokens = self.like_tokens.lock().unwrap();

        let liked = match tokens.get(&token) {
            Some(liked) => *liked,
            None => {
                let liked = if post_likes.iter().any(|u| u == username) {
                    post_likes.retain(|u| u != username);
                    false
                } else {
                    post_likes.push(username.to_string());
                    true
                };
                tokens.insert(token, liked);
                liked
            }
        };

        Ok(ToggleLikeResponse {
            post_id,
            username: username.to_string(),
            liked,
            likes: post_likes.clone(),
        })
    }

    async fn add_comment(
        &self,
        post_id: PostId,
        username: &str,
        text: &str,
        token: Uuid,
    ) -> ApiResult<Comment> {
        validate_post_id(post_id)?;
        validate_username(username)?;
        validate_comment_text(text)?;
        self.network().await?;
        if self.fail_mutations.load(Ordering::SeqCst) {
            return Err(ApiError::Api("Internal Server Error".to_string()));
        }

        let mut tokens = self.comment_tokens.lock().unwrap();
        if let Some(existing) = tokens.get(&token) {
            return Ok(existing.clone());
        }

        let mut comments = self.comments.lock().unwrap();
        let comment = Comment {
            id: comments.len() as i64 + 1,
            post_id,
            username: username.to_string(),
            text: text.to_string(),
            created_at: Utc::now(),
        };
        comments.push(comment.clone());
        tokens.insert(token, comment.clone());
        Ok(comment)
    }

    async fn fetch_comments(&self, post_id: PostId) -> ApiResult<Vec<Comment>> {
        self.network().await?;
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(ApiError::Api("Service Unavailable".to_string()));
        }
        Ok(self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn fetch_likes(&self, post_id: PostId) -> ApiResult<Vec<String>> {
        self.network().await?;
        Ok(self.server_likes(post_id))
    }
}

fn echo(post_id: PostId) -> SharedEcho {
    Arc::new(Mutex::new(PostEcho::new(post_id)))
}

fn ana() -> Identity {
    Identity::seeker("ana").unwrap()
}

#[tokio::test]
async fn test_ana_likes_and_unlikes_post_42() {
    let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
    let post = echo(42);

    let liked = reconciler.toggle_like(&ana(), &post).await.unwrap();
    assert!(liked.liked);
    assert_eq!(liked.phase, MutationPhase::Reconciled);
    assert!(lock_echo(&post).is_liked_by("ana"));

    let unliked = reconciler.toggle_like(&ana(), &post).await.unwrap();
    assert!(!unliked.liked);
    assert!(!lock_echo(&post).is_liked_by("ana"));
    assert!(reconciler.gateway().server_likes(42).is_empty());
    assert!(reconciler.pending().is_empty());
}

#[tokio::test]
async fn test_empty_comment_on_post_7_never_reaches_the_network() {
    let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
    let post = echo(7);

    let failure = reconciler.add_comment(&ana(), &post, "").await.unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Validation);
    assert_eq!(failure.token, None);
    assert_eq!(reconciler.gateway().calls(), 0);
    assert!(lock_echo(&post).comments().is_empty());
    assert_eq!(lock_echo(&post).generation(), 0);
    assert!(reconciler.pending().is_empty());
}

#[tokio::test]
async fn test_failed_like_restores_membership() {
    let gateway = FakeGateway::default();
    gateway.fail_mutations.store(true, Ordering::SeqCst);
    let reconciler = Reconciler::new(gateway, Outbox::in_memory());
    let post = echo(42);

    let failure = reconciler.toggle_like(&ana(), &post).await.unwrap_err();

    assert_eq!(failure.kind, ErrorKind::Storage);
    assert!(failure.token.is_some());
    assert!(!lock_echo(&post).is_liked_by("ana"));
    assert!(reconciler.pending().is_empty());
}

#[tokio::test]
async fn test_sync_after_manual_retry_keeps_single_like() {
    let temp_dir = TempDir::new().unwrap();
    let outbox_path = temp_dir.path().join("outbox.json");
    let reconciler = Reconciler::new(FakeGateway::default(), Outbox::open(&outbox_path).unwrap());
    let post = echo(42);

    reconciler.gateway().fail_mutations.store(true, Ordering::SeqCst);
    reconciler.toggle_like(&ana(), &post).await.unwrap_err();

    // Ana taps again once the server is back
    reconciler.gateway().fail_mutations.store(false, Ordering::SeqCst);
    let retried = reconciler.toggle_like(&ana(), &post).await.unwrap();
    assert!(retried.liked);

    let report = reconciler.replay(&EchoRegistry::new()).await;

    assert!(report.replayed.is_empty());
    assert_eq!(reconciler.gateway().server_likes(42), vec!["ana".to_string()]);
    assert!(Outbox::open(&outbox_path).unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_comment_is_not_resent_by_sync() {
    let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
    let post = echo(7);

    reconciler.gateway().fail_mutations.store(true, Ordering::SeqCst);
    reconciler.add_comment(&ana(), &post, "hola").await.unwrap_err();
    reconciler.gateway().fail_mutations.store(false, Ordering::SeqCst);
    reconciler.add_comment(&ana(), &post, "hola").await.unwrap();

    reconciler.replay(&EchoRegistry::new()).await;
    assert_eq!(reconciler.gateway().comments.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_comment_reconciles_with_server_list() {
    let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
    let post = echo(7);

    let outcome = reconciler.add_comment(&ana(), &post, "Lo vi en Sol").await.unwrap();

    assert!(outcome.refreshed);
    let echo = lock_echo(&post);
    assert_eq!(echo.comments().len(), 1);
    assert_eq!(echo.comments()[0].id, EchoId::Server(outcome.comment.id));
    assert!(echo.comments().iter().all(|c| !c.is_placeholder()));
}

#[tokio::test]
async fn test_comment_saved_but_refresh_failed_keeps_placeholder() {
    let gateway = FakeGateway::default();
    gateway.fail_fetch.store(true, Ordering::SeqCst);
    let reconciler = Reconciler::new(gateway, Outbox::in_memory());
    let post = echo(7);

    let outcome = reconciler.add_comment(&ana(), &post, "hola").await.unwrap();

    assert!(!outcome.refreshed);
    assert_eq!(outcome.phase, MutationPhase::Reconciled);
    assert!(lock_echo(&post).comments()[0].is_placeholder());
    assert!(reconciler.pending().is_empty());
}

#[tokio::test]
async fn test_concurrent_toggles_by_one_actor_are_serialized() {
    let reconciler = Arc::new(Reconciler::new(
        FakeGateway::with_latency(Duration::from_millis(20)),
        Outbox::in_memory(),
    ));
    let post = echo(42);

    let mut handles = Vec::new();
    for _ in 0..3 {
        let reconciler = Arc::clone(&reconciler);
        let post = Arc::clone(&post);
        handles.push(tokio::spawn(async move {
            reconciler.toggle_like(&ana(), &post).await.unwrap()
        }));
    }

    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap().liked);
    }

    // Odd number of toggles ends liked on both sides
    outcomes.sort();
    assert_eq!(outcomes, vec![false, true, true]);
    assert!(lock_echo(&post).is_liked_by("ana"));
    assert_eq!(reconciler.gateway().server_likes(42), vec!["ana".to_string()]);
}

#[tokio::test]
async fn test_replay_resends_with_same_token() {
    let temp_dir = TempDir::new().unwrap();
    let outbox_path = temp_dir.path().join("outbox.json");

    // A process recorded the comment and died before the answer arrived
    let token = Outbox::open(&outbox_path)
        .unwrap()
        .record(OperationKind::AddComment {
            post_id: 7,
            username: "ana".to_string(),
            text: "hola".to_string(),
        })
        .unwrap();

    // A new process picks the entry up from disk
    let outbox = Outbox::open(&outbox_path).unwrap();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox.get(token).unwrap().status, OpStatus::Pending);
    let reconciler = Reconciler::new(FakeGateway::default(), outbox);
    let registry = EchoRegistry::new();

    let report = reconciler.replay(&registry).await;
    assert_eq!(report.replayed, vec![token]);
    assert!(report.failed.is_empty());
    assert!(Outbox::open(&outbox_path).unwrap().is_empty());

    // Replaying the same token again does not duplicate the comment
    reconciler
        .gateway()
        .add_comment(7, "ana", "hola", token)
        .await
        .unwrap();
    let echo = registry.get(7).unwrap();
    assert_eq!(lock_echo(&echo).comments().len(), 1);
    assert_eq!(reconciler.gateway().comments.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_like_replay_shows_server_likes() {
    let gateway = FakeGateway::default();
    gateway.likes.lock().unwrap().insert(42, vec!["luis".to_string()]);
    gateway.fail_mutations.store(true, Ordering::SeqCst);

    let mut outbox = Outbox::in_memory();
    let token = outbox
        .record(OperationKind::ToggleLike {
            post_id: 42,
            username: "ana".to_string(),
        })
        .unwrap();
    let reconciler = Reconciler::new(gateway, outbox);
    let registry = EchoRegistry::new();

    let report = reconciler.replay(&registry).await;

    assert_eq!(report.failed[0].kind, ErrorKind::Storage);
    assert_eq!(report.discarded, 0);
    let echo = registry.get(42).unwrap();
    assert!(lock_echo(&echo).is_liked_by("luis"));
    assert!(!lock_echo(&echo).is_liked_by("ana"));

    // Outcome still unknown, so the entry waits for the next sync
    let pending = reconciler.pending();
    assert_eq!(pending[0].token, token);
    assert_eq!(pending[0].status, OpStatus::Failed);
}

#[tokio::test]
async fn test_replay_discards_permanently_rejected_entries() {
    let mut outbox = Outbox::in_memory();
    outbox
        .record(OperationKind::AddComment {
            post_id: 7,
            username: "ana".to_string(),
            text: "   ".to_string(),
        })
        .unwrap();
    let reconciler = Reconciler::new(FakeGateway::default(), outbox);

    let report = reconciler.replay(&EchoRegistry::new()).await;

    assert_eq!(report.discarded, 1);
    assert_eq!(report.failed[0].kind, ErrorKind::Validation);
    assert!(reconciler.pending().is_empty());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_toggle_parity_after_reconciling_refetch(count in 0usize..8) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
            let post = echo(42);

            for _ in 0..count {
                reconciler.toggle_like(&ana(), &post).await.unwrap();
            }

            let server = reconciler.gateway().fetch_likes(42).await.unwrap();
            lock_echo(&post).replace_likes(server);

            let expected = count % 2 == 1;
            assert_eq!(lock_echo(&post).is_liked_by("ana"), expected);
        });
    }

    #[test]
    fn prop_failed_comment_leaves_comments_identical(
        seeded in prop::collection::vec("[a-z]{1,12}", 0..5),
        text in "[a-z]{1,40}",
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
            let post = echo(7);
            for existing in &seeded {
                reconciler.add_comment(&ana(), &post, existing).await.unwrap();
            }
            let before = lock_echo(&post).comments().to_vec();

            reconciler.gateway().fail_mutations.store(true, Ordering::SeqCst);
            let failure = reconciler.add_comment(&ana(), &post, &text).await;

            assert!(failure.is_err());
            assert_eq!(lock_echo(&post).comments(), &before[..]);
        });
    }

    #[test]
    fn prop_reconciled_comments_have_no_placeholders(texts in prop::collection::vec("[a-z]{1,12}", 1..5)) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let reconciler = Reconciler::new(FakeGateway::default(), Outbox::in_memory());
            let post = echo(7);
            for text in &texts {
                let outcome = reconciler.add_comment(&ana(), &post, text).await.unwrap();
                assert!(outcome.refreshed);
            }

            let echo = lock_echo(&post);
            assert_eq!(echo.comments().len(), texts.len());
            assert!(echo.comments().iter().all(|c| !c.is_placeholder()));
        });
    }
}

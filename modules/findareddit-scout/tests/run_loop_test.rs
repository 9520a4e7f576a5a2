//! Run loop failure handling: counting, backoff, recovery and abort.

use std::time::Duration;

use chrono::Utc;

use findareddit_common::{PlatformError, ScoutError};
use findareddit_scout::run_loop::{LoopState, RunLoop, MAX_CONSECUTIVE_FAILURES};
use findareddit_scout::testing::{post_at, public_subreddit, test_config, MockPlatform};
use findareddit_scout::traits::classify;
use reddit_client::RedditError;

fn transport() -> PlatformError {
    PlatformError::Transport("connection reset by peer".into())
}

#[tokio::test]
async fn recovers_after_two_failures_and_resets_counter() {
    let config = test_config();
    let platform = MockPlatform::new().fail_new_posts(2, transport());
    let mut run_loop = RunLoop::new(&platform, &config);

    assert_eq!(run_loop.iterate().await.unwrap(), config.error_sleep);
    assert_eq!(run_loop.iterate().await.unwrap(), config.error_sleep * 2);
    assert_eq!(run_loop.run_state().consecutive_failures, 2);

    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
    assert_eq!(run_loop.run_state().consecutive_failures, 0);
    assert_eq!(run_loop.run_state().backoff, Duration::ZERO);
    assert_ne!(run_loop.state(), LoopState::Aborted);
    assert_eq!(platform.sent_messages().len(), 1);
}

#[tokio::test]
async fn aborts_on_sixth_consecutive_failure() {
    let config = test_config();
    let platform = MockPlatform::new().fail_new_posts(6, transport());
    let mut run_loop = RunLoop::new(&platform, &config);

    for attempt in 1..=MAX_CONSECUTIVE_FAILURES {
        let pause = run_loop.iterate().await.unwrap();
        assert_eq!(pause, config.error_sleep * attempt);
    }

    let err = run_loop.iterate().await.unwrap_err();
    assert!(matches!(err, ScoutError::Platform(PlatformError::Transport(_))));
    assert_eq!(run_loop.state(), LoopState::Aborted);
    assert_eq!(
        run_loop.run_state().consecutive_failures,
        MAX_CONSECUTIVE_FAILURES + 1
    );
}

#[tokio::test]
async fn delivery_failure_counts_as_failed_iteration() {
    let config = test_config();
    let platform = MockPlatform::new().fail_messages(1, transport());
    let mut run_loop = RunLoop::new(&platform, &config);

    assert_eq!(run_loop.iterate().await.unwrap(), config.error_sleep);
    assert_eq!(run_loop.run_state().consecutive_failures, 1);

    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
    assert_eq!(run_loop.run_state().consecutive_failures, 0);
}

#[tokio::test]
async fn success_between_failures_resets_the_ceiling() {
    let config = test_config();
    let platform = MockPlatform::new()
        .fail_new_posts(5, transport())
        .pass_new_posts(1)
        .fail_new_posts(5, transport());
    let mut run_loop = RunLoop::new(&platform, &config);

    for _ in 0..5 {
        run_loop.iterate().await.unwrap();
    }
    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
    for attempt in 1..=5u32 {
        assert_eq!(run_loop.iterate().await.unwrap(), config.error_sleep * attempt);
    }
    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
    assert_ne!(run_loop.state(), LoopState::Aborted);
}

#[tokio::test]
async fn run_returns_the_error_that_ended_it() {
    let mut config = test_config();
    config.error_sleep = Duration::ZERO;
    let platform = MockPlatform::new().fail_new_posts(10, transport());

    let err = RunLoop::new(&platform, &config).run().await.unwrap_err();
    assert!(matches!(err, ScoutError::Platform(PlatformError::Transport(_))));
    assert_eq!(
        platform.page_requests(),
        MAX_CONSECUTIVE_FAILURES + 1
    );
}

#[tokio::test]
async fn unrecoverable_error_ends_run_without_retry() {
    let config = test_config();
    let platform =
        MockPlatform::new().fail_new_posts(1, PlatformError::Other("invalid_grant".into()));

    let err = RunLoop::new(&platform, &config).run().await.unwrap_err();
    assert!(!err.is_recoverable());
    assert_eq!(platform.page_requests(), 1);
}

#[tokio::test]
async fn blocked_candidate_does_not_end_the_run() {
    let config = test_config();
    let platform = MockPlatform::new()
        .with_posts(vec![post_at("p1", Utc::now() - chrono::Duration::hours(1))])
        .on_comments("p1", &["r/blocked r/zoos"])
        .on_subreddit_error(
            "blocked",
            classify(RedditError::Api {
                status: 451,
                message: "unavailable for legal reasons".into(),
            }),
        )
        .on_subreddit(public_subreddit("zoos", "Zoos of the world"));
    let mut run_loop = RunLoop::new(&platform, &config);

    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
    assert_ne!(run_loop.state(), LoopState::Aborted);
    let sent = platform.sent_messages();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].body.contains("* /r/zoos"));
}

#[tokio::test]
async fn stale_token_is_retried_not_fatal() {
    let config = test_config();
    let platform = MockPlatform::new().fail_new_posts(
        1,
        classify(RedditError::Unauthorized("/r/findareddit/new: expired".into())),
    );
    let mut run_loop = RunLoop::new(&platform, &config);

    assert_eq!(run_loop.iterate().await.unwrap(), config.error_sleep);
    assert_eq!(run_loop.iterate().await.unwrap(), config.sleep_time);
}

//! Out-of-order completion races against the agent's generation guard,
//! using real spawned builds.

use std::time::Duration;

use atmos_globe::app::agent::{Accepted, Agent, BuildError, Outcome};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

async fn recv(rx: &mut mpsc::Receiver<Outcome<u32>>) -> Outcome<u32> {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for an outcome")
        .expect("channel closed")
}

#[tokio::test]
async fn slow_stale_build_cannot_overwrite_fresh_value() {
    let mut agent: Agent<u32> = Agent::new();
    let (tx, mut rx) = mpsc::channel(8);

    agent.submit(tx.clone(), |o| o, |_token| async {
        sleep(Duration::from_millis(80)).await;
        Ok(1)
    });
    agent.submit(tx.clone(), |o| o, |_token| async {
        sleep(Duration::from_millis(5)).await;
        Ok(2)
    });

    // Fast second build lands first and publishes.
    let first = recv(&mut rx).await;
    assert!(matches!(
        agent.accept(first),
        Accepted::Published { previous: None }
    ));
    assert_eq!(agent.value(), Some(&2));

    // The superseded slow build completes later and must be dropped.
    let second = recv(&mut rx).await;
    assert!(matches!(agent.accept(second), Accepted::Discarded));
    assert_eq!(agent.value(), Some(&2));
}

#[tokio::test]
async fn resubmission_cancels_the_inflight_build() {
    let mut agent: Agent<u32> = Agent::new();
    let (tx, mut rx) = mpsc::channel(8);

    agent.submit(tx.clone(), |o| o, |token| async move {
        // Cooperative builder: waits out its token, then reports.
        for _ in 0..100 {
            if token.requested() {
                return Err(BuildError::Cancelled);
            }
            sleep(Duration::from_millis(5)).await;
        }
        Ok(1)
    });
    agent.submit(tx.clone(), |o| o, |_token| async { Ok(2) });

    let mut published = None;
    for _ in 0..2 {
        let outcome = recv(&mut rx).await;
        if let Accepted::Published { .. } = agent.accept(outcome) {
            published = agent.value().copied();
        }
    }
    assert_eq!(published, Some(2));
    assert!(!agent.in_flight());
}

#[tokio::test]
async fn explicit_cancel_publishes_nothing() {
    let mut agent: Agent<u32> = Agent::new();
    let (tx, mut rx) = mpsc::channel(8);

    agent.submit(tx.clone(), |o| o, |token| async move {
        loop {
            if token.requested() {
                return Err(BuildError::Cancelled);
            }
            sleep(Duration::from_millis(5)).await;
        }
    });
    agent.cancel();

    let outcome = recv(&mut rx).await;
    assert!(matches!(agent.accept(outcome), Accepted::Discarded));
    assert_eq!(agent.value(), None);
}

#[tokio::test]
async fn rejection_surfaces_reason_but_keeps_previous() {
    let mut agent: Agent<u32> = Agent::new();
    let (tx, mut rx) = mpsc::channel(8);

    agent.submit(tx.clone(), |o| o, |_token| async { Ok(7) });
    let outcome = recv(&mut rx).await;
    assert!(matches!(agent.accept(outcome), Accepted::Published { .. }));

    agent.submit(tx.clone(), |o| o, |_token| async {
        Err(BuildError::Rejected("no such level".into()))
    });
    let outcome = recv(&mut rx).await;
    match agent.accept(outcome) {
        Accepted::Rejected(reason) => assert_eq!(reason, "no such level"),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(agent.value(), Some(&7));
}

//! Transform coordination through the session boundary
//!
//! Tests cover:
//! - Single-flight rejection while a transform is pending
//! - Stale results after a reset or close
//! - Provider failures and empty streams
//! - Cancellation followed by a new submit
//! - Progressive refinements
//! - Panicking providers

use super::support::{buf, gated_session, PanickingProvider, StubDecoder};
use eraser::{
    DiscardReason, EditError, EditSession, ImageState, ProviderError, Settled, TransformOp,
    TransformStatus,
};
use std::sync::Arc;
use std::time::Duration;

const OP: TransformOp = TransformOp::AutoRemoveBackground;

fn snapshot(states: &[ImageState]) -> Vec<ImageState> {
    states.to_vec()
}

fn same(a: &[ImageState], b: &[ImageState]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_state(y))
}

#[tokio::test]
async fn test_submit_while_pending_is_busy() {
    let (mut session, _provider, gates) = gated_session(1);
    let mut gates = gates.into_iter();
    session.open(buf(1));
    let result_image = buf(2);

    let first = session.apply_transform(OP).unwrap();
    let past = snapshot(session.history().past());
    let redo = snapshot(session.history().redo_stack());

    let err = session.apply_transform(OP).unwrap_err();
    assert!(matches!(err, EditError::TransformBusy { request_id } if request_id == first));
    assert!(same(session.history().past(), &past));
    assert!(same(session.history().redo_stack(), &redo));

    gates
        .next()
        .unwrap()
        .send(Ok(vec![result_image.clone()]))
        .unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert_eq!(settled.request_id(), first);
    assert!(settled.is_applied());
    assert!(session.current().unwrap().same_buffer(&result_image));
    assert_eq!(session.history().depth(), 2);
    assert!(!session.is_transform_pending());
}

#[tokio::test]
async fn test_completion_after_reset_is_discarded() {
    let (mut session, _provider, gates) = gated_session(1);
    let mut gates = gates.into_iter();
    session.open(buf(1));
    let g0 = session.generation();

    let id = session.apply_transform(OP).unwrap();
    let x = buf(9);
    session.open(x.clone());
    assert!(session.generation() > g0);

    gates.next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(matches!(
        settled,
        Settled::Discarded {
            request_id,
            reason: DiscardReason::Superseded,
        } if request_id == id
    ));
    assert_eq!(session.history().depth(), 1);
    assert!(session.current().unwrap().same_buffer(&x));
    assert!(!session.is_transform_pending());
}

#[tokio::test]
async fn test_completion_after_revert_to_floor_is_discarded() {
    let (mut session, _provider, gates) = gated_session(2);
    let mut gates = gates.into_iter();
    let a = buf(1);
    session.open(a.clone());

    session.apply_transform(OP).unwrap();
    gates.next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    session.next_settled().await.unwrap().unwrap();
    assert_eq!(session.history().depth(), 2);

    session.apply_transform(OP).unwrap();
    session.reset().unwrap();
    gates.next().unwrap().send(Ok(vec![buf(3)])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(!settled.is_applied());
    assert_eq!(session.history().depth(), 1);
    assert!(session.current().unwrap().same_buffer(&a));
}

#[tokio::test]
async fn test_provider_failure_leaves_history_unchanged() {
    let (mut session, _provider, gates) = gated_session(2);
    let mut gates = gates.into_iter();
    session.open(buf(1));
    let past = snapshot(session.history().past());

    session.apply_transform(OP).unwrap();
    gates
        .next()
        .unwrap()
        .send(Err(ProviderError::Failed("segmentation crashed".to_string())))
        .unwrap();
    let result = session.next_settled().await.unwrap();
    assert!(matches!(
        result,
        Err(EditError::TransformFailed(ref reason)) if reason.contains("segmentation crashed")
    ));
    assert!(same(session.history().past(), &past));
    assert!(!session.is_transform_pending());

    // The slot is free again.
    session.apply_transform(OP).unwrap();
    gates.next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    assert!(session.next_settled().await.unwrap().unwrap().is_applied());
}

#[tokio::test]
async fn test_empty_stream_is_a_failure() {
    let (mut session, _provider, gates) = gated_session(1);
    session.open(buf(1));

    session.apply_transform(OP).unwrap();
    gates.into_iter().next().unwrap().send(Ok(Vec::new())).unwrap();
    let result = session.next_settled().await.unwrap();
    assert!(matches!(
        result,
        Err(EditError::TransformFailed(ref reason)) if reason.contains("no result")
    ));
    assert_eq!(session.history().depth(), 1);
}

#[tokio::test]
async fn test_cancel_then_resubmit_discards_abandoned_result() {
    let (mut session, provider, gates) = gated_session(2);
    let mut gates = gates.into_iter();
    session.open(buf(1));

    let first = session.apply_transform(OP).unwrap();
    provider.wait_for_calls(1).await;
    assert_eq!(session.cancel_transform(), Some(first));
    assert!(!session.is_transform_pending());

    let second = session.apply_transform(OP).unwrap();
    assert_ne!(first, second);
    provider.wait_for_calls(2).await;

    gates.next().unwrap().send(Ok(vec![buf(50)])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(matches!(
        settled,
        Settled::Discarded {
            reason: DiscardReason::Abandoned,
            ..
        }
    ));
    assert_eq!(settled.request_id(), first);
    assert_eq!(session.history().depth(), 1);
    assert!(session.is_transform_pending());

    let wanted = buf(60);
    gates.next().unwrap().send(Ok(vec![wanted.clone()])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert_eq!(settled.request_id(), second);
    assert!(session.current().unwrap().same_buffer(&wanted));
}

#[tokio::test]
async fn test_close_abandons_pending_transform() {
    let (mut session, _provider, gates) = gated_session(1);
    session.open(buf(1));

    session.apply_transform(OP).unwrap();
    session.close();
    assert!(matches!(session.current(), Err(EditError::NoImageSelected)));

    gates.into_iter().next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(!settled.is_applied());
    assert!(!session.history().is_initialized());
    assert!(session.next_settled().await.is_none());
}

#[tokio::test]
async fn test_refinements_are_progress_only() {
    let (mut session, _provider, gates) = gated_session(1);
    let mut progress = session.progress();
    session.open(buf(1));

    let (p1, p2, last) = (buf(10), buf(20), buf(30));
    let id = session.apply_transform(OP).unwrap();
    gates
        .into_iter()
        .next()
        .unwrap()
        .send(Ok(vec![p1.clone(), p2.clone(), last.clone()]))
        .unwrap();
    session.next_settled().await.unwrap().unwrap();

    let first = progress.recv().await.unwrap();
    let second = progress.recv().await.unwrap();
    assert_eq!((first.request_id, first.step), (id, 1));
    assert_eq!((second.request_id, second.step), (id, 2));
    assert!(first.preview.same_buffer(&p1));
    assert!(second.preview.same_buffer(&p2));
    assert!(progress.try_recv().is_err());

    assert_eq!(session.history().depth(), 2);
    assert!(session.current().unwrap().same_buffer(&last));
}

#[tokio::test]
async fn test_try_settle_polls_without_blocking() {
    let (mut session, provider, gates) = gated_session(1);
    session.open(buf(1));

    session.apply_transform(OP).unwrap();
    provider.wait_for_calls(1).await;
    assert!(session.try_settle().is_none());

    gates.into_iter().next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    let settled = loop {
        if let Some(result) = session.try_settle() {
            break result.unwrap();
        }
        tokio::task::yield_now().await;
    };
    assert!(settled.is_applied());
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_and_abandons() {
    let (session, _provider, gates) = gated_session(1);
    let mut session = session.with_transform_timeout(Some(std::time::Duration::from_secs(5)));
    session.open(buf(1));

    let result = session.apply_transform_and_wait(OP).await;
    assert!(matches!(
        result,
        Err(EditError::TransformFailed(ref reason)) if reason.contains("timed out")
    ));
    assert!(!session.is_transform_pending());
    assert_eq!(session.history().depth(), 1);

    // A late answer is dropped.
    gates.into_iter().next().unwrap().send(Ok(vec![buf(2)])).unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(!settled.is_applied());
    assert_eq!(session.history().depth(), 1);
}

#[tokio::test]
async fn test_panicking_provider_fails_and_frees_slot() {
    let mut session = EditSession::new(
        Arc::new(StubDecoder::default()),
        Arc::new(PanickingProvider),
    );
    session.open(buf(1));

    session.apply_transform(OP).unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), session.next_settled())
        .await
        .expect("completion must arrive after a provider panic")
        .unwrap();
    assert!(matches!(
        result,
        Err(EditError::TransformFailed(ref reason)) if reason.contains("segmentation model exploded")
    ));
    assert!(!session.is_transform_pending());
    assert!(session.transform_status().is_none());
    assert_eq!(session.history().depth(), 1);

    // The slot is free again, and waiting does not hang.
    let result = session.apply_transform_and_wait(OP).await;
    assert!(matches!(result, Err(EditError::TransformFailed(_))));
    assert!(session.next_settled().await.is_none());
}

#[tokio::test]
async fn test_failure_after_reset_is_discarded() {
    let (mut session, _provider, gates) = gated_session(1);
    session.open(buf(1));

    let id = session.apply_transform(OP).unwrap();
    assert_eq!(session.transform_status(), Some(TransformStatus::Pending));
    session.open(buf(9));

    gates
        .into_iter()
        .next()
        .unwrap()
        .send(Err(ProviderError::Failed("segmentation crashed".to_string())))
        .unwrap();
    let settled = session.next_settled().await.unwrap().unwrap();
    assert!(matches!(
        settled,
        Settled::Discarded {
            request_id,
            reason: DiscardReason::Superseded,
        } if request_id == id
    ));
    assert_eq!(session.history().depth(), 1);
    assert!(session.transform_status().is_none());
}

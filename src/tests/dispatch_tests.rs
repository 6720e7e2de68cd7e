use super::support::CountingProbe;
use crate::detection::{
    CompletionJob, DetectionRequest, Detector, Inline, IpResult, IpSource, Strategy, Tiers,
};
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use std::sync::{mpsc, Arc};
use std::time::Duration;
use tokio::runtime::Handle;

fn natpmp_detector() -> Arc<Detector> {
    let found = IpResult::found("203.0.113.45".parse::<IpAddr>().unwrap(), IpSource::NATPMP);
    let fail = || IpResult::failed("down");

    Arc::new(Detector::with_tiers(Tiers {
        local_ipv6: Box::new(CountingProbe::new("Local IPv6", fail()).0),
        natpmp: Box::new(CountingProbe::new("NAT-PMP", found).0),
        pcp: Box::new(CountingProbe::new("PCP", fail()).0),
        upnp: Box::new(CountingProbe::new("UPnP", fail()).0),
        stun: Box::new(CountingProbe::new("STUN", fail()).0),
        api: Box::new(CountingProbe::new("HTTP API", fail()).0),
    }))
}

#[tokio::test]
async fn test_detect_async() {
    let result = natpmp_detector()
        .detect_async(DetectionRequest::default())
        .await;

    assert!(result.is_success());
    assert_eq!(result.address(), "203.0.113.45");
}

#[tokio::test]
async fn test_detect_async_failure() {
    let (stun, stun_calls) = CountingProbe::new("STUN", IpResult::failed("stun down"));
    let fail = || Box::new(CountingProbe::new("tier", IpResult::failed("down")).0);
    let detector = Arc::new(Detector::with_tiers(Tiers {
        local_ipv6: fail(),
        natpmp: fail(),
        pcp: fail(),
        upnp: fail(),
        stun: Box::new(stun),
        api: fail(),
    }));

    let result = detector
        .detect_async(DetectionRequest {
            strategy: Strategy::LocalOnly,
            ..DetectionRequest::default()
        })
        .await;

    assert!(!result.is_success());
    assert_eq!(stun_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_callback_on_runtime_handle() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let handle = Handle::current();

    natpmp_detector().detect_with_callback(
        &handle,
        DetectionRequest::default(),
        handle.clone(),
        move |result| {
            let _ = tx.send(result);
        },
    );

    let result = tokio::time::timeout(Duration::from_secs(5), rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(result.source(), IpSource::NATPMP);
}

#[tokio::test]
async fn test_callback_inline() {
    let (tx, rx) = tokio::sync::oneshot::channel();

    let task = natpmp_detector().detect_with_callback(
        &Handle::current(),
        DetectionRequest::default(),
        Inline,
        move |result| {
            let _ = tx.send(result.address().to_string());
        },
    );

    task.await.unwrap();
    assert_eq!(rx.await.unwrap(), "203.0.113.45");
}

#[test]
fn test_callback_through_completion_queue() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let (queue_tx, queue_rx) = mpsc::channel::<CompletionJob>();
    let (result_tx, result_rx) = mpsc::channel();
    let caller = std::thread::current().id();

    natpmp_detector().detect_with_callback(
        runtime.handle(),
        DetectionRequest::default(),
        queue_tx,
        move |result| {
            result_tx.send((result, std::thread::current().id())).unwrap();
        },
    );

    // Nothing runs until this thread drains the queue
    let job = queue_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(result_rx.try_recv().is_err());
    job();

    let (result, thread) = result_rx.recv().unwrap();
    assert!(result.is_success());
    assert_eq!(thread, caller);
}

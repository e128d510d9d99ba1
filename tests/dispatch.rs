use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use evdispatch::transport::{self, ChannelTransport};
use evdispatch::{
    Ambient, CloseReason, ConnectionContext, DecodeError, DispatchError, Dispatcher,
    DispatcherConfig, Event, EventKind, FnCodec, Frame, HandlerError, HandlerFn, HandlerRef,
    Outbound, Subscribe, Transport, TransportError,
};
use tokio::sync::{Semaphore, broadcast, mpsc};
use tokio::time;

type TextCodec = FnCodec<fn(&Frame) -> Result<(String, String), DecodeError>>;
type Log = Arc<Mutex<Vec<String>>>;

/// "event:payload" text frames.
fn decode_text(frame: &Frame) -> Result<(String, String), DecodeError> {
    let text = frame
        .as_text()
        .ok_or_else(|| DecodeError::new("binary frame"))?;
    let (event, payload) = text
        .split_once(':')
        .ok_or_else(|| DecodeError::new("missing ':'"))?;
    Ok((event.to_string(), payload.to_string()))
}

fn codec() -> TextCodec {
    FnCodec::new(decode_text as fn(&Frame) -> Result<(String, String), DecodeError>)
}

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn record(log: &Log) -> HandlerRef<String> {
    let log = log.clone();
    HandlerFn::arc("record", move |_ctx: Arc<ConnectionContext>, p: String| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(p);
            Ok::<(), HandlerError>(())
        }
    })
}

async fn serve(
    d: &Dispatcher<TextCodec>,
    t: ChannelTransport,
) -> Result<CloseReason, DispatchError> {
    time::timeout(Duration::from_secs(5), d.accept(t, Ambient::new()))
        .await
        .expect("accept did not return in time")
}

fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut out = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(ev) => out.push(ev),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    out
}

fn count(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test]
async fn same_event_messages_arrive_in_transport_order() {
    let a = log();
    let d = Dispatcher::builder(codec()).on("a", record(&a)).build().unwrap();

    let (t, mut peer) = transport::channel();
    for i in 0..200 {
        peer.send_text(format!("a:{i}"));
    }
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    let expected: Vec<String> = (0..200).map(|i| i.to_string()).collect();
    assert_eq!(entries(&a), expected);
}

#[tokio::test]
async fn interleaved_events_progress_independently() {
    let a = log();
    let b = log();
    let gate = Arc::new(Semaphore::new(0));

    // "a" can only make progress once "b" has handled something.
    let (a_log, a_gate) = (a.clone(), gate.clone());
    let (b_log, b_gate) = (b.clone(), gate.clone());
    let d = Dispatcher::builder(codec())
        .on_fn("a", move |_ctx, p| {
            let (log, gate) = (a_log.clone(), a_gate.clone());
            async move {
                let permit = gate.acquire().await.map_err(|e| HandlerError::fail(e.to_string()))?;
                permit.forget();
                log.lock().unwrap().push(p);
                Ok::<(), HandlerError>(())
            }
        })
        .on_fn("b", move |_ctx, p| {
            let (log, gate) = (b_log.clone(), b_gate.clone());
            async move {
                log.lock().unwrap().push(p);
                gate.add_permits(1);
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();

    let (t, mut peer) = transport::channel();
    for f in ["a:1", "b:1", "a:2", "b:2"] {
        peer.send_text(f);
    }
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(entries(&a), vec!["1", "2"]);
    assert_eq!(entries(&b), vec!["1", "2"]);
}

#[tokio::test]
async fn failing_handler_does_not_block_its_event_or_others() {
    let a = log();
    let b = log();
    let a_log = a.clone();
    let d = Dispatcher::builder(codec())
        .on_fn("a", move |_ctx, p: String| {
            let log = a_log.clone();
            async move {
                if p == "err" {
                    return Err(HandlerError::fail("rejected"));
                }
                if p == "severe" {
                    return Err(HandlerError::severe("broken"));
                }
                if p == "panic" {
                    panic!("handler blew up");
                }
                log.lock().unwrap().push(p);
                Ok(())
            }
        })
        .on("b", record(&b))
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    for f in ["a:1", "a:err", "b:x", "a:panic", "a:2", "a:severe", "b:y", "a:3"] {
        peer.send_text(f);
    }
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(entries(&a), vec!["1", "2", "3"]);
    assert_eq!(entries(&b), vec!["x", "y"]);

    let events = drain(&mut bus);
    assert_eq!(count(&events, EventKind::HandlerFailed), 2);
    assert_eq!(count(&events, EventKind::HandlerPanicked), 1);
    let panicked = events
        .iter()
        .find(|e| e.kind == EventKind::HandlerPanicked)
        .unwrap();
    assert_eq!(panicked.event_name.as_deref(), Some("a"));
    assert_eq!(panicked.reason.as_deref(), Some("handler blew up"));
}

#[tokio::test]
async fn unparsable_and_unrouted_frames_are_dropped() {
    let a = log();
    let d = Dispatcher::builder(codec()).on("a", record(&a)).build().unwrap();
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    peer.send_text("no separator");
    peer.send(Frame::binary(vec![0u8, 1, 2]));
    peer.send_text("zzz:nobody");
    peer.send_text("a:ok");
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(entries(&a), vec!["ok"]);

    let events = drain(&mut bus);
    assert_eq!(count(&events, EventKind::DecodeFailed), 2);
    let unrouted: Vec<_> = events
        .iter()
        .filter(|e| e.kind == EventKind::EventUnrouted)
        .collect();
    assert_eq!(unrouted.len(), 1);
    assert_eq!(unrouted[0].event_name.as_deref(), Some("zzz"));
}

#[tokio::test]
async fn transport_close_terminates_every_worker() {
    let a = log();
    let b = log();
    let d = Dispatcher::builder(codec())
        .on("a", record(&a))
        .on("b", record(&b))
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    for i in 1..=3 {
        peer.send_text(format!("a:{i}"));
    }
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(entries(&a), vec!["1", "2", "3"]);
    assert!(entries(&b).is_empty());
    assert_eq!(d.active_connections(), 0);

    let events = drain(&mut bus);
    let mut stopped: Vec<(String, u64)> = events
        .iter()
        .filter(|e| e.kind == EventKind::WorkerStopped)
        .map(|e| {
            (
                e.event_name.as_deref().unwrap_or_default().to_string(),
                e.handled.unwrap_or_default(),
            )
        })
        .collect();
    stopped.sort();
    assert_eq!(stopped, vec![("a".to_string(), 3), ("b".to_string(), 0)]);

    let closed = events
        .iter()
        .find(|e| e.kind == EventKind::ConnectionClosed)
        .unwrap();
    assert_eq!(closed.reason.as_deref(), Some("closed"));
    // Nothing of the connection runs after accept returned.
    let last = events.last().unwrap();
    assert_eq!(last.kind, EventKind::ConnectionClosed);
}

#[tokio::test]
async fn transport_failure_closes_the_connection() {
    let a = log();
    let d = Dispatcher::builder(codec()).on("a", record(&a)).build().unwrap();

    let (t, mut peer) = transport::channel();
    peer.send_text("a:before");
    peer.fail(evdispatch::TransportError::Protocol {
        error: "bad frame".into(),
    });

    let reason = serve(&d, t).await.unwrap();
    assert_eq!(reason.as_label(), "failed");
    assert_eq!(entries(&a), vec!["before"]);
}

#[tokio::test]
async fn repeated_lifecycles_are_independent() {
    let ids = log();
    let seen = log();
    let (ids_h, seen_h) = (ids.clone(), seen.clone());
    let d = Dispatcher::builder(codec())
        .on_fn("a", move |ctx: Arc<ConnectionContext>, p: String| {
            let (ids, seen) = (ids_h.clone(), seen_h.clone());
            async move {
                ids.lock().unwrap().push(ctx.id().to_string());
                let who = ctx.ambient().identity().unwrap_or("anon").to_string();
                seen.lock().unwrap().push(format!("{who}:{p}"));
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();

    for (user, n) in [("alice", 2), ("bob", 1)] {
        let (t, mut peer) = transport::channel();
        for i in 0..n {
            peer.send_text(format!("a:{i}"));
        }
        peer.close();
        let reason = time::timeout(
            Duration::from_secs(5),
            d.accept(t, Ambient::new().with_identity(user)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(reason, CloseReason::Closed);
    }

    assert_eq!(entries(&seen), vec!["alice:0", "alice:1", "bob:0"]);
    let ids = entries(&ids);
    assert_eq!(ids[0], ids[1]);
    assert_ne!(ids[1], ids[2]);
    assert_eq!(d.active_connections(), 0);
}

#[tokio::test]
async fn handlers_reply_through_the_context() {
    let d = Dispatcher::builder(codec())
        .on_fn("echo", |ctx: Arc<ConnectionContext>, p: String| async move {
            ctx.send(Frame::text(format!("echo:{p}")))
                .await
                .map_err(|e| HandlerError::fail(e.to_string()))?;
            Ok::<(), HandlerError>(())
        })
        .build()
        .unwrap();

    let (t, mut peer) = transport::channel();
    peer.send_text("echo:hi");
    peer.send_text("echo:there");
    peer.close();

    serve(&d, t).await.unwrap();
    assert_eq!(peer.recv().await, Some(Frame::text("echo:hi")));
    assert_eq!(peer.recv().await, Some(Frame::text("echo:there")));
    assert_eq!(peer.recv().await, None);
}

#[tokio::test]
async fn shutdown_ends_live_connections_and_rejects_new_ones() {
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel::<String>();
    let d = Dispatcher::builder(codec())
        .on_fn("a", move |_ctx, p: String| {
            let seen = seen_tx.clone();
            async move {
                let _ = seen.send(p);
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();

    let (t, peer) = transport::channel();
    peer.send_text("a:1");
    let d2 = d.clone();
    let serving = tokio::spawn(async move { d2.accept(t, Ambient::new()).await });

    assert_eq!(seen_rx.recv().await.as_deref(), Some("1"));
    assert_eq!(d.active_connections(), 1);

    let mut bus = d.subscribe();
    d.shutdown();
    d.shutdown();
    assert!(d.is_shut_down());

    let reason = time::timeout(Duration::from_secs(5), serving)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reason, CloseReason::Shutdown);
    assert_eq!(d.active_connections(), 0);
    assert_eq!(count(&drain(&mut bus), EventKind::ShutdownRequested), 1);

    let (t, _peer) = transport::channel();
    assert!(matches!(
        d.accept(t, Ambient::new()).await,
        Err(DispatchError::ShutDown)
    ));
    drop(peer);
}

#[tokio::test]
async fn context_close_ends_only_that_connection() {
    let a = log();
    let d = Dispatcher::builder(codec())
        .on("a", record(&a))
        .on_fn("bye", |ctx: Arc<ConnectionContext>, _p: String| async move {
            ctx.close();
            assert!(ctx.is_closing());
            Ok::<(), HandlerError>(())
        })
        .build()
        .unwrap();

    let (t, peer) = transport::channel();
    peer.send_text("a:1");
    peer.send_text("bye:now");

    // The peer never closes; the handler does.
    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Local);
    assert_eq!(entries(&a), vec!["1"]);
    assert!(!d.is_shut_down());

    let (t, mut other) = transport::channel();
    other.send_text("a:2");
    other.close();
    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(entries(&a), vec!["1", "2"]);
    drop(peer);
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn hanging_handler_is_aborted_after_grace() {
    let aborted = Arc::new(AtomicBool::new(false));
    let fast = log();
    let flag = aborted.clone();
    let d = Dispatcher::builder(codec())
        .with_config(DispatcherConfig {
            grace: Duration::from_millis(100),
            ..DispatcherConfig::default()
        })
        .on_fn("slow", move |_ctx, _p: String| {
            let guard = DropFlag(flag.clone());
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
                Ok::<(), HandlerError>(())
            }
        })
        .on("fast", record(&fast))
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    peer.send_text("slow:1");
    peer.send_text("fast:1");
    peer.close();

    match serve(&d, t).await {
        Err(DispatchError::GraceExceeded { stuck, grace, .. }) => {
            assert_eq!(stuck, vec!["slow".to_string()]);
            assert_eq!(grace, Duration::from_millis(100));
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
    assert!(aborted.load(Ordering::SeqCst));
    assert_eq!(entries(&fast), vec!["1"]);
    assert_eq!(d.active_connections(), 0);

    let events = drain(&mut bus);
    assert_eq!(count(&events, EventKind::GraceExceeded), 1);
    assert_eq!(count(&events, EventKind::ConnectionClosed), 1);
}

#[tokio::test]
async fn bounded_queue_drops_overflow() {
    let a = log();
    let gate = Arc::new(Semaphore::new(0));
    let (a_log, a_gate) = (a.clone(), gate.clone());
    let d = Dispatcher::builder(codec())
        .with_config(DispatcherConfig {
            queue_capacity: 1,
            ..DispatcherConfig::default()
        })
        .on_fn("a", move |_ctx, p: String| {
            let (log, gate) = (a_log.clone(), a_gate.clone());
            async move {
                let _permit = gate.acquire().await.map_err(|e| HandlerError::fail(e.to_string()))?;
                log.lock().unwrap().push(p);
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    for i in 0..5 {
        peer.send_text(format!("a:{i}"));
    }
    peer.close();

    let releaser = {
        let gate = gate.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            gate.add_permits(16);
        })
    };

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    releaser.await.unwrap();

    let handled = entries(&a);
    let overflow = count(&drain(&mut bus), EventKind::QueueOverflow);
    assert!(overflow >= 3, "overflow = {overflow}");
    assert_eq!(handled.len() + overflow, 5);
    assert_eq!(handled.first().map(String::as_str), Some("0"));
}

#[tokio::test]
async fn zero_route_dispatcher_discards_everything() {
    let d = Dispatcher::builder(codec()).build().unwrap();
    assert!(d.event_names().is_empty());
    let mut bus = d.subscribe();

    let (t, mut peer) = transport::channel();
    peer.send_text("a:1");
    peer.send_text("b:2");
    peer.close();

    assert_eq!(serve(&d, t).await.unwrap(), CloseReason::Closed);
    assert_eq!(count(&drain(&mut bus), EventKind::EventUnrouted), 2);
}

#[tokio::test]
async fn registration_mistakes_fail_the_build() {
    let a = log();
    let err = Dispatcher::builder(codec())
        .on("a", record(&a))
        .on("a", record(&a))
        .build()
        .err()
        .unwrap();
    assert_eq!(err.as_label(), "build_duplicate_event");

    let err = Dispatcher::builder(codec())
        .on("", record(&a))
        .build()
        .err()
        .unwrap();
    assert_eq!(err.as_label(), "build_empty_event_name");
}

#[derive(Default)]
struct Kinds(Mutex<Vec<EventKind>>);

#[async_trait]
impl Subscribe for Kinds {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "kinds"
    }
}

#[tokio::test]
async fn subscribers_receive_runtime_events() {
    let kinds = Arc::new(Kinds::default());
    let a = log();
    let d = Dispatcher::builder(codec())
        .on("a", record(&a))
        .with_subscribers(vec![kinds.clone()])
        .build()
        .unwrap();

    let (t, mut peer) = transport::channel();
    peer.send_text("garbage");
    peer.send_text("a:1");
    peer.close();
    serve(&d, t).await.unwrap();
    d.close_subscribers().await;

    assert_eq!(
        *kinds.0.lock().unwrap(),
        vec![
            EventKind::ConnectionOpened,
            EventKind::DecodeFailed,
            EventKind::WorkerStopped,
            EventKind::ConnectionClosed,
        ]
    );
}

struct AlwaysPanics(AtomicUsize);

#[async_trait]
impl Subscribe for AlwaysPanics {
    async fn on_event(&self, _ev: &Event) {
        self.0.fetch_add(1, Ordering::SeqCst);
        panic!("subscriber down");
    }

    fn name(&self) -> &'static str {
        "always-panics"
    }
}

#[tokio::test]
async fn subscriber_panic_is_reported_once() {
    let panics = Arc::new(AlwaysPanics(AtomicUsize::new(0)));
    let kinds = Arc::new(Kinds::default());
    let d = Dispatcher::builder(codec())
        .with_subscribers(vec![panics.clone(), kinds.clone()])
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    d.shutdown();
    time::sleep(Duration::from_millis(200)).await;
    d.close_subscribers().await;

    // ShutdownRequested, then the report of that panic; nothing after.
    assert_eq!(panics.0.load(Ordering::SeqCst), 2);
    assert_eq!(
        *kinds.0.lock().unwrap(),
        vec![EventKind::ShutdownRequested, EventKind::SubscriberPanicked]
    );
    let events = drain(&mut bus);
    assert_eq!(count(&events, EventKind::SubscriberPanicked), 1);
    assert_eq!(events.len(), 2);
}

/// Hands out its frames, then panics inside `recv`.
struct ExplodingTransport {
    frames: Vec<Frame>,
    inner: ChannelTransport,
}

#[async_trait]
impl Transport for ExplodingTransport {
    async fn recv(&mut self) -> Result<Option<Frame>, TransportError> {
        if self.frames.is_empty() {
            panic!("transport exploded");
        }
        Ok(Some(self.frames.remove(0)))
    }

    fn outbound(&self) -> Arc<dyn Outbound> {
        self.inner.outbound()
    }
}

#[tokio::test]
async fn receive_loop_panic_faults_the_connection() {
    let a = log();
    let d = Dispatcher::builder(codec())
        .on("a", record(&a))
        .on("b", record(&log()))
        .build()
        .unwrap();
    let mut bus = d.subscribe();

    let (inner, _peer) = transport::channel();
    let t = ExplodingTransport {
        frames: vec![Frame::text("a:1")],
        inner,
    };
    let reason = time::timeout(Duration::from_secs(5), d.accept(t, Ambient::new()))
        .await
        .expect("accept did not return in time")
        .unwrap();

    assert_eq!(
        reason,
        CloseReason::Faulted {
            info: "transport exploded".into()
        }
    );
    assert_eq!(reason.as_label(), "faulted");
    assert_eq!(entries(&a), vec!["1"]);
    assert_eq!(d.active_connections(), 0);

    let events = drain(&mut bus);
    assert_eq!(count(&events, EventKind::WorkerStopped), 2);
    assert_eq!(count(&events, EventKind::GraceExceeded), 0);
    let closed = events
        .iter()
        .find(|e| e.kind == EventKind::ConnectionClosed)
        .unwrap();
    assert!(closed.reason.as_deref().unwrap().contains("transport exploded"));
}

#[tokio::test]
async fn dropping_accept_aborts_the_connection() {
    let dropped = Arc::new(AtomicBool::new(false));
    let started = Arc::new(Semaphore::new(0));
    let (flag, started_tx) = (dropped.clone(), started.clone());
    let d = Dispatcher::builder(codec())
        .on_fn("slow", move |_ctx, _p: String| {
            let guard = DropFlag(flag.clone());
            let started = started_tx.clone();
            async move {
                let _guard = guard;
                started.add_permits(1);
                std::future::pending::<()>().await;
                Ok::<(), HandlerError>(())
            }
        })
        .build()
        .unwrap();

    let (t, peer) = transport::channel();
    peer.send_text("slow:1");

    let mut serving = Box::pin(d.accept(t, Ambient::new()));
    tokio::select! {
        _ = &mut serving => panic!("accept returned while the handler hangs"),
        permit = started.acquire() => permit.unwrap().forget(),
    }
    assert_eq!(d.active_connections(), 1);
    drop(serving);
    assert_eq!(d.active_connections(), 0);

    for _ in 0..100 {
        if dropped.load(Ordering::SeqCst) {
            break;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    assert!(dropped.load(Ordering::SeqCst));
    drop(peer);
}

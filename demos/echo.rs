//! # Echo Example
//!
//! Serves a few simulated connections with the JSON codec:
//! - `echo` replies with the same payload
//! - `shout` replies upper-cased, and fails on an empty string
//! - `bye` closes the connection from the server side
//!
//! Runtime events are printed by the built-in `LogWriter`; handler logs go
//! through `tracing` (`RUST_LOG=evdispatch=debug` for more).
//!
//! ## Run
//! ```bash
//! cargo run --example echo --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use evdispatch::transport::{self, Peer};
use evdispatch::{
    Ambient, ConnectionContext, Dispatcher, DispatcherConfig, Frame, HandlerError, JsonCodec,
    LogWriter, Subscribe,
};
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

async fn reply(ctx: &ConnectionContext, event: &str, data: Value) -> Result<(), HandlerError> {
    let frame = Frame::text(json!({ "event": event, "data": data }).to_string());
    ctx.send(frame)
        .await
        .map_err(|e| HandlerError::fail(e.to_string()))
}

async fn client(name: &'static str, mut peer: Peer, frames: Vec<Value>, hold_open: bool) {
    for f in frames {
        peer.send_text(f.to_string());
    }
    if !hold_open {
        peer.close();
    }
    while let Some(frame) = peer.recv().await {
        println!("  {name} <- {}", frame.as_text().unwrap_or("<binary>"));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("evdispatch=info")),
        )
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let dispatcher = Dispatcher::builder(JsonCodec::new())
        .with_config(DispatcherConfig {
            grace: Duration::from_secs(2),
            ..DispatcherConfig::default()
        })
        .with_subscribers(subs)
        .on_fn("echo", |ctx: Arc<ConnectionContext>, data: Value| async move {
            reply(&ctx, "echo", data).await
        })
        .on_fn("shout", |ctx: Arc<ConnectionContext>, data: Value| async move {
            let text = data.as_str().unwrap_or_default();
            if text.is_empty() {
                return Err(HandlerError::fail("nothing to shout"));
            }
            let who = ctx.ambient().identity().unwrap_or("anon");
            reply(&ctx, "shout", json!(format!("{who}: {}", text.to_uppercase()))).await
        })
        .on_fn("bye", |ctx: Arc<ConnectionContext>, _data: Value| async move {
            reply(&ctx, "bye", Value::Null).await?;
            ctx.close();
            Ok::<(), HandlerError>(())
        })
        .build()?;

    println!("events: {:?}", dispatcher.event_names());

    // alice closes her side once her frames are sent
    let (t, peer) = transport::channel();
    let alice = tokio::spawn(client(
        "alice",
        peer,
        vec![
            json!({ "event": "echo", "data": { "n": 1 } }),
            json!(["shout", "hello"]),
            json!({ "event": "shout", "data": "" }),
            json!("not an envelope"),
        ],
        false,
    ));
    let reason = dispatcher
        .accept(t, Ambient::new().with_identity("alice"))
        .await?;
    alice.await?;
    println!("alice closed: {reason}");

    // bob keeps his side open; the server ends the connection
    let (t, peer) = transport::channel();
    let bob = tokio::spawn(client(
        "bob",
        peer,
        vec![
            json!({ "event": "echo", "data": [1, 2, 3] }),
            json!({ "event": "unknown" }),
            json!({ "event": "bye" }),
        ],
        true,
    ));
    let reason = dispatcher
        .accept(t, Ambient::new().with_identity("bob"))
        .await?;
    bob.await?;
    println!("bob closed: {reason}");

    // carol stays connected until Ctrl-C
    let (t, peer) = transport::channel();
    let carol = tokio::spawn(client("carol", peer, vec![json!(["echo", "waiting"])], true));
    println!("press Ctrl-C to shut down");
    let serving = {
        let d = dispatcher.clone();
        tokio::spawn(async move { d.accept(t, Ambient::new().with_identity("carol")).await })
    };
    dispatcher.shutdown_on_signal().await?;
    let reason = serving.await??;
    carol.await?;
    println!("carol closed: {reason}");

    dispatcher.close_subscribers().await;
    Ok(())
}

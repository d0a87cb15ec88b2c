//! Shared test fixtures: an in-memory checkpoint service speaking the
//! textual slot protocol, and tracing setup.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Minimal stand-in for the external checkpoint service: one snapshot
/// slot behind the four textual commands. Connections are handled
/// strictly in accept order, so command ordering matches client call
/// order.
pub struct CheckpointStub {
    pub addr: String,
    slot: Arc<Mutex<Option<String>>>,
}

impl CheckpointStub {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let slot: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));

        let state = slot.clone();
        tokio::spawn(async move {
            loop {
                let (mut stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };

                let mut buf = Vec::new();
                let mut chunk = [0u8; 4096];
                while !buf.contains(&b'$') {
                    match stream.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                if !buf.contains(&b'$') {
                    continue;
                }

                let msg = String::from_utf8_lossy(&buf);
                let msg = msg.split('$').next().unwrap();
                let (cmd, rest) = msg.split_once(':').unwrap_or((msg, ""));
                match cmd {
                    "new" | "remove" => *state.lock().unwrap() = None,
                    "store" => *state.lock().unwrap() = Some(rest.to_string()),
                    "restore" => {
                        let body = state.lock().unwrap().clone();
                        let response = match body {
                            Some(body) => format!("{}$", body),
                            None => "$".to_string(),
                        };
                        let _ = stream.write_all(response.as_bytes()).await;
                    }
                    _ => {}
                }
            }
        });

        Self { addr, slot }
    }

    /// Raw slot contents (the store payload minus command and terminator).
    pub fn stored(&self) -> Option<String> {
        self.slot.lock().unwrap().clone()
    }

    /// Plant a payload directly, as if some earlier process stored it.
    pub fn inject(&self, payload: &str) {
        *self.slot.lock().unwrap() = Some(payload.to_string());
    }
}

/// Store commands carry no acknowledgement, so assertions on the raw
/// slot poll until the stub has drained the connection queue.
pub async fn eventually(check: impl Fn() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached within 1s");
}

pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

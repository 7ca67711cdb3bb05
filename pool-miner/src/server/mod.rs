//! Miner-facing TCP server.
//!
//! One task per connection reads newline-delimited JSON requests, runs each
//! on the blocking pool through the [`Router`], and writes the reply. The
//! same task watches the template version and pushes a `newjob`
//! notification to authenticated miners whenever it changes.
//!
//! On shutdown the listener stops accepting, idle connections exit at once,
//! and a request already being handled is allowed to finish. The server
//! waits at most the configured grace period for that.
//!
//! The session lives behind an async mutex: a handler that outlives its
//! timeout keeps holding it on the blocking pool, and the connection task
//! must never wait for it on a runtime thread.

pub mod router;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, watch};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::pool::Pool;
use crate::protocol::{NotificationEnvelope, RequestEnvelope, ResponseEnvelope, Status};
use crate::session::Session;
use crate::tracing::prelude::*;

pub use router::{Reply, Router};

const MAX_LINE_LENGTH: usize = 1 << 16;

#[derive(Debug, Clone, Copy)]
pub struct ServerOptions {
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

pub struct Server {
    pool: Arc<Pool>,
    router: Arc<Router>,
    options: ServerOptions,
}

impl Server {
    pub fn new(pool: Arc<Pool>, options: ServerOptions) -> Self {
        Self {
            pool,
            router: Arc::new(Router::new()),
            options,
        }
    }

    /// Accept connections until `shutdown` is cancelled, then drain.
    pub async fn run(self, listener: TcpListener, shutdown: CancellationToken) -> anyhow::Result<()> {
        let tracker = TaskTracker::new();
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "Pool server listening");
        }

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Miner connected");
                        let conn = Connection {
                            pool: Arc::clone(&self.pool),
                            router: Arc::clone(&self.router),
                            versions: self.pool.subscribe(),
                            request_timeout: self.options.request_timeout,
                            shutdown: shutdown.clone(),
                        };
                        tracker.spawn(conn.run(stream, peer));
                    }
                    Err(e) => warn!(error = %e, "Accept failed"),
                },
            }
        }

        drop(listener);
        tracker.close();
        info!(connections = tracker.len(), "Pool server stopping");
        if tokio::time::timeout(self.options.shutdown_grace, tracker.wait())
            .await
            .is_err()
        {
            warn!(
                remaining = tracker.len(),
                "Shutdown grace period elapsed with requests in flight"
            );
        }
        Ok(())
    }
}

struct Connection {
    pool: Arc<Pool>,
    router: Arc<Router>,
    versions: watch::Receiver<u64>,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl Connection {
    async fn run(mut self, stream: TcpStream, peer: SocketAddr) {
        let framed = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));
        let (mut sink, mut lines) = framed.split();
        let session = Arc::new(Mutex::new(Session::new(Some(peer))));

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                changed = self.versions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    if !session.lock().await.is_authenticated() {
                        continue;
                    }
                    if let Err(e) = send(&mut sink, &NotificationEnvelope::new_job()).await {
                        debug!(%peer, error = %e, "Notification failed");
                        break;
                    }
                }
                line = lines.next() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => {
                            debug!(%peer, error = %e, "Read failed");
                            break;
                        }
                        None => break,
                    };
                    if line.trim().is_empty() {
                        continue;
                    }

                    let (response, close) = self.handle(&session, &line).await;
                    if let Err(e) = send(&mut sink, &response).await {
                        debug!(%peer, error = %e, "Write failed");
                        break;
                    }
                    if close {
                        break;
                    }
                }
            }
        }

        let ended = match session.try_lock() {
            Ok(session) => {
                self.pool.end_session(&session);
                true
            }
            Err(_) => false,
        };
        if !ended {
            // A timed-out handler still owns the session
            debug!(%peer, "Deferring session cleanup");
            let pool = Arc::clone(&self.pool);
            tokio::spawn(async move {
                pool.end_session(&*session.lock().await);
            });
        }
        debug!(%peer, "Miner disconnected");
    }

    async fn handle(&self, session: &Arc<Mutex<Session>>, line: &str) -> (ResponseEnvelope, bool) {
        let request: RequestEnvelope = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                debug!(error = %e, "Malformed request line");
                return (
                    ResponseEnvelope {
                        id: 0,
                        result: serde_json::json!({ "status": Status::InvalidRequest.as_str() }),
                    },
                    false,
                );
            }
        };

        let id = request.id;
        let pool = Arc::clone(&self.pool);
        let router = Arc::clone(&self.router);
        let session = Arc::clone(session);
        let task = tokio::task::spawn_blocking(move || {
            let mut session = session.blocking_lock();
            router.dispatch(&pool, &mut session, &request.method, request.params)
        });

        let reply = match tokio::time::timeout(self.request_timeout, task).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                error!(error = %e, "Request handler panicked");
                Reply {
                    result: serde_json::json!({ "status": Status::InternalError.as_str() }),
                    close: true,
                }
            }
            Err(_) => {
                warn!(timeout = ?self.request_timeout, "Request timed out");
                Reply {
                    result: serde_json::json!({ "status": Status::InternalError.as_str() }),
                    close: true,
                }
            }
        };

        (
            ResponseEnvelope {
                id,
                result: reply.result,
            },
            reply.close,
        )
    }
}

async fn send<S, T>(sink: &mut S, message: &T) -> anyhow::Result<()>
where
    S: futures::Sink<String, Error = tokio_util::codec::LinesCodecError> + Unpin,
    T: Serialize,
{
    sink.send(serde_json::to_string(message)?).await?;
    Ok(())
}

//! Subscription session harness
//!
//! Push-based endpoints (`subscribe` / `unsubscribe`) deliver events on a
//! long-lived WebSocket. A [`Session`] owns one such connection and one
//! background receiver task that queues every frame in arrival order, so
//! test code can send a command and then wait for the frame it cares about
//! without racing the network:
//!
//! ```text
//!  test task                      receiver task
//!  ─────────                      ─────────────
//!  send(cmd) ──► socket ──► server ──► socket ──► queue.push(frame)
//!  drain_until(pred) ◄──────────────────────────── queue
//!  close() ── shutdown ─────────────────────────► exit; joined
//! ```
//!
//! `close` joins the receiver before returning, so no task belonging to a
//! session survives it.
//! A connection that drops without `close` being called is reported as
//! [`StreamError::Disconnected`], never mistaken for a quiet stream.

mod command;
mod error;
mod session;

pub use command::{CommandKind, StreamCommand};
pub use error::{StreamError, StreamResult};
pub use session::{Session, SessionState, CLOSE_JOIN_TIMEOUT, DEFAULT_CONNECT_TIMEOUT};

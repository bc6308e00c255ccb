//! # authsync session
//!
//! Server-side half of the auth state synchronization protocol.
//!
//! This crate provides:
//! - **Session state machine**: [`Session`], moved between `NotChecked`, `SignedOut` and
//!   `SignedIn` by verified tokens and explicit clears
//! - **Deferred-work gate**: [`DeferredWorkGate`], holding page work back until the first auth
//!   check of a connection completes (or a timeout elapses)
//! - **Auth-change dispatch**: [`HandlerRegistry`] and [`dispatch`], fanning transitions out to
//!   dependent components, once per handler identity
//! - **Frontend bridge**: [`FrontendBridge`], turning browser SDK observations into
//!   [`AuthEvent`]s
//! - **Session driver**: [`SessionDriver`], applying a connection's events in order
//! - **User profiles**: [`get_user`] and [`UserState`]
//!
//! ## Flow
//!
//! ```text
//! SDK state ─► FrontendBridge ─► AuthEvent ─► SessionDriver ─► Session::set_session
//!                                                                 │ KeyCache::get_keys
//!                                                                 │ jwt::verify
//!                                                                 ▼
//!                            Notice ◄── Transition { handlers } ──► dispatch
//!                                                                 │
//!                        DeferredWorkGate::await_checked ◄────────┘ (watch)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use authsync_session::{AuthContext, AuthEvent, SessionConfig, SessionDriver};
//! use tokio::sync::mpsc;
//!
//! # async fn example(token: String) -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::builder().register_user_state(true).build()?;
//! let context = AuthContext::from_config(&config)?;
//!
//! let (notices_tx, mut notices) = mpsc::unbounded_channel();
//! let driver = SessionDriver::spawn(Arc::new(context.session()), notices_tx);
//! driver.send(AuthEvent::SetSession { token }).await?;
//! println!("{:?}", notices.recv().await);
//! driver.shutdown().await;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

/// Frontend bridge protocol.
pub mod bridge;
/// Configuration.
pub mod config;
/// Shared process-wide state.
pub mod context;
/// Per-session event loop.
pub mod driver;
/// Session error types.
pub mod error;
/// Deferred-work gate.
pub mod gate;
/// Auth-change dispatch.
pub mod handler;
/// User-visible notices.
pub mod notice;
/// Session state machine.
pub mod session;
/// User profiles.
pub mod user;

pub use bridge::{AuthEvent, FrontendBridge, SdkAuthState, TokenProvider};
pub use config::{DEFAULT_GATE_TIMEOUT, SessionConfig};
pub use context::AuthContext;
pub use driver::{DriverHandle, EVENT_CHANNEL_CAPACITY, SessionDriver};
pub use error::{Result, SessionError};
pub use gate::{CorrelationId, DeferredWorkGate, GateOutcome, GateRelease, PageAction};
pub use handler::{Handler, HandlerId, HandlerRegistry, dispatch};
pub use notice::Notice;
pub use session::{AuthStatus, Session, SessionSnapshot, Transition};
pub use user::{UserState, UserSummary, get_user};

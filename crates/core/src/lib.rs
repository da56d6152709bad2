//! Client-side session manager for a privileged out-of-process service.
//!
//! The service is reached through a capability handle that an external
//! connection tracker supplies, replaces or withdraws at any time. A
//! [`Session`] attaches to each new handle (falling back to the legacy
//! protocol when the server predates the attach call), watches it for death,
//! caches what it learns about the server, and tells listeners about every
//! transition on one designated dispatch thread. User services bound through
//! the session are multiplexed over the same handle.
//!
//! # Example
//!
//! ```ignore
//! use tether::{Session, SessionConfig};
//!
//! let session = Session::new(SessionConfig::default())?;
//! session.add_handle_received_listener_sticky(|| tracing::info!("server ready"));
//! session.supply_handle(Some(handle), "com.example.app");
//!
//! let uid = session.uid()?;
//! ```

mod application;
mod attach;
mod config;
mod error;
mod gateway;
mod inbound;
mod listeners;
mod liveness;
mod process;
mod registry;
mod session;
mod state;
mod user_service;

pub use config::SessionConfig;
pub use error::{Error, Result};
pub use gateway::RemoteService;
pub use listeners::{HandleDeadListener, HandleReceivedListener, ListenerId, PermissionResultListener, SessionEvent};
pub use process::RemoteProcess;
pub use session::Session;
pub use state::{LinkState, PermissionState, ServerIdentity};
pub use tether_protocol::{Bundle, ComponentName, PermissionResult};
pub use user_service::{ServiceConnection, UserServiceArgs, UserServiceArgsBuilder, UserServiceKey};

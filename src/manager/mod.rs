//! Session management
//!
//! Provides `SessionManager` for creating, tracking, and reclaiming
//! concurrent stream sessions, with an object pool for retired sessions,
//! a close-notification drain, a periodic health sweep, and an orderly
//! shutdown that fans cancellation out to every session.
//!
//! # Module Structure
//!
//! - `core` - manager struct, construction, pool, shutdown
//! - `create` - session creation
//! - `info` - descriptor queries, detection toggles, removal
//! - `background` - close-drain and health-sweep loops

mod background;
mod core;
mod create;
mod info;

pub use self::core::SessionManager;
pub use create::CreateSessionRequest;

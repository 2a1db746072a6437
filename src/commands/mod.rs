//! Command handler layer.
//!
//! ## Files
//! - `mine.rs` — historical mining of past workflow runs.
//! - `observe.rs` — the two-phase per-job observation lifecycle.
//!
//! ## Principles
//! - Parse/match CLI inputs here.
//! - Delegate engine logic to `services/*`.
//! - Keep behavior and output schema stable.

pub mod mine;
pub mod observe;

pub use mine::handle_mine;
pub use observe::handle_observe;

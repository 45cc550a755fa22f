//! State module for tracking a crawler's lifecycle
//!
//! # Components
//!
//! - `RunState`: Idle or Running (with the crawl's cancellation scope)
//! - `RunControl`: Guards the Idle → Running → Idle transitions
//! - `RunGuard`: Keeps a crawl in the Running state until dropped

mod run_state;

pub use run_state::{RunControl, RunGuard, RunState};

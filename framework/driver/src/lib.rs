//! The boundary between the orchestrator and whatever automates the browser.
//!
//! The runner only needs a handful of capabilities from a browser: navigate,
//! evaluate a script, hover, resize, block requests, screenshot. Everything
//! else (element lookup strategies, polling, diagnostics) is built on top of
//! these by the runner, which keeps any particular automation protocol out of
//! the orchestration core.

mod chrome;
mod error;
mod profile;
mod scripted;
mod session;

pub use chrome::ChromeDriver;
pub use error::DriverError;
pub use profile::{EngineProfile, Viewport};
pub use scripted::{ScriptedDriver, ScriptedSession};
pub use session::{Driver, Session};

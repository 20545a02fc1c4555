use thiserror::Error;

/// Errors crossing the browser automation boundary.
///
/// The runner treats all of these as infrastructure failures: they mean the
/// session could not be created or maintained, not that the page under test
/// misbehaved.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("failed to launch browser for engine '{engine}': {message}")]
    Launch { engine: String, message: String },

    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("script evaluation failed: {message}")]
    Evaluation { message: String },

    #[error("interaction '{action}' failed: {message}")]
    Interaction { action: String, message: String },

    #[error("failed to capture screenshot: {message}")]
    Screenshot { message: String },

    #[error("browser session is closed")]
    SessionClosed,
}

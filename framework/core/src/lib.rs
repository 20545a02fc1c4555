mod cancel;
mod failure;
mod wait;

pub mod prelude {
    pub use crate::cancel::{CancelHandle, CancelListener, CancelledError};
    pub use crate::failure::{ActionTimeout, AssertionFailure};
    pub use crate::wait::{wait_until, Observation, Probe, WaitError, WaitTimeout};
}

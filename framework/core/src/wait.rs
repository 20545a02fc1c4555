use std::time::Duration;

use tokio::time::Instant;

/// A single sample of the condition being waited on.
///
/// Unsatisfied samples keep their value so that a timeout can report the last
/// thing that was actually observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation<T> {
    pub satisfied: bool,
    pub value: T,
}

impl<T> Observation<T> {
    pub fn satisfied(value: T) -> Self {
        Self {
            satisfied: true,
            value,
        }
    }

    pub fn pending(value: T) -> Self {
        Self {
            satisfied: false,
            value,
        }
    }
}

/// Something that can be sampled repeatedly while waiting for a condition.
#[async_trait::async_trait]
pub trait Probe: Send {
    type Value: Send;

    async fn observe(&mut self) -> anyhow::Result<Observation<Self::Value>>;
}

#[derive(Debug)]
pub struct WaitTimeout<T> {
    pub last_observed: Option<T>,
    pub waited: Duration,
}

#[derive(Debug)]
pub enum WaitError<T> {
    /// The condition never held within the timeout.
    TimedOut(WaitTimeout<T>),
    /// Sampling itself failed, for example because the browser session died.
    Probe(anyhow::Error),
}

/// Poll `probe` at a fixed interval until it reports a satisfied observation
/// or `timeout` elapses.
///
/// Resolves as soon as the condition holds rather than sleeping out the full
/// timeout, and takes one final sample right at the deadline so a condition
/// that becomes true at the last moment is still seen.
pub async fn wait_until<P: Probe>(
    probe: &mut P,
    timeout: Duration,
    interval: Duration,
) -> Result<(P::Value, Duration), WaitError<P::Value>> {
    let started = Instant::now();
    let mut last_observed = None;

    loop {
        match probe.observe().await {
            Ok(observation) if observation.satisfied => {
                return Ok((observation.value, started.elapsed()));
            }
            Ok(observation) => {
                last_observed = Some(observation.value);
            }
            Err(e) => return Err(WaitError::Probe(e)),
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(WaitError::TimedOut(WaitTimeout {
                last_observed,
                waited: elapsed,
            }));
        }

        tokio::time::sleep(interval.min(timeout - elapsed)).await;
    }
}

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverError;
use crate::profile::{EngineProfile, Viewport};
use crate::session::{Driver, Session};

type SessionFactory =
    dyn Fn(&EngineProfile, usize) -> Result<ScriptedSession, DriverError> + Send + Sync;
type Responder = dyn Fn(&str) -> Result<Value, DriverError> + Send + Sync;

/// An in-memory driver for exercising the orchestrator without a browser.
///
/// The factory is called with the engine profile and a zero-based session
/// counter, so tests can make individual attempts pass, fail or refuse to
/// start. Session lifecycle is counted to verify that every session acquired
/// by the runner is also released.
pub struct ScriptedDriver {
    factory: Box<SessionFactory>,
    created: AtomicUsize,
    closed: Arc<AtomicUsize>,
}

impl ScriptedDriver {
    pub fn new(
        factory: impl Fn(&EngineProfile, usize) -> Result<ScriptedSession, DriverError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            factory: Box::new(factory),
            created: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Driver for ScriptedDriver {
    async fn new_session(
        &self,
        profile: &EngineProfile,
    ) -> Result<Box<dyn Session>, DriverError> {
        let index = self.created.fetch_add(1, Ordering::SeqCst);
        let mut session = (self.factory)(profile, index)?;
        session.on_close = Some(self.closed.clone());
        Ok(Box::new(session))
    }
}

/// A scripted session that answers every evaluation through a responder
/// closure and treats all other operations as successful no-ops.
pub struct ScriptedSession {
    responder: Arc<Responder>,
    latency: Duration,
    on_close: Option<Arc<AtomicUsize>>,
    closed: bool,
}

impl ScriptedSession {
    pub fn with_responder(
        responder: impl Fn(&str) -> Result<Value, DriverError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Arc::new(responder),
            latency: Duration::ZERO,
            on_close: None,
            closed: false,
        }
    }

    /// A session whose evaluations always return the same value.
    pub fn returning(value: Value) -> Self {
        Self::with_responder(move |_| Ok(value.clone()))
    }

    /// Delay applied to every operation, for exercising timeouts and
    /// cancellation.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    async fn simulate_work(&self) -> Result<(), DriverError> {
        if self.closed {
            return Err(DriverError::SessionClosed);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn goto(&mut self, _url: &str) -> Result<(), DriverError> {
        self.simulate_work().await
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, DriverError> {
        self.simulate_work().await?;
        (self.responder)(script)
    }

    async fn hover(&mut self, _selector: &str) -> Result<(), DriverError> {
        self.simulate_work().await
    }

    async fn set_viewport(&mut self, _viewport: Viewport) -> Result<(), DriverError> {
        self.simulate_work().await
    }

    async fn block_urls(&mut self, _patterns: &[String]) -> Result<(), DriverError> {
        self.simulate_work().await
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, DriverError> {
        self.simulate_work().await?;
        Ok(b"scripted-screenshot".to_vec())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        if !self.closed {
            self.closed = true;
            if let Some(counter) = &self.on_close {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        }
        Ok(())
    }
}

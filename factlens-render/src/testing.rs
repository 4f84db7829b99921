//! Scripted in-memory sessions for exercising load and probe policy without
//! a browser.

use std::collections::VecDeque;
use std::future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::profile::PlatformProfile;
use crate::session::{LoadSignal, RenderSession, SessionError, SessionFactory};

/// One step in a scripted load sequence.
pub enum FakeEvent {
    /// Emit a raw load signal.
    Signal(LoadSignal),
    /// Wait before processing the next event.
    Delay(Duration),
    /// Fire a cancellation token mid-load, as an external caller would.
    Cancel(CancellationToken),
}

/// Counters shared between a factory and the sessions it hands out.
#[derive(Default)]
pub struct SessionLog {
    opened: AtomicUsize,
    disposed: AtomicUsize,
}

impl SessionLog {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn disposed(&self) -> usize {
        self.disposed.load(Ordering::SeqCst)
    }
}

/// Scripted [`RenderSession`]. Signals play back in order; an exhausted
/// script hangs forever, standing in for a page that never settles.
pub struct FakeSession {
    events: VecDeque<FakeEvent>,
    eval_results: VecDeque<Result<Value, SessionError>>,
    title: String,
    html: String,
    disposed: bool,
    log: Arc<SessionLog>,
}

impl FakeSession {
    pub fn new() -> Self {
        Self {
            events: VecDeque::new(),
            eval_results: VecDeque::new(),
            title: String::new(),
            html: String::new(),
            disposed: false,
            log: Arc::new(SessionLog::default()),
        }
    }

    pub fn with_events(mut self, events: Vec<FakeEvent>) -> Self {
        self.events = events.into();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    /// Queue the result of the next `evaluate` call. Unqueued calls return
    /// `Value::Null`.
    pub fn with_eval(mut self, result: Result<Value, SessionError>) -> Self {
        self.eval_results.push_back(result);
        self
    }
}

impl Default for FakeSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn start_load(&mut self, _url: &Url) -> Result<(), SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        Ok(())
    }

    async fn next_signal(&mut self) -> Result<LoadSignal, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        loop {
            match self.events.pop_front() {
                Some(FakeEvent::Signal(signal)) => return Ok(signal),
                Some(FakeEvent::Delay(d)) => tokio::time::sleep(d).await,
                Some(FakeEvent::Cancel(token)) => token.cancel(),
                None => future::pending::<()>().await,
            }
        }
    }

    async fn evaluate(&mut self, _script: &str) -> Result<Value, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        self.eval_results.pop_front().unwrap_or(Ok(Value::Null))
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        Ok(self.title.clone())
    }

    async fn html(&mut self) -> Result<String, SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        Ok(self.html.clone())
    }

    async fn dispose(&mut self) -> Result<(), SessionError> {
        if !self.disposed {
            self.disposed = true;
            self.log.disposed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Hands out pre-scripted sessions in order; runs dry with a driver error,
/// which surfaces any unexpected extra attempt in tests.
pub struct FakeSessionFactory {
    sessions: Mutex<VecDeque<FakeSession>>,
    log: Arc<SessionLog>,
}

impl FakeSessionFactory {
    pub fn new(sessions: Vec<FakeSession>) -> Self {
        let log = Arc::new(SessionLog::default());
        let sessions = sessions
            .into_iter()
            .map(|mut s| {
                s.log = log.clone();
                s
            })
            .collect();
        Self {
            sessions: Mutex::new(sessions),
            log,
        }
    }

    pub fn log(&self) -> Arc<SessionLog> {
        self.log.clone()
    }
}

#[async_trait]
impl SessionFactory for FakeSessionFactory {
    async fn open(&self, _profile: &PlatformProfile) -> Result<Box<dyn RenderSession>, SessionError> {
        let next = self
            .sessions
            .lock()
            .map_err(|_| SessionError::Driver("session script lock poisoned".into()))?
            .pop_front();
        match next {
            Some(session) => {
                self.log.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(session))
            }
            None => Err(SessionError::Driver("no scripted session left".into())),
        }
    }
}

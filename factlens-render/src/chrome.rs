use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use webdriver::capabilities::Capabilities;

use crate::identity::BrowserIdentity;
use crate::profile::PlatformProfile;
use crate::session::{LoadSignal, RenderSession, SessionError, SessionFactory};

const READY_STATE_POLL: Duration = Duration::from_millis(250);

/// Opens Chrome sessions through a chromedriver endpoint.
pub struct ChromeSessionFactory {
    webdriver_url: String,
    headless: bool,
    blocked_hosts: Vec<String>,
}

impl ChromeSessionFactory {
    pub fn new(webdriver_url: String, headless: bool, blocked_hosts: Vec<String>) -> Self {
        Self {
            webdriver_url,
            headless,
            blocked_hosts,
        }
    }
}

fn build_chrome_args(
    identity: &BrowserIdentity,
    headless: bool,
    blocked_hosts: &[String],
) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        "--disable-plugins-discovery".to_string(),
        format!("--user-agent={}", identity.user_agent),
        format!("--window-size={},{}", identity.viewport.0, identity.viewport.1),
        format!("--lang={}", identity.languages.join(",")),
    ];
    if headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    if !blocked_hosts.is_empty() {
        // Analytics and STUN endpoints hold connections open and keep the
        // spinner alive; mapping them to NXDOMAIN cuts them off at DNS.
        let rules = blocked_hosts
            .iter()
            .map(|h| format!("MAP {h} ~NOTFOUND"))
            .collect::<Vec<_>>()
            .join(", ");
        args.push(format!("--host-resolver-rules={rules}"));
    }
    args
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, profile: &PlatformProfile) -> Result<Box<dyn RenderSession>, SessionError> {
        let identity = BrowserIdentity::for_profile(profile);
        let args = build_chrome_args(&identity, self.headless, &self.blocked_hosts);

        let mut chrome_opts = HashMap::new();
        chrome_opts.insert("args".to_string(), json!(args));

        let mut caps = Capabilities::new();
        caps.insert("goog:chromeOptions".to_string(), json!(chrome_opts));
        // Navigation returns immediately; load progress is observed by the
        // readyState poller so the controller keeps control of timing.
        caps.insert("pageLoadStrategy".to_string(), json!("none"));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&self.webdriver_url)
            .await
            .map_err(|e| SessionError::Driver(e.to_string()))?;

        tracing::debug!(profile = profile.name, "opened chrome session");

        Ok(Box::new(ChromeSession {
            client,
            signals: None,
            poller: None,
            disposed: false,
        }))
    }
}

/// Live Chrome tab driven over WebDriver.
///
/// WebDriver has no load-event stream, so a spawned poller watches
/// `document.readyState` and synthesizes [`LoadSignal`]s: `interactive` maps
/// to `Stopped` (document usable, subresources still in flight) and
/// `complete` maps to `Finished`.
pub struct ChromeSession {
    client: Client,
    signals: Option<mpsc::Receiver<LoadSignal>>,
    poller: Option<JoinHandle<()>>,
    disposed: bool,
}

impl ChromeSession {
    fn ensure_live(&self) -> Result<(), SessionError> {
        if self.disposed {
            return Err(SessionError::Disposed);
        }
        Ok(())
    }

    fn stop_poller(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.abort();
        }
        self.signals = None;
    }
}

async fn poll_ready_state(client: Client, url: Url, tx: mpsc::Sender<LoadSignal>) {
    if let Err(err) = client.goto(url.as_str()).await {
        let _ = tx.send(LoadSignal::Failed(err.to_string())).await;
        return;
    }
    let mut stopped_sent = false;
    loop {
        tokio::time::sleep(READY_STATE_POLL).await;
        let state = match client.execute("return document.readyState;", vec![]).await {
            Ok(Value::String(s)) => s,
            Ok(_) => continue,
            Err(err) => {
                let _ = tx.send(LoadSignal::Failed(err.to_string())).await;
                return;
            }
        };
        match state.as_str() {
            "interactive" if !stopped_sent => {
                stopped_sent = true;
                if tx.send(LoadSignal::Stopped).await.is_err() {
                    return;
                }
            }
            "complete" => {
                let _ = tx.send(LoadSignal::Finished).await;
                return;
            }
            _ => {}
        }
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn start_load(&mut self, url: &Url) -> Result<(), SessionError> {
        self.ensure_live()?;
        self.stop_poller();
        let (tx, rx) = mpsc::channel(8);
        self.signals = Some(rx);
        self.poller = Some(tokio::spawn(poll_ready_state(
            self.client.clone(),
            url.clone(),
            tx,
        )));
        Ok(())
    }

    async fn next_signal(&mut self) -> Result<LoadSignal, SessionError> {
        self.ensure_live()?;
        let rx = self.signals.as_mut().ok_or(SessionError::NotStarted)?;
        match rx.recv().await {
            Some(signal) => Ok(signal),
            // Poller exited after a terminal signal was already consumed.
            None => Err(SessionError::Driver("load signal stream ended".into())),
        }
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value, SessionError> {
        self.ensure_live()?;
        self.client
            .execute_async(script, vec![])
            .await
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    async fn title(&mut self) -> Result<String, SessionError> {
        self.ensure_live()?;
        self.client
            .title()
            .await
            .map_err(|e| SessionError::Driver(e.to_string()))
    }

    async fn html(&mut self) -> Result<String, SessionError> {
        self.ensure_live()?;
        self.client
            .source()
            .await
            .map_err(|e| SessionError::Driver(e.to_string()))
    }

    async fn dispose(&mut self) -> Result<(), SessionError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        self.stop_poller();
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| SessionError::Cleanup(e.to_string()))
    }
}

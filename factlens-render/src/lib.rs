//! Browser rendering layer: sessions, load policy, and readiness probing.
//!
//! [`session::RenderSession`] is the seam between policy and machinery. The
//! Chrome implementation drives a real browser over WebDriver; the policy
//! types ([`loader::PageLoadController`], [`probe::ContentReadinessProbe`])
//! only ever see the trait, which is what makes them testable against the
//! scripted sessions in [`testing`].

pub mod chrome;
pub mod identity;
pub mod loader;
pub mod probe;
pub mod profile;
pub mod scripts;
pub mod session;
pub mod testing;

pub use chrome::ChromeSessionFactory;
pub use loader::PageLoadController;
pub use probe::ContentReadinessProbe;
pub use profile::{classify, PlatformProfile};
pub use session::{LoadSignal, RenderSession, SessionError, SessionFactory};

//! Deterministic page-glue behaviors on a lightweight DOM harness.
//!
//! The crate models the two pieces of glue a server-rendered page typically
//! ships: auto-dismissal of flash-message alerts, and window-level
//! suppression of the browser's default file-drop navigation. Both run as
//! native behaviors against [`Harness`], a small headless document with a
//! virtual clock, so every timing and DOM property is exactly observable
//! from tests.
//!
//! ```
//! use page_glue::{Harness, PageGlue, Result};
//!
//! fn main() -> Result<()> {
//!     let mut h = Harness::from_html("<div class='alert'>Saved</div>")?;
//!     let glue = PageGlue::install(&mut h)?;
//!     h.advance_time(4000)?; // alert starts fading
//!     h.advance_time(500)?; // alert is gone
//!     h.assert_absent(".alert")?;
//!     glue.teardown(&mut h);
//!     Ok(())
//! }
//! ```

use std::error::Error as StdError;
use std::fmt;

mod dom;
mod events;
mod glue;
mod harness;
mod html;
mod scheduler;
mod selector;

pub use dom::{Dom, NodeId};
pub use events::{EventState, EventTarget, Handler};
pub use glue::{
    DEFAULT_ALERT_SELECTOR, DEFAULT_DISMISS_DELAY_MS, DEFAULT_FADE_MS, DropGuard, FlashDismiss,
    FlashPhase, GlueConfig, PageGlue,
};
pub use harness::Harness;
pub use scheduler::PendingTimer;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    Runtime(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::Runtime(msg) => write!(f, "runtime error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

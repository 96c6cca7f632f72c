//! The page behaviors themselves: flash-alert auto-dismissal and global
//! drag-drop guarding. Both install explicitly against a [`Harness`] and
//! hand back a handle whose `teardown` removes every listener and cancels
//! every timer the behavior still owns, so repeated view initialization
//! cannot accumulate handlers or mutate stale elements.

use std::cell::RefCell;
use std::rc::Rc;

use crate::dom::NodeId;
use crate::events::{EventTarget, Handler};
use crate::harness::Harness;
use crate::Result;

pub const DEFAULT_ALERT_SELECTOR: &str = ".alert";
pub const DEFAULT_DISMISS_DELAY_MS: i64 = 4000;
pub const DEFAULT_FADE_MS: i64 = 500;

/// Tunables for [`FlashDismiss`]. The fade transition the element receives
/// and the delay before its removal both derive from `fade_ms`, so the two
/// cannot drift apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlueConfig {
    pub alert_selector: String,
    pub dismiss_delay_ms: i64,
    pub fade_ms: i64,
}

impl Default for GlueConfig {
    fn default() -> Self {
        Self {
            alert_selector: DEFAULT_ALERT_SELECTOR.to_string(),
            dismiss_delay_ms: DEFAULT_DISMISS_DELAY_MS,
            fade_ms: DEFAULT_FADE_MS,
        }
    }
}

impl GlueConfig {
    /// CSS transition applied when an alert starts fading, e.g.
    /// `opacity 0.5s ease` for the default 500 ms fade.
    pub fn fade_transition(&self) -> String {
        format!("opacity {}s ease", self.fade_ms as f64 / 1000.0)
    }
}

/// Dismissal progress of one tracked alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashPhase {
    Visible,
    Fading,
    Removed,
}

#[derive(Debug)]
struct FlashEntry {
    node: NodeId,
    phase: FlashPhase,
    timer: Option<i64>,
}

#[derive(Debug, Default)]
struct FlashState {
    entries: Vec<FlashEntry>,
}

/// Auto-dismissal of flash alerts.
///
/// Install takes a one-time snapshot of the elements matching the alert
/// selector; elements inserted later are never touched. Each snapshot
/// element runs its own `Visible -> Fading -> Removed` sequence with one
/// live timer at a time, and a failure mode on one element (say, manual
/// removal before the timer fires) never affects the others.
#[derive(Debug)]
pub struct FlashDismiss {
    state: Rc<RefCell<FlashState>>,
}

impl FlashDismiss {
    pub fn install(harness: &mut Harness) -> Result<Self> {
        Self::install_with(harness, GlueConfig::default())
    }

    pub fn install_with(harness: &mut Harness, config: GlueConfig) -> Result<Self> {
        let nodes = harness.query_all(&config.alert_selector)?;
        let state = Rc::new(RefCell::new(FlashState::default()));

        for node in nodes {
            let fade_state = Rc::clone(&state);
            let fade_config = config.clone();
            let timer = harness.set_timeout(config.dismiss_delay_ms, move |h| {
                Self::fade(h, &fade_state, node, &fade_config)
            });
            state.borrow_mut().entries.push(FlashEntry {
                node,
                phase: FlashPhase::Visible,
                timer: Some(timer),
            });
        }

        Ok(Self { state })
    }

    fn fade(
        harness: &mut Harness,
        state: &Rc<RefCell<FlashState>>,
        node: NodeId,
        config: &GlueConfig,
    ) -> Result<()> {
        {
            let mut inner = state.borrow_mut();
            let Some(entry) = inner.entries.iter_mut().find(|entry| entry.node == node) else {
                return Ok(());
            };
            if entry.phase != FlashPhase::Visible {
                return Ok(());
            }
            entry.phase = FlashPhase::Fading;
            entry.timer = None;
        }

        // The element may already be detached; styling it anyway is harmless
        // and the later removal is a no-op.
        harness.dom_mut().style_set(node, "opacity", "0")?;
        harness
            .dom_mut()
            .style_set(node, "transition", &config.fade_transition())?;

        let remove_state = Rc::clone(state);
        let timer = harness.set_timeout(config.fade_ms, move |h| {
            Self::remove(h, &remove_state, node)
        });
        if let Some(entry) = state
            .borrow_mut()
            .entries
            .iter_mut()
            .find(|entry| entry.node == node)
        {
            entry.timer = Some(timer);
        }
        Ok(())
    }

    fn remove(harness: &mut Harness, state: &Rc<RefCell<FlashState>>, node: NodeId) -> Result<()> {
        {
            let mut inner = state.borrow_mut();
            let Some(entry) = inner.entries.iter_mut().find(|entry| entry.node == node) else {
                return Ok(());
            };
            if entry.phase != FlashPhase::Fading {
                return Ok(());
            }
            entry.phase = FlashPhase::Removed;
            entry.timer = None;
        }
        harness.dom_mut().remove_node(node)
    }

    /// Nodes captured by the install-time snapshot, in document order.
    pub fn tracked(&self) -> Vec<NodeId> {
        self.state
            .borrow()
            .entries
            .iter()
            .map(|entry| entry.node)
            .collect()
    }

    pub fn phase_of(&self, node: NodeId) -> Option<FlashPhase> {
        self.state
            .borrow()
            .entries
            .iter()
            .find(|entry| entry.node == node)
            .map(|entry| entry.phase)
    }

    /// Cancel every pending dismiss timer. Elements already removed stay
    /// removed; everything else is left untouched.
    pub fn teardown(self, harness: &mut Harness) {
        for entry in self.state.borrow_mut().entries.drain(..) {
            if let Some(timer) = entry.timer {
                harness.clear_timer(timer);
            }
        }
    }
}

/// Window-level suppression of the browser's default file-drop handling.
///
/// Registers bubble-phase `dragover` and `drop` listeners on the window
/// that prevent the default action and deliberately do not stop
/// propagation or inspect the target, so a dedicated drop zone deeper in
/// the tree always observes the event first and keeps working.
#[derive(Debug)]
pub struct DropGuard {
    handlers: Vec<(String, Handler)>,
}

impl DropGuard {
    pub const EVENTS: [&'static str; 2] = ["dragover", "drop"];

    pub fn install(harness: &mut Harness) -> Self {
        let mut handlers = Vec::new();
        for event in Self::EVENTS {
            let handler = Handler::new(|_h, event_state| {
                event_state.prevent_default();
                Ok(())
            });
            harness.add_listener(EventTarget::Window, event, false, handler.clone());
            handlers.push((event.to_string(), handler));
        }
        Self { handlers }
    }

    /// Remove the window listeners registered by this install.
    pub fn teardown(self, harness: &mut Harness) {
        for (event, handler) in &self.handlers {
            harness.remove_listener(EventTarget::Window, event, false, handler);
        }
    }
}

/// Both behaviors at once: what the original page wired up on
/// `DOMContentLoaded`.
#[derive(Debug)]
pub struct PageGlue {
    flash: FlashDismiss,
    guard: DropGuard,
}

impl PageGlue {
    pub fn install(harness: &mut Harness) -> Result<Self> {
        Self::install_with(harness, GlueConfig::default())
    }

    pub fn install_with(harness: &mut Harness, config: GlueConfig) -> Result<Self> {
        Ok(Self {
            flash: FlashDismiss::install_with(harness, config)?,
            guard: DropGuard::install(harness),
        })
    }

    pub fn flash(&self) -> &FlashDismiss {
        &self.flash
    }

    pub fn teardown(self, harness: &mut Harness) {
        self.flash.teardown(harness);
        self.guard.teardown(harness);
    }
}

use crate::dom::{Dom, NodeId};
use crate::events::{EventState, EventTarget, Handler, Listener, ListenerStore};
use crate::scheduler::{PendingTimer, SchedulerState, TaskCallback};
use crate::{Error, Result, html, selector};

const DISPATCH_STACK_BYTES: usize = 32 * 1024 * 1024;

/// A headless document with a virtual clock. Time only moves when the test
/// calls [`advance_time`](Harness::advance_time) or one of the timer-running
/// helpers, so behaviors scheduled against the harness are exactly
/// reproducible.
#[derive(Debug)]
pub struct Harness {
    pub(crate) dom: Dom,
    pub(crate) listeners: ListenerStore,
    pub(crate) scheduler: SchedulerState,
    trace_timers: bool,
    trace_events: bool,
    trace_logs: Vec<String>,
}

impl Harness {
    pub fn from_html(html_src: &str) -> Result<Self> {
        Ok(Self {
            dom: html::parse_document(html_src)?,
            listeners: ListenerStore::default(),
            scheduler: SchedulerState::new(),
            trace_timers: true,
            trace_events: true,
            trace_logs: Vec::new(),
        })
    }

    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    // ---- queries ----

    pub fn query(&self, selector: &str) -> Result<NodeId> {
        selector::query_one(&self.dom, selector)
    }

    pub fn query_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        selector::query_all(&self.dom, selector)
    }

    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(!self.query_all(selector)?.is_empty())
    }

    pub fn text(&self, selector: &str) -> Result<String> {
        let node = self.query(selector)?;
        Ok(self.dom.text_content(node))
    }

    // ---- mutation ----

    /// Parse markup and append it under the first node matching `selector`.
    pub fn insert_html(&mut self, selector: &str, html_src: &str) -> Result<()> {
        let parent = self.query(selector)?;
        html::parse_fragment(&mut self.dom, parent, html_src)
    }

    /// Detach the first node matching `selector` from the tree.
    pub fn remove(&mut self, selector: &str) -> Result<()> {
        let node = self.query(selector)?;
        self.dom.remove_node(node)
    }

    // ---- assertions ----

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let node = self.query(selector)?;
        let actual = self.dom.text_content(node);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.into(),
                expected: expected.into(),
                actual,
                dom_snippet: self.dom.dump_node(node),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        self.query(selector).map(|_| ())
    }

    pub fn assert_absent(&self, selector: &str) -> Result<()> {
        let matches = self.query_all(selector)?;
        if let Some(first) = matches.first() {
            return Err(Error::AssertionFailed {
                selector: selector.into(),
                expected: "no match".into(),
                actual: format!("{} match(es)", matches.len()),
                dom_snippet: self.dom.dump_node(*first),
            });
        }
        Ok(())
    }

    pub fn assert_style(&self, selector: &str, key: &str, expected: &str) -> Result<()> {
        let node = self.query(selector)?;
        let actual = self.dom.style_get(node, key)?;
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.into(),
                expected: expected.into(),
                actual,
                dom_snippet: self.dom.dump_node(node),
            });
        }
        Ok(())
    }

    // ---- listeners ----

    pub fn add_listener(
        &mut self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: Handler,
    ) {
        self.listeners
            .add(target, event.to_string(), Listener { capture, handler });
    }

    pub fn remove_listener(
        &mut self,
        target: EventTarget,
        event: &str,
        capture: bool,
        handler: &Handler,
    ) -> bool {
        self.listeners.remove(target, event, capture, handler)
    }

    /// Number of listeners registered for `event` on `target`, in either
    /// phase. Lets tests prove installs do not accumulate.
    pub fn listener_count(&self, target: EventTarget, event: &str) -> usize {
        self.listeners.count(target, event)
    }

    // ---- dispatch ----

    /// Dispatch an event whose target is the first node matching `selector`.
    pub fn dispatch(&mut self, selector: &str, event_type: &str) -> Result<EventState> {
        let node = self.query(selector)?;
        self.dispatch_to(EventTarget::Node(node), event_type)
    }

    /// Dispatch an event targeting the window itself.
    pub fn dispatch_window(&mut self, event_type: &str) -> Result<EventState> {
        self.dispatch_to(EventTarget::Window, event_type)
    }

    pub fn dispatch_to(&mut self, target: EventTarget, event_type: &str) -> Result<EventState> {
        // Native handlers can re-enter dispatch; give them room.
        stacker::grow(DISPATCH_STACK_BYTES, || {
            self.dispatch_event(target, event_type)
        })
    }

    fn dispatch_event(&mut self, target: EventTarget, event_type: &str) -> Result<EventState> {
        let mut event = EventState::new(event_type, target, self.scheduler.now_ms);

        // Propagation path, top-down: window, document, ancestors, target.
        let mut path = vec![target];
        if let EventTarget::Node(node) = target {
            let mut cursor = self.dom.parent(node);
            while let Some(ancestor) = cursor {
                path.push(EventTarget::Node(ancestor));
                cursor = self.dom.parent(ancestor);
            }
            path.push(EventTarget::Window);
        }
        path.reverse();

        // Capture phase.
        for hop in &path[..path.len() - 1] {
            event.current_target = *hop;
            self.invoke_listeners(*hop, &mut event, true)?;
            if event.propagation_stopped() {
                self.trace_event_done(&event, "propagation_stopped");
                return Ok(event);
            }
        }

        // Target phase: capture listeners first, then bubble listeners.
        event.current_target = target;
        self.invoke_listeners(target, &mut event, true)?;
        if event.propagation_stopped() {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }
        self.invoke_listeners(target, &mut event, false)?;
        if event.propagation_stopped() {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        // Bubble phase.
        if event.bubbles {
            for hop in path[..path.len() - 1].iter().rev() {
                event.current_target = *hop;
                self.invoke_listeners(*hop, &mut event, false)?;
                if event.propagation_stopped() {
                    self.trace_event_done(&event, "propagation_stopped");
                    return Ok(event);
                }
            }
        }

        self.trace_event_done(&event, "completed");
        Ok(event)
    }

    fn invoke_listeners(
        &mut self,
        target: EventTarget,
        event: &mut EventState,
        capture: bool,
    ) -> Result<()> {
        let listeners = self.listeners.get(target, &event.event_type, capture);
        for listener in listeners {
            // A listener removed by an earlier listener in this same
            // dispatch must not fire.
            if !self
                .listeners
                .contains(target, &event.event_type, capture, &listener.handler)
            {
                continue;
            }
            if self.trace_events {
                let phase = if capture { "capture" } else { "bubble" };
                let line = format!(
                    "[event] {} target={} current={} phase={} default_prevented={}",
                    event.event_type,
                    self.trace_target_label(event.target),
                    self.trace_target_label(event.current_target),
                    phase,
                    event.default_prevented()
                );
                self.trace_logs.push(line);
            }
            listener.handler.invoke(self, event)?;
            if event.immediate_propagation_stopped() {
                break;
            }
        }
        Ok(())
    }

    fn trace_event_done(&mut self, event: &EventState, outcome: &str) {
        if !self.trace_events {
            return;
        }
        let line = format!(
            "[event] done {} target={} outcome={} default_prevented={}",
            event.event_type,
            self.trace_target_label(event.target),
            outcome,
            event.default_prevented()
        );
        self.trace_logs.push(line);
    }

    fn trace_target_label(&self, target: EventTarget) -> String {
        match target {
            EventTarget::Window => "window".to_string(),
            EventTarget::Node(node) => self.dom.dump_node(node),
        }
    }

    // ---- timers ----

    pub fn now_ms(&self) -> i64 {
        self.scheduler.now_ms
    }

    pub fn set_timeout<F>(&mut self, delay_ms: i64, callback: F) -> i64
    where
        F: FnMut(&mut Harness) -> Result<()> + 'static,
    {
        let id = self.scheduler.schedule(delay_ms, TaskCallback::new(callback));
        self.trace_timer_line(format!(
            "[timer] schedule id={id} delay_ms={delay_ms} due_at={}",
            self.scheduler.now_ms.saturating_add(delay_ms.max(0))
        ));
        id
    }

    pub fn clear_timer(&mut self, timer_id: i64) -> bool {
        let existed = self.scheduler.clear(timer_id);
        self.trace_timer_line(format!("[timer] clear id={timer_id} existed={existed}"));
        existed
    }

    pub fn clear_all_timers(&mut self) -> usize {
        let cleared = self.scheduler.clear_all();
        self.trace_timer_line(format!("[timer] clear_all cleared={cleared}"));
        cleared
    }

    pub fn pending_timers(&self) -> Vec<PendingTimer> {
        self.scheduler.pending()
    }

    pub fn set_timer_step_limit(&mut self, max_steps: usize) -> Result<()> {
        if max_steps == 0 {
            return Err(Error::Runtime(
                "set_timer_step_limit requires at least 1 step".into(),
            ));
        }
        self.scheduler.timer_step_limit = max_steps;
        Ok(())
    }

    /// Move the clock forward and run every task that becomes due. The
    /// clock steps to each task's due time before the task fires, so a
    /// task scheduling a follow-up sees its own due time as "now" and the
    /// follow-up still runs within the same advance when it falls inside
    /// the window.
    pub fn advance_time(&mut self, delta_ms: i64) -> Result<()> {
        if delta_ms < 0 {
            return Err(Error::Runtime(
                "advance_time requires non-negative milliseconds".into(),
            ));
        }
        let from = self.scheduler.now_ms;
        let target = from.saturating_add(delta_ms);
        let ran = self.advance_clock_to(target)?;
        self.trace_timer_line(format!(
            "[timer] advance delta_ms={} from={} to={} ran_due={}",
            delta_ms, from, self.scheduler.now_ms, ran
        ));
        Ok(())
    }

    pub fn advance_time_to(&mut self, target_ms: i64) -> Result<()> {
        if target_ms < self.scheduler.now_ms {
            return Err(Error::Runtime(format!(
                "advance_time_to requires target >= now_ms (target={target_ms}, now_ms={})",
                self.scheduler.now_ms
            )));
        }
        let from = self.scheduler.now_ms;
        let ran = self.advance_clock_to(target_ms)?;
        self.trace_timer_line(format!(
            "[timer] advance_to from={} to={} ran_due={}",
            from, self.scheduler.now_ms, ran
        ));
        Ok(())
    }

    fn advance_clock_to(&mut self, target_ms: i64) -> Result<usize> {
        let ran = self.run_timer_queue(Some(target_ms), true)?;
        self.scheduler.now_ms = target_ms;
        Ok(ran)
    }

    /// Run the whole queue to exhaustion, advancing the clock to each task's
    /// due time.
    pub fn flush(&mut self) -> Result<()> {
        let from = self.scheduler.now_ms;
        let ran = self.run_timer_queue(None, true)?;
        self.trace_timer_line(format!(
            "[timer] flush from={} to={} ran={}",
            from, self.scheduler.now_ms, ran
        ));
        Ok(())
    }

    /// Run the next scheduled task regardless of due time, advancing the
    /// clock to it. Returns false when the queue is empty.
    pub fn run_next_timer(&mut self) -> Result<bool> {
        let Some(next_idx) = self.scheduler.next_task_index(None) else {
            self.trace_timer_line("[timer] run_next none".into());
            return Ok(false);
        };
        let task = self.scheduler.task_queue.remove(next_idx);
        if task.due_at > self.scheduler.now_ms {
            self.scheduler.now_ms = task.due_at;
        }
        self.execute_timer_task(task)?;
        Ok(true)
    }

    pub fn run_due_timers(&mut self) -> Result<usize> {
        let ran = self.run_due_timers_internal()?;
        self.trace_timer_line(format!(
            "[timer] run_due now_ms={} ran={}",
            self.scheduler.now_ms, ran
        ));
        Ok(ran)
    }

    fn run_due_timers_internal(&mut self) -> Result<usize> {
        self.run_timer_queue(Some(self.scheduler.now_ms), false)
    }

    fn run_timer_queue(&mut self, due_limit: Option<i64>, advance_clock: bool) -> Result<usize> {
        let mut steps = 0usize;
        while let Some(next_idx) = self.scheduler.next_task_index(due_limit) {
            steps += 1;
            if steps > self.scheduler.timer_step_limit {
                return Err(Error::Runtime(format!(
                    "timer queue exceeded step limit ({} steps); a task is likely rescheduling itself",
                    self.scheduler.timer_step_limit
                )));
            }
            let task = self.scheduler.task_queue.remove(next_idx);
            if advance_clock && task.due_at > self.scheduler.now_ms {
                self.scheduler.now_ms = task.due_at;
            }
            self.execute_timer_task(task)?;
        }
        Ok(steps)
    }

    fn execute_timer_task(&mut self, task: crate::scheduler::ScheduledTask) -> Result<()> {
        self.trace_timer_line(format!(
            "[timer] fire id={} due_at={} now_ms={}",
            task.id, task.due_at, self.scheduler.now_ms
        ));
        task.callback.invoke(self)
    }

    fn trace_timer_line(&mut self, line: String) {
        if self.trace_timers {
            self.trace_logs.push(line);
        }
    }

    // ---- trace logs ----

    pub fn set_trace_timers(&mut self, enabled: bool) {
        self.trace_timers = enabled;
    }

    pub fn set_trace_events(&mut self, enabled: bool) {
        self.trace_events = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }
}

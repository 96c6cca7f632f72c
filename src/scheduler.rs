use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::Result;
use crate::harness::Harness;

pub(crate) type TaskFn = dyn FnMut(&mut Harness) -> Result<()>;

#[derive(Clone)]
pub(crate) struct TaskCallback(pub(crate) Rc<RefCell<TaskFn>>);

impl TaskCallback {
    pub(crate) fn new<F>(callback: F) -> Self
    where
        F: FnMut(&mut Harness) -> Result<()> + 'static,
    {
        Self(Rc::new(RefCell::new(callback)))
    }

    pub(crate) fn invoke(&self, harness: &mut Harness) -> Result<()> {
        (self.0.borrow_mut())(harness)
    }
}

impl fmt::Debug for TaskCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskCallback({:p})", Rc::as_ptr(&self.0))
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ScheduledTask {
    pub(crate) id: i64,
    pub(crate) due_at: i64,
    pub(crate) order: i64,
    pub(crate) callback: TaskCallback,
}

/// Queue snapshot entry, for inspecting what is scheduled without running it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: i64,
    pub due_at: i64,
    pub order: i64,
}

#[derive(Debug)]
pub(crate) struct SchedulerState {
    pub(crate) now_ms: i64,
    pub(crate) task_queue: Vec<ScheduledTask>,
    pub(crate) timer_step_limit: usize,
    next_timer_id: i64,
    next_order: i64,
}

impl SchedulerState {
    pub(crate) fn new() -> Self {
        Self {
            now_ms: 0,
            task_queue: Vec::new(),
            timer_step_limit: 10_000,
            next_timer_id: 1,
            next_order: 0,
        }
    }

    pub(crate) fn schedule(&mut self, delay_ms: i64, callback: TaskCallback) -> i64 {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let order = self.next_order;
        self.next_order += 1;
        self.task_queue.push(ScheduledTask {
            id,
            due_at: self.now_ms.saturating_add(delay_ms.max(0)),
            order,
            callback,
        });
        id
    }

    pub(crate) fn clear(&mut self, timer_id: i64) -> bool {
        let before = self.task_queue.len();
        self.task_queue.retain(|task| task.id != timer_id);
        self.task_queue.len() != before
    }

    pub(crate) fn clear_all(&mut self) -> usize {
        let cleared = self.task_queue.len();
        self.task_queue.clear();
        cleared
    }

    pub(crate) fn pending(&self) -> Vec<PendingTimer> {
        let mut timers = self
            .task_queue
            .iter()
            .map(|task| PendingTimer {
                id: task.id,
                due_at: task.due_at,
                order: task.order,
            })
            .collect::<Vec<_>>();
        timers.sort_by_key(|timer| (timer.due_at, timer.order));
        timers
    }

    /// Index of the next task to run: earliest due time, FIFO on ties.
    /// `due_limit` restricts the search to tasks due at or before it.
    pub(crate) fn next_task_index(&self, due_limit: Option<i64>) -> Option<usize> {
        let mut best: Option<(usize, i64, i64)> = None;
        for (idx, task) in self.task_queue.iter().enumerate() {
            if let Some(limit) = due_limit {
                if task.due_at > limit {
                    continue;
                }
            }
            let key = (task.due_at, task.order);
            match best {
                Some((_, due, order)) if (due, order) <= key => {}
                _ => best = Some((idx, task.due_at, task.order)),
            }
        }
        best.map(|(idx, _, _)| idx)
    }
}

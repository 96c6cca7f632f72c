use super::*;

use std::cell::RefCell;
use std::rc::Rc;

fn record(log: &Rc<RefCell<Vec<&'static str>>>, tag: &'static str) -> impl FnMut(&mut Harness) -> Result<()> + 'static {
    let log = Rc::clone(log);
    move |_h| {
        log.borrow_mut().push(tag);
        Ok(())
    }
}

#[test]
fn due_timers_run_in_due_then_fifo_order() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    h.set_timeout(10, record(&log, "later"));
    h.set_timeout(5, record(&log, "first"));
    h.set_timeout(5, record(&log, "second"));

    h.advance_time(10)?;
    assert_eq!(*log.borrow(), vec!["first", "second", "later"]);
    Ok(())
}

#[test]
fn advance_time_runs_only_due_tasks() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    h.set_timeout(5, record(&log, "a"));
    h.set_timeout(8, record(&log, "b"));

    h.advance_time(5)?;
    assert_eq!(*log.borrow(), vec!["a"]);
    assert_eq!(h.pending_timers().len(), 1);

    h.advance_time(3)?;
    assert_eq!(*log.borrow(), vec!["a", "b"]);
    Ok(())
}

#[test]
fn advance_time_to_runs_due_timers_until_target() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    h.set_timeout(7, record(&log, "a"));
    h.set_timeout(12, record(&log, "b"));

    h.advance_time_to(7)?;
    assert_eq!(*log.borrow(), vec!["a"]);
    assert_eq!(h.now_ms(), 7);

    h.advance_time_to(12)?;
    assert_eq!(*log.borrow(), vec!["a", "b"]);
    Ok(())
}

#[test]
fn advance_time_rejects_negative_delta() {
    let mut h = Harness::from_html("<p>x</p>").unwrap();
    assert!(matches!(h.advance_time(-1), Err(Error::Runtime(_))));
}

#[test]
fn advance_time_to_rejects_past_target() {
    let mut h = Harness::from_html("<p>x</p>").unwrap();
    h.advance_time(3).unwrap();
    assert!(matches!(h.advance_time_to(2), Err(Error::Runtime(_))));
}

#[test]
fn run_next_timer_jumps_the_clock_to_the_task() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));
    h.set_timeout(40, record(&log, "a"));

    assert!(h.run_next_timer()?);
    assert_eq!(h.now_ms(), 40);
    assert_eq!(*log.borrow(), vec!["a"]);
    assert!(!h.run_next_timer()?);
    Ok(())
}

#[test]
fn chained_task_fires_within_one_advance_relative_to_its_parent() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    // A task firing at t=5 schedules a follow-up 5ms later. The follow-up
    // is due at 10, not 15: the parent runs with the clock at its own due
    // time, and a single advance covering both deadlines drains both.
    let chained = Rc::clone(&log);
    h.set_timeout(5, move |h| {
        chained.borrow_mut().push(("outer", h.now_ms()));
        let inner = Rc::clone(&chained);
        h.set_timeout(5, move |h| {
            inner.borrow_mut().push(("inner", h.now_ms()));
            Ok(())
        });
        Ok(())
    });

    h.advance_time(10)?;
    assert_eq!(*log.borrow(), vec![("outer", 5), ("inner", 10)]);
    assert_eq!(h.now_ms(), 10);
    assert!(h.pending_timers().is_empty());
    Ok(())
}

#[test]
fn flush_drains_chained_tasks() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    let chained = Rc::clone(&log);
    h.set_timeout(5, move |h| {
        chained.borrow_mut().push("outer");
        let inner = Rc::clone(&chained);
        h.set_timeout(5, move |_h| {
            inner.borrow_mut().push("inner");
            Ok(())
        });
        Ok(())
    });

    h.flush()?;
    assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    assert_eq!(h.now_ms(), 10);
    Ok(())
}

#[test]
fn cleared_timers_never_fire() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let log = Rc::new(RefCell::new(Vec::new()));

    let keep = h.set_timeout(5, record(&log, "keep"));
    let drop_id = h.set_timeout(5, record(&log, "drop"));

    assert!(h.clear_timer(drop_id));
    assert!(!h.clear_timer(drop_id));

    h.advance_time(5)?;
    assert_eq!(*log.borrow(), vec!["keep"]);
    assert!(!h.clear_timer(keep));
    Ok(())
}

#[test]
fn clear_all_timers_reports_how_many_were_dropped() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    h.set_timeout(1, |_h| Ok(()));
    h.set_timeout(2, |_h| Ok(()));
    assert_eq!(h.clear_all_timers(), 2);
    assert!(h.pending_timers().is_empty());
    Ok(())
}

#[test]
fn pending_timers_snapshot_is_sorted_by_due_then_order() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    let b = h.set_timeout(9, |_h| Ok(()));
    let a = h.set_timeout(3, |_h| Ok(()));
    let c = h.set_timeout(9, |_h| Ok(()));

    let pending = h.pending_timers();
    assert_eq!(
        pending.iter().map(|timer| timer.id).collect::<Vec<_>>(),
        vec![a, b, c]
    );
    assert_eq!(pending[0].due_at, 3);
    Ok(())
}

#[test]
fn self_rescheduling_task_trips_the_step_limit() -> Result<()> {
    let mut h = Harness::from_html("<p>x</p>")?;
    h.set_timer_step_limit(16)?;

    fn reschedule(h: &mut Harness) -> Result<()> {
        h.set_timeout(0, reschedule);
        Ok(())
    }
    h.set_timeout(0, reschedule);

    assert!(matches!(h.advance_time(0), Err(Error::Runtime(_))));
    Ok(())
}

#[test]
fn step_limit_must_be_positive() {
    let mut h = Harness::from_html("<p>x</p>").unwrap();
    assert!(matches!(h.set_timer_step_limit(0), Err(Error::Runtime(_))));
}

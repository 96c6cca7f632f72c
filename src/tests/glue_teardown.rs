use super::*;

#[test]
fn guard_teardown_removes_both_window_listeners() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let guard = DropGuard::install(&mut h);
    assert_eq!(h.listener_count(EventTarget::Window, "drop"), 1);
    assert_eq!(h.listener_count(EventTarget::Window, "dragover"), 1);

    guard.teardown(&mut h);
    assert_eq!(h.listener_count(EventTarget::Window, "drop"), 0);
    assert_eq!(h.listener_count(EventTarget::Window, "dragover"), 0);

    let event = h.dispatch_window("drop")?;
    assert!(!event.default_prevented());
    Ok(())
}

#[test]
fn flash_teardown_cancels_pending_dismissal() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let glue = FlashDismiss::install(&mut h)?;
    assert_eq!(h.pending_timers().len(), 2);

    glue.teardown(&mut h);
    assert!(h.pending_timers().is_empty());

    h.advance_time(10_000)?;
    assert_eq!(h.query_all(".alert")?.len(), 2);
    Ok(())
}

#[test]
fn flash_teardown_mid_fade_cancels_the_removal() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let glue = FlashDismiss::install(&mut h)?;

    h.advance_time(4000)?;
    glue.teardown(&mut h);
    assert!(h.pending_timers().is_empty());

    h.advance_time(10_000)?;
    // Faded but never removed: the view owns what happens next.
    assert_eq!(h.query_all(".alert")?.len(), 2);
    h.assert_style(".alert", "opacity", "0")?;
    Ok(())
}

#[test]
fn reinstall_after_teardown_does_not_accumulate_listeners() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;

    for _ in 0..3 {
        let glue = PageGlue::install(&mut h)?;
        assert_eq!(h.listener_count(EventTarget::Window, "drop"), 1);
        assert_eq!(h.listener_count(EventTarget::Window, "dragover"), 1);
        glue.teardown(&mut h);
        assert_eq!(h.listener_count(EventTarget::Window, "drop"), 0);
    }
    Ok(())
}

#[test]
fn teardown_after_completion_is_a_quiet_no_op() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let glue = PageGlue::install(&mut h)?;

    h.advance_time(4500)?;
    h.assert_absent(".alert")?;

    glue.teardown(&mut h);
    assert!(h.pending_timers().is_empty());
    let event = h.dispatch_window("drop")?;
    assert!(!event.default_prevented());
    Ok(())
}

#[test]
fn trace_logs_record_the_dismissal_sequence() -> Result<()> {
    let mut h = Harness::from_html("<div class='alert'>one</div>")?;
    let _glue = PageGlue::install(&mut h)?;
    h.take_trace_logs();

    h.advance_time(4500)?;
    let logs = h.take_trace_logs();
    assert!(logs.iter().any(|line| line.starts_with("[timer] fire")));
    assert!(
        logs.iter()
            .any(|line| line.starts_with("[timer] schedule") && line.contains("due_at=4500"))
    );
    Ok(())
}

#[test]
fn trace_logs_record_guarded_events() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);
    h.set_trace_timers(false);

    h.dispatch_window("drop")?;
    let logs = h.take_trace_logs();
    assert!(
        logs.iter().any(|line| {
            line.starts_with("[event] done drop") && line.contains("default_prevented=true")
        })
    );
    Ok(())
}

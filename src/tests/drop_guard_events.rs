use super::*;

use std::cell::Cell;
use std::rc::Rc;

#[test]
fn drop_on_window_is_prevented() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);
    let event = h.dispatch_window("drop")?;
    assert!(event.default_prevented());
    Ok(())
}

#[test]
fn dragover_on_window_is_prevented() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);
    let event = h.dispatch_window("dragover")?;
    assert!(event.default_prevented());
    Ok(())
}

#[test]
fn drop_anywhere_in_the_tree_bubbles_into_the_guard() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);

    for selector in ["#content", "#dropzone", ".alert-success"] {
        let event = h.dispatch(selector, "drop")?;
        assert!(event.default_prevented(), "drop on {selector}");
        let event = h.dispatch(selector, "dragover")?;
        assert!(event.default_prevented(), "dragover on {selector}");
    }
    Ok(())
}

#[test]
fn unrelated_events_keep_their_default_action() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);
    let event = h.dispatch("#dropzone", "click")?;
    assert!(!event.default_prevented());
    Ok(())
}

#[test]
fn dropzone_handler_runs_before_the_window_guard() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);

    let seen = Rc::new(Cell::new(0usize));
    let seen_in_handler = Rc::clone(&seen);
    let zone = h.query("#dropzone")?;
    h.add_listener(
        EventTarget::Node(zone),
        "drop",
        false,
        Handler::new(move |_h, event| {
            // The guard sits above us on the window, so nothing has
            // prevented the default yet when the zone handler runs.
            assert!(!event.default_prevented());
            seen_in_handler.set(seen_in_handler.get() + 1);
            Ok(())
        }),
    );

    let event = h.dispatch("#dropzone", "drop")?;
    assert_eq!(seen.get(), 1);
    assert!(event.default_prevented());
    Ok(())
}

#[test]
fn guard_does_not_stop_propagation_for_other_window_listeners() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;

    let seen = Rc::new(Cell::new(0usize));
    let seen_in_handler = Rc::clone(&seen);
    // Registered before the guard, so it runs first in the bubble phase on
    // the window; the guard must still run after it.
    h.add_listener(
        EventTarget::Window,
        "drop",
        false,
        Handler::new(move |_h, _event| {
            seen_in_handler.set(seen_in_handler.get() + 1);
            Ok(())
        }),
    );
    let _guard = DropGuard::install(&mut h);

    let event = h.dispatch("#dropzone", "drop")?;
    assert_eq!(seen.get(), 1);
    assert!(event.default_prevented());
    Ok(())
}

#[test]
fn dropzone_stop_propagation_keeps_the_default_unprevented() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _guard = DropGuard::install(&mut h);

    let zone = h.query("#dropzone")?;
    h.add_listener(
        EventTarget::Node(zone),
        "drop",
        false,
        Handler::new(|_h, event| {
            event.stop_propagation();
            Ok(())
        }),
    );

    // A zone that consumes the event never lets it reach the window guard.
    let event = h.dispatch("#dropzone", "drop")?;
    assert!(!event.default_prevented());
    Ok(())
}

#[test]
fn listener_removed_mid_dispatch_does_not_fire() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;

    let second_ran = Rc::new(Cell::new(false));
    let second_flag = Rc::clone(&second_ran);
    let second = Handler::new(move |_h, _event| {
        second_flag.set(true);
        Ok(())
    });

    let doomed = second.clone();
    let first = Handler::new(move |h, _event| {
        assert!(h.remove_listener(EventTarget::Window, "drop", false, &doomed));
        Ok(())
    });

    h.add_listener(EventTarget::Window, "drop", false, first);
    h.add_listener(EventTarget::Window, "drop", false, second);

    h.dispatch_window("drop")?;
    assert!(!second_ran.get());
    Ok(())
}

#[test]
fn guard_handles_drop_during_an_alert_fade() -> Result<()> {
    let mut h = Harness::from_html(FLASH_PAGE)?;
    let _glue = PageGlue::install(&mut h)?;

    h.advance_time(2000)?;
    let event = h.dispatch_window("drop")?;
    assert!(event.default_prevented());
    assert_eq!(event.time_stamp_ms, 2000);

    h.advance_time(2500)?;
    h.assert_absent(".alert")?;
    Ok(())
}

#![forbid(unsafe_code)]

//! End-to-end lifecycle tests: factory, tracker and host driven together.
//!
//! Each test mounts components through `with_tracker`, changes reactive
//! sources, runs a flush and then plays the host's part by draining the
//! render queue into `force_update()`.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Value, json};
use tracklink::{
    BindConfig, BindError, FetchContext, MarkerCursorProbe, ReactiveComponent, RenderProps,
    RenderQueue, Snapshot, TrackedComponent, with_tracker,
};
use tracklink_tracker::Tracker;

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Flush the tracker, then force-update `component` once per queued request.
/// Returns the number of requests drained.
fn pump<P, O>(
    tracker: &Tracker,
    host: &RenderQueue,
    component: &mut TrackedComponent<Tracker, P, O>,
) -> usize
where
    P: Clone + PartialEq + 'static,
{
    tracker.flush().expect("flush settles");
    let ids = host.drain();
    for id in &ids {
        if *id == component.id() {
            component.force_update();
        }
    }
    ids.len()
}

fn render_count(p: &RenderProps<'_, ()>) -> String {
    if p.failed {
        return "failed".to_string();
    }
    match p.get("count") {
        Some(v) => format!("count={v}"),
        None => "empty".to_string(),
    }
}

fn state(pairs: &[(&str, Value)]) -> Snapshot {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// ============================================================================
// Reactivity
// ============================================================================

#[test]
fn source_change_rerenders_component() {
    init_tracing();
    let tracker = Tracker::new();
    let count = tracker.var(1);
    let source = count.clone();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": source.get() })))
        .wrap(render_count);
    let mut component = factory.mount(tracker.clone(), host.clone(), ());
    assert_eq!(component.render(), "count=1");

    count.set(2);
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), "count=2");
    assert_eq!(component.render_count(), 1);

    // Exactly one request per change, even with several writes.
    count.set(3);
    count.set(4);
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), "count=4");

    let stats = component.stats();
    assert_eq!(stats.forced_renders, 2);
    assert_eq!(stats.computations_created, 3);
    assert!(component.manager().has_live_computation());
}

#[test]
fn unchanged_sources_do_not_request_renders() {
    let tracker = Tracker::new();
    let count = tracker.var(1);
    let source = count.clone();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": source.get() })))
        .wrap(render_count);
    let mut component = factory.mount(tracker.clone(), host.clone(), ());

    count.set(1);
    assert_eq!(pump(&tracker, &host, &mut component), 0);
    assert_eq!(component.render_count(), 0);
}

#[test]
fn only_sources_read_by_last_fetch_are_tracked() {
    let tracker = Tracker::new();
    let use_a = tracker.var(true);
    let a = tracker.var("a1".to_string());
    let b = tracker.var("b1".to_string());
    let (flag, va, vb) = (use_a.clone(), a.clone(), b.clone());
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| {
        let value = if flag.get() { va.get() } else { vb.get() };
        Ok(json!({ "value": value }))
    })
    .wrap(|p: &RenderProps<'_, ()>| p.get("value").cloned());
    let mut component = factory.mount(tracker.clone(), host.clone(), ());

    b.set("b2".to_string());
    assert_eq!(pump(&tracker, &host, &mut component), 0);

    use_a.set(false);
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), Some(json!("b2")));

    a.set("a2".to_string());
    assert_eq!(pump(&tracker, &host, &mut component), 0);
}

// ============================================================================
// Update policy and prospective inputs
// ============================================================================

#[test]
fn pure_component_skips_equal_props() {
    let tracker = Tracker::new();
    let fetches = Rc::new(Cell::new(0u32));
    let f = Rc::clone(&fetches);
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |cx: &FetchContext<'_, u32>| {
        f.set(f.get() + 1);
        Ok(json!({ "id": *cx.props() }))
    })
    .wrap(|p: &RenderProps<'_, u32>| p.get("id").cloned());
    let mut component = factory.mount(tracker, host, 1);
    assert_eq!(fetches.get(), 1);

    assert!(!component.set_props(1));
    assert_eq!(fetches.get(), 1);

    assert!(component.set_props(2));
    assert_eq!(fetches.get(), 2);
    assert_eq!(component.render(), Some(json!(2)));
}

#[test]
fn plain_component_refetches_on_every_update() {
    let tracker = Tracker::new();
    let fetches = Rc::new(Cell::new(0u32));
    let f = Rc::clone(&fetches);
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, u32>| {
        f.set(f.get() + 1);
        Ok(json!({}))
    })
    .pure(false)
    .wrap(|_| ());
    let mut component = factory.mount(tracker, host, 1);

    assert!(component.set_props(1));
    assert!(component.set_props(1));
    assert_eq!(fetches.get(), 3);
    assert_eq!(component.render_count(), 2);
}

#[test]
fn fetch_sees_prospective_props_before_commit() {
    let tracker = Tracker::new();
    let seen: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
    let s = Rc::clone(&seen);
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |cx: &FetchContext<'_, String>| {
        s.borrow_mut().push(cx.props().clone());
        Ok(json!({ "for": cx.props() }))
    })
    .wrap(|p: &RenderProps<'_, String>| (p.props.clone(), p.get("for").cloned()));
    let mut component = factory.mount(tracker, host, "old".to_string());

    component.set_props("new".to_string());
    assert_eq!(*seen.borrow(), vec!["old".to_string(), "new".to_string()]);
    assert_eq!(component.props(), "new");
    assert_eq!(component.render(), ("new".to_string(), Some(json!("new"))));
}

#[test]
fn state_changes_reach_fetch() {
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(|cx: &FetchContext<'_, ()>| {
        let tab = cx.state().get("tab").cloned().unwrap_or(json!("home"));
        Ok(json!({ "tab": tab }))
    })
    .wrap(|p: &RenderProps<'_, ()>| p.get("tab").cloned());
    let mut component = factory.mount(tracker.clone(), host.clone(), ());
    assert_eq!(component.render(), Some(json!("home")));

    // Direct mutation runs the update pass synchronously.
    assert_eq!(component.set_state(state(&[("tab", json!("inbox"))])), Ok(true));
    assert_eq!(component.render(), Some(json!("inbox")));

    // Mutation through the handle is queued for the host.
    component
        .handle()
        .set_state(state(&[("tab", json!("sent"))]))
        .unwrap();
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), Some(json!("sent")));
    assert_eq!(component.state().get("tab"), Some(&json!("sent")));
}

// ============================================================================
// Failures
// ============================================================================

#[test]
fn fetch_error_renders_failed_and_recovers() {
    init_tracing();
    let tracker = Tracker::new();
    let healthy = tracker.var(true);
    let h = healthy.clone();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| {
        if h.get() {
            Ok(json!({ "count": 1 }))
        } else {
            Err(BindError::fetch("subscription not ready"))
        }
    })
    .wrap(render_count);
    let mut component = factory.mount(tracker.clone(), host.clone(), ());
    assert_eq!(component.render(), "count=1");

    healthy.set(false);
    pump(&tracker, &host, &mut component);
    assert_eq!(component.render(), "failed");
    assert!(component.is_failed());
    assert_eq!(component.data_value("count"), None);

    // The failed fetch still tracked `healthy`, so recovery is reactive.
    healthy.set(true);
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), "count=1");
    assert!(!component.is_failed());
}

#[test]
fn set_state_inside_fetch_fails_loudly_but_is_contained() {
    init_tracing();
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());
    let errors: Rc<RefCell<Vec<BindError>>> = Rc::new(RefCell::new(Vec::new()));
    let e = Rc::clone(&errors);

    let factory = with_tracker(move |cx: &FetchContext<'_, ()>| {
        if let Err(err) = cx.set_state(state(&[("loop", json!(true))])) {
            e.borrow_mut().push(err.clone());
            return Err(err);
        }
        Ok(json!({ "count": 1 }))
    })
    .wrap(render_count);
    let component = factory.mount(tracker, host.clone(), ());

    assert_eq!(*errors.borrow(), vec![BindError::ReentrantMutation]);
    assert_eq!(component.render(), "failed");
    assert_eq!(
        component.manager().last_error(),
        Some(&BindError::ReentrantMutation)
    );
    assert!(!component.handle().in_fetch_phase());
    assert!(component.state().is_empty());
    assert!(host.is_empty());
}

#[test]
fn ignoring_set_state_error_inside_fetch_still_fails() {
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(|cx: &FetchContext<'_, ()>| {
        let _ = cx.set_state(state(&[("loop", json!(true))]));
        Ok(json!({ "count": 1 }))
    })
    .wrap(render_count);
    let component = factory.mount(tracker, host.clone(), ());

    assert_eq!(component.render(), "failed");
    assert!(component.is_failed());
    assert_eq!(
        component.manager().last_error(),
        Some(&BindError::ReentrantMutation)
    );
    assert!(component.state().is_empty());
    assert!(host.is_empty());
}

#[test]
fn non_mapping_fetch_is_a_failure() {
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());
    let factory =
        with_tracker(|_: &FetchContext<'_, ()>| Ok(Value::Null)).wrap(render_count);
    let component = factory.mount(tracker, host, ());

    assert_eq!(component.render(), "failed");
    assert_eq!(
        component.manager().last_error(),
        Some(&BindError::NotAMapping { found: "null" })
    );
}

#[test]
fn did_catch_performs_no_recovery() {
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());
    let factory =
        with_tracker(|_: &FetchContext<'_, ()>| Ok(json!({ "count": 7 }))).wrap(render_count);
    let component = factory.mount(tracker, host.clone(), ());

    component.did_catch(&BindError::fetch("render blew up"));
    assert!(component.is_mounted());
    assert_eq!(component.render(), "count=7");
    assert!(host.is_empty());
}

// ============================================================================
// Teardown and insulation
// ============================================================================

#[test]
fn unmounted_component_never_requests_render() {
    let tracker = Tracker::new();
    let count = tracker.var(1);
    let source = count.clone();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": source.get() })))
        .wrap(render_count);
    let mut component = factory.mount(tracker.clone(), host.clone(), ());
    component.unmount();
    component.unmount();

    count.set(2);
    assert_eq!(pump(&tracker, &host, &mut component), 0);
    assert!(!component.set_props(()));
    assert!(!count.has_dependents());
    assert_eq!(component.handle().render_requests(), 0);
}

#[test]
fn mount_inside_enclosing_computation_is_insulated() {
    let tracker = Tracker::new();
    let outer = tracker.var(0);
    let count = tracker.var(1);
    let source = count.clone();
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": source.get() })))
        .wrap(render_count);

    let slot: Rc<RefCell<Option<TrackedComponent<Tracker, (), String>>>> =
        Rc::new(RefCell::new(None));
    let (t, h, o, s) = (tracker.clone(), host.clone(), outer.clone(), Rc::clone(&slot));
    let _enclosing = tracker.autorun(move |c| {
        let _ = o.get();
        if c.is_first_run() {
            *s.borrow_mut() = Some(factory.mount(t.clone(), h.clone(), ()));
        }
    });

    // The enclosing computation reruns; the component's must not stop.
    outer.set(1);
    tracker.flush().unwrap();
    let mut component = slot.borrow_mut().take().unwrap();
    assert!(component.manager().has_live_computation());

    count.set(2);
    assert_eq!(pump(&tracker, &host, &mut component), 1);
    assert_eq!(component.render(), "count=2");
}

#[test]
fn components_are_independent() {
    let tracker = Tracker::new();
    let shared = tracker.var(1);
    let private = tracker.var(10);
    let (s1, s2, p2) = (shared.clone(), shared.clone(), private.clone());
    let host = Rc::new(RenderQueue::new());

    let only_shared = with_tracker(move |_: &FetchContext<'_, ()>| Ok(json!({ "count": s1.get() })))
        .wrap(render_count);
    let both = with_tracker(move |_: &FetchContext<'_, ()>| {
        Ok(json!({ "count": s2.get() + p2.get() }))
    })
    .wrap(render_count);

    let first = only_shared.mount(tracker.clone(), host.clone(), ());
    let mut second = both.mount(tracker.clone(), host.clone(), ());

    private.set(20);
    tracker.flush().unwrap();
    assert_eq!(host.drain(), vec![second.id()]);
    second.force_update();
    assert_eq!(second.render(), "count=21");

    shared.set(2);
    tracker.flush().unwrap();
    assert_eq!(host.drain(), vec![first.id(), second.id()]);
}

// ============================================================================
// Server environment and cursor warnings
// ============================================================================

#[test]
fn server_environment_fetches_without_tracking() {
    let tracker = Tracker::new();
    let count = tracker.var(1);
    let source = count.clone();
    let fetches = Rc::new(Cell::new(0u32));
    let f = Rc::clone(&fetches);
    let host = Rc::new(RenderQueue::new());

    let factory = with_tracker(move |_: &FetchContext<'_, ()>| {
        f.set(f.get() + 1);
        Ok(json!({ "count": source.get() }))
    })
    .config(BindConfig::server())
    .wrap(render_count);

    let mut component = factory.mount(tracker.clone(), host.clone(), ());
    component.force_update();
    assert_eq!(fetches.get(), 2);
    assert_eq!(component.stats().computations_created, 0);
    assert!(!component.manager().has_live_computation());

    count.set(2);
    assert_eq!(pump(&tracker, &host, &mut component), 0);
    assert!(!count.has_dependents());
}

#[test]
fn live_cursor_in_data_warns_once_per_fetch() {
    init_tracing();
    let tracker = Tracker::new();
    let host = Rc::new(RenderQueue::new());
    let factory = with_tracker(|_: &FetchContext<'_, ()>| {
        Ok(json!({ "tasks": { "$cursor": "tasks" }, "count": 1 }))
    })
    .cursor_probe(MarkerCursorProbe::default())
    .pure(false)
    .wrap(render_count);

    let mut component = factory.mount(tracker, host, ());
    component.set_props(());
    assert_eq!(component.stats().cursor_warnings, 2);
    assert_eq!(component.render(), "count=1");
    assert!(!component.is_failed());
}

//! ビューのライフサイクル全体を通したシナリオテスト
//!
//! ホストは `MemoryHost`、時刻は `ManualClock` で進める。

use std::path::PathBuf;
use std::rc::Rc;

use iniview::host::memory::HostEvent;
use iniview::{
    BindingError, BindingState, BoundFile, EditorAdapter, EditorView, ManualClock, MemoryHost,
    TextSurface, ViewConfig, ViewHandle, ViewLifecycle,
};

struct Harness {
    view: EditorView<TextSurface, MemoryHost>,
    surface: TextSurface,
    host: MemoryHost,
    clock: ManualClock,
}

fn harness_with(config: ViewConfig) -> Harness {
    let host = MemoryHost::new()
        .with_file("a.ini", "[s]\nk=1\n")
        .with_file("b.ini", "[other]\nx=1\n");
    let clock = ManualClock::new();
    let surface = TextSurface::new();
    let handle = surface.clone();
    let mut view = EditorView::new(
        ViewHandle(1),
        Rc::new(config),
        host.clone(),
        Box::new(move || Ok(handle.clone())),
        Rc::new(clock.clone()),
    );
    view.on_create().unwrap();
    Harness {
        view,
        surface,
        host,
        clock,
    }
}

fn harness() -> Harness {
    harness_with(ViewConfig::default())
}

fn a() -> BoundFile {
    BoundFile::new("a.ini")
}

fn b() -> BoundFile {
    BoundFile::new("b.ini")
}

#[test]
fn test_scenario_edit_then_quiet_period_saves_once() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    assert_eq!(h.view.current_content().unwrap(), "[s]\nk=1\n");

    h.surface.edit("[s]\nk=2\n");
    h.view.pump();
    h.clock.advance_ms(2000);
    h.view.pump();

    assert_eq!(h.host.writes_to("a.ini"), vec!["[s]\nk=2\n".to_string()]);

    h.clock.advance_ms(10_000);
    h.view.pump();
    assert_eq!(h.host.writes().len(), 1);
}

#[test]
fn test_scenario_switch_before_delay_flushes_previous_file_first() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.host.clear_events();

    h.surface.edit("[s]\nk=2\n");
    h.view.pump();
    h.clock.advance_ms(500);
    h.view.pump();
    assert!(h.host.writes().is_empty());

    h.view.on_file_attach(b()).unwrap();

    assert_eq!(
        h.host.events(),
        vec![
            HostEvent::Write(PathBuf::from("a.ini"), "[s]\nk=2\n".to_string()),
            HostEvent::Read(PathBuf::from("b.ini")),
        ]
    );
    assert_eq!(h.view.current_content().unwrap(), "[other]\nx=1\n");

    // 元のタイマーは取り消されている
    h.clock.advance_ms(5000);
    h.view.pump();
    assert_eq!(h.host.writes_to("a.ini").len(), 1);
    assert!(h.host.writes_to("b.ini").is_empty());
}

#[test]
fn test_switch_without_pump_still_keeps_last_edit() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();

    // イベントループを回す前に切り替えが来ても編集は失われない
    h.surface.type_text("late=1\n");
    h.view.on_file_attach(b()).unwrap();

    assert_eq!(
        h.host.writes_to("a.ini"),
        vec!["[s]\nk=1\nlate=1\n".to_string()]
    );
}

#[test]
fn test_switching_resets_history() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.type_text("k2=1\n");
    h.view.on_file_attach(b()).unwrap();

    assert!(!h.surface.can_undo());
    assert_eq!(h.view.display_text(), "b");
}

#[test]
fn test_detach_from_dirty_flushes_before_completing() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.edit("[s]\nk=7\n");
    h.view.pump();
    assert_eq!(h.view.state(), BindingState::Dirty);

    h.view.on_file_detach(&a()).unwrap();

    assert_eq!(h.view.state(), BindingState::Unbound);
    assert_eq!(h.host.content("a.ini").as_deref(), Some("[s]\nk=7\n"));
    assert_eq!(h.surface.content(), "");
    assert_eq!(h.view.display_text(), "ini (no file)");

    h.clock.advance_ms(5000);
    h.view.pump();
    assert_eq!(h.host.writes().len(), 1);
}

#[test]
fn test_clean_round_trip_writes_nothing() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.view.pump();
    h.view.on_file_detach(&a()).unwrap();
    h.clock.advance_ms(5000);
    h.view.pump();

    assert!(h.host.writes().is_empty());
}

#[test]
fn test_destroy_twice_disposes_once_and_writes_once() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.type_text("x=1\n");

    h.view.on_destroy().unwrap();
    h.view.on_destroy().unwrap();
    h.clock.advance_ms(5000);
    h.view.pump();

    assert!(h.surface.is_disposed());
    assert_eq!(h.host.writes().len(), 1);
    assert_eq!(h.view.current_content(), Err(BindingError::AdapterNotReady));
}

#[test]
fn test_failed_flush_on_switch_keeps_edits_and_file() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.edit("[s]\nunsaved=1\n");
    h.host.fail_next_writes(2);

    let err = h.view.on_file_attach(b()).unwrap_err();

    assert_eq!(
        err,
        BindingError::UnsavedContent {
            path: "a.ini".to_string(),
            content: "[s]\nunsaved=1\n".to_string(),
        }
    );
    assert_eq!(h.view.state(), BindingState::Dirty);
    assert_eq!(h.view.binding().file(), Some(&a()));
    assert_eq!(h.surface.content(), "[s]\nunsaved=1\n");

    // 書き込みが回復すれば切り替えられる
    h.view.on_file_attach(b()).unwrap();
    assert_eq!(h.host.content("a.ini").as_deref(), Some("[s]\nunsaved=1\n"));
    assert_eq!(h.view.current_content().unwrap(), "[other]\nx=1\n");
}

#[test]
fn test_flush_retry_on_detach_succeeds_after_one_failure() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.edit("[s]\nk=3\n");
    h.host.fail_next_writes(1);

    h.view.on_file_detach(&a()).unwrap();
    assert_eq!(h.host.writes_to("a.ini"), vec!["[s]\nk=3\n".to_string()]);
    assert_eq!(h.view.state(), BindingState::Unbound);
}

#[test]
fn test_destroy_with_failing_host_returns_content() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.edit("rescue me");
    h.host.fail_next_writes(usize::MAX);

    match h.view.on_destroy() {
        Err(BindingError::UnsavedContent { content, .. }) => assert_eq!(content, "rescue me"),
        other => panic!("expected unsaved content, got {:?}", other),
    }
    assert!(h.surface.is_disposed());
}

#[test]
fn test_empty_read_is_treated_as_load_failure() {
    let mut h = harness();
    h.host.return_nothing_for("a.ini");
    h.view.on_file_attach(a()).unwrap();

    assert_eq!(h.view.state(), BindingState::Bound);
    assert_eq!(h.view.current_content().unwrap(), "");
    assert!(matches!(
        h.view.binding().last_error(),
        Some(BindingError::Load { .. })
    ));
}

#[test]
fn test_reattaching_same_file_does_not_reload() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.surface.type_text("pending=1\n");
    h.view.on_file_attach(a()).unwrap();

    assert_eq!(h.surface.content(), "[s]\nk=1\npending=1\n");
    assert_eq!(h.view.state(), BindingState::Dirty);
    assert!(h.host.writes().is_empty());
}

#[test]
fn test_external_reload_is_not_a_user_edit() {
    let mut h = harness();
    h.view.on_file_attach(a()).unwrap();
    h.view.on_external_change(&a(), "[s]\nk=5\n");
    h.view.pump();
    h.clock.advance_ms(5000);
    h.view.pump();

    assert_eq!(h.view.state(), BindingState::Bound);
    assert_eq!(h.view.current_content().unwrap(), "[s]\nk=5\n");
    assert!(h.host.writes().is_empty());
}

#[test]
fn test_custom_debounce_delay_is_honoured() {
    let mut config = ViewConfig::default();
    config.debounce_ms = 300;
    let mut h = harness_with(config);
    h.view.on_file_attach(a()).unwrap();

    h.surface.type_text("a=1\n");
    h.view.pump();
    h.clock.advance_ms(299);
    h.view.pump();
    assert!(h.host.writes().is_empty());

    h.clock.advance_ms(1);
    h.view.pump();
    assert_eq!(h.host.writes().len(), 1);
}

#[test]
fn test_in_flight_write_is_awaited_by_detach() {
    let mut h = harness();
    h.host.set_deferred_writes(true);
    h.view.on_file_attach(a()).unwrap();

    h.surface.edit("[s]\nk=8\n");
    h.view.pump();
    h.clock.advance_ms(2000);
    h.view.pump();
    assert_eq!(h.view.state(), BindingState::Saving);

    h.view.on_file_detach(&a()).unwrap();
    assert_eq!(h.host.in_flight_writes(), 0);
    assert_eq!(h.host.writes_to("a.ini"), vec!["[s]\nk=8\n".to_string()]);
    assert_eq!(h.view.state(), BindingState::Unbound);
}

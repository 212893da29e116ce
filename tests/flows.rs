use std::time::Duration;

use atmos_globe::{
    app::{
        events::AppEvent,
        state::{AppMode, AppState},
    },
    cli::{Cli, DetailArg, LevelArg, OverlayArg, ProjectionArg},
    domain::globe::{ProjectionKind, View},
};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use tokio::sync::mpsc;
use tokio::time::timeout;

fn cli() -> Cli {
    Cli {
        state: None,
        projection: ProjectionArg::Orthographic,
        overlay: OverlayArg::Default,
        level: LevelArg::Surface,
        fps: 30,
        auto_rotate: 0.0,
        no_animation: true,
        night: false,
        clock: false,
        grid_points: false,
        detail: DetailArg::Low,
    }
}

fn key(code: KeyCode) -> AppEvent {
    AppEvent::Input(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

/// Pumps the event channel through the state machine until `done` holds.
/// Panics if two seconds pass without it holding.
async fn pump_until(
    state: &mut AppState,
    rx: &mut mpsc::Receiver<AppEvent>,
    tx: &mpsc::Sender<AppEvent>,
    cli: &Cli,
    done: impl Fn(&AppState) -> bool,
) {
    let deadline = timeout(Duration::from_secs(2), async {
        while !done(state) {
            let event = rx.recv().await.expect("event channel closed");
            state.handle_event(event, tx, cli).await.expect("event handling failed");
        }
    });
    deadline.await.expect("condition not reached in time");
}

#[tokio::test]
async fn flow_bootstrap_publishes_globe_grids_and_field() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, mut rx) = mpsc::channel(256);

    state.handle_event(AppEvent::Bootstrap, &tx, &cli).await.unwrap();
    pump_until(&mut state, &mut rx, &tx, &cli, |s| s.mode == AppMode::Ready).await;

    assert!(state.globe.value().is_some());
    assert!(state.mesh.value().is_some());
    assert!(state.grids.value().is_some());
    assert!(state.field.value().is_some());
    assert!(state.field_progress.is_none());
    assert!(state.last_error.is_none());
}

#[tokio::test]
async fn flow_projection_key_rebuilds_globe() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, mut rx) = mpsc::channel(256);

    state.handle_event(AppEvent::Bootstrap, &tx, &cli).await.unwrap();
    pump_until(&mut state, &mut rx, &tx, &cli, |s| s.mode == AppMode::Ready).await;

    state.handle_event(key(KeyCode::Char('j')), &tx, &cli).await.unwrap();
    assert_eq!(
        state.config.get().projection,
        ProjectionKind::Equirectangular
    );
    pump_until(&mut state, &mut rx, &tx, &cli, |s| {
        s.globe
            .value()
            .is_some_and(|g| g.kind() == ProjectionKind::Equirectangular)
    })
    .await;
}

#[tokio::test]
async fn flow_toggles_update_configuration() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, _rx) = mpsc::channel(256);

    assert!(!state.config.get().show_animation);
    state.handle_event(key(KeyCode::Char('a')), &tx, &cli).await.unwrap();
    assert!(state.config.get().show_animation);

    assert!(!state.config.get().show_night);
    state.handle_event(key(KeyCode::Char('k')), &tx, &cli).await.unwrap();
    assert!(state.config.get().show_night);

    let before = state.config.get().overlay;
    state.handle_event(key(KeyCode::Char('o')), &tx, &cli).await.unwrap();
    assert_ne!(state.config.get().overlay, before);
}

#[tokio::test]
async fn flow_autorotate_cycles_speeds() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, _rx) = mpsc::channel(256);

    assert!(state.config.get().auto_rotate_dpm.abs() < f64::EPSILON);
    state.handle_event(key(KeyCode::Char('r')), &tx, &cli).await.unwrap();
    assert!(state.config.get().auto_rotate_dpm > 0.0);
}

#[tokio::test]
async fn flow_quit_keys() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, _rx) = mpsc::channel(256);

    state.handle_event(key(KeyCode::Char('q')), &tx, &cli).await.unwrap();
    assert_eq!(state.mode, AppMode::Quit);
}

#[tokio::test]
async fn flow_help_swallows_escape() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, _rx) = mpsc::channel(256);

    state.handle_event(key(KeyCode::Char('?')), &tx, &cli).await.unwrap();
    assert!(state.show_help);
    state.handle_event(key(KeyCode::Esc), &tx, &cli).await.unwrap();
    assert!(!state.show_help);
    assert_ne!(state.mode, AppMode::Quit);
}

#[tokio::test]
async fn flow_click_selects_a_sample() {
    use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, mut rx) = mpsc::channel(256);

    state.handle_event(AppEvent::Bootstrap, &tx, &cli).await.unwrap();
    pump_until(&mut state, &mut rx, &tx, &cli, |s| s.mode == AppMode::Ready).await;

    // Center of an 80x23-cell map lands on the orthographic disc.
    for kind in [
        MouseEventKind::Down(MouseButton::Left),
        MouseEventKind::Up(MouseButton::Left),
    ] {
        let event = AppEvent::Input(Event::Mouse(MouseEvent {
            kind,
            column: 40,
            row: 11,
            modifiers: KeyModifiers::NONE,
        }));
        state.handle_event(event, &tx, &cli).await.unwrap();
    }

    let selected = state.selected.expect("click on the globe selects a point");
    assert!(selected.sample.is_some());
    assert!(selected.lat.abs() <= 90.0);
}

#[tokio::test]
async fn flow_config_token_reflects_keyboard_changes() {
    let cli = cli();
    let mut state = AppState::new(&cli, View::new(80, 46)).unwrap();
    let (tx, _rx) = mpsc::channel(256);

    assert!(state.config_token().contains("orthographic"));
    state.handle_event(key(KeyCode::Char('j')), &tx, &cli).await.unwrap();
    assert!(state.config_token().contains("equirectangular"));
}

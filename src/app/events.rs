use std::time::Duration;

use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::time::interval;

use crate::app::agent::Outcome;
use crate::app::config::ChangedSet;
use crate::domain::globe::Globe;
use crate::domain::grid::GridBundle;
use crate::domain::mesh::Mesh;
use crate::render::field::Field;

/// Repaint cadence for the day/night terminator.
pub const TERMINATOR_TICK: Duration = Duration::from_secs(1);
/// Coarser cadence for refreshing the terminator's cached visibility mask.
pub const MASK_REFRESH_TICK: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub enum AppEvent {
    Bootstrap,
    TickFrame,
    TickTerminator,
    TickMaskRefresh,
    Input(Event),
    /// A configuration save happened; the set names what changed.
    ConfigChanged(ChangedSet),
    GlobeBuilt(Outcome<Globe>),
    MeshBuilt(Outcome<Mesh>),
    GridsBuilt(Outcome<GridBundle>),
    FieldBuilt(Outcome<Field>),
    /// Fractional completion of the in-flight field interpolation.
    FieldProgress(f32),
    /// Host control surface: autorotation speed in degrees per minute.
    SetAutoRotate(f64),
    ToggleClock,
    ToggleNight,
    Quit,
}

pub fn spawn_input_task() -> impl futures::Stream<Item = Event> {
    EventStream::new().filter_map(|event| async move { event.ok() })
}

pub fn start_frame_task(tx: tokio::sync::mpsc::Sender<AppEvent>, fps: u8) {
    let fps = fps.clamp(5, 60);
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(1000_u64 / u64::from(fps)));
        loop {
            ticker.tick().await;
            if tx.send(AppEvent::TickFrame).await.is_err() {
                break;
            }
        }
    });
}

pub fn start_terminator_task(tx: tokio::sync::mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let mut ticker = interval(TERMINATOR_TICK);
        loop {
            ticker.tick().await;
            if tx.send(AppEvent::TickTerminator).await.is_err() {
                break;
            }
        }
    });
}

pub fn start_mask_refresh_task(tx: tokio::sync::mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let mut ticker = interval(MASK_REFRESH_TICK);
        loop {
            ticker.tick().await;
            if tx.send(AppEvent::TickMaskRefresh).await.is_err() {
                break;
            }
        }
    });
}

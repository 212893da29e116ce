use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use crossterm::event::{Event, KeyCode, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;

use crate::app::agent::{Accepted, Agent, BuildError};
use crate::app::config::{
    Attr, ChangedSet, ConfigStore, Configuration, DateSelection, OverlayType,
};
use crate::app::events::{
    AppEvent, start_frame_task, start_mask_refresh_task, start_terminator_task,
};
use crate::app::input::{Gesture, GestureTracker};
use crate::cli::Cli;
use crate::domain::globe::{Globe, ProjectionKind, View};
use crate::domain::grid::{GridBundle, Rgba, Sample, demo_temp, demo_wind};
use crate::domain::mesh::Mesh;
use crate::render::field::{self, Field};
use crate::render::mask::MaskCache;
use crate::render::overlay;
use crate::render::particles::ParticleAnimator;
use crate::render::surface::PixelSurface;

const COAST_COLOR: Rgba = Rgba(148, 148, 148, 255);
const LAKE_COLOR: Rgba = Rgba(92, 120, 160, 255);
const GRATICULE_COLOR: Rgba = Rgba(70, 70, 70, 180);
/// Keyboard rotation nudge in degrees.
const ARROW_STEP_DEG: f64 = 5.0;
const KEY_ZOOM_STEP: f64 = 1.15;
/// Accumulated autorotation that triggers a field re-interpolation.
const AUTOROTATE_REBUILD_DEG: f64 = 2.0;
/// Autorotation speeds cycled by the keyboard toggle, degrees per minute.
const AUTOROTATE_SPEEDS: &[f64] = &[0.0, 6.0, 30.0];
/// Projected segments longer than this fraction of the viewport's larger
/// dimension are seam artifacts, not real geometry.
const MAX_SEGMENT_FRAC: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Loading,
    Ready,
    Quit,
}

/// Geographic point resolved from a click, with the originating screen
/// cell and the sampled value.
#[derive(Debug, Clone, Copy)]
pub struct SelectedPoint {
    pub col: u16,
    pub row: u16,
    pub lon: f64,
    pub lat: f64,
    pub sample: Option<Sample>,
}

/// Control surface handed to embedding hosts: typed entry points routed
/// through the same event channel the keyboard uses.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<AppEvent>,
}

impl ControlHandle {
    #[must_use]
    pub fn new(tx: mpsc::Sender<AppEvent>) -> Self {
        Self { tx }
    }

    /// Sets the autorotation speed in degrees per minute; 0 stops it.
    pub async fn set_auto_rotate(&self, dpm: f64) {
        let _ = self.tx.send(AppEvent::SetAutoRotate(dpm)).await;
    }

    pub async fn toggle_clock(&self) {
        let _ = self.tx.send(AppEvent::ToggleClock).await;
    }

    pub async fn toggle_night(&self) {
        let _ = self.tx.send(AppEvent::ToggleNight).await;
    }

    pub async fn quit(&self) {
        let _ = self.tx.send(AppEvent::Quit).await;
    }
}

#[derive(Debug)]
pub struct AppState {
    pub mode: AppMode,
    pub running: bool,
    pub config: ConfigStore,
    pub view: View,
    pub globe: Agent<Globe>,
    pub mesh: Agent<Mesh>,
    pub grids: Agent<GridBundle>,
    pub field: Agent<Field>,
    pub animator: ParticleAnimator,
    pub gestures: GestureTracker,
    pub map_surface: PixelSurface,
    pub particle_surface: PixelSurface,
    pub night_surface: PixelSurface,
    night_mask: MaskCache,
    /// Sticky until explicitly reset or the next successful build.
    pub last_error: Option<String>,
    pub field_progress: Option<f32>,
    pub selected: Option<SelectedPoint>,
    pub show_help: bool,
    pub frame_tick: u64,
    pub last_frame_at: Instant,
    pending_rotation_deg: f64,
}

impl AppState {
    pub fn new(cli: &Cli, view: View) -> Result<Self> {
        let config = ConfigStore::new(cli.initial_configuration()?);
        Ok(Self {
            mode: AppMode::Loading,
            running: true,
            config,
            view,
            globe: Agent::new(),
            mesh: Agent::new(),
            grids: Agent::new(),
            field: Agent::new(),
            animator: ParticleAnimator::new(view),
            gestures: GestureTracker::new(),
            map_surface: PixelSurface::new(view),
            particle_surface: PixelSurface::new(view),
            night_surface: PixelSurface::new(view),
            night_mask: MaskCache::new(),
            last_error: None,
            field_progress: None,
            selected: None,
            show_help: false,
            frame_tick: 0,
            last_frame_at: Instant::now(),
            pending_rotation_deg: 0.0,
        })
    }

    /// Shareable token for the current view state.
    #[must_use]
    pub fn config_token(&self) -> String {
        self.config.get().to_token()
    }

    pub async fn handle_event(
        &mut self,
        event: AppEvent,
        tx: &mpsc::Sender<AppEvent>,
        cli: &Cli,
    ) -> Result<()> {
        match event {
            AppEvent::Bootstrap => {
                cli.validate()?;
                start_frame_task(tx.clone(), cli.fps);
                start_terminator_task(tx.clone());
                start_mask_refresh_task(tx.clone());
                self.submit_mesh(tx, cli);
                self.submit_grids(tx);
                self.submit_globe(tx);
            }
            AppEvent::TickFrame => self.on_frame(tx),
            AppEvent::TickTerminator => self.repaint_terminator(),
            AppEvent::TickMaskRefresh => self.night_mask.invalidate(),
            AppEvent::Input(input) => self.handle_input(input, tx),
            AppEvent::ConfigChanged(changed) => self.apply_changes(&changed, tx),
            AppEvent::GlobeBuilt(outcome) => {
                match self.globe.accept(outcome) {
                    Accepted::Published { .. } => {
                        // A new globe object restarts its generation counter;
                        // the cached mask cannot tell, so drop it explicitly.
                        self.night_mask.invalidate();
                        self.redraw_map();
                        self.repaint_terminator();
                        self.submit_field(tx);
                    }
                    Accepted::Rejected(reason) => self.report_error(reason),
                    Accepted::Discarded => {}
                }
            }
            AppEvent::MeshBuilt(outcome) => match self.mesh.accept(outcome) {
                Accepted::Published { .. } => self.redraw_map(),
                Accepted::Rejected(reason) => self.report_error(reason),
                Accepted::Discarded => {}
            },
            AppEvent::GridsBuilt(outcome) => match self.grids.accept(outcome) {
                Accepted::Published { .. } => self.submit_field(tx),
                Accepted::Rejected(reason) => self.report_error(reason),
                Accepted::Discarded => {}
            },
            AppEvent::FieldBuilt(outcome) => match self.field.accept(outcome) {
                Accepted::Published { previous } => {
                    if let Some(mut superseded) = previous {
                        superseded.release();
                    }
                    self.field_progress = None;
                    self.mode = AppMode::Ready;
                }
                Accepted::Rejected(reason) => {
                    self.field_progress = None;
                    self.report_error(reason);
                }
                Accepted::Discarded => {}
            },
            AppEvent::FieldProgress(progress) => {
                if self.field.in_flight() {
                    self.field_progress = Some(progress);
                }
            }
            AppEvent::SetAutoRotate(dpm) => {
                let mut next = self.config.get().clone();
                next.auto_rotate_dpm = dpm;
                self.save_and_notify(next, tx);
            }
            AppEvent::ToggleClock => {
                let mut next = self.config.get().clone();
                next.show_clock = !next.show_clock;
                self.save_and_notify(next, tx);
            }
            AppEvent::ToggleNight => {
                let mut next = self.config.get().clone();
                next.show_night = !next.show_night;
                self.save_and_notify(next, tx);
            }
            AppEvent::Quit => self.mode = AppMode::Quit,
        }
        Ok(())
    }

    fn on_frame(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame_at);
        self.last_frame_at = now;
        self.frame_tick = self.frame_tick.saturating_add(1);

        if let Some(gesture) = self.gestures.poll_quiet(now) {
            self.apply_gesture(gesture, tx);
        }

        let dpm = self.config.get().auto_rotate_dpm;
        if dpm.abs() > f64::EPSILON && !self.gestures.is_manipulating() {
            let dlon = dpm * dt.as_secs_f64() / 60.0;
            if let Some(globe) = self.globe.value_mut() {
                globe.rotate_by(dlon, 0.0);
            }
            self.redraw_map();
            self.pending_rotation_deg += dlon.abs();
            if self.pending_rotation_deg >= AUTOROTATE_REBUILD_DEG && !self.field.in_flight() {
                self.submit_field(tx);
            }
        }

        if self.config.get().show_animation {
            if let Some(grids) = self.grids.value() {
                let grid = grids.primary.clone();
                let mut rng = rand::rng();
                self.animator.evolve(grid.as_ref(), &mut rng);
                // Snapshot the projection once so evolve and draw agree
                // within this tick even while rotation is advancing.
                if let Some(globe) = self.globe.value() {
                    let snapshot = globe.clone();
                    self.animator
                        .draw(&snapshot, grid.as_ref(), &mut self.particle_surface);
                }
            }
        }
    }

    fn repaint_terminator(&mut self) {
        if !self.config.get().show_night {
            return;
        }
        let Some(globe) = self.globe.value() else {
            return;
        };
        let mask = self.night_mask.get(globe);
        overlay::paint(globe, mask, Utc::now(), &mut self.night_surface);
    }

    fn handle_input(&mut self, event: Event, tx: &mpsc::Sender<AppEvent>) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if key.modifiers.intersects(KeyModifiers::CONTROL) {
                    if key.code == KeyCode::Char('c') {
                        self.mode = AppMode::Quit;
                    }
                    return;
                }
                self.handle_key(key.code, tx);
            }
            Event::Mouse(mouse) => {
                for gesture in self.gestures.on_mouse(mouse) {
                    self.apply_gesture(gesture, tx);
                }
            }
            Event::Resize(cols, rows) => {
                let view = View::new(usize::from(cols), usize::from(rows.saturating_sub(1)) * 2);
                self.resize(view, tx);
            }
            _ => {}
        }
    }

    fn handle_key(&mut self, code: KeyCode, tx: &mpsc::Sender<AppEvent>) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                if self.show_help {
                    self.show_help = false;
                } else {
                    self.mode = AppMode::Quit;
                }
            }
            KeyCode::Char('?') => self.show_help = !self.show_help,
            KeyCode::Char('e') => self.last_error = None,
            KeyCode::Char('o') => {
                let mut next = self.config.get().clone();
                next.overlay = next.overlay.cycle();
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('j') => {
                let mut next = self.config.get().clone();
                next.projection = next.projection.cycle();
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('k') => {
                let mut next = self.config.get().clone();
                next.show_night = !next.show_night;
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('c') => {
                let mut next = self.config.get().clone();
                next.show_clock = !next.show_clock;
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('a') => {
                let mut next = self.config.get().clone();
                next.show_animation = !next.show_animation;
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('g') => {
                let mut next = self.config.get().clone();
                next.show_grid_points = !next.show_grid_points;
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('r') => {
                let current = self.config.get().auto_rotate_dpm;
                let idx = AUTOROTATE_SPEEDS
                    .iter()
                    .position(|&s| (s - current).abs() < f64::EPSILON)
                    .unwrap_or(0);
                let mut next = self.config.get().clone();
                next.auto_rotate_dpm = AUTOROTATE_SPEEDS[(idx + 1) % AUTOROTATE_SPEEDS.len()];
                self.save_and_notify(next, tx);
            }
            KeyCode::Char('n') => self.navigate_time(1, tx),
            KeyCode::Char('p') => self.navigate_time(-1, tx),
            KeyCode::Left => self.nudge(-ARROW_STEP_DEG, 0.0, tx),
            KeyCode::Right => self.nudge(ARROW_STEP_DEG, 0.0, tx),
            KeyCode::Up => self.nudge(0.0, ARROW_STEP_DEG, tx),
            KeyCode::Down => self.nudge(0.0, -ARROW_STEP_DEG, tx),
            KeyCode::Char('+') | KeyCode::Char('=') => self.zoom(KEY_ZOOM_STEP, tx),
            KeyCode::Char('-') => self.zoom(1.0 / KEY_ZOOM_STEP, tx),
            _ => {}
        }
    }

    fn navigate_time(&mut self, step: i32, tx: &mpsc::Sender<AppEvent>) {
        let next_date = self
            .grids
            .value()
            .and_then(|bundle| bundle.primary.navigate(step));
        if let Some(date) = next_date {
            let mut next = self.config.get().clone();
            next.date = DateSelection::Archived(date);
            self.save_and_notify(next, tx);
        }
    }

    fn nudge(&mut self, dlon: f64, dlat: f64, tx: &mpsc::Sender<AppEvent>) {
        if let Some(globe) = self.globe.value_mut() {
            globe.rotate_by(dlon, dlat);
        }
        self.after_manual_reorient(tx);
    }

    fn zoom(&mut self, factor: f64, tx: &mpsc::Sender<AppEvent>) {
        if let Some(globe) = self.globe.value_mut() {
            globe.zoom_by(factor);
        }
        self.after_manual_reorient(tx);
    }

    fn after_manual_reorient(&mut self, tx: &mpsc::Sender<AppEvent>) {
        self.sync_orientation();
        self.redraw_map();
        self.repaint_terminator();
        self.submit_field(tx);
    }

    fn apply_gesture(&mut self, gesture: Gesture, tx: &mpsc::Sender<AppEvent>) {
        match gesture {
            Gesture::Click { col, row } => {
                let Some(globe) = self.globe.value() else {
                    return;
                };
                let (x, y) = (f64::from(col), f64::from(row) * 2.0);
                if let Some((lon, lat)) = globe.invert(x, y) {
                    let sample = self
                        .grids
                        .value()
                        .and_then(|bundle| bundle.primary.interpolate(lon, lat));
                    self.selected = Some(SelectedPoint {
                        col,
                        row,
                        lon,
                        lat,
                        sample,
                    });
                } else {
                    self.selected = None;
                }
            }
            Gesture::MoveStart => {
                // The field is screen-anchored; a reorientation in progress
                // makes any in-flight interpolation moot.
                self.field.cancel();
                self.field_progress = None;
            }
            Gesture::Move { dx, dy } => {
                if let Some(globe) = self.globe.value_mut() {
                    let dpp = globe.degrees_per_pixel();
                    globe.rotate_by(-dx * dpp, dy * 2.0 * dpp);
                }
                self.redraw_map();
            }
            Gesture::Zoom { factor } => {
                if let Some(globe) = self.globe.value_mut() {
                    globe.zoom_by(factor);
                }
                self.redraw_map();
            }
            Gesture::MoveEnd => {
                self.sync_orientation();
                self.repaint_terminator();
                self.submit_field(tx);
            }
        }
    }

    /// Mirrors the globe's orientation back into the configuration so the
    /// shareable token stays accurate. Gesture-driven, so the resulting
    /// orientation-change notification needs no further handling.
    fn sync_orientation(&mut self) {
        if let Some(globe) = self.globe.value() {
            let orientation = globe.orientation();
            let mut next = self.config.get().clone();
            next.orientation = orientation;
            let _ = self.config.save(next);
        }
    }

    /// Saves a configuration and announces what changed on the event
    /// channel, keeping `ConfigChanged` the single application path for
    /// keyboard, host and token-driven edits alike.
    fn save_and_notify(&mut self, next: Configuration, tx: &mpsc::Sender<AppEvent>) {
        let changed = self.config.save(next);
        if !changed.is_empty() {
            let _ = tx.try_send(AppEvent::ConfigChanged(changed));
        }
    }

    fn apply_changes(&mut self, changed: &ChangedSet, tx: &mpsc::Sender<AppEvent>) {
        if changed.contains(&Attr::Projection) {
            self.submit_globe(tx);
        } else if changed.contains(&Attr::Orientation) {
            let orientation = self.config.get().orientation;
            if let Some(globe) = self.globe.value_mut() {
                globe.set_orientation(orientation);
                self.redraw_map();
                self.repaint_terminator();
                self.submit_field(tx);
            } else {
                self.submit_globe(tx);
            }
        }

        if changed.contains(&Attr::Date)
            || changed.contains(&Attr::Param)
            || changed.contains(&Attr::Level)
            || changed.contains(&Attr::Overlay)
        {
            self.submit_grids(tx);
        }

        if changed.contains(&Attr::ShowNight) {
            if self.config.get().show_night {
                self.repaint_terminator();
            } else {
                self.night_surface.clear();
            }
        }
        if changed.contains(&Attr::ShowAnimation) && !self.config.get().show_animation {
            self.particle_surface.clear();
        }
        if changed.contains(&Attr::ShowGridPoints) {
            self.redraw_map();
        }
    }

    fn resize(&mut self, view: View, tx: &mpsc::Sender<AppEvent>) {
        if view.width == 0 || view.height == 0 || view == self.view {
            return;
        }
        self.view = view;
        self.map_surface.resize(view);
        self.particle_surface.resize(view);
        self.night_surface.resize(view);
        self.animator.resize(view);
        self.night_mask.invalidate();
        self.submit_globe(tx);
    }

    fn submit_globe(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let name = self.config.get().projection.name().to_string();
        let orientation = self.config.get().orientation;
        let view = self.view;
        self.globe
            .submit(tx.clone(), AppEvent::GlobeBuilt, move |_token| async move {
                // Unknown names reject here and the previous globe stays up.
                ProjectionKind::parse(&name)
                    .map(|kind| Globe::new(kind, view, orientation))
                    .ok_or_else(|| BuildError::Rejected(format!("unknown projection '{name}'")))
            });
    }

    fn submit_mesh(&mut self, tx: &mpsc::Sender<AppEvent>, cli: &Cli) {
        let detail = cli.mesh_detail(self.view.width * self.view.height / 2);
        self.mesh
            .submit(tx.clone(), AppEvent::MeshBuilt, move |_token| async move {
                Mesh::load(detail).map_err(|err| BuildError::Rejected(err.to_string()))
            });
    }

    fn submit_grids(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let config = self.config.get().clone();
        self.grids
            .submit(tx.clone(), AppEvent::GridsBuilt, move |_token| async move {
                let date = match config.date {
                    DateSelection::Current => Utc::now(),
                    DateSelection::Archived(date) => date,
                };
                let primary = demo_wind(date);
                let overlay = match config.overlay {
                    OverlayType::Temp => Some(demo_temp(date)),
                    // Default and Wind both color by the primary magnitude.
                    OverlayType::Default | OverlayType::Wind | OverlayType::Off => None,
                };
                Ok(GridBundle { primary, overlay })
            });
    }

    fn submit_field(&mut self, tx: &mpsc::Sender<AppEvent>) {
        let (Some(globe), Some(grids)) = (self.globe.value(), self.grids.value()) else {
            return;
        };
        let globe = globe.clone();
        let grids = grids.clone();
        let overlay_enabled = self.config.get().overlay != OverlayType::Off;
        let progress_tx = tx.clone();
        self.field
            .submit(tx.clone(), AppEvent::FieldBuilt, move |token| {
                field::build(globe, grids, overlay_enabled, token, move |progress| {
                    let _ = progress_tx.try_send(AppEvent::FieldProgress(progress));
                })
            });
        self.field_progress = Some(0.0);
        self.pending_rotation_deg = 0.0;
    }

    fn report_error(&mut self, reason: String) {
        self.last_error = Some(reason);
    }

    fn redraw_map(&mut self) {
        self.map_surface.clear();
        let Some(globe) = self.globe.value() else {
            return;
        };
        let max_jump = MAX_SEGMENT_FRAC * self.view.width.max(self.view.height) as f64;

        if self.config.get().show_grid_points {
            for lon in (-180..180).step_by(30) {
                let ring: Vec<(f64, f64)> = (-85..=85)
                    .step_by(2)
                    .map(|lat| (f64::from(lon), f64::from(lat)))
                    .collect();
                draw_ring(&mut self.map_surface, globe, &ring, GRATICULE_COLOR, max_jump);
            }
            for lat in (-60..=60).step_by(30) {
                let ring: Vec<(f64, f64)> = (-180..=180)
                    .step_by(2)
                    .map(|lon| (f64::from(lon), f64::from(lat)))
                    .collect();
                draw_ring(&mut self.map_surface, globe, &ring, GRATICULE_COLOR, max_jump);
            }
        }

        if let Some(mesh) = self.mesh.value() {
            for ring in &mesh.coastlines {
                draw_ring(&mut self.map_surface, globe, ring, COAST_COLOR, max_jump);
            }
            for ring in &mesh.lakes {
                draw_ring(&mut self.map_surface, globe, ring, LAKE_COLOR, max_jump);
            }
        }
    }
}

/// Projects and strokes one polyline, breaking the path at projection
/// holes, viewport exits and seam-sized jumps.
fn draw_ring(
    surface: &mut PixelSurface,
    globe: &Globe,
    ring: &[(f64, f64)],
    color: Rgba,
    max_jump: f64,
) {
    let view = surface.view();
    let mut prev: Option<(f64, f64)> = None;
    for &(lon, lat) in ring {
        match globe.project(lon, lat) {
            Some((x, y))
                if x.is_finite()
                    && y.is_finite()
                    && x >= 0.0
                    && y >= 0.0
                    && x < view.width as f64
                    && y < view.height as f64 =>
            {
                if let Some((px, py)) = prev {
                    if (x - px).hypot(y - py) <= max_jump {
                        surface.stroke_line(px, py, x, y, color);
                    }
                }
                prev = Some((x, y));
            }
            _ => prev = None,
        }
    }
}

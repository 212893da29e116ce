use std::time::{Duration, Instant};

use crossterm::event::{MouseButton, MouseEvent, MouseEventKind};

/// Cumulative pointer travel, in pixels, that promotes a press to a drag.
pub const DRAG_THRESHOLD_PX: f64 = 4.0;
/// Quiet time after the last update before a single moveEnd is emitted.
pub const MOVE_END_DEBOUNCE: Duration = Duration::from_millis(250);
/// Zoom multiplier per scroll notch.
const ZOOM_STEP: f64 = 1.15;

/// Normalized gesture events produced from raw mouse input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// Press released without meaningful displacement or scaling.
    Click { col: u16, row: u16 },
    /// Emitted exactly once when a gesture is promoted to drag or zoom.
    MoveStart,
    /// Pointer delta in cells since the last update of this drag.
    Move { dx: f64, dy: f64 },
    /// Scale factor to apply (>1 zooms in).
    Zoom { factor: f64 },
    /// Emitted exactly once after a quiet debounce window.
    MoveEnd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Idle,
    /// Pressed, still assumed to be a click.
    Pending {
        origin: (u16, u16),
        last: (u16, u16),
        travel: f64,
    },
    Dragging {
        last: (u16, u16),
    },
    /// Sticky: once a gesture zooms it stays a zoom gesture.
    Zooming,
    /// Drag released; waiting out the debounce before moveEnd.
    Settling,
}

/// State machine turning raw press/drag/scroll events into clean
/// click / moveStart / move / zoom / moveEnd sequences. Out-of-order events
/// from flaky backends (stray releases, drags without a press) are absorbed
/// without upsetting the machine.
#[derive(Debug)]
pub struct GestureTracker {
    phase: Phase,
    last_activity: Instant,
}

impl Default for GestureTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureTracker {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            last_activity: Instant::now(),
        }
    }

    /// True while a drag or zoom gesture is in progress or settling; used
    /// to pause autorotation and defer field rebuilds.
    #[must_use]
    pub fn is_manipulating(&self) -> bool {
        matches!(
            self.phase,
            Phase::Dragging { .. } | Phase::Zooming | Phase::Settling
        )
    }

    pub fn on_mouse(&mut self, event: MouseEvent) -> Vec<Gesture> {
        self.last_activity = Instant::now();
        let pos = (event.column, event.row);
        match event.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                // A duplicate down, or a down while settling, starts over.
                self.phase = Phase::Pending {
                    origin: pos,
                    last: pos,
                    travel: 0.0,
                };
                Vec::new()
            }
            MouseEventKind::Drag(MouseButton::Left) | MouseEventKind::Moved => {
                match self.phase {
                    Phase::Pending {
                        origin,
                        last,
                        travel,
                    } => {
                        let dx = f64::from(pos.0) - f64::from(last.0);
                        let dy = f64::from(pos.1) - f64::from(last.1);
                        let travel = travel + dx.hypot(dy);
                        if travel > DRAG_THRESHOLD_PX {
                            self.phase = Phase::Dragging { last: pos };
                            let dx = f64::from(pos.0) - f64::from(origin.0);
                            let dy = f64::from(pos.1) - f64::from(origin.1);
                            vec![Gesture::MoveStart, Gesture::Move { dx, dy }]
                        } else {
                            self.phase = Phase::Pending {
                                origin,
                                last: pos,
                                travel,
                            };
                            Vec::new()
                        }
                    }
                    Phase::Dragging { last } => {
                        let dx = f64::from(pos.0) - f64::from(last.0);
                        let dy = f64::from(pos.1) - f64::from(last.1);
                        self.phase = Phase::Dragging { last: pos };
                        vec![Gesture::Move { dx, dy }]
                    }
                    // Drag without a press: some backends drop the down
                    // event. Adopt the gesture as if freshly pressed.
                    Phase::Idle | Phase::Settling
                        if matches!(event.kind, MouseEventKind::Drag(_)) =>
                    {
                        self.phase = Phase::Pending {
                            origin: pos,
                            last: pos,
                            travel: 0.0,
                        };
                        Vec::new()
                    }
                    _ => Vec::new(),
                }
            }
            MouseEventKind::Up(MouseButton::Left) => match self.phase {
                Phase::Pending { origin, .. } => {
                    self.phase = Phase::Idle;
                    vec![Gesture::Click {
                        col: origin.0,
                        row: origin.1,
                    }]
                }
                Phase::Dragging { .. } | Phase::Zooming => {
                    self.phase = Phase::Settling;
                    Vec::new()
                }
                // Stray release: nothing to end.
                Phase::Idle | Phase::Settling => Vec::new(),
            },
            MouseEventKind::ScrollUp | MouseEventKind::ScrollDown => {
                let factor = if event.kind == MouseEventKind::ScrollUp {
                    ZOOM_STEP
                } else {
                    1.0 / ZOOM_STEP
                };
                let mut out = Vec::new();
                if matches!(self.phase, Phase::Idle | Phase::Pending { .. }) {
                    out.push(Gesture::MoveStart);
                }
                self.phase = Phase::Zooming;
                out.push(Gesture::Zoom { factor });
                out
            }
            _ => Vec::new(),
        }
    }

    /// Called on frame ticks: emits the single deferred moveEnd once the
    /// debounce window has passed with no further updates.
    pub fn poll_quiet(&mut self, now: Instant) -> Option<Gesture> {
        if matches!(self.phase, Phase::Settling | Phase::Zooming)
            && now.duration_since(self.last_activity) >= MOVE_END_DEBOUNCE
        {
            self.phase = Phase::Idle;
            return Some(Gesture::MoveEnd);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn mouse(kind: MouseEventKind, col: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column: col,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    #[test]
    fn test_press_release_is_click() {
        let mut t = GestureTracker::new();
        assert!(t.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5)).is_empty());
        let out = t.on_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 5, 5));
        assert_eq!(out, vec![Gesture::Click { col: 5, row: 5 }]);
        assert!(!t.is_manipulating());
    }

    #[test]
    fn test_small_jitter_still_clicks() {
        let mut t = GestureTracker::new();
        t.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 6, 5));
        let out = t.on_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 6, 5));
        assert!(matches!(out[0], Gesture::Click { .. }));
    }

    #[test]
    fn test_promotion_to_drag_emits_move_start_once() {
        let mut t = GestureTracker::new();
        t.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        let out = t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 12, 5));
        assert_eq!(out[0], Gesture::MoveStart);
        assert!(matches!(out[1], Gesture::Move { .. }));
        let out = t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 14, 6));
        assert_eq!(out, vec![Gesture::Move { dx: 2.0, dy: 1.0 }]);
        assert!(t.is_manipulating());
    }

    #[test]
    fn test_zoom_is_sticky() {
        let mut t = GestureTracker::new();
        t.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        let out = t.on_mouse(mouse(MouseEventKind::ScrollUp, 5, 5));
        assert_eq!(out[0], Gesture::MoveStart);
        assert!(matches!(out[1], Gesture::Zoom { factor } if factor > 1.0));
        // Further drags of the same gesture stay zoom-only.
        let out = t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 30, 30));
        assert!(out.is_empty());
        let out = t.on_mouse(mouse(MouseEventKind::ScrollDown, 5, 5));
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Gesture::Zoom { factor } if factor < 1.0));
    }

    #[test]
    fn test_stray_up_is_tolerated() {
        let mut t = GestureTracker::new();
        assert!(t.on_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 5, 5)).is_empty());
        assert!(!t.is_manipulating());
    }

    #[test]
    fn test_drag_without_down_adopts_gesture() {
        let mut t = GestureTracker::new();
        t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 5, 5));
        let out = t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 15, 5));
        assert_eq!(out[0], Gesture::MoveStart);
    }

    #[test]
    fn test_move_end_after_debounce_only() {
        let mut t = GestureTracker::new();
        t.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5));
        t.on_mouse(mouse(MouseEventKind::Drag(MouseButton::Left), 20, 5));
        t.on_mouse(mouse(MouseEventKind::Up(MouseButton::Left), 20, 5));
        assert!(t.is_manipulating());
        assert!(t.poll_quiet(Instant::now()).is_none());
        let later = Instant::now() + MOVE_END_DEBOUNCE + Duration::from_millis(10);
        assert_eq!(t.poll_quiet(later), Some(Gesture::MoveEnd));
        assert!(t.poll_quiet(later + MOVE_END_DEBOUNCE).is_none());
    }
}

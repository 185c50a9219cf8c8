//! Activity event types delivered by an event source.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of activity event. Known kinds use their DOM names on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventKind {
    MouseMove,
    KeyDown,
    Wheel,
    DomMouseScroll,
    MouseWheel,
    MouseDown,
    TouchStart,
    TouchMove,
    PointerDown,
    PointerMove,
    VisibilityChange,
    Other(String),
}

/// Activity set monitored when no explicit `events` are configured.
pub const DEFAULT_EVENTS: [EventKind; 11] = [
    EventKind::MouseMove,
    EventKind::KeyDown,
    EventKind::Wheel,
    EventKind::DomMouseScroll,
    EventKind::MouseWheel,
    EventKind::MouseDown,
    EventKind::TouchStart,
    EventKind::TouchMove,
    EventKind::PointerDown,
    EventKind::PointerMove,
    EventKind::VisibilityChange,
];

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::MouseMove => "mousemove",
            EventKind::KeyDown => "keydown",
            EventKind::Wheel => "wheel",
            EventKind::DomMouseScroll => "DOMMouseScroll",
            EventKind::MouseWheel => "mousewheel",
            EventKind::MouseDown => "mousedown",
            EventKind::TouchStart => "touchstart",
            EventKind::TouchMove => "touchmove",
            EventKind::PointerDown => "MSPointerDown",
            EventKind::PointerMove => "MSPointerMove",
            EventKind::VisibilityChange => "visibilitychange",
            EventKind::Other(name) => name,
        }
    }

    /// Whether this kind reports pointer movement and is subject to the
    /// movement-noise filter.
    pub fn is_movement(&self) -> bool {
        matches!(self, EventKind::MouseMove)
    }
}

impl From<String> for EventKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "mousemove" => EventKind::MouseMove,
            "keydown" => EventKind::KeyDown,
            "wheel" => EventKind::Wheel,
            "DOMMouseScroll" => EventKind::DomMouseScroll,
            "mousewheel" => EventKind::MouseWheel,
            "mousedown" => EventKind::MouseDown,
            "touchstart" => EventKind::TouchStart,
            "touchmove" => EventKind::TouchMove,
            "MSPointerDown" => EventKind::PointerDown,
            "MSPointerMove" => EventKind::PointerMove,
            "visibilitychange" => EventKind::VisibilityChange,
            _ => EventKind::Other(name),
        }
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_string()
    }
}

impl FromStr for EventKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(EventKind::from(s.to_string()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Page coordinates carried by pointer events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A raw activity event.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityEvent {
    pub kind: EventKind,
    /// Pointer position, if the event carries one.
    pub position: Option<Point>,
}

impl ActivityEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            position: None,
        }
    }

    /// A pointer movement to `(x, y)`.
    pub fn pointer_move(x: f64, y: f64) -> Self {
        Self {
            kind: EventKind::MouseMove,
            position: Some(Point { x, y }),
        }
    }

    pub fn key_down() -> Self {
        Self::new(EventKind::KeyDown)
    }

    pub fn with_position(mut self, x: f64, y: f64) -> Self {
        self.position = Some(Point { x, y });
        self
    }
}

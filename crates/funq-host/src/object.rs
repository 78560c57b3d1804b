//! Receivers and events passed through the dispatch table.

use std::fmt;

use bitflags::bitflags;

/// Something that can receive events: a widget, window or other named node.
pub trait Object {
    /// The object's own name; may be empty.
    fn object_name(&self) -> &str;

    /// The object's type name.
    fn class_name(&self) -> &str;

    /// Slash-separated path identifying the object in its tree.
    fn path(&self) -> String {
        self.object_name().to_string()
    }

    /// Handle an event delivered to this object. Returns true if handled.
    fn event(&self, _event: &Event) -> bool {
        false
    }
}

/// The type of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A mouse button went down.
    MouseButtonPress,
    /// A mouse button went up.
    MouseButtonRelease,
    /// A mouse button was double-clicked.
    MouseButtonDblClick,
    /// The pointer moved.
    MouseMove,
    /// A key went down.
    KeyPress,
    /// A key went up.
    KeyRelease,
    /// The pointer entered the receiver.
    Enter,
    /// The pointer left the receiver.
    Leave,
    /// The receiver gained keyboard focus.
    FocusIn,
    /// The receiver lost keyboard focus.
    FocusOut,
    /// The receiver became visible.
    Show,
    /// The receiver was hidden.
    Hide,
    /// The receiver needs repainting.
    Paint,
    /// The receiver was resized.
    Resize,
    /// A timer fired for the receiver.
    Timer,
    /// The receiver is being closed.
    Close,
    /// Application-defined event type.
    User(u16),
}

impl EventKind {
    /// True for mouse button and motion events.
    pub fn is_mouse(self) -> bool {
        matches!(
            self,
            Self::MouseButtonPress
                | Self::MouseButtonRelease
                | Self::MouseButtonDblClick
                | Self::MouseMove
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(n) => write!(f, "User({n})"),
            other => write!(f, "{other:?}"),
        }
    }
}

bitflags! {
    /// Keyboard modifiers held while an event was generated.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Modifiers: u8 {
        /// Shift key.
        const SHIFT = 1 << 0;
        /// Control key.
        const CONTROL = 1 << 1;
        /// Alt/Option key.
        const ALT = 1 << 2;
        /// Meta/Command key.
        const META = 1 << 3;
    }
}

/// A position in receiver-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: i32,
    /// Vertical coordinate.
    pub y: i32,
}

/// An event on its way to a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Event type.
    kind: EventKind,
    /// Pointer position, for events that carry one.
    pos: Option<Point>,
    /// Modifiers held at the time of the event.
    modifiers: Modifiers,
}

impl Event {
    /// Create an event with no position and no modifiers.
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            pos: None,
            modifiers: Modifiers::empty(),
        }
    }

    /// Attach a pointer position.
    pub fn with_pos(mut self, x: i32, y: i32) -> Self {
        self.pos = Some(Point { x, y });
        self
    }

    /// Attach held modifiers.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Event type.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Pointer position, if any.
    pub fn pos(&self) -> Option<Point> {
        self.pos
    }

    /// Held modifiers.
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }
}

//! User presence from pointer movement.

use std::time::{Duration, Instant};

/// Something that can report the pointer position.
pub trait PointerSource {
    /// Current pointer position, or `None` if it cannot be read.
    fn position(&mut self) -> Option<(i32, i32)>;
}

/// No pointer backend: position is never known.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPointer;

impl PointerSource for NoPointer {
    fn position(&mut self) -> Option<(i32, i32)> {
        None
    }
}

/// A backend that may have failed to start.
impl<P: PointerSource> PointerSource for Option<P> {
    fn position(&mut self) -> Option<(i32, i32)> {
        self.as_mut().and_then(P::position)
    }
}

/// Desktop pointer via `enigo`.
#[cfg(feature = "pointer")]
pub struct EnigoPointer {
    enigo: enigo::Enigo,
}

#[cfg(feature = "pointer")]
impl EnigoPointer {
    pub fn new() -> Option<Self> {
        match enigo::Enigo::new(&enigo::Settings::default()) {
            Ok(enigo) => Some(Self { enigo }),
            Err(e) => {
                tracing::warn!(error = %e, "pointer backend unavailable; assuming user is active");
                None
            }
        }
    }
}

#[cfg(feature = "pointer")]
impl PointerSource for EnigoPointer {
    fn position(&mut self) -> Option<(i32, i32)> {
        use enigo::Mouse;
        self.enigo.location().ok()
    }
}

/// Tracks the last pointer movement and answers "is someone here?".
///
/// An unreadable pointer counts as active: better to look at the camera
/// than to miss a present user.
pub struct ActivityTracker<P> {
    source: P,
    idle_timeout: Duration,
    last_position: Option<(i32, i32)>,
    last_moved: Instant,
}

impl<P: PointerSource> ActivityTracker<P> {
    pub fn new(source: P, idle_timeout: Duration) -> Self {
        Self {
            source,
            idle_timeout,
            last_position: None,
            last_moved: Instant::now(),
        }
    }

    pub fn is_active(&mut self, now: Instant) -> bool {
        let Some(position) = self.source.position() else {
            return true;
        };
        if self.last_position != Some(position) {
            self.last_position = Some(position);
            self.last_moved = now;
            return true;
        }
        now.saturating_duration_since(self.last_moved) <= self.idle_timeout
    }
}

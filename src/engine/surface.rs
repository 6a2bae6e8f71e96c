// SPDX-License-Identifier: MPL-2.0

//! Surface lifecycle events delivered by the compositor.

use tracing::warn;

/// A lifecycle notification for the drawing surface of one engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent<S> {
    /// A surface was granted; `S` is the handle frames are delivered to.
    Created(S),
    /// The granted surface was resized.
    Changed { width: u32, height: u32 },
    /// The surface is about to be reclaimed.
    Destroyed,
}

impl<S> SurfaceEvent<S> {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SurfaceEvent::Created(_) => "created",
            SurfaceEvent::Changed { .. } => "changed",
            SurfaceEvent::Destroyed => "destroyed",
        }
    }
}

/// Receiver of surface lifecycle callbacks.
pub trait SurfaceListener {
    type Surface;

    fn surface_created(&mut self, surface: Self::Surface);

    fn surface_changed(&mut self, width: u32, height: u32);

    /// Must stop referencing the surface before returning.
    fn surface_destroyed(&mut self);
}

/// Enforces `Created (Changed)* Destroyed` for each logical binding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceLifecycle {
    #[default]
    Detached,
    Attached,
}

impl SurfaceLifecycle {
    /// Advances the lifecycle, returning `false` for events that break the grammar.
    pub fn accept<S>(&mut self, event: &SurfaceEvent<S>) -> bool {
        match (*self, event) {
            (SurfaceLifecycle::Detached, SurfaceEvent::Created(_)) => {
                *self = SurfaceLifecycle::Attached;
                true
            }
            (SurfaceLifecycle::Attached, SurfaceEvent::Changed { .. }) => true,
            (SurfaceLifecycle::Attached, SurfaceEvent::Destroyed) => {
                *self = SurfaceLifecycle::Detached;
                true
            }
            (state, event) => {
                warn!(?state, event = event.name(), "surface event out of order, ignoring");
                false
            }
        }
    }

    #[must_use]
    pub fn is_attached(self) -> bool {
        self == SurfaceLifecycle::Attached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_bindings() {
        let mut lifecycle = SurfaceLifecycle::default();
        let events = [
            SurfaceEvent::Created(1),
            SurfaceEvent::Changed { width: 1920, height: 1080 },
            SurfaceEvent::Changed { width: 2560, height: 1440 },
            SurfaceEvent::Destroyed,
            SurfaceEvent::Created(2),
            SurfaceEvent::Destroyed,
        ];

        for event in &events {
            assert!(lifecycle.accept(event), "{} should be accepted", event.name());
        }
        assert!(!lifecycle.is_attached());
    }

    #[test]
    fn rejects_replacement_before_destroy() {
        let mut lifecycle = SurfaceLifecycle::default();
        assert!(lifecycle.accept(&SurfaceEvent::Created(1)));
        assert!(!lifecycle.accept(&SurfaceEvent::Created(2)));
        assert!(lifecycle.is_attached());
    }

    #[test]
    fn rejects_events_without_surface() {
        let mut lifecycle = SurfaceLifecycle::default();
        assert!(!lifecycle.accept(&SurfaceEvent::<u32>::Changed { width: 1, height: 1 }));
        assert!(!lifecycle.accept(&SurfaceEvent::<u32>::Destroyed));
        assert_eq!(lifecycle, SurfaceLifecycle::Detached);
    }
}

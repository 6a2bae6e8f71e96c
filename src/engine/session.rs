// SPDX-License-Identifier: MPL-2.0

//! Host-side bookkeeping for one drawing surface.
//!
//! The compositor talks in configures and closes; the engine expects
//! `Created (Changed)* Destroyed`. [`HostSurface`] translates the former
//! into the latter and remembers enough to replay an attached surface into
//! a fresh engine when the selection changes.

use motion_bg_config::PreferenceStore;

use super::{Engine, MediaPlayer, PlayerFactory, SurfaceEvent};

#[derive(Debug)]
pub struct HostSurface<S> {
    surface: S,
    size: Option<(u32, u32)>,
    created: bool,
}

impl<S: Clone> HostSurface<S> {
    /// A surface that was requested but not configured yet.
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            size: None,
            created: false,
        }
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// The first configure creates the surface; every configure changes it.
    pub fn configure<F>(&mut self, engine: &mut Engine<F>, width: u32, height: u32)
    where
        F: PlayerFactory,
        F::Player: MediaPlayer<Surface = S>,
    {
        self.size = Some((width, height));
        if !self.created {
            self.created = true;
            engine.surface_event(SurfaceEvent::Created(self.surface.clone()));
        }
        engine.surface_event(SurfaceEvent::Changed { width, height });
    }

    /// The compositor took the surface away.
    pub fn close<F>(&self, engine: &mut Engine<F>)
    where
        F: PlayerFactory,
        F::Player: MediaPlayer<Surface = S>,
    {
        if self.created && engine.is_attached() {
            engine.surface_event(SurfaceEvent::Destroyed);
        }
    }

    /// Replaces `engine` with a new session reading the current selection,
    /// handing it this surface again if it was already configured.
    pub fn restart<F>(&self, engine: &mut Engine<F>, store: &dyn PreferenceStore, factory: F)
    where
        F: PlayerFactory,
        F::Player: MediaPlayer<Surface = S>,
    {
        let attached = match (self.created, self.size) {
            (true, Some(size)) => Some((self.surface.clone(), size)),
            _ => None,
        };
        engine.restart(store, factory, attached);
    }
}

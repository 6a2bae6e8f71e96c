// SPDX-License-Identifier: MPL-2.0-only

//! Wayland side of the daemon: maps a background layer surface per output
//! and turns compositor events into engine lifecycle calls.

use calloop::{
    EventLoop, LoopHandle, RegistrationToken, channel, ping,
    signals::{Signal, Signals},
};
use eyre::eyre;
use motion_bg_config::{RonStore, SETTINGS_KEY, Settings, VIDEO_KEY, VideoReference, selected_video};
use notify::RecommendedWatcher;
use sctk::{
    compositor::{CompositorHandler, CompositorState},
    delegate_compositor, delegate_layer, delegate_output, delegate_registry, delegate_shm,
    output::{OutputHandler, OutputState},
    reexports::{
        calloop_wayland_source::WaylandSource,
        client::{
            Connection, QueueHandle,
            globals::registry_queue_init,
            protocol::{
                wl_output::{self, WlOutput},
                wl_surface,
            },
        },
    },
    registry::{ProvidesRegistryState, RegistryState},
    registry_handlers,
    shell::{
        WaylandSurface,
        wlr_layer::{
            Anchor, KeyboardInteractivity, Layer, LayerShell, LayerShellHandler, LayerSurface,
            LayerSurfaceConfigure,
        },
    },
    shm::{Shm, ShmHandler, slot::SlotPool},
};
use tracing::{debug, error, info, warn};

use crate::{
    engine::{Engine, HostSurface, PlayerEvent},
    video::{FrameTarget, GstPlayerFactory},
};

/// Connects to the compositor and runs until a termination signal arrives.
pub fn run(store: RonStore) -> eyre::Result<()> {
    let conn = Connection::connect_to_env()?;
    let (globals, event_queue) = registry_queue_init(&conn)?;
    let qh = event_queue.handle();

    let mut event_loop: EventLoop<'static, MotionBg> = EventLoop::try_new()?;
    let loop_handle = event_loop.handle();

    WaylandSource::new(conn.clone(), event_queue)
        .insert(loop_handle.clone())
        .map_err(|err| eyre!("{}", err.error))?;

    let (event_tx, event_rx) = channel::channel::<PlayerEvent>();
    loop_handle
        .insert_source(event_rx, |event, _, state: &mut MotionBg| {
            if let channel::Event::Msg(event) = event {
                state.player_event(&event);
            }
        })
        .map_err(|err| eyre!("{}", err.error))?;

    let signals = Signals::new(&[Signal::SIGINT, Signal::SIGTERM])?;
    loop_handle
        .insert_source(signals, |event, _, state: &mut MotionBg| {
            info!(signal = ?event.signal(), "shutting down");
            state.exit = true;
        })
        .map_err(|err| eyre!("{}", err.error))?;

    let factory = GstPlayerFactory::new(event_tx)?;

    let watcher = match crate::watch::store_watcher(&loop_handle, &store) {
        Ok(watcher) => Some(watcher),
        Err(why) => {
            warn!(?why, "selection changes will apply after a restart");
            None
        }
    };

    let mut bg_state = MotionBg {
        registry_state: RegistryState::new(&globals),
        output_state: OutputState::new(&globals, &qh),
        compositor_state: CompositorState::bind(&globals, &qh)?,
        shm_state: Shm::bind(&globals, &qh)?,
        layer_state: LayerShell::bind(&globals, &qh)?,
        qh,
        loop_handle,
        settings: Settings::load(&store),
        video: selected_video(&store),
        store,
        factory,
        _watcher: watcher,
        outputs: Vec::new(),
        next_layer_id: 0,
        exit: false,
    };

    loop {
        event_loop.dispatch(None, &mut bg_state)?;

        if bg_state.exit {
            break;
        }
    }

    bg_state.shutdown();
    Ok(())
}

pub struct MotionBg {
    registry_state: RegistryState,
    output_state: OutputState,
    compositor_state: CompositorState,
    shm_state: Shm,
    layer_state: LayerShell,
    qh: QueueHandle<MotionBg>,
    loop_handle: LoopHandle<'static, MotionBg>,

    store: RonStore,
    settings: Settings,
    /// Selection the running engines were created with.
    video: Option<VideoReference>,
    factory: GstPlayerFactory,
    _watcher: Option<RecommendedWatcher>,

    outputs: Vec<BgOutput>,
    next_layer_id: u64,
    exit: bool,
}

/// One wallpaper session: an output, its engine, and its current layer.
pub struct BgOutput {
    wl_output: WlOutput,
    engine: Engine<GstPlayerFactory>,
    layer: Option<BgLayer>,
}

/// A mapped layer surface. Dropping it unregisters its frame ping.
pub struct BgLayer {
    id: u64,
    layer: LayerSurface,
    surface: HostSurface<FrameTarget>,
    ping_token: Option<RegistrationToken>,
    loop_handle: LoopHandle<'static, MotionBg>,
    pool: Option<SlotPool>,
}

impl Drop for BgLayer {
    fn drop(&mut self) {
        if let Some(token) = self.ping_token.take() {
            self.loop_handle.remove(token);
        }
    }
}

impl MotionBg {
    fn map_layer(&mut self, wl_output: &WlOutput) -> eyre::Result<BgLayer> {
        let id = self.next_layer_id;
        self.next_layer_id += 1;

        let (ping, ping_source) = ping::make_ping()?;
        let ping_token = self
            .loop_handle
            .insert_source(ping_source, move |(), &mut (), state: &mut MotionBg| {
                state.draw_layer(id);
            })
            .map_err(|err| eyre!("{}", err.error))?;

        let surface = self.compositor_state.create_surface(&self.qh);
        let layer = self.layer_state.create_layer_surface(
            &self.qh,
            surface,
            Layer::Background,
            Some("wallpaper"),
            Some(wl_output),
        );
        layer.set_anchor(Anchor::all());
        layer.set_exclusive_zone(-1);
        layer.set_keyboard_interactivity(KeyboardInteractivity::None);
        layer.set_size(0, 0);
        layer.commit();

        Ok(BgLayer {
            id,
            layer,
            surface: HostSurface::new(FrameTarget::new(ping)),
            ping_token: Some(ping_token),
            loop_handle: self.loop_handle.clone(),
            pool: None,
        })
    }

    fn player_event(&mut self, event: &PlayerEvent) {
        for output in &mut self.outputs {
            if output.engine.playback().player_id() == Some(event.id) {
                output.engine.handle_player_event(event);
                return;
            }
        }
        debug!(id = %event.id, "no engine owns this player anymore");
    }

    fn draw_layer(&mut self, id: u64) {
        let Some(layer) = self
            .outputs
            .iter_mut()
            .filter_map(|output| output.layer.as_mut())
            .find(|layer| layer.id == id)
        else {
            return;
        };

        let Some(frame) = layer.surface.surface().take() else {
            return;
        };

        let Some((width, height)) = layer.surface.size() else {
            return;
        };

        let Some(pool) = layer.pool.as_mut() else {
            return;
        };

        let image = match crate::scaler::scale(&frame, width, height, &self.settings) {
            Ok(image) => image,
            Err(why) => {
                warn!(?why, "video frame could not be scaled");
                return;
            }
        };

        match crate::draw::canvas(pool, &image, width as i32, height as i32, width as i32 * 4) {
            Ok(buffer) => {
                crate::draw::layer_surface(&layer.layer, &buffer, (width as i32, height as i32));
            }
            Err(why) => {
                error!(?why, "video frame could not be drawn");
            }
        }
    }

    /// Called when the stored selection or settings change on disk.
    pub(crate) fn store_changed(&mut self, key: &str) {
        match key {
            VIDEO_KEY => {
                let video = selected_video(&self.store);
                if video == self.video {
                    return;
                }
                info!(video = ?video, "selection changed, restarting wallpaper sessions");
                self.video = video;
                self.restart_engines();
            }
            SETTINGS_KEY => {
                self.settings = Settings::load(&self.store);
                debug!(settings = ?self.settings, "settings reloaded");
            }
            _ => {}
        }
    }

    /// Ends every session and starts a new one on the surfaces already mapped.
    fn restart_engines(&mut self) {
        for output in &mut self.outputs {
            match output.layer.as_ref() {
                Some(layer) => {
                    layer
                        .surface
                        .restart(&mut output.engine, &self.store, self.factory.clone());
                }
                None => output
                    .engine
                    .restart(&self.store, self.factory.clone(), None),
            }
        }
    }

    fn shutdown(&mut self) {
        for output in &mut self.outputs {
            if let Some(layer) = output.layer.as_ref() {
                layer.surface.close(&mut output.engine);
            }
            output.engine.on_destroy();
        }
        self.outputs.clear();
    }
}

impl CompositorHandler for MotionBg {
    fn scale_factor_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_factor: i32,
    ) {
    }

    fn transform_changed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _new_transform: wl_output::Transform,
    ) {
    }

    fn frame(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _time: u32,
    ) {
    }

    fn surface_enter(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &WlOutput,
    ) {
    }

    fn surface_leave(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _surface: &wl_surface::WlSurface,
        _output: &WlOutput,
    ) {
    }
}

impl OutputHandler for MotionBg {
    fn output_state(&mut self) -> &mut OutputState {
        &mut self.output_state
    }

    fn new_output(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, wl_output: WlOutput) {
        let Some(output_info) = self.output_state.info(&wl_output) else {
            return;
        };

        let name = output_info
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {}", output_info.make, output_info.model));

        let engine = Engine::on_create(name.clone(), &self.store, self.factory.clone());

        let layer = match self.map_layer(&wl_output) {
            Ok(layer) => Some(layer),
            Err(why) => {
                error!(output = %name, ?why, "failed to map wallpaper layer");
                None
            }
        };

        self.outputs.push(BgOutput {
            wl_output,
            engine,
            layer,
        });
    }

    fn update_output(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        _output: wl_output::WlOutput,
    ) {
    }

    fn output_destroyed(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        output: wl_output::WlOutput,
    ) {
        let Some(position) = self.outputs.iter().position(|o| o.wl_output == output) else {
            return;
        };

        let mut bg_output = self.outputs.remove(position);
        if let Some(layer) = bg_output.layer.as_ref() {
            layer.surface.close(&mut bg_output.engine);
        }
        bg_output.engine.on_destroy();
        info!(output = %bg_output.engine.name(), "output removed");
    }
}

impl LayerShellHandler for MotionBg {
    fn closed(&mut self, _conn: &Connection, _qh: &QueueHandle<Self>, layer: &LayerSurface) {
        let Some(index) = self
            .outputs
            .iter()
            .position(|o| o.layer.as_ref().is_some_and(|l| &l.layer == layer))
        else {
            return;
        };

        let output = &mut self.outputs[index];
        if let Some(closed) = output.layer.take() {
            closed.surface.close(&mut output.engine);
        }
        debug!(output = %output.engine.name(), "layer closed, mapping a new one");

        // The output is still present, so the surface is granted again.
        let wl_output = output.wl_output.clone();
        let layer = match self.map_layer(&wl_output) {
            Ok(layer) => Some(layer),
            Err(why) => {
                error!(?why, "failed to remap wallpaper layer");
                None
            }
        };
        self.outputs[index].layer = layer;
    }

    fn configure(
        &mut self,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
        layer: &LayerSurface,
        configure: LayerSurfaceConfigure,
        _serial: u32,
    ) {
        let Some(output) = self
            .outputs
            .iter_mut()
            .find(|o| o.layer.as_ref().is_some_and(|l| &l.layer == layer))
        else {
            return;
        };

        let (mut width, mut height) = configure.new_size;
        if width == 0 || height == 0 {
            if let Some((w, h)) = self
                .output_state
                .info(&output.wl_output)
                .and_then(|info| info.logical_size)
            {
                (width, height) = (w.max(1) as u32, h.max(1) as u32);
            }
        }
        if width == 0 || height == 0 {
            warn!(output = %output.engine.name(), "compositor sent an empty configure");
            return;
        }

        let Some(bg_layer) = output.layer.as_mut() else {
            return;
        };

        let len = width as usize * height as usize * 4;
        match bg_layer.pool.as_mut() {
            Some(pool) => {
                if let Err(why) = pool.resize(len) {
                    error!(?why, "failed to resize the pool");
                    return;
                }
            }
            None => match SlotPool::new(len, &self.shm_state) {
                Ok(pool) => bg_layer.pool = Some(pool),
                Err(why) => {
                    error!(?why, "failed to create the pool");
                    return;
                }
            },
        }
        bg_layer
            .surface
            .configure(&mut output.engine, width, height);
    }
}

impl ShmHandler for MotionBg {
    fn shm_state(&mut self) -> &mut Shm {
        &mut self.shm_state
    }
}

delegate_compositor!(MotionBg);
delegate_output!(MotionBg);
delegate_shm!(MotionBg);

delegate_layer!(MotionBg);

delegate_registry!(MotionBg);

impl ProvidesRegistryState for MotionBg {
    fn registry(&mut self) -> &mut RegistryState {
        &mut self.registry_state
    }
    registry_handlers![OutputState];
}

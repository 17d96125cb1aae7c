//! Windowed host: a winit application driving the scene controller on the
//! wgpu backend.
//!
//! | Key | Action |
//! |-----|--------|
//! | `1`..`9` | Activate the scene at that position |
//! | Left / Right | Previous / next scene |
//! | Space | First action button of the current scene |
//! | `P` | Pause / resume the clock |
//! | Escape | Quit |

use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::ActiveEventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::Camera;
use crate::config::AppConfig;
use crate::error::Result;
use crate::gpu::{self, GpuPostProcess, GpuRenderer};
use crate::lifecycle::SceneLifecycleController;
use crate::scenes;
use crate::time::FrameClock;

type Controller = SceneLifecycleController<GpuRenderer, GpuPostProcess>;

pub struct App {
    config: AppConfig,
    window: Option<Arc<Window>>,
    controller: Option<Controller>,
    clock: FrameClock,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let clock = FrameClock::new(&config.clock);
        Self {
            config,
            window: None,
            controller: None,
            clock,
        }
    }

    fn start(&mut self, window: Arc<Window>) -> Result<(), Box<dyn std::error::Error>> {
        let size = window.inner_size();
        let (render, post) = gpu::create_backend(window.clone(), &self.config.post)?;

        let mut camera = Camera::default();
        camera.set_aspect(size.width, size.height);
        let mut controller = SceneLifecycleController::new(render, post).with_camera(camera);
        scenes::register_defaults(&mut controller)?;
        controller.resize(size.width, size.height);

        if let Err(err) = controller.set_active_scene(&self.config.initial_scene) {
            log::warn!(
                "initial scene '{}' failed ({}), falling back to the first scene",
                self.config.initial_scene,
                err
            );
            controller.set_active_index(0)?;
        }

        self.controller = Some(controller);
        self.update_title();
        Ok(())
    }

    fn update_title(&self) {
        let (Some(window), Some(controller)) = (&self.window, &self.controller) else {
            return;
        };
        match controller.current_scene_id() {
            Some(id) => window.set_title(&format!("{} - {}", self.config.window.title, id)),
            None => window.set_title(&self.config.window.title),
        }
    }

    fn handle_key(&mut self, event_loop: &ActiveEventLoop, event: &KeyEvent) {
        if event.state != ElementState::Pressed || event.repeat {
            return;
        }
        let PhysicalKey::Code(code) = event.physical_key else {
            return;
        };
        if code == KeyCode::Escape {
            event_loop.exit();
            return;
        }
        if code == KeyCode::KeyP {
            self.clock.toggle_pause();
            log::info!("clock {}", if self.clock.is_paused() { "paused" } else { "running" });
            return;
        }
        let Some(controller) = &mut self.controller else {
            return;
        };

        let switched = match code {
            KeyCode::ArrowRight => Some(controller.next_scene()),
            KeyCode::ArrowLeft => Some(controller.previous_scene()),
            KeyCode::Space => {
                let action = controller
                    .controls()
                    .and_then(|panel| panel.actions().next());
                if let Some(action) = action {
                    controller.trigger(action);
                }
                None
            }
            _ => digit_index(code).map(|index| controller.set_active_index(index)),
        };

        match switched {
            Some(Ok(())) => self.update_title(),
            Some(Err(err)) => log::error!("scene switch failed: {}", err),
            None => {}
        }
    }
}

fn digit_index(code: KeyCode) -> Option<usize> {
    let index = match code {
        KeyCode::Digit1 => 0,
        KeyCode::Digit2 => 1,
        KeyCode::Digit3 => 2,
        KeyCode::Digit4 => 3,
        KeyCode::Digit5 => 4,
        KeyCode::Digit6 => 5,
        KeyCode::Digit7 => 6,
        KeyCode::Digit8 => 7,
        KeyCode::Digit9 => 8,
        _ => return None,
    };
    Some(index)
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };
        self.window = Some(window.clone());

        if let Err(err) = self.start(window) {
            log::error!("failed to start: {}", err);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                if let Some(controller) = &mut self.controller {
                    controller.shutdown();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(physical_size) => {
                if let Some(controller) = &mut self.controller {
                    controller.resize(physical_size.width, physical_size.height);
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                self.handle_key(event_loop, &event);
            }
            WindowEvent::RedrawRequested => {
                let dt = self.clock.tick();
                if let Some(controller) = &mut self.controller {
                    if let Err(err) = controller.update(dt) {
                        log::error!("frame {} failed: {}", self.clock.frame(), err);
                    }
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_keys_map_to_scene_indices() {
        assert_eq!(digit_index(KeyCode::Digit1), Some(0));
        assert_eq!(digit_index(KeyCode::Digit9), Some(8));
        assert_eq!(digit_index(KeyCode::Digit0), None);
        assert_eq!(digit_index(KeyCode::KeyA), None);
    }
}

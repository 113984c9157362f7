// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use trine_core::init_tracing;
use trine_platform::WindowSpec;
use trine_render_vk::{VkConfig, VkRenderer};

use trine_platform::winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

mod config;

use config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the TOML config; a missing file means defaults
    #[arg(long, default_value = "trine.toml")]
    config: PathBuf,
    /// Force the validation layers on
    #[arg(long, overrides_with = "no_validation")]
    validation: bool,
    /// Force the validation layers off
    #[arg(long, overrides_with = "validation")]
    no_validation: bool,
}

impl Args {
    fn validation_override(&self) -> Option<bool> {
        match (self.validation, self.no_validation) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

struct App {
    spec: WindowSpec,
    vk_cfg: VkConfig,

    // Declared before `window` so it is dropped first.
    renderer: Option<VkRenderer>,
    window: Option<Window>,

    exiting: bool,
    fatal: Option<anyhow::Error>,
    frames: u32,
    last_fps_instant: Instant,
}

impl App {
    fn new(spec: WindowSpec, vk_cfg: VkConfig) -> Self {
        App {
            spec,
            vk_cfg,
            renderer: None,
            window: None,
            exiting: false,
            fatal: None,
            frames: 0,
            last_fps_instant: Instant::now(),
        }
    }

    /// Stores the error for `main` to report and shuts everything down.
    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        self.fatal = Some(err);
        self.shutdown(event_loop);
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        self.exiting = true;
        self.renderer = None;
        self.window = None;
        event_loop.exit();
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = event_loop
            .create_window(self.spec.attributes())
            .context("failed to create window")?;
        let renderer = VkRenderer::new(&window, &self.vk_cfg)?;
        let (w, h) = renderer.extent();
        info!("renderer up: {}x{}, {} swapchain images", w, h, renderer.image_count());

        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() && !self.exiting {
            if let Err(e) = self.init(event_loop) {
                self.fail(event_loop, e);
                return;
            }
        }
        event_loop.set_control_flow(ControlFlow::Poll);
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if let Some(window) = &self.window {
            if window_id != window.id() {
                return;
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.shutdown(event_loop);
            }

            WindowEvent::RedrawRequested => {
                if self.exiting {
                    return;
                }
                let Some(renderer) = &mut self.renderer else {
                    return;
                };
                match renderer.render_frame() {
                    Ok(()) => self.frames = self.frames.saturating_add(1),
                    Err(e) => self.fail(event_loop, e.context("render error")),
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.exiting {
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }

        let now = Instant::now();
        if now.duration_since(self.last_fps_instant).as_secs_f32() >= 1.0 {
            info!("fps ~ {}", self.frames);
            self.frames = 0;
            self.last_fps_instant = now;
        }
    }
}

/// The whole cause chain on one line, `Error: ` prefixed.
fn fatal_line(err: &anyhow::Error) -> String {
    let full = format!("Error: {err:#}");
    full.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{}", fatal_line(&e));
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let cfg = AppCfg::load(&args.config)?;

    let event_loop: EventLoop<()> = EventLoop::new()?;
    let mut app = App::new(cfg.window_spec(), cfg.vk_config(args.validation_override()));
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("trine").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.config, PathBuf::from("trine.toml"));
        assert_eq!(args.validation_override(), None);
    }

    #[test]
    fn validation_flags() {
        assert_eq!(parse(&["--validation"]).validation_override(), Some(true));
        assert_eq!(parse(&["--no-validation"]).validation_override(), Some(false));
        // Last one wins.
        assert_eq!(
            parse(&["--validation", "--no-validation"]).validation_override(),
            Some(false)
        );
        assert_eq!(
            parse(&["--no-validation", "--validation"]).validation_override(),
            Some(true)
        );
    }

    #[test]
    fn fatal_error_is_one_line() {
        let err = Err::<(), _>(driver_error())
            .context("failed to create logical device")
            .unwrap_err();
        let line = fatal_line(&err);
        assert!(!line.contains('\n'));
        assert_eq!(line, "Error: failed to create logical device: initialization failed");
    }

    #[test]
    fn multi_line_causes_are_flattened() {
        let err = AppCfg::parse("[render\n")
            .context("invalid config trine.toml")
            .unwrap_err();
        let line = fatal_line(&err);
        assert!(!line.contains('\n'));
        assert!(line.starts_with("Error: invalid config trine.toml: "));
    }

    fn driver_error() -> std::io::Error {
        std::io::Error::other("initialization failed")
    }

    #[test]
    fn config_path() {
        assert_eq!(parse(&["--config", "x.toml"]).config, PathBuf::from("x.toml"));
    }
}

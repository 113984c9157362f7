// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use trine_platform::WindowSpec;
use trine_render_vk::VkConfig;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let spec = WindowSpec::default();
        WindowCfg {
            title: spec.title,
            width: spec.width,
            height: spec.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderCfg {
    #[serde(default = "default_clear")]
    pub clear_color: [f32; 4],
    /// Unset means "on in debug builds".
    #[serde(default)]
    pub validation: Option<bool>,
    #[serde(default)]
    pub vertex_shader: Option<PathBuf>,
    #[serde(default)]
    pub fragment_shader: Option<PathBuf>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: default_clear(),
            validation: None,
            vertex_shader: None,
            fragment_shader: None,
        }
    }
}

fn default_clear() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppCfg {
    #[serde(default)]
    pub window: WindowCfg,
    #[serde(default)]
    pub render: RenderCfg,
}

impl AppCfg {
    /// A missing file means defaults; an unreadable or malformed one is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(s) => Self::parse(&s).with_context(|| format!("invalid config {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(AppCfg::default()),
            Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    /// `validation_override` comes from the command line and beats the file.
    pub fn vk_config(&self, validation_override: Option<bool>) -> VkConfig {
        let mut vk = VkConfig {
            clear_color: self.render.clear_color,
            ..VkConfig::default()
        };
        if let Some(v) = validation_override.or(self.render.validation) {
            vk.validation = v;
        }
        if let Some(p) = &self.render.vertex_shader {
            vk.vertex_shader = p.clone();
        }
        if let Some(p) = &self.render.fragment_shader {
            vk.fragment_shader = p.clone();
        }
        vk
    }
}

// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};
use std::path::PathBuf;

use ash::khr::swapchain;

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Where the bundled shaders were compiled to, if the build compiled them.
fn default_shader_dir() -> PathBuf {
    PathBuf::from(option_env!("TRINE_SHADER_DIR").unwrap_or("shaders"))
}

/// Bootstrap settings, built once at startup and only ever read afterwards.
#[derive(Clone, Debug)]
pub struct VkConfig {
    pub app_name: CString,
    /// Enables the validation layers and the debug messenger.
    pub validation: bool,
    pub validation_layers: Vec<CString>,
    pub device_extensions: Vec<&'static CStr>,
    pub vertex_shader: PathBuf,
    pub fragment_shader: PathBuf,
    pub clear_color: [f32; 4],
}

impl Default for VkConfig {
    fn default() -> Self {
        let shaders = default_shader_dir();
        VkConfig {
            app_name: c"Hello Triangle".to_owned(),
            validation: cfg!(debug_assertions),
            validation_layers: vec![VALIDATION_LAYER.to_owned()],
            device_extensions: vec![swapchain::NAME],
            vertex_shader: shaders.join("vert.spv"),
            fragment_shader: shaders.join("frag.spv"),
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl VkConfig {
    /// Layers to enable on the instance (and, for older loaders, the device).
    pub fn enabled_layers(&self) -> &[CString] {
        if self.validation {
            &self.validation_layers
        } else {
            &[]
        }
    }
}

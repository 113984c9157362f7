// SPDX-License-Identifier: CEPL-1.0
use std::path::PathBuf;

use ash::vk;

/// Startup failures that are properties of the machine or its configuration
/// rather than of a single API call. None of them are retryable.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("failed to find GPU with vulkan support")]
    NoVulkanDevice,
    #[error("suitable device not found")]
    NoSuitableDevice,
    #[error("validation layer {0} unavailable")]
    MissingLayer(String),
    #[error("failed to load shader code from {path}: {source}")]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to create framebuffer {index}: {result}")]
    FramebufferCreate { index: usize, result: vk::Result },
    #[error("swapchain is out of date and recreation is not supported")]
    SwapchainOutOfDate,
}

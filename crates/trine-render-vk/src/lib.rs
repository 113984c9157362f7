// SPDX-License-Identifier: CEPL-1.0
//! Vulkan bootstrap and single-frame-in-flight presentation of one triangle.
//!
//! Construction runs instance → device → swapchain → pipeline → framebuffers
//! → frame sync, each stage built from the previous one. `Drop` walks
//! [`TEARDOWN_ORDER`].

pub mod config;
pub mod device;
pub mod error;
pub mod frame;
pub mod framebuffer;
pub mod instance;
pub mod pipeline;
pub mod probe;
pub mod select;
pub mod shader;
pub mod swapchain;

use anyhow::{ensure, Context, Result};
use tracing::{debug, info};
use trine_platform::SurfaceProvider;

pub use config::VkConfig;
pub use error::SetupError;

use device::DeviceContext;
use frame::{draw_frame, FrameContext, GpuFrame};
use framebuffer::FramebufferSet;
use instance::InstanceContext;
use pipeline::PipelineContext;
use probe::SurfaceProbe;
use select::select_physical_device;
use swapchain::SwapchainContext;

/// One step of shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TeardownStage {
    DeviceIdle,
    FrameSync,
    CommandPool,
    Framebuffers,
    Pipeline,
    PipelineLayout,
    RenderPass,
    ImageViews,
    Swapchain,
    Device,
    Surface,
    DebugMessenger,
    Instance,
}

/// Reverse of construction order. The window outlives all of it.
pub const TEARDOWN_ORDER: [TeardownStage; 13] = [
    TeardownStage::DeviceIdle,
    TeardownStage::FrameSync,
    TeardownStage::CommandPool,
    TeardownStage::Framebuffers,
    TeardownStage::Pipeline,
    TeardownStage::PipelineLayout,
    TeardownStage::RenderPass,
    TeardownStage::ImageViews,
    TeardownStage::Swapchain,
    TeardownStage::Device,
    TeardownStage::Surface,
    TeardownStage::DebugMessenger,
    TeardownStage::Instance,
];

/// Every swapchain image needs exactly one view and one framebuffer.
fn check_attachment_counts(images: usize, views: usize, framebuffers: usize) -> Result<()> {
    ensure!(
        images == views && views == framebuffers,
        "image/view/framebuffer count mismatch ({images} / {views} / {framebuffers})"
    );
    Ok(())
}

pub struct VkRenderer {
    frame: FrameContext,
    framebuffers: FramebufferSet,
    pipeline: PipelineContext,
    swapchain: SwapchainContext,
    device: DeviceContext,
    instance: InstanceContext,
    clear_color: [f32; 4],
}

impl VkRenderer {
    /// Builds the whole chain against `window`. Any failure is fatal.
    pub fn new(window: &dyn SurfaceProvider, cfg: &VkConfig) -> Result<Self> {
        unsafe {
            let instance = InstanceContext::new(window, cfg)?;

            let candidates = instance
                .instance
                .enumerate_physical_devices()
                .context("enumerate_physical_devices")?;
            let probe = SurfaceProbe {
                instance: &instance.instance,
                surface_loader: &instance.surface_loader,
                surface: instance.surface,
            };
            let selected = select_physical_device(&probe, &candidates, &cfg.device_extensions)?;

            let device = DeviceContext::new(&instance, selected, cfg)?;
            let swapchain = SwapchainContext::new(&instance, &device, window.framebuffer_size())?;
            let pipeline = PipelineContext::new(&device.device, swapchain.format, swapchain.extent, cfg)?;
            let framebuffers = FramebufferSet::new(
                &device.device,
                pipeline.render_pass,
                &swapchain.image_views,
                swapchain.extent,
            )?;
            check_attachment_counts(
                swapchain.images.len(),
                swapchain.image_views.len(),
                framebuffers.len(),
            )?;
            let frame = FrameContext::new(&device)?;

            info!(
                "Vulkan renderer ready ({}x{}, {} images)",
                swapchain.extent.width,
                swapchain.extent.height,
                swapchain.len()
            );

            Ok(VkRenderer {
                frame,
                framebuffers,
                pipeline,
                swapchain,
                device,
                instance,
                clear_color: cfg.clear_color,
            })
        }
    }

    /// Waits for the previous frame, then records, submits and presents the
    /// next one.
    pub fn render_frame(&mut self) -> Result<()> {
        let mut ops = GpuFrame {
            device: &self.device,
            swapchain: &self.swapchain,
            pipeline: &self.pipeline,
            framebuffers: &self.framebuffers,
            frame: &self.frame,
            clear_color: self.clear_color,
        };
        draw_frame(&mut ops)?;
        Ok(())
    }

    pub fn extent(&self) -> (u32, u32) {
        (self.swapchain.extent.width, self.swapchain.extent.height)
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.len()
    }
}

impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            for stage in TEARDOWN_ORDER {
                debug!(?stage, "teardown");
                let d = &self.device.device;
                match stage {
                    TeardownStage::DeviceIdle => {
                        d.device_wait_idle().ok();
                    }
                    TeardownStage::FrameSync => self.frame.destroy_sync(d),
                    TeardownStage::CommandPool => self.frame.destroy_pool(d),
                    TeardownStage::Framebuffers => self.framebuffers.destroy(d),
                    TeardownStage::Pipeline => self.pipeline.destroy_pipeline(d),
                    TeardownStage::PipelineLayout => self.pipeline.destroy_layout(d),
                    TeardownStage::RenderPass => self.pipeline.destroy_render_pass(d),
                    TeardownStage::ImageViews => self.swapchain.destroy_image_views(d),
                    TeardownStage::Swapchain => self.swapchain.destroy(&self.device),
                    TeardownStage::Device => self.device.destroy(),
                    TeardownStage::Surface => self.instance.destroy_surface(),
                    TeardownStage::DebugMessenger => self.instance.destroy_debug_messenger(),
                    TeardownStage::Instance => self.instance.destroy_instance(),
                }
            }
        }
    }
}

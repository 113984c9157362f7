// SPDX-License-Identifier: CEPL-1.0
//! Per-frame command recording and the synchronisation for one frame in
//! flight.

use anyhow::{Context, Result};
use ash::vk;
use tracing::debug;

use crate::device::DeviceContext;
use crate::error::SetupError;
use crate::framebuffer::FramebufferSet;
use crate::pipeline::{full_scissor, full_viewport, PipelineContext};
use crate::swapchain::SwapchainContext;

/// Command pool, its single command buffer and the three sync objects.
pub struct FrameContext {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    /// Signalled by acquire, waited on by submit.
    pub image_available: vk::Semaphore,
    /// Signalled by submit, waited on by present.
    pub render_finished: vk::Semaphore,
    /// Created signalled so the first wait returns at once.
    pub in_flight: vk::Fence,
}

impl FrameContext {
    pub unsafe fn new(dev: &DeviceContext) -> Result<Self> {
        let device = &dev.device;

        let pool_info = vk::CommandPoolCreateInfo {
            s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
            flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            queue_family_index: dev.selected.graphics_family,
            ..Default::default()
        };
        let command_pool = device
            .create_command_pool(&pool_info, None)
            .context("failed to create command pool")?;

        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let command_buffer = device
            .allocate_command_buffers(&alloc_info)
            .context("failed to allocate command buffers")?[0];

        let sem_info = vk::SemaphoreCreateInfo {
            s_type: vk::StructureType::SEMAPHORE_CREATE_INFO,
            ..Default::default()
        };
        let fence_info = vk::FenceCreateInfo {
            s_type: vk::StructureType::FENCE_CREATE_INFO,
            flags: vk::FenceCreateFlags::SIGNALED,
            ..Default::default()
        };
        let image_available = device
            .create_semaphore(&sem_info, None)
            .context("failed to create semaphores")?;
        let render_finished = device
            .create_semaphore(&sem_info, None)
            .context("failed to create semaphores")?;
        let in_flight = device
            .create_fence(&fence_info, None)
            .context("failed to create fence")?;

        Ok(FrameContext {
            command_pool,
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }

    pub(crate) unsafe fn destroy_sync(&self, device: &ash::Device) {
        device.destroy_semaphore(self.render_finished, None);
        device.destroy_semaphore(self.image_available, None);
        device.destroy_fence(self.in_flight, None);
    }

    /// Frees the command buffer along with the pool.
    pub(crate) unsafe fn destroy_pool(&self, device: &ash::Device) {
        device.destroy_command_pool(self.command_pool, None);
    }
}

/// The steps of one frame, in the order `draw_frame` issues them.
pub(crate) trait FrameOps {
    fn wait_in_flight(&mut self) -> Result<()>;
    fn reset_in_flight(&mut self) -> Result<()>;
    fn acquire_image(&mut self) -> Result<u32>;
    fn reset_commands(&mut self) -> Result<()>;
    fn record_commands(&mut self, image_index: u32) -> Result<()>;
    fn submit(&mut self) -> Result<()>;
    fn present(&mut self, image_index: u32) -> Result<()>;
}

/// Runs one full frame and returns the image index that was presented.
/// Stops at the first failing step.
pub(crate) fn draw_frame(ops: &mut impl FrameOps) -> Result<u32> {
    ops.wait_in_flight()?;
    ops.reset_in_flight()?;

    let image_index = ops.acquire_image()?;

    ops.reset_commands()?;
    ops.record_commands(image_index)?;

    ops.submit()?;
    ops.present(image_index)?;

    Ok(image_index)
}

fn swapchain_error(err: vk::Result, what: &'static str) -> anyhow::Error {
    if err == vk::Result::ERROR_OUT_OF_DATE_KHR {
        SetupError::SwapchainOutOfDate.into()
    } else {
        anyhow::Error::new(err).context(what)
    }
}

/// `FrameOps` against the live device.
pub(crate) struct GpuFrame<'a> {
    pub device: &'a DeviceContext,
    pub swapchain: &'a SwapchainContext,
    pub pipeline: &'a PipelineContext,
    pub framebuffers: &'a FramebufferSet,
    pub frame: &'a FrameContext,
    pub clear_color: [f32; 4],
}

impl FrameOps for GpuFrame<'_> {
    fn wait_in_flight(&mut self) -> Result<()> {
        unsafe {
            self.device
                .device
                .wait_for_fences(std::slice::from_ref(&self.frame.in_flight), true, u64::MAX)
                .context("wait_for_fences")
        }
    }

    fn reset_in_flight(&mut self) -> Result<()> {
        unsafe {
            self.device
                .device
                .reset_fences(std::slice::from_ref(&self.frame.in_flight))
                .context("reset_fences")
        }
    }

    fn acquire_image(&mut self) -> Result<u32> {
        let (image_index, suboptimal) = unsafe {
            self.device
                .swapchain_loader
                .acquire_next_image(
                    self.swapchain.swapchain,
                    u64::MAX,
                    self.frame.image_available,
                    vk::Fence::null(),
                )
                .map_err(|e| swapchain_error(e, "failed to acquire swap chain image"))?
        };
        if suboptimal {
            debug!("acquire: swapchain suboptimal");
        }
        Ok(image_index)
    }

    fn reset_commands(&mut self) -> Result<()> {
        unsafe {
            self.device
                .device
                .reset_command_buffer(self.frame.command_buffer, vk::CommandBufferResetFlags::empty())
                .context("reset_command_buffer")
        }
    }

    fn record_commands(&mut self, image_index: u32) -> Result<()> {
        let device = &self.device.device;
        let cmd = self.frame.command_buffer;
        let extent = self.swapchain.extent;
        let framebuffer = self
            .framebuffers
            .get(image_index)
            .with_context(|| format!("no framebuffer for image {image_index}"))?;

        unsafe {
            let begin = vk::CommandBufferBeginInfo {
                s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
                ..Default::default()
            };
            device
                .begin_command_buffer(cmd, &begin)
                .context("failed to begin recording command buffer")?;

            let clears = [vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: self.clear_color,
                },
            }];
            let rp_begin = vk::RenderPassBeginInfo {
                s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
                render_pass: self.pipeline.render_pass,
                framebuffer,
                render_area: full_scissor(extent),
                clear_value_count: clears.len() as u32,
                p_clear_values: clears.as_ptr(),
                ..Default::default()
            };

            device.cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE);
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline);
            device.cmd_set_viewport(cmd, 0, &[full_viewport(extent)]);
            device.cmd_set_scissor(cmd, 0, &[full_scissor(extent)]);
            device.cmd_draw(cmd, 3, 1, 0, 0);
            device.cmd_end_render_pass(cmd);

            device
                .end_command_buffer(cmd)
                .context("failed to record command buffer")
        }
    }

    fn submit(&mut self) -> Result<()> {
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.frame.image_available,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            command_buffer_count: 1,
            p_command_buffers: &self.frame.command_buffer,
            signal_semaphore_count: 1,
            p_signal_semaphores: &self.frame.render_finished,
            ..Default::default()
        };
        unsafe {
            self.device
                .device
                .queue_submit(
                    self.device.graphics_queue,
                    std::slice::from_ref(&submit),
                    self.frame.in_flight,
                )
                .context("failed to submit draw command buffer")
        }
    }

    fn present(&mut self, image_index: u32) -> Result<()> {
        let present = vk::PresentInfoKHR {
            s_type: vk::StructureType::PRESENT_INFO_KHR,
            wait_semaphore_count: 1,
            p_wait_semaphores: &self.frame.render_finished,
            swapchain_count: 1,
            p_swapchains: &self.swapchain.swapchain,
            p_image_indices: &image_index,
            ..Default::default()
        };
        let suboptimal = unsafe {
            self.device
                .swapchain_loader
                .queue_present(self.device.present_queue, &present)
                .map_err(|e| swapchain_error(e, "failed to present swap chain image"))?
        };
        if suboptimal {
            debug!("present: swapchain suboptimal");
        }
        Ok(())
    }
}

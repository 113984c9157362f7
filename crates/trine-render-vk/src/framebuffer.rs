// SPDX-License-Identifier: CEPL-1.0
use ash::vk;

use crate::error::SetupError;

/// One framebuffer per swapchain image view, in image order.
pub struct FramebufferSet {
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl FramebufferSet {
    pub unsafe fn new(
        device: &ash::Device,
        render_pass: vk::RenderPass,
        views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Self, SetupError> {
        let mut framebuffers = Vec::with_capacity(views.len());
        for (index, view) in views.iter().enumerate() {
            let info = vk::FramebufferCreateInfo {
                s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                render_pass,
                attachment_count: 1,
                p_attachments: view,
                width: extent.width,
                height: extent.height,
                layers: 1,
                ..Default::default()
            };
            match device.create_framebuffer(&info, None) {
                Ok(fb) => framebuffers.push(fb),
                Err(result) => {
                    for fb in framebuffers {
                        device.destroy_framebuffer(fb, None);
                    }
                    return Err(SetupError::FramebufferCreate { index, result });
                }
            }
        }
        Ok(FramebufferSet { framebuffers })
    }

    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    pub(crate) unsafe fn destroy(&mut self, device: &ash::Device) {
        for fb in self.framebuffers.drain(..) {
            device.destroy_framebuffer(fb, None);
        }
    }
}

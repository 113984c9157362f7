// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::vk;
use tracing::info;
use trine_platform::RenderSize;

use crate::device::DeviceContext;
use crate::instance::InstanceContext;
use crate::probe::{query_surface_support, SurfaceProbe};
use crate::select::SelectedDevice;

pub const PREFERRED_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Swapchain, its images and one view per image. Images belong to the
/// swapchain; views are destroyed individually.
pub struct SwapchainContext {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

/// The preferred BGRA8/sRGB pair if offered, otherwise whatever comes first.
/// `formats` must not be empty; device selection guarantees that.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_FORMAT.format && f.color_space == PREFERRED_FORMAT.color_space)
        .unwrap_or_else(|| formats[0])
}

/// MAILBOX when available, otherwise FIFO (always supported).
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

pub fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: framebuffer
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum; a zero maximum means unbounded.
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let wanted = caps.min_image_count + 1;
    if caps.max_image_count > 0 {
        wanted.min(caps.max_image_count)
    } else {
        wanted
    }
}

/// CONCURRENT across both families when they differ, else EXCLUSIVE.
pub fn sharing_mode(sel: &SelectedDevice) -> (vk::SharingMode, Vec<u32>) {
    if sel.families_differ() {
        (
            vk::SharingMode::CONCURRENT,
            vec![sel.graphics_family, sel.present_family],
        )
    } else {
        (vk::SharingMode::EXCLUSIVE, Vec::new())
    }
}

fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        _ => "OTHER",
    }
}

impl SwapchainContext {
    pub unsafe fn new(inst: &InstanceContext, dev: &DeviceContext, framebuffer: RenderSize) -> Result<Self> {
        let probe = SurfaceProbe {
            instance: &inst.instance,
            surface_loader: &inst.surface_loader,
            surface: inst.surface,
        };
        let support = query_surface_support(&probe, dev.selected.phys)?;
        let caps = &support.capabilities;

        let surf_format = choose_surface_format(&support.formats);
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = extent_from_caps(caps, framebuffer);
        let min_count = image_count(caps);
        let (sharing, family_indices) = sharing_mode(&dev.selected);

        let swap_info = vk::SwapchainCreateInfoKHR {
            s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
            surface: inst.surface,
            min_image_count: min_count,
            image_format: surf_format.format,
            image_color_space: surf_format.color_space,
            image_extent: extent,
            image_array_layers: 1,
            image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            image_sharing_mode: sharing,
            queue_family_index_count: family_indices.len() as u32,
            p_queue_family_indices: if family_indices.is_empty() {
                std::ptr::null()
            } else {
                family_indices.as_ptr()
            },
            pre_transform: caps.current_transform,
            composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            present_mode,
            clipped: vk::TRUE,
            old_swapchain: vk::SwapchainKHR::null(),
            ..Default::default()
        };

        let swapchain = dev
            .swapchain_loader
            .create_swapchain(&swap_info, None)
            .context("failed to create swapchain")?;
        // The driver may hand back more images than requested.
        let images = dev
            .swapchain_loader
            .get_swapchain_images(swapchain)
            .context("get_swapchain_images")?;

        let mut image_views = Vec::with_capacity(images.len());
        for &image in &images {
            image_views.push(create_view(&dev.device, image, surf_format.format)?);
        }

        info!(
            "swapchain: {:?} / {:?}, present_mode: {}, extent: {}x{}, images(requested={} → got={})",
            surf_format.format,
            surf_format.color_space,
            pm_name(present_mode),
            extent.width,
            extent.height,
            min_count,
            images.len()
        );

        Ok(SwapchainContext {
            swapchain,
            format: surf_format.format,
            extent,
            images,
            image_views,
        })
    }

    pub fn len(&self) -> usize {
        debug_assert_eq!(self.images.len(), self.image_views.len());
        self.image_views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) unsafe fn destroy_image_views(&mut self, device: &ash::Device) {
        for iv in self.image_views.drain(..) {
            device.destroy_image_view(iv, None);
        }
    }

    pub(crate) unsafe fn destroy(&mut self, dev: &DeviceContext) {
        dev.swapchain_loader.destroy_swapchain(self.swapchain, None);
        self.images.clear();
    }
}

unsafe fn create_view(device: &ash::Device, image: vk::Image, format: vk::Format) -> Result<vk::ImageView> {
    let iv_info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        components: vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        },
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    device
        .create_image_view(&iv_info, None)
        .context("failed to create image view")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn fmt(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn caps(min: u32, max: u32, current: (u32, u32)) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 640,
                height: 480,
            },
            max_image_extent: vk::Extent2D {
                width: 1920,
                height: 1080,
            },
            ..Default::default()
        }
    }

    fn wh(e: vk::Extent2D) -> (u32, u32) {
        (e.width, e.height)
    }

    fn pair(f: vk::SurfaceFormatKHR) -> (vk::Format, vk::ColorSpaceKHR) {
        (f.format, f.color_space)
    }

    fn size(width: u32, height: u32) -> RenderSize {
        RenderSize { width, height }
    }

    #[test]
    fn preferred_format_wins_wherever_it_is() {
        let formats = [
            fmt(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            fmt(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            PREFERRED_FORMAT,
        ];
        assert_eq!(pair(choose_surface_format(&formats)), pair(PREFERRED_FORMAT));
    }

    #[test]
    fn falls_back_to_first_format() {
        let first = fmt(vk::Format::R16G16B16A16_SFLOAT, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT);
        let formats = [
            first,
            fmt(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(pair(choose_surface_format(&formats)), pair(first));
    }

    #[test]
    fn mailbox_preferred_else_fifo() {
        use vk::PresentModeKHR as M;
        assert_eq!(choose_present_mode(&[M::FIFO, M::MAILBOX]), M::MAILBOX);
        assert_eq!(choose_present_mode(&[M::FIFO]), M::FIFO);
        assert_eq!(choose_present_mode(&[M::IMMEDIATE, M::FIFO_RELAXED]), M::FIFO);
        assert_eq!(choose_present_mode(&[]), M::FIFO);
    }

    #[test]
    fn defined_extent_is_used_verbatim() {
        let c = caps(2, 0, (800, 600));
        assert_eq!(wh(extent_from_caps(&c, size(5000, 10))), (800, 600));
    }

    #[test]
    fn sentinel_extent_uses_framebuffer_inside_bounds() {
        let c = caps(2, 3, (u32::MAX, u32::MAX));
        assert_eq!(wh(extent_from_caps(&c, size(1024, 768))), (1024, 768));
    }

    #[test]
    fn sentinel_extent_clamps_each_axis() {
        let c = caps(2, 3, (u32::MAX, u32::MAX));
        assert_eq!(wh(extent_from_caps(&c, size(100, 4000))), (640, 1080));
        assert_eq!(wh(extent_from_caps(&c, size(3000, 10))), (1920, 480));
    }

    #[test]
    fn image_count_is_min_plus_one_uncapped() {
        assert_eq!(image_count(&caps(2, 0, (800, 600))), 3);
    }

    #[test]
    fn image_count_at_cap_stays() {
        assert_eq!(image_count(&caps(2, 3, (800, 600))), 3);
    }

    #[test]
    fn image_count_respects_bounds() {
        for min in 1..6 {
            for max in [0, min, min + 1, min + 4] {
                let n = image_count(&caps(min, max, (800, 600)));
                assert!(n >= min);
                if max > 0 {
                    assert!(n <= max);
                }
            }
        }
    }

    #[test]
    fn sharing_follows_family_split() {
        let mut sel = SelectedDevice {
            phys: vk::PhysicalDevice::from_raw(1),
            graphics_family: 0,
            present_family: 0,
        };
        assert_eq!(sharing_mode(&sel), (vk::SharingMode::EXCLUSIVE, vec![]));
        sel.present_family = 1;
        assert_eq!(sharing_mode(&sel), (vk::SharingMode::CONCURRENT, vec![0, 1]));
    }

    #[test]
    fn combined_family_scenario() {
        let gpu = crate::probe::fake::FakeGpu::combined();
        let support = gpu.support;
        assert_eq!(pair(choose_surface_format(&support.formats)), pair(PREFERRED_FORMAT));
        assert_eq!(choose_present_mode(&support.present_modes), vk::PresentModeKHR::FIFO);
        assert_eq!(wh(extent_from_caps(&support.capabilities, size(1, 1))), (800, 600));
        assert_eq!(image_count(&support.capabilities), 3);
    }
}

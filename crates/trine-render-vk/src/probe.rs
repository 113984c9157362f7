// SPDX-License-Identifier: CEPL-1.0
//! Read-only capability queries against a physical device and the window
//! surface. Nothing here creates or owns a Vulkan object.

use std::ffi::CString;

use anyhow::{Context, Result};
use ash::khr::surface;
use ash::vk;

/// Queue family roles found on one physical device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub present: Option<u32>,
}

impl QueueFamilyIndices {
    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.present.is_some()
    }

    /// Both indices, once the search filled every role.
    pub fn complete(&self) -> Option<(u32, u32)> {
        Some((self.graphics?, self.present?))
    }
}

/// Everything the swapchain negotiation reads from the surface.
#[derive(Clone, Debug, Default)]
pub struct SurfaceSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Driver queries used by device selection.
pub trait DeviceProbe {
    fn queue_families(&self, phys: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties>;
    fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> Result<bool>;
    fn device_extensions(&self, phys: vk::PhysicalDevice) -> Result<Vec<CString>>;
    fn surface_support(&self, phys: vk::PhysicalDevice) -> Result<SurfaceSupport>;
}

/// First graphics family and first present family, each found independently.
/// The scan stops at the first family index where both roles are filled.
pub fn find_queue_families(
    probe: &impl DeviceProbe,
    phys: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in probe.queue_families(phys).iter().enumerate() {
        let i = i as u32;
        if indices.present.is_none() && probe.supports_present(phys, i)? {
            indices.present = Some(i);
        }
        if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
            indices.graphics = Some(i);
        }
        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

/// Capabilities, formats and present modes the surface offers on `phys`.
pub fn query_surface_support(
    probe: &impl DeviceProbe,
    phys: vk::PhysicalDevice,
) -> Result<SurfaceSupport> {
    probe.surface_support(phys)
}

/// Live probe over an instance and the surface the window gave us.
pub struct SurfaceProbe<'a> {
    pub instance: &'a ash::Instance,
    pub surface_loader: &'a surface::Instance,
    pub surface: vk::SurfaceKHR,
}

impl DeviceProbe for SurfaceProbe<'_> {
    fn queue_families(&self, phys: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
        unsafe { self.instance.get_physical_device_queue_family_properties(phys) }
    }

    fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> Result<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(phys, family, self.surface)
                .context("get_physical_device_surface_support")
        }
    }

    fn device_extensions(&self, phys: vk::PhysicalDevice) -> Result<Vec<CString>> {
        let props = unsafe {
            self.instance
                .enumerate_device_extension_properties(phys)
                .context("enumerate_device_extension_properties")?
        };
        Ok(props
            .iter()
            .filter_map(|p| p.extension_name_as_c_str().ok())
            .map(|name| name.to_owned())
            .collect())
    }

    fn surface_support(&self, phys: vk::PhysicalDevice) -> Result<SurfaceSupport> {
        unsafe {
            Ok(SurfaceSupport {
                capabilities: self
                    .surface_loader
                    .get_physical_device_surface_capabilities(phys, self.surface)
                    .context("get_physical_device_surface_capabilities")?,
                formats: self
                    .surface_loader
                    .get_physical_device_surface_formats(phys, self.surface)
                    .context("get_physical_device_surface_formats")?,
                present_modes: self
                    .surface_loader
                    .get_physical_device_surface_present_modes(phys, self.surface)
                    .context("get_physical_device_surface_present_modes")?,
            })
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;
    use std::ffi::CString;

    use anyhow::Result;
    use ash::vk::{self, Handle};

    use super::{DeviceProbe, SurfaceSupport};

    #[derive(Clone, Default)]
    pub struct FakeGpu {
        /// (queue flags, can present) per family, in reported order.
        pub families: Vec<(vk::QueueFlags, bool)>,
        pub extensions: Vec<CString>,
        pub support: SurfaceSupport,
    }

    impl FakeGpu {
        pub fn combined() -> Self {
            FakeGpu {
                families: vec![(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, true)],
                extensions: vec![ash::khr::swapchain::NAME.to_owned()],
                support: SurfaceSupport {
                    capabilities: vk::SurfaceCapabilitiesKHR {
                        min_image_count: 2,
                        max_image_count: 0,
                        current_extent: vk::Extent2D {
                            width: 800,
                            height: 600,
                        },
                        ..Default::default()
                    },
                    formats: vec![
                        vk::SurfaceFormatKHR {
                            format: vk::Format::B8G8R8A8_SRGB,
                            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                        },
                        vk::SurfaceFormatKHR {
                            format: vk::Format::R8G8B8A8_UNORM,
                            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                        },
                    ],
                    present_modes: vec![vk::PresentModeKHR::FIFO],
                },
            }
        }
    }

    #[derive(Default)]
    pub struct FakeProbe {
        pub gpus: HashMap<u64, FakeGpu>,
    }

    impl FakeProbe {
        pub fn with(gpus: impl IntoIterator<Item = FakeGpu>) -> (Self, Vec<vk::PhysicalDevice>) {
            let mut probe = FakeProbe::default();
            let mut handles = Vec::new();
            for (i, gpu) in gpus.into_iter().enumerate() {
                let raw = 0x1000 + i as u64;
                probe.gpus.insert(raw, gpu);
                handles.push(vk::PhysicalDevice::from_raw(raw));
            }
            (probe, handles)
        }

        fn gpu(&self, phys: vk::PhysicalDevice) -> &FakeGpu {
            &self.gpus[&phys.as_raw()]
        }
    }

    impl DeviceProbe for FakeProbe {
        fn queue_families(&self, phys: vk::PhysicalDevice) -> Vec<vk::QueueFamilyProperties> {
            self.gpu(phys)
                .families
                .iter()
                .map(|&(queue_flags, _)| vk::QueueFamilyProperties {
                    queue_flags,
                    queue_count: 1,
                    ..Default::default()
                })
                .collect()
        }

        fn supports_present(&self, phys: vk::PhysicalDevice, family: u32) -> Result<bool> {
            Ok(self.gpu(phys).families[family as usize].1)
        }

        fn device_extensions(&self, phys: vk::PhysicalDevice) -> Result<Vec<CString>> {
            Ok(self.gpu(phys).extensions.clone())
        }

        fn surface_support(&self, phys: vk::PhysicalDevice) -> Result<SurfaceSupport> {
            Ok(self.gpu(phys).support.clone())
        }
    }
}

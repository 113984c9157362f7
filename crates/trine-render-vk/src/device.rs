// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use tracing::info;

use crate::config::VkConfig;
use crate::instance::InstanceContext;
use crate::select::SelectedDevice;

/// Logical device plus the graphics and present queues. When both roles live
/// in one family the two queue fields hold the same handle.
pub struct DeviceContext {
    pub selected: SelectedDevice,
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: swapchain::Device,
}

/// One entry per distinct family, graphics first.
pub fn unique_queue_families(sel: &SelectedDevice) -> Vec<u32> {
    if sel.families_differ() {
        vec![sel.graphics_family, sel.present_family]
    } else {
        vec![sel.graphics_family]
    }
}

impl DeviceContext {
    pub unsafe fn new(inst: &InstanceContext, selected: SelectedDevice, cfg: &VkConfig) -> Result<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = unique_queue_families(&selected)
            .into_iter()
            .map(|family| vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            })
            .collect();

        // Nothing optional is enabled.
        let features = vk::PhysicalDeviceFeatures::default();

        let device_exts: Vec<_> = cfg.device_extensions.iter().map(|e| e.as_ptr()).collect();
        // Device layers are ignored by current loaders; older ones still read them.
        let layers: Vec<_> = cfg.enabled_layers().iter().map(|l| l.as_ptr()).collect();

        let dinfo = vk::DeviceCreateInfo {
            s_type: vk::StructureType::DEVICE_CREATE_INFO,
            queue_create_info_count: queue_infos.len() as u32,
            p_queue_create_infos: queue_infos.as_ptr(),
            p_enabled_features: &features,
            enabled_extension_count: device_exts.len() as u32,
            pp_enabled_extension_names: device_exts.as_ptr(),
            enabled_layer_count: layers.len() as u32,
            pp_enabled_layer_names: layers.as_ptr(),
            ..Default::default()
        };

        let device = inst
            .instance
            .create_device(selected.phys, &dinfo, None)
            .context("failed to create logical device")?;
        let graphics_queue = device.get_device_queue(selected.graphics_family, 0);
        let present_queue = device.get_device_queue(selected.present_family, 0);
        let swapchain_loader = swapchain::Device::new(&inst.instance, &device);

        let props = inst.instance.get_physical_device_properties(selected.phys);
        info!(
            "device: {} (graphics family {}, present family {})",
            props
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            selected.graphics_family,
            selected.present_family
        );

        Ok(DeviceContext {
            selected,
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }

    pub(crate) unsafe fn destroy(&self) {
        self.device.destroy_device(None);
    }
}

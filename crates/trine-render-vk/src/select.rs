// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{CStr, CString};

use anyhow::Result;
use ash::vk;
use tracing::debug;

use crate::error::SetupError;
use crate::probe::{find_queue_families, query_surface_support, DeviceProbe};

/// The physical device that passed selection, with the facts that qualified it.
#[derive(Clone, Copy, Debug)]
pub struct SelectedDevice {
    pub phys: vk::PhysicalDevice,
    pub graphics_family: u32,
    pub present_family: u32,
}

impl SelectedDevice {
    pub fn families_differ(&self) -> bool {
        self.graphics_family != self.present_family
    }
}

/// Returns the first name in `wanted` absent from `available`. Matching is
/// exact and case-sensitive.
pub fn first_missing<'w, W: AsRef<CStr>>(
    wanted: &'w [W],
    available: &[CString],
) -> Option<&'w CStr> {
    wanted
        .iter()
        .map(|w| <W as AsRef<CStr>>::as_ref(w))
        .find(|w| !available.iter().any(|a| a.as_c_str() == *w))
}

/// Picks the first device, in enumeration order, that has graphics and present
/// queues, every required extension and a usable surface.
pub fn select_physical_device(
    probe: &impl DeviceProbe,
    candidates: &[vk::PhysicalDevice],
    required_extensions: &[&CStr],
) -> Result<SelectedDevice> {
    if candidates.is_empty() {
        return Err(SetupError::NoVulkanDevice.into());
    }

    for &phys in candidates {
        let indices = find_queue_families(probe, phys)?;
        let Some((graphics_family, present_family)) = indices.complete() else {
            debug!(?phys, "rejected: queue families incomplete");
            continue;
        };

        let available = probe.device_extensions(phys)?;
        if let Some(missing) = first_missing(required_extensions, &available) {
            debug!(?phys, ?missing, "rejected: extension missing");
            continue;
        }

        if !query_surface_support(probe, phys)?.is_adequate() {
            debug!(?phys, "rejected: no surface formats or present modes");
            continue;
        }

        return Ok(SelectedDevice {
            phys,
            graphics_family,
            present_family,
        });
    }

    Err(SetupError::NoSuitableDevice.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake::{FakeGpu, FakeProbe};
    use ash::khr::swapchain;

    fn select(gpus: Vec<FakeGpu>) -> (Result<SelectedDevice>, Vec<vk::PhysicalDevice>) {
        let (probe, handles) = FakeProbe::with(gpus);
        (select_physical_device(&probe, &handles, &[swapchain::NAME]), handles)
    }

    fn setup_err(res: Result<SelectedDevice>) -> SetupError {
        res.unwrap_err().downcast::<SetupError>().unwrap()
    }

    #[test]
    fn no_devices_is_fatal() {
        let (res, _) = select(Vec::new());
        assert!(matches!(setup_err(res), SetupError::NoVulkanDevice));
    }

    #[test]
    fn nothing_suitable_is_fatal() {
        let mut no_present = FakeGpu::combined();
        no_present.families = vec![(vk::QueueFlags::GRAPHICS, false)];
        let (res, _) = select(vec![no_present]);
        assert!(matches!(setup_err(res), SetupError::NoSuitableDevice));
    }

    #[test]
    fn first_passing_candidate_wins() {
        let mut first = FakeGpu::combined();
        first.support.present_modes = vec![vk::PresentModeKHR::FIFO];
        let mut better = FakeGpu::combined();
        better.support.present_modes =
            vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO];

        let (res, handles) = select(vec![first, better]);
        assert_eq!(res.unwrap().phys, handles[0]);
    }

    #[test]
    fn skips_candidates_failing_each_predicate() {
        let mut no_ext = FakeGpu::combined();
        no_ext.extensions = vec![c"VK_KHR_SWAPCHAIN".to_owned()];
        let mut no_formats = FakeGpu::combined();
        no_formats.support.formats.clear();
        let mut no_modes = FakeGpu::combined();
        no_modes.support.present_modes.clear();
        let mut split = FakeGpu::combined();
        split.families = vec![(vk::QueueFlags::GRAPHICS, false), (vk::QueueFlags::TRANSFER, true)];

        let (res, handles) = select(vec![no_ext, no_formats, no_modes, split]);
        let sel = res.unwrap();
        assert_eq!(sel.phys, handles[3]);
        assert_eq!((sel.graphics_family, sel.present_family), (0, 1));
        assert!(sel.families_differ());
    }

    #[test]
    fn combined_family_scenario() {
        let (res, handles) = select(vec![FakeGpu::combined()]);
        let sel = res.unwrap();
        assert_eq!(sel.phys, handles[0]);
        assert!(!sel.families_differ());
        assert_eq!((sel.graphics_family, sel.present_family), (0, 0));
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let available = vec![c"vk_khr_swapchain".to_owned()];
        assert_eq!(first_missing(&[swapchain::NAME], &available), Some(swapchain::NAME));

        let available = vec![c"VK_KHR_maintenance1".to_owned(), swapchain::NAME.to_owned()];
        assert_eq!(first_missing(&[swapchain::NAME], &available), None);
    }
}

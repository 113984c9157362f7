// SPDX-License-Identifier: CEPL-1.0
use std::ffi::{c_void, CStr, CString};

use anyhow::{anyhow, Context, Result};
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Entry, Instance};
use raw_window_handle::RawDisplayHandle;
use tracing::{debug, error, info, trace, warn};
use trine_platform::SurfaceProvider;

use crate::config::VkConfig;
use crate::error::SetupError;
use crate::select::first_missing;

/// Root of the ownership chain: loader, instance, optional debug messenger and
/// the window surface. Destroyed last, after the device context.
pub struct InstanceContext {
    pub entry: Entry,
    pub instance: Instance,
    debug: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface_loader: surface::Instance,
    pub surface: vk::SurfaceKHR,
}

unsafe extern "system" fn debug_callback(
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _types: vk::DebugUtilsMessageTypeFlagsEXT,
    data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user: *mut c_void,
) -> vk::Bool32 {
    if data.is_null() || unsafe { (*data).p_message.is_null() } {
        return vk::FALSE;
    }
    let msg = unsafe { CStr::from_ptr((*data).p_message) }.to_string_lossy();
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        error!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        warn!(target: "vulkan", "{msg}");
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        debug!(target: "vulkan", "{msg}");
    } else {
        trace!(target: "vulkan", "{msg}");
    }
    vk::FALSE
}

fn debug_messenger_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT {
        s_type: vk::StructureType::DEBUG_UTILS_MESSENGER_CREATE_INFO_EXT,
        message_severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
            | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
            | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
            | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
            | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        pfn_user_callback: Some(debug_callback),
        ..Default::default()
    }
}

unsafe fn check_layer_support(entry: &Entry, cfg: &VkConfig) -> Result<()> {
    let available: Vec<CString> = entry
        .enumerate_instance_layer_properties()
        .context("enumerate_instance_layer_properties")?
        .iter()
        .filter_map(|l| l.layer_name_as_c_str().ok())
        .map(|name| name.to_owned())
        .collect();

    match first_missing(&cfg.validation_layers, &available) {
        Some(missing) => Err(SetupError::MissingLayer(missing.to_string_lossy().into_owned()).into()),
        None => Ok(()),
    }
}

fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<String> {
    props
        .iter()
        .filter_map(|p| p.extension_name_as_c_str().ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle, cfg: &VkConfig) -> Result<Instance> {
    if cfg.validation {
        check_layer_support(entry, cfg)?;
    }

    let available = entry
        .enumerate_instance_extension_properties(None)
        .context("enumerate_instance_extension_properties")?;
    debug!(count = available.len(), "available instance extensions");
    for name in extension_names(&available) {
        debug!("  {name}");
    }

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: cfg.app_name.as_ptr(),
        application_version: vk::make_api_version(0, 1, 0, 0),
        p_engine_name: c"No Engine".as_ptr(),
        engine_version: vk::make_api_version(0, 1, 0, 0),
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let mut ext_vec = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?
        .to_vec();
    if cfg.validation {
        ext_vec.push(debug_utils::NAME.as_ptr());
    }

    let layers: Vec<*const std::os::raw::c_char> =
        cfg.enabled_layers().iter().map(|l| l.as_ptr()).collect();

    // Chained so instance creation and destruction themselves are reported.
    let chained = debug_messenger_info();

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_next: if cfg.validation {
            (&chained as *const vk::DebugUtilsMessengerCreateInfoEXT) as *const c_void
        } else {
            std::ptr::null()
        },
        p_application_info: &app_info,
        enabled_extension_count: ext_vec.len() as u32,
        pp_enabled_extension_names: ext_vec.as_ptr(),
        enabled_layer_count: layers.len() as u32,
        pp_enabled_layer_names: layers.as_ptr(),
        ..Default::default()
    };

    entry
        .create_instance(&create_info, None)
        .context("failed to create instance")
}

impl InstanceContext {
    /// Loads Vulkan, creates the instance (with validation when configured) and
    /// the window surface.
    pub unsafe fn new(window: &dyn SurfaceProvider, cfg: &VkConfig) -> Result<Self> {
        // ORDER: instance, then messenger, then the surface the device search
        // will test presentation against.
        let dh = window
            .display_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();
        let wh = window
            .window_handle()
            .map_err(|e| anyhow!("{e}"))?
            .as_raw();

        let entry = Entry::load().context("failed to load the Vulkan loader")?;
        let instance = create_instance(&entry, dh, cfg)?;

        let debug = if cfg.validation {
            let loader = debug_utils::Instance::new(&entry, &instance);
            let messenger = loader
                .create_debug_utils_messenger(&debug_messenger_info(), None)
                .context("failed to set up messenger")?;
            Some((loader, messenger))
        } else {
            None
        };

        let surface_loader = surface::Instance::new(&entry, &instance);
        let surface = ash_window::create_surface(&entry, &instance, dh, wh, None)
            .context("failed to create window surface")?;

        info!(validation = cfg.validation, "Vulkan instance ready");

        Ok(InstanceContext {
            entry,
            instance,
            debug,
            surface_loader,
            surface,
        })
    }

    pub(crate) unsafe fn destroy_surface(&self) {
        self.surface_loader.destroy_surface(self.surface, None);
    }

    pub(crate) unsafe fn destroy_debug_messenger(&mut self) {
        if let Some((loader, messenger)) = self.debug.take() {
            loader.destroy_debug_utils_messenger(messenger, None);
        }
    }

    pub(crate) unsafe fn destroy_instance(&self) {
        self.instance.destroy_instance(None);
    }
}

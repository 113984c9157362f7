// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
pub use winit;

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowAttributes};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl From<PhysicalSize<u32>> for RenderSize {
    fn from(size: PhysicalSize<u32>) -> Self {
        RenderSize {
            width: size.width,
            height: size.height,
        }
    }
}

/// What the renderer needs from the window it presents to: native handles for
/// surface creation and the current framebuffer size in pixels.
pub trait SurfaceProvider: HasWindowHandle + HasDisplayHandle {
    fn framebuffer_size(&self) -> RenderSize;
}

impl SurfaceProvider for Window {
    fn framebuffer_size(&self) -> RenderSize {
        self.inner_size().into()
    }
}

/// Fixed-size window description. The renderer never recreates its swapchain,
/// so windows built from a `WindowSpec` are not resizable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        WindowSpec {
            title: "Vulkan".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

impl WindowSpec {
    pub fn size(&self) -> RenderSize {
        RenderSize {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }

    pub fn attributes(&self) -> WindowAttributes {
        let size = self.size();
        Window::default_attributes()
            .with_title(self.title.clone())
            .with_inner_size(PhysicalSize::new(size.width, size.height))
            .with_resizable(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_window_is_800_by_600() {
        let spec = WindowSpec::default();
        assert_eq!(
            spec.size(),
            RenderSize {
                width: 800,
                height: 600
            }
        );
        assert_eq!(spec.title, "Vulkan");
    }

    #[test]
    fn zero_dimensions_are_bumped_to_one() {
        let spec = WindowSpec {
            title: "t".into(),
            width: 0,
            height: 0,
        };
        assert_eq!(
            spec.size(),
            RenderSize {
                width: 1,
                height: 1
            }
        );
    }

    #[test]
    fn attributes_are_fixed_size() {
        let attrs = WindowSpec::default().attributes();
        assert!(!attrs.resizable);
        assert_eq!(attrs.title, "Vulkan");
    }

    #[test]
    fn physical_size_converts() {
        let size: RenderSize = PhysicalSize::new(1024u32, 768u32).into();
        assert_eq!(size.width, 1024);
        assert_eq!(size.height, 768);
    }
}

//! Runtime discovery of the graphics API.
//!
//! A pipeline is only supported when the system graphics loader can be opened
//! and the kernel reports the features it needs. Loading is attempted once per
//! loader and the outcome is cached.

#[cfg(feature = "vulkan")]
pub use vulkan::{VulkanLoader, VulkanProbe};

pub trait DynamicLoader: Send + Sync {
    /// Opens the graphics runtime. Cheap after the first call.
    fn load(&self) -> bool;
}

/// Loader with a fixed answer, for hosts that link the runtime statically or
/// know up front that it is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticLoader(pub bool);

impl DynamicLoader for StaticLoader {
    fn load(&self) -> bool {
        self.0
    }
}

#[cfg(feature = "vulkan")]
mod vulkan {
    use std::ffi::CStr;
    use std::sync::OnceLock;

    use ash::vk;
    use tracing::{debug, warn};

    use super::DynamicLoader;
    use crate::error::LoaderError;

    const DEFAULT_EXTENSIONS: &[&str] = &["VK_KHR_surface"];

    /// What the system Vulkan loader reported.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct VulkanProbe {
        pub api_version: u32,
        pub extensions: Vec<String>,
    }

    impl VulkanProbe {
        pub fn version_string(&self) -> String {
            format!(
                "{}.{}.{}",
                vk::api_version_major(self.api_version),
                vk::api_version_minor(self.api_version),
                vk::api_version_patch(self.api_version),
            )
        }
    }

    /// Opens `libvulkan` at runtime and checks for the instance extensions a
    /// presenting kernel needs.
    #[derive(Debug)]
    pub struct VulkanLoader {
        required_extensions: Vec<String>,
        probe: OnceLock<Result<VulkanProbe, LoaderError>>,
    }

    impl Default for VulkanLoader {
        fn default() -> Self {
            Self::new()
        }
    }

    impl VulkanLoader {
        pub fn new() -> Self {
            Self::with_required_extensions(DEFAULT_EXTENSIONS.iter().map(|name| name.to_string()))
        }

        pub fn with_required_extensions(extensions: impl IntoIterator<Item = String>) -> Self {
            Self {
                required_extensions: extensions.into_iter().collect(),
                probe: OnceLock::new(),
            }
        }

        pub fn probe(&self) -> &Result<VulkanProbe, LoaderError> {
            self.probe
                .get_or_init(|| probe_loader(&self.required_extensions))
        }

        /// One line summary suitable for logs and `inspect` output.
        pub fn describe(&self) -> String {
            match self.probe() {
                Ok(probe) => format!(
                    "vulkan {} ({} instance extensions)",
                    probe.version_string(),
                    probe.extensions.len()
                ),
                Err(err) => format!("vulkan unavailable: {err}"),
            }
        }
    }

    impl DynamicLoader for VulkanLoader {
        fn load(&self) -> bool {
            self.probe().is_ok()
        }
    }

    fn probe_loader(required: &[String]) -> Result<VulkanProbe, LoaderError> {
        let entry = unsafe {
            // SAFETY: The entry is only used inside this function and every
            // call below completes before it is dropped.
            ash::Entry::load()
        }
        .map_err(|err| LoaderError::Unavailable(err.to_string()))?;

        let api_version = unsafe {
            // SAFETY: Entry is valid, this only queries the loader version.
            entry.try_enumerate_instance_version()
        }
        .map_err(|err| LoaderError::Query(err.to_string()))?
        .unwrap_or(vk::API_VERSION_1_0);

        let properties = unsafe {
            // SAFETY: Entry is valid, this enumerates available instance extensions.
            entry.enumerate_instance_extension_properties(None)
        }
        .map_err(|err| LoaderError::Query(err.to_string()))?;

        let extensions: Vec<String> = properties
            .iter()
            .map(|ext| {
                let name = unsafe {
                    // SAFETY: ExtensionProperties.extension_name is a null-terminated
                    // C string filled by the Vulkan loader.
                    CStr::from_ptr(ext.extension_name.as_ptr())
                };
                name.to_string_lossy().into_owned()
            })
            .collect();

        if let Some(missing) = required
            .iter()
            .find(|name| !extensions.iter().any(|ext| ext == *name))
        {
            warn!(extension = %missing, "vulkan loader lacks required extension");
            return Err(LoaderError::MissingExtension(missing.clone()));
        }

        let probe = VulkanProbe {
            api_version,
            extensions,
        };
        debug!(
            version = %probe.version_string(),
            extensions = probe.extensions.len(),
            "vulkan loader opened"
        );
        Ok(probe)
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_loader_reports_its_answer() {
        assert!(StaticLoader(true).load());
        assert!(!StaticLoader(false).load());
    }
}

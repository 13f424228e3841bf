// Vulkan Device - Core GPU interface
//
// Responsibilities:
// - Instance creation with validation layers
// - Window surface creation
// - Physical device selection (prefer discrete GPU)
// - Logical device + graphics/present queue creation
// - Command pool shared by all command buffers

use ash::{vk, Entry};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use std::ffi::{c_char, CStr, CString};
use std::sync::Arc;

use super::command::DeviceRecorder;
use crate::error::{RenderError, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Queue families used by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

/// What a surface supports for swap chain creation
pub struct SwapChainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Device-level handles created after the surface
struct DeviceParts {
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
    device: ash::Device,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    command_pool: vk::CommandPool,
}

/// Vulkan device wrapper with automatic cleanup
pub struct VulkanDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub instance: ash::Instance,
    _entry: Entry,

    // Queue handles
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub queue_families: QueueFamilyIndices,

    pub command_pool: vk::CommandPool,

    surface: vk::SurfaceKHR,
    surface_loader: ash::khr::surface::Instance,
    swapchain_loader: ash::khr::swapchain::Device,

    // Debug utils (if validation enabled)
    debug_utils: Option<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,

    // Device properties (cached)
    pub properties: vk::PhysicalDeviceProperties,
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    /// Create Vulkan device presenting to `window`
    ///
    /// # Arguments
    /// * `window` - Anything exposing raw window and display handles
    /// * `enable_validation` - Enable Vulkan validation layers when available
    pub fn new<W>(window: &W, app_name: &str, enable_validation: bool) -> Result<Arc<Self>>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        log::info!("Creating Vulkan device: {}", app_name);

        let display_handle = window
            .display_handle()
            .map_err(|e| RenderError::Window(e.to_string()))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| RenderError::Window(e.to_string()))?
            .as_raw();

        // Step 1: Load Vulkan library
        let entry = unsafe { Entry::load() }?;

        // Step 2: Create instance
        let enable_validation = enable_validation && Self::validation_layer_available(&entry)?;
        let surface_extensions = ash_window::enumerate_required_extensions(display_handle)?;
        let instance =
            Self::create_instance(&entry, app_name, surface_extensions, enable_validation)?;

        // Step 3: Setup debug messenger if validation enabled
        let debug_utils = if enable_validation {
            match Self::setup_debug_messenger(&entry, &instance) {
                Ok(debug) => Some(debug),
                Err(e) => {
                    unsafe { Self::destroy_instance_objects(&instance, None, None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        // Step 4: Create surface
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);
        let surface = match unsafe {
            ash_window::create_surface(&entry, &instance, display_handle, window_handle, None)
        } {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { Self::destroy_instance_objects(&instance, debug_utils.as_ref(), None) };
                return Err(e.into());
            }
        };

        // Steps 5-7: GPU, logical device, command pool
        let parts = match Self::create_device_parts(&instance, &surface_loader, surface) {
            Ok(parts) => parts,
            Err(e) => {
                unsafe {
                    Self::destroy_instance_objects(
                        &instance,
                        debug_utils.as_ref(),
                        Some((&surface_loader, surface)),
                    )
                };
                return Err(e);
            }
        };
        let DeviceParts {
            physical_device,
            queue_families,
            device,
            graphics_queue,
            present_queue,
            command_pool,
        } = parts;

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);

        // Step 8: Cache device properties
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };

        log::info!(
            "Selected GPU: {}",
            properties
                .device_name_as_c_str()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default()
        );
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(properties.api_version),
            vk::api_version_minor(properties.api_version),
            vk::api_version_patch(properties.api_version)
        );

        Ok(Arc::new(Self {
            device,
            physical_device,
            instance,
            _entry: entry,
            graphics_queue,
            present_queue,
            queue_families,
            command_pool,
            surface,
            surface_loader,
            swapchain_loader,
            debug_utils,
            properties,
            memory_properties,
        }))
    }

    fn create_device_parts(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<DeviceParts> {
        // Step 5: Pick physical device (GPU)
        let (physical_device, queue_families) =
            Self::pick_physical_device(instance, surface_loader, surface)?;

        // Step 6: Create logical device
        let (device, graphics_queue, present_queue) =
            Self::create_logical_device(instance, physical_device, queue_families)?;

        // Step 7: Command pool
        let pool_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_families.graphics)
            // TRANSIENT: Command buffers are re-recorded every frame
            // RESET: Allow individual buffer reset
            .flags(
                vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
            );
        let command_pool = match unsafe { device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(e) => {
                unsafe { device.destroy_device(None) };
                return Err(e.into());
            }
        };

        Ok(DeviceParts {
            physical_device,
            queue_families,
            device,
            graphics_queue,
            present_queue,
            command_pool,
        })
    }

    /// Releases instance-level objects when construction fails before the
    /// device exists to own them.
    unsafe fn destroy_instance_objects(
        instance: &ash::Instance,
        debug_utils: Option<&(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
        surface: Option<(&ash::khr::surface::Instance, vk::SurfaceKHR)>,
    ) {
        if let Some((surface_loader, surface)) = surface {
            surface_loader.destroy_surface(surface, None);
        }
        if let Some((debug_utils, messenger)) = debug_utils {
            debug_utils.destroy_debug_utils_messenger(*messenger, None);
        }
        instance.destroy_instance(None);
    }

    fn validation_layer_available(entry: &Entry) -> Result<bool> {
        let layers = unsafe { entry.enumerate_instance_layer_properties() }?;
        let available = layers
            .iter()
            .any(|layer| layer.layer_name_as_c_str() == Ok(VALIDATION_LAYER));

        if !available {
            log::warn!("Validation layers requested, but not available");
        }
        Ok(available)
    }

    fn create_instance(
        entry: &Entry,
        app_name: &str,
        surface_extensions: &[*const c_char],
        enable_validation: bool,
    ) -> Result<ash::Instance> {
        let app_name_cstr = CString::new(app_name).unwrap_or_else(|_| c"Little Renderer".into());

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(c"No Engine")
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        // Required extensions
        let mut extensions = surface_extensions.to_vec();
        if enable_validation {
            extensions.push(ash::ext::debug_utils::NAME.as_ptr());
        }

        // Validation layers
        let layer_names = if enable_validation {
            vec![VALIDATION_LAYER.as_ptr()]
        } else {
            vec![]
        };

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_names);

        let instance = unsafe { entry.create_instance(&create_info, None) }?;
        Ok(instance)
    }

    fn setup_debug_messenger(
        entry: &Entry,
        instance: &ash::Instance,
    ) -> Result<(ash::ext::debug_utils::Instance, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }?;

        Ok((debug_utils, messenger))
    }

    fn pick_physical_device(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> Result<(vk::PhysicalDevice, QueueFamilyIndices)> {
        let devices = unsafe { instance.enumerate_physical_devices() }?;
        log::info!("Device count: {}", devices.len());

        // Score each suitable device
        let mut best_device = None;
        let mut best_score = 0;

        for device in devices {
            let Some(families) =
                Self::find_queue_families(instance, surface_loader, surface, device)?
            else {
                continue;
            };

            if !Self::supports_swapchain_extension(instance, device)? {
                continue;
            }

            let support = Self::query_support(surface_loader, surface, device)?;
            if support.formats.is_empty() || support.present_modes.is_empty() {
                continue;
            }

            let props = unsafe { instance.get_physical_device_properties(device) };
            // Prefer discrete GPU
            let score = match props.device_type {
                vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
                vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
                _ => 1,
            };

            if score > best_score {
                best_score = score;
                best_device = Some((device, families));
            }
        }

        best_device.ok_or(RenderError::NoSuitableGpu)
    }

    fn find_queue_families(
        instance: &ash::Instance,
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Result<Option<QueueFamilyIndices>> {
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let mut graphics = None;
        let mut present = None;
        for (index, family) in families.iter().enumerate() {
            let index = index as u32;
            if family.queue_count == 0 {
                continue;
            }
            if graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                graphics = Some(index);
            }
            let supports_present = unsafe {
                surface_loader.get_physical_device_surface_support(device, index, surface)
            }?;
            if present.is_none() && supports_present {
                present = Some(index);
            }
        }

        Ok(graphics
            .zip(present)
            .map(|(graphics, present)| QueueFamilyIndices { graphics, present }))
    }

    fn supports_swapchain_extension(
        instance: &ash::Instance,
        device: vk::PhysicalDevice,
    ) -> Result<bool> {
        let extensions = unsafe { instance.enumerate_device_extension_properties(device) }?;
        Ok(extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str() == Ok(ash::khr::swapchain::NAME)))
    }

    fn query_support(
        surface_loader: &ash::khr::surface::Instance,
        surface: vk::SurfaceKHR,
        device: vk::PhysicalDevice,
    ) -> Result<SwapChainSupport> {
        unsafe {
            Ok(SwapChainSupport {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(device, surface)?,
                formats: surface_loader.get_physical_device_surface_formats(device, surface)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(device, surface)?,
            })
        }
    }

    fn create_logical_device(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        families: QueueFamilyIndices,
    ) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
        let queue_priorities = [1.0];
        let mut unique_families = vec![families.graphics];
        if families.present != families.graphics {
            unique_families.push(families.present);
        }

        let queue_create_infos: Vec<_> = unique_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
            })
            .collect();

        // Required device extensions
        let extensions = [ash::khr::swapchain::NAME.as_ptr()];
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical_device, &create_info, None) }?;

        let graphics_queue = unsafe { device.get_device_queue(families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(families.present, 0) };

        Ok((device, graphics_queue, present_queue))
    }

    /// Current surface capabilities, formats and present modes
    pub fn swap_chain_support(&self) -> Result<SwapChainSupport> {
        Self::query_support(&self.surface_loader, self.surface, self.physical_device)
    }

    /// First of `candidates` supporting `features` with the given tiling
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().copied().find(|&format| {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, format)
            };
            match tiling {
                vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                _ => false,
            }
        })
    }

    /// Find a memory type index matching `type_filter` with `properties`
    pub fn find_memory_type(
        &self,
        type_filter: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        (0..self.memory_properties.memory_type_count)
            .find(|&i| {
                let has_type = (type_filter & (1 << i)) != 0;
                let has_properties = self.memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(properties);
                has_type && has_properties
            })
            .ok_or(RenderError::NoSuitableMemoryType)
    }

    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Record draw commands into `command_buffer`
    pub fn recorder(&self, command_buffer: vk::CommandBuffer) -> DeviceRecorder<'_> {
        DeviceRecorder::new(&self.device, command_buffer)
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.map_err(RenderError::from)
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");

        // Wait for device to finish
        let _ = self.wait_idle();

        // Cleanup in reverse order
        unsafe {
            self.device.destroy_command_pool(self.command_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);

            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }

            self.instance.destroy_instance(None);
        }
    }
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}

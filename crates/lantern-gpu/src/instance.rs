//! Vulkan instance creation.

use crate::config::VALIDATION_LAYER;
use crate::error::{GpuError, Result};
use ash::vk;
use std::ffi::{c_void, CStr, CString};

/// Instance extensions for a window's display, plus debug utils when
/// validation is enabled. Duplicates are dropped, order is preserved.
pub fn instance_extensions(
    window_extensions: &[&'static CStr],
    enable_validation: bool,
) -> Vec<&'static CStr> {
    let mut extensions: Vec<&'static CStr> = Vec::with_capacity(window_extensions.len() + 2);

    let extra = [
        enable_validation.then_some(ash::ext::debug_utils::NAME),
        #[cfg(target_os = "macos")]
        Some(ash::khr::portability_enumeration::NAME),
    ];

    for name in window_extensions.iter().copied().chain(extra.into_iter().flatten()) {
        if !extensions.contains(&name) {
            extensions.push(name);
        }
    }

    extensions
}

/// Fail unless the loader reports the validation layer.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn check_validation_layer(entry: &ash::Entry) -> Result<()> {
    // SAFETY: caller guarantees the entry is valid
    let available = unsafe { entry.enumerate_instance_layer_properties() }?;

    let found = available
        .iter()
        .any(|props| props.layer_name_as_c_str().is_ok_and(|name| name == VALIDATION_LAYER));

    if found {
        Ok(())
    } else {
        Err(GpuError::ValidationLayerUnavailable(
            VALIDATION_LAYER.to_string_lossy().into_owned(),
        ))
    }
}

/// Log every instance extension the loader offers.
unsafe fn log_available_extensions(entry: &ash::Entry) {
    // SAFETY: caller guarantees the entry is valid
    match unsafe { entry.enumerate_instance_extension_properties(None) } {
        Ok(extensions) => {
            tracing::debug!("{} instance extensions available:", extensions.len());
            for ext in &extensions {
                if let Ok(name) = ext.extension_name_as_c_str() {
                    tracing::debug!("  {}", name.to_string_lossy());
                }
            }
        }
        Err(e) => tracing::debug!("Could not enumerate instance extensions: {e}"),
    }
}

/// Create a Vulkan instance.
///
/// # Safety
/// The entry must be a valid Vulkan entry point.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    window_extensions: &[&'static CStr],
    enable_validation: bool,
) -> Result<ash::Instance> {
    let app_name = CString::new(app_name)
        .map_err(|_| GpuError::InvalidState("application name contains a nul byte".to_string()))?;

    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(vk::make_api_version(0, 1, 0, 0))
        .engine_name(c"Lantern")
        .engine_version(vk::make_api_version(0, 1, 0, 0))
        .api_version(vk::API_VERSION_1_0);

    // SAFETY: caller guarantees the entry is valid
    unsafe { log_available_extensions(entry) };

    if enable_validation {
        // SAFETY: caller guarantees the entry is valid
        unsafe { check_validation_layer(entry) }?;
    }

    let extension_names: Vec<*const std::ffi::c_char> =
        instance_extensions(window_extensions, enable_validation)
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

    let layer_names: Vec<*const std::ffi::c_char> = if enable_validation {
        vec![VALIDATION_LAYER.as_ptr()]
    } else {
        vec![]
    };

    // Required for MoltenVK on macOS
    #[cfg(target_os = "macos")]
    let create_flags = vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
    #[cfg(not(target_os = "macos"))]
    let create_flags = vk::InstanceCreateFlags::empty();

    // Covers vkCreateInstance and vkDestroyInstance, which run without the
    // installed messenger
    let mut debug_info = debug_messenger_create_info();

    let mut create_info = vk::InstanceCreateInfo::default()
        .application_info(&app_info)
        .enabled_extension_names(&extension_names)
        .enabled_layer_names(&layer_names)
        .flags(create_flags);
    if enable_validation {
        create_info = create_info.push_next(&mut debug_info);
    }

    // SAFETY: every pointer in create_info outlives this call
    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(GpuError::InstanceCreation)?;

    tracing::debug!(
        "Instance created ({} extensions, validation {})",
        extension_names.len(),
        if enable_validation { "on" } else { "off" }
    );

    Ok(instance)
}

/// Messenger settings shared by the installed messenger and the one
/// chained into instance creation.
pub fn debug_messenger_create_info() -> vk::DebugUtilsMessengerCreateInfoEXT<'static> {
    vk::DebugUtilsMessengerCreateInfoEXT::default()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(vulkan_debug_callback))
}

/// A debug-utils messenger forwarding validation output to `tracing`.
pub struct DebugMessenger {
    loader: ash::ext::debug_utils::Instance,
    messenger: vk::DebugUtilsMessengerEXT,
}

impl DebugMessenger {
    /// Install the messenger.
    ///
    /// # Safety
    /// The instance must have been created with `VK_EXT_debug_utils` and
    /// must outlive the messenger.
    pub unsafe fn new(entry: &ash::Entry, instance: &ash::Instance) -> Result<Self> {
        let loader = ash::ext::debug_utils::Instance::new(entry, instance);

        let create_info = debug_messenger_create_info();

        // SAFETY: caller guarantees the extension is enabled
        let messenger = unsafe { loader.create_debug_utils_messenger(&create_info, None) }?;

        Ok(Self { loader, messenger })
    }

    /// Destroy the messenger.
    ///
    /// # Safety
    /// Must be called once, before the instance is destroyed.
    pub unsafe fn destroy(&self) {
        // SAFETY: forwarded to the caller
        unsafe {
            self.loader
                .destroy_debug_utils_messenger(self.messenger, None);
        }
    }
}

/// Tracing level for a validation message severity.
fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> tracing::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        tracing::Level::ERROR
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        tracing::Level::WARN
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        tracing::Level::INFO
    } else {
        tracing::Level::DEBUG
    }
}

fn message_type_label(message_type: vk::DebugUtilsMessageTypeFlagsEXT) -> &'static str {
    match message_type {
        vk::DebugUtilsMessageTypeFlagsEXT::GENERAL => "general",
        vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION => "validation",
        vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE => "performance",
        _ => "other",
    }
}

unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() {
        return vk::FALSE;
    }

    // SAFETY: the loader passes valid callback data for the duration of the call
    let p_message = unsafe { (*p_callback_data).p_message };
    let message = if p_message.is_null() {
        std::borrow::Cow::Borrowed("")
    } else {
        // SAFETY: non-null messages are nul-terminated strings
        unsafe { CStr::from_ptr(p_message) }.to_string_lossy()
    };
    let kind = message_type_label(message_type);

    match severity_level(message_severity) {
        tracing::Level::ERROR => tracing::error!(target: "lantern::vulkan", "[{kind}] {message}"),
        tracing::Level::WARN => tracing::warn!(target: "lantern::vulkan", "[{kind}] {message}"),
        tracing::Level::INFO => tracing::info!(target: "lantern::vulkan", "[{kind}] {message}"),
        _ => tracing::debug!(target: "lantern::vulkan", "[{kind}] {message}"),
    }

    vk::FALSE
}

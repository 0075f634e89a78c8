// ── Interop context ───────────────────────────────────────────────────────────
//
// Bundles what every subclass and host needs from the process: the OS call
// surface, the shutdown registry it reports to, the loaded settings, and the
// two private message ids (registered once, up front).

use std::sync::Arc;

use crate::{
    config::Settings,
    error::Result,
    platform::{
        messages::{DETACH_MESSAGE_NAME, MEMORY_USAGE_MESSAGE_NAME},
        WindowApi,
    },
    registry::ShutdownRegistry,
};

/// Cheap-to-clone handle on the process's interop state.
#[derive(Clone)]
pub struct Interop {
    inner: Arc<InteropInner>,
}

struct InteropInner {
    registry: Arc<ShutdownRegistry>,
    settings: Settings,
    detach_message: u32,
    memory_usage_message: u32,
}

impl Interop {
    /// Build a context over `registry`'s window API.
    ///
    /// Fails if the private messages cannot be registered.
    pub fn new(registry: Arc<ShutdownRegistry>, settings: Settings) -> Result<Self> {
        let api = registry.api();
        let detach_message = api.register_message(DETACH_MESSAGE_NAME)?;
        let memory_usage_message = api.register_message(MEMORY_USAGE_MESSAGE_NAME)?;
        Ok(Self {
            inner: Arc::new(InteropInner {
                registry,
                settings,
                detach_message,
                memory_usage_message,
            }),
        })
    }

    /// The process-wide context backed by the real Win32 API.
    ///
    /// Created on first use with settings from [`config::load`](crate::config::load).
    #[cfg(windows)]
    pub fn global() -> Result<Self> {
        use std::sync::OnceLock;

        use crate::platform::win32::Win32Api;

        static GLOBAL: OnceLock<Interop> = OnceLock::new();

        if let Some(interop) = GLOBAL.get() {
            return Ok(interop.clone());
        }
        let registry = ShutdownRegistry::new(Arc::new(Win32Api::new()?));
        let interop = Self::new(registry, crate::config::load())?;
        Ok(GLOBAL.get_or_init(|| interop).clone())
    }

    pub fn api(&self) -> &dyn WindowApi {
        self.inner.registry.api()
    }

    pub fn registry(&self) -> &Arc<ShutdownRegistry> {
        &self.inner.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Id of the directed detach request message.
    pub fn detach_message(&self) -> u32 {
        self.inner.detach_message
    }

    /// Id of the host's memory-usage query message.
    pub fn memory_usage_message(&self) -> u32 {
        self.inner.memory_usage_message
    }
}

mod backend;
mod backends;
pub mod postprocess;
mod result;

use anyhow::Result;

pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, DetectParams, Detection};

use crate::config::{BackendKind, ModelSettings};
use crate::tools::ToolMapping;

/// Build the configured detector backend and run its warm-up hook.
pub fn load_backend(
    settings: &ModelSettings,
    tools: &ToolMapping,
) -> Result<Box<dyn DetectorBackend>> {
    let mut backend: Box<dyn DetectorBackend> = match settings.backend {
        BackendKind::Stub => match &settings.stub_script {
            Some(script) => Box::new(StubBackend::new(
                script.clone(),
                settings.class_names.clone(),
            )),
            None => Box::new(StubBackend::walkthrough(tools)),
        },
        BackendKind::Tract => load_tract(settings)?,
    };
    backend.warm_up()?;
    log::info!(
        "detector backend '{}' ready ({} classes)",
        backend.name(),
        backend.class_names().len()
    );
    Ok(backend)
}

#[cfg(feature = "backend-tract")]
fn load_tract(settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    Ok(Box::new(TractBackend::new(
        &settings.path,
        settings.input_size,
        settings.class_names.clone(),
    )?))
}

#[cfg(not(feature = "backend-tract"))]
fn load_tract(_settings: &ModelSettings) -> Result<Box<dyn DetectorBackend>> {
    Err(anyhow::anyhow!(
        "tract backend requires the backend-tract feature"
    ))
}

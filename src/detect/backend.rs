use anyhow::Result;

use super::result::{DetectParams, Detection};
use crate::frame::Frame;

/// Object detector backend.
///
/// Backends own their model for the lifetime of the process. `detect` takes
/// `&mut self` so stateful backends (scripted stubs, cached buffers) need no
/// interior mutability.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Class list the backend can emit, in model order.
    fn class_names(&self) -> &[String];

    /// Run detection on a frame.
    ///
    /// Implementations must apply `params.confidence` and, when set,
    /// `params.overlap` before returning.
    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess;
use crate::detect::result::{BoundingBox, DetectParams, Detection};
use crate::frame::Frame;

/// Tract-based backend for YOLO ONNX exports.
///
/// Expects a single output shaped `[1, 4 + classes, anchors]` where the first
/// four rows are center-x, center-y, width and height in input pixels and the
/// remaining rows are per-class scores. Frames are resized to the square model
/// input; boxes are scaled back to frame pixels.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
    class_names: Vec<String>,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        input_size: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        if class_names.is_empty() {
            return Err(anyhow!("tract backend needs at least one class name"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "tract backend loaded {} ({} classes, {}px input)",
            model_path.display(),
            class_names.len(),
            input_size
        );

        Ok(Self {
            model,
            input_size,
            class_names,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let image = frame.to_image()?;
        let resized = imageops::resize(&image, self.input_size, self.input_size, FilterType::Triangle);
        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, channel, y, x)| {
            resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: &Frame, threshold: f32) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output was not rank 3")?;
        let (_, rows, anchors) = view.dim();
        let classes = self.class_names.len();
        if rows != 4 + classes {
            return Err(anyhow!(
                "model output has {} rows, expected {} (4 box + {} classes)",
                rows,
                4 + classes,
                classes
            ));
        }

        let sx = frame.width as f32 / self.input_size as f32;
        let sy = frame.height as f32 / self.input_size as f32;
        let mut detections = Vec::new();
        for anchor in 0..anchors {
            let (best_class, best_score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, anchor]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
            if !best_score.is_finite() || best_score < threshold {
                continue;
            }
            let bbox = BoundingBox::from_center(
                view[[0, 0, anchor]],
                view[[0, 1, anchor]],
                view[[0, 2, anchor]],
                view[[0, 3, anchor]],
            )
            .scaled(sx, sy);
            detections.push(Detection::new(
                self.class_names[best_class].clone(),
                bbox,
                best_score,
            ));
        }
        Ok(detections)
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let raw = self.decode(outputs, frame, params.confidence)?;
        Ok(postprocess::apply(raw, params))
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let blank = Frame::new(vec![0u8; (side * side * 3) as usize], side, side, 0)?;
        self.detect(&blank, &DetectParams::default()).map(|_| ())
    }
}

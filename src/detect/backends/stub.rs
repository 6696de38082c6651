use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::postprocess;
use crate::detect::result::{BoundingBox, DetectParams, Detection};
use crate::frame::Frame;
use crate::tools::ToolMapping;

/// Confidence assigned to every scripted detection.
pub const STUB_CONFIDENCE: f32 = 0.9;

/// Stub backend for demos and tests.
///
/// Replays a fixed script of per-frame label lists, cycling when exhausted.
/// Each label becomes a box in its own vertical strip of the frame.
pub struct StubBackend {
    script: Vec<Vec<String>>,
    class_names: Vec<String>,
    cursor: usize,
}

impl StubBackend {
    pub fn new(script: Vec<Vec<String>>, class_names: Vec<String>) -> Self {
        Self {
            script,
            class_names,
            cursor: 0,
        }
    }

    /// Script that walks every tool out of its slot and back in, one at a time.
    pub fn walkthrough(mapping: &ToolMapping) -> Self {
        let all_in: Vec<String> = mapping
            .entries()
            .iter()
            .map(|e| e.in_label.clone())
            .collect();
        let mut script = vec![all_in.clone()];
        for (idx, entry) in mapping.entries().iter().enumerate() {
            let mut frame = all_in.clone();
            frame[idx] = entry.out_label.clone();
            script.push(frame);
        }
        script.push(Vec::new());
        Self::new(script, mapping.class_names())
    }

    fn next_labels(&mut self) -> Vec<String> {
        if self.script.is_empty() {
            return Vec::new();
        }
        let labels = self.script[self.cursor % self.script.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        labels
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn detect(&mut self, frame: &Frame, params: &DetectParams) -> Result<Vec<Detection>> {
        let labels = self.next_labels();
        let strips = labels.len().max(1) as f32;
        let strip_w = frame.width as f32 / strips;
        let detections = labels
            .into_iter()
            .enumerate()
            .map(|(i, label)| {
                let x1 = i as f32 * strip_w;
                let bbox = BoundingBox::new(x1, 0.0, x1 + strip_w - 1.0, frame.height as f32 - 1.0);
                Detection::new(label, bbox, STUB_CONFIDENCE)
            })
            .collect();
        Ok(postprocess::apply(detections, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{reconcile, DetectionSet, ToolStatus};

    fn frame() -> Frame {
        Frame::new(vec![0u8; 40 * 10 * 3], 40, 10, 1).unwrap()
    }

    #[test]
    fn stub_backend_cycles_script() -> Result<()> {
        let mut backend = StubBackend::new(
            vec![vec!["a".to_string()], vec!["b".to_string(), "c".to_string()]],
            vec!["a".into(), "b".into(), "c".into()],
        );
        let params = DetectParams::default();

        let first = backend.detect(&frame(), &params)?;
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].label, "a");

        let second = backend.detect(&frame(), &params)?;
        let labels: Vec<&str> = second.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["b", "c"]);

        let third = backend.detect(&frame(), &params)?;
        assert_eq!(third[0].label, "a");
        Ok(())
    }

    #[test]
    fn stub_backend_respects_confidence_threshold() -> Result<()> {
        let mut backend = StubBackend::new(vec![vec!["a".to_string()]], vec!["a".into()]);
        let params = DetectParams {
            confidence: 0.95,
            overlap: None,
        };
        assert!(backend.detect(&frame(), &params)?.is_empty());
        Ok(())
    }

    #[test]
    fn walkthrough_takes_each_tool_out_once() -> Result<()> {
        let mapping = ToolMapping::shadowbox_default();
        let mut backend = StubBackend::walkthrough(&mapping);
        let params = DetectParams::default();

        let all_in = backend.detect(&frame(), &params)?;
        let statuses = reconcile(&DetectionSet::from_detections(&all_in), &mapping);
        assert!(statuses.iter().all(|r| r.status == ToolStatus::In));

        let first_out = backend.detect(&frame(), &params)?;
        let statuses = reconcile(&DetectionSet::from_detections(&first_out), &mapping);
        assert_eq!(statuses[0].status, ToolStatus::Out);
        assert!(statuses[1..].iter().all(|r| r.status == ToolStatus::In));
        Ok(())
    }
}

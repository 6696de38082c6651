//! Tool presence tracking.
//!
//! A shadowbox holds a fixed set of physical tools. The detector is trained with
//! two labels per tool: one for the tool sitting in its slot ("in") and one for
//! the empty slot outline ("out"). This module turns a frame's detected labels
//! into one status per tool.
//!
//! - `ToolMapping`: ordered tool -> (in label, out label) table, fixed per session
//! - `DetectionSet`: labels seen in the current frame
//! - `reconcile`: pure per-frame status derivation
//! - `LabelSets`: precomputed in/out label membership for annotation colors

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use crate::detect::Detection;

pub const CHECKMARK: &str = "\u{2705}";
pub const CROSSMARK: &str = "\u{274c}";

/// One row of the tool table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolEntry {
    pub name: String,
    pub in_label: String,
    pub out_label: String,
}

impl ToolEntry {
    pub fn new(
        name: impl Into<String>,
        in_label: impl Into<String>,
        out_label: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            in_label: in_label.into(),
            out_label: out_label.into(),
        }
    }

    /// Entry using the `<name>_in` / `<name>_out` label convention.
    pub fn conventional(name: &str) -> Self {
        Self::new(name, format!("{name}_in"), format!("{name}_out"))
    }
}

/// Ordered, immutable mapping from tool name to its detector labels.
///
/// There is no way to mutate a mapping after construction; build a new one
/// to change the table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolMapping {
    entries: Vec<ToolEntry>,
}

impl ToolMapping {
    pub fn new(entries: Vec<ToolEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(anyhow!("tool mapping must contain at least one tool"));
        }
        let mut seen = HashSet::new();
        let mut labels = HashSet::new();
        for entry in &entries {
            if entry.name.trim().is_empty() {
                return Err(anyhow!("tool name must not be empty"));
            }
            if entry.in_label.trim().is_empty() || entry.out_label.trim().is_empty() {
                return Err(anyhow!("tool '{}' has an empty label", entry.name));
            }
            if entry.in_label == entry.out_label {
                return Err(anyhow!(
                    "tool '{}' uses '{}' as both in and out label",
                    entry.name,
                    entry.in_label
                ));
            }
            if !seen.insert(entry.name.as_str()) {
                return Err(anyhow!("duplicate tool name '{}'", entry.name));
            }
            for label in [&entry.in_label, &entry.out_label] {
                if !labels.insert(label.as_str()) {
                    log::warn!("label '{}' is shared by more than one tool", label);
                }
            }
        }
        Ok(Self { entries })
    }

    /// The four-slot shadowbox the detector was originally trained on.
    pub fn shadowbox_default() -> Self {
        Self {
            entries: ["cable_a", "battery", "cable_b", "gpu"]
                .into_iter()
                .map(ToolEntry::conventional)
                .collect(),
        }
    }

    pub fn entries(&self) -> &[ToolEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every label in the table, in/out interleaved in tool order.
    ///
    /// Used as the default class list when the model config names none.
    pub fn class_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .flat_map(|entry| [&entry.in_label, &entry.out_label])
            .filter(|label| seen.insert(label.as_str()))
            .cloned()
            .collect()
    }
}

/// Labels observed in a single frame. Duplicates collapse.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DetectionSet {
    labels: BTreeSet<String>,
}

impl DetectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_detections(detections: &[Detection]) -> Self {
        Self {
            labels: detections.iter().map(|d| d.label.clone()).collect(),
        }
    }

    pub fn insert(&mut self, label: impl Into<String>) {
        self.labels.insert(label.into());
    }

    pub fn contains(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for DetectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Per-frame presence status of a tool.
///
/// `Out` and `OutNotDetected` both mean the tool is not in its slot, but only
/// `Out` is backed by a positive detection of the empty slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolStatus {
    In,
    Out,
    OutNotDetected,
}

impl ToolStatus {
    pub fn is_present(self) -> bool {
        matches!(self, ToolStatus::In)
    }

    pub fn display_label(self) -> &'static str {
        match self {
            ToolStatus::In => "IN",
            ToolStatus::Out => "OUT",
            ToolStatus::OutNotDetected => "OUT (not detected)",
        }
    }

    pub fn marker(self) -> &'static str {
        if self.is_present() {
            CHECKMARK
        } else {
            CROSSMARK
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolReport {
    pub tool: String,
    pub status: ToolStatus,
}

impl ToolReport {
    /// Single display line, e.g. `✅ battery : IN`.
    pub fn display_line(&self) -> String {
        format!(
            "{} {} : {}",
            self.status.marker(),
            self.tool,
            self.status.display_label()
        )
    }
}

/// Derive one status per tool from the current frame's labels.
///
/// The in label wins when both labels of a tool are present.
pub fn reconcile(detected: &DetectionSet, mapping: &ToolMapping) -> Vec<ToolReport> {
    mapping
        .entries()
        .iter()
        .map(|entry| {
            let status = if detected.contains(&entry.in_label) {
                ToolStatus::In
            } else if detected.contains(&entry.out_label) {
                ToolStatus::Out
            } else {
                ToolStatus::OutNotDetected
            };
            ToolReport {
                tool: entry.name.clone(),
                status,
            }
        })
        .collect()
}

pub fn status_lines(reports: &[ToolReport]) -> Vec<String> {
    reports.iter().map(ToolReport::display_line).collect()
}

/// Annotation class of a raw detector label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelClass {
    In,
    Out,
    Unrecognized,
}

impl LabelClass {
    /// Box color as RGB.
    pub fn color(self) -> [u8; 3] {
        match self {
            LabelClass::In => [0, 255, 0],
            LabelClass::Out => [255, 0, 0],
            LabelClass::Unrecognized => [255, 255, 255],
        }
    }
}

/// In/out label membership, built once from a `ToolMapping`.
#[derive(Clone, Debug)]
pub struct LabelSets {
    in_labels: HashSet<String>,
    out_labels: HashSet<String>,
}

impl LabelSets {
    pub fn from_mapping(mapping: &ToolMapping) -> Self {
        Self {
            in_labels: mapping
                .entries()
                .iter()
                .map(|e| e.in_label.clone())
                .collect(),
            out_labels: mapping
                .entries()
                .iter()
                .map(|e| e.out_label.clone())
                .collect(),
        }
    }

    pub fn classify(&self, label: &str) -> LabelClass {
        if self.in_labels.contains(label) {
            LabelClass::In
        } else if self.out_labels.contains(label) {
            LabelClass::Out
        } else {
            LabelClass::Unrecognized
        }
    }
}

/// Mapping plus its derived label sets. Built once at startup.
#[derive(Clone, Debug)]
pub struct ToolTable {
    pub mapping: ToolMapping,
    pub labels: LabelSets,
}

impl ToolTable {
    pub fn new(mapping: ToolMapping) -> Self {
        let labels = LabelSets::from_mapping(&mapping);
        Self { mapping, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn battery_only() -> ToolMapping {
        ToolMapping::new(vec![ToolEntry::new("battery", "battery_in", "battery_out")]).unwrap()
    }

    #[test]
    fn in_label_reports_in() {
        let detected: DetectionSet = ["battery_in"].into_iter().collect();
        let reports = reconcile(&detected, &battery_only());
        assert_eq!(
            reports,
            vec![ToolReport {
                tool: "battery".to_string(),
                status: ToolStatus::In
            }]
        );
    }

    #[test]
    fn empty_frame_reports_not_detected() {
        let reports = reconcile(&DetectionSet::new(), &battery_only());
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].status, ToolStatus::OutNotDetected);
    }

    #[test]
    fn out_label_reports_out() {
        let detected: DetectionSet = ["battery_out"].into_iter().collect();
        let reports = reconcile(&detected, &battery_only());
        assert_eq!(reports[0].status, ToolStatus::Out);
    }

    #[test]
    fn in_label_wins_over_out_label() {
        let detected: DetectionSet = ["battery_out", "battery_in"].into_iter().collect();
        let reports = reconcile(&detected, &battery_only());
        assert_eq!(reports[0].status, ToolStatus::In);
    }

    #[test]
    fn one_status_per_tool_in_mapping_order() {
        let mapping = ToolMapping::shadowbox_default();
        let detected: DetectionSet = ["gpu_in", "cable_a_out", "unrelated", "gpu_in"]
            .into_iter()
            .collect();
        let reports = reconcile(&detected, &mapping);
        let summary: Vec<(&str, ToolStatus)> = reports
            .iter()
            .map(|r| (r.tool.as_str(), r.status))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("cable_a", ToolStatus::Out),
                ("battery", ToolStatus::OutNotDetected),
                ("cable_b", ToolStatus::OutNotDetected),
                ("gpu", ToolStatus::In),
            ]
        );
    }

    #[test]
    fn reconcile_has_no_hidden_state() {
        let mapping = ToolMapping::shadowbox_default();
        let detected: DetectionSet = ["battery_in", "cable_b_out"].into_iter().collect();
        let first = reconcile(&detected, &mapping);
        let _other = reconcile(&DetectionSet::new(), &mapping);
        let second = reconcile(&detected, &mapping);
        assert_eq!(first, second);
    }

    #[test]
    fn detection_set_collapses_duplicates() {
        let detected: DetectionSet = ["a", "b", "a", "a"].into_iter().collect();
        assert_eq!(detected.len(), 2);
        assert!(detected.contains("a"));
        assert!(!detected.contains("c"));
    }

    #[test]
    fn display_lines_keep_out_and_not_detected_apart() {
        let reports = vec![
            ToolReport {
                tool: "battery".into(),
                status: ToolStatus::In,
            },
            ToolReport {
                tool: "gpu".into(),
                status: ToolStatus::Out,
            },
            ToolReport {
                tool: "cable_a".into(),
                status: ToolStatus::OutNotDetected,
            },
        ];
        assert_eq!(
            status_lines(&reports),
            vec![
                "\u{2705} battery : IN".to_string(),
                "\u{274c} gpu : OUT".to_string(),
                "\u{274c} cable_a : OUT (not detected)".to_string(),
            ]
        );
    }

    #[test]
    fn label_classification_colors() {
        let sets = LabelSets::from_mapping(&ToolMapping::shadowbox_default());
        assert_eq!(sets.classify("battery_in"), LabelClass::In);
        assert_eq!(sets.classify("gpu_out"), LabelClass::Out);
        assert_eq!(sets.classify("person"), LabelClass::Unrecognized);
        assert_eq!(sets.classify(""), LabelClass::Unrecognized);
        assert_eq!(LabelClass::In.color(), [0, 255, 0]);
        assert_eq!(LabelClass::Out.color(), [255, 0, 0]);
        assert_eq!(LabelClass::Unrecognized.color(), [255, 255, 255]);
    }

    #[test]
    fn mapping_validation() {
        assert!(ToolMapping::new(vec![]).is_err());
        assert!(ToolMapping::new(vec![ToolEntry::new("x", "same", "same")]).is_err());
        assert!(ToolMapping::new(vec![ToolEntry::new("x", "", "x_out")]).is_err());
        assert!(ToolMapping::new(vec![
            ToolEntry::conventional("x"),
            ToolEntry::conventional("x"),
        ])
        .is_err());
        assert!(ToolMapping::new(vec![ToolEntry::conventional("x")]).is_ok());
    }

    #[test]
    fn shared_out_label_marks_every_tool_out() {
        let mapping = ToolMapping::new(vec![
            ToolEntry::new("battery", "battery_in", "empty_slot"),
            ToolEntry::new("gpu", "gpu_in", "empty_slot"),
        ])
        .unwrap();
        assert_eq!(
            mapping.class_names(),
            vec!["battery_in", "empty_slot", "gpu_in"]
        );

        let detected: DetectionSet = ["empty_slot"].into_iter().collect();
        let statuses: Vec<ToolStatus> = reconcile(&detected, &mapping)
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(statuses, vec![ToolStatus::Out, ToolStatus::Out]);

        let detected: DetectionSet = ["gpu_in", "empty_slot"].into_iter().collect();
        let statuses: Vec<ToolStatus> = reconcile(&detected, &mapping)
            .into_iter()
            .map(|r| r.status)
            .collect();
        assert_eq!(statuses, vec![ToolStatus::Out, ToolStatus::In]);
    }

    #[test]
    fn default_class_names_follow_tool_order() {
        let names = ToolMapping::shadowbox_default().class_names();
        assert_eq!(names.len(), 8);
        assert_eq!(names[0], "cable_a_in");
        assert_eq!(names[1], "cable_a_out");
        assert_eq!(names[7], "gpu_out");
    }
}

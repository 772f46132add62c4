//! Discrete trace styling

use std::collections::HashMap;

use lp_core::StyleOptions;

/// Default qualitative palette, cycled across traces in trace order.
pub const DEFAULT_COLORWAY: [&str; 10] = [
    "#636efa", "#EF553B", "#00cc96", "#ab63fa", "#FFA15A", "#19d3f3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

/// Assigns a discrete color to each trace: a fixed per-label map wins,
/// otherwise the sequence is cycled by trace position.
#[derive(Debug, Clone)]
pub struct StyleCycler {
    sequence: Vec<String>,
    map: HashMap<String, String>,
}

impl StyleCycler {
    pub fn new(style: &StyleOptions) -> Self {
        let sequence = match &style.color_sequence {
            Some(sequence) if !sequence.is_empty() => sequence.clone(),
            _ => DEFAULT_COLORWAY.iter().map(|c| (*c).to_owned()).collect(),
        };
        Self {
            sequence,
            map: style.color_map.clone(),
        }
    }

    /// Color for the trace at `position` labelled `label`.
    pub fn color_for(&self, position: usize, label: Option<&str>) -> String {
        if let Some(label) = label {
            if let Some(color) = self.map.get(label) {
                return color.clone();
            }
        }
        self.sequence[position % self.sequence.len()].clone()
    }
}

//! Viewport behaviour switches and node sizing rules.

use serde::Deserialize;

use super::line::Curve;

/// Inputs of the graph viewport. Every field has a default, so a partial
/// JSON object (or none at all) is a valid configuration.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GraphConfig {
	pub panning_enabled: bool,
	pub dragging_enabled: bool,
	pub hovering_enabled: bool,
	pub enable_zoom: bool,
	/// Fractional change per zoom step (0.1 = 10%).
	pub zoom_speed: f64,
	pub min_zoom_level: f64,
	pub max_zoom_level: f64,
	/// Fit the whole graph into the viewport after every layout frame.
	pub auto_zoom: bool,
	/// Re-centre the graph after every layout frame.
	pub auto_center: bool,
	/// Keep the point under the cursor fixed while zooming.
	pub pan_on_zoom: bool,
	/// Re-run the layout without collapsed elements after a collapse toggle.
	pub compute_positions_after_collapse: bool,
	/// Fixed node width; otherwise measured from the label.
	pub node_width: Option<f64>,
	pub node_min_width: Option<f64>,
	pub node_max_width: Option<f64>,
	/// Fixed node height; otherwise measured.
	pub node_height: Option<f64>,
	pub node_min_height: Option<f64>,
	pub node_max_height: Option<f64>,
	pub curve: Curve,
	/// Colour theme by name (`light` or `dark`); overrides the canvas default.
	pub theme: Option<String>,
}

impl Default for GraphConfig {
	fn default() -> Self {
		Self {
			panning_enabled: true,
			dragging_enabled: true,
			hovering_enabled: true,
			enable_zoom: true,
			zoom_speed: 0.1,
			min_zoom_level: 0.1,
			max_zoom_level: 4.0,
			auto_zoom: false,
			auto_center: false,
			pan_on_zoom: true,
			compute_positions_after_collapse: true,
			node_width: None,
			node_min_width: None,
			node_max_width: None,
			node_height: None,
			node_min_height: None,
			node_max_height: None,
			curve: Curve::Linear,
			theme: None,
		}
	}
}

impl GraphConfig {
	/// Settings used by the statement display.
	pub fn statement_display() -> Self {
		Self {
			curve: Curve::MonotoneY,
			..Self::default()
		}
	}

	pub(crate) fn clamp_width(&self, width: f64) -> f64 {
		clamp_optional(width, self.node_min_width, self.node_max_width)
	}

	pub(crate) fn clamp_height(&self, height: f64) -> f64 {
		clamp_optional(height, self.node_min_height, self.node_max_height)
	}
}

fn clamp_optional(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
	let capped = max.map_or(value, |max| value.min(max));
	min.map_or(capped, |min| capped.max(min))
}

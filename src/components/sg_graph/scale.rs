//! Zoom-dependent sizes for statement boxes, edge strokes and labels.
//!
//! The viewport draws in graph space after applying its [`Matrix`], so any
//! size that should stay readable on screen has to be divided by the zoom
//! level. Each visual property picks a [`ScaleBehavior`]:
//!
//! - [`ScaleBehavior::World`]: fixed in graph units, grows when zoomed in.
//! - [`ScaleBehavior::Screen`]: fixed in pixels whatever the zoom.
//! - [`ScaleBehavior::Clamped`]: graph units, bounded in pixels.
//!
//! [`Matrix`]: super::transform::Matrix

#[derive(Clone, Debug, PartialEq)]
pub enum ScaleBehavior {
	World,
	Screen,
	/// `min_screen`/`max_screen` may be infinite for a one-sided bound.
	Clamped { min_screen: f64, max_screen: f64 },
}

impl ScaleBehavior {
	/// Graph-space value for `base` at zoom level `k`.
	pub fn apply(&self, base: f64, k: f64) -> f64 {
		match self {
			ScaleBehavior::World => base,
			ScaleBehavior::Screen => base / k,
			ScaleBehavior::Clamped {
				min_screen,
				max_screen,
			} => base.clamp(min_screen / k, max_screen / k),
		}
	}
}

/// Opacity multiplier as a function of zoom: invisible at or below
/// `zero_alpha_k`, opaque at or above `full_alpha_k`.
#[derive(Clone, Debug, PartialEq)]
pub struct AlphaFade {
	pub zero_alpha_k: f64,
	pub full_alpha_k: f64,
}

impl AlphaFade {
	pub fn apply(&self, k: f64) -> f64 {
		if self.zero_alpha_k == self.full_alpha_k {
			return 1.0;
		}
		((k - self.zero_alpha_k) / (self.full_alpha_k - self.zero_alpha_k)).clamp(0.0, 1.0)
	}
}

#[derive(Clone, Debug)]
pub struct NodeScaleConfig {
	/// Corner radius of the statement box.
	pub corner_radius: f64,
	pub corner_behavior: ScaleBehavior,
	pub border_width: f64,
	pub border_behavior: ScaleBehavior,
	/// Label font size in graph units.
	pub label_size: f64,
	pub label_behavior: ScaleBehavior,
	/// Labels fade out when zoomed far out.
	pub label_alpha: AlphaFade,
}

#[derive(Clone, Debug)]
pub struct EdgeScaleConfig {
	pub line_width: f64,
	pub line_behavior: ScaleBehavior,
	pub label_size: f64,
	pub label_alpha: AlphaFade,
}

#[derive(Clone, Debug)]
pub struct ArrowScaleConfig {
	pub size: f64,
	pub size_behavior: ScaleBehavior,
}

#[derive(Clone, Debug)]
pub struct ScaleConfig {
	pub node: NodeScaleConfig,
	pub edge: EdgeScaleConfig,
	pub arrow: ArrowScaleConfig,
	/// Labels below this alpha are not drawn at all.
	pub cull_alpha: f64,
}

impl Default for ScaleConfig {
	fn default() -> Self {
		Self {
			node: NodeScaleConfig {
				corner_radius: 4.0,
				corner_behavior: ScaleBehavior::World,
				border_width: 1.5,
				border_behavior: ScaleBehavior::Screen,
				label_size: 12.0,
				label_behavior: ScaleBehavior::Clamped {
					min_screen: 6.0,
					max_screen: 28.0,
				},
				label_alpha: AlphaFade {
					zero_alpha_k: 0.2,
					full_alpha_k: 0.45,
				},
			},
			edge: EdgeScaleConfig {
				line_width: 1.5,
				line_behavior: ScaleBehavior::Clamped {
					min_screen: 1.0,
					max_screen: 4.0,
				},
				label_size: 10.0,
				label_alpha: AlphaFade {
					zero_alpha_k: 0.4,
					full_alpha_k: 0.8,
				},
			},
			arrow: ArrowScaleConfig {
				size: 8.0,
				size_behavior: ScaleBehavior::Clamped {
					min_screen: 4.0,
					max_screen: 16.0,
				},
			},
			cull_alpha: 0.05,
		}
	}
}

/// Sizes resolved for one zoom level; computed once per rendered frame.
#[derive(Clone, Debug)]
pub struct ScaledValues {
	pub k: f64,
	pub corner_radius: f64,
	pub border_width: f64,
	pub label_font: String,
	pub label_alpha: f64,
	pub edge_line_width: f64,
	pub edge_label_font: String,
	pub edge_label_alpha: f64,
	pub arrow_size: f64,
	pub cull_labels: bool,
	pub cull_edge_labels: bool,
}

impl ScaledValues {
	pub fn new(config: &ScaleConfig, k: f64) -> Self {
		let k = if k.is_finite() && k > 0.0 { k } else { 1.0 };
		let label_size = config.node.label_behavior.apply(config.node.label_size, k);
		let label_alpha = config.node.label_alpha.apply(k);
		let edge_label_alpha = config.edge.label_alpha.apply(k);

		Self {
			k,
			corner_radius: config
				.node
				.corner_behavior
				.apply(config.node.corner_radius, k),
			border_width: config
				.node
				.border_behavior
				.apply(config.node.border_width, k),
			label_font: format!("{label_size}px sans-serif"),
			label_alpha,
			edge_line_width: config.edge.line_behavior.apply(config.edge.line_width, k),
			edge_label_font: format!("{}px sans-serif", config.edge.label_size),
			edge_label_alpha,
			arrow_size: config.arrow.size_behavior.apply(config.arrow.size, k),
			cull_labels: label_alpha < config.cull_alpha,
			cull_edge_labels: edge_label_alpha < config.cull_alpha,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn behaviors_scale_against_zoom() {
		assert_eq!(ScaleBehavior::World.apply(10.0, 2.0), 10.0);
		assert_eq!(ScaleBehavior::Screen.apply(10.0, 2.0), 5.0);
		let clamped = ScaleBehavior::Clamped {
			min_screen: 4.0,
			max_screen: 16.0,
		};
		// 8 graph units at k=4 would be 32px on screen
		assert_eq!(clamped.apply(8.0, 4.0), 4.0);
		// and 0.8px at k=0.1
		assert_eq!(clamped.apply(8.0, 0.1), 40.0);
		assert_eq!(clamped.apply(8.0, 1.0), 8.0);
	}

	#[test]
	fn labels_fade_and_cull_when_zoomed_out() {
		let config = ScaleConfig::default();
		let near = ScaledValues::new(&config, 1.0);
		assert_eq!(near.label_alpha, 1.0);
		assert!(!near.cull_labels);

		let far = ScaledValues::new(&config, 0.1);
		assert_eq!(far.label_alpha, 0.0);
		assert!(far.cull_labels);
		assert!(far.cull_edge_labels);
	}

	#[test]
	fn degenerate_zoom_falls_back_to_identity() {
		let scaled = ScaledValues::new(&ScaleConfig::default(), 0.0);
		assert_eq!(scaled.k, 1.0);
		assert!(scaled.edge_line_width.is_finite());
	}
}

//! Colours for the statement graph.
//!
//! Statements and edges are coloured by their `type` data field. Types the
//! theme has no explicit colour for get a stable palette entry derived from
//! the type name, so the same type keeps its colour across snapshots.

use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
	pub r: u8,
	pub g: u8,
	pub b: u8,
	pub a: f64,
}

impl Color {
	pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
		Self { r, g, b, a: 1.0 }
	}

	pub const fn rgba(r: u8, g: u8, b: u8, a: f64) -> Self {
		Self { r, g, b, a }
	}

	/// 0.0 leaves the colour unchanged, 1.0 is white.
	pub fn lighten(self, factor: f64) -> Self {
		self.lerp(Color::rgba(255, 255, 255, self.a), factor)
	}

	/// 0.0 leaves the colour unchanged, 1.0 is black.
	pub fn darken(self, factor: f64) -> Self {
		self.lerp(Color::rgba(0, 0, 0, self.a), factor)
	}

	pub fn lerp(self, other: Color, t: f64) -> Self {
		let t = t.clamp(0.0, 1.0);
		let mix = |a: u8, b: u8| (a as f64 * (1.0 - t) + b as f64 * t).round() as u8;
		Self {
			r: mix(self.r, other.r),
			g: mix(self.g, other.g),
			b: mix(self.b, other.b),
			a: self.a * (1.0 - t) + other.a * t,
		}
	}

	pub fn to_css(self) -> String {
		if (self.a - 1.0).abs() < 0.001 {
			format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
		} else {
			format!("rgba({}, {}, {}, {})", self.r, self.g, self.b, self.a)
		}
	}
}

/// Fallback colours for statement types without an explicit entry.
#[derive(Clone, Debug)]
pub struct TypePalette {
	pub colors: Vec<Color>,
}

impl TypePalette {
	pub fn muted() -> Self {
		Self {
			colors: vec![
				Color::rgb(94, 129, 172),
				Color::rgb(100, 148, 160),
				Color::rgb(180, 136, 100),
				Color::rgb(136, 160, 175),
				Color::rgb(150, 120, 160),
				Color::rgb(119, 158, 120),
				Color::rgb(170, 110, 110),
				Color::rgb(160, 150, 100),
			],
		}
	}

	/// FNV-1a over the type name; stable across runs and builds.
	pub fn for_name(&self, name: &str) -> Color {
		if self.colors.is_empty() {
			return Color::rgb(128, 128, 128);
		}
		let hash = name.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
			(hash ^ byte as u64).wrapping_mul(0x0100_0000_01b3)
		});
		self.colors[(hash % self.colors.len() as u64) as usize]
	}
}

#[derive(Clone, Debug)]
pub struct BackgroundStyle {
	pub color: Color,
}

#[derive(Clone, Debug)]
pub struct NodeStyle {
	/// Fill for statements without a `type`.
	pub fill: Color,
	pub text: Color,
	/// How far the border is darkened from the fill.
	pub border_darken: f64,
	/// How far the hovered statement is lightened.
	pub hover_lighten: f64,
	/// Alpha for statements that are not on a path to the hovered one.
	pub dimmed_alpha: f64,
}

#[derive(Clone, Debug)]
pub struct EdgeStyle {
	/// Stroke for edges without a `type`.
	pub color: Color,
	pub label: Color,
	pub dimmed_alpha: f64,
}

#[derive(Clone, Debug)]
pub struct Theme {
	pub name: &'static str,
	pub background: BackgroundStyle,
	pub node: NodeStyle,
	pub edge: EdgeStyle,
	/// Explicit statement colours keyed by `type`.
	pub statement_types: BTreeMap<String, Color>,
	/// Explicit edge colours keyed by `type`.
	pub edge_types: BTreeMap<String, Color>,
	pub palette: TypePalette,
}

impl Theme {
	pub fn light() -> Self {
		Self {
			name: "light",
			background: BackgroundStyle {
				color: Color::rgb(250, 250, 250),
			},
			node: NodeStyle {
				fill: Color::rgb(94, 129, 172),
				text: Color::rgb(255, 255, 255),
				border_darken: 0.25,
				hover_lighten: 0.2,
				dimmed_alpha: 0.2,
			},
			edge: EdgeStyle {
				color: Color::rgb(110, 120, 135),
				label: Color::rgb(60, 64, 72),
				dimmed_alpha: 0.1,
			},
			statement_types: BTreeMap::from([
				("argument".to_string(), Color::rgb(94, 129, 172)),
				("query".to_string(), Color::rgb(119, 158, 120)),
			]),
			edge_types: BTreeMap::from([
				("attack".to_string(), Color::rgb(190, 80, 80)),
				("support".to_string(), Color::rgb(80, 150, 95)),
			]),
			palette: TypePalette::muted(),
		}
	}

	pub fn dark() -> Self {
		let light = Self::light();
		Self {
			name: "dark",
			background: BackgroundStyle {
				color: Color::rgb(25, 28, 35),
			},
			edge: EdgeStyle {
				color: Color::rgb(130, 145, 165),
				label: Color::rgb(200, 205, 215),
				dimmed_alpha: 0.1,
			},
			..light
		}
	}

	pub fn by_name(name: &str) -> Option<Self> {
		match name {
			"light" => Some(Self::light()),
			"dark" => Some(Self::dark()),
			_ => None,
		}
	}

	pub fn statement_color(&self, kind: Option<&str>) -> Color {
		match kind {
			Some(kind) => self
				.statement_types
				.get(kind)
				.copied()
				.unwrap_or_else(|| self.palette.for_name(kind)),
			None => self.node.fill,
		}
	}

	pub fn edge_color(&self, kind: Option<&str>) -> Color {
		kind.and_then(|kind| self.edge_types.get(kind))
			.copied()
			.unwrap_or(self.edge.color)
	}
}

impl Default for Theme {
	fn default() -> Self {
		Self::light()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn css_output() {
		assert_eq!(Color::rgb(255, 0, 16).to_css(), "#ff0010");
		assert_eq!(
			Color::rgba(1, 2, 3, 0.5).to_css(),
			"rgba(1, 2, 3, 0.5)"
		);
	}

	#[test]
	fn lighten_and_darken_reach_the_extremes() {
		let c = Color::rgb(100, 100, 100);
		assert_eq!(c.lighten(1.0), Color::rgb(255, 255, 255));
		assert_eq!(c.darken(1.0), Color::rgb(0, 0, 0));
		assert_eq!(c.lighten(0.0), c);
	}

	#[test]
	fn unknown_types_get_a_stable_colour() {
		let theme = Theme::default();
		let first = theme.statement_color(Some("premise"));
		assert_eq!(first, theme.statement_color(Some("premise")));
		assert!(theme.palette.colors.contains(&first));
		assert_eq!(
			theme.statement_color(Some("query")),
			Color::rgb(119, 158, 120)
		);
		assert_eq!(theme.statement_color(None), theme.node.fill);
		assert_eq!(theme.edge_color(Some("unknown")), theme.edge.color);
		assert_eq!(theme.edge_color(Some("attack")), Color::rgb(190, 80, 80));
	}

	#[test]
	fn themes_resolve_by_name() {
		assert_eq!(Theme::by_name("dark").map(|t| t.name), Some("dark"));
		assert!(Theme::by_name("neon").is_none());
	}
}

//! Canvas rendering for the statement graph.
//!
//! Draw order:
//! 1. Background (screen space)
//! 2. Edge routes, arrowheads, then edge labels (graph space)
//! 3. Statement boxes and their labels, the hovered statement last
//!
//! Collapsed elements are skipped. Elements flagged `unhighlight` are drawn
//! with the theme's dimmed alpha.

use web_sys::{CanvasRenderingContext2d, Path2d};

use super::scale::{ScaleConfig, ScaledValues};
use super::state::GraphViewState;
use super::theme::Theme;
use super::types::{Edge, Node, Point};

pub fn render(
	state: &GraphViewState,
	ctx: &CanvasRenderingContext2d,
	config: &ScaleConfig,
	theme: &Theme,
) {
	let scale = ScaledValues::new(config, state.zoom_level());
	let dims = state.dims();

	let _ = ctx.reset_transform();
	ctx.set_global_alpha(1.0);
	ctx.set_fill_style_str(&theme.background.color.to_css());
	ctx.fill_rect(0.0, 0.0, dims.width, dims.height);

	let m = state.matrix();
	let _ = ctx.set_transform(m.a, m.b, m.c, m.d, m.e, m.f);

	let graph = state.graph();
	for edge in graph.edges.iter().filter(|e| !e.collapsed) {
		draw_edge(ctx, edge, &scale, theme);
	}

	let hovered = state.hovered();
	for node in graph
		.nodes
		.iter()
		.filter(|n| !n.collapsed && Some(n.id.as_str()) != hovered)
	{
		draw_node(ctx, node, &scale, theme, false);
	}
	if let Some(node) = hovered.and_then(|id| graph.node(id)).filter(|n| !n.collapsed) {
		draw_node(ctx, node, &scale, theme, true);
	}

	let _ = ctx.reset_transform();
	ctx.set_global_alpha(1.0);
}

fn draw_edge(ctx: &CanvasRenderingContext2d, edge: &Edge, scale: &ScaledValues, theme: &Theme) {
	let (Some(line), Some(points)) = (edge.line.as_deref(), edge.points.as_deref()) else {
		return;
	};
	let Ok(path) = Path2d::new_with_path_string(line) else {
		return;
	};

	let alpha = if edge.unhighlight {
		theme.edge.dimmed_alpha
	} else {
		1.0
	};
	let color = theme.edge_color(edge.data.get("type").and_then(|v| v.as_str()));

	ctx.set_global_alpha(alpha);
	ctx.set_stroke_style_str(&color.to_css());
	ctx.set_line_width(scale.edge_line_width);
	ctx.stroke_with_path(&path);

	if let [.., from, tip] = points {
		ctx.set_fill_style_str(&color.to_css());
		draw_arrowhead(ctx, *from, *tip, scale.arrow_size);
	}

	if let Some(label) = edge.label.as_deref().filter(|l| !l.is_empty()) {
		if !scale.cull_edge_labels {
			let mid = route_midpoint(points);
			ctx.set_global_alpha(alpha * scale.edge_label_alpha);
			ctx.set_fill_style_str(&theme.edge.label.to_css());
			ctx.set_font(&scale.edge_label_font);
			ctx.set_text_align("center");
			ctx.set_text_baseline(edge.dominant_baseline.canvas_baseline());
			let _ = ctx.fill_text(label, mid.x, mid.y);
		}
	}
	ctx.set_global_alpha(1.0);
}

fn draw_arrowhead(ctx: &CanvasRenderingContext2d, from: Point, tip: Point, size: f64) {
	let (dx, dy) = (tip.x - from.x, tip.y - from.y);
	let dist = (dx * dx + dy * dy).sqrt();
	if dist < 0.001 {
		return;
	}
	let (ux, uy) = (dx / dist, dy / dist);
	let (back_x, back_y) = (tip.x - ux * size, tip.y - uy * size);
	let (px, py) = (-uy * size * 0.5, ux * size * 0.5);

	ctx.begin_path();
	ctx.move_to(tip.x, tip.y);
	ctx.line_to(back_x + px, back_y + py);
	ctx.line_to(back_x - px, back_y - py);
	ctx.close_path();
	ctx.fill();
}

/// Point halfway along the polyline.
fn route_midpoint(points: &[Point]) -> Point {
	let length: f64 = points
		.windows(2)
		.map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
		.sum();
	let mut remaining = length / 2.0;
	for w in points.windows(2) {
		let segment = (w[1].x - w[0].x).hypot(w[1].y - w[0].y);
		if segment >= remaining && segment > 0.0 {
			let t = remaining / segment;
			return Point::new(
				w[0].x + (w[1].x - w[0].x) * t,
				w[0].y + (w[1].y - w[0].y) * t,
			);
		}
		remaining -= segment;
	}
	points.first().copied().unwrap_or_default()
}

fn draw_node(
	ctx: &CanvasRenderingContext2d,
	node: &Node,
	scale: &ScaledValues,
	theme: &Theme,
	hovered: bool,
) {
	let (Some(position), Some(dimension)) = (node.position, node.dimension) else {
		return;
	};
	if !position.is_finite() {
		return;
	}
	let x = position.x - dimension.width / 2.0;
	let y = position.y - dimension.height / 2.0;

	let mut fill = theme.statement_color(node.data_str("type"));
	if hovered {
		fill = fill.lighten(theme.node.hover_lighten);
	}
	let alpha = if node.unhighlight {
		theme.node.dimmed_alpha
	} else {
		1.0
	};

	ctx.set_global_alpha(alpha);
	rounded_rect(
		ctx,
		x,
		y,
		dimension.width,
		dimension.height,
		scale.corner_radius,
	);
	ctx.set_fill_style_str(&fill.to_css());
	ctx.fill();
	ctx.set_stroke_style_str(&fill.darken(theme.node.border_darken).to_css());
	ctx.set_line_width(scale.border_width);
	ctx.stroke();

	if let Some(label) = node.label.as_deref().filter(|l| !l.is_empty()) {
		if !scale.cull_labels {
			ctx.set_global_alpha(alpha * scale.label_alpha);
			ctx.set_fill_style_str(&theme.node.text.to_css());
			ctx.set_font(&scale.label_font);
			ctx.set_text_align("center");
			ctx.set_text_baseline("middle");
			let _ = ctx.fill_text(label, position.x, position.y);
		}
	}
	ctx.set_global_alpha(1.0);
}

fn rounded_rect(ctx: &CanvasRenderingContext2d, x: f64, y: f64, w: f64, h: f64, r: f64) {
	let r = r.min(w / 2.0).min(h / 2.0).max(0.0);
	ctx.begin_path();
	ctx.move_to(x + r, y);
	let _ = ctx.arc_to(x + w, y, x + w, y + h, r);
	let _ = ctx.arc_to(x + w, y + h, x, y + h, r);
	let _ = ctx.arc_to(x, y + h, x, y, r);
	let _ = ctx.arc_to(x, y, x + w, y, r);
	ctx.close_path();
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn midpoint_follows_the_route() {
		let route = [
			Point::new(0.0, 0.0),
			Point::new(10.0, 0.0),
			Point::new(10.0, 10.0),
		];
		assert_eq!(route_midpoint(&route), Point::new(10.0, 0.0));
		assert_eq!(
			route_midpoint(&[Point::new(0.0, 0.0), Point::new(0.0, 8.0)]),
			Point::new(0.0, 4.0)
		);
		assert_eq!(route_midpoint(&[Point::new(3.0, 4.0)]), Point::new(3.0, 4.0));
	}
}

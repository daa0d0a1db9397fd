//! Path strings for edge routes.
//!
//! Routes are turned into SVG path data so the renderer can stroke them with
//! `Path2D` and keep the previous path around for transitions.

use serde::{Deserialize, Serialize};

use super::types::{DominantBaseline, Point};

/// Interpolation used between route points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Curve {
	/// Straight segments.
	#[default]
	Linear,
	/// Cubic segments that stay monotone along the y axis.
	MonotoneY,
}

impl Curve {
	/// Builds path data through `points`, or `None` for an empty route.
	pub fn path(self, points: &[Point]) -> Option<String> {
		let first = points.first()?;
		if points.iter().any(|p| !p.is_finite()) {
			return None;
		}
		let mut path = format!("M{},{}", first.x, first.y);
		match self {
			Curve::Linear => {
				for p in &points[1..] {
					path.push_str(&format!("L{},{}", p.x, p.y));
				}
			}
			Curve::MonotoneY => {
				if points.len() == 2 {
					path.push_str(&format!("L{},{}", points[1].x, points[1].y));
				} else {
					monotone_segments(points, &mut path);
				}
			}
		}
		Some(path)
	}
}

/// Appends cubic Bézier segments that never overshoot in y.
///
/// The monotone axis is `y`; `x` is interpolated as a function of it.
fn monotone_segments(points: &[Point], path: &mut String) {
	let along: Vec<f64> = points.iter().map(|p| p.y).collect();
	let across: Vec<f64> = points.iter().map(|p| p.x).collect();
	let tangents = monotone_tangents(&along, &across);

	for i in 0..points.len().saturating_sub(1) {
		let h = (along[i + 1] - along[i]) / 3.0;
		let (c1_along, c1_across) = (along[i] + h, across[i] + h * tangents[i]);
		let (c2_along, c2_across) = (along[i + 1] - h, across[i + 1] - h * tangents[i + 1]);
		path.push_str(&format!(
			"C{},{},{},{},{},{}",
			c1_across, c1_along, c2_across, c2_along, across[i + 1], along[i + 1]
		));
	}
}

fn monotone_tangents(xs: &[f64], ys: &[f64]) -> Vec<f64> {
	let n = xs.len();
	let mut tangents = vec![0.0; n];
	if n < 2 {
		return tangents;
	}

	let secant = |i: usize| {
		let h = xs[i + 1] - xs[i];
		if h == 0.0 { 0.0 } else { (ys[i + 1] - ys[i]) / h }
	};

	for i in 1..n - 1 {
		let (h0, h1) = (xs[i] - xs[i - 1], xs[i + 1] - xs[i]);
		let (s0, s1) = (secant(i - 1), secant(i));
		let p = if h0 + h1 == 0.0 {
			0.0
		} else {
			(s0 * h1 + s1 * h0) / (h0 + h1)
		};
		let t = (s0.signum() + s1.signum()) * s0.abs().min(s1.abs()).min(0.5 * p.abs());
		tangents[i] = if t.is_finite() { t } else { 0.0 };
	}

	let end_slope = |i0: usize, i1: usize, t: f64| {
		let h = xs[i1] - xs[i0];
		if h == 0.0 { t } else { (3.0 * (ys[i1] - ys[i0]) / h - t) / 2.0 }
	};
	if n == 2 {
		let s = secant(0);
		tangents[0] = s;
		tangents[1] = s;
	} else {
		tangents[0] = end_slope(0, 1, tangents[1]);
		tangents[n - 1] = end_slope(n - 2, n - 1, tangents[n - 2]);
	}
	tangents
}

/// Label path for an edge: runs right-to-left routes backwards so the text
/// stays upright.
pub fn text_path(
	curve: Curve,
	points: &[Point],
	line: Option<&str>,
) -> (Option<String>, DominantBaseline) {
	let (Some(first), Some(last)) = (points.first(), points.last()) else {
		return (None, DominantBaseline::TextAfterEdge);
	};
	if last.x < first.x {
		let reversed: Vec<Point> = points.iter().rev().copied().collect();
		(curve.path(&reversed), DominantBaseline::TextBeforeEdge)
	} else {
		(line.map(str::to_string), DominantBaseline::TextAfterEdge)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn linear_path_visits_every_point() {
		let points = [Point::new(0.0, 0.0), Point::new(10.0, 5.0), Point::new(20.0, 0.0)];
		assert_eq!(Curve::Linear.path(&points).as_deref(), Some("M0,0L10,5L20,0"));
		assert_eq!(Curve::Linear.path(&[]), None);
	}

	#[test]
	fn monotone_path_uses_cubics_and_ends_on_last_point() {
		let points = [Point::new(0.0, 0.0), Point::new(10.0, 50.0), Point::new(0.0, 100.0)];
		let path = Curve::MonotoneY.path(&points).unwrap();
		assert!(path.starts_with("M0,0C"));
		assert!(path.ends_with(",0,100"));
		assert_eq!(path.matches('C').count(), 2);
	}

	#[test]
	fn monotone_with_two_points_is_a_line() {
		let points = [Point::new(0.0, 0.0), Point::new(3.0, 4.0)];
		assert_eq!(Curve::MonotoneY.path(&points).as_deref(), Some("M0,0L3,4"));
	}

	#[test]
	fn text_path_flips_for_leftward_routes() {
		let points = [Point::new(10.0, 0.0), Point::new(0.0, 0.0)];
		let line = Curve::Linear.path(&points);
		let (path, baseline) = text_path(Curve::Linear, &points, line.as_deref());
		assert_eq!(baseline, DominantBaseline::TextBeforeEdge);
		assert_eq!(path.as_deref(), Some("M0,0L10,0"));

		let forward = [Point::new(0.0, 0.0), Point::new(10.0, 0.0)];
		let line = Curve::Linear.path(&forward);
		let (path, baseline) = text_path(Curve::Linear, &forward, line.as_deref());
		assert_eq!(baseline, DominantBaseline::TextAfterEdge);
		assert_eq!(path, line);
	}
}

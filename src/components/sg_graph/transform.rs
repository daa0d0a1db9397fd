//! 2-D affine transform used for pan and zoom.
//!
//! The six coefficients follow the SVG `matrix(a, b, c, d, e, f)` convention:
//!
//! ```text
//! | a c e |
//! | b d f |
//! | 0 0 1 |
//! ```
//!
//! Composition is right-multiplication, so `m.compose(translate(..))` applies
//! the translation in the coordinate space *inside* `m` (graph space).

use super::types::Point;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Matrix {
	pub a: f64,
	pub b: f64,
	pub c: f64,
	pub d: f64,
	pub e: f64,
	pub f: f64,
}

impl Default for Matrix {
	fn default() -> Self {
		Self::identity()
	}
}

impl Matrix {
	pub const fn identity() -> Self {
		Self {
			a: 1.0,
			b: 0.0,
			c: 0.0,
			d: 1.0,
			e: 0.0,
			f: 0.0,
		}
	}

	pub const fn translate(tx: f64, ty: f64) -> Self {
		Self {
			e: tx,
			f: ty,
			..Self::identity()
		}
	}

	pub const fn scale(sx: f64, sy: f64) -> Self {
		Self {
			a: sx,
			d: sy,
			..Self::identity()
		}
	}

	/// `self × other`.
	pub fn multiply(&self, other: &Matrix) -> Matrix {
		Matrix {
			a: self.a * other.a + self.c * other.b,
			b: self.b * other.a + self.d * other.b,
			c: self.a * other.c + self.c * other.d,
			d: self.b * other.c + self.d * other.d,
			e: self.a * other.e + self.c * other.f + self.e,
			f: self.b * other.e + self.d * other.f + self.f,
		}
	}

	/// Right-multiplies `other` into this matrix in place.
	pub fn compose(&mut self, other: Matrix) {
		*self = self.multiply(&other);
	}

	pub fn reset(&mut self) {
		*self = Self::identity();
	}

	pub fn apply(&self, point: Point) -> Point {
		Point::new(
			self.a * point.x + self.c * point.y + self.e,
			self.b * point.x + self.d * point.y + self.f,
		)
	}

	/// `None` when the matrix is singular (e.g. zoomed to zero).
	pub fn inverse(&self) -> Option<Matrix> {
		let det = self.a * self.d - self.b * self.c;
		if det == 0.0 || !det.is_finite() {
			return None;
		}
		Some(Matrix {
			a: self.d / det,
			b: -self.b / det,
			c: -self.c / det,
			d: self.a / det,
			e: (self.c * self.f - self.d * self.e) / det,
			f: (self.b * self.e - self.a * self.f) / det,
		})
	}

	pub fn to_svg(&self) -> String {
		format!(
			"matrix({},{},{},{},{},{})",
			self.a, self.b, self.c, self.d, self.e, self.f
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn close(a: f64, b: f64) -> bool {
		(a - b).abs() < 1e-9
	}

	#[test]
	fn translate_inside_scale_is_scaled() {
		let mut m = Matrix::scale(2.0, 2.0);
		m.compose(Matrix::translate(5.0, -3.0));
		assert_eq!(m.e, 10.0);
		assert_eq!(m.f, -6.0);
		assert_eq!(m.a, 2.0);
	}

	#[test]
	fn inverse_round_trips_points() {
		let mut m = Matrix::translate(40.0, 12.0);
		m.compose(Matrix::scale(1.5, 1.5));
		let inv = m.inverse().unwrap();
		let p = Point::new(7.0, -3.0);
		let back = inv.apply(m.apply(p));
		assert!(close(back.x, p.x) && close(back.y, p.y));
	}

	#[test]
	fn singular_matrix_has_no_inverse() {
		assert!(Matrix::scale(0.0, 1.0).inverse().is_none());
	}

	#[test]
	fn svg_string_lists_all_coefficients() {
		assert_eq!(Matrix::identity().to_svg(), "matrix(1,0,0,1,0,0)");
	}
}

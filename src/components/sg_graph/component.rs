//! Leptos component wrapping the statement graph canvas.
//!
//! The component creates a canvas, hands pointer, wheel and touch input to a
//! [`GraphViewState`] and drives it from a `requestAnimationFrame` loop that
//! advances the layout and redraws every frame. Once the canvas is removed
//! from the document the loop stops and the controller is torn down, which
//! cancels any running layout and closes its command queue.

use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use log::{debug, warn};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use web_sys::{
	CanvasRenderingContext2d, HtmlCanvasElement, MouseEvent, TouchEvent, WheelEvent, Window,
};

use super::commands::CommandSender;
use super::config::GraphConfig;
use super::render;
use super::scale::ScaleConfig;
use super::state::{GraphViewState, NodeMeasurement, NodeMeasurer};
use super::theme::Theme;
use super::types::{Graph, Node, Point};

/// Size of a statement without a label.
const BARE_NODE_SIZE: f64 = 30.0;

/// Measures labels with the canvas text metrics at zoom level 1.
struct CanvasMeasurer {
	ctx: CanvasRenderingContext2d,
	font: String,
	line_height: f64,
}

impl NodeMeasurer for CanvasMeasurer {
	fn measure(&self, node: &Node) -> Option<NodeMeasurement> {
		let Some(label) = node.label.as_deref().filter(|l| !l.is_empty()) else {
			return Some(NodeMeasurement {
				width: BARE_NODE_SIZE,
				height: BARE_NODE_SIZE,
				text_width: None,
			});
		};
		self.ctx.set_font(&self.font);
		let text_width = self.ctx.measure_text(label).ok()?.width();
		(text_width > 0.0).then_some(NodeMeasurement {
			width: text_width,
			height: self.line_height,
			text_width: Some(text_width),
		})
	}
}

/// Controller plus everything the renderer needs.
struct GraphContext {
	state: GraphViewState,
	measurer: CanvasMeasurer,
	scale: ScaleConfig,
	theme: Theme,
}

fn canvas_point(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> Point {
	let rect = canvas.get_bounding_client_rect();
	Point::new(
		client_x as f64 - rect.left(),
		client_y as f64 - rect.top(),
	)
}

fn window_size(window: &Window) -> Option<(f64, f64)> {
	Some((
		window.inner_width().ok()?.as_f64()?,
		window.inner_height().ok()?.as_f64()?,
	))
}

fn resolve_theme(name: Option<&str>, fallback: &Theme) -> Theme {
	let Some(name) = name else {
		return fallback.clone();
	};
	Theme::by_name(name).unwrap_or_else(|| {
		warn!("sg-graph: unknown theme '{}', keeping '{}'", name, fallback.name);
		fallback.clone()
	})
}

/// Renders an interactive statement graph on a canvas element.
///
/// `data` is laid out with the layout registered as `layout` (the layered
/// `dagre` layout when unset) configured by `layout_settings`; changing any
/// of them triggers a new layout run. The component sizes itself to its
/// parent unless `fullscreen` or explicit `width`/`height` are given.
/// `on_ready` receives the controller's [`CommandSender`] once the canvas is
/// attached, for toolbar buttons and other outside drivers.
#[component]
pub fn StatementGraphCanvas(
	#[prop(into)] data: Signal<Graph>,
	#[prop(default = GraphConfig::default())] config: GraphConfig,
	#[prop(into, default = Signal::stored(None))] layout: Signal<Option<String>>,
	#[prop(into, default = Signal::stored(Value::Null))] layout_settings: Signal<Value>,
	#[prop(default = Theme::default())] theme: Theme,
	#[prop(default = false)] fullscreen: bool,
	#[prop(default = None)] width: Option<f64>,
	#[prop(default = None)] height: Option<f64>,
	#[prop(optional)] on_ready: Option<Rc<dyn Fn(CommandSender)>>,
) -> impl IntoView {
	let canvas_ref = NodeRef::<leptos::html::Canvas>::new();
	let context: Rc<RefCell<Option<GraphContext>>> = Rc::new(RefCell::new(None));
	let animate: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let resize_cb: Rc<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::new(RefCell::new(None));
	let (context_init, animate_init, resize_cb_init) =
		(context.clone(), animate.clone(), resize_cb.clone());

	Effect::new(move |_| {
		let Some(canvas) = canvas_ref.get() else {
			return;
		};
		if context_init.borrow().is_some() {
			return;
		}
		let canvas: HtmlCanvasElement = canvas.into();
		let Some(window) = web_sys::window() else {
			return;
		};

		let (w, h) = if fullscreen {
			window_size(&window).unwrap_or((800.0, 600.0))
		} else {
			(
				width.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_width() as f64)
						.unwrap_or(800.0)
				}),
				height.unwrap_or_else(|| {
					canvas
						.parent_element()
						.map(|p| p.client_height() as f64)
						.unwrap_or(600.0)
				}),
			)
		};
		canvas.set_width(w as u32);
		canvas.set_height(h as u32);

		let Some(ctx) = canvas
			.get_context("2d")
			.ok()
			.flatten()
			.and_then(|c| c.dyn_into::<CanvasRenderingContext2d>().ok())
		else {
			warn!("sg-graph: canvas has no 2d context");
			return;
		};

		let scale = ScaleConfig::default();
		let mut state = GraphViewState::new(config.clone());
		if let Err(e) = state.set_layout(layout.get_untracked().as_deref()) {
			warn!("sg-graph: {}", e);
		}
		if let Err(e) = state.set_layout_settings(layout_settings.get_untracked()) {
			warn!("sg-graph: {}", e);
		}
		state.set_data(data.get_untracked());
		state.attach(w, h);
		if let Some(ref on_ready) = on_ready {
			on_ready(state.commands());
		}

		*context_init.borrow_mut() = Some(GraphContext {
			measurer: CanvasMeasurer {
				ctx: ctx.clone(),
				font: format!("{}px sans-serif", scale.node.label_size),
				line_height: scale.node.label_size * 2.5,
			},
			state,
			scale,
			theme: resolve_theme(config.theme.as_deref(), &theme),
		});

		if fullscreen {
			let (context_resize, canvas_resize) = (context_init.clone(), canvas.clone());
			*resize_cb_init.borrow_mut() = Some(Closure::new(move || {
				let Some((nw, nh)) = web_sys::window().as_ref().and_then(window_size) else {
					return;
				};
				canvas_resize.set_width(nw as u32);
				canvas_resize.set_height(nh as u32);
				if let Some(ref mut c) = *context_resize.borrow_mut() {
					c.state.resize(nw, nh);
				}
			}));
			if let Some(ref cb) = *resize_cb_init.borrow() {
				let _ =
					window.add_event_listener_with_callback("resize", cb.as_ref().unchecked_ref());
			}
		}

		let (context_anim, animate_inner, canvas_anim) =
			(context_init.clone(), animate_init.clone(), canvas.clone());
		*animate_init.borrow_mut() = Some(Closure::new(move || {
			let mut slot = context_anim.borrow_mut();
			let Some(ref mut c) = *slot else {
				return;
			};
			if !canvas_anim.is_connected() {
				c.state.teardown();
				return;
			}
			c.state.frame(&c.measurer);
			render::render(&c.state, &ctx, &c.scale, &c.theme);
			drop(slot);

			if let Some(ref cb) = *animate_inner.borrow() {
				if let Some(window) = web_sys::window() {
					let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
				}
			}
		}));
		if let Some(ref cb) = *animate_init.borrow() {
			let _ = window.request_animation_frame(cb.as_ref().unchecked_ref());
		}
	});

	let context_data = context.clone();
	Effect::new(move |_| {
		let graph = data.get();
		if let Some(ref mut c) = *context_data.borrow_mut() {
			c.state.set_data(graph);
		}
	});

	let context_layout = context.clone();
	Effect::new(move |previous: Option<()>| {
		let (name, settings) = (layout.get(), layout_settings.get());
		// The first run is covered by initialisation.
		if previous.is_none() {
			return;
		}
		if let Some(ref mut c) = *context_layout.borrow_mut() {
			debug!("sg-graph: layout inputs changed");
			if let Err(e) = c.state.set_layout(name.as_deref()) {
				warn!("sg-graph: {}", e);
			}
			if let Err(e) = c.state.set_layout_settings(settings) {
				warn!("sg-graph: {}", e);
			}
		}
	});

	let point_of = move |x: i32, y: i32| -> Option<Point> {
		let canvas: HtmlCanvasElement = canvas_ref.get()?.into();
		Some(canvas_point(&canvas, x, y))
	};

	let context_md = context.clone();
	let on_mousedown = move |ev: MouseEvent| {
		let Some(p) = point_of(ev.client_x(), ev.client_y()) else {
			return;
		};
		if let Some(ref mut c) = *context_md.borrow_mut() {
			c.state.on_pointer_down(p);
		}
	};

	let context_mm = context.clone();
	let on_mousemove = move |ev: MouseEvent| {
		let Some(p) = point_of(ev.client_x(), ev.client_y()) else {
			return;
		};
		if let Some(ref mut c) = *context_mm.borrow_mut() {
			c.state.on_pointer_move(p);
		}
	};

	let context_mu = context.clone();
	let on_mouseup = move |ev: MouseEvent| {
		let p = point_of(ev.client_x(), ev.client_y());
		if let Some(ref mut c) = *context_mu.borrow_mut() {
			c.state.on_pointer_up(p);
		}
	};

	let context_ml = context.clone();
	let on_mouseleave = move |_: MouseEvent| {
		if let Some(ref mut c) = *context_ml.borrow_mut() {
			c.state.on_pointer_leave();
		}
	};

	let context_wh = context.clone();
	let on_wheel = move |ev: WheelEvent| {
		ev.prevent_default();
		let Some(p) = point_of(ev.client_x(), ev.client_y()) else {
			return;
		};
		if let Some(ref mut c) = *context_wh.borrow_mut() {
			c.state.on_wheel(p, ev.delta_y());
		}
	};

	let context_dc = context.clone();
	let on_dblclick = move |ev: MouseEvent| {
		let Some(p) = point_of(ev.client_x(), ev.client_y()) else {
			return;
		};
		if let Some(ref mut c) = *context_dc.borrow_mut() {
			c.state.on_double_click(p);
		}
	};

	let touch_point = move |ev: &TouchEvent| -> Option<Point> {
		let touch = ev.touches().get(0)?;
		point_of(touch.client_x(), touch.client_y())
	};

	let context_ts = context.clone();
	let on_touchstart = move |ev: TouchEvent| {
		ev.prevent_default();
		let Some(p) = touch_point(&ev) else {
			return;
		};
		if let Some(ref mut c) = *context_ts.borrow_mut() {
			c.state.on_touch_start(p);
		}
	};

	let context_tm = context.clone();
	let on_touchmove = move |ev: TouchEvent| {
		ev.prevent_default();
		let Some(p) = touch_point(&ev) else {
			return;
		};
		if let Some(ref mut c) = *context_tm.borrow_mut() {
			c.state.on_touch_move(p);
		}
	};

	let context_te = context.clone();
	let on_touchend = move |_: TouchEvent| {
		if let Some(ref mut c) = *context_te.borrow_mut() {
			c.state.on_touch_end();
		}
	};

	view! {
		<canvas
			node_ref=canvas_ref
			class="sg-graph-canvas"
			on:mousedown=on_mousedown
			on:mousemove=on_mousemove
			on:mouseup=on_mouseup
			on:mouseleave=on_mouseleave
			on:wheel=on_wheel
			on:dblclick=on_dblclick
			on:touchstart=on_touchstart
			on:touchmove=on_touchmove
			on:touchend=on_touchend
			style="display: block; cursor: grab; touch-action: none;"
		/>
	}
}

//! sg-graph: interactive statement graph visualisation.
//!
//! This crate provides a WASM canvas viewport for argumentation statement
//! graphs: layered and force-directed layouts, pan/zoom, node dragging,
//! ancestor collapse and hover highlighting. Snapshots pushed by the host
//! page are merged into the display without losing per-statement view state.

use std::cell::RefCell;
use std::rc::Rc;

use leptos::prelude::*;
use leptos_meta::*;
use log::{Level, info, warn};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlScriptElement, Window};

pub mod components;
pub mod project;

pub use components::sg_display::{SgDisplay, Snapshot, Statement, SgEdge};
pub use components::sg_graph::{
	CommandSender, Edge, Graph, GraphConfig, GraphViewState, Node, StatementGraphCanvas,
	ViewCommand,
};
pub use project::{KnowledgeBase, Project, ProjectError};

use components::sg_display;

/// Initialize logging and panic hooks for the WASM target.
pub fn init_logging() {
	let _ = console_log::init_with_level(Level::Debug);
	console_error_panic_hook::set_once();
	info!("sg-graph: logging initialized");
}

/// The merged display and the signal the canvas renders from.
struct DisplayHandle {
	display: SgDisplay,
	graph: RwSignal<Graph>,
}

thread_local! {
	static DISPLAY: RefCell<Option<DisplayHandle>> = const { RefCell::new(None) };
}

/// Text of the `<script>` element with the given id.
fn script_text(id: &str) -> Option<String> {
	let window: Window = web_sys::window()?;
	let document = window.document()?;
	let element = document.get_element_by_id(id)?;
	let script: HtmlScriptElement = element.dyn_into().ok()?;
	script.text().ok()
}

/// Initial snapshot from `<script id="graph-data">`.
fn load_snapshot() -> Option<Snapshot> {
	let json_text = script_text("graph-data")?;
	match Snapshot::from_json(&json_text) {
		Ok(snapshot) => snapshot,
		Err(e) => {
			warn!("sg-graph: failed to parse graph data: {}", e);
			None
		}
	}
}

/// Viewport configuration from `<script id="graph-config">`, on top of the
/// statement display defaults when absent.
fn load_config() -> GraphConfig {
	let Some(json_text) = script_text("graph-config") else {
		return sg_display::graph_config();
	};
	match serde_json::from_str(&json_text) {
		Ok(config) => config,
		Err(e) => {
			warn!("sg-graph: failed to parse graph config: {}", e);
			sg_display::graph_config()
		}
	}
}

/// Merges a snapshot pushed by the host page into the display. Accepts a
/// JSON string or a plain object; `null` is ignored.
#[wasm_bindgen]
pub fn push_snapshot(snapshot: JsValue) -> Result<(), JsValue> {
	let json = match snapshot.as_string() {
		Some(json) => json,
		None => js_sys::JSON::stringify(&snapshot)?
			.as_string()
			.unwrap_or_else(|| "null".to_string()),
	};
	let snapshot =
		Snapshot::from_json(&json).map_err(|e| JsValue::from_str(&e.to_string()))?;

	DISPLAY.with(|slot| {
		let mut slot = slot.borrow_mut();
		let Some(handle) = slot.as_mut() else {
			warn!("sg-graph: snapshot pushed before the app was mounted");
			return;
		};
		if !handle.display.merge(snapshot).skipped {
			handle.graph.set(handle.display.to_graph());
		}
	});
	Ok(())
}

/// Main application component.
/// Loads the initial snapshot from the DOM and renders the statement graph
/// with a small toolbar for the viewport commands.
#[component]
pub fn App() -> impl IntoView {
	provide_meta_context();

	let mut display = SgDisplay::new();
	display.merge(load_snapshot());
	let graph = RwSignal::new(display.to_graph());
	DISPLAY.with(|slot| *slot.borrow_mut() = Some(DisplayHandle { display, graph }));

	let sender: Rc<RefCell<Option<CommandSender>>> = Rc::new(RefCell::new(None));
	let sender_ready = sender.clone();
	let on_ready: Rc<dyn Fn(CommandSender)> =
		Rc::new(move |tx| *sender_ready.borrow_mut() = Some(tx));

	let send = move |command: ViewCommand| {
		let sender = sender.clone();
		move |_: web_sys::MouseEvent| {
			if let Some(ref tx) = *sender.borrow() {
				if let Err(e) = tx.send(command) {
					warn!("sg-graph: {}", e);
				}
			}
		}
	};

	view! {
		<Html attr:lang="en" attr:dir="ltr" />
		<Title text="Statement Graph" />
		<Meta charset="UTF-8" />
		<Meta name="viewport" content="width=device-width, initial-scale=1.0" />

		<div class="fullscreen-graph">
			<StatementGraphCanvas
				data=graph
				config=load_config()
				layout=Signal::stored(Some(sg_display::LAYOUT.to_string()))
				layout_settings=Signal::stored(sg_display::layout_settings())
				fullscreen=true
				on_ready=on_ready
			/>
			<div class="graph-overlay">
				<button on:click=send(ViewCommand::Update)>"Update"</button>
				<button on:click=send(ViewCommand::Center)>"Center"</button>
				<button on:click=send(ViewCommand::ZoomToFit)>"Zoom to fit"</button>
				<p class="subtitle">
					"Drag statements to move them. Double-click to collapse their ancestors. Scroll to zoom."
				</p>
			</div>
		</div>
	}
}

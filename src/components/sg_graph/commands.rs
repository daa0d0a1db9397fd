//! Commands sent to the viewport from outside (toolbar buttons, the host page).
//!
//! The queue is bounded and drained once per animation frame. Closing it on
//! teardown makes every outstanding sender fail instead of queueing work for
//! a view that no longer exists.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewCommand {
	/// Re-create the graph and run the layout again.
	Update,
	/// Centre the graph in the viewport.
	Center,
	/// Zoom so the whole graph fits.
	ZoomToFit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
	#[error("view command queue is full ({0} pending)")]
	Full(usize),
	#[error("view command queue is closed")]
	Closed,
}

#[derive(Debug)]
struct Inner {
	pending: VecDeque<ViewCommand>,
	capacity: usize,
	closed: bool,
}

/// Receiving end, owned by the viewport controller.
#[derive(Debug)]
pub struct CommandQueue {
	inner: Rc<RefCell<Inner>>,
}

/// Cloneable sending end handed to whoever drives the view.
#[derive(Clone, Debug)]
pub struct CommandSender {
	inner: Rc<RefCell<Inner>>,
}

impl CommandQueue {
	pub fn bounded(capacity: usize) -> Self {
		Self {
			inner: Rc::new(RefCell::new(Inner {
				pending: VecDeque::with_capacity(capacity),
				capacity: capacity.max(1),
				closed: false,
			})),
		}
	}

	pub fn sender(&self) -> CommandSender {
		CommandSender {
			inner: Rc::clone(&self.inner),
		}
	}

	/// Takes every pending command in send order.
	pub fn drain(&self) -> Vec<ViewCommand> {
		self.inner.borrow_mut().pending.drain(..).collect()
	}

	pub fn close(&self) {
		let mut inner = self.inner.borrow_mut();
		inner.closed = true;
		inner.pending.clear();
	}
}

impl CommandSender {
	pub fn send(&self, command: ViewCommand) -> Result<(), CommandError> {
		let mut inner = self.inner.borrow_mut();
		if inner.closed {
			return Err(CommandError::Closed);
		}
		if inner.pending.len() >= inner.capacity {
			return Err(CommandError::Full(inner.pending.len()));
		}
		inner.pending.push_back(command);
		Ok(())
	}
}

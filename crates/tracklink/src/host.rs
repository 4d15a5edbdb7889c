#![forbid(unsafe_code)]

//! The host side of the bridge: whoever owns the render loop.
//!
//! The data manager asks the host to re-render a component with
//! [`Host::request_render`] when tracked data changes. The host answers by
//! calling the component's `force_update()` at its next render pass.
//! [`RenderQueue`] is a minimal host that just collects requests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::component::ComponentId;

/// Force-rerender collaborator.
pub trait Host {
    /// Schedule a render of component `id`, bypassing any "should update"
    /// check.
    fn request_render(&self, id: ComponentId);
}

/// FIFO of components awaiting a forced render. Duplicate requests for a
/// component already queued are dropped.
#[derive(Debug, Default)]
pub struct RenderQueue {
    queue: RefCell<VecDeque<ComponentId>>,
}

impl RenderQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every queued id, oldest first.
    pub fn drain(&self) -> Vec<ComponentId> {
        self.queue.borrow_mut().drain(..).collect()
    }

    #[must_use]
    pub fn contains(&self, id: ComponentId) -> bool {
        self.queue.borrow().contains(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

impl Host for RenderQueue {
    fn request_render(&self, id: ComponentId) {
        let mut queue = self.queue.borrow_mut();
        if !queue.contains(&id) {
            queue.push_back(id);
        }
    }
}

use super::{BranchFlag, Tree};
use crate::tree::layout::TreeType;

/// Lifecycle notifications emitted by a [`Tree`].
///
/// Listeners are plain callbacks registered on the owning tree; there is no
/// global event bus and no UI-toolkit coupling.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeEvent {
    Loading,
    Loaded,
    Error {
        message: String,
    },
    SubtreeDrawn {
        node: String,
    },
    NodesUpdated {
        node_ids: Vec<String>,
        property: BranchFlag,
        append: bool,
    },
    TreeTypeChanged {
        old: TreeType,
        new: TreeType,
    },
}

pub type Listener = Box<dyn Fn(&TreeEvent)>;

impl Tree {
    pub fn add_listener(&mut self, listener: impl Fn(&TreeEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn fire(&self, event: TreeEvent) {
        for listener in &self.listeners {
            listener(&event);
        }
    }

    pub(crate) fn load_error(&self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("tree error: {message}");
        self.fire(TreeEvent::Error { message });
    }

    pub(crate) fn nodes_updated(&self, node_ids: Vec<String>, property: BranchFlag) {
        self.fire(TreeEvent::NodesUpdated {
            node_ids,
            property,
            append: false,
        });
    }
}

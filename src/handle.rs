/// Ownership wrapper around a native resource id.
///
/// An owned handle releases its resource exactly once, when the handle is
/// dropped or explicitly released. A borrowed handle (used for subtables and
/// read-only aliases) never releases anything: the resource belongs to
/// someone else.

use crate::engine::{Engine, ResourceId};
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

pub struct Handle {
    id: ResourceId,
    ownership: Ownership,
    read_only: bool,
    engine: Rc<Engine>,
}

impl Handle {
    pub(crate) fn owned(engine: &Rc<Engine>, id: ResourceId, read_only: bool) -> Self {
        Handle {
            id,
            ownership: Ownership::Owned,
            read_only,
            engine: Rc::clone(engine),
        }
    }

    pub(crate) fn borrowed(engine: &Rc<Engine>, id: ResourceId, read_only: bool) -> Self {
        Handle {
            id,
            ownership: Ownership::Borrowed,
            read_only,
            engine: Rc::clone(engine),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// True while the engine still holds the resource.
    pub fn is_attached(&self) -> bool {
        self.engine.is_attached(self.id)
    }

    pub fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    /// Release the resource now instead of at drop.
    pub fn release(self) {
        drop(self)
    }
}

impl Drop for Handle {
    fn drop(&mut self) {
        if self.ownership == Ownership::Owned {
            log::trace!("dropping owned handle for resource {}", self.id.value());
            self.engine.release(self.id);
        }
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id.value())
            .field("ownership", &self.ownership)
            .field("read_only", &self.read_only)
            .finish()
    }
}

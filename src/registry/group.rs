use std::sync::Arc;

use super::{Core, Registrar, Scope, Sealed};

/// Routes sharing a path prefix, tags, parameters and middleware.
///
/// Created by [`Registrar::group`]. A group registers into the same mux and document
/// as its server.
pub struct Group {
    core: Arc<Core>,
    scope: Scope,
}

impl Group {
    pub(crate) fn new(core: Arc<Core>, scope: Scope) -> Self {
        Self { core, scope }
    }
}

impl Sealed for Group {
    fn core(&self) -> &Arc<Core> {
        &self.core
    }

    fn scope(&self) -> &Scope {
        &self.scope
    }

    fn scope_mut(&mut self) -> &mut Scope {
        &mut self.scope
    }
}

impl Registrar for Group {}

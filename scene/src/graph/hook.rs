//! Record hooks run around a pass.
//!
//! A hook receives the encoder of the command buffer the pass is recorded
//! into and may emit any commands. Hooks run once per recording of the pass:
//! per presentable image for swap-chain-stream passes, once for auxiliary
//! streams.

use std::fmt;
use std::sync::Arc;

use crate::backend::CommandEncoder;

/// Emits commands into a command buffer being recorded.
///
/// Implemented for every `Fn(&mut CommandEncoder<'_>) + Send + Sync` closure.
pub trait RecordHook: Send + Sync {
    /// Record the hook's commands.
    fn record(&self, encoder: &mut CommandEncoder<'_>);
}

impl<F> RecordHook for F
where
    F: Fn(&mut CommandEncoder<'_>) + Send + Sync,
{
    fn record(&self, encoder: &mut CommandEncoder<'_>) {
        self(encoder)
    }
}

/// The optional before/after hooks of a pass.
#[derive(Clone, Default)]
pub struct PassHooks {
    before: Option<Arc<dyn RecordHook>>,
    after: Option<Arc<dyn RecordHook>>,
}

impl PassHooks {
    /// Create an empty hook pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook run before the pass from a closure.
    pub fn before<F>(self, hook: F) -> Self
    where
        F: Fn(&mut CommandEncoder<'_>) + Send + Sync + 'static,
    {
        self.with_before_hook(Arc::new(hook))
    }

    /// Set the hook run after the pass from a closure.
    pub fn after<F>(self, hook: F) -> Self
    where
        F: Fn(&mut CommandEncoder<'_>) + Send + Sync + 'static,
    {
        self.with_after_hook(Arc::new(hook))
    }

    /// Set the hook run before the pass.
    pub fn with_before_hook(mut self, hook: Arc<dyn RecordHook>) -> Self {
        self.before = Some(hook);
        self
    }

    /// Set the hook run after the pass.
    pub fn with_after_hook(mut self, hook: Arc<dyn RecordHook>) -> Self {
        self.after = Some(hook);
        self
    }

    /// Returns true if neither hook is set.
    pub fn is_empty(&self) -> bool {
        self.before.is_none() && self.after.is_none()
    }

    pub(crate) fn run_before(&self, encoder: &mut CommandEncoder<'_>) {
        if let Some(hook) = &self.before {
            hook.record(encoder);
        }
    }

    pub(crate) fn run_after(&self, encoder: &mut CommandEncoder<'_>) {
        if let Some(hook) = &self.after {
            hook.record(encoder);
        }
    }
}

impl fmt::Debug for PassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassHooks")
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish()
    }
}

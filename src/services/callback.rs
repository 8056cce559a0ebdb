//! Adapter for completion-callback style handlers.
//!
//! A callback receives the tree and a [`Completion`] handle and reports its
//! outcome through the handle instead of a return value. The handle may be
//! resolved before the callback returns or moved into a spawned task and
//! resolved later; the group waits either way.

use std::fmt;

use tokio::sync::oneshot;

use crate::domain::errors::{EngineError, EngineResult, HandlerKind};
use crate::domain::models::{DirtyFlag, Metadata};
use crate::infrastructure::dom::Document;

type CallbackFn = dyn Fn(&mut Document, &mut Metadata, &DirtyFlag, Completion);

/// One-shot handle a callback resolves exactly once.
///
/// Dropping it unresolved fails the callback with
/// [`EngineError::CallbackAbandoned`].
#[derive(Debug)]
pub struct Completion {
    sender: oneshot::Sender<anyhow::Result<()>>,
}

impl Completion {
    pub fn done(self) {
        self.finish(Ok(()));
    }

    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.finish(Err(err.into()));
    }

    pub fn finish(self, result: anyhow::Result<()>) {
        // The receiver only goes away when the engine call itself was dropped.
        let _ = self.sender.send(result);
    }
}

/// A named callback-style member.
pub struct CallbackMember {
    name: String,
    func: Box<CallbackFn>,
}

impl CallbackMember {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut Document, &mut Metadata, &DirtyFlag, Completion) + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn invoke(
        &self,
        doc: &mut Document,
        metadata: &mut Metadata,
        dirty: &DirtyFlag,
    ) -> EngineResult<()> {
        let (sender, receiver) = oneshot::channel();
        (self.func)(doc, metadata, dirty, Completion { sender });

        match receiver.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(EngineError::handler(
                HandlerKind::Callback,
                self.name.as_str(),
                None,
                err,
            )),
            Err(_) => Err(EngineError::CallbackAbandoned(self.name.clone())),
        }
    }
}

impl fmt::Debug for CallbackMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackMember")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

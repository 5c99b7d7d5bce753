//! External collaborators the runtime calls out to
//!
//! Rendering and sandboxed code evaluation live outside this crate; the
//! runtime only needs these narrow contracts.

use tokio::sync::oneshot;

use crate::errors::EvalError;
use crate::value::Value;

/// Receives redraw hints. Calling it many times per tick is harmless.
pub trait Renderer {
    fn request_redraw(&mut self);
}

#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn request_redraw(&mut self) {}
}

/// Runs user-supplied source text in a sandbox
///
/// The result arrives later on the returned channel. A rejected evaluation or
/// a dropped sender resolves the waiting block with the empty string.
pub trait Evaluator {
    fn execute(&self, source: &str) -> oneshot::Receiver<Result<Value, EvalError>>;
}

/// Evaluator for hosts without a sandbox: every request is rejected
#[derive(Debug, Default)]
pub struct NoEvaluator;

impl Evaluator for NoEvaluator {
    fn execute(&self, _source: &str) -> oneshot::Receiver<Result<Value, EvalError>> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(EvalError::Unavailable));
        rx
    }
}

//! Progress reporting and cooperative cancellation for long operations.
//!
//! Operations call [`Progress::update`] once per chunk and stop at the next
//! chunk boundary once [`Progress::is_cancelled`] returns true. Work already
//! done is left consistent section by section.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait Progress {
    fn update(&mut self, done: usize, total: usize, status: &str);

    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<P: Progress + ?Sized> Progress for &mut P {
    fn update(&mut self, done: usize, total: usize, status: &str) {
        (**self).update(done, total, status)
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }
}

/// Ignores updates and never cancels.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn update(&mut self, _done: usize, _total: usize, _status: &str) {}
}

/// Shared cancellation flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Forwards updates to a closure; cancelled through an optional token.
pub struct FnProgress<F> {
    callback: F,
    token: Option<CancelToken>,
}

impl<F: FnMut(usize, usize, &str)> FnProgress<F> {
    pub fn new(callback: F) -> Self {
        Self { callback, token: None }
    }

    pub fn with_token(callback: F, token: CancelToken) -> Self {
        Self { callback, token: Some(token) }
    }
}

impl<F: FnMut(usize, usize, &str)> Progress for FnProgress<F> {
    fn update(&mut self, done: usize, total: usize, status: &str) {
        (self.callback)(done, total, status)
    }

    fn is_cancelled(&self) -> bool {
        self.token.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_progress() {
        let mut seen = Vec::new();
        let token = CancelToken::new();
        {
            let mut p = FnProgress::with_token(|done, total, _: &str| seen.push((done, total)), token.clone());
            p.update(1, 3, "chunk");
            assert!(!p.is_cancelled());
            token.cancel();
            assert!(p.is_cancelled());
        }
        assert_eq!(seen, vec![(1, 3)]);
        assert!(!NoProgress.is_cancelled());
    }
}

//! # View Revalidation
//!
//! After each successful mutation a set of named views is marked stale
//! so the frontend refetches them. Fire-and-forget: this signal is NOT
//! part of any transactional guarantee - a mutation that committed is
//! durable whether or not the signal lands.

/// The cached views the frontend knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Appointments,
    Payments,
    Inventory,
    Closings,
    Reports,
}

/// Cache-invalidation collaborator. Implemented by the web layer
/// (e.g. path revalidation); the default implementation does nothing.
pub trait Revalidator: Send + Sync {
    fn revalidate(&self, views: &[View]);
}

/// No-op revalidator for embedders without a view cache.
#[derive(Debug, Default)]
pub struct NoopRevalidator;

impl Revalidator for NoopRevalidator {
    fn revalidate(&self, _views: &[View]) {}
}

/// Test double that records every signalled view.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingRevalidator {
    views: std::sync::Mutex<Vec<View>>,
}

#[cfg(test)]
impl RecordingRevalidator {
    pub(crate) fn recorded(&self) -> Vec<View> {
        self.views.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl Revalidator for RecordingRevalidator {
    fn revalidate(&self, views: &[View]) {
        self.views.lock().unwrap().extend_from_slice(views);
    }
}

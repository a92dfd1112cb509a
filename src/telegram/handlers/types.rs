//! Handler types and dependencies

use std::sync::Arc;

use crate::telegram::controller::JobController;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub controller: Arc<JobController>,
}

impl HandlerDeps {
    pub fn new(controller: Arc<JobController>) -> Self {
        Self { controller }
    }
}

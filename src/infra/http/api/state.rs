use std::sync::Arc;

use crate::application::{queue::JobQueue, store::JobStore};
use crate::infra::artifacts::ArtifactStore;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub queue: JobQueue,
    pub artifacts: Arc<ArtifactStore>,
}

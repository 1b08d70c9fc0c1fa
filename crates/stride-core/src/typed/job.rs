//! Job trait - ties a job type name to a payload type.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::{JobRequest, JobType, QueueError};

/// A typed job payload.
///
/// # Example
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ProcessItemJob { work_item_id: WorkItemId }
///
/// impl Job for ProcessItemJob {
///     const TYPE: &'static str = "stride.workout.process.v1";
/// }
/// ```
///
/// Naming: `{namespace}.{domain}.{action}.v{major}`.
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    /// Encode into a submittable request.
    fn to_request(&self) -> Result<JobRequest, QueueError> {
        let payload =
            serde_json::to_value(self).map_err(|e| QueueError::Encode(e.to_string()))?;
        Ok(JobRequest::new(JobType::new(Self::TYPE), payload))
    }
}

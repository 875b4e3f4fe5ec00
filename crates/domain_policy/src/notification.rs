//! Customer notifications about policy lifecycle changes
//!
//! Delivery (email, SMS) happens outside this crate; the job records a
//! structured trace that a delivery adapter subscribes to.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use core_kernel::{text_enum, Context, CustomerId, Job, JobError, PolicyId, RetryBackoff};

pub const NOTIFICATION_QUEUE: &str = "notifications";

text_enum! {
    pub enum NotificationType {
        PolicyRenewal => "policy_renewal",
        PolicyCancellation => "policy_cancellation",
        PolicyExpired => "policy_expired",
        GracePeriodExpired => "grace_period_expired",
        RenewalReminder => "renewal_reminder",
    }
}

impl NotificationType {
    /// Higher for notices the customer must act on or has lost cover by
    pub fn priority(&self) -> i32 {
        match self {
            NotificationType::GracePeriodExpired => 9,
            NotificationType::PolicyCancellation | NotificationType::PolicyExpired => 7,
            NotificationType::PolicyRenewal => 5,
            NotificationType::RenewalReminder => 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationJob {
    pub notification_type: NotificationType,
    pub policy_id: PolicyId,
    pub user_id: CustomerId,
    pub priority: i32,
    pub data: Value,
}

impl NotificationJob {
    pub fn new(notification_type: NotificationType, policy_id: PolicyId, user_id: CustomerId, data: Value) -> Self {
        Self {
            notification_type,
            policy_id,
            user_id,
            priority: notification_type.priority(),
            data,
        }
    }
}

#[async_trait]
impl Job for NotificationJob {
    fn job_type(&self) -> &'static str {
        "notification"
    }

    fn queue_name(&self) -> &str {
        NOTIFICATION_QUEUE
    }

    fn max_retries(&self) -> u32 {
        3
    }

    fn retry_backoff(&self) -> RetryBackoff {
        RetryBackoff::linear(Duration::from_secs(30))
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn perform(&self, ctx: &Context) -> Result<(), JobError> {
        ctx.check()?;
        info!(
            notification_type = %self.notification_type,
            policy_id = %self.policy_id,
            user_id = %self.user_id,
            priority = self.priority,
            data = %self.data,
            "Notification dispatched"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_follows_severity() {
        assert!(NotificationType::GracePeriodExpired.priority() > NotificationType::PolicyExpired.priority());
        assert!(NotificationType::PolicyRenewal.priority() > NotificationType::RenewalReminder.priority());
    }

    #[tokio::test]
    async fn test_job_contract() {
        let job = NotificationJob::new(
            NotificationType::RenewalReminder,
            PolicyId::new(),
            CustomerId::new(),
            json!({"days_until_expiration": 10}),
        );
        assert_eq!(job.queue_name(), "notifications");
        assert_eq!(job.max_retries(), 3);
        assert_eq!(job.retry_backoff().delay(2), Duration::from_secs(60));
        assert!(job.perform(&Context::background()).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_attempt() {
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();
        let job = NotificationJob::new(NotificationType::PolicyExpired, PolicyId::new(), CustomerId::new(), Value::Null);
        assert!(matches!(job.perform(&ctx).await, Err(JobError::Cancelled(_))));
    }
}

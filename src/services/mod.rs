//! Services module for payment confirmation and deployment hand-off

pub mod confirmation_tracker;
pub mod deployment;
pub mod payment_service;
pub mod webhook_normalizer;

pub use confirmation_tracker::{ConfirmationTracker, TrackerConfig};
pub use deployment::{ChannelDeploymentTrigger, DeploymentTrigger, DeploymentWorker};
pub use payment_service::{PaymentService, VerifyOutcome};
pub use webhook_normalizer::WebhookNormalizer;

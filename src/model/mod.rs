pub mod artifact;
pub mod policy;
pub mod registry;

pub use artifact::{decode_base64, fetch_artifact, policy_from_bytes, policy_to_bytes, ArtifactPayload};
pub use policy::{capabilities, CapabilityReport, LinearPolicy, LinearPolicyTrainer, Policy, PolicyTrainer};
pub use registry::ModelRegistry;

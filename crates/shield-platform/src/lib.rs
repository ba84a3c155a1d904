//! shield-platform — the container-orchestration capabilities the control
//! plane depends on.
//!
//! The orchestrator only ever talks to a [`Platform`] trait object. Two
//! backends implement it:
//!
//! - [`KubePlatform`] maps every capability onto the Kubernetes API
//!   (deployments, pods, services, ingresses, claims, HPAs, jobs, cron
//!   jobs, secrets, and `metrics.k8s.io` for usage)
//! - [`MemoryPlatform`] keeps everything in process, materializes
//!   instances with generated names, and supports fault injection
//!
//! ```text
//! Orchestrator ──► Arc<dyn Platform>
//!                    ├── KubePlatform   (kube::Client, request timeout)
//!                    └── MemoryPlatform (tests, dry runs)
//! ```

pub mod convert;
pub mod error;
pub mod kubernetes;
pub mod memory;
pub mod platform;
pub mod types;

pub use error::{PlatformError, PlatformResult, PlatformResultExt};
pub use kubernetes::KubePlatform;
pub use memory::{MemoryPlatform, ResourceKind};
pub use platform::Platform;
pub use types::*;

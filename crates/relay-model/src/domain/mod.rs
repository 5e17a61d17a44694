mod ids;
pub use ids::{DeliveryToken, JobId, WorkerId};

mod env;
pub use env::{Env, EnvVar};

mod kind;
pub use kind::BackendKind;

pub use application::{Application, HttpApplication, ServiceApplication};
pub use loopback::{ActivationGuard, Loopback};

mod application;
mod loopback;

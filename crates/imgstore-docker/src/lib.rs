pub mod client;
pub mod docker;
pub mod executor;

pub use client::{BuildError, CheckResult, DockerClient, DoctorReport, NamedCheck};
pub use docker::DockerError;
pub use executor::{DOCKER_ENV, DockerExecutor, RealExecutor};

//! winsvc-bridge - Windows service control and service runtime bridge
//!
//! Two halves share this crate: [`ServiceManager`] drives the Service Control
//! Manager (enumerate, query, start, stop, create, change, remove), and
//! [`ServiceRuntime`] lets the current process register with the service
//! dispatcher and run as a service.

pub mod buffer;
pub mod client;
pub mod codec;
pub mod config;
pub mod consts;
pub mod error;
pub mod handle;
pub mod platform;
pub mod poller;
pub mod runtime;
pub mod scm;
pub mod types;

#[cfg(windows)]
pub mod windows_host;
#[cfg(windows)]
pub mod windows_scm;

#[cfg(test)]
mod fake;

pub use client::ServiceManager;
pub use config::Config;
pub use error::{OsError, Result, ServiceError};
pub use poller::Completion;
pub use runtime::{RuntimeHandle, RuntimeStatus, ServiceHandler, ServiceRuntime, StopAction};
pub use types::{
    ControlAccept, EnumeratedService, ErrorControl, ServiceConfig, ServiceConfigOptions,
    ServiceFlag, ServiceState, ServiceStatus, ServiceType, StartType, StateFilter, TypeFilter,
};

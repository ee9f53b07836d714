//! Bounded wait for a service to finish a start or stop transition
//!
//! Each wait runs on its own thread with its own SCM handles and reports
//! exactly once through the supplied completion.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::codec::decode_scalar;
use crate::config::Config;
use crate::consts::{SC_MANAGER_CONNECT, SERVICE_QUERY_STATUS};
use crate::error::{OsError, Result, ServiceError};
use crate::handle::ScHandle;
use crate::scm::ScmApi;
use crate::types::ServiceState;

/// Receives the outcome of a wait. Called exactly once, from the wait thread.
pub type Completion = Box<dyn FnOnce(Result<()>) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for WaitSettings {
    fn from(config: &Config) -> Self {
        Self {
            interval: config.poll_interval(),
            timeout: config.transition_timeout(),
        }
    }
}

/// Poll the status of `name` until it reaches `target`.
///
/// Fails with `UnexpectedState` as soon as the state is neither `target` nor
/// `expected`, and with `Timeout` once `settings.timeout` has elapsed.
pub fn wait_for_state<A: ScmApi + ?Sized>(
    api: &A,
    name: &str,
    expected: ServiceState,
    target: ServiceState,
    settings: WaitSettings,
) -> Result<()> {
    let manager = ScHandle::manager(api, SC_MANAGER_CONNECT)?;
    let service = manager.service(name, SERVICE_QUERY_STATUS)?;
    let started = Instant::now();

    loop {
        let raw = api
            .query_status(service.raw())
            .map_err(|e| ServiceError::os("QueryServiceStatusEx", e))?;
        let state: ServiceState = decode_scalar(raw.current_state);

        if state == target {
            return Ok(());
        }
        if state != expected {
            return Err(ServiceError::UnexpectedState {
                name: name.to_string(),
                state,
            });
        }
        if started.elapsed() > settings.timeout {
            return Err(ServiceError::Timeout {
                name: name.to_string(),
                target,
                seconds: settings.timeout.as_secs(),
            });
        }
        debug!("Service {} still {}, waiting for {}", name, state, target);
        thread::sleep(settings.interval);
    }
}

/// Run [`wait_for_state`] on a new thread and hand the outcome to `completion`.
pub fn spawn_wait<A: ScmApi>(
    api: Arc<A>,
    name: String,
    expected: ServiceState,
    target: ServiceState,
    settings: WaitSettings,
    completion: Completion,
) -> Result<()> {
    thread::Builder::new()
        .name(format!("svc-wait-{}", name))
        .spawn(move || {
            let outcome = wait_for_state(&*api, &name, expected, target, settings);
            match &outcome {
                Ok(()) => info!("Service {} reached {}", name, target),
                Err(e) => warn!("Waiting for service {} failed: {}", name, e),
            }
            completion(outcome);
        })
        .map(|_| ())
        .map_err(|e| ServiceError::os("CreateThread", OsError::from_io(&e)))
}

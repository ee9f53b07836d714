//! Service runtime bridge: lets the current process run as a Windows service
//!
//! The OS drives three threads into this module: the dispatcher thread that
//! [`ServiceRuntime::run`] spawns, the service entry point, and the control
//! handler. Application callbacks never run on those threads; they are queued
//! to a single worker thread that owns the [`ServiceHandler`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;

use log::{debug, error, info, warn};
use tokio::sync::{mpsc, oneshot};

use crate::codec::validate_name;
use crate::config::Config;
use crate::consts::{
    ERROR_PROCESS_ABORTED, ERROR_SERVICE_SPECIFIC_ERROR, NO_ERROR, SERVICE_ACCEPT_STOP,
};
use crate::error::{OsError, Result, ServiceError};
use crate::platform::{self, PlatformHost};
use crate::scm::OsResult;
use crate::types::ServiceState;

/// Control request delivered by the OS to the control handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCode {
    Stop,
    Interrogate,
    Other(u32),
}

/// Answer returned to the OS from the control handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerResult {
    NoError,
    NotImplemented,
}

/// What the runtime does once [`ServiceHandler::on_stop`] returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopAction {
    /// Shutdown is complete; report STOPPED with exit code 0.
    Stopped,
    /// The application reports the final status itself through
    /// [`RuntimeHandle::finish`] or by dropping the handle.
    Pending,
}

/// Status record passed to the OS on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeStatus {
    pub state: ServiceState,
    pub controls_accepted: u32,
    pub exit_code: u32,
    pub service_specific_exit_code: u32,
    pub checkpoint: u32,
    /// Milliseconds
    pub wait_hint: u32,
}

/// Service entry point handed to the dispatcher; receives the start arguments.
pub type ServiceEntry = Box<dyn Fn(Vec<String>) + Send + Sync>;

/// Control handler registered from inside the service entry point.
pub type ControlHandler = Box<dyn Fn(ControlCode) -> HandlerResult + Send + Sync>;

/// Sink for status reports, obtained when the control handler is registered.
pub trait StatusReporter: Send + Sync + 'static {
    fn set_status(&self, status: &RuntimeStatus) -> OsResult<()>;
}

/// The OS dispatcher surface.
pub trait ServiceHost: Send + Sync + 'static {
    type Reporter: StatusReporter;

    /// Connect to the service controller and block until the service process
    /// leaves service mode. The OS calls `entry` on its own thread.
    fn start_dispatcher(&self, name: &str, entry: ServiceEntry) -> OsResult<()>;

    fn register_control_handler(
        &self,
        name: &str,
        handler: ControlHandler,
    ) -> OsResult<Self::Reporter>;
}

/// Application code driven by the runtime.
///
/// Both callbacks run on the runtime's worker thread, in the order the OS
/// produced the events.
pub trait ServiceHandler: Send + 'static {
    /// Called once with the service start arguments, or with the error that
    /// kept the dispatcher from starting. Returning `Err` for the start
    /// arguments reports the service as stopped with a service-specific error.
    fn on_init(&mut self, init: Result<Vec<String>>) -> anyhow::Result<()>;

    /// Called at most once, after the OS asked the service to stop. STOP_PENDING
    /// has already been reported.
    fn on_stop(&mut self) -> StopAction {
        info!("Stop requested; no stop handling installed, stopping");
        StopAction::Stopped
    }
}

enum RuntimeEvent {
    Init {
        args: Vec<String>,
        reply: oneshot::Sender<anyhow::Result<()>>,
    },
    DispatcherFailed(ServiceError),
    Stop,
}

/// Once-per-process claim on the runtime
pub(crate) struct RuntimeSlot {
    claimed: AtomicBool,
}

impl RuntimeSlot {
    pub(crate) const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    fn claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

static PROCESS_SLOT: RuntimeSlot = RuntimeSlot::new();

struct StatusCell<R> {
    current: Option<RuntimeStatus>,
    reporter: Option<R>,
    stopped: bool,
}

struct RuntimeInstance<R> {
    name: String,
    cell: Mutex<StatusCell<R>>,
    events: mpsc::Sender<RuntimeEvent>,
    stop_requested: AtomicBool,
}

fn controls_for(state: ServiceState) -> u32 {
    match state {
        ServiceState::StartPending | ServiceState::Stopped => 0,
        _ => SERVICE_ACCEPT_STOP,
    }
}

impl<R: StatusReporter> RuntimeInstance<R> {
    fn new(name: &str, events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            name: name.to_string(),
            cell: Mutex::new(StatusCell {
                current: None,
                reporter: None,
                stopped: false,
            }),
            events,
            stop_requested: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StatusCell<R>> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn attach(&self, reporter: R) {
        self.lock().reporter = Some(reporter);
    }

    fn detach(&self) {
        self.lock().reporter = None;
    }

    /// Report `state` to the OS. Reports are serialized and STOPPED is final.
    fn report(&self, state: ServiceState, exit_code: u32, service_specific_exit_code: u32) {
        let mut cell = self.lock();
        if cell.stopped {
            debug!("Service {} already stopped, not reporting {}", self.name, state);
            return;
        }
        let status = RuntimeStatus {
            state,
            controls_accepted: controls_for(state),
            exit_code,
            service_specific_exit_code,
            checkpoint: 0,
            wait_hint: 0,
        };
        let result = match cell.reporter.as_ref() {
            Some(reporter) => reporter.set_status(&status),
            None => {
                debug!("Service {} has no status handle, not reporting {}", self.name, state);
                return;
            }
        };
        match result {
            Ok(()) => info!("Service {} reported {}", self.name, state),
            Err(e) => warn!("Failed to report {} for service {}: {}", state, self.name, e),
        }
        cell.current = Some(status);
        cell.stopped = state == ServiceState::Stopped;
    }

    fn handle_control(&self, code: ControlCode) -> HandlerResult {
        debug!("Service {} received control {:?}", self.name, code);
        match code {
            ControlCode::Stop => {
                if self.stop_requested.swap(true, Ordering::AcqRel) {
                    debug!("Ignoring repeated stop request for service {}", self.name);
                    return HandlerResult::NoError;
                }
                self.report(ServiceState::StopPending, NO_ERROR, 0);
                if self.events.blocking_send(RuntimeEvent::Stop).is_err() {
                    warn!("Callback worker for service {} is gone, stop not delivered", self.name);
                }
                HandlerResult::NoError
            }
            ControlCode::Interrogate => HandlerResult::NoError,
            ControlCode::Other(_) => HandlerResult::NotImplemented,
        }
    }
}

fn service_main<H: ServiceHost>(
    host: &H,
    instance: &Arc<RuntimeInstance<H::Reporter>>,
    args: Vec<String>,
) {
    let control_instance = Arc::clone(instance);
    let handler: ControlHandler = Box::new(move |code| control_instance.handle_control(code));
    let reporter = match host.register_control_handler(&instance.name, handler) {
        Ok(reporter) => reporter,
        Err(e) => {
            error!("Failed to register control handler for service {}: {}", instance.name, e);
            return;
        }
    };
    instance.attach(reporter);
    instance.report(ServiceState::StartPending, NO_ERROR, 0);

    let (reply, outcome) = oneshot::channel();
    if instance
        .events
        .blocking_send(RuntimeEvent::Init { args, reply })
        .is_err()
    {
        error!("Callback worker for service {} is gone", instance.name);
        instance.report(ServiceState::Stopped, ERROR_PROCESS_ABORTED, 0);
        return;
    }

    match outcome.blocking_recv() {
        Ok(Ok(())) => instance.report(ServiceState::Running, NO_ERROR, 0),
        Ok(Err(e)) => {
            error!("Service {} failed to initialize: {:#}", instance.name, e);
            instance.report(ServiceState::Stopped, ERROR_SERVICE_SPECIFIC_ERROR, 1);
        }
        Err(_) => {
            error!("Service {} initialization ended without a result", instance.name);
            instance.report(ServiceState::Stopped, ERROR_PROCESS_ABORTED, 0);
        }
    }
}

fn run_callbacks<S, R>(
    mut handler: S,
    mut events: mpsc::Receiver<RuntimeEvent>,
    instance: Weak<RuntimeInstance<R>>,
) where
    S: ServiceHandler,
    R: StatusReporter,
{
    while let Some(event) = events.blocking_recv() {
        match event {
            RuntimeEvent::Init { args, reply } => {
                let result = handler.on_init(Ok(args));
                if reply.send(result).is_err() {
                    warn!("Service entry point stopped waiting for initialization");
                }
            }
            RuntimeEvent::DispatcherFailed(err) => {
                if let Err(e) = handler.on_init(Err(err)) {
                    warn!("Initialization callback failed: {:#}", e);
                }
            }
            RuntimeEvent::Stop => match handler.on_stop() {
                StopAction::Stopped => match instance.upgrade() {
                    Some(instance) => instance.report(ServiceState::Stopped, NO_ERROR, 0),
                    None => debug!("Runtime already released, not reporting stop"),
                },
                StopAction::Pending => debug!("Stop handler will report the final status"),
            },
        }
    }
    debug!("Service callback worker exiting");
}

fn spawn_thread<F>(name: &str, f: F) -> Result<()>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map(|_| ())
        .map_err(|e| ServiceError::os("CreateThread", OsError::from_io(&e)))
}

pub(crate) fn run_in<H, S>(
    slot: &RuntimeSlot,
    host: Arc<H>,
    name: &str,
    handler: S,
    config: &Config,
) -> Result<RuntimeHandle<H>>
where
    H: ServiceHost,
    S: ServiceHandler,
{
    validate_name(name)?;
    if !slot.claim() {
        return Err(ServiceError::RuntimeMisuse(
            "the service runtime can only be started once per process".to_string(),
        ));
    }

    let (events, receiver) = mpsc::channel(config.event_queue_capacity.max(1));
    let instance = Arc::new(RuntimeInstance::new(name, events));

    let worker_instance = Arc::downgrade(&instance);
    spawn_thread("svc-callbacks", move || {
        run_callbacks(handler, receiver, worker_instance)
    })?;

    let dispatcher_instance = Arc::clone(&instance);
    spawn_thread("svc-dispatcher", move || {
        let entry_instance = Arc::clone(&dispatcher_instance);
        let entry_host = Arc::clone(&host);
        let entry: ServiceEntry =
            Box::new(move |args| service_main(&*entry_host, &entry_instance, args));

        info!("Starting service dispatcher for {}", dispatcher_instance.name);
        match host.start_dispatcher(&dispatcher_instance.name, entry) {
            Ok(()) => info!("Service dispatcher for {} returned", dispatcher_instance.name),
            Err(e) => {
                error!("Service dispatcher for {} failed: {}", dispatcher_instance.name, e);
                let failure = RuntimeEvent::DispatcherFailed(ServiceError::os(
                    "StartServiceCtrlDispatcher",
                    e,
                ));
                if dispatcher_instance.events.blocking_send(failure).is_err() {
                    warn!("Callback worker is gone, dispatcher failure not delivered");
                }
            }
        }
        dispatcher_instance.detach();
    })?;

    Ok(RuntimeHandle { instance })
}

/// Entry point for running the current process as a service
pub struct ServiceRuntime;

impl ServiceRuntime {
    /// Start the service dispatcher for `name` on a dedicated thread and drive
    /// `handler` from the OS events. May only be called once per process.
    #[must_use = "dropping the handle reports the service as stopped"]
    pub fn run<S: ServiceHandler>(name: &str, handler: S) -> Result<RuntimeHandle> {
        Self::run_with_config(name, handler, &Config::default())
    }

    #[must_use = "dropping the handle reports the service as stopped"]
    pub fn run_with_config<S: ServiceHandler>(
        name: &str,
        handler: S,
        config: &Config,
    ) -> Result<RuntimeHandle> {
        let host = platform::host()?;
        run_in(&PROCESS_SLOT, Arc::new(host), name, handler, config)
    }
}

/// Keeps the runtime reachable for the process-exit report.
///
/// Dropping the handle reports STOPPED unless a final status was already
/// reported. The exit code is 0, or `ERROR_PROCESS_ABORTED` while unwinding.
#[must_use = "dropping the handle reports the service as stopped"]
pub struct RuntimeHandle<H: ServiceHost = PlatformHost> {
    instance: Arc<RuntimeInstance<H::Reporter>>,
}

impl<H: ServiceHost> RuntimeHandle<H> {
    pub fn name(&self) -> &str {
        &self.instance.name
    }

    /// Last status reported to the OS, if any
    pub fn status(&self) -> Option<RuntimeStatus> {
        self.instance.lock().current
    }

    pub fn state(&self) -> Option<ServiceState> {
        self.status().map(|s| s.state)
    }

    /// Report the final STOPPED status with `exit_code`.
    pub fn finish(&self, exit_code: u32) {
        self.instance.report(ServiceState::Stopped, exit_code, 0);
    }

    /// Report STOPPED with `exit_code` and terminate the process.
    pub fn exit(self, exit_code: i32) -> ! {
        self.finish(exit_code as u32);
        std::process::exit(exit_code)
    }
}

impl<H: ServiceHost> Drop for RuntimeHandle<H> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.finish(ERROR_PROCESS_ABORTED);
        } else {
            self.finish(NO_ERROR);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::fake::FakeHost;
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Debug, PartialEq)]
    enum Seen {
        Init(Vec<String>),
        InitFailed(Option<u32>),
        Stop,
    }

    struct Recorder {
        seen: std_mpsc::Sender<Seen>,
        fail_init: bool,
    }

    impl ServiceHandler for Recorder {
        fn on_init(&mut self, init: Result<Vec<String>>) -> anyhow::Result<()> {
            match init {
                Ok(args) => {
                    self.seen.send(Seen::Init(args)).unwrap();
                    if self.fail_init {
                        anyhow::bail!("could not open data directory");
                    }
                    Ok(())
                }
                Err(e) => {
                    self.seen.send(Seen::InitFailed(e.os_code())).unwrap();
                    Err(e.into())
                }
            }
        }

        fn on_stop(&mut self) -> StopAction {
            self.seen.send(Seen::Stop).unwrap();
            StopAction::Pending
        }
    }

    struct InitOnly;

    impl ServiceHandler for InitOnly {
        fn on_init(&mut self, _init: Result<Vec<String>>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn start(
        slot: &RuntimeSlot,
        fail_init: bool,
    ) -> (Arc<FakeHost>, RuntimeHandle<FakeHost>, std_mpsc::Receiver<Seen>) {
        let host = FakeHost::new();
        let (tx, rx) = std_mpsc::channel();
        let handler = Recorder { seen: tx, fail_init };
        let handle =
            run_in(slot, Arc::clone(&host), "TestSvc", handler, &Config::default()).unwrap();
        (host, handle, rx)
    }

    fn states(host: &FakeHost) -> Vec<ServiceState> {
        host.reports().iter().map(|s| s.state).collect()
    }

    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = std::time::Instant::now() + WAIT;
        while std::time::Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    #[test]
    fn test_full_lifecycle() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc", "--verbose"]);

        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            Seen::Init(vec!["TestSvc".to_string(), "--verbose".to_string()])
        );
        assert_eq!(states(&host), vec![ServiceState::StartPending, ServiceState::Running]);
        let reports = host.reports();
        assert_eq!(reports[0].controls_accepted, 0);
        assert_eq!(reports[1].controls_accepted, SERVICE_ACCEPT_STOP);
        assert_eq!(handle.state(), Some(ServiceState::Running));

        assert_eq!(host.control(ControlCode::Interrogate), HandlerResult::NoError);
        assert_eq!(
            host.control(ControlCode::Other(SERVICE_CONTROL_PAUSE)),
            HandlerResult::NotImplemented
        );
        assert_eq!(host.reports().len(), 2);

        assert_eq!(host.control(ControlCode::Stop), HandlerResult::NoError);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Stop);
        assert_eq!(
            states(&host),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::StopPending
            ]
        );

        handle.finish(0);
        drop(handle);
        let reports = host.reports();
        assert_eq!(reports.len(), 4);
        assert_eq!(reports[3].state, ServiceState::Stopped);
        assert_eq!(reports[3].exit_code, 0);
        assert_eq!(reports[3].controls_accepted, 0);
    }

    #[test]
    fn test_stop_is_delivered_once() {
        let slot = RuntimeSlot::new();
        let (host, _handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        assert_eq!(host.control(ControlCode::Stop), HandlerResult::NoError);
        assert_eq!(host.control(ControlCode::Stop), HandlerResult::NoError);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), Seen::Stop);
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        let stop_pending = host
            .reports()
            .iter()
            .filter(|s| s.state == ServiceState::StopPending)
            .count();
        assert_eq!(stop_pending, 1);
    }

    #[test]
    fn test_second_run_is_rejected() {
        let slot = RuntimeSlot::new();
        let (_host, handle, _rx) = start(&slot, false);

        let err = run_in(&slot, FakeHost::new(), "Other", InitOnly, &Config::default())
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::RuntimeMisuse(_)));
        assert_eq!(handle.name(), "TestSvc");
    }

    #[test]
    fn test_invalid_name_does_not_claim_runtime() {
        let slot = RuntimeSlot::new();
        let err = run_in(&slot, FakeHost::new(), "bad\\name", InitOnly, &Config::default())
            .err()
            .unwrap();
        assert!(matches!(err, ServiceError::InvalidArgument(_)));

        assert!(run_in(&slot, FakeHost::new(), "Good", InitOnly, &Config::default()).is_ok());
    }

    #[test]
    fn test_exit_reports_stopped_without_stop_control() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        handle.finish(3);
        let last = *host.reports().last().unwrap();
        assert_eq!(last.state, ServiceState::Stopped);
        assert_eq!(last.exit_code, 3);

        drop(handle);
        assert_eq!(host.reports().len(), 3);
    }

    #[test]
    fn test_drop_reports_stopped() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        drop(handle);
        assert_eq!(
            states(&host),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::Stopped
            ]
        );
    }

    #[test]
    fn test_finish_before_launch_reports_nothing() {
        let slot = RuntimeSlot::new();
        let (host, handle, _rx) = start(&slot, false);
        host.wait_for_dispatcher();
        handle.finish(0);
        assert!(host.reports().is_empty());
        assert_eq!(handle.state(), None);
    }

    #[test]
    fn test_init_failure_reports_service_specific_stop() {
        let slot = RuntimeSlot::new();
        let (host, _handle, rx) = start(&slot, true);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        let reports = host.reports();
        assert_eq!(states(&host), vec![ServiceState::StartPending, ServiceState::Stopped]);
        assert_eq!(reports[1].exit_code, ERROR_SERVICE_SPECIFIC_ERROR);
        assert_eq!(reports[1].service_specific_exit_code, 1);
    }

    #[test]
    fn test_dispatcher_failure_reaches_init_callback() {
        let slot = RuntimeSlot::new();
        let host = FakeHost::new();
        host.fail_dispatcher(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT);
        let (tx, rx) = std_mpsc::channel();
        let handler = Recorder {
            seen: tx,
            fail_init: false,
        };
        let _handle =
            run_in(&slot, Arc::clone(&host), "TestSvc", handler, &Config::default()).unwrap();

        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            Seen::InitFailed(Some(ERROR_FAILED_SERVICE_CONTROLLER_CONNECT))
        );
        assert!(host.reports().is_empty());
    }

    #[test]
    fn test_register_failure_is_silent() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.fail_register(ERROR_ACCESS_DENIED);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);

        assert!(host.reports().is_empty());
        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(handle);
        assert!(host.reports().is_empty());
    }

    #[test]
    fn test_default_stop_handler_reports_stopped() {
        let slot = RuntimeSlot::new();
        let host = FakeHost::new();
        let handle =
            run_in(&slot, Arc::clone(&host), "Quiet", InitOnly, &Config::default()).unwrap();
        host.wait_for_dispatcher();
        host.launch(&["Quiet"]);

        assert_eq!(host.control(ControlCode::Stop), HandlerResult::NoError);
        assert!(wait_until(|| handle.state() == Some(ServiceState::Stopped)));
        assert_eq!(
            states(&host),
            vec![
                ServiceState::StartPending,
                ServiceState::Running,
                ServiceState::StopPending,
                ServiceState::Stopped
            ]
        );
        let last = *host.reports().last().unwrap();
        assert_eq!(last.exit_code, NO_ERROR);
        assert_eq!(last.controls_accepted, 0);

        drop(handle);
        assert_eq!(host.reports().len(), 4);
    }

    #[test]
    fn test_drop_while_panicking_reports_abort() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        let crashed = std::thread::spawn(move || {
            let _handle = handle;
            panic!("service main loop crashed");
        })
        .join();
        assert!(crashed.is_err());

        let last = *host.reports().last().unwrap();
        assert_eq!(last.state, ServiceState::Stopped);
        assert_eq!(last.exit_code, ERROR_PROCESS_ABORTED);
    }

    #[test]
    fn test_finish_after_dispatcher_returns_reports_nothing() {
        let slot = RuntimeSlot::new();
        let (host, handle, rx) = start(&slot, false);
        host.wait_for_dispatcher();
        host.launch(&["TestSvc"]);
        rx.recv_timeout(WAIT).unwrap();

        host.release_dispatcher();
        assert!(wait_until(|| handle.instance.lock().reporter.is_none()));

        handle.finish(0);
        drop(handle);
        assert_eq!(states(&host), vec![ServiceState::StartPending, ServiceState::Running]);
    }
}

//! Service dispatcher and control handler backed by `windows-service`

use std::ffi::OsString;
use std::sync::OnceLock;
use std::time::Duration;

use log::debug;
use windows_service::{
    define_windows_service, service_dispatcher,
    service::{
        ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState as WinServiceState,
        ServiceStatus, ServiceType,
    },
    service_control_handler::{self, ServiceControlHandlerResult, ServiceStatusHandle},
};

use crate::consts::{ERROR_SERVICE_ALREADY_RUNNING, ERROR_SERVICE_SPECIFIC_ERROR};
use crate::error::OsError;
use crate::runtime::{
    ControlCode, ControlHandler, HandlerResult, RuntimeStatus, ServiceEntry, ServiceHost,
    StatusReporter,
};
use crate::scm::OsResult;
use crate::types::ServiceState;

const ERROR_INVALID_PARAMETER: u32 = 87;

// The dispatcher takes a plain function pointer, so the entry point lives here.
static SERVICE_ENTRY: OnceLock<ServiceEntry> = OnceLock::new();

define_windows_service!(ffi_service_main, service_main);

fn service_main(arguments: Vec<OsString>) {
    let args = arguments
        .into_iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect();
    match SERVICE_ENTRY.get() {
        Some(entry) => entry(args),
        None => debug!("Service entry invoked before the dispatcher was started"),
    }
}

fn os_error(err: windows_service::Error) -> OsError {
    match err {
        windows_service::Error::Winapi(io) => OsError::from_io(&io),
        other => OsError::new(ERROR_INVALID_PARAMETER, other.to_string()),
    }
}

fn control_code(control: ServiceControl) -> ControlCode {
    match control {
        ServiceControl::Stop => ControlCode::Stop,
        ServiceControl::Interrogate => ControlCode::Interrogate,
        other => ControlCode::Other(other.raw_service_control_type()),
    }
}

fn win_state(state: ServiceState) -> WinServiceState {
    match state {
        ServiceState::StartPending => WinServiceState::StartPending,
        ServiceState::Running => WinServiceState::Running,
        ServiceState::StopPending => WinServiceState::StopPending,
        ServiceState::Paused => WinServiceState::Paused,
        ServiceState::PausePending => WinServiceState::PausePending,
        ServiceState::ContinuePending => WinServiceState::ContinuePending,
        ServiceState::Stopped | ServiceState::Unknown => WinServiceState::Stopped,
    }
}

/// Status handle returned by `RegisterServiceCtrlHandlerEx`
pub struct WindowsStatusReporter(ServiceStatusHandle);

impl StatusReporter for WindowsStatusReporter {
    fn set_status(&self, status: &RuntimeStatus) -> OsResult<()> {
        let exit_code = if status.exit_code == ERROR_SERVICE_SPECIFIC_ERROR {
            ServiceExitCode::ServiceSpecific(status.service_specific_exit_code)
        } else {
            ServiceExitCode::Win32(status.exit_code)
        };
        self.0
            .set_service_status(ServiceStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state: win_state(status.state),
                controls_accepted: ServiceControlAccept::from_bits_truncate(
                    status.controls_accepted,
                ),
                exit_code,
                checkpoint: status.checkpoint,
                wait_hint: Duration::from_millis(u64::from(status.wait_hint)),
                process_id: None,
            })
            .map_err(os_error)
    }
}

/// The Windows service dispatcher
#[derive(Debug, Default)]
pub struct WindowsHost;

impl WindowsHost {
    pub fn new() -> Self {
        WindowsHost
    }
}

impl ServiceHost for WindowsHost {
    type Reporter = WindowsStatusReporter;

    fn start_dispatcher(&self, name: &str, entry: ServiceEntry) -> OsResult<()> {
        SERVICE_ENTRY.set(entry).map_err(|_| {
            OsError::new(
                ERROR_SERVICE_ALREADY_RUNNING,
                "The service dispatcher was already started in this process.",
            )
        })?;
        service_dispatcher::start(name, ffi_service_main).map_err(os_error)
    }

    fn register_control_handler(
        &self,
        name: &str,
        handler: ControlHandler,
    ) -> OsResult<Self::Reporter> {
        let event_handler = move |control_event| -> ServiceControlHandlerResult {
            match handler(control_code(control_event)) {
                HandlerResult::NoError => ServiceControlHandlerResult::NoError,
                HandlerResult::NotImplemented => ServiceControlHandlerResult::NotImplemented,
            }
        };
        let status_handle =
            service_control_handler::register(name, event_handler).map_err(os_error)?;
        Ok(WindowsStatusReporter(status_handle))
    }
}

//! In-memory stand-ins for the SCM and the service dispatcher, used by tests

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::codec::encode_multi_string;
use crate::consts::*;
use crate::error::OsError;
use crate::runtime::{
    ControlCode, ControlHandler, HandlerResult, RuntimeStatus, ServiceEntry, ServiceHost,
    StatusReporter,
};
use crate::scm::{OsResult, RawConfig, RawConfigWrite, RawEnumEntry, RawHandle, RawStatus, ScmApi};

fn os_error(code: u32) -> OsError {
    let message = match code {
        ERROR_ACCESS_DENIED => "Access is denied.".to_string(),
        ERROR_SERVICE_DOES_NOT_EXIST => {
            "The specified service does not exist as an installed service.".to_string()
        }
        ERROR_SERVICE_NOT_ACTIVE => "The service has not been started.".to_string(),
        ERROR_SERVICE_ALREADY_RUNNING => {
            "An instance of the service is already running.".to_string()
        }
        ERROR_SERVICE_MARKED_FOR_DELETE => {
            "The specified service has been marked for deletion.".to_string()
        }
        ERROR_SERVICE_EXISTS => "The specified service already exists.".to_string(),
        other => format!("Fake error {}", other),
    };
    OsError::new(code, message)
}

#[derive(Debug, Clone)]
pub struct FakeService {
    pub name: String,
    pub config: RawConfig,
    pub description: Option<String>,
    pub status: RawStatus,
    /// States returned by successive status queries after a start
    pub on_start: Vec<u32>,
    /// States returned by successive status queries after a stop
    pub on_stop: Vec<u32>,
    script: VecDeque<u32>,
    marked_for_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HandleKind {
    Manager,
    Service(String),
}

#[derive(Default)]
struct FakeState {
    services: BTreeMap<String, FakeService>,
    handles: HashMap<usize, HandleKind>,
    next_handle: usize,
    failures: HashMap<&'static str, u32>,
    access_log: Vec<(String, u32)>,
    status_queries: usize,
}

/// A Service Control Manager kept in memory
#[derive(Default)]
pub struct FakeScm {
    state: Mutex<FakeState>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Install a stopped own-process service with demand start
    pub fn install_default(&self, name: &str) {
        let config = RawConfig {
            service_type: SERVICE_WIN32_OWN_PROCESS,
            start_type: SERVICE_DEMAND_START,
            error_control: SERVICE_ERROR_NORMAL,
            binary_path_name: Some(format!("C:\\Services\\{}.exe", name)),
            load_order_group: Some(String::new()),
            tag_id: 0,
            dependencies: vec![0, 0],
            service_start_name: Some("LocalSystem".to_string()),
            display_name: Some(format!("{} Service", name)),
        };
        let status = RawStatus {
            service_type: SERVICE_WIN32_OWN_PROCESS,
            current_state: SERVICE_STOPPED,
            ..RawStatus::default()
        };
        self.install(name, config, None, status);
    }

    pub fn install(
        &self,
        name: &str,
        config: RawConfig,
        description: Option<String>,
        status: RawStatus,
    ) {
        self.lock().services.insert(
            name.to_lowercase(),
            FakeService {
                name: name.to_string(),
                config,
                description,
                status,
                on_start: vec![SERVICE_RUNNING],
                on_stop: vec![SERVICE_STOPPED],
                script: VecDeque::new(),
                marked_for_delete: false,
            },
        );
    }

    pub fn with_service<R>(&self, name: &str, f: impl FnOnce(&mut FakeService) -> R) -> Option<R> {
        self.lock().services.get_mut(&name.to_lowercase()).map(f)
    }

    pub fn set_state(&self, name: &str, state: u32) {
        self.with_service(name, |s| s.status.current_state = state);
    }

    pub fn exists(&self, name: &str) -> bool {
        self.lock().services.contains_key(&name.to_lowercase())
    }

    /// Make the next call of `operation` fail with `code`
    pub fn fail_next(&self, operation: &'static str, code: u32) {
        self.lock().failures.insert(operation, code);
    }

    pub fn open_handles(&self) -> usize {
        self.lock().handles.len()
    }

    pub fn status_queries(&self) -> usize {
        self.lock().status_queries
    }

    /// `(operation, access mask)` for every handle opened so far
    pub fn access_log(&self) -> Vec<(String, u32)> {
        self.lock().access_log.clone()
    }

    fn check(state: &mut FakeState, operation: &'static str) -> OsResult<()> {
        match state.failures.remove(operation) {
            Some(code) => Err(os_error(code)),
            None => Ok(()),
        }
    }

    fn alloc(state: &mut FakeState, kind: HandleKind) -> RawHandle {
        state.next_handle += 1;
        let raw = state.next_handle;
        state.handles.insert(raw, kind);
        RawHandle(raw)
    }

    fn service_key(state: &FakeState, handle: RawHandle) -> OsResult<String> {
        match state.handles.get(&handle.0) {
            Some(HandleKind::Service(key)) => Ok(key.clone()),
            _ => Err(os_error(6)),
        }
    }

    fn service_mut<'s>(
        state: &'s mut FakeState,
        handle: RawHandle,
    ) -> OsResult<&'s mut FakeService> {
        let key = Self::service_key(state, handle)?;
        state
            .services
            .get_mut(&key)
            .ok_or_else(|| os_error(ERROR_SERVICE_DOES_NOT_EXIST))
    }

    fn apply_write(config: &mut RawConfig, write: &RawConfigWrite) {
        if write.service_type != SERVICE_NO_CHANGE {
            config.service_type = write.service_type;
        }
        if write.start_type != SERVICE_NO_CHANGE {
            config.start_type = write.start_type;
        }
        if write.error_control != SERVICE_NO_CHANGE {
            config.error_control = write.error_control;
        }
        if let Some(v) = &write.binary_path_name {
            config.binary_path_name = Some(v.clone());
        }
        if let Some(v) = &write.load_order_group {
            config.load_order_group = Some(v.clone());
        }
        if let Some(v) = &write.dependencies {
            config.dependencies = v.clone();
        }
        if let Some(v) = &write.service_start_name {
            config.service_start_name = Some(v.clone());
        }
        if let Some(v) = &write.display_name {
            config.display_name = Some(v.clone());
        }
    }
}

impl ScmApi for FakeScm {
    fn open_manager(&self, access: u32) -> OsResult<RawHandle> {
        let mut state = self.lock();
        Self::check(&mut state, "open_manager")?;
        state.access_log.push(("OpenSCManager".to_string(), access));
        Ok(Self::alloc(&mut state, HandleKind::Manager))
    }

    fn open_service(&self, manager: RawHandle, name: &str, access: u32) -> OsResult<RawHandle> {
        let mut state = self.lock();
        Self::check(&mut state, "open_service")?;
        if state.handles.get(&manager.0) != Some(&HandleKind::Manager) {
            return Err(os_error(6));
        }
        let key = name.to_lowercase();
        if !state.services.contains_key(&key) {
            return Err(os_error(ERROR_SERVICE_DOES_NOT_EXIST));
        }
        state.access_log.push((format!("OpenService:{}", name), access));
        Ok(Self::alloc(&mut state, HandleKind::Service(key)))
    }

    fn close_handle(&self, handle: RawHandle) {
        let mut state = self.lock();
        if let Some(HandleKind::Service(key)) = state.handles.remove(&handle.0) {
            let still_open = state
                .handles
                .values()
                .any(|kind| *kind == HandleKind::Service(key.clone()));
            let marked = state
                .services
                .get(&key)
                .map(|s| s.marked_for_delete)
                .unwrap_or(false);
            if marked && !still_open {
                state.services.remove(&key);
            }
        }
    }

    fn enum_services(
        &self,
        _manager: RawHandle,
        type_filter: u32,
        state_filter: u32,
    ) -> OsResult<Vec<RawEnumEntry>> {
        let mut state = self.lock();
        Self::check(&mut state, "enum_services")?;
        Ok(state
            .services
            .values()
            .filter(|s| s.status.service_type & type_filter != 0)
            .filter(|s| {
                let active = s.status.current_state != SERVICE_STOPPED;
                (active && state_filter & SERVICE_ACTIVE != 0)
                    || (!active && state_filter & SERVICE_INACTIVE != 0)
            })
            .map(|s| RawEnumEntry {
                name: s.name.clone(),
                display_name: s.config.display_name.clone(),
                status: s.status,
            })
            .collect())
    }

    fn query_config(&self, service: RawHandle) -> OsResult<RawConfig> {
        let mut state = self.lock();
        Self::check(&mut state, "query_config")?;
        Ok(Self::service_mut(&mut state, service)?.config.clone())
    }

    fn query_description(&self, service: RawHandle) -> OsResult<Option<String>> {
        let mut state = self.lock();
        Self::check(&mut state, "query_description")?;
        Ok(Self::service_mut(&mut state, service)?.description.clone())
    }

    fn query_status(&self, service: RawHandle) -> OsResult<RawStatus> {
        let mut state = self.lock();
        Self::check(&mut state, "query_status")?;
        state.status_queries += 1;
        let svc = Self::service_mut(&mut state, service)?;
        if let Some(next) = svc.script.pop_front() {
            svc.status.current_state = next;
        }
        Ok(svc.status)
    }

    fn start_service(&self, service: RawHandle, _args: &[String]) -> OsResult<()> {
        let mut state = self.lock();
        Self::check(&mut state, "start_service")?;
        let svc = Self::service_mut(&mut state, service)?;
        if svc.status.current_state != SERVICE_STOPPED {
            return Err(os_error(ERROR_SERVICE_ALREADY_RUNNING));
        }
        svc.status.current_state = SERVICE_START_PENDING;
        svc.script = svc.on_start.iter().copied().collect();
        Ok(())
    }

    fn control_service(&self, service: RawHandle, control: u32) -> OsResult<RawStatus> {
        let mut state = self.lock();
        Self::check(&mut state, "control_service")?;
        let svc = Self::service_mut(&mut state, service)?;
        if control != SERVICE_CONTROL_STOP {
            return Err(os_error(ERROR_CALL_NOT_IMPLEMENTED));
        }
        if svc.status.current_state == SERVICE_STOPPED {
            return Err(os_error(ERROR_SERVICE_NOT_ACTIVE));
        }
        svc.status.current_state = SERVICE_STOP_PENDING;
        svc.script = svc.on_stop.iter().copied().collect();
        Ok(svc.status)
    }

    fn change_config(&self, service: RawHandle, config: &RawConfigWrite) -> OsResult<()> {
        let mut state = self.lock();
        Self::check(&mut state, "change_config")?;
        let svc = Self::service_mut(&mut state, service)?;
        Self::apply_write(&mut svc.config, config);
        svc.status.service_type = svc.config.service_type;
        Ok(())
    }

    fn change_description(&self, service: RawHandle, description: &str) -> OsResult<()> {
        let mut state = self.lock();
        Self::check(&mut state, "change_description")?;
        Self::service_mut(&mut state, service)?.description = Some(description.to_string());
        Ok(())
    }

    fn create_service(
        &self,
        manager: RawHandle,
        name: &str,
        access: u32,
        config: &RawConfigWrite,
    ) -> OsResult<RawHandle> {
        let mut state = self.lock();
        Self::check(&mut state, "create_service")?;
        if state.handles.get(&manager.0) != Some(&HandleKind::Manager) {
            return Err(os_error(6));
        }
        let key = name.to_lowercase();
        if state.services.contains_key(&key) {
            return Err(os_error(ERROR_SERVICE_EXISTS));
        }
        let mut raw = RawConfig {
            dependencies: encode_multi_string::<&str>(&[]),
            ..RawConfig::default()
        };
        Self::apply_write(&mut raw, config);
        let status = RawStatus {
            service_type: raw.service_type,
            current_state: SERVICE_STOPPED,
            ..RawStatus::default()
        };
        drop(state);
        self.install(name, raw, None, status);

        let mut state = self.lock();
        state.access_log.push((format!("CreateService:{}", name), access));
        Ok(Self::alloc(&mut state, HandleKind::Service(key)))
    }

    fn delete_service(&self, service: RawHandle) -> OsResult<()> {
        let mut state = self.lock();
        Self::check(&mut state, "delete_service")?;
        let svc = Self::service_mut(&mut state, service)?;
        if svc.marked_for_delete {
            return Err(os_error(ERROR_SERVICE_MARKED_FOR_DELETE));
        }
        svc.marked_for_delete = true;
        Ok(())
    }
}

/// Status sink that records every report
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<RuntimeStatus>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<RuntimeStatus> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl StatusReporter for Arc<RecordingReporter> {
    fn set_status(&self, status: &RuntimeStatus) -> OsResult<()> {
        self.reports
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(*status);
        Ok(())
    }
}

/// Dispatcher stand-in: stores the entry point and control handler so a test
/// can play the OS side.
pub struct FakeHost {
    pub reporter: Arc<RecordingReporter>,
    entry: Mutex<Option<Arc<ServiceEntry>>>,
    handler: Mutex<Option<Arc<ControlHandler>>>,
    dispatcher_error: Mutex<Option<u32>>,
    register_error: Mutex<Option<u32>>,
    entered_tx: Mutex<Option<mpsc::Sender<()>>>,
    entered_rx: Mutex<mpsc::Receiver<()>>,
    release_tx: Mutex<Option<mpsc::Sender<()>>>,
    release_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        Arc::new(Self {
            reporter: Arc::new(RecordingReporter::default()),
            entry: Mutex::new(None),
            handler: Mutex::new(None),
            dispatcher_error: Mutex::new(None),
            register_error: Mutex::new(None),
            entered_tx: Mutex::new(Some(entered_tx)),
            entered_rx: Mutex::new(entered_rx),
            release_tx: Mutex::new(Some(release_tx)),
            release_rx: Mutex::new(Some(release_rx)),
        })
    }

    pub fn fail_dispatcher(&self, code: u32) {
        *self.dispatcher_error.lock().unwrap() = Some(code);
    }

    pub fn fail_register(&self, code: u32) {
        *self.register_error.lock().unwrap() = Some(code);
    }

    /// Block until the dispatcher thread has entered the dispatcher
    pub fn wait_for_dispatcher(&self) {
        let rx = self.entered_rx.lock().unwrap();
        rx.recv_timeout(std::time::Duration::from_secs(5))
            .expect("dispatcher was never started");
    }

    /// Play the OS invoking the service entry point on its own thread; returns
    /// once the entry point returns.
    pub fn launch(&self, args: &[&str]) {
        let entry = self
            .entry
            .lock()
            .unwrap()
            .clone()
            .expect("dispatcher not started");
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        std::thread::spawn(move || (*entry)(args))
            .join()
            .expect("service entry panicked");
    }

    /// Play the OS delivering a control code on its own thread
    pub fn control(&self, code: ControlCode) -> HandlerResult {
        let handler = self
            .handler
            .lock()
            .unwrap()
            .clone()
            .expect("control handler not registered");
        std::thread::spawn(move || (*handler)(code))
            .join()
            .expect("control handler panicked")
    }

    /// Let the blocked dispatcher call return
    pub fn release_dispatcher(&self) {
        self.release_tx.lock().unwrap().take();
    }

    pub fn reports(&self) -> Vec<RuntimeStatus> {
        self.reporter.reports()
    }
}

impl ServiceHost for FakeHost {
    type Reporter = Arc<RecordingReporter>;

    fn start_dispatcher(&self, _name: &str, entry: ServiceEntry) -> OsResult<()> {
        *self.entry.lock().unwrap() = Some(Arc::new(entry));
        if let Some(tx) = self.entered_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
        if let Some(code) = *self.dispatcher_error.lock().unwrap() {
            return Err(OsError::new(
                code,
                "The service process could not connect to the service controller.",
            ));
        }
        let release = self.release_rx.lock().unwrap().take();
        if let Some(rx) = release {
            let _ = rx.recv();
        }
        Ok(())
    }

    fn register_control_handler(
        &self,
        _name: &str,
        handler: ControlHandler,
    ) -> OsResult<Self::Reporter> {
        if let Some(code) = *self.register_error.lock().unwrap() {
            return Err(os_error(code));
        }
        *self.handler.lock().unwrap() = Some(Arc::new(handler));
        Ok(Arc::clone(&self.reporter))
    }
}

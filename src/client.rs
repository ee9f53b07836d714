//! Control-plane client for the Service Control Manager
//!
//! Every operation opens its own manager and service handles with the
//! narrowest access it needs and closes them before returning.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::oneshot;

use crate::codec::{
    config_from_raw, config_to_raw, decode_scalar, status_from_raw, validate_name, WriteMode,
};
use crate::config::Config;
use crate::consts::*;
use crate::error::{Result, ServiceError};
use crate::handle::ScHandle;
use crate::platform::{self, PlatformScm};
use crate::poller::{spawn_wait, Completion, WaitSettings};
use crate::scm::{RawEnumEntry, RawHandle, ScmApi};
use crate::types::{
    EnumeratedService, ServiceConfig, ServiceConfigOptions, ServiceState, ServiceStatus,
    StartType, StateFilter, TypeFilter,
};

pub struct ServiceManager<A: ScmApi = PlatformScm> {
    api: Arc<A>,
    wait: WaitSettings,
}

impl ServiceManager<PlatformScm> {
    /// Client for the local SCM with default settings
    pub fn new() -> Result<Self> {
        Self::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Result<Self> {
        let api = platform::scm()?;
        Ok(Self::with_api(Arc::new(api), config))
    }
}

impl<A: ScmApi> ServiceManager<A> {
    /// Client over an arbitrary control-plane backend
    pub fn with_api(api: Arc<A>, config: &Config) -> Self {
        Self {
            api,
            wait: WaitSettings::from(config),
        }
    }

    fn raw_enumerate(&self, types: &[TypeFilter], state: StateFilter) -> Result<Vec<RawEnumEntry>> {
        let type_mask = TypeFilter::mask(types);
        if type_mask == 0 {
            return Err(ServiceError::invalid("type filter must name at least one type"));
        }
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_ENUMERATE_SERVICE)?;
        self.api
            .enum_services(manager.raw(), type_mask, state.bits())
            .map_err(|e| ServiceError::os("EnumServicesStatusEx", e))
    }

    /// Names of the services matching the filters, in SCM order
    pub fn names(&self, types: &[TypeFilter], state: StateFilter) -> Result<Vec<String>> {
        let entries = self.raw_enumerate(types, state)?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Status and display name of every service matching the filters
    pub fn enumerate(
        &self,
        types: &[TypeFilter],
        state: StateFilter,
    ) -> Result<BTreeMap<String, EnumeratedService>> {
        let entries = self.raw_enumerate(types, state)?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let service = EnumeratedService {
                    status: status_from_raw(&entry.status),
                    display_name: entry.display_name.filter(|d| !d.is_empty()),
                };
                (entry.name, service)
            })
            .collect())
    }

    pub fn config(&self, name: &str) -> Result<ServiceConfig> {
        validate_name(name)?;
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
        let service = manager.service(name, SERVICE_QUERY_CONFIG)?;
        let raw = self
            .api
            .query_config(service.raw())
            .map_err(|e| ServiceError::os("QueryServiceConfig", e))?;
        let description = self
            .api
            .query_description(service.raw())
            .map_err(|e| ServiceError::os("QueryServiceConfig2", e))?;
        Ok(config_from_raw(raw, description))
    }

    pub fn status(&self, name: &str) -> Result<ServiceStatus> {
        validate_name(name)?;
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
        let service = manager.service(name, SERVICE_QUERY_STATUS)?;
        let raw = self
            .api
            .query_status(service.raw())
            .map_err(|e| ServiceError::os("QueryServiceStatusEx", e))?;
        Ok(status_from_raw(&raw))
    }

    /// Ask the SCM to start `name`.
    ///
    /// With a completion, a background wait from START_PENDING to RUNNING is
    /// started after the start request succeeds; this call does not block on it.
    pub fn start(&self, name: &str, completion: Option<Completion>) -> Result<()> {
        validate_name(name)?;
        {
            let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
            let service = manager.service(name, SERVICE_START)?;
            self.api
                .start_service(service.raw(), &[])
                .map_err(|e| ServiceError::os("StartService", e))?;
        }
        info!("Start requested for service {}", name);
        self.watch(name, ServiceState::StartPending, ServiceState::Running, completion)
    }

    /// Ask the SCM to stop `name`. A service that is not running counts as
    /// stopped.
    pub fn stop(&self, name: &str, completion: Option<Completion>) -> Result<()> {
        validate_name(name)?;
        {
            let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
            let service = manager.service(name, SERVICE_STOP)?;
            match self.api.control_service(service.raw(), SERVICE_CONTROL_STOP) {
                Ok(raw) => {
                    let state: ServiceState = decode_scalar(raw.current_state);
                    info!("Stop requested for service {} (now {})", name, state);
                }
                Err(e) if e.code == ERROR_SERVICE_NOT_ACTIVE => {
                    debug!("Service {} is not active, nothing to stop", name);
                }
                Err(e) => return Err(ServiceError::os("ControlService", e)),
            }
        }
        self.watch(name, ServiceState::StopPending, ServiceState::Stopped, completion)
    }

    fn watch(
        &self,
        name: &str,
        expected: ServiceState,
        target: ServiceState,
        completion: Option<Completion>,
    ) -> Result<()> {
        match completion {
            Some(completion) => spawn_wait(
                Arc::clone(&self.api),
                name.to_string(),
                expected,
                target,
                self.wait,
                completion,
            ),
            None => Ok(()),
        }
    }

    /// Start `name` and wait until it is RUNNING.
    pub async fn start_and_wait(&self, name: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.start(
            name,
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )?;
        Self::await_completion(name, rx).await
    }

    /// Stop `name` and wait until it is STOPPED.
    pub async fn stop_and_wait(&self, name: &str) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.stop(
            name,
            Some(Box::new(move |result| {
                let _ = tx.send(result);
            })),
        )?;
        Self::await_completion(name, rx).await
    }

    async fn await_completion(name: &str, rx: oneshot::Receiver<Result<()>>) -> Result<()> {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::WaitAbandoned {
                name: name.to_string(),
            }),
        }
    }

    /// Apply `options` to an existing service; omitted fields are unchanged.
    ///
    /// If the description cannot be written after the main change succeeded,
    /// the error is [`ServiceError::PartialWrite`].
    pub fn change(&self, name: &str, options: &ServiceConfigOptions) -> Result<()> {
        validate_name(name)?;
        let raw = config_to_raw(options, WriteMode::Change)?;
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
        let service = manager.service(name, SERVICE_CHANGE_CONFIG)?;
        self.api
            .change_config(service.raw(), &raw)
            .map_err(|e| ServiceError::os("ChangeServiceConfig", e))?;
        if let Some(description) = &options.description {
            self.write_description(service.raw(), description, "ChangeServiceConfig")?;
        }
        info!("Configuration of service {} changed", name);
        Ok(())
    }

    /// Register a new service. `options.binary_path_name` is required.
    pub fn create(&self, name: &str, options: &ServiceConfigOptions) -> Result<()> {
        validate_name(name)?;
        let raw = config_to_raw(options, WriteMode::Create)?;
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_CREATE_SERVICE)?;
        let handle = self
            .api
            .create_service(manager.raw(), name, SERVICE_CHANGE_CONFIG, &raw)
            .map_err(|e| ServiceError::os("CreateService", e))?;
        let service = ScHandle::wrap(&*self.api, handle);
        if let Some(description) = &options.description {
            self.write_description(service.raw(), description, "CreateService")?;
        }
        info!("Service {} created", name);
        Ok(())
    }

    fn write_description(
        &self,
        service: RawHandle,
        description: &str,
        primary: &'static str,
    ) -> Result<()> {
        self.api
            .change_description(service, description)
            .map_err(|e| ServiceError::PartialWrite {
                primary,
                operation: "ChangeServiceConfig2",
                message: e.message,
                code: e.code,
            })
    }

    /// Mark `name` for deletion. The SCM removes it once every open handle
    /// to it is closed.
    pub fn remove(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let manager = ScHandle::manager(&*self.api, SC_MANAGER_CONNECT)?;
        let service = manager.service(name, DELETE)?;
        self.api
            .delete_service(service.raw())
            .map_err(|e| ServiceError::os("DeleteService", e))?;
        info!("Service {} marked for deletion", name);
        Ok(())
    }

    /// Set the start type of `name` (usually `AutoStart` or `DemandStart`).
    pub fn enable(&self, name: &str, start_type: StartType) -> Result<()> {
        if start_type == StartType::Disabled {
            return Err(ServiceError::invalid("use disable() to disable a service"));
        }
        let options = ServiceConfigOptions {
            start_type: Some(start_type),
            ..ServiceConfigOptions::default()
        };
        self.change(name, &options)
    }

    pub fn disable(&self, name: &str) -> Result<()> {
        let options = ServiceConfigOptions {
            start_type: Some(StartType::Disabled),
            ..ServiceConfigOptions::default()
        };
        self.change(name, &options)
    }
}

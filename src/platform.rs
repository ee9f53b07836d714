//! Selection of the OS backends for the current target

use crate::error::Result;

#[cfg(windows)]
pub use crate::windows_host::WindowsHost as PlatformHost;
#[cfg(windows)]
pub use crate::windows_scm::WindowsScm as PlatformScm;

#[cfg(not(windows))]
pub use self::unsupported::{Unsupported as PlatformHost, Unsupported as PlatformScm};

/// Control-plane backend for this platform
pub fn scm() -> Result<PlatformScm> {
    #[cfg(windows)]
    {
        Ok(PlatformScm::new())
    }
    #[cfg(not(windows))]
    {
        Err(crate::error::ServiceError::unsupported_platform())
    }
}

/// Dispatcher backend for this platform
pub fn host() -> Result<PlatformHost> {
    #[cfg(windows)]
    {
        Ok(PlatformHost::new())
    }
    #[cfg(not(windows))]
    {
        Err(crate::error::ServiceError::unsupported_platform())
    }
}

#[cfg(not(windows))]
mod unsupported {
    use crate::runtime::{
        ControlHandler, RuntimeStatus, ServiceEntry, ServiceHost, StatusReporter,
    };
    use crate::scm::{
        OsResult, RawConfig, RawConfigWrite, RawEnumEntry, RawHandle, RawStatus, ScmApi,
    };

    /// Backend type with no values; no OS call can ever be made through it.
    #[derive(Debug)]
    pub enum Unsupported {}

    impl ScmApi for Unsupported {
        fn open_manager(&self, _access: u32) -> OsResult<RawHandle> {
            match *self {}
        }

        fn open_service(
            &self,
            _manager: RawHandle,
            _name: &str,
            _access: u32,
        ) -> OsResult<RawHandle> {
            match *self {}
        }

        fn close_handle(&self, _handle: RawHandle) {
            match *self {}
        }

        fn enum_services(
            &self,
            _manager: RawHandle,
            _type_filter: u32,
            _state_filter: u32,
        ) -> OsResult<Vec<RawEnumEntry>> {
            match *self {}
        }

        fn query_config(&self, _service: RawHandle) -> OsResult<RawConfig> {
            match *self {}
        }

        fn query_description(&self, _service: RawHandle) -> OsResult<Option<String>> {
            match *self {}
        }

        fn query_status(&self, _service: RawHandle) -> OsResult<RawStatus> {
            match *self {}
        }

        fn start_service(&self, _service: RawHandle, _args: &[String]) -> OsResult<()> {
            match *self {}
        }

        fn control_service(&self, _service: RawHandle, _control: u32) -> OsResult<RawStatus> {
            match *self {}
        }

        fn change_config(&self, _service: RawHandle, _config: &RawConfigWrite) -> OsResult<()> {
            match *self {}
        }

        fn change_description(&self, _service: RawHandle, _description: &str) -> OsResult<()> {
            match *self {}
        }

        fn create_service(
            &self,
            _manager: RawHandle,
            _name: &str,
            _access: u32,
            _config: &RawConfigWrite,
        ) -> OsResult<RawHandle> {
            match *self {}
        }

        fn delete_service(&self, _service: RawHandle) -> OsResult<()> {
            match *self {}
        }
    }

    impl StatusReporter for Unsupported {
        fn set_status(&self, _status: &RuntimeStatus) -> OsResult<()> {
            match *self {}
        }
    }

    impl ServiceHost for Unsupported {
        type Reporter = Unsupported;

        fn start_dispatcher(&self, _name: &str, _entry: ServiceEntry) -> OsResult<()> {
            match *self {}
        }

        fn register_control_handler(
            &self,
            _name: &str,
            _handler: ControlHandler,
        ) -> OsResult<Self::Reporter> {
            match *self {}
        }
    }
}

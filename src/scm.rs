//! The OS control-plane surface consumed by the client.
//!
//! `ScmApi` is a thin, record-level view of the Service Control Manager:
//! every method maps to one OS call and returns raw values. Translation into
//! structured records happens in [`crate::codec`].

use crate::error::OsError;

pub type OsResult<T> = std::result::Result<T, OsError>;

/// Opaque manager or service handle issued by the OS.
///
/// Only ever held through [`crate::handle::ScHandle`], which closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RawHandle(pub usize);

/// Raw `SERVICE_STATUS_PROCESS` record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RawStatus {
    pub service_type: u32,
    pub current_state: u32,
    pub controls_accepted: u32,
    pub win32_exit_code: u32,
    pub service_specific_exit_code: u32,
    pub checkpoint: u32,
    pub wait_hint: u32,
    pub process_id: u32,
    pub service_flags: u32,
}

/// Raw `ENUM_SERVICE_STATUS_PROCESS` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEnumEntry {
    pub name: String,
    pub display_name: Option<String>,
    pub status: RawStatus,
}

/// Raw `QUERY_SERVICE_CONFIG` record. Strings are `None` where the OS
/// returned a null pointer; dependencies keep the double-null-terminated
/// UTF-16 layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfig {
    pub service_type: u32,
    pub start_type: u32,
    pub error_control: u32,
    pub binary_path_name: Option<String>,
    pub load_order_group: Option<String>,
    pub tag_id: u32,
    pub dependencies: Vec<u16>,
    pub service_start_name: Option<String>,
    pub display_name: Option<String>,
}

/// Arguments of `ChangeServiceConfig`/`CreateService`. Scalars use
/// `SERVICE_NO_CHANGE` and strings use `None` for "leave unchanged".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConfigWrite {
    pub service_type: u32,
    pub start_type: u32,
    pub error_control: u32,
    pub binary_path_name: Option<String>,
    pub load_order_group: Option<String>,
    pub dependencies: Option<Vec<u16>>,
    pub service_start_name: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

/// Service Control Manager calls.
///
/// Implementations must be callable from any thread; handles themselves are
/// never moved between threads by the client.
pub trait ScmApi: Send + Sync + 'static {
    fn open_manager(&self, access: u32) -> OsResult<RawHandle>;

    fn open_service(&self, manager: RawHandle, name: &str, access: u32) -> OsResult<RawHandle>;

    fn close_handle(&self, handle: RawHandle);

    fn enum_services(
        &self,
        manager: RawHandle,
        type_filter: u32,
        state_filter: u32,
    ) -> OsResult<Vec<RawEnumEntry>>;

    fn query_config(&self, service: RawHandle) -> OsResult<RawConfig>;

    /// `QueryServiceConfig2(SERVICE_CONFIG_DESCRIPTION)`; `None` when no
    /// description is set.
    fn query_description(&self, service: RawHandle) -> OsResult<Option<String>>;

    fn query_status(&self, service: RawHandle) -> OsResult<RawStatus>;

    fn start_service(&self, service: RawHandle, args: &[String]) -> OsResult<()>;

    fn control_service(&self, service: RawHandle, control: u32) -> OsResult<RawStatus>;

    fn change_config(&self, service: RawHandle, config: &RawConfigWrite) -> OsResult<()>;

    /// `ChangeServiceConfig2(SERVICE_CONFIG_DESCRIPTION)`
    fn change_description(&self, service: RawHandle, description: &str) -> OsResult<()>;

    fn create_service(
        &self,
        manager: RawHandle,
        name: &str,
        access: u32,
        config: &RawConfigWrite,
    ) -> OsResult<RawHandle>;

    fn delete_service(&self, service: RawHandle) -> OsResult<()>;
}

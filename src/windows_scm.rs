//! Service Control Manager access through the Win32 API

use std::ffi::OsStr;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use std::slice;

use log::warn;
use winapi::shared::minwindef::{DWORD, FALSE, LPVOID};
use winapi::shared::winerror::{ERROR_INSUFFICIENT_BUFFER, ERROR_MORE_DATA};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::winbase::{
    FormatMessageW, FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS,
};
use winapi::um::winnt::{LPCWSTR, LPWSTR};
use winapi::um::winsvc::{
    ChangeServiceConfig2W, ChangeServiceConfigW, CloseServiceHandle, ControlService,
    CreateServiceW, DeleteService, EnumServicesStatusExW, OpenSCManagerW, OpenServiceW,
    QueryServiceConfig2W, QueryServiceConfigW, QueryServiceStatusEx, StartServiceW,
    ENUM_SERVICE_STATUS_PROCESSW, LPQUERY_SERVICE_CONFIGW, QUERY_SERVICE_CONFIGW,
    SC_ENUM_PROCESS_INFO, SC_HANDLE, SC_STATUS_PROCESS_INFO, SERVICE_CONFIG_DESCRIPTION,
    SERVICE_DESCRIPTIONW, SERVICE_STATUS, SERVICE_STATUS_PROCESS,
};

use crate::buffer::{query_with_capacity, QueryBuffer};
use crate::error::OsError;
use crate::scm::{OsResult, RawConfig, RawConfigWrite, RawEnumEntry, RawHandle, RawStatus, ScmApi};

/// The local Service Control Manager
#[derive(Debug, Default)]
pub struct WindowsScm;

impl WindowsScm {
    pub fn new() -> Self {
        WindowsScm
    }
}

fn to_wide(value: &str) -> Vec<u16> {
    OsStr::new(value).encode_wide().chain(Some(0)).collect()
}

fn to_wide_opt(value: &Option<String>) -> Option<Vec<u16>> {
    value.as_deref().map(to_wide)
}

fn wide_ptr(value: &Option<Vec<u16>>) -> LPCWSTR {
    value.as_ref().map_or(ptr::null(), |v| v.as_ptr())
}

/// Copy a NUL-terminated UTF-16 string; `None` for a null pointer.
unsafe fn from_wide_ptr(value: *const u16) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let mut len = 0;
    while *value.add(len) != 0 {
        len += 1;
    }
    Some(String::from_utf16_lossy(slice::from_raw_parts(value, len)))
}

/// Copy a double-NUL-terminated multi-string, terminators included.
unsafe fn multi_string_from_ptr(value: *const u16) -> Vec<u16> {
    if value.is_null() {
        return vec![0];
    }
    let mut end = 0;
    loop {
        let mut len = 0;
        while *value.add(end + len) != 0 {
            len += 1;
        }
        end += len + 1;
        if len == 0 {
            break;
        }
    }
    slice::from_raw_parts(value, end).to_vec()
}

fn system_message(code: DWORD) -> String {
    let mut buffer = [0u16; 512];
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_FROM_SYSTEM | FORMAT_MESSAGE_IGNORE_INSERTS,
            ptr::null(),
            code,
            0,
            buffer.as_mut_ptr(),
            buffer.len() as DWORD,
            ptr::null_mut(),
        )
    };
    if len == 0 {
        return format!("Unknown error {}", code);
    }
    String::from_utf16_lossy(&buffer[..len as usize])
        .trim_end()
        .to_string()
}

fn os_error(code: DWORD) -> OsError {
    OsError::new(code, system_message(code))
}

fn last_error() -> DWORD {
    unsafe { GetLastError() }
}

fn last_os_error() -> OsError {
    os_error(last_error())
}

fn sc(handle: RawHandle) -> SC_HANDLE {
    handle.0 as SC_HANDLE
}

fn checked(handle: SC_HANDLE) -> OsResult<RawHandle> {
    if handle.is_null() {
        Err(last_os_error())
    } else {
        Ok(RawHandle(handle as usize))
    }
}

fn status_process(status: &SERVICE_STATUS_PROCESS) -> RawStatus {
    RawStatus {
        service_type: status.dwServiceType,
        current_state: status.dwCurrentState,
        controls_accepted: status.dwControlsAccepted,
        win32_exit_code: status.dwWin32ExitCode,
        service_specific_exit_code: status.dwServiceSpecificExitCode,
        checkpoint: status.dwCheckPoint,
        wait_hint: status.dwWaitHint,
        process_id: status.dwProcessId,
        service_flags: status.dwServiceFlags,
    }
}

fn status_basic(status: &SERVICE_STATUS) -> RawStatus {
    RawStatus {
        service_type: status.dwServiceType,
        current_state: status.dwCurrentState,
        controls_accepted: status.dwControlsAccepted,
        win32_exit_code: status.dwWin32ExitCode,
        service_specific_exit_code: status.dwServiceSpecificExitCode,
        checkpoint: status.dwCheckPoint,
        wait_hint: status.dwWaitHint,
        process_id: 0,
        service_flags: 0,
    }
}

/// Wide-string arguments of a config write, kept alive across the call
struct WideConfig {
    binary_path_name: Option<Vec<u16>>,
    load_order_group: Option<Vec<u16>>,
    dependencies: Option<Vec<u16>>,
    service_start_name: Option<Vec<u16>>,
    password: Option<Vec<u16>>,
    display_name: Option<Vec<u16>>,
}

impl WideConfig {
    fn new(config: &RawConfigWrite) -> Self {
        Self {
            binary_path_name: to_wide_opt(&config.binary_path_name),
            load_order_group: to_wide_opt(&config.load_order_group),
            dependencies: config.dependencies.clone(),
            service_start_name: to_wide_opt(&config.service_start_name),
            password: to_wide_opt(&config.password),
            display_name: to_wide_opt(&config.display_name),
        }
    }
}

impl ScmApi for WindowsScm {
    fn open_manager(&self, access: u32) -> OsResult<RawHandle> {
        checked(unsafe { OpenSCManagerW(ptr::null(), ptr::null(), access) })
    }

    fn open_service(&self, manager: RawHandle, name: &str, access: u32) -> OsResult<RawHandle> {
        let name = to_wide(name);
        checked(unsafe { OpenServiceW(sc(manager), name.as_ptr(), access) })
    }

    fn close_handle(&self, handle: RawHandle) {
        if unsafe { CloseServiceHandle(sc(handle)) } == FALSE {
            warn!("CloseServiceHandle failed: {}", last_os_error());
        }
    }

    fn enum_services(
        &self,
        manager: RawHandle,
        type_filter: u32,
        state_filter: u32,
    ) -> OsResult<Vec<RawEnumEntry>> {
        let mut buffer = QueryBuffer::new();
        let mut count: DWORD = 0;
        query_with_capacity(
            &mut buffer,
            |buf, required| {
                let ok = unsafe {
                    EnumServicesStatusExW(
                        sc(manager),
                        SC_ENUM_PROCESS_INFO,
                        type_filter,
                        state_filter,
                        buf.as_mut_ptr(),
                        buf.len() as DWORD,
                        required,
                        &mut count,
                        ptr::null_mut(),
                        ptr::null(),
                    )
                };
                if ok == FALSE {
                    Err(last_error())
                } else {
                    Ok(())
                }
            },
            |code| code == ERROR_MORE_DATA,
            os_error,
        )?;

        let records = buffer.as_ptr() as *const ENUM_SERVICE_STATUS_PROCESSW;
        let entries = (0..count as usize)
            .map(|i| unsafe {
                let record = &*records.add(i);
                RawEnumEntry {
                    name: from_wide_ptr(record.lpServiceName).unwrap_or_default(),
                    display_name: from_wide_ptr(record.lpDisplayName),
                    status: status_process(&record.ServiceStatusProcess),
                }
            })
            .collect();
        Ok(entries)
    }

    fn query_config(&self, service: RawHandle) -> OsResult<RawConfig> {
        let mut buffer = QueryBuffer::new();
        query_with_capacity(
            &mut buffer,
            |buf, required| {
                let ok = unsafe {
                    QueryServiceConfigW(
                        sc(service),
                        buf.as_mut_ptr() as LPQUERY_SERVICE_CONFIGW,
                        buf.len() as DWORD,
                        required,
                    )
                };
                if ok == FALSE {
                    Err(last_error())
                } else {
                    Ok(())
                }
            },
            |code| code == ERROR_INSUFFICIENT_BUFFER,
            os_error,
        )?;

        let config = unsafe { &*(buffer.as_ptr() as *const QUERY_SERVICE_CONFIGW) };
        Ok(unsafe {
            RawConfig {
                service_type: config.dwServiceType,
                start_type: config.dwStartType,
                error_control: config.dwErrorControl,
                binary_path_name: from_wide_ptr(config.lpBinaryPathName),
                load_order_group: from_wide_ptr(config.lpLoadOrderGroup),
                tag_id: config.dwTagId,
                dependencies: multi_string_from_ptr(config.lpDependencies),
                service_start_name: from_wide_ptr(config.lpServiceStartName),
                display_name: from_wide_ptr(config.lpDisplayName),
            }
        })
    }

    fn query_description(&self, service: RawHandle) -> OsResult<Option<String>> {
        let mut buffer = QueryBuffer::new();
        query_with_capacity(
            &mut buffer,
            |buf, required| {
                let ok = unsafe {
                    QueryServiceConfig2W(
                        sc(service),
                        SERVICE_CONFIG_DESCRIPTION,
                        buf.as_mut_ptr(),
                        buf.len() as DWORD,
                        required,
                    )
                };
                if ok == FALSE {
                    Err(last_error())
                } else {
                    Ok(())
                }
            },
            |code| code == ERROR_INSUFFICIENT_BUFFER,
            os_error,
        )?;

        if buffer.is_empty() {
            return Ok(None);
        }
        let description = unsafe { &*(buffer.as_ptr() as *const SERVICE_DESCRIPTIONW) };
        Ok(unsafe { from_wide_ptr(description.lpDescription) })
    }

    fn query_status(&self, service: RawHandle) -> OsResult<RawStatus> {
        let mut status: SERVICE_STATUS_PROCESS = unsafe { mem::zeroed() };
        let mut needed: DWORD = 0;
        let ok = unsafe {
            QueryServiceStatusEx(
                sc(service),
                SC_STATUS_PROCESS_INFO,
                &mut status as *mut SERVICE_STATUS_PROCESS as *mut u8,
                mem::size_of::<SERVICE_STATUS_PROCESS>() as DWORD,
                &mut needed,
            )
        };
        if ok == FALSE {
            return Err(last_os_error());
        }
        Ok(status_process(&status))
    }

    fn start_service(&self, service: RawHandle, args: &[String]) -> OsResult<()> {
        let wide: Vec<Vec<u16>> = args.iter().map(|a| to_wide(a)).collect();
        let mut pointers: Vec<LPCWSTR> = wide.iter().map(|w| w.as_ptr()).collect();
        let vectors = if pointers.is_empty() {
            ptr::null_mut()
        } else {
            pointers.as_mut_ptr()
        };
        let ok = unsafe { StartServiceW(sc(service), pointers.len() as DWORD, vectors) };
        if ok == FALSE {
            return Err(last_os_error());
        }
        Ok(())
    }

    fn control_service(&self, service: RawHandle, control: u32) -> OsResult<RawStatus> {
        let mut status: SERVICE_STATUS = unsafe { mem::zeroed() };
        if unsafe { ControlService(sc(service), control, &mut status) } == FALSE {
            return Err(last_os_error());
        }
        Ok(status_basic(&status))
    }

    fn change_config(&self, service: RawHandle, config: &RawConfigWrite) -> OsResult<()> {
        let wide = WideConfig::new(config);
        let ok = unsafe {
            ChangeServiceConfigW(
                sc(service),
                config.service_type,
                config.start_type,
                config.error_control,
                wide_ptr(&wide.binary_path_name),
                wide_ptr(&wide.load_order_group),
                ptr::null_mut(),
                wide_ptr(&wide.dependencies),
                wide_ptr(&wide.service_start_name),
                wide_ptr(&wide.password),
                wide_ptr(&wide.display_name),
            )
        };
        if ok == FALSE {
            return Err(last_os_error());
        }
        Ok(())
    }

    fn change_description(&self, service: RawHandle, description: &str) -> OsResult<()> {
        let mut text = to_wide(description);
        let mut info = SERVICE_DESCRIPTIONW {
            lpDescription: text.as_mut_ptr() as LPWSTR,
        };
        let ok = unsafe {
            ChangeServiceConfig2W(
                sc(service),
                SERVICE_CONFIG_DESCRIPTION,
                &mut info as *mut SERVICE_DESCRIPTIONW as LPVOID,
            )
        };
        if ok == FALSE {
            return Err(last_os_error());
        }
        Ok(())
    }

    fn create_service(
        &self,
        manager: RawHandle,
        name: &str,
        access: u32,
        config: &RawConfigWrite,
    ) -> OsResult<RawHandle> {
        let name = to_wide(name);
        let wide = WideConfig::new(config);
        checked(unsafe {
            CreateServiceW(
                sc(manager),
                name.as_ptr(),
                wide_ptr(&wide.display_name),
                access,
                config.service_type,
                config.start_type,
                config.error_control,
                wide_ptr(&wide.binary_path_name),
                wide_ptr(&wide.load_order_group),
                ptr::null_mut(),
                wide_ptr(&wide.dependencies),
                wide_ptr(&wide.service_start_name),
                wide_ptr(&wide.password),
            )
        })
    }

    fn delete_service(&self, service: RawHandle) -> OsResult<()> {
        if unsafe { DeleteService(sc(service)) } == FALSE {
            return Err(last_os_error());
        }
        Ok(())
    }
}

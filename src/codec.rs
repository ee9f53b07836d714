//! Translation between raw SCM records and structured service records

use crate::consts::*;
use crate::error::{Result, ServiceError};
use crate::scm::{RawConfig, RawConfigWrite, RawStatus};
use crate::types::{
    NamedFlag, NamedScalar, ServiceConfig, ServiceConfigOptions, ServiceStatus, ServiceType,
};

/// Longest service name the SCM accepts, in UTF-16 units
const MAX_SERVICE_NAME_LEN: usize = 256;

/// Named members of a raw flag mask, in table order. Unknown bits are dropped.
pub fn decode_flags<F: NamedFlag>(bits: u32) -> Vec<F> {
    F::TABLE
        .iter()
        .filter(|(bit, _)| bits & bit != 0)
        .map(|&(_, flag)| flag)
        .collect()
}

pub fn encode_flags<F: NamedFlag + PartialEq>(flags: &[F]) -> u32 {
    F::TABLE
        .iter()
        .filter(|(_, flag)| flags.contains(flag))
        .fold(0, |mask, (bit, _)| mask | bit)
}

/// Named value of a raw scalar; values outside the table map to `UNKNOWN`.
pub fn decode_scalar<S: NamedScalar>(raw: u32) -> S {
    S::TABLE
        .iter()
        .find(|(value, _)| *value == raw)
        .map(|&(_, named)| named)
        .unwrap_or(S::UNKNOWN)
}

pub fn encode_scalar<S: NamedScalar>(value: S) -> Option<u32> {
    S::TABLE
        .iter()
        .find(|(_, named)| *named == value)
        .map(|&(raw, _)| raw)
}

/// Join strings into a double-null-terminated UTF-16 multi-string:
/// one NUL after each entry, then the terminating empty entry.
pub fn encode_multi_string<S: AsRef<str>>(entries: &[S]) -> Vec<u16> {
    let mut out = Vec::new();
    for entry in entries {
        out.extend(entry.as_ref().encode_utf16());
        out.push(0);
    }
    out.push(0);
    out
}

/// Split a double-null-terminated UTF-16 multi-string. Decoding stops at the
/// first empty entry or at the end of the slice.
pub fn decode_multi_string(raw: &[u16]) -> Vec<String> {
    raw.split(|&c| c == 0)
        .take_while(|entry| !entry.is_empty())
        .map(String::from_utf16_lossy)
        .collect()
}

pub fn status_from_raw(raw: &RawStatus) -> ServiceStatus {
    ServiceStatus {
        service_type: decode_flags(raw.service_type),
        state: decode_scalar(raw.current_state),
        controls_accepted: decode_flags(raw.controls_accepted),
        exit_code: raw.win32_exit_code,
        service_specific_exit_code: (raw.win32_exit_code == ERROR_SERVICE_SPECIFIC_ERROR)
            .then_some(raw.service_specific_exit_code),
        checkpoint: raw.checkpoint,
        wait_hint: raw.wait_hint,
        process_id: raw.process_id,
        service_flags: decode_flags(raw.service_flags),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Merge the primary config record and the description into one record.
/// Empty strings are reported as absent.
pub fn config_from_raw(raw: RawConfig, description: Option<String>) -> ServiceConfig {
    ServiceConfig {
        service_type: decode_flags(raw.service_type),
        start_type: decode_scalar(raw.start_type),
        error_control: decode_scalar(raw.error_control),
        binary_path_name: non_empty(raw.binary_path_name),
        load_order_group: non_empty(raw.load_order_group),
        tag_id: raw.tag_id,
        dependencies: decode_multi_string(&raw.dependencies),
        service_start_name: non_empty(raw.service_start_name),
        display_name: non_empty(raw.display_name),
        description: non_empty(description),
    }
}

/// Which write call the record is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Omitted fields are left unchanged
    Change,
    /// Omitted fields take their creation defaults
    Create,
}

fn check_text(field: &str, value: &Option<String>) -> Result<()> {
    match value {
        Some(v) if v.contains('\0') => Err(ServiceError::invalid(format!(
            "{} must not contain NUL characters",
            field
        ))),
        _ => Ok(()),
    }
}

/// Build the raw write record for `change` or `create`.
///
/// Defaults on create: own-process win32 service, automatic start, normal
/// error control. `binary_path_name` is mandatory on create.
pub fn config_to_raw(options: &ServiceConfigOptions, mode: WriteMode) -> Result<RawConfigWrite> {
    let service_type = match &options.service_type {
        Some(types) if types.is_empty() => {
            return Err(ServiceError::invalid("serviceType must name at least one type"));
        }
        Some(types) => encode_flags(types),
        None => match mode {
            WriteMode::Change => SERVICE_NO_CHANGE,
            WriteMode::Create => ServiceType::Win32OwnProcess.bits(),
        },
    };

    let start_type = match options.start_type {
        Some(start_type) => encode_scalar(start_type)
            .ok_or_else(|| ServiceError::invalid("startType UNKNOWN cannot be written"))?,
        None => match mode {
            WriteMode::Change => SERVICE_NO_CHANGE,
            WriteMode::Create => SERVICE_AUTO_START,
        },
    };

    let error_control = match options.error_control {
        Some(error_control) => encode_scalar(error_control)
            .ok_or_else(|| ServiceError::invalid("errorControl UNKNOWN cannot be written"))?,
        None => match mode {
            WriteMode::Change => SERVICE_NO_CHANGE,
            WriteMode::Create => SERVICE_ERROR_NORMAL,
        },
    };

    if mode == WriteMode::Create && options.binary_path_name.is_none() {
        return Err(ServiceError::invalid(
            "binaryPathName is required to create a service",
        ));
    }

    check_text("binaryPathName", &options.binary_path_name)?;
    check_text("loadOrderGroup", &options.load_order_group)?;
    check_text("serviceStartName", &options.service_start_name)?;
    check_text("password", &options.password)?;
    check_text("displayName", &options.display_name)?;
    check_text("description", &options.description)?;

    let dependencies = match &options.dependencies {
        Some(deps) => {
            if let Some(bad) = deps.iter().find(|d| d.is_empty() || d.contains('\0')) {
                return Err(ServiceError::invalid(format!(
                    "invalid dependency name {:?}",
                    bad
                )));
            }
            Some(encode_multi_string(deps.as_slice()))
        }
        None => None,
    };

    Ok(RawConfigWrite {
        service_type,
        start_type,
        error_control,
        binary_path_name: options.binary_path_name.clone(),
        load_order_group: options.load_order_group.clone(),
        dependencies,
        service_start_name: options.service_start_name.clone(),
        password: options.password.clone(),
        display_name: options.display_name.clone(),
    })
}

/// Reject names the SCM would refuse, before any OS call is made.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ServiceError::invalid("service name must not be empty"));
    }
    if name.encode_utf16().count() > MAX_SERVICE_NAME_LEN {
        return Err(ServiceError::invalid(format!(
            "service name longer than {} characters",
            MAX_SERVICE_NAME_LEN
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(ServiceError::invalid(format!(
            "service name {:?} contains '/', '\\' or NUL",
            name
        )));
    }
    Ok(())
}

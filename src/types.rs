//! Structured service records and the named values they are built from
//!
//! Flag sets and enumerated scalars are rendered with the OS constant names
//! (without the `SERVICE_` prefix). Each named type carries a `const` table
//! pairing raw values with variants; the codec performs every lookup through
//! these tables.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::consts::*;

/// A set of named bits: each variant owns exactly one bit of the raw mask.
pub trait NamedFlag: Copy + 'static {
    const TABLE: &'static [(u32, Self)];

    fn name(self) -> &'static str;
}

/// An enumerated scalar with an explicit sentinel for values outside the table.
pub trait NamedScalar: Copy + PartialEq + 'static {
    const TABLE: &'static [(u32, Self)];
    const UNKNOWN: Self;

    fn name(self) -> &'static str;
}

macro_rules! impl_named_serde {
    ($name:ident) => {
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.name())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let value = String::deserialize(deserializer)?;
                $name::from_name(&value).ok_or_else(|| {
                    serde::de::Error::custom(format!(
                        "unknown {} value: {}",
                        stringify!($name),
                        value
                    ))
                })
            }
        }
    };
}

macro_rules! named_flag {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $bit:expr => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $($variant),+
        }

        impl NamedFlag for $name {
            const TABLE: &'static [(u32, Self)] = &[$(($bit, $name::$variant)),+];

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl $name {
            pub fn name(self) -> &'static str {
                NamedFlag::name(self)
            }

            pub fn bits(self) -> u32 {
                match self {
                    $($name::$variant => $bit),+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                <Self as NamedFlag>::TABLE
                    .iter()
                    .map(|&(_, v)| v)
                    .find(|v| v.name() == name)
            }
        }

        impl_named_serde!($name);
    };
}

macro_rules! named_scalar {
    (
        $(#[$meta:meta])*
        $name:ident { $($variant:ident = $value:expr => $label:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Raw value outside the known table
            Unknown,
        }

        impl NamedScalar for $name {
            const TABLE: &'static [(u32, Self)] = &[$(($value, $name::$variant)),+];
            const UNKNOWN: Self = $name::Unknown;

            fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                    $name::Unknown => "UNKNOWN",
                }
            }
        }

        impl $name {
            pub fn name(self) -> &'static str {
                NamedScalar::name(self)
            }

            /// Raw OS value; `None` for the unknown sentinel.
            pub fn raw(self) -> Option<u32> {
                match self {
                    $($name::$variant => Some($value),)+
                    $name::Unknown => None,
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                if name == "UNKNOWN" {
                    return Some($name::Unknown);
                }
                <Self as NamedScalar>::TABLE
                    .iter()
                    .map(|&(_, v)| v)
                    .find(|v| v.name() == name)
            }
        }

        impl_named_serde!($name);
    };
}

named_flag! {
    /// Service type bits
    ServiceType {
        KernelDriver = SERVICE_KERNEL_DRIVER => "KERNEL_DRIVER",
        FileSystemDriver = SERVICE_FILE_SYSTEM_DRIVER => "FILE_SYSTEM_DRIVER",
        Adapter = SERVICE_ADAPTER => "ADAPTER",
        RecognizerDriver = SERVICE_RECOGNIZER_DRIVER => "RECOGNIZER_DRIVER",
        Win32OwnProcess = SERVICE_WIN32_OWN_PROCESS => "WIN32_OWN_PROCESS",
        Win32ShareProcess = SERVICE_WIN32_SHARE_PROCESS => "WIN32_SHARE_PROCESS",
        InteractiveProcess = SERVICE_INTERACTIVE_PROCESS => "INTERACTIVE_PROCESS",
    }
}

named_flag! {
    /// Control codes a running service has declared it accepts
    ControlAccept {
        Stop = SERVICE_ACCEPT_STOP => "STOP",
        PauseContinue = SERVICE_ACCEPT_PAUSE_CONTINUE => "PAUSE_CONTINUE",
        Shutdown = SERVICE_ACCEPT_SHUTDOWN => "SHUTDOWN",
        ParamChange = SERVICE_ACCEPT_PARAMCHANGE => "PARAMCHANGE",
        NetBindChange = SERVICE_ACCEPT_NETBINDCHANGE => "NETBINDCHANGE",
        HardwareProfileChange = SERVICE_ACCEPT_HARDWAREPROFILECHANGE => "HARDWAREPROFILECHANGE",
        PowerEvent = SERVICE_ACCEPT_POWEREVENT => "POWEREVENT",
        SessionChange = SERVICE_ACCEPT_SESSIONCHANGE => "SESSIONCHANGE",
        PreShutdown = SERVICE_ACCEPT_PRESHUTDOWN => "PRESHUTDOWN",
        TimeChange = SERVICE_ACCEPT_TIMECHANGE => "TIMECHANGE",
        TriggerEvent = SERVICE_ACCEPT_TRIGGEREVENT => "TRIGGEREVENT",
    }
}

named_flag! {
    ServiceFlag {
        RunsInSystemProcess = SERVICE_RUNS_IN_SYSTEM_PROCESS => "RUNS_IN_SYSTEM_PROCESS",
    }
}

named_scalar! {
    /// Current state of a service
    ServiceState {
        Stopped = SERVICE_STOPPED => "STOPPED",
        StartPending = SERVICE_START_PENDING => "START_PENDING",
        StopPending = SERVICE_STOP_PENDING => "STOP_PENDING",
        Running = SERVICE_RUNNING => "RUNNING",
        ContinuePending = SERVICE_CONTINUE_PENDING => "CONTINUE_PENDING",
        PausePending = SERVICE_PAUSE_PENDING => "PAUSE_PENDING",
        Paused = SERVICE_PAUSED => "PAUSED",
    }
}

named_scalar! {
    StartType {
        BootStart = SERVICE_BOOT_START => "BOOT_START",
        SystemStart = SERVICE_SYSTEM_START => "SYSTEM_START",
        AutoStart = SERVICE_AUTO_START => "AUTO_START",
        DemandStart = SERVICE_DEMAND_START => "DEMAND_START",
        Disabled = SERVICE_DISABLED => "DISABLED",
    }
}

named_scalar! {
    /// Severity of a start failure, as seen by the boot loader
    ErrorControl {
        Ignore = SERVICE_ERROR_IGNORE => "IGNORE",
        Normal = SERVICE_ERROR_NORMAL => "NORMAL",
        Severe = SERVICE_ERROR_SEVERE => "SEVERE",
        Critical = SERVICE_ERROR_CRITICAL => "CRITICAL",
    }
}

/// Service type filter for enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TypeFilter {
    KernelDriver,
    FileSystemDriver,
    Adapter,
    RecognizerDriver,
    Win32OwnProcess,
    Win32ShareProcess,
    InteractiveProcess,
    Driver,
    Win32,
    #[default]
    All,
}

impl TypeFilter {
    pub fn bits(self) -> u32 {
        match self {
            TypeFilter::KernelDriver => SERVICE_KERNEL_DRIVER,
            TypeFilter::FileSystemDriver => SERVICE_FILE_SYSTEM_DRIVER,
            TypeFilter::Adapter => SERVICE_ADAPTER,
            TypeFilter::RecognizerDriver => SERVICE_RECOGNIZER_DRIVER,
            TypeFilter::Win32OwnProcess => SERVICE_WIN32_OWN_PROCESS,
            TypeFilter::Win32ShareProcess => SERVICE_WIN32_SHARE_PROCESS,
            TypeFilter::InteractiveProcess => SERVICE_INTERACTIVE_PROCESS,
            TypeFilter::Driver => {
                SERVICE_KERNEL_DRIVER | SERVICE_FILE_SYSTEM_DRIVER | SERVICE_RECOGNIZER_DRIVER
            }
            TypeFilter::Win32 => SERVICE_WIN32_OWN_PROCESS | SERVICE_WIN32_SHARE_PROCESS,
            TypeFilter::All => {
                TypeFilter::Driver.bits()
                    | TypeFilter::Win32.bits()
                    | SERVICE_ADAPTER
                    | SERVICE_INTERACTIVE_PROCESS
            }
        }
    }

    /// Combine several filters into one OS mask
    pub fn mask(filters: &[TypeFilter]) -> u32 {
        filters.iter().fold(0, |mask, f| mask | f.bits())
    }
}

/// Service state filter for enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateFilter {
    Active,
    Inactive,
    #[default]
    All,
}

impl StateFilter {
    pub fn bits(self) -> u32 {
        match self {
            StateFilter::Active => SERVICE_ACTIVE,
            StateFilter::Inactive => SERVICE_INACTIVE,
            StateFilter::All => SERVICE_STATE_ALL,
        }
    }
}

/// Point-in-time status of a service. Produced fresh on every query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub service_type: Vec<ServiceType>,
    pub state: ServiceState,
    pub controls_accepted: Vec<ControlAccept>,
    pub exit_code: u32,
    /// Present only when `exit_code` is `ERROR_SERVICE_SPECIFIC_ERROR`
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_specific_exit_code: Option<u32>,
    #[serde(rename = "checkPoint")]
    pub checkpoint: u32,
    /// Milliseconds
    pub wait_hint: u32,
    pub process_id: u32,
    pub service_flags: Vec<ServiceFlag>,
}

/// One entry of a full enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumeratedService {
    #[serde(flatten)]
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
}

/// Stored configuration of a service, merged from the primary config record
/// and the description record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceConfig {
    pub service_type: Vec<ServiceType>,
    pub start_type: StartType,
    pub error_control: ErrorControl,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub binary_path_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub load_order_group: Option<String>,
    pub tag_id: u32,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub service_start_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

/// Configuration supplied to `create` and `change`.
///
/// Every `None` field means "leave unchanged" for `change` and "use the
/// default" for `create`. `binary_path_name` is required by `create`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServiceConfigOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_type: Option<Vec<ServiceType>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_type: Option<StartType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_control: Option<ErrorControl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary_path_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_order_group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_start_name: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ServiceConfigOptions {
    /// Options for a new service running `binary_path_name`
    pub fn new(binary_path_name: impl Into<String>) -> Self {
        Self {
            binary_path_name: Some(binary_path_name.into()),
            ..Self::default()
        }
    }

    pub fn with_start_type(mut self, start_type: StartType) -> Self {
        self.start_type = Some(start_type);
        self
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }
}

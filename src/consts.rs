//! Win32 service ABI values used by the codec and the control-plane client.
//!
//! These mirror the constants from `winsvc.h`/`winnt.h`/`winerror.h` so the
//! translation layer and its tests are available on every platform.

// Service types
pub const SERVICE_KERNEL_DRIVER: u32 = 0x0000_0001;
pub const SERVICE_FILE_SYSTEM_DRIVER: u32 = 0x0000_0002;
pub const SERVICE_ADAPTER: u32 = 0x0000_0004;
pub const SERVICE_RECOGNIZER_DRIVER: u32 = 0x0000_0008;
pub const SERVICE_WIN32_OWN_PROCESS: u32 = 0x0000_0010;
pub const SERVICE_WIN32_SHARE_PROCESS: u32 = 0x0000_0020;
pub const SERVICE_INTERACTIVE_PROCESS: u32 = 0x0000_0100;

// Current state
pub const SERVICE_STOPPED: u32 = 0x1;
pub const SERVICE_START_PENDING: u32 = 0x2;
pub const SERVICE_STOP_PENDING: u32 = 0x3;
pub const SERVICE_RUNNING: u32 = 0x4;
pub const SERVICE_CONTINUE_PENDING: u32 = 0x5;
pub const SERVICE_PAUSE_PENDING: u32 = 0x6;
pub const SERVICE_PAUSED: u32 = 0x7;

// Controls accepted
pub const SERVICE_ACCEPT_STOP: u32 = 0x001;
pub const SERVICE_ACCEPT_PAUSE_CONTINUE: u32 = 0x002;
pub const SERVICE_ACCEPT_SHUTDOWN: u32 = 0x004;
pub const SERVICE_ACCEPT_PARAMCHANGE: u32 = 0x008;
pub const SERVICE_ACCEPT_NETBINDCHANGE: u32 = 0x010;
pub const SERVICE_ACCEPT_HARDWAREPROFILECHANGE: u32 = 0x020;
pub const SERVICE_ACCEPT_POWEREVENT: u32 = 0x040;
pub const SERVICE_ACCEPT_SESSIONCHANGE: u32 = 0x080;
pub const SERVICE_ACCEPT_PRESHUTDOWN: u32 = 0x100;
pub const SERVICE_ACCEPT_TIMECHANGE: u32 = 0x200;
pub const SERVICE_ACCEPT_TRIGGEREVENT: u32 = 0x400;

pub const SERVICE_RUNS_IN_SYSTEM_PROCESS: u32 = 0x1;

// Start types
pub const SERVICE_BOOT_START: u32 = 0x0;
pub const SERVICE_SYSTEM_START: u32 = 0x1;
pub const SERVICE_AUTO_START: u32 = 0x2;
pub const SERVICE_DEMAND_START: u32 = 0x3;
pub const SERVICE_DISABLED: u32 = 0x4;

// Error control
pub const SERVICE_ERROR_IGNORE: u32 = 0x0;
pub const SERVICE_ERROR_NORMAL: u32 = 0x1;
pub const SERVICE_ERROR_SEVERE: u32 = 0x2;
pub const SERVICE_ERROR_CRITICAL: u32 = 0x3;

/// "Leave this field unchanged" marker for `ChangeServiceConfig`
pub const SERVICE_NO_CHANGE: u32 = 0xffff_ffff;

// Enumeration state filter
pub const SERVICE_ACTIVE: u32 = 0x1;
pub const SERVICE_INACTIVE: u32 = 0x2;
pub const SERVICE_STATE_ALL: u32 = SERVICE_ACTIVE | SERVICE_INACTIVE;

// Control codes
pub const SERVICE_CONTROL_STOP: u32 = 0x1;
pub const SERVICE_CONTROL_PAUSE: u32 = 0x2;
pub const SERVICE_CONTROL_CONTINUE: u32 = 0x3;
pub const SERVICE_CONTROL_INTERROGATE: u32 = 0x4;
pub const SERVICE_CONTROL_SHUTDOWN: u32 = 0x5;

// Access rights
pub const SC_MANAGER_CONNECT: u32 = 0x0001;
pub const SC_MANAGER_CREATE_SERVICE: u32 = 0x0002;
pub const SC_MANAGER_ENUMERATE_SERVICE: u32 = 0x0004;
pub const SERVICE_QUERY_CONFIG: u32 = 0x0001;
pub const SERVICE_CHANGE_CONFIG: u32 = 0x0002;
pub const SERVICE_QUERY_STATUS: u32 = 0x0004;
pub const SERVICE_START: u32 = 0x0010;
pub const SERVICE_STOP: u32 = 0x0020;
pub const DELETE: u32 = 0x0001_0000;

// Error codes
pub const NO_ERROR: u32 = 0;
pub const ERROR_ACCESS_DENIED: u32 = 5;
pub const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub const ERROR_CALL_NOT_IMPLEMENTED: u32 = 120;
pub const ERROR_MORE_DATA: u32 = 234;
pub const ERROR_SERVICE_ALREADY_RUNNING: u32 = 1056;
pub const ERROR_SERVICE_DOES_NOT_EXIST: u32 = 1060;
pub const ERROR_SERVICE_NOT_ACTIVE: u32 = 1062;
pub const ERROR_FAILED_SERVICE_CONTROLLER_CONNECT: u32 = 1063;
pub const ERROR_SERVICE_SPECIFIC_ERROR: u32 = 1066;
pub const ERROR_PROCESS_ABORTED: u32 = 1067;
pub const ERROR_SERVICE_MARKED_FOR_DELETE: u32 = 1072;
pub const ERROR_SERVICE_EXISTS: u32 = 1073;

//! Well-known filesystem locations used by the supervisor.

/// Default share configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/nfsmanager/config.json";

/// PID file recording the running supervisor.
pub const DEFAULT_PID_FILE: &str = "/var/run/nfsmanager.pid";

/// Log file appended to alongside stdout.
pub const DEFAULT_LOG_FILE: &str = "/var/log/nfsmanager.log";

/// Kernel mount table for the current mount namespace.
pub const PROC_MOUNTS: &str = "/proc/self/mounts";

use std::time::Duration;

pub const ARG_PARENT_ID: &str = "parent_id";
pub const ARG_PAGE_START: &str = "page_start";
pub const ARG_PAGE_FINISH: &str = "page_finish";
pub const ARG_LOG_TO: &str = "log_to";
// Passed through to children so they load the same settings file
pub const ARG_CONFIG: &str = "config";

pub const ENV_PREFIX: &str = "PAGEFORK";
pub const LOG_LEVEL_ENV: &str = "PAGEFORK_LOG";

// Target of audit command lines and relayed worker output; always enabled at info
pub const RELAY_TARGET: &str = "pagefork::relay";

pub const DEFAULT_PROCESSES: usize = 4;
pub const DEFAULT_FIRST_PAGE: i64 = 1;
pub const LOG_FILE_EXTENSION: &str = ".log";

// Sample worker defaults
pub const SAMPLE_PAGE_SIZE: usize = 4;
pub const SAMPLE_PAUSE_MIN: Duration = Duration::from_secs(1);
pub const SAMPLE_PAUSE_MAX: Duration = Duration::from_secs(3);

// Grace period between SIGTERM and SIGKILL when a stalled child is terminated
pub const TERMINATE_GRACE: Duration = Duration::from_millis(500);

//Wire format
pub const FRAME_HEADER_LEN: usize = 3;
pub const MAX_FRAME_LEN: usize = 999;

//Widest clock::now() output, e.g. 12/31/2026,12:59 PM
pub const MAX_TIMESTAMP_LEN: usize = 19;
//", " twice and the trailing newline of one drained message line
pub const MESSAGE_LINE_OVERHEAD: usize = 5;

//Login replies
pub const LOGIN_OK: &str = "S";
pub const LOGIN_REJECTED: &str = "E";

//Registry policy
pub const DEFAULT_MAX_USERS: usize = 100;
pub const DEFAULT_MAILBOX_CAPACITY: usize = 10;
pub const DEFAULT_MAX_NAME_LEN: usize = 79;
pub const DEFAULT_MAX_BODY_LEN: usize = 79;

//Listener
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 7878;

//Time in seconds
pub const DEFAULT_IDLE_TIMEOUT: u64 = 300;

//Logging
pub const DEFAULT_LOG_FILTER: &str = "pigeonhole=info";
pub const LOG_FILE_PREFIX: &str = "pigeonhole.log";

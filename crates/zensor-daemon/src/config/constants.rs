pub const DEFAULT_API_PORT: u16 = 8430;
pub const DEFAULT_GROUP_ID: &str = "zensor-sensors";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_RETRY_MAX_ELAPSED_SECS: u64 = 60;
pub const DEFAULT_DIRECTORY_TIMEOUT_SECS: u64 = 30;
pub const KEYS_DIR_NAME: &str = "zk-keys";
pub const LEDGER_DIR_NAME: &str = "ledger";
pub const IDENTITIES_DIR_NAME: &str = "identities";

// Allocation and timeout constants (No magic values)
use std::time::Duration;

/// Default allocatable port range start
pub const DEFAULT_PORT_RANGE_START: u16 = 8000;

/// Default allocatable port range end (inclusive)
pub const DEFAULT_PORT_RANGE_END: u16 = 9999;

/// Default probe budget for one ledger-backed allocation
pub const DEFAULT_MAX_ALLOCATION_ATTEMPTS: u32 = 50;

/// Ledger entries older than this are reclaimed even if their owner is alive (7 days)
pub const DEFAULT_STALE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Well-known service ports never handed out, whatever the configured range
pub const DEFAULT_RESERVED_PORTS: [u16; 23] = [
    22, 23, 25, 53, 80, 110, 143, 443, 465, 587, 993, 995, 2181, 3306, 5432, 5672, 6379, 8080,
    8443, 9090, 9092, 9200, 27017,
];

/// Default prefix for generated database names
pub const DEFAULT_DATABASE_PREFIX: &str = "autocoder";

/// Default root for generated storage paths
pub const DEFAULT_STORAGE_BASE_PATH: &str = "/data";

/// Default namespace for cache-key prefixes
pub const DEFAULT_CACHE_NAMESPACE: &str = "autocoder";

/// Default host embedded in connection strings
pub const DEFAULT_DATABASE_HOST: &str = "localhost";

/// Placeholder for the externally supplied database password
pub const DEFAULT_CREDENTIAL_PLACEHOLDER: &str = "${DB_PASSWORD}";

/// Placeholder for the externally supplied database user
pub const DEFAULT_USER_PLACEHOLDER: &str = "${DB_USER}";

/// Upper bound on numeric suffixes tried for one name before giving up
pub const MAX_NAME_SUFFIX: u32 = 10_000;

/// Interval between background sweeps of abandoned timeout contexts
pub const EXPIRED_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

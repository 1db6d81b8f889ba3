use redb::TableDefinition;

/// File records: (owner id, filename) -> FileRecord (msgpack).
/// The composite key is the per-owner filename uniqueness constraint.
pub const FILES: TableDefinition<(u64, &str), &[u8]> = TableDefinition::new("files");

/// Share index: share id -> (owner id, filename)
pub const FILE_SHARES: TableDefinition<&str, (u64, &str)> = TableDefinition::new("file_shares");

/// User records: user id -> User (msgpack)
pub const USERS: TableDefinition<u64, &[u8]> = TableDefinition::new("users");

/// Email index: normalized email -> user id
pub const USER_EMAILS: TableDefinition<&str, u64> = TableDefinition::new("user_emails");

/// Named counters (next user id)
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Generate a new opaque resource id (UUID v4, hyphen-free)
///
/// Used as the record key for orders and payments so the business id and
/// the storage key are the same value.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

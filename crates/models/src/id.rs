use uuid::Uuid;

/// Generate a record id.
///
/// UUIDv7: a millisecond timestamp prefix followed by random bits, so ids
/// sort roughly by creation time and collide with negligible probability.
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

use rand::distributions::Uniform;
use rand::Rng;

/// 6-digit numeric one-time code bound to a single action (email verify,
/// password reset, email change).
pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Uniform::new(0u32, 10))
        .take(6)
        .map(|d| d.to_string())
        .collect()
}

/// Public 9-digit userId. Collisions are handled by the caller with a retry
/// against the unique index.
pub fn generate_public_id() -> i64 {
    rand::thread_rng().gen_range(100_000_000..1_000_000_000)
}

//! Identifier generation.

use uuid::Uuid;

/// Produces collision-resistant string identifiers.
pub trait IdGenerator: Send + Sync {
    fn generate_id(&self) -> String;
}

/// Generates random (v4) UUIDs in their 32 character hex form.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGenerator;

impl IdGenerator for UuidIdGenerator {
    fn generate_id(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

impl<F> IdGenerator for F
where
    F: Fn() -> String + Send + Sync,
{
    fn generate_id(&self) -> String {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn uuid_ids_are_unique_hex() {
        let first = UuidIdGenerator.generate_id();
        let second = UuidIdGenerator.generate_id();

        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }

    #[test]
    fn closures_generate_ids() {
        let counter = AtomicUsize::new(0);
        let generator = move || format!("rec-{}", counter.fetch_add(1, Ordering::SeqCst));

        assert_eq!(generator.generate_id(), "rec-0");
        assert_eq!(generator.generate_id(), "rec-1");
    }
}

//! Well-known job type names shared between producers (detection
//! runner, audit retention, embedding migration) and the worker pool's
//! job-type registry, so a typo in one doesn't silently dead-letter
//! every job of that kind.

/// A detection run: route an alert, dispatch through the resilient
/// LLM provider, and write the resulting audit record.
pub const DETECTION_RUN: &str = "detection_run";

/// Monthly cold-storage export of a tenant's audit chain segment.
pub const RETENTION_EXPORT: &str = "retention_export";

/// Checkpointed backfill of stored embeddings to a new model.
pub const EMBEDDING_MIGRATION: &str = "embedding_migration";

/// Dequeue priority for a job kind: higher runs first when several jobs
/// become ready around the same time. Detection runs drive live
/// investigations and outrank the two background maintenance kinds;
/// retention export outranks embedding migration because a missed
/// monthly export risks the warm/cold drop window, while a migration
/// checkpoint can simply resume later. Mirrors the `priority DESC`
/// ordering `soc-persist`'s `SqliteQueueBackend` applies in SQL.
pub fn priority_rank(job_type: &str) -> u8 {
    match job_type {
        DETECTION_RUN => 2,
        RETENTION_EXPORT => 1,
        EMBEDDING_MIGRATION => 0,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_names_are_distinct() {
        let names = [DETECTION_RUN, RETENTION_EXPORT, EMBEDDING_MIGRATION];
        for (i, a) in names.iter().enumerate() {
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn detection_run_outranks_the_maintenance_kinds() {
        assert!(priority_rank(DETECTION_RUN) > priority_rank(RETENTION_EXPORT));
        assert!(priority_rank(RETENTION_EXPORT) > priority_rank(EMBEDDING_MIGRATION));
    }

    #[test]
    fn unknown_job_type_ranks_as_background() {
        assert_eq!(priority_rank("unknown"), priority_rank(EMBEDDING_MIGRATION));
    }
}

// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical idempotency key formats.
//!
//! Keys are derived from stable identifiers, never from message contents, so
//! the same logical request always lands on the same key.

/// Key for a merchant (or operator) confirming a job.
pub fn confirm_key(job_id: &str, actor_id: &str) -> String {
    format!("confirm:{job_id}:{actor_id}")
}

/// Key for a user approving their own draft for dispatch.
pub fn submit_key(job_id: &str, actor_id: &str) -> String {
    format!("submit:{job_id}:{actor_id}")
}

/// Marker key for a counter bump tied to one job event.
pub fn counter_key(counter: &str, job_id: &str) -> String {
    format!("ctr:{counter}:{job_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats_are_stable() {
        assert_eq!(confirm_key("job-1", "merchant-9"), "confirm:job-1:merchant-9");
        assert_eq!(submit_key("job-1", "user-2"), "submit:job-1:user-2");
        assert_eq!(counter_key("jobs_confirmed", "job-1"), "ctr:jobs_confirmed:job-1");
    }

    #[test]
    fn same_inputs_same_key() {
        assert_eq!(confirm_key("job-1", "m-1"), confirm_key("job-1", "m-1"));
        assert_ne!(confirm_key("job-1", "m-1"), confirm_key("job-1", "m-2"));
        assert_ne!(confirm_key("job-1", "m-1"), submit_key("job-1", "m-1"));
    }
}

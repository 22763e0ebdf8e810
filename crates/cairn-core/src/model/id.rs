//! Ledger identifiers.
//!
//! Task ids look like `t-1f9a2c04` and issue ids like `i-7bd3e910`. The hex
//! suffix is the head of a BLAKE3 digest over the creation context plus a
//! nonce, so two writers creating the same task concurrently still get
//! distinct ids. Callers pass the set of every id already seen in the log and
//! generation widens the suffix until it is unused: ids are never reused, not
//! even after a task is deleted or accepted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const MIN_HEX_LEN: usize = 8;
const MAX_HEX_LEN: usize = 64;

static NONCE: AtomicU64 = AtomicU64::new(0);

macro_rules! ledger_id {
    ($name:ident, $prefix:literal, $what:literal) => {
        #[doc = concat!("Identifier of a ledger ", $what, " (`", $prefix, "-<hex>`).")]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// The id prefix, without the dash.
            pub const PREFIX: &'static str = $prefix;

            /// Wrap a raw string without checking its shape.
            ///
            /// Replay accepts whatever the log contains; only freshly generated
            /// ids are guaranteed to match `<prefix>-<hex>`.
            #[must_use]
            pub fn new_unchecked(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Generate a fresh id that does not collide with `taken`.
            pub fn generate<F>(context: &str, taken: F) -> Self
            where
                F: Fn(&str) -> bool,
            {
                Self(generate_raw($prefix, context, taken))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Whether the id has the `<prefix>-<hex>` shape.
            #[must_use]
            pub fn is_well_formed(&self) -> bool {
                well_formed($prefix, &self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self::new_unchecked(raw)
            }
        }
    };
}

ledger_id!(TaskId, "t", "task");
ledger_id!(IssueId, "i", "issue");

fn generate_raw<F>(prefix: &str, context: &str, taken: F) -> String
where
    F: Fn(&str) -> bool,
{
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos());
    let nonce = NONCE.fetch_add(1, Ordering::Relaxed);

    let mut hasher = blake3::Hasher::new();
    hasher.update(context.as_bytes());
    hasher.update(&nanos.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    hasher.update(&nonce.to_le_bytes());
    let hex = hasher.finalize().to_hex();

    let mut len = MIN_HEX_LEN;
    loop {
        let candidate = format!("{prefix}-{}", &hex[..len]);
        if !taken(&candidate) || len == MAX_HEX_LEN {
            return candidate;
        }
        len += 2;
    }
}

fn well_formed(prefix: &str, raw: &str) -> bool {
    raw.strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('-'))
        .is_some_and(|hex| !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_task_ids_are_well_formed() {
        let id = TaskId::generate("spec.md|Add parser", |_| false);
        assert!(id.as_str().starts_with("t-"));
        assert_eq!(id.as_str().len(), 2 + MIN_HEX_LEN);
        assert!(id.is_well_formed());
    }

    #[test]
    fn generated_issue_ids_use_issue_prefix() {
        let id = IssueId::generate("flaky test", |_| false);
        assert!(id.as_str().starts_with("i-"));
        assert!(id.is_well_formed());
    }

    #[test]
    fn same_context_yields_distinct_ids() {
        let a = TaskId::generate("same", |_| false);
        let b = TaskId::generate("same", |_| false);
        assert_ne!(a, b);
    }

    #[test]
    fn generation_widens_suffix_on_collision() {
        let id = TaskId::generate("ctx", |candidate| candidate.len() == 2 + MIN_HEX_LEN);
        assert_eq!(id.as_str().len(), 2 + MIN_HEX_LEN + 2);
    }

    #[test]
    fn generation_avoids_every_taken_id() {
        let mut taken = HashSet::new();
        for _ in 0..200 {
            let id = TaskId::generate("bulk", |c| taken.contains(c));
            assert!(taken.insert(id.as_str().to_string()));
        }
    }

    #[test]
    fn well_formed_rejects_other_shapes() {
        assert!(!TaskId::new_unchecked("i-abc").is_well_formed());
        assert!(!TaskId::new_unchecked("t-").is_well_formed());
        assert!(!TaskId::new_unchecked("t-xyz").is_well_formed());
        assert!(TaskId::new_unchecked("t-0a1b").is_well_formed());
    }

    #[test]
    fn serde_is_transparent() {
        let id = TaskId::new_unchecked("t-abc123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t-abc123\"");
        let back: TaskId = serde_json::from_str("\"t-abc123\"").unwrap();
        assert_eq!(back, id);
    }
}

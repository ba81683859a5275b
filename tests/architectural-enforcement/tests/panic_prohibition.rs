//! Integration Test: No Panics in Production Code
//!
//! **Policy**: A stale animator callback or a misbehaving host must never
//! take the UI down. Production code returns `FlowError`,
//! `TransitionError` or `ConfigError` and logs through `tracing`.
//!
//! **Acceptable**: `unwrap()`/`expect()` in `#[cfg(test)]` modules and in
//! `test_utils.rs`.

use architectural_enforcement::{core_src_dir, report, scan_directory, Rule};

const RULES: &[Rule] = &[
    Rule {
        pattern: ".unwrap()",
        description: "unwrap() in production code",
    },
    Rule {
        pattern: ".expect(",
        description: "expect() in production code",
    },
    Rule {
        pattern: "panic!(",
        description: "Explicit panic",
    },
    Rule {
        pattern: "unreachable!(",
        description: "Explicit panic",
    },
    Rule {
        pattern: "todo!(",
        description: "Unfinished code",
    },
    Rule {
        pattern: "unimplemented!(",
        description: "Unfinished code",
    },
];

#[test]
fn test_no_panics_in_production_code() {
    let violations = scan_directory(&core_src_dir(), RULES);

    report(
        "CRITICAL: Panicking calls found in production code!",
        &[
            "✅ REQUIRED:",
            "  - Propagate with `?` and a typed error",
            "  - unwrap_or / unwrap_or_default / unwrap_or_else for safe fallbacks",
            "  - tracing::warn! and drop the call when there is no caller to report to",
        ],
        &violations,
    );
}

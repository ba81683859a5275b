//! Integration Test: Single-Threaded Navigation Core
//!
//! **Policy**: The navigation core runs on the UI thread only. Controllers,
//! the orchestrator and transition callbacks share state through `Rc`,
//! `RefCell` and `Cell`, and listeners may re-enter the controller that
//! notified them.
//!
//! **Forbidden**: spawning threads, locks and atomically counted pointers.
//! A lock around controller state would deadlock on re-entrant listeners.

use architectural_enforcement::{core_src_dir, report, scan_directory, Rule};

const RULES: &[Rule] = &[
    Rule {
        pattern: "std::thread",
        description: "Thread usage",
    },
    Rule {
        pattern: "Mutex",
        description: "Lock",
    },
    Rule {
        pattern: "RwLock",
        description: "Lock",
    },
    Rule {
        pattern: "parking_lot",
        description: "Lock",
    },
    Rule {
        pattern: "Arc<",
        description: "Shared ownership across threads",
    },
    Rule {
        pattern: "Arc::",
        description: "Shared ownership across threads",
    },
    Rule {
        pattern: "tokio::",
        description: "Async runtime",
    },
];

#[test]
fn test_core_is_single_threaded() {
    let violations = scan_directory(&core_src_dir(), RULES);

    report(
        "CRITICAL: Multi-threading primitives found in the navigation core!",
        &[
            "✅ REQUIRED:",
            "  - Rc / Weak for shared ownership",
            "  - RefCell / Cell for interior mutability",
            "  - Release RefCell borrows before notifying listeners",
        ],
        &violations,
    );
}

#[test]
fn test_core_sources_are_found() {
    assert!(
        core_src_dir().join("lib.rs").exists(),
        "expected navigation core at {}",
        core_src_dir().display()
    );
}

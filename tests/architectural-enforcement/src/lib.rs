//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the enforcement tests under `tests/`:
//! - Navigation core stays single-threaded (no threads, locks or `Arc`)
//! - Production code propagates errors instead of panicking
//!
//! Scanning is line based. Test code is everything from a `#[cfg(test)]`
//! attribute that opens a `mod tests` block to the end of the file, plus
//! whole files named `test_utils.rs`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// A forbidden pattern and what to tell the developer about it
#[derive(Clone, Copy, Debug)]
pub struct Rule {
    /// Substring matched against code (comments stripped)
    pub pattern: &'static str,
    /// Short description printed with each violation
    pub description: &'static str,
}

/// One forbidden pattern found in production code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File containing the match
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// The rule that matched
    pub description: &'static str,
    /// The offending line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.description,
            self.text
        )
    }
}

/// `src/` of the navigation core, resolved from this package's manifest
#[must_use]
pub fn core_src_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../wayfinder/core/src")
}

/// Scan every production `.rs` file under `dir` for `rules`
#[must_use]
pub fn scan_directory(dir: &Path, rules: &[Rule]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if !dir.exists() {
        return violations;
    }

    for entry in walkdir::WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("rs") {
            continue;
        }
        if path.file_name().and_then(|s| s.to_str()) == Some("test_utils.rs") {
            continue;
        }
        if let Ok(content) = fs::read_to_string(path) {
            violations.extend(scan_source(path, &content, rules));
        }
    }

    violations
}

/// Scan one file's content, stopping at its test module
#[must_use]
pub fn scan_source(path: &Path, content: &str, rules: &[Rule]) -> Vec<Violation> {
    let lines: Vec<&str> = content.lines().collect();
    let end = test_module_start(&lines).unwrap_or(lines.len());
    let mut violations = Vec::new();

    for (idx, line) in lines[..end].iter().enumerate() {
        let code_part = line.split("//").next().unwrap_or(line);
        for rule in rules {
            if code_part.contains(rule.pattern) {
                violations.push(Violation {
                    path: path.to_path_buf(),
                    line: idx + 1,
                    description: rule.description,
                    text: line.trim().to_string(),
                });
            }
        }
    }

    violations
}

/// Index of the `#[cfg(test)]` line that opens `mod tests`
#[must_use]
pub fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        if line.trim() != "#[cfg(test)]" {
            return None;
        }
        let next = lines[idx + 1..].iter().map(|l| l.trim()).find(|l| !l.is_empty())?;
        next.starts_with("mod tests").then_some(idx)
    })
}

/// Print violations with guidance and fail the test if there are any
///
/// # Panics
///
/// Panics when `violations` is not empty.
pub fn report(title: &str, guidance: &[&str], violations: &[Violation]) {
    if violations.is_empty() {
        return;
    }

    eprintln!("\n❌ {title}\n");
    for violation in violations {
        eprintln!("  ❌ {violation}");
    }
    eprintln!();
    for line in guidance {
        eprintln!("  {line}");
    }

    panic!(
        "\nFound {} violation(s) in production code.\nFix these before merging!",
        violations.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNWRAP: Rule = Rule {
        pattern: ".unwrap()",
        description: "unwrap",
    };

    #[test]
    fn test_production_line_detected() {
        let code = "fn run() {\n    let x = parse().unwrap();\n}\n";

        let violations = scan_source(Path::new("lib.rs"), code, &[UNWRAP]);

        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
        assert_eq!(violations[0].text, "let x = parse().unwrap();");
    }

    #[test]
    fn test_test_module_skipped() {
        let code = "fn run() {}\n\n#[cfg(test)]\nmod tests {\n    fn t() { x.unwrap(); }\n}\n";

        assert!(scan_source(Path::new("lib.rs"), code, &[UNWRAP]).is_empty());
    }

    #[test]
    fn test_cfg_test_item_is_not_a_test_module() {
        let code = "#[cfg(test)]\npub(crate) mod test_utils;\n\nfn run() { x.unwrap(); }\n";

        assert_eq!(scan_source(Path::new("lib.rs"), code, &[UNWRAP]).len(), 1);
    }

    #[test]
    fn test_comments_ignored() {
        let code = "fn run() {\n    // never call .unwrap() here\n}\n";

        assert!(scan_source(Path::new("lib.rs"), code, &[UNWRAP]).is_empty());
    }
}

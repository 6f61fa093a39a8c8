//! Structural tests for layer boundaries.
//!
//! These tests scan source files so a stray import fails CI instead of
//! slowly eroding the domain/application/infra split.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

/// Read a file and strip comment lines to avoid false positives.
fn read_non_comment_lines(path: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .filter(|l| {
            let trimmed = l.trim();
            !trimmed.starts_with("//") && !trimmed.starts_with("/*") && !trimmed.starts_with('*')
        })
        .map(String::from)
        .collect()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    fn process_line(&mut self, line: &str) -> bool {
        if line.trim().contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

fn count_non_test_lines(content: &str) -> usize {
    let mut tracker = CfgTestTracker::new();
    content
        .lines()
        .filter(|line| {
            let in_test = tracker.process_line(line);
            let trimmed = line.trim();
            !in_test && !trimmed.is_empty() && !trimmed.starts_with("//")
        })
        .count()
}

fn src(sub: &[&str]) -> PathBuf {
    sub.iter()
        .fold(Path::new(env!("CARGO_MANIFEST_DIR")).join("src"), |p, s| p.join(s))
}

fn rel(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Every non-comment line in `dir` containing one of `forbidden`.
fn scan(dir: &Path, forbidden: &[&str]) -> Vec<String> {
    let mut violations = Vec::new();
    for file in collect_rs_files(dir) {
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            for needle in forbidden {
                if line.contains(needle) {
                    violations.push(format!("{}:{}: `{needle}`: {line}", rel(&file), i + 1));
                }
            }
        }
    }
    violations
}

#[test]
fn domain_is_pure() {
    let violations = scan(
        &src(&["domain"]),
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_does_not_depend_on_adapters() {
    let violations = scan(
        &src(&["application"]),
        &["crate::infra", "crate::commands", "crate::output", "reqwest", "std::fs"],
    );
    assert!(
        violations.is_empty(),
        "application/ must reach adapters only through ports:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = scan(&src(&["infra"]), &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src(&["infra"])) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let mut tracker = CfgTestTracker::new();
        for (i, line) in content.lines().enumerate() {
            let in_test = tracker.process_line(line);
            if in_test || line.trim().starts_with("//") {
                continue;
            }
            if line.contains("println!") || line.contains("eprintln!") {
                violations.push(format!("{}:{}: {line}", rel(&file), i + 1));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "infra/ must log through tracing, not println!/eprintln!:\n{}",
        violations.join("\n")
    );
}

#[test]
fn processes_are_spawned_only_in_infra() {
    let mut violations = Vec::new();
    for dir in ["application", "commands", "domain", "output"] {
        violations.extend(scan(
            &src(&[dir]),
            &["tokio::process::Command", "std::process::Command", "TokioCommandRunner::"],
        ));
    }
    assert!(
        violations.is_empty(),
        "Process execution must go through the CommandRunner port:\n{}",
        violations.join("\n")
    );
}

#[test]
fn services_take_trait_bounds_not_adapters() {
    let concrete = ["TerraformCli<", "ArmSqlInspector<", "FsTemplateStager", "TerminalReporter"];
    let mut violations = Vec::new();
    for file in collect_rs_files(&src(&["application", "services"])) {
        for (i, line) in read_non_comment_lines(&file).iter().enumerate() {
            if !line.contains("fn ") {
                continue;
            }
            for ty in &concrete {
                if line.contains(ty) {
                    violations.push(format!("{}:{}: `{ty}` in signature: {line}", rel(&file), i + 1));
                }
            }
        }
    }
    assert!(
        violations.is_empty(),
        "Services must be generic over ports:\n{}",
        violations.join("\n")
    );
}

/// Each file in `commands/` stays a thin handler.
#[test]
fn command_handlers_are_reasonably_sized() {
    let mut violations: Vec<String> = Vec::new();

    for file in collect_rs_files(&src(&["commands"])) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let line_count = count_non_test_lines(&content);
        if line_count > 125 {
            violations.push(format!("{}: {line_count} non-test lines (limit: 125)", rel(&file)));
        }
    }

    assert!(
        violations.is_empty(),
        "Command handler files exceed 125-line limit; extract logic to application services:\n{}",
        violations.join("\n")
    );
}

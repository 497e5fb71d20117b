use std::fs;
use std::path::{Path, PathBuf};

fn rs_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

fn rel(path: &Path) -> String {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let rel = path
        .strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .to_string();
    rel.replace('\\', "/")
}

#[test]
fn engine_does_not_depend_on_providers_or_runtime() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src/engine");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        for forbidden in [
            "sysinfo",
            "crate::system",
            "tokio::spawn",
            "tokio::time",
            "tokio::task",
            "tokio::runtime",
            "async fn",
            ".await",
        ] {
            if content.contains(forbidden) {
                violations.push(format!(
                    "{} uses forbidden dependency `{}`",
                    rel(&file),
                    forbidden
                ));
            }
        }
    }

    assert!(
        violations.is_empty(),
        "Engine layering violations:\n{}",
        violations.join("\n")
    );
}

#[test]
fn only_the_collector_touches_sysinfo() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut violations = Vec::new();

    for file in rs_files(&root) {
        let content = fs::read_to_string(&file).unwrap_or_default();
        if !content.contains("sysinfo::") {
            continue;
        }

        let rel_path = rel(&file);
        if rel_path != "src/system/collector.rs" {
            violations.push(format!(
                "{} imports `sysinfo` outside the live collector",
                rel_path
            ));
        }
    }

    assert!(
        violations.is_empty(),
        "Unexpected sysinfo usage:\n{}",
        violations.join("\n")
    );
}

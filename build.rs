use std::fs;
use std::path::{Path, PathBuf};

fn main() {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR missing");
    let src_dir = Path::new(&manifest_dir).join("src");
    println!("cargo:rerun-if-changed=src");

    let mut files = Vec::new();
    collect_rs_files(&src_dir, &mut files);
    for path in files {
        let contents = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
        enforce_egress_guards(&contents, &path);
    }
}

fn collect_rs_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return,
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_rs_files(&path, files);
        } else if path.extension().and_then(|s| s.to_str()) == Some("rs") {
            files.push(path);
        }
    }
}

/// Requests go out through the native client and its proxy only: no child
/// processes and no proxy bypass anywhere under src/.
fn enforce_egress_guards(contents: &str, path: &Path) {
    let forbidden = [
        "std::process::Command",
        "process::Command",
        "Command::new",
        ".no_proxy(",
        "NoProxy",
    ];

    for token in forbidden {
        if contents.contains(token) {
            panic!(
                "Forbidden token `{}` in egress source: {}",
                token,
                path.display()
            );
        }
    }
}

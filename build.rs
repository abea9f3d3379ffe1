use std::{
    process::Command,
    time::{SystemTime, UNIX_EPOCH},
};

fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");
    println!("cargo:rerun-if-env-changed=SECUOPS_VERSION_CODE");

    let version = match git(&["describe", "--tags", "--always", "--dirty"]) {
        Some(described) => {
            // Strip 'v' prefix if present (e.g., "v0.2.3" -> "0.2.3")
            let version = described.strip_prefix('v').unwrap_or(&described);

            if version.ends_with("-dirty") || version.is_empty() {
                format!("{}-{}", version, timestamp())
            } else {
                version.to_string()
            }
        }
        None => format!("0.0.0-unknown-{}", timestamp()),
    };

    // The version code only ever grows: an explicit override wins, otherwise
    // the number of commits reachable from HEAD.
    let version_code = std::env::var("SECUOPS_VERSION_CODE")
        .ok()
        .filter(|code| code.parse::<i64>().is_ok())
        .or_else(|| git(&["rev-list", "--count", "HEAD"]))
        .unwrap_or_else(|| "0".to_string());

    println!("cargo:rustc-env=SECUOPS_VERSION_NAME={}", version);
    println!("cargo:rustc-env=SECUOPS_VERSION_CODE={}", version_code);
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8(output.stdout).unwrap_or_default();
    let trimmed = stdout.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("Time went backwards")
        .as_secs()
}

// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-env-changed=LIVECAST_VERSION");

    // Packagers may pin the version string explicitly
    let version = match std::env::var("LIVECAST_VERSION") {
        Ok(v) => v,
        Err(_) => build_version(),
    };

    println!("cargo::rustc-env=LIVECAST_BUILD_VERSION={}", version);
}

/// "<crate version>-<short hash>", or just the crate version outside a git checkout
fn build_version() -> String {
    let base = std::env::var("CARGO_PKG_VERSION").unwrap_or_else(|_| "0.0.0".to_string());

    match commit_hash() {
        Some(hash) => format!("{}-{}", base, hash),
        None => base,
    }
}

fn commit_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()?;

    if output.status.success() {
        Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        None
    }
}

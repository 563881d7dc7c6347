use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=BUILD_VERSION");

    // Prefer an explicit BUILD_VERSION (CI / Docker), then the git hash.
    let version = std::env::var("BUILD_VERSION").ok().unwrap_or_else(|| {
        Command::new("git")
            .args(["rev-parse", "--short=8", "HEAD"])
            .output()
            .ok()
            .filter(|o| o.status.success())
            .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
            .unwrap_or_default()
    });

    println!("cargo:rustc-env=BUILD_VERSION={}", version);
}

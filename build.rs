//! Build script for the supervisor firmware
//!
//! Handles:
//! - Linker scripts for the embedded binary (cortex-m-rt + defmt)
//! - Re-run triggers

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Only bare-metal ARM targets get the runtime and defmt linker scripts.
    // Host builds (tests with `--features std`) link normally.
    let target = std::env::var("TARGET").unwrap_or_default();
    if target.starts_with("thumb") {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}

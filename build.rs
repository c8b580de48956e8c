//! Build script for the meter firmware
//!
//! Handles:
//! - Linker scripts for the embedded binary (`link.x`, `defmt.x`)
//!
//! Host builds of the library need nothing from here.

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    if std::env::var_os("CARGO_FEATURE_EMBEDDED").is_some() {
        println!("cargo:rustc-link-arg-bins=--nmagic");
        println!("cargo:rustc-link-arg-bins=-Tlink.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }
}

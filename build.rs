//! Embeds the resolved `Cargo.lock` so crash dumps can list compiled-in crates.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-changed=Cargo.lock");

    let manifest_dir = PathBuf::from(env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
    let out_dir = PathBuf::from(env::var_os("OUT_DIR").unwrap_or_default());

    // A missing lockfile embeds an empty document; the inspector reports no packages.
    let lock = fs::read_to_string(manifest_dir.join("Cargo.lock")).unwrap_or_default();
    if let Err(err) = fs::write(out_dir.join("Cargo.lock.embedded"), lock) {
        println!("cargo:warning=failed to embed Cargo.lock: {err}");
    }
}

//! Build script for the storefront crate.
//!
//! Fingerprints `static/css/main.css` so the stylesheet can be served with a
//! long cache lifetime. The short hash is exposed as `CSS_HASH` and a copy is
//! written to `static/css/derived/main.<hash>.css`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the SHA-256 digest.
const HASH_LEN: usize = 8;

fn main() {
    let Some(manifest_dir) = env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        println!("cargo:warning=CARGO_MANIFEST_DIR not set; skipping CSS fingerprint");
        println!("cargo:rustc-env=CSS_HASH=");
        return;
    };

    let hash = fingerprint_css(&manifest_dir).unwrap_or_else(|e| {
        println!("cargo:warning=CSS fingerprint failed: {e}");
        String::new()
    });
    println!("cargo:rustc-env=CSS_HASH={hash}");
}

fn fingerprint_css(manifest_dir: &Path) -> std::io::Result<String> {
    let css_path = manifest_dir.join("static/css/main.css");
    println!("cargo:rerun-if-changed={}", css_path.display());

    let content = fs::read(&css_path)?;
    let digest = format!("{:x}", Sha256::digest(&content));
    let hash: String = digest.chars().take(HASH_LEN).collect();

    let derived_dir = manifest_dir.join("static/css/derived");
    fs::create_dir_all(&derived_dir)?;
    fs::write(derived_dir.join(format!("main.{hash}.css")), &content)?;

    Ok(hash)
}

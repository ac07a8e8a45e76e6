//! Offline signer: produces the per-file signature manifest a release ships

use skylift::crypto;
use skylift::verifier::{self, MANIFEST_REL_PATH};
use std::env;
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: sign_release <private_key.pem> <release_dir>");
        eprintln!();
        eprintln!("Signs every file in the release directory and writes {MANIFEST_REL_PATH}");
        std::process::exit(1);
    }

    let key = crypto::load_private_key(&fs::read_to_string(&args[1])?)?;
    let release_dir = Path::new(&args[2]);

    let manifest = verifier::sign_tree(release_dir, &key)?;
    if manifest.is_empty() {
        eprintln!("❌ No files to sign in {}", release_dir.display());
        std::process::exit(1);
    }
    verifier::write_manifest(release_dir, &manifest)?;

    eprintln!("✓ Signed {} files", manifest.len());
    eprintln!("Manifest: {}", release_dir.join(MANIFEST_REL_PATH).display());

    Ok(())
}

//! Offline check that a release directory verifies against a public key

use skylift::crypto;
use skylift::provider::{Local, Provider};
use skylift::verifier;
use std::env;
use std::fs;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: verify_release <public_key.pem> <release_dir>");
        std::process::exit(1);
    }

    let key = crypto::load_public_key(&fs::read(&args[1])?)?;
    let mut provider = Local::new(&args[2]);
    provider.open()?;

    let scratch = tempfile::tempdir()?;
    match verifier::verify(&mut provider, &key, scratch.path()) {
        Ok(files) => {
            println!("✓ {} files verified", files.len());
            println!();
            println!("Release is authentic and unmodified.");
        }
        Err(err) => {
            eprintln!("❌ VERIFICATION FAILED: {err}");
            std::process::exit(1);
        }
    }

    let _ = provider.close();
    Ok(())
}

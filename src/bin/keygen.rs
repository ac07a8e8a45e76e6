//! Key generation tool for release signing

use skylift::crypto;
use std::env;
use std::fs;
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let out_dir = Path::new(args.get(1).map(String::as_str).unwrap_or("."));

    eprintln!("Generating RSA-{} signing keypair...", crypto::KEY_BITS);
    let (private, public) = crypto::generate_keypair()?;

    fs::create_dir_all(out_dir)?;
    let private_path = out_dir.join("signing_key.pem");
    let public_path = out_dir.join("signing_key.pub.pem");
    fs::write(&private_path, crypto::private_key_to_pem(&private)?)?;
    fs::write(&public_path, crypto::public_key_to_pem(&public)?)?;

    eprintln!();
    eprintln!("=== Release signing keypair ===");
    eprintln!();
    eprintln!("PRIVATE KEY (keep secret!):");
    eprintln!("  {}", private_path.display());
    eprintln!("PUBLIC KEY (ship with the program):");
    eprintln!("  {}", public_path.display());
    eprintln!();
    eprintln!("IMPORTANT:");
    eprintln!("1. Store the private key in your CI secret store");
    eprintln!("2. Point public_key_path in config.toml at the public key");
    eprintln!("3. NEVER commit the private key to version control!");

    Ok(())
}

use std::{env, error::Error, path::PathBuf};

fn main() -> Result<(), Box<dyn Error>> {
    let dir: PathBuf = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    println!("cargo:rustc-link-search={}", dir.display());
    println!("cargo:rerun-if-changed=link.x");
    Ok(())
}

use std::fs;
use std::path::PathBuf;

// Embeds the workspace VERSION file as SOILSCAN_VERSION.
fn main() {
    let manifest_dir = PathBuf::from(std::env::var("CARGO_MANIFEST_DIR").expect("manifest dir"));
    let workspace_root = manifest_dir
        .ancestors()
        .nth(2)
        .expect("crate lives two levels below the workspace root");
    let version_file = workspace_root.join("VERSION");

    println!("cargo:rerun-if-changed={}", version_file.display());

    let contents = fs::read_to_string(&version_file)
        .unwrap_or_else(|error| panic!("cannot read {}: {error}", version_file.display()));
    let version = contents.lines().next().unwrap_or_default().trim();
    if version.is_empty() {
        panic!("{} must start with a version line", version_file.display());
    }

    println!("cargo:rustc-env=SOILSCAN_VERSION={version}");
}

fn main() {
    // The C header only describes the OpenVR-backed ABI.
    if std::env::var_os("CARGO_FEATURE_OPENVR").is_none() {
        return;
    }

    let crate_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap();
    let config = cbindgen::Config::from_file("cbindgen.toml").unwrap_or_default();

    if let Ok(bindings) = cbindgen::Builder::new()
        .with_crate(&crate_dir)
        .with_config(config)
        .generate()
    {
        bindings.write_to_file(format!("{}/include/ovr_tracking.h", crate_dir));
    }
}

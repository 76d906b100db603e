fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // esp-idf-sys exports the linker arguments for the device image; host
    // builds (tests, simulation) have nothing to link against.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}

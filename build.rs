fn main() {
    // Host builds (tests, fuzzing) have no ESP-IDF toolchain to probe.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

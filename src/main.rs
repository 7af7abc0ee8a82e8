fn main() {
    #[cfg(feature = "cli")]
    resdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("resdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}

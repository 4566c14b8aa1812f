fn main() {
    #[cfg(feature = "cli")]
    phdiff::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("phdiff: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}

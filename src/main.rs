fn main() {
    #[cfg(feature = "cli")]
    pltdecode::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("pltdecode: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}

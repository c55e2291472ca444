fn main() {
    use clap::Parser;
    use std::error::Error;
    let args = fanfic2ebook::cli::Args::parse();
    if let Err(e) = fanfic2ebook::logging::init(args.verbosity()) {
        eprintln!("Warning: {:#}", e);
    }
    if let Err(e) = fanfic2ebook::cli::run(&args) {
        eprintln!("{}", e);
        if args.verbose > 0 {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}

mod cli;

fn main() {
    if let Err(e) = cli::run() {
        if e.downcast_ref::<cli::Reported>().is_some() {
            // Already shown through the console notifier.
            std::process::exit(1);
        }
        eprintln!("{e:#}"); // pretty anyhow chain
        std::process::exit(1);
    }
}

// src/main.rs

use taskloader::{cli, demo, logging};

// No async main: the loader blocks on its own runtime.
fn main() {
    if let Err(err) = run_main() {
        eprintln!("taskloader error: {err:?}");
        std::process::exit(1);
    }
}

fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    demo::run(args)
}

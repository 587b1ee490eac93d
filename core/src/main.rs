mod args;
mod report;

use std::error::Error;
use std::fs::File;
use std::thread;

use analysis::{Analyzer, CancelToken};
use args::Args;
use clap::Parser;
use log::{error, info};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};

fn main() -> Result<(), Box<dyn Error>> {
    let args = init()?;

    let analyzer = Analyzer::start(&args.config())?;
    let requests = args.requests();
    info!(
        "Analyzing {} position(s) with {} engine(s)",
        requests.len(),
        args.pool_size
    );

    let cancel = CancelToken::new();
    let handler_cancel = cancel.clone();
    ctrlc::set_handler(move || handler_cancel.cancel())?;

    let results: Vec<_> = thread::scope(|scope| {
        let analyzer = &analyzer;
        let cancel = &cancel;
        let handles: Vec<_> = requests
            .iter()
            .map(|request| scope.spawn(move || analyzer.analyze_with_cancel(request, cancel)))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("analysis thread panicked"))
            .collect()
    });

    for (request, result) in requests.iter().zip(&results) {
        match result {
            Ok(result) => report::print_result(result),
            Err(e) => {
                error!("Analysis of {} failed: {}", request.position, e);
                report::print_failure(request, e);
            }
        }
    }

    analyzer.shutdown();
    Ok(())
}

fn init() -> Result<Args, Box<dyn Error>> {
    let args = Args::parse();

    match &args.log_file {
        Some(log_file) => {
            WriteLogger::init(args.log_level, Config::default(), File::create(log_file)?)?
        }
        None => TermLogger::init(
            args.log_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        )?,
    }

    Ok(args)
}

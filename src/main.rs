mod asset_name;
mod commands;
mod convert;
mod options;
mod pipeline;
mod resolve;
mod seventv_api;
mod variant;

#[cfg(test)]
mod test_images;

use std::{env, panic, process};

use anyhow::Result;
use backtrace::Backtrace;
use clap::Parser;
use tokio::signal;

use crate::commands::Command;
use crate::options::Options;

/// Exit status after an interrupt, matching shells' 128 + SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

async fn run(options: Options) -> Result<(), anyhow::Error> {
    match options.command {
        Command::Download(sub_options) => commands::download(options.global, sub_options).await,
        Command::List(sub_options) => commands::list(options.global, sub_options).await,
    }
}

#[tokio::main]
async fn main() {
    panic::set_hook(Box::new(|panic_info| {
        // PanicInfo's payload is usually a &'static str or String.
        // See: https://doc.rust-lang.org/beta/std/panic/struct.PanicInfo.html#method.payload
        let message = match panic_info.payload().downcast_ref::<&str>() {
            Some(&message) => message.to_string(),
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(message) => message.clone(),
                None => "<no message>".to_string(),
            },
        };

        eprintln!("emoteset-dl crashed!");
        eprintln!("This is probably a bug.");
        eprintln!();
        eprintln!(
            "Please consider filing an issue: {}/issues",
            env!("CARGO_PKG_REPOSITORY")
        );
        eprintln!();
        eprintln!("If you can reproduce this crash, try adding the -v, -vv, or -vvv flags.");
        eprintln!("This might give you more information to figure out what went wrong!");
        eprintln!();
        eprintln!("Details: {}", message);

        if let Some(location) = panic_info.location() {
            eprintln!("in file {} on line {}", location.file(), location.line());
        }

        // When using the backtrace crate, we need to check the RUST_BACKTRACE
        // environment variable ourselves.
        let should_backtrace = env::var("RUST_BACKTRACE")
            .map(|var| var == "1")
            .unwrap_or(false);

        if should_backtrace {
            eprintln!("{:?}", Backtrace::new());
        } else {
            eprintln!(
                "note: run with `RUST_BACKTRACE=1` environment variable to display a backtrace."
            );
        }

        process::exit(1);
    }));

    let options = Options::parse();

    let log_filter = match options.global.verbosity {
        0 => "info",
        1 => "info,emoteset_dl=debug",
        2 => "info,emoteset_dl=trace",
        _ => "trace",
    };

    let log_env = env_logger::Env::default().default_filter_or(log_filter);

    env_logger::Builder::from_env(log_env)
        .format_module_path(false)
        .format_timestamp(None)
        // Indent following lines equal to the log level label, like `[ERROR] `
        .format_indent(Some(8))
        .init();

    // Dropping the run future on ctrl-c stops it at its next await point,
    // which is never in the middle of writing a file.
    tokio::select! {
        result = run(options) => {
            if let Err(err) = result {
                log::error!("{:?}", err);
                process::exit(1);
            }
        },
        _ = signal::ctrl_c() => {
            log::warn!("interrupted, exiting now");
            process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
}

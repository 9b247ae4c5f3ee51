#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::process::exit;

use clap::{ArgAction, ArgGroup, Parser};
use tracing::error;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

mod commands;
mod console;
mod interactive;

use crate::commands::Subcommand;

#[derive(Parser)]
#[clap(version, author, about, group = ArgGroup::new("format"))]
struct Opt {
    /// Log more details. Repeat for even more (`-vv`, `-vvv`)
    #[clap(short, long, action = ArgAction::Count, global(true))]
    verbose: u8,

    /// Always color log messages
    #[clap(short = 'c', long, global(true), group = "format")]
    color: bool,

    /// Never color log messages
    #[clap(short = 'C', long, global(true), group = "format")]
    no_color: bool,

    /// Write log messages as JSON lines
    #[clap(short, long, global(true), group = "format")]
    json: bool,

    #[clap(subcommand)]
    command: Subcommand,
}

impl Opt {
    /// Directives used when `RUST_LOG` is not set
    const fn default_directives(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "c6461_emulator=debug,c6461_cli=debug,info",
            2 => "c6461_emulator=trace,c6461_cli=trace,info",
            3 => "c6461_emulator=trace,c6461_cli=trace,debug",
            4..=u8::MAX => "trace",
        }
    }

    /// Colors are used when stderr is a terminal, unless forced either way
    fn ansi(&self) -> bool {
        match (self.color, self.no_color) {
            (true, _) => true,
            (_, true) => false,
            _ => std::io::stderr().is_terminal(),
        }
    }

    /// Install the global subscriber. Logs always go to stderr, leaving stdout to the printer.
    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_directives()));
        let registry = tracing_subscriber::Registry::default().with(filter);

        if self.json {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .without_time()
                        .with_ansi(self.ansi())
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    }
}

fn main() {
    let opt = Opt::parse();
    opt.init_tracing();

    if let Err(e) = opt.command.exec() {
        error!("{:#}", e);
        exit(1);
    }
}

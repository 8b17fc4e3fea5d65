//! Command-line driver: runs one bundled demo scenario through `proof` and
//! prints a rendered counter-example (or a success line) to stdout.
//!
//! Kept deliberately thin -- everything it does is a direct call into the
//! library crate. `clap`/`simple_logger` wiring mirrors how metamath-knife's
//! own `[[bin]]` target is a wrapper around `Database`, not where any real
//! logic lives.

use clap::{App, Arg};

use blacheck::render::{LongRenderer, Renderer, ShortRenderer};
use blacheck::{demos, proof, CheckOptions};

fn main() {
    let matches = App::new("blacheck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Exhaustively checks one of the bundled demo concurrent programs")
        .arg(
            Arg::with_name("demo")
                .long("demo")
                .takes_value(true)
                .possible_values(demos::NAMES)
                .required(true)
                .help("Which bundled scenario to check"),
        )
        .arg(
            Arg::with_name("long")
                .long("long")
                .conflicts_with("short")
                .help("Render the counter-example as a full step-by-step dump"),
        )
        .arg(
            Arg::with_name("short")
                .long("short")
                .conflicts_with("long")
                .help("Render the counter-example as a compact table (default)"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .multiple(true)
                .help("Increase log verbosity (-v, -vv, -vvv)"),
        )
        .get_matches();

    let level = match matches.occurrences_of("verbose") {
        0 => log::Level::Warn,
        1 => log::Level::Info,
        2 => log::Level::Debug,
        _ => log::Level::Trace,
    };
    simple_logger::init_with_level(level).expect("a second logger was already installed");

    let demo_name = matches.value_of("demo").expect("--demo is required");
    let build = demos::by_name(demo_name).expect("clap already validated this against NAMES");

    let (programs, memory_map, assertions) = match build() {
        Ok(triple) => triple,
        Err(e) => {
            eprintln!("{}", blacheck::diag::render(&e.into()));
            std::process::exit(2);
        }
    };

    let options = CheckOptions {
        log_transitions: matches.occurrences_of("verbose") >= 3,
    };
    let ctx = match proof(programs, memory_map, &assertions, options) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{}", blacheck::diag::render(&e.into()));
            std::process::exit(2);
        }
    };

    let renderer: Box<dyn Renderer> = if matches.is_present("long") {
        Box::new(LongRenderer)
    } else {
        Box::new(ShortRenderer)
    };

    match renderer.render(&ctx) {
        Ok(text) => print!("{text}"),
        Err(e) => {
            eprintln!("{}", blacheck::diag::render(&e.into()));
            std::process::exit(2);
        }
    }

    std::process::exit(if ctx.proved() { 0 } else { 1 });
}

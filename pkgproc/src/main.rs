// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    anyhow::{anyhow, Context, Result},
    clap::{Arg, ArgAction, ArgMatches, Command},
    log::LevelFilter,
    pkgproc::{host, registry},
    std::io::Write,
};

const RUN_ABOUT: &str = "\
Run a single processor.

The input environment starts out empty. --env loads a property list
dictionary from a file, or from standard input when given `-`. KEY=VALUE
arguments are then applied on top of it as string values.

Declared defaults are applied and required inputs are checked before the
processor runs. On success the full output environment is written to
standard output as an XML property list.

External tool locations can be overridden with PKGUTIL_PATH, HDIUTIL_PATH,
DITTO_PATH, SECURITY_PATH, MAKECATALOGS_PATH and GIT_PATH, either in the
environment plist or in the process environment. RECIPE_CACHE_DIR sets the
directory receiving working files and PROCESSOR_TOOL_TIMEOUT bounds the
run time of external tools in seconds.
";

fn command_list() -> Result<()> {
    let processors = registry::processors();
    let width = processors.iter().map(|p| p.name().len()).max().unwrap_or(0);

    for processor in processors {
        println!(
            "{:width$}  {}",
            processor.name(),
            host::summary(processor.as_ref()),
            width = width
        );
    }

    Ok(())
}

fn command_info(args: &ArgMatches) -> Result<()> {
    let name = args
        .get_one::<String>("name")
        .ok_or_else(|| anyhow!("processor name is required"))?;

    let processor = registry::find(name)?;
    print!("{}", host::describe(processor.as_ref()));

    Ok(())
}

fn command_run(args: &ArgMatches) -> Result<()> {
    let name = args
        .get_one::<String>("name")
        .ok_or_else(|| anyhow!("processor name is required"))?;
    let processor = registry::find(name)?;

    let assignments = args
        .get_many::<String>("vars")
        .unwrap_or_default()
        .map(|s| s.as_str());

    let mut env = host::load_environment(
        args.get_one::<String>("env").map(|s| s.as_str()),
        std::io::stdin().lock(),
        assignments,
    )?;

    processor_common::execute(processor.as_ref(), &mut env)?;

    let xml = env.to_xml()?;
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&xml)
        .and_then(|()| stdout.flush())
        .context("writing output environment")?;

    Ok(())
}

fn main_impl() -> Result<()> {
    let app = Command::new("pkgproc")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run macOS recipe processors outside a packaging host")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::Count)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(Command::new("list").about("List available processors"));

    let app = app.subcommand(
        Command::new("info")
            .about("Describe the input and output variables of a processor")
            .arg(
                Arg::new("name")
                    .required(true)
                    .value_name("NAME")
                    .help("Name of processor to describe"),
            ),
    );

    let app = app.subcommand(
        Command::new("run")
            .about("Run a processor and print its output environment")
            .long_about(RUN_ABOUT)
            .arg(
                Arg::new("env")
                    .long("env")
                    .value_name("PLIST")
                    .help("Property list file holding the input environment, or - for stdin"),
            )
            .arg(
                Arg::new("name")
                    .required(true)
                    .value_name("NAME")
                    .help("Name of processor to run"),
            )
            .arg(
                Arg::new("vars")
                    .value_name("KEY=VALUE")
                    .num_args(0..)
                    .help("Input variables to set"),
            ),
    );

    let matches = app.get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    // HTTP plumbing is chatty at info level.
    if log_level == LevelFilter::Info {
        builder.filter_module("rustls", LevelFilter::Error);
        builder.filter_module("reqwest", LevelFilter::Warn);
    }

    builder.init();

    match matches.subcommand() {
        Some(("list", _)) => command_list(),
        Some(("info", args)) => command_info(args),
        Some(("run", args)) => command_run(args),
        _ => Err(anyhow!("unknown command")),
    }
}

fn main() {
    let exit_code = match main_impl() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            1
        }
    };

    std::process::exit(exit_code)
}

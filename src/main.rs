use anyhow::{anyhow, Result};
use clap::{crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::Path;
use tipsite::build::{build_site, check_site, Report};
use tipsite::config::Config;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    let matches = App::new("tipsite")
        .version(crate_version!())
        .about("Builds a navigable site from a directory of Tip of the Week articles")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .multiple(true)
                .global(true)
                .help("Raises the log level; repeat for more detail"),
        )
        .arg(
            Arg::with_name("log-format")
                .long("log-format")
                .takes_value(true)
                .possible_values(&["text", "json"])
                .default_value("text")
                .global(true)
                .help("The format of log output"),
        )
        .subcommand(
            SubCommand::with_name("build")
                .about("Builds the site")
                .arg(
                    Arg::with_name("output")
                        .short("o")
                        .long("output")
                        .takes_value(true)
                        .default_value("_site")
                        .help("The directory to write the site into"),
                )
                .arg(deny_warnings()),
        )
        .subcommand(
            SubCommand::with_name("check")
                .about("Loads the tips and checks their references without writing anything")
                .arg(deny_warnings()),
        )
        .get_matches();

    init_tracing(&matches);

    if let Err(e) = run(&matches) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn deny_warnings<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("deny-warnings")
        .long("deny-warnings")
        .help("Fails when a tip is rejected or a reference doesn't resolve")
}

fn init_tracing(matches: &ArgMatches) {
    let filter = match matches.occurrences_of("verbose") {
        0 => "tipsite=info",
        1 => "tipsite=debug",
        _ => "tipsite=trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match matches.value_of("log-format") {
        Some("json") => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init(),
    }
}

fn run(matches: &ArgMatches) -> Result<()> {
    let cwd = std::env::current_dir()?;
    match matches.subcommand() {
        ("build", Some(sub)) => {
            let output = cwd.join(Path::new(sub.value_of("output").unwrap_or("_site")));
            let config = Config::from_directory(&cwd)?;
            let report = build_site(&config, &output)?;
            info!(pages = report.pages, output = %output.display(), "done");
            finish(&report, sub.is_present("deny-warnings"))
        }
        ("check", Some(sub)) => {
            let config = Config::from_directory(&cwd)?;
            let report = check_site(&config)?;
            info!(tips = report.documents, "checked");
            finish(&report, sub.is_present("deny-warnings"))
        }
        (name, _) => Err(anyhow!("unknown subcommand `{}`", name)),
    }
}

/// Rejected tips and reference diagnostics have already been logged as they
/// were found; this fails the run if there were any and `deny_warnings` is
/// set.
fn finish(report: &Report, deny_warnings: bool) -> Result<()> {
    if !report.is_clean() {
        warn!(
            rejected = report.rejected.len(),
            diagnostics = report.diagnostics.len(),
            "finished with warnings"
        );
    }
    if deny_warnings && !report.is_clean() {
        return Err(anyhow!(
            "{} tip(s) rejected and {} reference diagnostic(s)",
            report.rejected.len(),
            report.diagnostics.len()
        ));
    }
    Ok(())
}

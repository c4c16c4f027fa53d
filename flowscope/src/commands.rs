use crate::CLAP_STYLING;
use clap::{arg, command};

pub const DEFAULT_CACHE_PATH: &str = "~/.config/flowscope/cache.db";

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("flowscope")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("flowscope")
        .about("Map the navigable structure of a website or a GitHub repository")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Enable debug logging")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(--"cache" <PATH>)
                .required(false)
                .global(true)
                .help("Location of the result cache database")
                .default_value(DEFAULT_CACHE_PATH),
        )
        .arg(
            arg!(--"no-cache")
                .required(false)
                .global(true)
                .help("Skip the result cache: always run the pipeline and store nothing")
                .action(clap::ArgAction::SetTrue),
        )
        .subcommand_required(true)
        .subcommand(
            command!("crawl")
                .about("Crawl a website and map the pages reachable from its entry point")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("The website to crawl"),
                )
                .arg(
                    arg!(--"max-pages" <NUM>)
                        .required(false)
                        .help("Maximum number of pages to visit (1-30)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("30"),
                )
                .arg(
                    arg!(--"max-depth" <NUM>)
                        .required(false)
                        .help("Maximum link hops from the entry point (1-5)")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"delay" <MS>)
                        .required(false)
                        .help("Pause between page fetches in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("1000"),
                )
                .arg(
                    arg!(--"timeout" <MS>)
                        .required(false)
                        .help("Per-request timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("10000"),
                )
                .arg(
                    arg!(--"no-robots")
                        .required(false)
                        .help("Ignore robots.txt")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"user-agent" <UA>)
                        .required(false)
                        .help("User-Agent header sent with every request"),
                )
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("analyze")
                .about("Extract the route table of a GitHub-hosted web application")
                .arg(
                    arg!(-r --"repo" <REPO_URL>)
                        .required(true)
                        .help("GitHub repository URL, e.g. https://github.com/owner/repo"),
                )
                .arg(
                    arg!(--"token" <TOKEN>)
                        .required(false)
                        .env("GITHUB_TOKEN")
                        .hide_env_values(true)
                        .help("GitHub token; raises the API rate limit"),
                )
                .arg(
                    arg!(--"nested")
                        .required(false)
                        .help("Nest child routes under their parents in the report")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(format_arg())
                .arg(output_arg()),
        )
        .subcommand(
            command!("cache")
                .about("Manage the result cache")
                .subcommand_required(true)
                .subcommand(command!("list").about("List cached websites and repositories"))
                .subcommand(command!("clear").about("Delete every cached result")),
        )
}

fn format_arg() -> clap::Arg {
    arg!(-f --"format" <FORMAT>)
        .required(false)
        .help("Report format: text, json")
        .value_parser(["text", "json"])
        .default_value("text")
}

fn output_arg() -> clap::Arg {
    arg!(-o --"output" <PATH>)
        .required(false)
        .help("Save report to file (default: display to screen)")
        .value_parser(clap::value_parser!(std::path::PathBuf))
}

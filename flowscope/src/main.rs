use flowscope::command_argument_builder;
use flowscope::handlers::{
    exit_code, handle_analyze, handle_cache_clear, handle_cache_list, handle_crawl, print_banner,
    print_error,
};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");
    init_logging(chosen_command.get_flag("verbose"));

    if !quiet {
        print_banner();
    }

    let outcome = match chosen_command.subcommand() {
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("analyze", primary_command)) => handle_analyze(primary_command, quiet).await,
        Some(("cache", primary_command)) => match primary_command.subcommand() {
            Some(("list", secondary_command)) => handle_cache_list(secondary_command),
            Some(("clear", secondary_command)) => handle_cache_clear(secondary_command),
            _ => unreachable!("clap should ensure we don't get here"),
        },
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(err) = outcome {
        print_error(&err);
        std::process::exit(exit_code(&err));
    }
}

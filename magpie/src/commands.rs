use crate::CLAP_STYLING;
use clap::{arg, command};

fn harvest_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!([QUERY])
            .required(true)
            .help("The search query to harvest for"),
    )
    .arg(
        arg!(-n --"count" <COUNT>)
            .required(false)
            .help("How many new items to materialize this run")
            .value_parser(clap::value_parser!(usize))
            .default_value("20"),
    )
    .arg(
        arg!(--"render" <URL>)
            .required(false)
            .help("Base URL of the headless render service")
            .default_value("http://localhost:3000"),
    )
    .arg(
        arg!(--"token" <TOKEN>)
            .required(false)
            .help("Auth token appended to render service requests"),
    )
    .arg(
        arg!(-o --"out" <DIR>)
            .required(false)
            .help("Directory where artifacts are written")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(--"data" <DIR>)
            .required(false)
            .help("Data directory holding the processed ledger and run history")
            .default_value("~/.config/magpie/"),
    )
    .arg(
        arg!(--"overfetch" <FACTOR>)
            .required(false)
            .help("Discovery over-fetch factor applied to the target count")
            .value_parser(clap::value_parser!(usize))
            .default_value("3"),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Render request timeout in seconds")
            .value_parser(clap::value_parser!(u64))
            .default_value("30"),
    )
    .arg(
        arg!(--"ignore-existing")
            .required(false)
            .help("Re-download items whose artifact file already exists on disk")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"no-history")
            .required(false)
            .help("Skip recording this run in the history database")
            .action(clap::ArgAction::SetTrue),
    )
    .arg(
        arg!(--"report" <PATH>)
            .required(false)
            .help("Save the run report to a file (default: print summary to screen)")
            .value_parser(clap::value_parser!(std::path::PathBuf)),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json, markdown")
            .value_parser(["text", "json", "markdown"])
            .default_value("text"),
    )
}

pub(crate) fn command_argument_builder() -> clap::Command {
    clap::Command::new("magpie")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("magpie")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Initializes the magpie data directory and history database")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Location to store the magpie data directory")
                        .default_value("~/.config/magpie/"),
                )
                .arg(
                    arg!(-f - -"force")
                        .help(
                            "Forces the overwriting of any existing database at the specified \
                        location.",
                        )
                        .required(false),
                ),
        )
        .subcommand(
            harvest_args(
                command!("pins").about(
                    "Harvest pin images for a search query. Skips everything harvested \
                    by earlier runs.",
                ),
            )
            .arg(
                arg!(--"related" <PER_ITEM>)
                    .required(false)
                    .help("Also pull up to this many related pins per main result")
                    .value_parser(clap::value_parser!(usize))
                    .default_value("0"),
            ),
        )
        .subcommand(harvest_args(command!("docs").about(
            "Harvest documents for a search query as PDFs via the public embed viewer.",
        )))
        .subcommand(
            command!("triage")
                .about(
                    "Sort harvested files with a local vision model, moving matches into a \
                separate directory.",
                )
                .arg(
                    arg!(-i --"input" <DIR>)
                        .required(true)
                        .help("Directory of files to classify")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(-m --"matched" <DIR>)
                        .required(false)
                        .help("Where matched files are moved (default: <input>/matched)")
                        .value_parser(clap::value_parser!(std::path::PathBuf)),
                )
                .arg(
                    arg!(--"endpoint" <URL>)
                        .required(false)
                        .help("Base URL of the Ollama-compatible model endpoint")
                        .default_value("http://localhost:11434"),
                )
                .arg(
                    arg!(--"model" <NAME>)
                        .required(false)
                        .help("Model name to query")
                        .default_value("gemma3:4b"),
                )
                .arg(
                    arg!(--"prompt" <TEXT>)
                        .required(false)
                        .help("Override the yes/no triage question"),
                ),
        )
}

use std::path::PathBuf;

use clap::{ArgGroup, ArgMatches, Command, arg, command, value_parser};

pub(crate) fn cli() -> ArgMatches {
    command!()
        .subcommand(with_io(
            command!("chart").about("Translate lite-source into a flow graph (JSON)"),
        ))
        .subcommand(with_io(
            command!("code").about("Translate a flow graph (JSON) back into lite-source"),
        ))
        .subcommand(with_io(
            command!("import").about("Adapt an external CFG (JSON) onto the flow model"),
        ))
        .get_matches()
}

fn with_io(cmd: Command) -> Command {
    cmd.arg(arg!(-i --input <INPUT> "Raw input (inline)"))
        .arg(
            arg!(-f --file <INPUT> "Source file to process").value_parser(value_parser!(PathBuf)),
        )
        .group(
            ArgGroup::new("input-source")
                .args(["input", "file"])
                .required(true)
                .multiple(false),
        )
        .arg(arg!(-o --output <OUTPUT> "Output file").value_parser(value_parser!(PathBuf)))
}

mod cli;

use std::path::PathBuf;

use clap::ArgMatches;
use flowlite::{Error, cfg_to_flow, flow_to_source, source_to_flow};

fn main() {
    let matches = cli::cli();
    let result = match matches.subcommand() {
        Some(("chart", sub)) => chart(sub),
        Some(("code", sub)) => code(sub),
        Some(("import", sub)) => import(sub),
        _ => {
            eprintln!("No subcommand given, see --help");
            std::process::exit(1);
        }
    };
    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn read_input(matches: &ArgMatches) -> Result<String, Error> {
    if let Some(inline) = matches.get_one::<String>("input") {
        return Ok(inline.clone());
    }
    let path = matches
        .get_one::<PathBuf>("file")
        .ok_or_else(|| Error::InvalidInput("no input given".to_string()))?;
    Ok(std::fs::read_to_string(path)?)
}

fn write_output(matches: &ArgMatches, text: &str) -> Result<(), Error> {
    match matches.get_one::<PathBuf>("output") {
        Some(path) => std::fs::write(path, text)?,
        None => println!("{text}"),
    }
    Ok(())
}

fn chart(matches: &ArgMatches) -> Result<(), Error> {
    let src = read_input(matches)?;
    match source_to_flow(&src) {
        Ok(graph) => write_output(matches, &serde_json::to_string_pretty(&graph)?),
        Err(Error::Parse(warnings)) => {
            eprintln!("❌ Parse errors found:\n");
            for warning in warnings {
                eprintln!("  • {warning}");
            }
            std::process::exit(1);
        }
        Err(e) => Err(e),
    }
}

fn code(matches: &ArgMatches) -> Result<(), Error> {
    let input = read_input(matches)?;
    let graph = serde_json::from_str(&input)?;
    let outcome = flow_to_source(&graph);
    for warning in &outcome.warnings {
        eprintln!("  • {warning}");
    }
    write_output(matches, &outcome.text)
}

fn import(matches: &ArgMatches) -> Result<(), Error> {
    let input = read_input(matches)?;
    let cfg = serde_json::from_str(&input)?;
    let outcome = cfg_to_flow(&cfg);
    for diagnostic in &outcome.diagnostics {
        eprintln!("  • {diagnostic}");
    }
    write_output(matches, &serde_json::to_string_pretty(&outcome.graph)?)
}

use std::io;
use std::path::PathBuf;
use std::process;

use clap::{value_parser, Arg, ArgMatches, Command};
use log::{error, info};

use spectralio::io::xy::DEFAULT_SEPARATOR;
use spectralio::io::{FileSource, OptionError, ResolvedOptions, XYWriterOptions};
use spectralio::prelude::*;
use spectralio::{OpusExtReader, OpusReader, XYReader, XYWriter};

/// A format's subcommand: its reader options plus the input and output
fn reader_command<R: SpectrumReader>(name: &'static str, about: &'static str) -> Command {
    R::Options::command()
        .name(name)
        .about(about)
        .no_binary_name(false)
        .disable_help_flag(false)
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("the file to read, or - for standard input"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .help("write the spectrum as ASCII-XY to this path instead of printing it"),
        )
        .arg(
            Arg::new("output-separator")
                .long("output-separator")
                .default_value(DEFAULT_SEPARATOR)
                .help("the column separator of the ASCII-XY output"),
        )
}

fn cli() -> Command {
    Command::new("spectralio")
        .about("Read spectra from OPUS and ASCII-XY files")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(reader_command::<OpusReader>(
            "opus",
            "the main spectrum of a Bruker OPUS file",
        ))
        .subcommand(reader_command::<OpusExtReader>(
            "opus-ext",
            "every channel of a Bruker OPUS file",
        ))
        .subcommand(reader_command::<XYReader>("xy", "an ASCII-XY file"))
}

fn read<R: SpectrumReader>(
    mut reader: R,
    matches: &ArgMatches,
) -> Result<Vec<Spectrum>, SpectrumIOError> {
    let resolved = ResolvedOptions::from_matches(&R::Options::option_table(), matches);
    reader.set_options(R::Options::from_resolved(&resolved)?)?;

    let input = matches
        .get_one::<PathBuf>("input")
        .ok_or_else(|| OptionError::MissingValue("input".to_string()))?;
    let mut source = if input.as_os_str() == "-" {
        FileSource::from_stream(io::stdin().lock())
    } else {
        FileSource::from_path(input.clone())
    };
    let spectra = reader.read_source(&mut source)?;
    info!("Read {} spectra from {}", spectra.len(), input.display());
    Ok(spectra)
}

#[cfg(feature = "serde")]
fn show(spectrum: &Spectrum) {
    match serde_json::to_string(spectrum) {
        Ok(json) => println!("{json}"),
        Err(e) => error!("Failed to serialize {}: {e}", spectrum.id),
    }
}

#[cfg(not(feature = "serde"))]
fn show(spectrum: &Spectrum) {
    println!("{spectrum}");
    for (key, value) in spectrum.sample_data.iter() {
        println!("\t{key} = {value}");
    }
}

fn run(matches: &ArgMatches) -> Result<(), SpectrumIOError> {
    let (format, matches) = matches
        .subcommand()
        .ok_or_else(|| OptionError::MissingValue("format".to_string()))?;
    let spectra = match format {
        "opus" => read(OpusReader::new(), matches)?,
        "opus-ext" => read(OpusExtReader::new(), matches)?,
        "xy" => read(XYReader::new(), matches)?,
        other => {
            return Err(SpectrumIOError::Unsupported(format!(
                "unknown format {other:?}"
            )))
        }
    };

    match matches.get_one::<PathBuf>("output") {
        Some(target) => {
            let separator = matches
                .get_one::<String>("output-separator")
                .cloned()
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string());
            let writer = XYWriter::with_options(XYWriterOptions { separator });
            writer.write_path(&spectra, target)?;
            info!("Wrote {}", target.display());
        }
        None => {
            for spectrum in spectra.iter() {
                show(spectrum);
            }
        }
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let matches = cli().get_matches();
    if let Err(e) = run(&matches) {
        error!("{e}");
        eprintln!("{e}");
        process::exit(1);
    }
}

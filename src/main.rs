use std::env;
use std::fs;
use std::path::Path;
use std::process;

use env_logger;
use log;

use fsort::FileSorterBuilder;

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: log::LevelFilter = arg_parser
        .value_of("log_level")
        .expect("value has a default")
        .parse()
        .expect("value is pre-validated");
    init_logger(log_level);

    let input = Path::new(arg_parser.value_of("input").expect("value is required"));
    let output = Path::new(arg_parser.value_of("output").expect("value is required"));
    let num_pages: usize = arg_parser
        .value_of("num_pages")
        .expect("value has a default")
        .parse()
        .expect("value is pre-validated");

    let cwd = match env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            log::error!("working directory lookup error: {}", err);
            process::exit(2);
        }
    };
    let tmp_dir = cwd.join("fsort_tmp");
    if tmp_dir.exists() {
        if let Err(err) = fs::remove_dir_all(&tmp_dir) {
            log::error!("temp directory cleanup error: {}", err);
            process::exit(2);
        }
    }
    if let Err(err) = fs::create_dir_all(&tmp_dir) {
        log::error!("temp directory creation error: {}", err);
        process::exit(2);
    }

    let mut sorter = match FileSorterBuilder::new()
        .with_num_pages(num_pages)
        .with_tmp_dir(&tmp_dir)
        .build()
    {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(2);
        }
    };

    if let Err(err) = sorter.sort_file(input, output) {
        log::error!("file sorting error: {}", err);
        process::exit(2);
    }

    if let Err(err) = fs::remove_dir_all(&tmp_dir) {
        log::error!("temp directory removal error: {}", err);
        process::exit(2);
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    let app = clap::App::new("fsort")
        .about("memory-mapped external file line sorter")
        .arg(
            clap::Arg::new("input")
                .help("file to be sorted")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("output")
                .help("result file, created or overwritten")
                .required(true)
                .index(2),
        )
        .arg(
            clap::Arg::new("num_pages")
                .help("number of OS pages per sorting region")
                .index(3)
                .default_value("250")
                .validator(|v| {
                    let well_formed = !v.is_empty() && v.chars().all(|c| c.is_ascii_digit());
                    if well_formed && v.parse::<usize>().map(|n| n > 0).unwrap_or(false) {
                        Ok(())
                    } else {
                        Err(String::from("num_pages must be a positive decimal integer"))
                    }
                }),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(["off", "error", "warn", "info", "debug", "trace"]),
        );

    match app.try_get_matches() {
        Ok(matches) => matches,
        Err(err)
            if matches!(
                err.kind(),
                clap::ErrorKind::DisplayHelp | clap::ErrorKind::DisplayVersion
            ) =>
        {
            err.exit()
        }
        Err(err) => {
            eprintln!("{}", err);
            eprintln!("usage: fsort <input_file> <output_file> [num_pages]");
            process::exit(1);
        }
    }
}

fn init_logger(log_level: log::LevelFilter) {
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();
}

use std::fs::OpenOptions;
use std::path::Path;
use std::process;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use fsort::{MapUsage, MappedRegionMut};

fn main() {
    let arg_parser = build_arg_parser();

    let output = Path::new(arg_parser.value_of("output").expect("value is required"));
    let max_line_len: usize = arg_parser
        .value_of("max_line_len")
        .expect("value is required")
        .parse()
        .expect("value is pre-validated");
    let file_size: u64 = arg_parser
        .value_of("file_size")
        .expect("value is required")
        .parse()
        .expect("value is pre-validated");

    if let Err(err) = generate_file(output, max_line_len, file_size) {
        eprintln!("fgen: {}", err);
        process::exit(2);
    }
}

fn generate_file(output: &Path, max_line_len: usize, file_size: u64) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).create(true).open(output)?;
    file.set_len(file_size)?;
    drop(file);

    if file_size == 0 {
        return Ok(());
    }

    let mut map = MappedRegionMut::map(output, 0, file_size as usize)?;
    map.advise(MapUsage::Sequential)?;
    generate(&mut map, max_line_len, &mut SmallRng::from_entropy());
    Ok(())
}

/// Fills `data` with random bytes in `'/'..='~'` broken into lines of
/// 1..=`max_line_len` bytes. The final line is cut short by the end of the
/// buffer and left unterminated.
fn generate(data: &mut [u8], max_line_len: usize, rng: &mut SmallRng) {
    let mut pos = 0;
    while pos < data.len() {
        let len = usize::min(data.len() - pos, rng.gen_range(1..=max_line_len));
        for _ in 0..len {
            data[pos] = rng.gen_range(b'/'..=b'~');
            pos += 1;
        }
        if pos < data.len() {
            data[pos] = b'\n';
            pos += 1;
        }
    }
}

fn build_arg_parser() -> clap::ArgMatches {
    let digits = |v: &str| {
        if !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()) && v.parse::<u64>().is_ok() {
            Ok(())
        } else {
            Err(String::from("expected a decimal integer"))
        }
    };
    let positive = move |v: &str| {
        digits(v).and_then(|_| {
            if v.parse::<u64>().expect("value is pre-validated") > 0 {
                Ok(())
            } else {
                Err(String::from("expected a positive decimal integer"))
            }
        })
    };

    let app = clap::App::new("fgen")
        .about("random line-oriented test data generator")
        .arg(
            clap::Arg::new("output")
                .help("file to be filled, created or overwritten")
                .required(true)
                .index(1),
        )
        .arg(
            clap::Arg::new("max_line_len")
                .help("maximum line length in bytes")
                .required(true)
                .index(2)
                .validator(positive),
        )
        .arg(
            clap::Arg::new("file_size")
                .help("exact output size in bytes")
                .required(true)
                .index(3)
                .validator(digits),
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
            eprintln!("usage: fgen <output_file> <max_line_len> <file_size>");
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod test {
    use rand::rngs::SmallRng;
    use rand::SeedableRng;
    use rstest::*;

    use super::generate;

    #[rstest]
    #[case(1, 64)]
    #[case(8, 256)]
    #[case(300, 100)]
    fn test_generate(#[case] max_line_len: usize, #[case] size: usize) {
        let mut rng = SmallRng::seed_from_u64(17);
        let mut data = vec![0; size];

        generate(&mut data, max_line_len, &mut rng);

        for line in data.split(|byte| *byte == b'\n') {
            assert!(line.len() <= max_line_len);
            assert!(line.iter().all(|byte| (b'/'..=b'~').contains(byte)));
        }
    }
}

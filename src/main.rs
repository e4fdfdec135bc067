use crossfill::{solve, SolveConfig, WordDict};
use std::fs;
use std::process;
use std::str::FromStr;

fn parse_number<T: FromStr>(arg: &str, name: &str) -> T {
    arg.parse().unwrap_or_else(|_| {
        eprintln!("invalid {name}: {arg}");
        process::exit(2);
    })
}

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let words_path = args.next().unwrap_or_else(|| {
        eprintln!("usage: crossfill <words-file> [rows] [columns] [seed]");
        process::exit(2);
    });
    let rows = args.next().map_or(13, |arg| parse_number(&arg, "rows"));
    let columns = args.next().map_or(13, |arg| parse_number(&arg, "columns"));
    let seed = args.next().map_or(0, |arg| parse_number(&arg, "seed"));

    let contents = fs::read_to_string(&words_path).unwrap_or_else(|err| {
        eprintln!("cannot read {words_path}: {err}");
        process::exit(2);
    });
    let words = contents
        .lines()
        .filter(|word| word.len() >= 2 && word.bytes().all(|b| b.is_ascii_lowercase()));

    let dict = match WordDict::build(words) {
        Ok(dict) => dict,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    };

    let mut config = SolveConfig::new(rows, columns);
    config.seed = seed;

    match solve(&config, &dict) {
        Ok(solution) => {
            println!("{}", solution.grid);
            println!("seed: {:#018x}", solution.seed);
            println!("{:?}", solution.statistics);
        }
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

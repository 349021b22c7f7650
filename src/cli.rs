//! Command-line argument parsing (§6). Grounded in `monitors::cli::parse_cli`:
//! a hand-rolled single-dash parser over a peekable argument iterator rather
//! than a declarative-macro crate, because the wire format (`-t`, `-jsonpath`,
//! `-yes`) predates `clap`-style long options and a cutechess-cli-compatible
//! tool has to keep accepting it.

use std::iter::Peekable;
use std::path::PathBuf;

use rules::Res;

#[derive(Default)]
pub struct CliArgs {
    pub tournament_json: Option<PathBuf>,
    pub auto_answer: Option<bool>,
    pub verbose: bool,
    pub help: bool,
}

fn next_arg<I: Iterator<Item = String>>(args: &mut Peekable<I>, flag: &str) -> Res<String> {
    args.next().ok_or_else(|| anyhow::anyhow!("'{flag}' expects an argument"))
}

/// Parses everything after the program name. `-u`/`-c`/`-d` select the
/// engine-discovery mode, which this build doesn't implement; they're
/// recognized just well enough to fail with a clear message instead of
/// silently being swallowed as an unknown flag.
pub fn parse_cli<I: Iterator<Item = String>>(mut args: Peekable<I>) -> Res<CliArgs> {
    let mut res = CliArgs::default();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-t" | "-jsonpath" => res.tournament_json = Some(PathBuf::from(next_arg(&mut args, &arg)?)),
            "-yes" => res.auto_answer = Some(true),
            "-no" => res.auto_answer = Some(false),
            "-v" => {
                let value = next_arg(&mut args, "-v")?;
                res.verbose = match value.as_str() {
                    "on" => true,
                    "off" => false,
                    other => anyhow::bail!("'-v' expects 'on' or 'off', got '{other}'"),
                };
            }
            "-h" | "-help" | "--help" => res.help = true,
            "-u" | "-c" | "-d" => {
                anyhow::bail!("'{arg}' selects engine-discovery mode, which this build doesn't implement");
            }
            other => anyhow::bail!("unrecognized option '{other}'; try -h"),
        }
    }
    Ok(res)
}

pub fn usage() -> &'static str {
    "tourney -t PATH [-yes|-no] [-v on|off]\n\
     \n\
     -t PATH, -jsonpath PATH   path to the tournament JSON (required to play)\n\
     -yes, -no                 auto-answer the resume prompt instead of asking\n\
     -v on|off                 verbose protocol logging to the console\n\
     -h, -help                 print this message"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Res<CliArgs> {
        parse_cli(args.iter().map(|s| s.to_string()).peekable())
    }

    #[test]
    fn parses_tournament_path_and_auto_answer() {
        let res = parse(&["-t", "tourney.json", "-yes"]).unwrap();
        assert_eq!(res.tournament_json, Some(PathBuf::from("tourney.json")));
        assert_eq!(res.auto_answer, Some(true));
    }

    #[test]
    fn discovery_mode_flags_fail_cleanly() {
        assert!(parse(&["-u"]).is_err());
        assert!(parse(&["-c", "4"]).is_err());
    }

    #[test]
    fn unknown_flag_is_rejected() {
        assert!(parse(&["-nonsense"]).is_err());
    }

    #[test]
    fn verbose_flag_parses_on_off() {
        assert!(parse(&["-v", "on"]).unwrap().verbose);
        assert!(!parse(&["-v", "off"]).unwrap().verbose);
        assert!(parse(&["-v", "maybe"]).is_err());
    }
}

use anyhow::{bail, Context};
use clap::{Arg, ArgAction, ArgMatches, Command};
use dialoguer::Confirm;
use evtx::EvtxParser;
use evtx2csv::BatchFlattener;
use log::warn;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Excel sniffs the encoding from a byte-order mark, so every output file
/// starts with one.
const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

struct Evtx2Csv {
    input: PathBuf,
    output: Option<PathBuf>,
    confirm_overwrite: bool,
    verbosity_level: Option<LevelFilter>,
}

impl Evtx2Csv {
    pub fn from_cli_matches(matches: &ArgMatches) -> Self {
        let input = PathBuf::from(
            matches
                .get_one::<String>("INPUT")
                .expect("This is a required argument"),
        );

        let output = matches.get_one::<String>("output").map(PathBuf::from);

        let verbosity_level = match matches.get_count("verbose") {
            0 => None,
            1 => Some(LevelFilter::Info),
            2 => Some(LevelFilter::Debug),
            3 => Some(LevelFilter::Trace),
            _ => {
                eprintln!("using more than -vvv does not affect verbosity level");
                Some(LevelFilter::Trace)
            }
        };

        Evtx2Csv {
            input,
            output,
            confirm_overwrite: !matches.get_flag("no-confirm-overwrite"),
            verbosity_level,
        }
    }

    pub fn run(&self) -> anyhow::Result<()> {
        self.try_to_initialize_logging();

        if self.input.is_dir() {
            self.convert_folder()
        } else {
            let csv_path = match &self.output {
                Some(path) => path.clone(),
                None => self.input.with_extension("csv"),
            };
            let written = self.convert_file(&self.input, &csv_path)?;
            println!("{} records exported -> {}", written, csv_path.display());
            Ok(())
        }
    }

    fn convert_folder(&self) -> anyhow::Result<()> {
        let out_dir = self.output.clone().unwrap_or_else(|| self.input.clone());
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("failed to create output directory {}", out_dir.display()))?;

        let mut inputs: Vec<PathBuf> = fs::read_dir(&self.input)
            .with_context(|| format!("failed to read directory {}", self.input.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("evtx"))
                    .unwrap_or(false)
            })
            .collect();
        inputs.sort();

        if inputs.is_empty() {
            bail!("no .evtx files found in {}", self.input.display());
        }

        let mut total = 0usize;
        let mut errors = 0usize;

        for evtx_path in &inputs {
            let stem = evtx_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "output".to_string());
            let csv_path = out_dir.join(format!("{stem}.csv"));

            match self.convert_file(evtx_path, &csv_path) {
                Ok(written) => {
                    println!(
                        "{} -> {} ({} records)",
                        evtx_path.display(),
                        csv_path.display(),
                        written
                    );
                    total += written;
                }
                Err(e) => {
                    eprintln!("failed to convert {}: {:#}", evtx_path.display(), e);
                    errors += 1;
                }
            }
        }

        println!(
            "{} file(s), {} records exported, {} error(s)",
            inputs.len() - errors,
            total,
            errors
        );

        if errors == inputs.len() {
            bail!("every input file failed to convert");
        }
        Ok(())
    }

    fn convert_file(&self, evtx_path: &Path, csv_path: &Path) -> anyhow::Result<usize> {
        let mut parser = EvtxParser::from_path(evtx_path)
            .with_context(|| format!("failed to open file {}", evtx_path.display()))?;

        let mut batch = BatchFlattener::new();
        let mut undeserializable = 0usize;

        for record in parser.records() {
            match record {
                Ok(r) => batch.push_record(&r.data),
                Err(e) => {
                    warn!("failed to deserialize a record: {e}");
                    undeserializable += 1;
                }
            }
        }

        let mut output = self.create_output_file(csv_path)?;
        output.write_all(UTF8_BOM)?;
        let summary = batch.write_csv(&mut output)?;

        for failure in &summary.failures {
            eprintln!(
                "{}: record {} skipped: {}",
                evtx_path.display(),
                failure.index,
                failure.error
            );
        }
        if undeserializable > 0 {
            eprintln!(
                "{}: {} record(s) could not be read from the container",
                evtx_path.display(),
                undeserializable
            );
        }

        Ok(summary.records_written)
    }

    /// Will ask for confirmation before overwriting files unless
    /// `--no-confirm-overwrite` is passed; creates parent directories as
    /// needed.
    fn create_output_file(&self, path: &Path) -> anyhow::Result<File> {
        if path.is_dir() {
            bail!(
                "there is a directory at {}, refusing to overwrite",
                path.display()
            );
        }

        if path.exists() {
            if self.confirm_overwrite {
                let confirmed = Confirm::new()
                    .with_prompt(format!(
                        "Are you sure you want to override output file at {}",
                        path.display()
                    ))
                    .default(false)
                    .interact()
                    .context("failed to write confirmation prompt to term")?;

                if !confirmed {
                    bail!("cancelled");
                }
            }
            return File::create(path).with_context(|| format!("{}", path.display()));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        File::create(path).with_context(|| format!("{}", path.display()))
    }

    fn try_to_initialize_logging(&self) {
        if let Some(level) = self.verbosity_level {
            if let Err(e) = TermLogger::init(
                level,
                Config::default(),
                TerminalMode::Stderr,
                ColorChoice::Auto,
            ) {
                eprintln!("Failed to initialize logging: {e}");
            }
        }
    }
}

fn main() -> anyhow::Result<()> {
    let matches = Command::new("evtx2csv")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converts Windows event logs (.evtx) to flat CSV tables")
        .arg(
            Arg::new("INPUT")
                .required(true)
                .help("A .evtx file, or a directory containing .evtx files"),
        )
        .arg(
            Arg::new("output")
                .short('f')
                .long("output")
                .help(
                    "Output .csv file (single-file mode) or directory (folder mode). \
                     Defaults to the input path with a .csv extension, or the input \
                     directory itself.",
                ),
        )
        .arg(
            Arg::new("no-confirm-overwrite")
                .long("no-confirm-overwrite")
                .action(ArgAction::SetTrue)
                .help("When set, will not ask for confirmation before overwriting files, useful for automation"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .action(ArgAction::Count)
                .help("-v - info, -vv - debug, -vvv - trace"),
        )
        .get_matches();

    Evtx2Csv::from_cli_matches(&matches).run()
}

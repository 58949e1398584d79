//! `fedtable` command-line tool.
//!
//! Thin shell over [`StoreEngineRegistry`] for inspecting and moving tables
//! by hand. Records are exchanged as `key<TAB>value` text lines with string
//! values; logs go to stderr so stdout stays pipeable. `local` tables live
//! only as long as one invocation.
//!
//! ```bash
//! export FEDTABLE_DATA_ROOT=/var/lib/fedtable
//! printf 'a\t1\nb\t2\n' | fedtable --engine hdfs put -n x -t t
//! fedtable --engine hdfs collect -n x -t t
//! fedtable --engine hdfs save-as -n x -t t --to-namespace y --to-name u
//! ```

use std::io::{self, BufRead, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use fedtable_core::{StoreEngineKind, TableSchema};
use fedtable_storage::{CountPolicy, StorageConfig, StoreEngineRegistry, Table};

#[derive(Parser, Debug)]
#[command(name = "fedtable", version, about = "Engine-agnostic table storage tool")]
struct Cli {
    /// Root directory for on-disk engines; without it only `local` is available
    #[arg(long, value_name = "DIR", env = "FEDTABLE_DATA_ROOT", global = true)]
    data_root: Option<PathBuf>,

    /// Storage engine: hdfs, compute_native, or local
    #[arg(long, default_value = "local", env = "FEDTABLE_ENGINE", global = true)]
    engine: StoreEngineKind,

    /// Row-count accounting for repeated appends
    #[arg(long, value_enum, default_value_t = CountPolicyArg::Cumulative, global = true)]
    count_policy: CountPolicyArg,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, env = "FEDTABLE_LOG_FORMAT", global = true)]
    log_format: LogFormat,

    /// fsync data and metadata before reporting success
    #[arg(long, global = true)]
    sync_writes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List configured engines
    Engines,
    /// Print a table's canonical address
    Address(TableArgs),
    /// Append `key<TAB>value` lines from stdin
    Put {
        #[command(flatten)]
        table: TableArgs,
        /// Flush every N records (0 = only at the end)
        #[arg(long, default_value_t = 10_000)]
        chunk_size: usize,
    },
    /// Print every record as `key<TAB>value`
    Collect {
        #[command(flatten)]
        table: TableArgs,
        /// Minimum read buffer in bytes
        #[arg(long, default_value_t = 0)]
        min_chunk_size: usize,
    },
    /// Print the row count from metadata
    Count(TableArgs),
    /// Remove data and metadata
    Destroy(TableArgs),
    /// Move a table to a new identity
    SaveAs {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long)]
        to_namespace: String,
        #[arg(long)]
        to_name: String,
        /// Partition count of the destination (defaults to the source's)
        #[arg(long)]
        to_partitions: Option<u32>,
    },
    /// Show or replace a table's schema
    Schema {
        #[command(flatten)]
        table: TableArgs,
        /// Comma-separated field names to store; omit to print the schema
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
        #[arg(long, default_value_t = 1)]
        version: u32,
    },
}

#[derive(Args, Debug)]
struct TableArgs {
    #[arg(short = 'n', long)]
    namespace: String,
    #[arg(short = 't', long = "name")]
    name: String,
    #[arg(short = 'p', long)]
    partitions: Option<u32>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CountPolicyArg {
    Cumulative,
    PerWrite,
}

impl From<CountPolicyArg> for CountPolicy {
    fn from(arg: CountPolicyArg) -> Self {
        match arg {
            CountPolicyArg::Cumulative => Self::Cumulative,
            CountPolicyArg::PerWrite => Self::PerWrite,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Pretty,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    let registry = StoreEngineRegistry::new(storage_config(&cli)?)
        .context("failed to initialise storage engines")?;
    run(&cli, &registry)
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(io::stderr)).init(),
    }
}

fn storage_config(cli: &Cli) -> Result<StorageConfig> {
    let data_root = cli
        .data_root
        .as_deref()
        .map(std::path::absolute)
        .transpose()
        .context("cannot resolve --data-root")?;
    Ok(StorageConfig {
        data_root,
        default_engine: cli.engine,
        count_policy: cli.count_policy.into(),
        sync_writes: cli.sync_writes,
        ..StorageConfig::default()
    })
}

fn open(cli: &Cli, registry: &StoreEngineRegistry, args: &TableArgs) -> Result<Table> {
    registry
        .table(
            cli.engine,
            Some(args.namespace.as_str()),
            Some(args.name.as_str()),
            args.partitions,
        )
        .with_context(|| format!("cannot open {}/{} on {}", args.namespace, args.name, cli.engine))
}

fn run(cli: &Cli, registry: &StoreEngineRegistry) -> Result<()> {
    let mut out = BufWriter::new(io::stdout().lock());
    match &cli.command {
        Command::Engines => {
            for kind in registry.engines() {
                writeln!(out, "{kind}")?;
            }
        }
        Command::Address(args) => {
            writeln!(out, "{}", open(cli, registry, args)?.address())?;
        }
        Command::Put { table, chunk_size } => {
            let table = open(cli, registry, table)?;
            let written = put_from_stdin(&table, *chunk_size)?;
            info!(table = %table.address(), written, "put complete");
            writeln!(out, "{written}")?;
        }
        Command::Collect {
            table,
            min_chunk_size,
        } => {
            let table = open(cli, registry, table)?;
            for record in table.collect::<String>(*min_chunk_size)? {
                let (key, value) = record?;
                writeln!(out, "{key}\t{value}")?;
            }
        }
        Command::Count(args) => {
            writeln!(out, "{}", open(cli, registry, args)?.count()?)?;
        }
        Command::Destroy(args) => {
            open(cli, registry, args)?.destroy()?;
        }
        Command::SaveAs {
            table,
            to_namespace,
            to_name,
            to_partitions,
        } => {
            let moved = open(cli, registry, table)?.save_as(to_name, to_namespace, *to_partitions)?;
            writeln!(out, "{}", moved.address())?;
        }
        Command::Schema {
            table,
            fields,
            version,
        } => {
            let table = open(cli, registry, table)?;
            if let Some(fields) = fields {
                table.save_schema(TableSchema::with_fields(*version, fields.iter().cloned()))?;
            }
            match table.schema()? {
                Some(schema) => writeln!(out, "{}", serde_json::to_string_pretty(&schema)?)?,
                None => writeln!(out, "no schema")?,
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Reads stdin into `table`. Every line is parsed before anything is
/// written, so a malformed line leaves the table unchanged.
fn put_from_stdin(table: &Table, chunk_size: usize) -> Result<u64> {
    let records = read_records(io::stdin().lock())?;
    Ok(table.put_all(records, chunk_size)?)
}

/// Parses `key<TAB>value` lines, skipping blank ones.
fn read_records(input: impl BufRead) -> Result<Vec<(String, String)>> {
    let mut records = Vec::new();
    for (index, line) in input.lines().enumerate() {
        let line_no = index + 1;
        let line = line.with_context(|| format!("cannot read stdin line {line_no}"))?;
        if line.trim_end_matches('\r').is_empty() {
            continue;
        }
        records.push(parse_record(line_no, &line)?);
    }
    Ok(records)
}

fn parse_record(line_no: usize, line: &str) -> Result<(String, String)> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    match line.split_once('\t') {
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => bail!("stdin line {line_no} has no tab between key and value"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn put_flags_parse() {
        let cli = Cli::try_parse_from([
            "fedtable",
            "--engine",
            "hdfs",
            "--count-policy",
            "per-write",
            "put",
            "-n",
            "x",
            "-t",
            "t",
            "-p",
            "4",
            "--chunk-size",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.engine, StoreEngineKind::DistributedFs);
        assert!(matches!(cli.count_policy, CountPolicyArg::PerWrite));
        match cli.command {
            Command::Put { table, chunk_size } => {
                assert_eq!((table.namespace.as_str(), table.name.as_str()), ("x", "t"));
                assert_eq!(table.partitions, Some(4));
                assert_eq!(chunk_size, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn save_as_and_schema_flags_parse() {
        let cli = Cli::try_parse_from([
            "fedtable", "save-as", "-n", "x", "-t", "t", "--to-namespace", "y", "--to-name", "u",
        ])
        .unwrap();
        assert_eq!(cli.engine, StoreEngineKind::Local);
        match cli.command {
            Command::SaveAs {
                to_namespace,
                to_name,
                to_partitions,
                ..
            } => assert_eq!((to_namespace.as_str(), to_name.as_str(), to_partitions), ("y", "u", None)),
            other => panic!("unexpected {other:?}"),
        }

        let cli = Cli::try_parse_from(["fedtable", "schema", "-n", "x", "-t", "t", "--fields", "a,b"])
            .unwrap();
        match cli.command {
            Command::Schema { fields, version, .. } => {
                assert_eq!(fields, Some(vec!["a".to_string(), "b".to_string()]));
                assert_eq!(version, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_table_name_is_rejected() {
        assert!(Cli::try_parse_from(["fedtable", "count", "-n", "x"]).is_err());
        assert!(Cli::try_parse_from(["fedtable", "--engine", "s3", "engines"]).is_err());
    }

    #[test]
    fn record_lines_split_at_first_tab() {
        assert_eq!(parse_record(1, "a\t1").unwrap(), ("a".into(), "1".into()));
        assert_eq!(parse_record(1, "a\t1\r").unwrap(), ("a".into(), "1".into()));
        assert_eq!(parse_record(1, "a\tb\tc").unwrap(), ("a".into(), "b\tc".into()));
        assert_eq!(parse_record(1, "\tv").unwrap(), (String::new(), "v".into()));
        let err = parse_record(7, "no-tab").unwrap_err();
        assert!(err.to_string().contains("line 7"), "{err}");
    }

    #[test]
    fn malformed_line_rejects_whole_input() {
        let input = Cursor::new("a\t1\n\r\nb\t2\n");
        let records = read_records(input).unwrap();
        assert_eq!(records, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);

        let err = read_records(Cursor::new("a\t1\nbroken\nc\t3\n")).unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn malformed_input_writes_nothing() {
        let registry = StoreEngineRegistry::new(StorageConfig::default()).unwrap();
        let table = registry
            .table(StoreEngineKind::Local, Some("x"), Some("t"), None)
            .unwrap();
        let written = read_records(Cursor::new("a\t1\nbroken\n"))
            .and_then(|records| Ok(table.put_all(records, 0)?));
        assert!(written.is_err());
        assert!(!table.exists().unwrap());
    }
}

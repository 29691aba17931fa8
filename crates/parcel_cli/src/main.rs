//! Command-line entry point for the parcel tracker.
//!
//! # Responsibility
//! - Open the tracker database and drive `ParcelService` use-cases.
//! - Print results as JSON lines so output stays scriptable.
//!
//! # Environment
//! - `PARCEL_DB_PATH`: database file, defaults to `tracker.db`.
//! - `PARCEL_LOG_LEVEL`: log level, defaults to the build-mode level.
//! - `PARCEL_LOG_DIR`: absolute log directory; file logging is off when unset.

use log::error;
use parcel_core::db::open_db;
use parcel_core::{
    core_version, default_log_level, init_logging, ClientId, ParcelNumber, ParcelService,
    SqliteParcelStore,
};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

const DEFAULT_DB_PATH: &str = "tracker.db";
const USAGE: &str = "usage: parcel_cli <command>
  register <client> <address>
  list <client>
  next <number>
  address <number> <address>
  delete <number>
  version";

/// Runtime settings read from the environment.
struct CliConfig {
    db_path: PathBuf,
    log_dir: Option<PathBuf>,
    log_level: String,
}

impl CliConfig {
    fn from_env() -> Self {
        Self {
            db_path: std::env::var_os("PARCEL_DB_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from),
            log_dir: std::env::var_os("PARCEL_LOG_DIR").map(PathBuf::from),
            log_level: std::env::var("PARCEL_LOG_LEVEL")
                .unwrap_or_else(|_| default_log_level().to_string()),
        }
    }
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = CliConfig::from_env();
    match run(&args, &config, &mut std::io::stdout().lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_command module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String], config: &CliConfig, out: &mut impl Write) -> Result<(), Box<dyn Error>> {
    let Some((command, rest)) = args.split_first() else {
        return Err(USAGE.into());
    };
    if command == "version" {
        writeln!(out, "parcel_core version={}", core_version())?;
        return Ok(());
    }

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let conn = open_db(&config.db_path)?;
    let service = ParcelService::new(SqliteParcelStore::try_new(&conn)?);

    match (command.as_str(), rest) {
        ("register", [client, address]) => {
            let parcel = service.register(parse_client(client)?, address.as_str())?;
            writeln!(out, "{}", serde_json::to_string(&parcel)?)?;
        }
        ("list", [client]) => {
            for parcel in service.client_parcels(parse_client(client)?)? {
                writeln!(out, "{}", serde_json::to_string(&parcel)?)?;
            }
        }
        ("next", [number]) => {
            let number = parse_number(number)?;
            let status = service.next_status(number)?;
            writeln!(
                out,
                "{}",
                serde_json::json!({ "number": number, "status": status })
            )?;
        }
        ("address", [number, address]) => {
            service.change_address(parse_number(number)?, address)?;
        }
        ("delete", [number]) => {
            service.delete(parse_number(number)?)?;
        }
        _ => return Err(USAGE.into()),
    }

    Ok(())
}

fn parse_client(value: &str) -> Result<ClientId, Box<dyn Error>> {
    value
        .parse()
        .map_err(|err| format!("invalid client id `{value}`: {err}").into())
}

fn parse_number(value: &str) -> Result<ParcelNumber, Box<dyn Error>> {
    value
        .parse()
        .map_err(|err| format!("invalid parcel number `{value}`: {err}").into())
}

#[cfg(test)]
mod tests {
    use super::{run, CliConfig};
    use parcel_core::Parcel;
    use tempfile::TempDir;

    fn temp_config() -> (TempDir, CliConfig) {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            db_path: dir.path().join("tracker.db"),
            log_dir: None,
            log_level: "info".to_string(),
        };
        (dir, config)
    }

    fn run_ok(config: &CliConfig, args: &[&str]) -> String {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let mut out = Vec::new();
        run(&args, config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn run_err(config: &CliConfig, args: &[&str]) -> String {
        let args: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        run(&args, config, &mut Vec::<u8>::new()).unwrap_err().to_string()
    }

    #[test]
    fn register_list_next_delete_roundtrip() {
        let (_dir, config) = temp_config();

        let registered: Parcel =
            serde_json::from_str(run_ok(&config, &["register", "42", "Main st. 1"]).trim())
                .unwrap();
        assert_eq!(registered.client, 42);
        assert_eq!(registered.status, "registered");

        let number = registered.number.to_string();
        run_ok(&config, &["address", &number, "Side st. 2"]);
        let listed: Parcel = serde_json::from_str(run_ok(&config, &["list", "42"]).trim()).unwrap();
        assert_eq!(listed.address, "Side st. 2");

        let advanced: serde_json::Value =
            serde_json::from_str(run_ok(&config, &["next", &number]).trim()).unwrap();
        assert_eq!(advanced["status"], "sent");
        assert!(run_err(&config, &["delete", &number]).contains("transition refused"));

        let other = serde_json::from_str::<Parcel>(
            run_ok(&config, &["register", "42", "Third st. 3"]).trim(),
        )
        .unwrap()
        .number
        .to_string();
        run_ok(&config, &["delete", &other]);
        assert_eq!(run_ok(&config, &["list", "42"]).lines().count(), 1);
    }

    #[test]
    fn invalid_numbers_and_clients_are_reported() {
        let (_dir, config) = temp_config();

        assert!(run_err(&config, &["list", "abc"]).contains("invalid client id `abc`"));
        assert!(run_err(&config, &["next", "-x"]).contains("invalid parcel number `-x`"));
        assert!(run_err(&config, &["next", "99"]).contains("parcel not found: 99"));
    }

    #[test]
    fn unknown_or_incomplete_commands_print_usage() {
        let (_dir, config) = temp_config();

        assert!(run_err(&config, &[]).starts_with("usage:"));
        assert!(run_err(&config, &["register", "1"]).starts_with("usage:"));
        assert!(run_err(&config, &["ship", "1"]).starts_with("usage:"));
        assert!(run_ok(&config, &["version"]).starts_with("parcel_core version="));
    }
}

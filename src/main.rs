use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use duplexr::cli;
use duplexr::config::AppConfig;
use duplexr::logging::{self, error};

fn build_command() -> Command {
	Command::new("duplexr")
		.version(env!("CARGO_PKG_VERSION"))
		.about("2-way folder <-> object store synchronizer")
		.subcommand_required(true)
		.arg_required_else_help(true)
		.arg(
			Arg::new("config")
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Configuration file location"),
		)
		.arg(
			Arg::new("log-level")
				.long("log-level")
				.value_name("LEVEL")
				.default_value("info")
				.global(true)
				.help("Log level (error, warn, info, debug, trace)"),
		)
		.arg(
			Arg::new("timestamps")
				.long("timestamps")
				.action(ArgAction::SetTrue)
				.global(true)
				.help("Prefix log lines with timestamps"),
		)
		.subcommand(Command::new("version").about("Print the version"))
		.subcommand(Command::new("add").about("Add a new sync target"))
		.subcommand(
			Command::new("edit")
				.about("Edit an existing sync target")
				.arg(Arg::new("target").required(true)),
		)
		.subcommand(
			Command::new("rm")
				.about("Remove a sync target")
				.arg(Arg::new("target").required(true)),
		)
		.subcommand(Command::new("targets").about("List configured targets"))
		.subcommand(
			Command::new("ls")
				.about("List the keys of a target with last sync timestamps")
				.arg(Arg::new("target").required(true))
				.arg(
					Arg::new("all")
						.long("all")
						.short('a')
						.action(ArgAction::SetTrue)
						.help("Include keys deleted on both sides"),
				)
				.arg(
					Arg::new("sort-by")
						.long("sort-by")
						.value_name("COLUMN")
						.value_parser(["key", "local", "remote"])
						.default_value("key")
						.help("Column to sort by"),
				)
				.arg(
					Arg::new("descending")
						.long("descending")
						.action(ArgAction::SetTrue)
						.help("Reverse the sort order"),
				),
		)
		.subcommand(
			Command::new("sync")
				.about("Reconcile targets once")
				.arg(Arg::new("targets").action(ArgAction::Append).num_args(0..)),
		)
		.subcommand(
			Command::new("daemon")
				.about("Watch targets and reconcile on changes")
				.arg(Arg::new("targets").action(ArgAction::Append).num_args(0..))
				.arg(
					Arg::new("debounce")
						.long("debounce")
						.value_name("MS")
						.default_value("1000")
						.value_parser(clap::value_parser!(u64))
						.help("Settle time after a change before syncing"),
				),
		)
}

async fn run() -> Result<(), Box<dyn Error>> {
	let matches = build_command().get_matches();

	let log_level = matches
		.get_one::<String>("log-level")
		.map(|s| s.as_str())
		.unwrap_or("info");
	logging::init_tracing(log_level, matches.get_flag("timestamps"));

	// version runs without touching the configuration
	if let Some(("version", _)) = matches.subcommand() {
		println!("{}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	let config_path = match matches.get_one::<String>("config") {
		Some(path) => PathBuf::from(path),
		None => AppConfig::default_path()?,
	};
	let config = AppConfig::load(&config_path).await?;

	match matches.subcommand() {
		Some(("add", _)) => Ok(cli::add_command(&config_path, config).await?),
		Some(("edit", sub)) => {
			let name = sub.get_one::<String>("target").ok_or("edit: target argument required")?;
			Ok(cli::edit_command(&config_path, config, name).await?)
		}
		Some(("rm", sub)) => {
			let name = sub.get_one::<String>("target").ok_or("rm: target argument required")?;
			Ok(cli::rm_command(&config_path, config, name).await?)
		}
		Some(("targets", _)) => {
			cli::targets_command(&config);
			Ok(())
		}
		Some(("ls", sub)) => {
			let name = sub.get_one::<String>("target").ok_or("ls: target argument required")?;
			let sort_by = sub
				.get_one::<String>("sort-by")
				.map(|s| s.as_str())
				.unwrap_or("key");
			Ok(cli::ls_command(
				&config,
				name,
				sub.get_flag("all"),
				sort_by,
				sub.get_flag("descending"),
			)
			.await?)
		}
		Some(("sync", sub)) => {
			let names: Vec<String> = sub
				.get_many::<String>("targets")
				.map(|v| v.cloned().collect())
				.unwrap_or_default();
			Ok(cli::sync_command(&config, &names).await?)
		}
		Some(("daemon", sub)) => {
			let names: Vec<String> = sub
				.get_many::<String>("targets")
				.map(|v| v.cloned().collect())
				.unwrap_or_default();
			let debounce = sub.get_one::<u64>("debounce").copied().unwrap_or(1000);
			Ok(cli::daemon_command(
				&config,
				&names,
				Duration::from_millis(debounce),
				Arc::new(|_| false),
			)
			.await?)
		}
		_ => Ok(()),
	}
}

#[tokio::main]
async fn main() {
	if let Err(e) = run().await {
		error!("{}", e);
		std::process::exit(1);
	}
}

// vim: ts=4

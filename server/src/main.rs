use clap::ArgAction;
use clap::{Args, Parser, Subcommand};
use classy_server::cli::{database_migration, file_io, manage_reservations, manage_users};
use classy_server::cli_error::CliError;
use dotenvy::dotenv;
use log::warn;
use std::path::PathBuf;

fn main() {
    let args = CliArgs::parse();
    let dotenv_result = dotenv();

    let env = env_logger::Env::new().filter_or(
        "RUST_LOG",
        match args.global_opts.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        },
    );
    env_logger::Builder::from_env(env).init();
    if let Err(e) = dotenv_result {
        warn!("Could not read .env file: {}", e);
    }

    if let Err(e) = run_command(args.command) {
        eprintln!("{}", e);
        std::process::exit(e.exit_code());
    }
}

fn run_command(command: Command) -> Result<(), CliError> {
    match command {
        Command::Serve => {
            database_migration::check_migration_state()?;
            classy_server::web::serve()
        }
        Command::MigrateDatabase => database_migration::run_migrations(),
        Command::LoadData { path } => file_io::load_data_from_file(&path),
        Command::ExportData { path } => file_io::export_data_to_file(&path),
        Command::CreateUser => manage_users::create_user(),
        Command::ListReservations { all } => manage_reservations::print_reservation_list(all),
        Command::CheckConflicts => manage_reservations::check_conflicts(),
    }
}

/// Booking server for the rooms and equipment of a school
#[derive(Debug, Parser)]
#[clap(name = "classy", version)]
pub struct CliArgs {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the booking API
    Serve,
    /// Apply all pending database schema migrations
    MigrateDatabase,
    /// Import users, rooms, equipment and reservations from a db.json file of the legacy system
    LoadData {
        /// The path of the JSON file to read from
        path: PathBuf,
    },
    /// Export all data into a db.json file (without passwords)
    ExportData {
        /// The path of the JSON file to write to
        path: PathBuf,
    },
    /// Interactively create a new user account
    CreateUser,
    /// Print a table of the active reservations
    ListReservations {
        /// Include pending, cancelled and completed reservations
        #[clap(long)]
        all: bool,
    },
    /// Check all active reservations for double bookings
    CheckConflicts,
}

#[derive(Debug, Args)]
struct GlobalOpts {
    /// Verbosity level (can be specified multiple times)
    #[clap(long, short, global = true, action = ArgAction::Count)]
    verbose: u8,
}

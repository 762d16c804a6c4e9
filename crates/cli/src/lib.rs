pub mod commands;

use cargolink_core::{CargoType, DealType};
use clap::{Parser, Subcommand, ValueEnum};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "cargolink",
    about = "CargoLink operator CLI",
    long_about = "Operate CargoLink migrations, config inspection, readiness checks, and offline \
                  tariff and schedule evaluation.",
    after_help = "Examples:\n  cargolink doctor --json\n  cargolink price Коледино boxes 10\n  \
                  cargolink schedule Казань --from 02.03.2026"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, collaborator credentials, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Quote a delivery the way the bots price it")]
    Price {
        #[arg(help = "Warehouse name as shown in the bot menus, e.g. Коледино")]
        warehouse: String,
        #[arg(value_enum)]
        cargo: CargoArg,
        #[arg(allow_negative_numbers = true)]
        quantity: i64,
        #[arg(long, help = "Use the discounted fulfilment tariff")]
        fulfilment: bool,
    },
    #[command(about = "List feasible pickup and delivery dates for a warehouse")]
    Schedule {
        warehouse: String,
        #[arg(long, help = "Reference day as DD.MM.YYYY (defaults to today in the business zone)")]
        from: Option<String>,
        #[arg(long, default_value_t = cargolink_core::schedule::DEFAULT_HORIZON_DAYS)]
        days: u32,
    },
    #[command(about = "List in-progress drafts nobody has touched for a while")]
    Drafts {
        #[arg(long, default_value_t = 24)]
        older_than_hours: i64,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CargoArg {
    Boxes,
    Pallets,
}

impl From<CargoArg> for CargoType {
    fn from(value: CargoArg) -> Self {
        match value {
            CargoArg::Boxes => CargoType::Boxes,
            CargoArg::Pallets => CargoType::Pallets,
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Price { warehouse, cargo, quantity, fulfilment } => {
            let deal_type = if fulfilment { DealType::Fulfilment } else { DealType::Delivery };
            commands::price::run(&warehouse, cargo.into(), quantity, deal_type)
        }
        Command::Schedule { warehouse, from, days } => {
            commands::schedule::run(&warehouse, from.as_deref(), days)
        }
        Command::Drafts { older_than_hours } => commands::drafts::run(older_than_hours),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

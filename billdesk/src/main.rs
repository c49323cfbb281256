use std::fmt::Display;

use anyhow::Result;
use billdesk_common::{LocalAmount, RefAmount};
use billdesk_engine::registry_types::PaymentMethod;
use clap::{Args, Parser, Subcommand, ValueEnum};

mod commands;
mod config_file;
mod desk;
mod formatting;
mod interactive;
mod progress;

use crate::{config_file::desk_config, desk::Desk, interactive::InteractiveApp};

#[derive(Parser, Debug)]
#[command(version, about = "Find subscribers across billing registries, record payments and manage service")]
pub struct Arguments {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    #[clap(name = "search", about = "Search the registries and list every match at the first one that has any")]
    Search(ClientSelector),
    #[clap(name = "show", about = "Show a subscriber's details and recent payments")]
    Show(ClientSelector),
    #[clap(name = "invoices", about = "List a subscriber's invoices")]
    Invoices(ClientSelector),
    #[clap(name = "pay", about = "Record a payment for a subscriber")]
    Pay(PayParams),
    #[clap(name = "status", about = "Activate, suspend or toggle a subscriber's service")]
    Status {
        #[command(flatten)]
        client: ClientSelector,
        #[arg(short = 's', long = "set", value_enum, default_value = "toggle")]
        target: StatusTarget,
    },
    #[clap(name = "resend", about = "Resend the receipt of a subscriber's most recent payment")]
    Resend(ClientSelector),
    #[clap(name = "rate", about = "Fetch the official exchange rate")]
    Rate,
    #[clap(name = "convert", about = "Convert an amount at the current effective rate")]
    Convert(ConvertParams),
    #[clap(name = "prices", about = "Standard plan prices at the current rate")]
    Prices,
    #[clap(name = "operators", about = "List the operators of a registry")]
    Operators {
        /// The registry key, as configured
        registry: String,
    },
    #[clap(name = "interactive", about = "Start the interactive desk")]
    Interactive,
}

#[derive(Debug, Args)]
pub struct ClientSelector {
    /// National id, name or phone number of the subscriber
    query: String,
    /// Registries to search, in order. Every configured registry is searched when omitted
    #[arg(short = 'r', long = "registry", value_delimiter = ',')]
    registries: Vec<String>,
    /// Pick this client id among the matches instead of the first one
    #[arg(short = 'i', long = "id")]
    client_id: Option<i64>,
}

#[derive(Debug, Args)]
pub struct PayParams {
    #[command(flatten)]
    client: ClientSelector,
    /// Amount in the reference currency (USD)
    #[arg(long = "usd")]
    amount_reference: Option<RefAmount>,
    /// Amount in the local currency (VES). Filled in from the current rate when omitted
    #[arg(long = "ves")]
    amount_local: Option<LocalAmount>,
    /// Cash, Digital, Transfer or Card
    #[arg(short = 'm', long = "method")]
    method: PaymentMethod,
    /// Bank or transaction reference
    #[arg(short = 'f', long = "reference")]
    reference: String,
    /// Operator who received the payment. Defaults to the signed-in operator
    #[arg(short = 'b', long = "received-by")]
    received_by: Option<String>,
    #[arg(short = 'c', long = "comment")]
    comment: Option<String>,
    /// Do not ask for confirmation
    #[arg(short = 'y', long = "yes")]
    yes: bool,
}

#[derive(Debug, Args)]
pub struct ConvertParams {
    #[arg(long = "usd", conflicts_with = "amount_local")]
    amount_reference: Option<RefAmount>,
    #[arg(long = "ves")]
    amount_local: Option<LocalAmount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusTarget {
    Active,
    Suspended,
    Toggle,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    let desk = match Desk::new(desk_config()) {
        Ok(desk) => desk,
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        },
    };
    let result = match cli.command {
        Command::Search(client) => commands::search(&desk, &client).await,
        Command::Show(client) => commands::show(&desk, &client).await,
        Command::Invoices(client) => commands::show_invoices(&desk, &client).await,
        Command::Pay(params) => commands::pay(&desk, params).await,
        Command::Status { client, target } => commands::status(&desk, &client, target).await,
        Command::Resend(client) => commands::resend(&desk, &client).await,
        Command::Rate => commands::rate(&desk).await,
        Command::Convert(params) => commands::convert(&desk, params).await,
        Command::Prices => commands::plan_prices(&desk).await,
        Command::Operators { registry } => commands::operators(&desk, &registry).await,
        Command::Interactive => InteractiveApp::new(desk).run().await.map(|_| "Bye".to_string()),
    };
    if !print_response(result.map_err(desk::explain)) {
        std::process::exit(1);
    }
}

fn print_response<T: Display>(res: Result<T>) -> bool {
    match res {
        Ok(res) => {
            println!("{res}");
            true
        },
        Err(e) => {
            eprintln!("Error: {e:#}");
            false
        },
    }
}

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use foodgram::{config::Config, logging, server, validation::NewUserPayload};

#[derive(Parser, Debug)]
#[command(name = "foodgram", version, about = "Recipe sharing backend")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default)
    Serve,

    /// Import ingredients from a headerless `name,measurement_unit` CSV file
    LoadIngredients { path: PathBuf },

    /// Create an administrator account
    CreateAdmin {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let cli = Cli::parse();
    let config = Config::load().context("Failed to load configuration")?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config).await?,
        Command::LoadIngredients { path } => {
            let added = server::load_ingredients(&config, &path)
                .await
                .with_context(|| format!("Failed to load ingredients from {}", path.display()))?;
            println!("Added {added} ingredients");
        }
        Command::CreateAdmin {
            email,
            username,
            password,
            first_name,
            last_name,
        } => {
            let payload = NewUserPayload {
                email: Some(email),
                username: Some(username),
                first_name: Some(first_name),
                last_name: Some(last_name),
                password: Some(password),
            };
            let account = server::create_admin(&config, payload).await?;
            println!("Created administrator {} ({})", account.username, account.id);
        }
    }

    Ok(())
}

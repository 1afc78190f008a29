use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use common::utils::logging::{init_logging, LogFormat};
use configs::AppConfig;
use dotenvy::dotenv;
use models::expense::{AmountValue, DateValue, ExpenseInput, TagsValue, TextValue};
use serde_json::json;
use service::auth::domain::{LoginInput, SignUpInput};
use service::runtime::build_services;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "tracker")]
#[command(author, version, about = "Local expense tracker", long_about = None)]
struct Args {
    /// Path of the TOML config file (defaults to CONFIG_PATH or config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct ExpenseFields {
    /// Date as YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    amount: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    payment_method: Option<String>,
    /// Comma separated tags
    #[arg(long)]
    tags: Option<String>,
}

impl From<ExpenseFields> for ExpenseInput {
    fn from(f: ExpenseFields) -> Self {
        ExpenseInput {
            id: None,
            date: f.date.map(DateValue::Text),
            amount: f.amount.map(AmountValue::Text),
            category: f.category.map(TextValue::Text),
            description: f.description.map(TextValue::Text),
            payment_method: f.payment_method.map(TextValue::Text),
            tags: f.tags.map(TagsValue::Text),
            user_id: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account and log in
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Add an expense
    Add(ExpenseFields),
    /// Change fields of an expense
    Edit {
        id: String,
        #[command(flatten)]
        fields: ExpenseFields,
    },
    /// Delete an expense
    Rm { id: String },
    /// List your expenses
    List,
    /// Totals by category, month and payment method
    Summary,
    /// Replace your expenses with the JSON array in FILE
    Import { file: PathBuf },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let mut cfg = match path {
        Some(p) => configs::load_from_file(&p.to_string_lossy())
            .with_context(|| format!("cannot load config {}", p.display()))?,
        None => return AppConfig::load_and_validate(),
    };
    cfg.normalize_and_validate()?;
    Ok(cfg)
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    let cfg = load_config(args.config.as_ref())?;
    let format = cfg.logging.format.parse::<LogFormat>().unwrap_or_default();
    init_logging(format, &cfg.logging.filter);
    debug!(?cfg, "configuration loaded");

    let svc = build_services(&cfg).await?;

    match args.command {
        Command::Signup { name, email, password } => {
            let user = svc.auth.sign_up(SignUpInput { name, email, password }).await?;
            print_json(&user)?;
        }
        Command::Login { email, password } => {
            let user = svc.auth.log_in(LoginInput { email, password }).await?;
            print_json(&user)?;
        }
        Command::Logout => {
            svc.auth.log_out().await;
            print_json(&json!({ "loggedOut": true }))?;
        }
        Command::Whoami => print_json(&svc.auth.current_user().await)?,
        Command::Add(fields) => {
            let expense = svc.expenses.create(fields.into()).await?;
            print_json(&expense)?;
        }
        Command::Edit { id, fields } => {
            let expense = svc.expenses.update(&id, fields.into()).await?;
            print_json(&expense)?;
        }
        Command::Rm { id } => {
            let removed = svc.expenses.remove(&id).await?;
            print_json(&json!({ "removed": removed }))?;
        }
        Command::List => print_json(&svc.expenses.list_expenses().await)?,
        Command::Summary => print_json(&svc.expenses.summary().await)?,
        Command::Import { file } => {
            let raw = tokio::fs::read(&file)
                .await
                .with_context(|| format!("cannot read {}", file.display()))?;
            let doc: serde_json::Value = serde_json::from_slice(&raw)?;
            let imported = svc.expenses.replace_all_json(doc).await?;
            info!(count = imported.len(), "expenses imported");
            print_json(&imported)?;
        }
    }
    Ok(())
}

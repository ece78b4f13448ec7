// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MITRA CLI - command line client for the scheme ledger node
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use colored::*;

mod commands;

#[derive(Parser)]
#[command(name = "mitra-cli")]
#[command(about = "Mitra CLI - scheme history and token ledger client", long_about = None)]
#[command(version)]
struct Cli {
    /// Node API URL
    #[arg(short, long, env = "MITRA_API_URL", default_value = "http://localhost:3000")]
    api: String,

    /// Identity token sent as `Authorization: Bearer`
    #[arg(short, long, env = "MITRA_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect your account
    Account {
        #[command(subcommand)]
        action: AccountCommands,
    },

    /// Scheme applications
    Scheme {
        #[command(subcommand)]
        action: SchemeCommands,
    },

    /// Engagement rewards
    Tokens {
        #[command(subcommand)]
        action: TokenCommands,
    },

    /// Spend tokens
    Perk {
        #[command(subcommand)]
        action: PerkCommands,
    },

    /// Development identity tokens
    Identity {
        #[command(subcommand)]
        action: IdentityCommands,
    },

    /// Offline chain hashing
    Hash {
        #[command(subcommand)]
        action: HashCommands,
    },
}

#[derive(Subcommand)]
enum AccountCommands {
    /// Balance, profile and scheme history
    Show,

    /// Download the scheme history and verify the chain locally
    Verify,
}

#[derive(Subcommand)]
enum SchemeCommands {
    Apply {
        /// Scheme id
        #[arg(long)]
        id: String,

        /// Scheme name as shown to the user
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Grant a named reward (`--action`) or a free-form amount (`--amount --reason`)
    Reward {
        #[arg(long, conflicts_with_all = ["amount", "reason"])]
        action: Option<String>,

        #[arg(long, requires = "reason")]
        amount: Option<u64>,

        #[arg(long, requires = "amount")]
        reason: Option<String>,
    },
}

#[derive(Subcommand)]
enum PerkCommands {
    Redeem {
        /// Perk id
        #[arg(long)]
        id: String,

        /// Price in tokens
        #[arg(long)]
        price: u64,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Sign an identity token with the node's shared secret
    Issue {
        #[arg(long)]
        subject: String,

        #[arg(long)]
        email: Option<String>,

        #[arg(long, env = "MITRA_JWT_SECRET", hide_env_values = true)]
        secret: String,

        #[arg(long, default_value = mitra_crypto::identity::DEFAULT_ISSUER)]
        issuer: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: u64,
    },
}

#[derive(Subcommand)]
enum HashCommands {
    /// Compute the hash an entry would get
    Next {
        #[arg(long)]
        prior: String,

        #[arg(long)]
        scheme: String,

        #[arg(long)]
        label: String,

        /// applied_at, RFC 3339 or Unix milliseconds
        #[arg(long)]
        at: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Commands::Account { action } => {
            let client = commands::client::ApiClient::new(&cli.api, cli.token.as_deref())?;
            commands::account::handle(action, &client).await
        }
        Commands::Scheme { action } => {
            let client = commands::client::ApiClient::new(&cli.api, cli.token.as_deref())?;
            commands::ledger::handle_scheme(action, &client).await
        }
        Commands::Tokens { action } => {
            let client = commands::client::ApiClient::new(&cli.api, cli.token.as_deref())?;
            commands::ledger::handle_tokens(action, &client).await
        }
        Commands::Perk { action } => {
            let client = commands::client::ApiClient::new(&cli.api, cli.token.as_deref())?;
            commands::ledger::handle_perk(action, &client).await
        }
        Commands::Identity { action } => commands::offline::handle_identity(action),
        Commands::Hash { action } => commands::offline::handle_hash(action),
    };

    if let Err(e) = result {
        print_error(&e.to_string());
        std::process::exit(1);
    }
    Ok(())
}

fn print_banner() {
    println!("{}", "╔═══════════════════════════════════════════════╗".cyan());
    println!(
        "{}",
        format!("║      MITRA - CLI v{:<28}║", env!("CARGO_PKG_VERSION"))
            .cyan()
            .bold()
    );
    println!("{}", "╚═══════════════════════════════════════════════╝".cyan());
    println!();
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────

use colored::*;
use mitra_core::{verify_chain, AccountView, ChainError, Entry, GENESIS_HASH};
use serde_json::Value;

use super::client::ApiClient;
use crate::{print_error, print_info, print_success, AccountCommands};

pub async fn handle(
    action: AccountCommands,
    client: &ApiClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        AccountCommands::Show => {
            let view = fetch_account(client).await?;
            print_account(&view);
        }

        AccountCommands::Verify => {
            let view = fetch_account(client).await?;
            print_info(&format!(
                "Verifying {} entries for {} locally...",
                view.scheme_history.len(),
                view.uid
            ));
            let local = verify_chain(&view.scheme_history);
            match &local {
                Ok(()) => print_success(&format!(
                    "Chain intact, tail {}",
                    short(tail_hash(&view.scheme_history))
                )),
                Err(e) => print_error(&format!("Chain broken: {}", e)),
            }

            let remote = client.get("/api/account/verify").await?;
            let report = &remote["verification"];
            let remote_valid = report["valid"].as_bool().unwrap_or(false);
            println!(
                "  {} node reports valid={} over {} entries",
                "↳".dimmed(),
                remote_valid,
                report["entries"]
            );

            if local.is_ok() != remote_valid {
                return Err("local and node verification disagree".into());
            }
            if let Err(e) = local {
                return Err(describe_break(&e).into());
            }
        }
    }
    Ok(())
}

async fn fetch_account(client: &ApiClient) -> Result<AccountView, Box<dyn std::error::Error>> {
    let body: Value = client.get("/api/account").await?;
    let view: AccountView = serde_json::from_value(body["account"].clone())?;
    Ok(view)
}

fn print_account(view: &AccountView) {
    println!("{}", "Account".cyan().bold());
    println!("  uid:          {}", view.uid);
    println!("  tokens:       {}", view.tokens.to_string().green().bold());
    println!("  schemes used: {}", view.schemes_used);
    println!("  joined:       {}", view.joined_at.to_rfc3339());
    println!(
        "  profile:      {}",
        if view.profile_complete {
            "complete".green()
        } else {
            "incomplete".yellow()
        }
    );

    if view.scheme_history.is_empty() {
        println!();
        print_info("No schemes applied yet");
        return;
    }

    println!();
    println!("{}", "Scheme history".cyan().bold());
    for (i, entry) in view.scheme_history.iter().enumerate() {
        print_entry(i, entry);
    }
}

fn print_entry(index: usize, entry: &Entry) {
    println!(
        "  #{:<3} {} {} {}",
        index,
        entry.applied_at().format("%Y-%m-%d %H:%M:%S"),
        entry.scheme_id().bold(),
        entry.label()
    );
    println!("        hash {}", short(entry.hash()).dimmed());
}

fn tail_hash(entries: &[Entry]) -> &str {
    entries.last().map(Entry::hash).unwrap_or(GENESIS_HASH)
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn describe_break(err: &ChainError) -> String {
    format!("history tampered at entry #{}: {}", err.index(), err)
}

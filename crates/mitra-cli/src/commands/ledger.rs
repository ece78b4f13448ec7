use colored::*;
use mitra_core::RewardAction;
use serde_json::{json, Value};

use super::client::ApiClient;
use crate::{print_info, print_success, PerkCommands, SchemeCommands, TokenCommands};

pub async fn handle_scheme(
    action: SchemeCommands,
    client: &ApiClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        SchemeCommands::Apply { id, name } => {
            print_info(&format!("Applying for {} ({})...", name, id));
            let body = client
                .post("/api/schemes/apply", &json!({ "schemeId": id, "schemeName": name }))
                .await?;

            let outcome = &body["outcome"];
            match outcome["result"].as_str() {
                Some("applied") => {
                    print_success(&format!(
                        "Application recorded, +{} tokens",
                        outcome["reward"].as_u64().unwrap_or(0)
                    ));
                    if let Some(hash) = outcome["entry"]["hash"].as_str() {
                        println!("  entry hash: {}", hash.dimmed());
                    }
                }
                _ => print_info("Already applied, nothing changed"),
            }
            print_balance(&body);
        }
    }
    Ok(())
}

pub async fn handle_tokens(
    action: TokenCommands,
    client: &ApiClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        TokenCommands::Reward {
            action,
            amount,
            reason,
        } => {
            let request = reward_request(action, amount, reason)?;
            let body = client.post("/api/tokens/reward", &request).await?;
            let reward = &body["reward"];
            print_success(&format!(
                "+{} tokens for {}",
                reward["amount"].as_u64().unwrap_or(0),
                reward["reason"].as_str().unwrap_or("?")
            ));
            print_balance(&body);
        }
    }
    Ok(())
}

pub async fn handle_perk(
    action: PerkCommands,
    client: &ApiClient,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PerkCommands::Redeem { id, price } => {
            print_info(&format!("Redeeming {} for {} tokens...", id, price));
            let body = client
                .post("/api/perks/redeem", &json!({ "perkId": id, "price": price }))
                .await?;
            print_success(&format!(
                "Redeemed {}",
                body["redemption"]["perk_id"].as_str().unwrap_or(&id)
            ));
            print_balance(&body);
        }
    }
    Ok(())
}

/// Build the reward body, checking a named action against the known table first.
fn reward_request(
    action: Option<String>,
    amount: Option<u64>,
    reason: Option<String>,
) -> Result<Value, Box<dyn std::error::Error>> {
    match (action, amount, reason) {
        (Some(action), None, None) => {
            let parsed: RewardAction = action.parse()?;
            Ok(json!({ "action": parsed.as_str() }))
        }
        (None, Some(amount), Some(reason)) => Ok(json!({ "amount": amount, "reason": reason })),
        _ => Err("pass either --action, or --amount with --reason".into()),
    }
}

fn print_balance(body: &Value) {
    if let Some(tokens) = body["account"]["tokens"].as_u64() {
        println!("  balance: {}", tokens.to_string().green().bold());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_request_by_action() {
        let body = reward_request(Some("daily_login".into()), None, None).unwrap();
        assert_eq!(body, json!({ "action": "daily_login" }));
    }

    #[test]
    fn test_reward_request_unknown_action() {
        assert!(reward_request(Some("free_money".into()), None, None).is_err());
    }

    #[test]
    fn test_reward_request_by_amount() {
        let body = reward_request(None, Some(10), Some("UPI Purchase".into())).unwrap();
        assert_eq!(body, json!({ "amount": 10, "reason": "UPI Purchase" }));
    }

    #[test]
    fn test_reward_request_requires_one_form() {
        assert!(reward_request(None, None, None).is_err());
        assert!(reward_request(None, Some(10), None).is_err());
    }
}

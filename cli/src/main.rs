//! Demo binary embedding `a2a_fabric_core`.
//!
//! Not a real CLI (no argument parsing) and not an HTTP front-end — those are
//! out of scope for this crate. What it shows is the shape every real
//! embedding binary follows: load `Config`, build one `Fabric`, drive a task
//! through its lifecycle, drain timeouts before exit.

use a2a_fabric_core::core::time::SystemClock;
use a2a_fabric_core::identity::KeyEnvironment;
use a2a_fabric_core::models::task::{TaskOptions, TaskResult, TokenUsage};
use a2a_fabric_core::models::tool::{Pricing, PricingModel, ToolAuthor, ToolEndpoint, ToolManifest};
use a2a_fabric_core::models::wallet::WalletType;
use a2a_fabric_core::{Config, CoreError, CreateTaskRequest, Fabric};
use serde_json::json;

fn main() -> Result<(), CoreError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = Config::from_env().unwrap_or_else(|err| {
        tracing::warn!(%err, "invalid configuration, falling back to defaults");
        Config::defaults()
    });
    let fabric = Fabric::init_with_environment(config, KeyEnvironment::Test);
    let clock = SystemClock;

    let (payer, payer_key) = fabric
        .identity
        .create_agent(&clock, "demo-payer".into(), "demo-owner".into(), None, vec![]);
    let (payee, _) = fabric
        .identity
        .create_agent(&clock, "demo-payee".into(), "demo-owner".into(), None, vec![]);
    tracing::info!(agent_id = payer.agent_id(), key = %payer_key, "minted payer agent");

    let payer_wallet = fabric.open_wallet_for(payer.agent_id(), WalletType::Custodial);
    fabric.open_wallet_for(payee.agent_id(), WalletType::Custodial);
    fabric.ledger.fund(&payer_wallet, "USDC", 5_000_000)?;

    fabric.registry.register_tool(ToolManifest::new(
        "summarize".into(),
        ToolAuthor {
            agent_id: payee.agent_id().to_string(),
        },
        ToolEndpoint {
            url: "https://tools.example/run".into(),
            method: "POST".into(),
            auth_scheme: None,
        },
        Pricing {
            model: PricingModel::PerCall,
            amount: 1_000_000,
            token_multiplier: None,
            asset: "USDC".into(),
        },
        json!({"type": "object"}),
    ));

    let task = fabric.orchestrator.create(
        &clock,
        CreateTaskRequest {
            from_agent_id: payer.agent_id().to_string(),
            to_agent_id: payee.agent_id().to_string(),
            tool_name: "summarize".into(),
            parameters: json!({"text": "summarize this please"}),
            amount_override: None,
            asset_override: None,
            options: TaskOptions::default(),
        },
    )?;
    tracing::info!(task_id = task.task_id(), "task created");

    fabric.orchestrator.accept(&clock, task.task_id(), payee.agent_id())?;
    let completed = fabric.orchestrator.complete(
        &clock,
        task.task_id(),
        payee.agent_id(),
        TaskResult {
            output: Some(json!({"summary": "done"})),
            token_usage: Some(TokenUsage {
                total_tokens: 250,
                total_cost: 1_000_000,
            }),
            error: None,
        },
    )?;
    tracing::info!(task_id = completed.task_id(), status = ?completed.status(), "task completed");

    let payee_wallet = fabric
        .ledger
        .wallet_id_for_agent(payee.agent_id())
        .expect("payee wallet was opened above");
    println!(
        "payee balance after fee: {}",
        fabric.ledger.get_balance(&payee_wallet, "USDC")?
    );
    println!(
        "platform fee wallet balance: {}",
        fabric.ledger.get_balance(fabric.fee_wallet_id(), "USDC")?
    );

    let drained = fabric.shutdown(&clock);
    tracing::info!(count = drained.len(), "shutdown complete");
    Ok(())
}

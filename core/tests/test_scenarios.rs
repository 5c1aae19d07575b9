//! End-to-end scenarios, each driven only through a fully wired `Fabric` —
//! the shape an embedding binary (HTTP front-end, CLI) would actually call.

use a2a_fabric_core::core::time::FixedClock;
use a2a_fabric_core::identity::KeyEnvironment;
use a2a_fabric_core::models::task::{TaskOptions, TaskResult, TaskStatus, TokenUsage};
use a2a_fabric_core::models::tool::{Pricing, PricingModel, ToolAuthor, ToolEndpoint, ToolManifest};
use a2a_fabric_core::models::wallet::WalletType;
use a2a_fabric_core::{Config, CoreError, CreateTaskRequest, Fabric};
use serde_json::json;

struct Scenario {
    fabric: Fabric,
    payer: String,
    payee: String,
    payer_wallet: String,
    payee_wallet: String,
}

fn scenario(tool_amount: i128, funding: i128) -> Scenario {
    let fabric = Fabric::init_with_environment(Config::defaults(), KeyEnvironment::Test);
    let clock = FixedClock::new(0);

    let (payer_agent, _) = fabric.identity.create_agent(&clock, "payer".into(), "owner".into(), None, vec![]);
    let (payee_agent, _) = fabric.identity.create_agent(&clock, "payee".into(), "owner".into(), None, vec![]);
    let payer_wallet = fabric.open_wallet_for(payer_agent.agent_id(), WalletType::Custodial);
    let payee_wallet = fabric.open_wallet_for(payee_agent.agent_id(), WalletType::Custodial);
    fabric.ledger.fund(&payer_wallet, "USDC", funding).unwrap();

    fabric.registry.register_tool(ToolManifest::new(
        "summarize".into(),
        ToolAuthor { agent_id: payee_agent.agent_id().to_string() },
        ToolEndpoint { url: "https://tools.example/run".into(), method: "POST".into(), auth_scheme: None },
        Pricing { model: PricingModel::PerCall, amount: tool_amount, token_multiplier: None, asset: "USDC".into() },
        json!({}),
    ));

    Scenario {
        fabric,
        payer: payer_agent.agent_id().to_string(),
        payee: payee_agent.agent_id().to_string(),
        payer_wallet,
        payee_wallet,
    }
}

fn request(s: &Scenario) -> CreateTaskRequest {
    CreateTaskRequest {
        from_agent_id: s.payer.clone(),
        to_agent_id: s.payee.clone(),
        tool_name: "summarize".into(),
        parameters: json!({"text": "summarize this please"}),
        amount_override: None,
        asset_override: None,
        options: TaskOptions::default(),
    }
}

/// Scenario 1: happy path, the provider's reported usage matches the
/// escrowed amount exactly. Provider is paid `amount - fee`, the fee wallet
/// collects `fee`, and the payer's prepaid balance is fully consumed.
#[test]
fn scenario_happy_path_exact_cost() {
    let s = scenario(1_000_000, 5_000_000);
    let clock = FixedClock::new(0);
    let task = s.fabric.orchestrator.create(&clock, request(&s)).unwrap();
    s.fabric.orchestrator.accept(&clock, task.task_id(), &s.payee).unwrap();

    let completed = s
        .fabric
        .orchestrator
        .complete(
            &clock,
            task.task_id(),
            &s.payee,
            TaskResult {
                output: Some(json!({"summary": "done"})),
                token_usage: Some(TokenUsage { total_tokens: 250, total_cost: 1_000_000 }),
                error: None,
            },
        )
        .unwrap();

    assert_eq!(completed.status(), TaskStatus::Completed);
    assert_eq!(s.fabric.ledger.get_balance(&s.payee_wallet, "USDC").unwrap(), 1_000_000 - 25_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.fabric.fee_wallet_id(), "USDC").unwrap(), 25_000);
}

/// Scenario 2: the provider reports usage cheaper than the escrowed amount.
/// The surplus refunds to the payer; the provider and fee wallet still get
/// exactly their share of the *reported* cost, never of the full escrow.
#[test]
fn scenario_under_estimate_refunds_the_surplus_to_the_payer() {
    let s = scenario(1_000_000, 5_000_000);
    let clock = FixedClock::new(0);
    let task = s.fabric.orchestrator.create(&clock, request(&s)).unwrap();
    s.fabric.orchestrator.accept(&clock, task.task_id(), &s.payee).unwrap();
    let escrow = s.fabric.escrow.get(task.escrow_id()).unwrap();
    let locked = escrow.locked_amount();

    let cheaper_cost = locked - 100_000;
    let completed = s
        .fabric
        .orchestrator
        .complete(
            &clock,
            task.task_id(),
            &s.payee,
            TaskResult {
                output: Some(json!({"summary": "done"})),
                token_usage: Some(TokenUsage { total_tokens: 10, total_cost: cheaper_cost }),
                error: None,
            },
        )
        .unwrap();

    assert_eq!(completed.status(), TaskStatus::Completed);
    let payer_balance = s.fabric.ledger.get_balance(&s.payer_wallet, "USDC").unwrap();
    assert_eq!(payer_balance, 5_000_000 - locked + 100_000);
}

/// Scenario 2b: usage reported above the locked amount is capped at the
/// locked amount rather than over-charging the payer.
#[test]
fn scenario_over_estimate_caps_the_charge_at_the_locked_amount() {
    let s = scenario(1_000_000, 5_000_000);
    let clock = FixedClock::new(0);
    let task = s.fabric.orchestrator.create(&clock, request(&s)).unwrap();
    s.fabric.orchestrator.accept(&clock, task.task_id(), &s.payee).unwrap();
    let escrow = s.fabric.escrow.get(task.escrow_id()).unwrap();
    let locked = escrow.locked_amount();

    s.fabric
        .orchestrator
        .complete(
            &clock,
            task.task_id(),
            &s.payee,
            TaskResult {
                output: Some(json!({"summary": "done"})),
                token_usage: Some(TokenUsage { total_tokens: 999_999, total_cost: locked * 5 }),
                error: None,
            },
        )
        .unwrap();

    // The orchestrator falls back to `payment.amount + fee` whenever reported
    // usage exceeds the locked amount, rather than ever releasing more than
    // what was escrowed. With the default buffer the fallback is also what
    // got locked, so the cap pins the provider to exactly `amount - fee`, the
    // fee wallet to exactly `fee`, and leaves no surplus for the payer.
    assert_eq!(locked, 1_000_000 + 25_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.payee_wallet, "USDC").unwrap(), 1_000_000 - 25_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.fabric.fee_wallet_id(), "USDC").unwrap(), 25_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.payer_wallet, "USDC").unwrap(), 5_000_000 - locked);
}

/// Scenario 3: cancelling a task before it is accepted refunds the payer in
/// full and leaves the provider untouched.
#[test]
fn scenario_cancel_before_accept() {
    let s = scenario(1_000_000, 5_000_000);
    let clock = FixedClock::new(0);
    let task = s.fabric.orchestrator.create(&clock, request(&s)).unwrap();

    let cancelled = s.fabric.orchestrator.cancel(&clock, task.task_id(), &s.payer, "changed my mind").unwrap();
    assert_eq!(cancelled.status(), TaskStatus::Cancelled);
    assert_eq!(s.fabric.ledger.get_balance(&s.payer_wallet, "USDC").unwrap(), 5_000_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.payee_wallet, "USDC").unwrap(), 0);
}

/// Scenario 4: a task that is never accepted before its deadline expires,
/// draining via the same poll an embedding binary would run periodically.
#[test]
fn scenario_timeout_while_pending() {
    let s = scenario(1_000_000, 5_000_000);
    let clock = FixedClock::new(0);
    let mut req = request(&s);
    req.options.timeout_ms = 10_000;
    let task = s.fabric.orchestrator.create(&clock, req).unwrap();

    clock.advance_ms(10_001);
    let drained = s.fabric.orchestrator.process_timeouts(&clock);
    assert_eq!(drained.len(), 1);
    assert_eq!(drained[0].status(), TaskStatus::Expired);
    assert_eq!(s.fabric.ledger.get_balance(&s.payer_wallet, "USDC").unwrap(), 5_000_000);
}

/// Scenario 5: the rate limiter denies the request at exactly the
/// configured boundary and admits the next one once the window rolls over.
#[test]
fn scenario_rate_limit_boundary() {
    let fabric = Fabric::init_with_environment(
        Config { rate_limit_minute: 2, ..Config::defaults() },
        KeyEnvironment::Test,
    );
    let clock = FixedClock::new(0);

    fabric.rate_limiter.check_and_increment(&clock, "agent-1").unwrap();
    fabric.rate_limiter.check_and_increment(&clock, "agent-1").unwrap();
    let err = fabric.rate_limiter.check_and_increment(&clock, "agent-1").unwrap_err();
    assert!(matches!(err, CoreError::RateLimited { .. }));

    clock.advance_ms(60_000);
    fabric.rate_limiter.check_and_increment(&clock, "agent-1").unwrap();
}

/// Scenario 6: a payer without enough prepaid balance cannot create a task,
/// and no funds move.
#[test]
fn scenario_insufficient_balance_blocks_task_creation() {
    let s = scenario(1_000_000, 500_000);
    let clock = FixedClock::new(0);
    let err = s.fabric.orchestrator.create(&clock, request(&s)).unwrap_err();
    assert!(matches!(err, CoreError::InsufficientBalance { .. }));
    assert_eq!(s.fabric.ledger.get_balance(&s.payer_wallet, "USDC").unwrap(), 500_000);
    assert_eq!(s.fabric.ledger.get_balance(&s.payee_wallet, "USDC").unwrap(), 0);
}

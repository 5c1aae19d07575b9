//! Property-based invariants (P1-P7) that must hold for arbitrary inputs,
//! not just the hand-picked scenarios in `test_scenarios.rs`.

use std::sync::Arc;

use a2a_fabric_core::core::money::MinorUnits;
use a2a_fabric_core::core::time::FixedClock;
use a2a_fabric_core::identity::KeyEnvironment;
use a2a_fabric_core::models::log_entry::LogAction;
use a2a_fabric_core::models::task::{TaskOptions, TaskResult};
use a2a_fabric_core::models::tool::{Pricing, PricingModel, ToolAuthor, ToolEndpoint, ToolManifest};
use a2a_fabric_core::models::wallet::WalletType;
use a2a_fabric_core::oracle::{StaticTokenCostOracle, TokenCostOracle};
use a2a_fabric_core::{Config, CreateTaskRequest, EscrowEngine, Fabric, ReleaseRecipient, WalletLedger};
use proptest::prelude::*;
use serde_json::json;

fn wired_fabric(tool_amount: MinorUnits, funding: MinorUnits) -> (Fabric, String, String) {
    let fabric = Fabric::init_with_environment(Config::defaults(), KeyEnvironment::Test);
    let clock = FixedClock::new(0);
    let (payer, _) = fabric.identity.create_agent(&clock, "payer".into(), "o".into(), None, vec![]);
    let (payee, _) = fabric.identity.create_agent(&clock, "payee".into(), "o".into(), None, vec![]);
    let payer_wallet = fabric.open_wallet_for(payer.agent_id(), WalletType::Custodial);
    fabric.open_wallet_for(payee.agent_id(), WalletType::Custodial);
    fabric.ledger.fund(&payer_wallet, "USDC", funding).unwrap();
    fabric.registry.register_tool(ToolManifest::new(
        "summarize".into(),
        ToolAuthor { agent_id: payee.agent_id().to_string() },
        ToolEndpoint { url: "https://tools.example/run".into(), method: "POST".into(), auth_scheme: None },
        Pricing { model: PricingModel::PerCall, amount: tool_amount, token_multiplier: None, asset: "USDC".into() },
        json!({}),
    ));
    (fabric, payer.agent_id().to_string(), payee.agent_id().to_string())
}

/// Like `wired_fabric`, but with a caller-supplied oracle — needed to drive
/// the "buffered estimate exceeds amount + fee" lock shape that the default
/// length-heuristic oracle rarely produces on its own.
fn wired_fabric_with_oracle(
    tool_amount: MinorUnits,
    funding: MinorUnits,
    oracle: Arc<dyn TokenCostOracle>,
) -> (Fabric, String, String) {
    let fabric = Fabric::with_oracle(Config::defaults(), KeyEnvironment::Test, oracle);
    let clock = FixedClock::new(0);
    let (payer, _) = fabric.identity.create_agent(&clock, "payer".into(), "o".into(), None, vec![]);
    let (payee, _) = fabric.identity.create_agent(&clock, "payee".into(), "o".into(), None, vec![]);
    let payer_wallet = fabric.open_wallet_for(payer.agent_id(), WalletType::Custodial);
    fabric.open_wallet_for(payee.agent_id(), WalletType::Custodial);
    fabric.ledger.fund(&payer_wallet, "USDC", funding).unwrap();
    fabric.registry.register_tool(ToolManifest::new(
        "summarize".into(),
        ToolAuthor { agent_id: payee.agent_id().to_string() },
        ToolEndpoint { url: "https://tools.example/run".into(), method: "POST".into(), auth_scheme: None },
        Pricing { model: PricingModel::PerCall, amount: tool_amount, token_multiplier: None, asset: "USDC".into() },
        json!({}),
    ));
    (fabric, payer.agent_id().to_string(), payee.agent_id().to_string())
}

/// One of the terminal-reaching action sequences a task can be driven
/// through, expressed so `proptest` can pick among them.
#[derive(Debug, Clone, Copy)]
enum TerminalPath {
    CancelBeforeAccept,
    CompleteOk,
    CompleteError,
    Timeout,
}

fn wired_engine(funding: MinorUnits, unit_price: MinorUnits) -> (EscrowEngine, Arc<WalletLedger>) {
    let ledger = Arc::new(WalletLedger::new());
    ledger.open_wallet("payer-1", WalletType::Custodial);
    ledger.open_wallet("payee-1", WalletType::Custodial);
    let payer_wallet = ledger.wallet_id_for_agent("payer-1").unwrap();
    ledger.fund(&payer_wallet, "USDC", funding).unwrap();
    let oracle = Arc::new(StaticTokenCostOracle::new(unit_price));
    let engine = EscrowEngine::new(Arc::clone(&ledger), oracle);
    (engine, ledger)
}

proptest! {
    /// P1: balance conservation. Whatever leaves the payer's wallet across a
    /// task's entire lifecycle — creation through whichever terminal path it
    /// takes — lands exactly in the provider's wallet plus the fee wallet;
    /// nothing is stranded and nothing is conjured. Driven through the full
    /// `Orchestrator`, not `EscrowEngine::release` in isolation, and with a
    /// per-model oracle price high enough that the buffered lock regularly
    /// exceeds `amount + fee` — the shape that a fixed `amount + fee` refund
    /// on the failed path would otherwise leak.
    #[test]
    fn p1_balance_conservation_across_orchestrator_lifecycle(
        path in prop_oneof![
            Just(TerminalPath::CancelBeforeAccept),
            Just(TerminalPath::CompleteOk),
            Just(TerminalPath::CompleteError),
            Just(TerminalPath::Timeout),
        ],
        tool_amount in 10_000i128..1_000_000,
        unit_price in 1i128..500,
    ) {
        let oracle: Arc<dyn TokenCostOracle> =
            Arc::new(StaticTokenCostOracle::new(1).with_model_price("expensive", unit_price));
        let funding = 5_000_000 + unit_price * 2_000;
        let (fabric, payer, payee) = wired_fabric_with_oracle(tool_amount, funding, oracle);
        let clock = FixedClock::new(0);

        let payer_wallet = fabric.ledger.wallet_id_for_agent(&payer).unwrap();
        let payee_wallet = fabric.ledger.wallet_id_for_agent(&payee).unwrap();
        let payer_before = fabric.ledger.get_balance(&payer_wallet, "USDC").unwrap();

        let mut options = TaskOptions::default();
        options.model = Some("expensive".into());
        options.timeout_ms = 1_000;
        let task = fabric
            .orchestrator
            .create(
                &clock,
                CreateTaskRequest {
                    from_agent_id: payer.clone(),
                    to_agent_id: payee.clone(),
                    tool_name: "summarize".into(),
                    parameters: json!({"text": "x".repeat(2_000)}),
                    amount_override: None,
                    asset_override: None,
                    options,
                },
            )
            .unwrap();

        match path {
            TerminalPath::CancelBeforeAccept => {
                fabric.orchestrator.cancel(&clock, task.task_id(), &payer, "changed mind").unwrap();
            }
            TerminalPath::CompleteOk => {
                fabric.orchestrator.accept(&clock, task.task_id(), &payee).unwrap();
                fabric
                    .orchestrator
                    .complete(&clock, task.task_id(), &payee, TaskResult { output: None, token_usage: None, error: None })
                    .unwrap();
            }
            TerminalPath::CompleteError => {
                fabric.orchestrator.accept(&clock, task.task_id(), &payee).unwrap();
                fabric
                    .orchestrator
                    .complete(
                        &clock,
                        task.task_id(),
                        &payee,
                        TaskResult { output: None, token_usage: None, error: Some("boom".into()) },
                    )
                    .unwrap();
            }
            TerminalPath::Timeout => {
                clock.advance_ms(1_001);
                fabric.orchestrator.on_timeout(&clock, task.task_id()).unwrap();
            }
        }

        let payer_after = fabric.ledger.get_balance(&payer_wallet, "USDC").unwrap();
        let payee_after = fabric.ledger.get_balance(&payee_wallet, "USDC").unwrap();
        let fee_after = fabric.ledger.get_balance(fabric.fee_wallet_id(), "USDC").unwrap();

        // payer_debit = provider_credit + fee_credit + payer_refund, with the
        // refund already netted out of `payer_debit` since both are read off
        // the same wallet.
        let payer_debit = payer_before - payer_after;
        prop_assert_eq!(payer_debit, payee_after + fee_after);
    }

    /// P2: a wallet's balance never goes negative, regardless of the order
    /// of credits and skipped-on-would-fail debits applied to it.
    #[test]
    fn p2_wallet_balance_never_negative(
        ops in prop::collection::vec((any::<bool>(), 0i128..1_000), 1..50),
    ) {
        let ledger = WalletLedger::new();
        let wallet_id = ledger.open_wallet("agent-1", WalletType::Custodial);
        ledger.fund(&wallet_id, "USDC", 0).unwrap();

        for (is_credit, amount) in ops {
            if is_credit {
                ledger.credit(&wallet_id, "USDC", amount, "prop").unwrap();
            } else {
                // A failing debit must leave the balance untouched, not go negative.
                let _ = ledger.debit(&wallet_id, "USDC", amount, "prop");
            }
            prop_assert!(ledger.get_balance(&wallet_id, "USDC").unwrap() >= 0);
        }
    }

    /// P4: once an escrow reaches a terminal status, no further operation
    /// ever moves it to a *different* terminal status — cancel/expire on an
    /// already-terminal escrow is rejected or a no-op, never a second
    /// distinct transition.
    #[test]
    fn p4_terminal_escrow_status_is_sticky(
        fallback in 10_000i128..1_000_000,
        second_op in 0..3u8,
    ) {
        let (engine, _ledger) = wired_engine(fallback * 2, 1);
        let clock = FixedClock::new(0);
        let escrow = engine
            .create_escrow(&clock, "payer-1", "payee-1", "USDC", "x", "m", 0.1, fallback, 60_000, None)
            .unwrap();
        engine.cancel(escrow.escrow_id(), "first").unwrap();
        let after_first = engine.get(escrow.escrow_id()).unwrap();
        prop_assert!(after_first.status().is_terminal());

        let _ = match second_op {
            0 => engine.cancel(escrow.escrow_id(), "second").map(|_| ()),
            1 => engine.expire(escrow.escrow_id()).map(|_| ()),
            _ => engine
                .release(escrow.escrow_id(), 1, ReleaseRecipient::Payee, false)
                .map(|_| ()),
        };
        let after_second = engine.get(escrow.escrow_id()).unwrap();
        prop_assert_eq!(after_second.status(), after_first.status());
    }

    /// P5: releasing with identical arguments twice always produces the
    /// identical recorded outcome — the second call is recognized as a
    /// replay, not applied again.
    #[test]
    fn p5_identical_release_is_idempotent(
        fallback in 10_000i128..1_000_000,
        actual_fraction in 0.01f64..1.0,
    ) {
        let (engine, _ledger) = wired_engine(fallback * 2, 1);
        let clock = FixedClock::new(0);
        let escrow = engine
            .create_escrow(&clock, "payer-1", "payee-1", "USDC", "x", "m", 0.1, fallback, 60_000, None)
            .unwrap();
        let locked = escrow.locked_amount();
        let actual_cost = (1 + ((locked - 1) as f64 * actual_fraction) as i128).clamp(1, locked);

        let first = engine
            .release(escrow.escrow_id(), actual_cost, ReleaseRecipient::Payee, false)
            .unwrap();
        let second = engine
            .release(escrow.escrow_id(), actual_cost, ReleaseRecipient::Payee, false)
            .unwrap();

        prop_assert!(!first.was_idempotent_replay);
        prop_assert!(second.was_idempotent_replay);
        prop_assert_eq!(first.released_to_payee, second.released_to_payee);
        prop_assert_eq!(first.refunded_to_payer, second.refunded_to_payer);
    }

    /// P6: the minute-window counter inside one window is monotonically
    /// non-decreasing as requests are admitted, and never exceeds the limit.
    #[test]
    fn p6_rate_limit_counter_is_monotonic_within_a_window(
        minute_limit in 1u32..20,
        attempts in 1usize..40,
    ) {
        use a2a_fabric_core::RateLimiter;
        let limiter = RateLimiter::new(minute_limit, 1_000_000);
        let clock = FixedClock::new(0);
        let mut last_seen = 0u32;
        for _ in 0..attempts {
            let _ = limiter.check_and_increment(&clock, "agent-1");
            let snapshot = limiter.snapshot("agent-1").unwrap();
            prop_assert!(snapshot.requests_in_window() >= last_seen);
            prop_assert!(snapshot.requests_in_window() <= minute_limit);
            last_seen = snapshot.requests_in_window();
        }
    }

    /// P3: a task driven down any of the four terminal paths lands in a
    /// terminal status, and a second attempt to cancel or accept it afterward
    /// is always rejected — no task ever leaves a terminal state.
    #[test]
    fn p3_task_never_leaves_a_terminal_state(
        path in prop_oneof![
            Just(TerminalPath::CancelBeforeAccept),
            Just(TerminalPath::CompleteOk),
            Just(TerminalPath::CompleteError),
            Just(TerminalPath::Timeout),
        ],
        tool_amount in 10_000i128..1_000_000,
    ) {
        let (fabric, payer, payee) = wired_fabric(tool_amount, tool_amount * 10);
        let clock = FixedClock::new(0);
        let mut options = TaskOptions::default();
        options.timeout_ms = 1_000;
        let task = fabric
            .orchestrator
            .create(
                &clock,
                CreateTaskRequest {
                    from_agent_id: payer.clone(),
                    to_agent_id: payee.clone(),
                    tool_name: "summarize".into(),
                    parameters: json!({}),
                    amount_override: None,
                    asset_override: None,
                    options,
                },
            )
            .unwrap();

        let terminal = match path {
            TerminalPath::CancelBeforeAccept => {
                fabric.orchestrator.cancel(&clock, task.task_id(), &payer, "changed mind").unwrap()
            }
            TerminalPath::CompleteOk => {
                fabric.orchestrator.accept(&clock, task.task_id(), &payee).unwrap();
                fabric
                    .orchestrator
                    .complete(&clock, task.task_id(), &payee, TaskResult { output: None, token_usage: None, error: None })
                    .unwrap()
            }
            TerminalPath::CompleteError => {
                fabric.orchestrator.accept(&clock, task.task_id(), &payee).unwrap();
                fabric
                    .orchestrator
                    .complete(
                        &clock,
                        task.task_id(),
                        &payee,
                        TaskResult { output: None, token_usage: None, error: Some("boom".into()) },
                    )
                    .unwrap()
            }
            TerminalPath::Timeout => {
                clock.advance_ms(1_001);
                fabric.orchestrator.on_timeout(&clock, task.task_id()).unwrap()
            }
        };
        prop_assert!(terminal.status().is_terminal());

        // Once terminal, neither accept nor cancel can move it anywhere else.
        prop_assert!(fabric.orchestrator.accept(&clock, task.task_id(), &payee).is_err());
        prop_assert!(fabric.orchestrator.cancel(&clock, task.task_id(), &payer, "too late").is_err());
        let after = fabric.orchestrator.get(task.task_id()).unwrap();
        prop_assert_eq!(after.status(), terminal.status());
    }

    /// P7: for every terminal task, the log contains a `created` entry and a
    /// matching terminal action, with `created.ts <= terminal.ts`.
    #[test]
    fn p7_log_contains_created_and_terminal_action_in_order(
        path in prop_oneof![
            Just(TerminalPath::CancelBeforeAccept),
            Just(TerminalPath::CompleteOk),
            Just(TerminalPath::Timeout),
        ],
        tool_amount in 10_000i128..1_000_000,
    ) {
        let (fabric, payer, payee) = wired_fabric(tool_amount, tool_amount * 10);
        let clock = FixedClock::new(0);
        let mut options = TaskOptions::default();
        options.timeout_ms = 1_000;
        let task = fabric
            .orchestrator
            .create(
                &clock,
                CreateTaskRequest {
                    from_agent_id: payer.clone(),
                    to_agent_id: payee.clone(),
                    tool_name: "summarize".into(),
                    parameters: json!({}),
                    amount_override: None,
                    asset_override: None,
                    options,
                },
            )
            .unwrap();

        let expected_terminal_action = match path {
            TerminalPath::CancelBeforeAccept => {
                fabric.orchestrator.cancel(&clock, task.task_id(), &payer, "changed mind").unwrap();
                LogAction::Cancelled
            }
            TerminalPath::CompleteOk => {
                fabric.orchestrator.accept(&clock, task.task_id(), &payee).unwrap();
                fabric
                    .orchestrator
                    .complete(&clock, task.task_id(), &payee, TaskResult { output: None, token_usage: None, error: None })
                    .unwrap();
                LogAction::Completed
            }
            TerminalPath::CompleteError => unreachable!(),
            TerminalPath::Timeout => {
                clock.advance_ms(1_001);
                fabric.orchestrator.on_timeout(&clock, task.task_id()).unwrap();
                LogAction::Expired
            }
        };

        let trail = fabric.log.replay_task(task.task_id());
        prop_assert_eq!(trail.first().map(|e| e.action), Some(LogAction::Created));
        let terminal_entry = trail.last().expect("terminal transition must have logged an entry");
        prop_assert_eq!(terminal_entry.action, expected_terminal_action);
        prop_assert!(trail.first().unwrap().timestamp_ms <= terminal_entry.timestamp_ms);
        let status = fabric.orchestrator.get(task.task_id()).unwrap().status();
        prop_assert!(status.is_terminal());
    }
}

//! Shared expense walkthrough.
//!
//! Demonstrates the full settlement flow: a two-member project, an
//! expense allocated 60/40, a contribution that funds the balance
//! accounts, and a current-account expense settled from credit.

use rust_decimal_macros::dec;
use settlement_ledger::core::currency::{Currency, ExchangeRate};
use settlement_ledger::core::participant::{Participant, ParticipantId, Project, ProjectId};
use settlement_ledger::settlement::engine::SettlementEngine;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("╔══════════════════════════════════════════════╗");
    println!("║  settlement-ledger: Expense Split Example    ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let rate = ExchangeRate::now(dec!(1000))?;
    let project_id = ProjectId::new("obra-casa");
    let p1 = ParticipantId::new("P1");
    let p2 = ParticipantId::new("P2");

    let mut engine = SettlementEngine::new();
    engine.add_project(
        Project::new("obra-casa", "Obra Casa")
            .current_account()
            .with_member(Participant::new("P1", dec!(60)))
            .with_member(Participant::new("P2", dec!(40))),
    );

    // --- Scenario 1: a 100 USD expense split 60/40 ---
    println!("━━━ Scenario 1: 100 USD expense, 60/40 ━━━\n");

    let expense = engine.create_cost_event(
        &project_id,
        "Cemento y arena",
        dec!(100),
        Currency::Usd,
        false,
        None,
        &rate,
    )?;
    for obligation in engine.obligations_for_event(expense) {
        println!("{:<4} owes {}", obligation.participant_id(), obligation.amount_due());
    }
    println!();

    // P1 pays their share and the admin approves it.
    let obligation_id = engine.obligations_for_event(expense)[0].id();
    let payment_id = engine.submit_payment(obligation_id, dec!(60), Currency::Usd, None, &rate)?;
    engine.approve_payment(payment_id)?;
    println!("P1 paid; event status: {:?}\n", engine.cost_event_status(expense)?);

    // --- Scenario 2: a contribution funds the balance accounts ---
    println!("━━━ Scenario 2: 90 ARS contribution ━━━\n");

    let contribution = engine.create_cost_event(
        &project_id,
        "Aporte marzo",
        dec!(90),
        Currency::Ars,
        true,
        None,
        &rate,
    )?;
    let funding: Vec<_> = engine
        .obligations_for_event(contribution)
        .iter()
        .map(|o| (o.id(), o.amount_due()))
        .collect();
    for (obligation_id, due) in funding {
        let payment_id =
            engine.submit_payment(obligation_id, due.amount(), due.currency(), None, &rate)?;
        engine.approve_payment(payment_id)?;
    }
    println!("P1 balance: {} ARS", engine.balance(&project_id, &p1, Currency::Ars));
    println!("P2 balance: {} ARS\n", engine.balance(&project_id, &p2, Currency::Ars));

    // --- Scenario 3: an expense settled from credit ---
    println!("━━━ Scenario 3: 54 ARS expense settled from balance ━━━\n");

    let flete = engine.create_cost_event(
        &project_id,
        "Flete",
        dec!(54),
        Currency::Ars,
        false,
        None,
        &rate,
    )?;
    for obligation in engine.obligations_for_event(flete) {
        let payment = engine.payment_for_obligation(obligation.id())?;
        println!(
            "{:<4} owes {} — payment {}",
            obligation.participant_id(),
            obligation.amount_due(),
            payment.status()
        );
    }
    println!();
    println!("P1 balance after: {} ARS", engine.balance(&project_id, &p1, Currency::Ars));
    println!("P2 balance after: {} ARS", engine.balance(&project_id, &p2, Currency::Ars));

    Ok(())
}

//! settlement-ledger CLI
//!
//! Replay a settlement scenario from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario file and print the resulting positions
//! settlement-ledger run --input scenario.json
//!
//! # Output as JSON
//! settlement-ledger run --input scenario.json --format json
//!
//! # Check that a project's participation percentages sum to 100
//! settlement-ledger validate --input scenario.json
//! ```

use rust_decimal::Decimal;
use settlement_ledger::allocation::participation::Participation;
use settlement_ledger::core::currency::{Currency, ExchangeRate};
use settlement_ledger::core::participant::{Participant, ParticipantId, Project};
use settlement_ledger::settlement::engine::SettlementEngine;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"settlement-ledger — shared-cost allocation and settlement

USAGE:
    settlement-ledger <COMMAND> [OPTIONS]

COMMANDS:
    run         Replay a scenario file and print the resulting positions
    validate    Check that the project's participation sums to 100
    help        Show this message

OPTIONS:
    --input <FILE>      Path to a JSON scenario file
    --format <FORMAT>   Output format: text (default) or json

EXAMPLES:
    settlement-ledger run --input scenario.json
    settlement-ledger run --input scenario.json --format json
    settlement-ledger validate --input scenario.json"#
    );
}

/// JSON schema for scenario input.
#[derive(serde::Deserialize)]
struct ScenarioFile {
    project: ProjectInput,
    /// ARS per USD.
    exchange_rate: String,
    #[serde(default)]
    events: Vec<EventInput>,
}

#[derive(serde::Deserialize)]
struct ProjectInput {
    id: String,
    name: String,
    #[serde(default)]
    individual: bool,
    #[serde(default)]
    current_account: bool,
    members: Vec<MemberInput>,
}

#[derive(serde::Deserialize)]
struct MemberInput {
    id: String,
    percentage: String,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(serde::Deserialize)]
struct EventInput {
    description: String,
    amount: String,
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default)]
    contribution: bool,
    /// Per-event rate override (ARS per USD).
    rate: Option<String>,
    /// Submit and approve every obligation after creation.
    #[serde(default)]
    settle: bool,
}

fn default_currency() -> String {
    "ARS".to_string()
}

/// JSON output schema for run results.
#[derive(serde::Serialize)]
struct RunOutput {
    project: String,
    events: Vec<EventOutput>,
    positions: Vec<PositionOutput>,
}

#[derive(serde::Serialize)]
struct EventOutput {
    description: String,
    amount: String,
    currency: String,
    status: String,
    shares: Vec<ShareOutput>,
}

#[derive(serde::Serialize)]
struct ShareOutput {
    participant: String,
    amount_due: String,
}

#[derive(serde::Serialize)]
struct PositionOutput {
    participant: String,
    due_ars: String,
    due_usd: String,
    paid_ars: String,
    paid_usd: String,
    pending_count: usize,
    balance_ars: String,
    balance_usd: String,
}

fn parse_decimal(s: &str, what: &str) -> Decimal {
    s.parse().unwrap_or_else(|e| {
        eprintln!("Invalid {} '{}': {}", what, s, e);
        process::exit(1);
    })
}

fn parse_currency(s: &str) -> Currency {
    match s.to_ascii_uppercase().as_str() {
        "ARS" => Currency::Ars,
        "USD" => Currency::Usd,
        other => {
            eprintln!("Unknown currency '{}': expected ARS or USD", other);
            process::exit(1);
        }
    }
}

fn load_scenario(path: &str) -> ScenarioFile {
    let content = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading file '{}': {}", path, e);
        process::exit(1);
    });

    serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "project": {{
    "id": "casa",
    "name": "Casa",
    "members": [
      {{ "id": "P1", "percentage": "60" }},
      {{ "id": "P2", "percentage": "40" }}
    ]
  }},
  "exchange_rate": "1000",
  "events": [
    {{ "description": "Cemento", "amount": "100.00", "currency": "USD", "settle": true }}
  ]
}}"#
        );
        process::exit(1);
    })
}

fn build_project(input: &ProjectInput) -> Project {
    let mut project = Project::new(input.id.as_str(), input.name.as_str());
    if input.individual {
        project = project.individual();
    }
    if input.current_account {
        project = project.current_account();
    }
    for member in &input.members {
        let percentage = parse_decimal(&member.percentage, "percentage");
        let participant = if member.active {
            Participant::new(member.id.as_str(), percentage)
        } else {
            Participant::new(member.id.as_str(), percentage).inactive()
        };
        project = project.with_member(participant);
    }
    project
}

fn parse_input_options(args: &[String]) -> (String, String) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--input requires a file path");
                    process::exit(1);
                }));
            }
            "--format" => {
                i += 1;
                format = args.get(i).cloned().unwrap_or_else(|| {
                    eprintln!("--format requires 'text' or 'json'");
                    process::exit(1);
                });
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });
    (path, format)
}

fn cmd_run(args: &[String]) {
    let (path, format) = parse_input_options(args);
    let scenario = load_scenario(&path);

    let project = build_project(&scenario.project);
    let project_id = project.id().clone();
    let member_ids: Vec<ParticipantId> =
        project.members().iter().map(|m| m.id().clone()).collect();

    let ambient_rate = ExchangeRate::now(parse_decimal(&scenario.exchange_rate, "exchange rate"))
        .unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });

    let mut engine = SettlementEngine::new();
    engine.add_project(project);

    let mut event_outputs = Vec::new();
    for event in &scenario.events {
        let amount = parse_decimal(&event.amount, "amount");
        let currency = parse_currency(&event.currency);
        let rate_override = event
            .rate
            .as_deref()
            .map(|r| parse_decimal(r, "rate override"));

        let event_id = engine
            .create_cost_event(
                &project_id,
                event.description.as_str(),
                amount,
                currency,
                event.contribution,
                rate_override,
                &ambient_rate,
            )
            .unwrap_or_else(|e| {
                eprintln!("Error recording '{}': {}", event.description, e);
                process::exit(1);
            });

        if event.settle {
            let open: Vec<_> = engine
                .obligations_for_event(event_id)
                .iter()
                .filter(|o| {
                    !engine
                        .payment_for_obligation(o.id())
                        .map(|p| p.is_approved())
                        .unwrap_or(false)
                })
                .map(|o| (o.id(), o.amount_due()))
                .collect();
            for (obligation_id, due) in open {
                let payment_id = engine
                    .submit_payment(
                        obligation_id,
                        due.amount(),
                        due.currency(),
                        rate_override,
                        &ambient_rate,
                    )
                    .unwrap_or_else(|e| {
                        eprintln!("Error settling '{}': {}", event.description, e);
                        process::exit(1);
                    });
                if !engine.payment(payment_id).map(|p| p.is_approved()).unwrap_or(false) {
                    engine.approve_payment(payment_id).unwrap_or_else(|e| {
                        eprintln!("Error approving '{}': {}", event.description, e);
                        process::exit(1);
                    });
                }
            }
        }

        let status = engine.cost_event_status(event_id).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        });
        event_outputs.push(EventOutput {
            description: event.description.clone(),
            amount: amount.to_string(),
            currency: currency.to_string(),
            status: format!("{:?}", status),
            shares: engine
                .obligations_for_event(event_id)
                .iter()
                .map(|o| ShareOutput {
                    participant: o.participant_id().to_string(),
                    amount_due: o.amount_due().to_string(),
                })
                .collect(),
        });
    }

    let mut positions = Vec::new();
    for participant_id in &member_ids {
        let summary = engine
            .payment_summary(&project_id, participant_id)
            .unwrap_or_else(|e| {
                eprintln!("Error: {}", e);
                process::exit(1);
            });
        positions.push(PositionOutput {
            participant: participant_id.to_string(),
            due_ars: summary.due.ars.to_string(),
            due_usd: summary.due.usd.to_string(),
            paid_ars: summary.paid.ars.to_string(),
            paid_usd: summary.paid.usd.to_string(),
            pending_count: summary.pending_count,
            balance_ars: engine
                .balance(&project_id, participant_id, Currency::Ars)
                .to_string(),
            balance_usd: engine
                .balance(&project_id, participant_id, Currency::Usd)
                .to_string(),
        });
    }

    let output = RunOutput {
        project: project_id.to_string(),
        events: event_outputs,
        positions,
    };

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
    } else {
        println!("Project: {}", output.project);
        for event in &output.events {
            println!(
                "\n{} — {} {} [{}]",
                event.description, event.amount, event.currency, event.status
            );
            for share in &event.shares {
                println!("  {:<12} owes {}", share.participant, share.amount_due);
            }
        }
        println!("\nPositions:");
        for p in &output.positions {
            println!(
                "  {:<12} due {} ARS / {} USD, paid {} ARS / {} USD, {} pending, balance {} ARS / {} USD",
                p.participant,
                p.due_ars,
                p.due_usd,
                p.paid_ars,
                p.paid_usd,
                p.pending_count,
                p.balance_ars,
                p.balance_usd
            );
        }
    }
}

fn cmd_validate(args: &[String]) {
    let (path, _format) = parse_input_options(args);
    let scenario = load_scenario(&path);
    let project = build_project(&scenario.project);
    let project_id = project.id().clone();

    let mut engine = SettlementEngine::new();
    engine.add_project(project);

    match engine.validate_participation(&project_id) {
        Ok(Participation::Valid) => {
            println!("Participation for '{}' sums to 100.", project_id);
        }
        Ok(Participation::Unbalanced { total_percentage }) => {
            eprintln!(
                "Participation for '{}' sums to {}, not 100.",
                project_id, total_percentage
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "validate" => cmd_validate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}

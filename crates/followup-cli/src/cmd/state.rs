use crate::output::{print_json, print_table};
use anyhow::Context;
use followup_core::run::Trackers;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let trackers = Trackers::load(root).context("failed to load tracker files")?;

    if json {
        return print_json(&serde_json::json!({
            "aging": trackers.aging,
            "cadence": trackers.cadence,
            "ledger": trackers.ledger,
        }));
    }

    println!("Aging ({} orders)", trackers.aging.len());
    let rows: Vec<Vec<String>> = trackers
        .aging
        .iter()
        .flat_map(|(status, orders)| {
            orders
                .iter()
                .map(move |(id, seen)| vec![status.clone(), id.to_string(), seen.to_string()])
        })
        .collect();
    if !rows.is_empty() {
        print_table(&["STATUS", "ORDER", "FIRST SEEN"], &rows);
    }

    println!("\nCadence ({} orders)", trackers.cadence.len());
    let rows: Vec<Vec<String>> = trackers
        .cadence
        .iter()
        .map(|(id, entry)| {
            vec![
                id.to_string(),
                entry.day.to_string(),
                entry
                    .last_action_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    if !rows.is_empty() {
        print_table(&["ORDER", "DAY", "LAST ACTION"], &rows);
    }

    println!("\nLedger ({} orders)", trackers.ledger.len());
    let rows: Vec<Vec<String>> = trackers
        .ledger
        .iter()
        .map(|(id, rec)| {
            vec![
                id.to_string(),
                rec.state.to_string(),
                rec.handled.len().to_string(),
                rec.updated_on
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".into()),
            ]
        })
        .collect();
    if !rows.is_empty() {
        print_table(&["ORDER", "STATE", "HANDLED LINES", "UPDATED"], &rows);
    }
    Ok(())
}

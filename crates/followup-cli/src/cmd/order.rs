use super::run::{describe, load_config, resolve_now, CrmArgs, LlmArgs};
use crate::output::print_json;
use anyhow::Context;
use followup_core::gateway::{CrmGateway, DryRun};
use followup_core::run::{process_single_order, OrderResult, RunOptions};
use std::path::Path;

pub fn run(
    root: &Path,
    id: u64,
    now: Option<&str>,
    dry_run: bool,
    crm: &CrmArgs,
    llm: &LlmArgs,
    json: bool,
) -> anyhow::Result<()> {
    let cfg = load_config(root)?;
    let now = resolve_now(&cfg, now)?;
    let client = crm.client()?;
    let extractor = llm.extractor(&cfg)?;

    let dry = DryRun::new(&client);
    let gateway: &dyn CrmGateway = if dry_run { &dry } else { &client };

    let outcome = process_single_order(
        root,
        &cfg,
        gateway,
        &extractor,
        id,
        now,
        RunOptions { dry_run },
    )
    .with_context(|| format!("failed to process order {id}"))?;

    if json {
        print_json(&OrderResult {
            order_id: id,
            outcome,
        })?;
    } else {
        println!("Order {id}: {}", describe(&outcome));
    }
    Ok(())
}

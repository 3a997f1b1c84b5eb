use crate::output::{print_json, print_table};
use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use clap::Args;
use followup_core::config::{Config, WarnLevel};
use followup_core::gateway::{CrmGateway, DryRun};
use followup_core::run::{run_once, RegulationReport, RunOptions, RunSummary};
use followup_core::scheduler::OrderOutcome;
use followup_core::types::DUE_FORMAT;
use retailcrm::{CrmSettings, RetailCrmClient};
use std::path::Path;
use task_extractor::{ExtractorSettings, OpenAiExtractor, DEFAULT_BASE_URL, DEFAULT_MODEL};

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct CrmArgs {
    /// RetailCRM account URL, e.g. https://shop.retailcrm.ru
    #[arg(id = "crm_base_url", long = "crm-url", env = "RETAILCRM_BASE_URL", hide_env_values = true)]
    pub base_url: Option<String>,

    #[arg(id = "crm_api_key", long = "crm-key", env = "RETAILCRM_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Site code sent with every request
    #[arg(long = "crm-site", env = "RETAILCRM_SITE_CODE")]
    pub site: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LlmArgs {
    #[arg(id = "llm_api_key", long = "llm-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long = "llm-model", env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// OpenAI-compatible API root
    #[arg(id = "llm_base_url", long = "llm-url", env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,
}

fn required(value: &Option<String>, name: &str) -> anyhow::Result<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .with_context(|| format!("{name} is not set"))
}

impl CrmArgs {
    pub fn client(&self) -> anyhow::Result<RetailCrmClient> {
        let mut settings = CrmSettings::new(
            required(&self.base_url, "RETAILCRM_BASE_URL")?,
            required(&self.api_key, "RETAILCRM_API_KEY")?,
        );
        if let Some(site) = self.site.as_deref().filter(|s| !s.trim().is_empty()) {
            settings = settings.with_site(site);
        }
        RetailCrmClient::new(settings).context("failed to build CRM client")
    }
}

impl LlmArgs {
    pub fn extractor(&self, cfg: &Config) -> anyhow::Result<OpenAiExtractor> {
        let mut settings = ExtractorSettings::new(required(&self.api_key, "OPENAI_API_KEY")?);
        settings.model = self.model.clone();
        settings.base_url = self.base_url.clone();
        settings.placeholder = format!(
            "{:02}:{:02}",
            cfg.hours.placeholder_hour, cfg.hours.placeholder_minute
        );
        OpenAiExtractor::new(settings).context("failed to build extractor client")
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load the config and refuse to run on error-level findings.
pub fn load_config(root: &Path) -> anyhow::Result<Config> {
    let cfg = Config::load(root).context("failed to load config")?;
    let errors: Vec<String> = cfg
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!("invalid config: {}", errors.join("; "));
    }
    Ok(cfg)
}

/// `--now` as given, else the current wall-clock time in the configured zone.
pub fn resolve_now(cfg: &Config, now: Option<&str>) -> anyhow::Result<NaiveDateTime> {
    match now {
        Some(raw) => NaiveDateTime::parse_from_str(raw.trim(), DUE_FORMAT)
            .with_context(|| format!("--now '{raw}' is not YYYY-MM-DD HH:MM")),
        None => {
            let tz = cfg.tz()?;
            Ok(Utc::now().with_timezone(&tz).naive_local())
        }
    }
}

pub fn describe(outcome: &OrderOutcome) -> String {
    match outcome {
        OrderOutcome::Ineligible { reason } => format!("skipped: {reason}"),
        OrderOutcome::NoManager => "skipped: no manager".into(),
        OrderOutcome::Gated { state } => format!("waiting: {state}"),
        OrderOutcome::NothingNew => "nothing new".into(),
        OrderOutcome::CommentRequested { created } => {
            format!("comment requested{}", if *created { "" } else { " (failed)" })
        }
        OrderOutcome::FollowUpRequested { created } => {
            format!("follow-up requested{}", if *created { "" } else { " (failed)" })
        }
        OrderOutcome::Proposals {
            created,
            skipped,
            failed,
        } => format!("{created} created, {skipped} skipped, {failed} failed"),
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub fn run(
    root: &Path,
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

    let summary = run_once(root, &cfg, gateway, &extractor, now, RunOptions { dry_run })
        .context("run failed")?;

    if json {
        print_json(&summary)?;
    } else {
        print_summary(&summary, dry_run);
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, dry_run: bool) {
    let suffix = if dry_run { " (dry run)" } else { "" };
    println!("Run {} at {}{suffix}", summary.run_id, summary.now);

    let regulations = [
        ("aging", &summary.aging),
        ("cadence", &summary.cadence),
        ("delivery", &summary.delivery),
    ];
    let rows: Vec<Vec<String>> = regulations
        .iter()
        .map(|(name, report)| regulation_row(name, report.as_ref()))
        .collect();
    println!();
    print_table(
        &["REGULATION", "CREATED", "SKIPPED", "EVICTED", "FAILED", "TRACKED"],
        &rows,
    );

    let main = &summary.main;
    println!(
        "\nComment pass: {} orders fetched, {} tasks created, {} failures",
        main.fetched, main.tasks_created, main.failures
    );
    let rows: Vec<Vec<String>> = main
        .orders
        .iter()
        .filter(|r| !matches!(r.outcome, OrderOutcome::Ineligible { .. }))
        .map(|r| vec![r.order_id.to_string(), describe(&r.outcome)])
        .collect();
    if !rows.is_empty() {
        println!();
        print_table(&["ORDER", "OUTCOME"], &rows);
    }
    println!("\nTotal tasks created: {}", summary.tasks_created());
}

fn regulation_row(name: &str, report: Option<&RegulationReport>) -> Vec<String> {
    match report {
        Some(r) => vec![
            name.to_string(),
            r.tasks_created.to_string(),
            r.skipped.to_string(),
            r.evicted.to_string(),
            r.failures.to_string(),
            r.tracked.to_string(),
        ],
        None => {
            let mut row = vec![name.to_string(), "not due".to_string()];
            row.extend(std::iter::repeat("-".to_string()).take(4));
            row
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_now_is_parsed() {
        let cfg = Config::default();
        let now = resolve_now(&cfg, Some("2025-09-05 14:30")).unwrap();
        assert_eq!(now.format(DUE_FORMAT).to_string(), "2025-09-05 14:30");
        assert!(resolve_now(&cfg, Some("05.09.2025")).is_err());
    }

    #[test]
    fn missing_credential_names_the_variable() {
        let args = CrmArgs {
            base_url: None,
            api_key: Some("key".into()),
            site: None,
        };
        let err = args.client().err().unwrap();
        assert!(err.to_string().contains("RETAILCRM_BASE_URL"));
    }

    #[test]
    fn outcome_descriptions() {
        assert_eq!(describe(&OrderOutcome::NothingNew), "nothing new");
        assert_eq!(
            describe(&OrderOutcome::FollowUpRequested { created: false }),
            "follow-up requested (failed)"
        );
    }
}

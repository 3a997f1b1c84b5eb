use crate::error::{FollowupError, Result};
use crate::paths;
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// TaskTemplate
// ---------------------------------------------------------------------------

/// Text and commentary of a rule-generated task. `{name}` placeholders are
/// substituted by [`TaskTemplate::render`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTemplate {
    pub text: String,
    #[serde(default)]
    pub commentary: String,
}

impl TaskTemplate {
    pub fn new(text: impl Into<String>, commentary: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commentary: commentary.into(),
        }
    }

    pub fn render(&self, vars: &[(&str, &str)]) -> (String, String) {
        let fill = |s: &str| {
            vars.iter()
                .fold(s.to_string(), |acc, (k, v)| acc.replace(&format!("{{{k}}}"), v))
        };
        (fill(&self.text), fill(&self.commentary))
    }
}

// ---------------------------------------------------------------------------
// FilterConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default = "default_allowed_statuses")]
    pub allowed_statuses: Vec<String>,
    #[serde(default = "default_excluded_methods")]
    pub excluded_methods: Vec<String>,
}

fn default_allowed_statuses() -> Vec<String> {
    [
        "new",
        "gotovo-k-soglasovaniiu",
        "soglasovat-sostav",
        "agree-absence",
        "novyi-predoplachen",
        "novyi-oplachen",
        "availability-confirmed",
        "client-confirmed",
        "offer-analog",
        "ne-dozvonilis",
        "perezvonit-pozdnee",
        "otpravili-varianty-na-pochtu",
        "otpravili-varianty-v-vatsap",
        "ready-to-wait",
        "waiting-for-arrival",
        "klient-zhdet-foto-s-zakupki",
        "vizit-v-shourum",
        "ozhidaet-oplaty",
        "gotovim-kp",
        "kp-gotovo-k-zashchite",
        "soglasovanie-kp",
        "proekt-visiak",
        "soglasovano",
        "oplacheno",
        "prepayed",
        "soglasovan-ozhidaet-predoplaty",
        "vyezd-biologa-oplachen",
        "vyezd-biologa-zaplanirovano",
        "predoplata-poluchena",
        "oplata-ne-proshla",
        "proverka-nalichiia",
        "obsluzhivanie-zaplanirovano",
        "obsluzhivanie-soglasovanie",
        "predoplachen-soglasovanie",
        "servisnoe-obsluzhivanie-oplacheno",
        "zakaz-obrabotan-soglasovanie",
        "vyezd-biologa-soglasovanie",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_excluded_methods() -> Vec<String> {
    vec!["servisnoe-obsluzhivanie".to_string(), "komus".to_string()]
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_statuses: default_allowed_statuses(),
            excluded_methods: default_excluded_methods(),
        }
    }
}

// ---------------------------------------------------------------------------
// BusinessHours
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessHours {
    /// Start of business; rolled-forward tasks land here.
    #[serde(default = "default_open_hour")]
    pub open_hour: u32,
    /// Tasks at or after this hour roll to the next day.
    #[serde(default = "default_close_hour")]
    pub close_hour: u32,
    /// Same-day anchor for escalation tasks.
    #[serde(default = "default_escalation_hour")]
    pub escalation_hour: u32,
    /// Time the extractor emits when the text carried no explicit time.
    #[serde(default = "default_placeholder_hour")]
    pub placeholder_hour: u32,
    #[serde(default)]
    pub placeholder_minute: u32,
}

fn default_open_hour() -> u32 {
    10
}

fn default_close_hour() -> u32 {
    20
}

fn default_escalation_hour() -> u32 {
    17
}

fn default_placeholder_hour() -> u32 {
    10
}

impl Default for BusinessHours {
    fn default() -> Self {
        Self {
            open_hour: default_open_hour(),
            close_hour: default_close_hour(),
            escalation_hour: default_escalation_hour(),
            placeholder_hour: default_placeholder_hour(),
            placeholder_minute: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// MarkerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Suffix appended to a comment line once a task was created from it.
    #[serde(default = "default_line_marker")]
    pub line: String,
    #[serde(default = "default_comment_requested")]
    pub comment_requested: String,
    #[serde(default = "default_follow_up_requested")]
    pub follow_up_requested: String,
}

fn default_line_marker() -> String {
    " 📅".to_string()
}

fn default_comment_requested() -> String {
    "🤖 Запрошен комментарий".to_string()
}

fn default_follow_up_requested() -> String {
    "🤖 Запрошена дата касания".to_string()
}

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            line: default_line_marker(),
            comment_requested: default_comment_requested(),
            follow_up_requested: default_follow_up_requested(),
        }
    }
}

// ---------------------------------------------------------------------------
// EscalationTexts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationTexts {
    #[serde(default = "default_fill_comment")]
    pub fill_comment: TaskTemplate,
    #[serde(default = "default_schedule_follow_up")]
    pub schedule_follow_up: TaskTemplate,
}

fn default_fill_comment() -> TaskTemplate {
    TaskTemplate::new(
        "Заполнить комментарий оператора",
        "Комментарий менеджера был пуст при проверке. Необходимо внести актуальную информацию о заказе.",
    )
}

fn default_schedule_follow_up() -> TaskTemplate {
    TaskTemplate::new(
        "Запланировать дату касания",
        "В последних записях комментария не найдена задача в формате 'ДАТА - ДЕЙСТВИЕ'. Запланируйте следующее касание.",
    )
}

impl Default for EscalationTexts {
    fn default() -> Self {
        Self {
            fill_comment: default_fill_comment(),
            schedule_follow_up: default_schedule_follow_up(),
        }
    }
}

// ---------------------------------------------------------------------------
// AgingConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingRule {
    pub status: String,
    pub max_days: i64,
    pub task: TaskTemplate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgingConfig {
    #[serde(default = "default_aging_rules")]
    pub rules: Vec<AgingRule>,
}

fn default_aging_rules() -> Vec<AgingRule> {
    vec![
        AgingRule {
            status: "ozhidaet-oplaty".to_string(),
            max_days: 7,
            task: TaskTemplate::new(
                "Уточнить статус оплаты",
                "Заказ находится в статусе '{status}' более {days} дн. Свяжитесь с клиентом.",
            ),
        },
        AgingRule {
            status: "soglasovanie-kp".to_string(),
            max_days: 5,
            task: TaskTemplate::new(
                "Дожать согласование КП",
                "КП на согласовании более {days} дн. Уточните решение клиента.",
            ),
        },
        AgingRule {
            status: "proekt-visiak".to_string(),
            max_days: 14,
            task: TaskTemplate::new(
                "Реанимировать проект",
                "Проект без движения более {days} дн. Решите, продолжать или закрыть.",
            ),
        },
    ]
}

impl Default for AgingConfig {
    fn default() -> Self {
        Self {
            rules: default_aging_rules(),
        }
    }
}

impl AgingConfig {
    pub fn tracked_statuses(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.status.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// CadenceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Order method code of missed-call orders.
    #[serde(default = "default_cadence_method")]
    pub method: String,
    #[serde(default = "default_cadence_statuses")]
    pub eligible_statuses: Vec<String>,
    /// Number of day-spaced tasks in the cadence.
    #[serde(default = "default_cadence_length")]
    pub length: u32,
    /// How far back new missed-call orders are discovered.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_cadence_hours")]
    pub run_hours: Vec<u32>,
    #[serde(default = "default_cadence_task")]
    pub task: TaskTemplate,
}

fn default_true() -> bool {
    true
}

fn default_cadence_method() -> String {
    "missed-call".to_string()
}

fn default_cadence_statuses() -> Vec<String> {
    vec![
        "new".to_string(),
        "ne-dozvonilis".to_string(),
        "perezvonit-pozdnee".to_string(),
    ]
}

fn default_cadence_length() -> u32 {
    3
}

fn default_lookback_days() -> i64 {
    7
}

fn default_cadence_hours() -> Vec<u32> {
    vec![12]
}

fn default_cadence_task() -> TaskTemplate {
    TaskTemplate::new(
        "Перезвонить по пропущенному звонку ({day}/{length})",
        "Клиент не дозвонился. Попытка {day} из {length}.",
    )
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            method: default_cadence_method(),
            eligible_statuses: default_cadence_statuses(),
            length: default_cadence_length(),
            lookback_days: default_lookback_days(),
            run_hours: default_cadence_hours(),
            task: default_cadence_task(),
        }
    }
}

// ---------------------------------------------------------------------------
// DeliveryConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_undelivered_codes")]
    pub undelivered_codes: Vec<String>,
    #[serde(default = "default_delivered_statuses")]
    pub delivered_statuses: Vec<String>,
    #[serde(default = "default_delivery_hours")]
    pub run_hours: Vec<u32>,
    #[serde(default = "default_delivery_task")]
    pub task: TaskTemplate,
}

fn default_undelivered_codes() -> Vec<String> {
    vec!["self-delivery".to_string(), "storonniaia-dostavka".to_string()]
}

fn default_delivered_statuses() -> Vec<String> {
    vec!["send-to-delivery".to_string(), "dostavlen".to_string()]
}

fn default_delivery_hours() -> Vec<u32> {
    vec![21]
}

fn default_delivery_task() -> TaskTemplate {
    TaskTemplate::new(
        "Актуализировать дату доставки",
        "Заказ со способом доставки '{code}' должен был быть доставлен сегодня, но имеет статус '{status}'. Необходимо актуализировать дату или статус.",
    )
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            undelivered_codes: default_undelivered_codes(),
            delivered_statuses: default_delivered_statuses(),
            run_hours: default_delivery_hours(),
            task: default_delivery_task(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    /// IANA timezone all due dates are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_recent_orders")]
    pub recent_orders: u32,
    /// How many trailing unprocessed comment lines are sent to the extractor.
    #[serde(default = "default_comment_lines")]
    pub comment_lines: usize,
    /// Ledger records untouched for longer than this many days are dropped.
    #[serde(default = "default_ledger_retention_days")]
    pub ledger_retention_days: i64,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub hours: BusinessHours,
    #[serde(default)]
    pub markers: MarkerConfig,
    #[serde(default)]
    pub escalation: EscalationTexts,
    #[serde(default)]
    pub aging: AgingConfig,
    #[serde(default)]
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

fn default_version() -> u32 {
    1
}

fn default_timezone() -> String {
    "Europe/Moscow".to_string()
}

fn default_recent_orders() -> u32 {
    50
}

fn default_comment_lines() -> usize {
    3
}

fn default_ledger_retention_days() -> i64 {
    90
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            timezone: default_timezone(),
            recent_orders: default_recent_orders(),
            comment_lines: default_comment_lines(),
            ledger_retention_days: default_ledger_retention_days(),
            filter: FilterConfig::default(),
            hours: BusinessHours::default(),
            markers: MarkerConfig::default(),
            escalation: EscalationTexts::default(),
            aging: AgingConfig::default(),
            cadence: CadenceConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

static CODE_RE: OnceLock<Regex> = OnceLock::new();

fn code_regex() -> &'static Regex {
    CODE_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").unwrap())
}

impl Config {
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(FollowupError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|_| FollowupError::UnknownTimezone(self.timezone.clone()))
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut warn = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message })
        };

        if self.tz().is_err() {
            warn(
                WarnLevel::Error,
                format!("timezone '{}' is not a known IANA zone", self.timezone),
            );
        }

        if self.filter.allowed_statuses.is_empty() {
            warn(
                WarnLevel::Warning,
                "filter.allowed_statuses is empty: the main pass will skip every order".into(),
            );
        }

        let codes = self
            .filter
            .allowed_statuses
            .iter()
            .chain(&self.filter.excluded_methods)
            .chain(self.aging.rules.iter().map(|r| &r.status))
            .chain(&self.cadence.eligible_statuses)
            .chain(std::iter::once(&self.cadence.method))
            .chain(&self.delivery.undelivered_codes)
            .chain(&self.delivery.delivered_statuses);
        for code in codes {
            if !code_regex().is_match(code) {
                warn(
                    WarnLevel::Warning,
                    format!("'{code}' does not look like a CRM code (lowercase, digits, '-', '_')"),
                );
            }
        }

        let h = &self.hours;
        if h.close_hour > 24 || h.open_hour > 23 || h.escalation_hour > 23 || h.placeholder_hour > 23 {
            warn(WarnLevel::Error, "hours must be within 0..24".into());
        }
        if h.placeholder_minute > 59 {
            warn(WarnLevel::Error, "hours.placeholder_minute must be within 0..60".into());
        }
        if h.open_hour >= h.close_hour {
            warn(
                WarnLevel::Error,
                format!(
                    "hours.open_hour ({}) must be before hours.close_hour ({})",
                    h.open_hour, h.close_hour
                ),
            );
        }
        if h.escalation_hour >= h.close_hour {
            warn(
                WarnLevel::Warning,
                "hours.escalation_hour is outside business hours; same-day escalations never fire"
                    .into(),
            );
        }

        if self.ledger_retention_days < 1 {
            warn(
                WarnLevel::Error,
                format!(
                    "ledger_retention_days ({}) must be at least 1",
                    self.ledger_retention_days
                ),
            );
        }

        if self.markers.line.trim().is_empty() {
            warn(WarnLevel::Error, "markers.line must not be blank".into());
        }
        for (key, marker) in [
            ("comment_requested", &self.markers.comment_requested),
            ("follow_up_requested", &self.markers.follow_up_requested),
        ] {
            if marker.trim().is_empty() {
                warn(WarnLevel::Error, format!("markers.{key} must not be blank"));
            }
        }
        if self.markers.comment_requested == self.markers.follow_up_requested {
            warn(
                WarnLevel::Error,
                "markers.comment_requested and markers.follow_up_requested must differ".into(),
            );
        }

        let mut seen = HashSet::new();
        for rule in &self.aging.rules {
            if !seen.insert(rule.status.as_str()) {
                warn(
                    WarnLevel::Warning,
                    format!("aging rule for '{}' is declared more than once", rule.status),
                );
            }
            if rule.max_days < 0 {
                warn(
                    WarnLevel::Error,
                    format!("aging rule for '{}' has negative max_days", rule.status),
                );
            }
            if !self.filter.allowed_statuses.contains(&rule.status) {
                warn(
                    WarnLevel::Warning,
                    format!(
                        "aging status '{}' is not in filter.allowed_statuses (aging still applies)",
                        rule.status
                    ),
                );
            }
        }

        if self.cadence.enabled && self.cadence.length == 0 {
            warn(
                WarnLevel::Warning,
                "cadence.length is 0: missed-call orders will be evicted without a task".into(),
            );
        }
        for hour in self.cadence.run_hours.iter().chain(&self.delivery.run_hours) {
            if *hour > 23 {
                warn(WarnLevel::Error, format!("run hour {hour} is not a valid hour"));
            }
        }

        if self.comment_lines == 0 {
            warn(
                WarnLevel::Warning,
                "comment_lines is 0: no comment text will ever be analyzed".into(),
            );
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

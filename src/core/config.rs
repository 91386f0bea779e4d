//! Run configuration from YAML, with credentials overridable from the environment

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LeadflowConfig {
    /// Shared HTTP client settings
    pub http: HttpSettings,

    /// Company registry search
    pub pappers: PappersSettings,

    /// LinkedIn company page resolution
    pub enrich_crm: EnrichCrmSettings,

    /// Employee extraction jobs
    pub phantombuster: PhantombusterSettings,

    /// Decision-maker shortlisting
    pub claude: ClaudeSettings,

    /// Contact enrichment
    pub captely: CaptelySettings,

    /// Optional spreadsheet sink
    pub sheets: Option<SheetsSettings>,

    /// Optional outreach campaign sink
    pub emelia: Option<EmeliaSettings>,

    /// Execution knobs shared by all stages
    pub run: RunSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: format!("leadflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Registry search filters, passed through as query parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub collective_agreement: Option<String>,
    pub headcount_bands: Option<String>,
    pub legal_categories: Option<String>,
    pub include_ceased: bool,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            collective_agreement: Some("0045".to_string()),
            headcount_bands: Some("00,01,02,03,11,12,21,22".to_string()),
            legal_categories: Some("5710,5720,5599,5499,5498".to_string()),
            include_ceased: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PappersSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: usize,
    pub page_size: usize,
    /// Fetch each company's detail record to obtain its leaders
    pub fetch_details: bool,
    pub filters: SearchFilters,
}

impl Default for PappersSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.pappers.fr/v2".to_string(),
            api_key: None,
            rate_limit_per_minute: 100,
            page_size: 100,
            fetch_details: true,
            filters: SearchFilters::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichCrmSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: usize,
}

impl Default for EnrichCrmSettings {
    fn default() -> Self {
        Self {
            base_url: "https://gateway.enrich-crm.com/api/ingress/v4".to_string(),
            api_key: None,
            rate_limit_per_minute: 30,
        }
    }
}

/// Cadence and limits for an asynchronous provider job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub timeout_secs: u64,
    pub interval_secs: u64,
    pub page_size: usize,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 600,
            interval_secs: 5,
            page_size: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhantombusterSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub agent_id: Option<String>,
    pub rate_limit_per_minute: usize,
    pub employees_per_company: usize,
    pub poll: PollSettings,
}

impl Default for PhantombusterSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.phantombuster.com/api/v2".to_string(),
            api_key: None,
            agent_id: None,
            rate_limit_per_minute: 10,
            employees_per_company: 50,
            poll: PollSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaudeSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub rate_limit_per_minute: usize,
    pub max_personas: usize,
    /// Candidates beyond this count are left out of the prompt
    pub max_candidates: usize,
    pub target_personas: Vec<String>,
}

impl Default for ClaudeSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: None,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1000,
            rate_limit_per_minute: 50,
            max_personas: 3,
            max_candidates: 50,
            target_personas: default_personas(),
        }
    }
}

fn default_personas() -> Vec<String> {
    [
        "CEO",
        "Directeur General",
        "Gerant",
        "President",
        "Fondateur",
        "DSI",
        "CTO",
        "Directeur Technique",
        "Responsable IT",
        "Directeur Informatique",
        "DRH",
        "Directeur des Ressources Humaines",
        "Responsable RH",
        "HR Director",
        "DAF",
        "Directeur Financier",
        "CFO",
        "Responsable Administratif et Financier",
        "COO",
        "Directeur des Operations",
        "Directeur Commercial",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptelySettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub rate_limit_per_minute: usize,
    pub enrich_phone: bool,
    pub poll: PollSettings,
}

impl Default for CaptelySettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.captely.com/api".to_string(),
            api_key: None,
            rate_limit_per_minute: 50,
            enrich_phone: true,
            poll: PollSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsSettings {
    pub base_url: String,
    pub access_token: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub rate_limit_per_minute: usize,
    pub companies_worksheet: String,
    pub contacts_worksheet: String,
}

impl Default for SheetsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://sheets.googleapis.com/v4".to_string(),
            access_token: None,
            spreadsheet_id: None,
            rate_limit_per_minute: 60,
            companies_worksheet: "Companies".to_string(),
            contacts_worksheet: "Contacts".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmeliaSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub campaign_id: Option<String>,
    pub rate_limit_per_minute: usize,
}

impl Default for EmeliaSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://graphql.emelia.io/graphql".to_string(),
            api_key: None,
            campaign_id: None,
            rate_limit_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Bound on concurrently running per-company jobs
    pub max_workers: usize,
    /// Cap on companies fetched in stage 1 (`None` = no cap)
    pub max_entities: Option<usize>,
    /// Derive decision makers from registry leaders instead of scraping
    pub skip_extraction: bool,
    pub output_dir: PathBuf,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_workers: 3,
            max_entities: None,
            skip_extraction: false,
            output_dir: PathBuf::from("output"),
        }
    }
}

impl LeadflowConfig {
    /// Load configuration from a YAML file, then apply environment overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let mut config: LeadflowConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string (no environment overrides)
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: LeadflowConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a config file
    pub fn from_env() -> Result<Self> {
        let mut config = LeadflowConfig::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay credentials from a key lookup (normally the process environment)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("PAPPERS_API_KEY") {
            self.pappers.api_key = Some(v);
        }
        if let Some(v) = get("ENRICH_CRM_API_KEY") {
            self.enrich_crm.api_key = Some(v);
        }
        if let Some(v) = get("PHANTOMBUSTER_API_KEY") {
            self.phantombuster.api_key = Some(v);
        }
        if let Some(v) = get("PHANTOMBUSTER_AGENT_ID") {
            self.phantombuster.agent_id = Some(v);
        }
        if let Some(v) = get("CAPTELY_API_KEY") {
            self.captely.api_key = Some(v);
        }
        if let Some(v) = get("CLAUDE_API_KEY") {
            self.claude.api_key = Some(v);
        }

        let sheets_token = get("GOOGLE_SHEETS_ACCESS_TOKEN");
        let sheets_id = get("GOOGLE_SHEETS_SPREADSHEET_ID");
        if sheets_token.is_some() || sheets_id.is_some() {
            let sheets = self.sheets.get_or_insert_with(SheetsSettings::default);
            if sheets_token.is_some() {
                sheets.access_token = sheets_token;
            }
            if sheets_id.is_some() {
                sheets.spreadsheet_id = sheets_id;
            }
        }

        let emelia_key = get("EMELIA_API_KEY");
        let campaign_id = get("EMELIA_CAMPAIGN_ID");
        if emelia_key.is_some() || campaign_id.is_some() {
            let emelia = self.emelia.get_or_insert_with(EmeliaSettings::default);
            if emelia_key.is_some() {
                emelia.api_key = emelia_key;
            }
            if campaign_id.is_some() {
                emelia.campaign_id = campaign_id;
            }
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.pappers.api_key.as_deref().map_or(true, str::is_empty) {
            anyhow::bail!("Missing company search API key (pappers.api_key or PAPPERS_API_KEY)");
        }

        let mut limits = vec![
            ("pappers", self.pappers.rate_limit_per_minute),
            ("enrich_crm", self.enrich_crm.rate_limit_per_minute),
            ("phantombuster", self.phantombuster.rate_limit_per_minute),
            ("claude", self.claude.rate_limit_per_minute),
            ("captely", self.captely.rate_limit_per_minute),
        ];
        if let Some(sheets) = &self.sheets {
            limits.push(("sheets", sheets.rate_limit_per_minute));
        }
        if let Some(emelia) = &self.emelia {
            limits.push(("emelia", emelia.rate_limit_per_minute));
        }
        for (provider, limit) in limits {
            if limit == 0 {
                anyhow::bail!("Rate limit for '{}' must be greater than zero", provider);
            }
        }

        if self.run.max_workers == 0 {
            anyhow::bail!("run.max_workers must be greater than zero");
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be greater than zero");
        }
        if self.pappers.page_size == 0 {
            anyhow::bail!("pappers.page_size must be greater than zero");
        }

        for (provider, poll) in [
            ("phantombuster", &self.phantombuster.poll),
            ("captely", &self.captely.poll),
        ] {
            if poll.timeout_secs == 0 || poll.interval_secs == 0 {
                anyhow::bail!(
                    "Poll timeout and interval for '{}' must be greater than zero",
                    provider
                );
            }
            if poll.page_size == 0 {
                anyhow::bail!("Poll page size for '{}' must be greater than zero", provider);
            }
        }

        if self.claude.max_personas == 0 {
            anyhow::bail!("claude.max_personas must be greater than zero");
        }

        Ok(())
    }

    /// Whether the run tracks the optional sink stages
    pub fn has_optional_sinks(&self) -> bool {
        self.sheets.is_some() || self.emelia.is_some()
    }

    /// Copy with every credential masked, for printing
    pub fn redacted(&self) -> Self {
        let mask = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some("***".to_string());
            }
        };
        let mut copy = self.clone();
        mask(&mut copy.pappers.api_key);
        mask(&mut copy.enrich_crm.api_key);
        mask(&mut copy.phantombuster.api_key);
        mask(&mut copy.claude.api_key);
        mask(&mut copy.captely.api_key);
        if let Some(sheets) = copy.sheets.as_mut() {
            mask(&mut sheets.access_token);
        }
        if let Some(emelia) = copy.emelia.as_mut() {
            mask(&mut emelia.api_key);
        }
        copy
    }
}

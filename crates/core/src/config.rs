use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// with the prefix `CREATIVE_PIPELINE__` and overridden by CLI flags.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
    #[serde(default)]
    pub brand: BrandConfig,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
}

fn default_worker_count() -> usize {
    4
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}
fn default_assets_dir() -> PathBuf {
    PathBuf::from("assets/products")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            output_dir: default_output_dir(),
            assets_dir: default_assets_dir(),
            brand: BrandConfig::default(),
            safety: SafetyConfig::default(),
            generation: GenerationConfig::default(),
            translation: TranslationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("CREATIVE_PIPELINE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );
        builder.build()?.try_deserialize()
    }
}

// ─── Brand Config ───────────────────────────────────────────────────────

/// Where the campaign message is composited onto a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayPosition {
    Top,
    Center,
    Bottom,
}

/// Brand guideline set: colors, font, overlay placement and the
/// compliance threshold variants are scored against.
#[derive(Debug, Clone, Deserialize)]
pub struct BrandConfig {
    /// Named brand colors as `#RRGGBB` hex strings. The `text` entry is
    /// the overlay text color.
    #[serde(default = "default_brand_colors")]
    pub colors: HashMap<String, String>,
    #[serde(default = "default_font_path")]
    pub font_path: PathBuf,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default = "default_overlay_position")]
    pub overlay_position: OverlayPosition,
    #[serde(default = "default_overlay_padding")]
    pub overlay_padding: u32,
    /// Overlay text wraps to at most this percentage of the image width.
    #[serde(default = "default_max_width_percent")]
    pub max_width_percent: u32,
    #[serde(default = "default_shadow")]
    pub shadow: bool,
    #[serde(default = "default_shadow_offset")]
    pub shadow_offset: i32,
    #[serde(default = "default_logo_path")]
    pub logo_path: PathBuf,
    #[serde(default = "default_require_logo")]
    pub require_logo: bool,
    #[serde(default = "default_compliance_threshold")]
    pub compliance_threshold: f64,
}

fn default_brand_colors() -> HashMap<String, String> {
    HashMap::from([
        ("primary".to_string(), "#FF6B35".to_string()),
        ("text".to_string(), "#FFFFFF".to_string()),
    ])
}
fn default_font_path() -> PathBuf {
    PathBuf::from("assets/fonts/brand.ttf")
}
fn default_font_size() -> f32 {
    72.0
}
fn default_overlay_position() -> OverlayPosition {
    OverlayPosition::Bottom
}
fn default_overlay_padding() -> u32 {
    40
}
fn default_max_width_percent() -> u32 {
    80
}
fn default_shadow() -> bool {
    true
}
fn default_shadow_offset() -> i32 {
    3
}
fn default_logo_path() -> PathBuf {
    PathBuf::from("assets/logos/brand_logo.png")
}
fn default_require_logo() -> bool {
    false
}
fn default_compliance_threshold() -> f64 {
    0.70
}

impl Default for BrandConfig {
    fn default() -> Self {
        Self {
            colors: default_brand_colors(),
            font_path: default_font_path(),
            font_size: default_font_size(),
            overlay_position: default_overlay_position(),
            overlay_padding: default_overlay_padding(),
            max_width_percent: default_max_width_percent(),
            shadow: default_shadow(),
            shadow_offset: default_shadow_offset(),
            logo_path: default_logo_path(),
            require_logo: default_require_logo(),
            compliance_threshold: default_compliance_threshold(),
        }
    }
}

// ─── Safety Config ──────────────────────────────────────────────────────

/// What a prohibited-term match does to the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyPolicy {
    /// Any flag halts the job before generation begins.
    Block,
    /// Flags are recorded in the report while generation proceeds.
    Warn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_safety_policy")]
    pub policy: SafetyPolicy,
    /// Prohibited term -> suggested replacement. Empty suggestion means
    /// no replacement is configured.
    #[serde(default = "default_prohibited_terms")]
    pub prohibited_terms: HashMap<String, String>,
}

fn default_safety_policy() -> SafetyPolicy {
    SafetyPolicy::Block
}
fn default_prohibited_terms() -> HashMap<String, String> {
    HashMap::from([
        ("guaranteed".to_string(), "reliable".to_string()),
        ("free money".to_string(), "great value".to_string()),
        ("miracle".to_string(), "remarkable".to_string()),
        ("cure".to_string(), "improve".to_string()),
        ("risk-free".to_string(), "low-risk".to_string()),
        ("100%".to_string(), String::new()),
        ("best in the world".to_string(), "industry-leading".to_string()),
    ])
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            policy: default_safety_policy(),
            prohibited_terms: default_prohibited_terms(),
        }
    }
}

// ─── Generation Config ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_size")]
    pub size: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Maximum retries after a transient failure.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bound on per-product fan-out within one job.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Cost in USD per image, keyed `{model}_{quality}_{size-sans-x}`.
    #[serde(default = "default_pricing")]
    pub pricing: HashMap<String, f64>,
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/images/generations".to_string()
}
fn default_model() -> String {
    "dall-e-3".to_string()
}
fn default_size() -> String {
    "1024x1024".to_string()
}
fn default_quality() -> String {
    "standard".to_string()
}
fn default_max_retries() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_backoff_cap_ms() -> u64 {
    30_000
}
fn default_request_timeout_secs() -> u64 {
    60
}
fn default_max_concurrent() -> usize {
    3
}
fn default_pricing() -> HashMap<String, f64> {
    HashMap::from([
        ("dall-e-3_standard_10241024".to_string(), 0.040),
        ("dall-e-3_hd_10241024".to_string(), 0.080),
        ("dall-e-3_standard_17921024".to_string(), 0.080),
        ("dall-e-3_hd_17921024".to_string(), 0.120),
    ])
}
fn default_prompt_template() -> String {
    "Professional product photography of {product_name}, {product_description}, \
     studio lighting, clean background, high resolution, commercial advertising style"
        .to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: String::new(),
            model: default_model(),
            size: default_size(),
            quality: default_quality(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent: default_max_concurrent(),
            pricing: default_pricing(),
            prompt_template: default_prompt_template(),
        }
    }
}

impl GenerationConfig {
    /// Cost of one image at the configured model/quality/size.
    pub fn cost_per_image(&self) -> f64 {
        let key = format!(
            "{}_{}_{}",
            self.model,
            self.quality,
            self.size.replace('x', "")
        );
        self.pricing.get(&key).copied().unwrap_or(0.040)
    }
}

// ─── Translation Config ─────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationConfig {
    #[serde(default = "default_translation_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_translation_model")]
    pub model: String,
    #[serde(default = "default_translation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_translation_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

fn default_translation_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_translation_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_translation_retries() -> u32 {
    2
}
fn default_translation_timeout_secs() -> u64 {
    30
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(".translation_cache")
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_url: default_translation_api_url(),
            api_key: String::new(),
            model: default_translation_model(),
            max_retries: default_translation_retries(),
            request_timeout_secs: default_translation_timeout_secs(),
            cache_dir: default_cache_dir(),
        }
    }
}

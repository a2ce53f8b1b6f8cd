use std::env;

/// Monthly conversation quotas per subscription tier.
///
/// The effective limit for a user is always derived from these values plus
/// the academic-email override; it is never stored on the user row.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub free: u32,
    pub standard: u32,
    pub premium: u32,
    pub academic: u32,
    /// Email domain suffixes that unlock the academic tier (e.g. ".edu").
    pub academic_domains: Vec<String>,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free: 5,
            standard: 25,
            premium: 100,
            academic: 150,
            academic_domains: vec![".edu".to_string(), ".ac.uk".to_string()],
        }
    }
}

/// AI provider configuration. Clients are constructed once at startup and
/// shared for the process lifetime.
#[derive(Debug, Clone)]
pub struct AiConfig {
    /// Gemini API key for the analysis/chat/title model.
    pub gemini_api_key: String,
    /// Multi-modal analysis and follow-up chat model.
    pub analysis_model: String,
    /// Cheaper model used for image title generation.
    pub title_model: String,

    /// OpenAI-compatible endpoint used for note extraction.
    pub extraction_base_url: String,
    pub extraction_api_key: String,
    pub extraction_model: String,

    /// Hard timeout applied to every provider call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: String::new(),
            analysis_model: "gemini-2.0-flash".to_string(),
            title_model: "gemini-2.0-flash-lite".to_string(),
            extraction_base_url: "https://api.openai.com/v1".to_string(),
            extraction_api_key: String::new(),
            extraction_model: "gpt-4o-mini".to_string(),
            request_timeout_secs: 120,
        }
    }
}

/// Application configuration, loaded once from the environment at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Maximum upload size in bytes (default: 64 MB)
    pub max_file_size: usize,

    /// MIME allow-list checked before any storage write.
    pub allowed_mime_types: Vec<String>,

    /// Local directory used as the fallback storage tier.
    pub uploads_dir: String,

    /// JWT Secret Key (Required in production)
    pub jwt_secret: String,

    /// Allowed CORS Origins (comma separated)
    pub allowed_origins: Vec<String>,

    pub quotas: QuotaConfig,
    pub ai: AiConfig,
}

fn default_allowed_mimes() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/webp",
        "image/gif",
        "audio/mpeg",
        "audio/wav",
        "audio/ogg",
        "audio/mp4",
        "video/mp4",
        "video/quicktime",
        "video/webm",
        "application/pdf",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024, // 64 MB
            allowed_mime_types: default_allowed_mimes(),
            uploads_dir: "./uploads".to_string(),
            jwt_secret: "secret".to_string(),
            // More secure default: localhost only instead of wildcard
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(), // Vite default
                "http://127.0.0.1:3000".to_string(),
            ],
            quotas: QuotaConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: env::var("MAX_FILE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_file_size),

            allowed_mime_types: env::var("ALLOWED_MIME_TYPES")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_mime_types),

            uploads_dir: env::var("UPLOADS_DIR").unwrap_or(default.uploads_dir),

            jwt_secret: env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()), // Fallback for dev convenience

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(default.allowed_origins),

            quotas: QuotaConfig {
                free: env_u32("QUOTA_FREE", default.quotas.free),
                standard: env_u32("QUOTA_STANDARD", default.quotas.standard),
                premium: env_u32("QUOTA_PREMIUM", default.quotas.premium),
                academic: env_u32("QUOTA_ACADEMIC", default.quotas.academic),
                academic_domains: env::var("ACADEMIC_EMAIL_DOMAINS")
                    .ok()
                    .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
                    .unwrap_or(default.quotas.academic_domains),
            },

            ai: AiConfig {
                gemini_api_key: env::var("GEMINI_API_KEY").unwrap_or_default(),
                analysis_model: env::var("ANALYSIS_MODEL").unwrap_or(default.ai.analysis_model),
                title_model: env::var("TITLE_MODEL").unwrap_or(default.ai.title_model),
                extraction_base_url: env::var("EXTRACTION_BASE_URL")
                    .unwrap_or(default.ai.extraction_base_url),
                extraction_api_key: env::var("EXTRACTION_API_KEY").unwrap_or_default(),
                extraction_model: env::var("EXTRACTION_MODEL")
                    .unwrap_or(default.ai.extraction_model),
                request_timeout_secs: env::var("AI_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default.ai.request_timeout_secs),
            },
        }
    }

    /// Create config for development (relaxed limits, local-only origins)
    pub fn development() -> Self {
        Self {
            max_file_size: 256 * 1024 * 1024,
            ..Self::default()
        }
    }

    /// Returns true when the MIME type passes the upload allow-list.
    pub fn is_mime_allowed(&self, mime_type: &str) -> bool {
        self.allowed_mime_types
            .iter()
            .any(|allowed| allowed == mime_type)
    }
}

fn env_u32(key: &str, fallback: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`). The event stream
    /// route is exempted from this layer.
    pub request_timeout_secs: u64,
    /// Root of the media tree; uploads land in `{media_dir}/uploads`.
    pub media_dir: PathBuf,
    /// Base URL of the remote detection engine.
    pub detector_url: String,
    /// Idle TTL after which finished jobs are evicted (seconds).
    pub job_ttl_secs: u64,
    /// Interval of the registry sweeper (seconds).
    pub sweep_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                    |
    /// |-----------------------|----------------------------|
    /// | `HOST`                | `0.0.0.0`                  |
    /// | `PORT`                | `8000`                     |
    /// | `CORS_ORIGINS`        | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`| `30`                       |
    /// | `MEDIA_DIR`           | `./media`                  |
    /// | `DETECTOR_URL`        | `http://127.0.0.1:8600`    |
    /// | `JOB_TTL_SECS`        | `3600`                     |
    /// | `SWEEP_INTERVAL_SECS` | `60`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let media_dir = PathBuf::from(std::env::var("MEDIA_DIR").unwrap_or_else(|_| "./media".into()));

        let detector_url =
            std::env::var("DETECTOR_URL").unwrap_or_else(|_| "http://127.0.0.1:8600".into());

        let job_ttl_secs: u64 = std::env::var("JOB_TTL_SECS")
            .unwrap_or_else(|_| "3600".into())
            .parse()
            .expect("JOB_TTL_SECS must be a valid u64");

        let sweep_interval_secs: u64 = std::env::var("SWEEP_INTERVAL_SECS")
            .unwrap_or_else(|_| "60".into())
            .parse()
            .expect("SWEEP_INTERVAL_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            media_dir,
            detector_url,
            job_ttl_secs,
            sweep_interval_secs,
        }
    }

    /// Directory uploaded videos are stored in.
    pub fn uploads_dir(&self) -> PathBuf {
        self.media_dir.join("uploads")
    }
}

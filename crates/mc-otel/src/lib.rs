use once_cell::sync::OnceCell;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{
    fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Target used by the live-collection code paths.
pub const LIVE_TARGET: &str = "mc.live";

static LIVE_LOG_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Install the global subscriber: console output filtered by `RUST_LOG`
/// (default `info`), plus a rolling `mc.live` file log when `MC_LOG_ROLL=1`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(fmt::layer().with_filter(filter));
    match live_log_settings() {
        Some(settings) => {
            if std::fs::create_dir_all(&settings.dir).is_err() {
                tracing::warn!(directory = %settings.dir, "failed to create live log directory");
            }
            let writer = match settings.rotation {
                Rotation::Hourly => {
                    tracing_appender::rolling::hourly(&settings.dir, &settings.prefix)
                }
                Rotation::Minutely => {
                    tracing_appender::rolling::minutely(&settings.dir, &settings.prefix)
                }
                Rotation::Daily => {
                    tracing_appender::rolling::daily(&settings.dir, &settings.prefix)
                }
            };
            let (nb, guard) = tracing_appender::non_blocking(writer);
            let _ = LIVE_LOG_GUARD.set(guard);
            let targets = Targets::new().with_target(LIVE_TARGET, tracing::Level::DEBUG);
            let live_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(nb)
                .with_filter(targets);
            let _ = registry.with(live_layer).try_init();
        }
        None => {
            let _ = registry.try_init();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rotation {
    Daily,
    Hourly,
    Minutely,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct LiveLogSettings {
    dir: String,
    prefix: String,
    rotation: Rotation,
}

fn live_log_settings() -> Option<LiveLogSettings> {
    if std::env::var("MC_LOG_ROLL").ok().as_deref() != Some("1") {
        return None;
    }
    let dir = std::env::var("MC_LOG_DIR").unwrap_or_else(|_| "logs".to_string());
    let prefix = std::env::var("MC_LOG_PREFIX").unwrap_or_else(|_| "live".into());
    let rotation = match std::env::var("MC_LOG_ROTATION")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "hourly" => Rotation::Hourly,
        "minutely" => Rotation::Minutely,
        _ => Rotation::Daily,
    };
    Some(LiveLogSettings {
        dir,
        prefix,
        rotation,
    })
}

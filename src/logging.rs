use colored::{ColoredString, Colorize};
use log::{Level, LevelFilter, SetLoggerError};

/// Crates whose info logs are shown, everything else only logs warnings and errors
const LOCAL_CRATES: [&str; 3] = ["rsvp", "rsvp_server", "rsvp_collab"];

/// Set to `1` or `true` to also show debug logs from the local crates
pub const VERBOSE_ENV: &str = "RSVP_LOG_VERBOSE";

pub fn init_logger(verbose: bool) -> Result<(), SetLoggerError> {
    let local_level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    LOCAL_CRATES
        .iter()
        .fold(fern::Dispatch::new().level(LevelFilter::Warn), |dispatch, name| {
            dispatch.level_for(*name, local_level)
        })
        .format(|out, message, record| {
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                badge(record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                label(record.target()),
                message
            ))
        })
        .chain(std::io::stdout())
        .apply()
}

pub fn verbose_from_env() -> bool {
    std::env::var(VERBOSE_ENV).is_ok_and(|v| matches!(v.trim(), "1" | "true"))
}

/// The crate a log line came from, highlighted for our own crates
fn label(target: &str) -> ColoredString {
    let name = target.split("::").next().unwrap_or_default();

    match name {
        "rsvp" => "RSVP".blue(),
        "rsvp_server" => "SERVER".bright_green(),
        "rsvp_collab" => "COLLAB".bright_purple(),
        other => other.clear(),
    }
}

fn badge(level: Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_labels_are_resolved_by_crate() {
        colored::control::set_override(false);

        assert_eq!(label("rsvp").to_string(), "RSVP");
        assert_eq!(label("rsvp_collab::mailer::queue").to_string(), "COLLAB");
        assert_eq!(label("rsvp_server::errors").to_string(), "SERVER");
        assert_eq!(label("sqlx::query").to_string(), "sqlx");
    }
}

use cargolink_db::{connect_with_settings, OrderRepository, SqlOrderRepository};
use chrono::{Duration, Utc};

use crate::commands::{load_config, runtime, CommandResult};

/// Drafts still `in_progress` that were started more than `older_than_hours` ago.
pub fn run(older_than_hours: i64) -> CommandResult {
    if older_than_hours < 0 {
        return CommandResult::failure(
            "drafts",
            "invalid_input",
            format!("--older-than-hours must not be negative, got {older_than_hours}"),
            2,
        );
    }
    let config = match load_config("drafts") {
        Ok(config) => config,
        Err(failure) => return failure,
    };
    let runtime = match runtime("drafts") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let cutoff = Utc::now() - Duration::hours(older_than_hours);
    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        let stale = SqlOrderRepository::new(pool.clone())
            .list_stale_drafts(cutoff)
            .await
            .map_err(|error| ("store_query", error.to_string(), 6u8))?;
        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(stale)
    });

    match result {
        Ok(stale) if stale.is_empty() => {
            CommandResult::success("drafts", format!("no drafts older than {older_than_hours}h"))
        }
        Ok(stale) => {
            let listed: Vec<String> = stale
                .iter()
                .map(|order| {
                    format!(
                        "{} (chat {}, {}, started {})",
                        order.id,
                        order.chat_id,
                        order.deal_type.as_str(),
                        order.created_at.format("%d.%m.%Y %H:%M UTC")
                    )
                })
                .collect();
            CommandResult::success(
                "drafts",
                format!("{} stale drafts: {}", stale.len(), listed.join("; ")),
            )
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("drafts", error_class, message, exit_code)
        }
    }
}

use olpar_core::util::unix_timestamp_millis;

use crate::cli::WatchTarget;
use crate::commands::common::{format_record_lines, record_to_list_item, Context};
use crate::error::CliError;

/// Print a snapshot on every change until Ctrl-C.
pub async fn run_watch(context: &Context, target: WatchTarget) -> Result<(), CliError> {
    let subscription = match target {
        WatchTarget::Records => {
            let users = context.persistence.get_users().await?;
            context
                .persistence
                .on_records_update(move |records| {
                    let now_ms = unix_timestamp_millis();
                    let items = records
                        .iter()
                        .map(|record| record_to_list_item(record, &users, now_ms))
                        .collect::<Vec<_>>();
                    println!("--- {} records", items.len());
                    for line in format_record_lines(&items) {
                        println!("{line}");
                    }
                })
                .await?
        }
        WatchTarget::Users => {
            context
                .persistence
                .on_users_update(|users| {
                    println!("--- {} users", users.len());
                    for user in users {
                        println!("{:<20} {}", user.id, user.name);
                    }
                })
                .await?
        }
    };

    tokio::signal::ctrl_c().await?;
    subscription.unsubscribe();
    Ok(())
}

use olpar_core::CloudStatus;
use serde::Serialize;

use crate::commands::common::Context;
use crate::error::CliError;

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    cloud: CloudStatus,
    cloud_enabled: bool,
    records: usize,
    users: usize,
}

/// Probe the stores once, then report the resulting cloud state.
pub async fn run_status(context: &Context, as_json: bool) -> Result<(), CliError> {
    let users = context.persistence.get_users().await?.len();
    let records = context.persistence.get_records().await?.len();
    let report = StatusReport {
        cloud: context.persistence.cloud_status(),
        cloud_enabled: context.persistence.is_cloud_enabled(),
        records,
        users,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mode = if report.cloud_enabled { "cloud" } else { "local" };
        println!("Storage: {mode}");
        println!("Cloud:   {}", report.cloud.state.as_str());
        if !report.cloud.message.is_empty() {
            println!("         {}", report.cloud.message);
        }
        println!("Records: {}", report.records);
        println!("Users:   {}", report.users);
    }
    Ok(())
}

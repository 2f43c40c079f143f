use std::path::{Path, PathBuf};

use olpar_core::export::{render_records_export, suggested_export_file_name, ExportFormat};
use olpar_core::models::sort_newest_first;
use olpar_core::util::unix_timestamp_millis;

use crate::cli;
use crate::commands::common::Context;
use crate::error::CliError;

impl From<cli::ExportFormat> for ExportFormat {
    fn from(format: cli::ExportFormat) -> Self {
        match format {
            cli::ExportFormat::Json => Self::Json,
            cli::ExportFormat::Csv => Self::Csv,
        }
    }
}

/// Write the export to `output_path`, or stdout when omitted. A directory
/// receives a timestamped file.
pub async fn run_export(
    context: &Context,
    format: cli::ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let format = ExportFormat::from(format);
    let mut records = context.persistence.get_records().await?;
    sort_newest_first(&mut records);
    let users = context.persistence.get_users().await?;
    let rendered = render_records_export(&records, &users, format)?;

    if let Some(path) = output_path {
        let path = resolve_output_path(path, format, unix_timestamp_millis());
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        print!("{rendered}");
    }

    Ok(())
}

fn resolve_output_path(path: &Path, format: ExportFormat, now_ms: i64) -> PathBuf {
    if path.is_dir() {
        path.join(suggested_export_file_name(format, now_ms))
    } else {
        path.to_path_buf()
    }
}

use std::path::Path;

use olpar_core::models::{
    image_data_uri, sort_newest_first, verification_link, ClientInfo, Coords, ImageSlot,
};
use olpar_core::util::{normalize_text_option, unix_timestamp_millis};
use olpar_core::{AuditRecord, ClientValidationStatus};

use crate::cli::{CaptureArgs, EditRecordArgs, StatusArg};
use crate::commands::common::{
    filter_by_auditor, format_record_lines, load_record, record_to_list_item, Context,
    RecordListItem,
};
use crate::error::CliError;

pub async fn run_list(
    context: &Context,
    auditor: Option<&str>,
    mine: bool,
    limit: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    let users = context.persistence.get_users().await?;
    let mut records = context.persistence.get_records().await?;

    if mine {
        let profile = context.require_session()?;
        records.retain(|record| record.is_owned_by(&profile));
    } else if let Some(auditor) = auditor.map(str::trim).filter(|value| !value.is_empty()) {
        records = filter_by_auditor(records, auditor, &users);
    }

    sort_newest_first(&mut records);
    if let Some(limit) = limit {
        records.truncate(limit);
    }

    let now_ms = unix_timestamp_millis();
    let items = records
        .iter()
        .map(|record| record_to_list_item(record, &users, now_ms))
        .collect::<Vec<RecordListItem>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_record_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_show(context: &Context, id: &str, as_json: bool) -> Result<(), CliError> {
    let record = load_record(context, id).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let users = context.persistence.get_users().await?;
    println!("{} [{}]", record.id, record.client_validation_status.as_str());
    println!("Captured: {}", record.timestamp);
    println!("Client:   {} ({})", record.client.contact_name, record.client.client_type);
    println!(
        "Address:  {}, {}, {}",
        record.client.address, record.client.neighborhood, record.client.comuna
    );
    if !record.client.phone.is_empty() {
        println!("Phone:    {}", record.client.phone);
    }
    let hours = record.client.hours();
    if !hours.is_empty() {
        println!("Hours:    {hours}");
    }
    if let Some(coords) = record.gps_outside {
        let manual = if coords.manually_adjusted { " (adjusted)" } else { "" };
        println!(
            "GPS:      {:.6}, {:.6} ±{:.0}m{manual}",
            coords.lat, coords.lng, coords.accuracy
        );
    }
    if let Some(auditor) = record.auditor_display_name(&users) {
        println!("Auditor:  {auditor}");
    }
    if !record.client.observations.is_empty() {
        println!();
        println!("{}", record.client.observations);
    }
    Ok(())
}

pub async fn run_capture(context: &Context, args: CaptureArgs) -> Result<AuditRecord, CliError> {
    let profile = context.require_session()?;
    let name = normalize_text_option(Some(args.name)).ok_or_else(|| {
        olpar_core::Error::InvalidInput("client name cannot be empty".to_string())
    })?;

    let client = ClientInfo {
        client_type: args.client_type.trim().to_string(),
        contact_name: name,
        city: args.city.trim().to_string(),
        comuna: args.comuna.trim().to_string(),
        neighborhood: args.neighborhood.trim().to_string(),
        address: args.address.trim().to_string(),
        phone: args.phone.trim().to_string(),
        email: args.email.trim().to_string(),
        open_time: args.open.trim().to_string(),
        close_time: args.close.trim().to_string(),
        observations: args.observations.trim().to_string(),
    };
    let gps = match (args.lat, args.lng) {
        (Some(lat), Some(lng)) => Some(Coords {
            lat,
            lng,
            accuracy: args.accuracy,
            captured_at_ms: unix_timestamp_millis(),
            manually_adjusted: false,
        }),
        _ => None,
    };

    let record = AuditRecord::new(client, gps, Some(&profile));
    context.persistence.save_record(&record).await?;
    println!("{}", record.id);
    Ok(record)
}

pub async fn run_edit(context: &Context, args: EditRecordArgs) -> Result<AuditRecord, CliError> {
    let EditRecordArgs {
        id,
        name,
        client_type,
        address,
        city,
        comuna,
        neighborhood,
        phone,
        email,
        open,
        close,
        observations,
        facade_image,
        interior_image,
    } = args;

    let record = load_record(context, &id).await?;
    if name.as_deref().is_some_and(|name| name.trim().is_empty()) {
        return Err(olpar_core::Error::InvalidInput("client name cannot be empty".to_string()).into());
    }
    let facade = facade_image.as_deref().map(read_image).transpose()?;
    let interior = interior_image.as_deref().map(read_image).transpose()?;

    let updated = context
        .persistence
        .update_record(&record.id, move |record| {
            let client = &mut record.client;
            replace_field(&mut client.contact_name, name);
            replace_field(&mut client.client_type, client_type);
            replace_field(&mut client.address, address);
            replace_field(&mut client.city, city);
            replace_field(&mut client.comuna, comuna);
            replace_field(&mut client.neighborhood, neighborhood);
            replace_field(&mut client.phone, phone);
            replace_field(&mut client.email, email);
            replace_field(&mut client.open_time, open);
            replace_field(&mut client.close_time, close);
            replace_field(&mut client.observations, observations);
            if let Some(data_uri) = facade {
                record.set_image(ImageSlot::Facade, data_uri);
            }
            if let Some(data_uri) = interior {
                record.set_image(ImageSlot::Interior, data_uri);
            }
        })
        .await?
        .ok_or_else(|| CliError::RecordNotFound(record.id.clone()))?;

    println!("{}", updated.id);
    Ok(updated)
}

fn replace_field(field: &mut String, value: Option<String>) {
    if let Some(value) = value {
        *field = value.trim().to_string();
    }
}

fn read_image(path: &Path) -> Result<String, CliError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(image_data_uri(&file_name, &bytes)?)
}

pub async fn run_set_status(context: &Context, id: &str, status: StatusArg) -> Result<(), CliError> {
    let record = load_record(context, id).await?;
    let status = match status {
        StatusArg::Pending => ClientValidationStatus::Pending,
        StatusArg::Verified => ClientValidationStatus::Verified,
        StatusArg::Reported => ClientValidationStatus::Reported,
    };
    context
        .persistence
        .set_record_status(&record.id, status)
        .await?;
    println!("{} {}", record.id, status.as_str());
    Ok(())
}

pub async fn run_verify(context: &Context, id: &str) -> Result<(), CliError> {
    let record = load_record(context, id).await?;
    context.persistence.verify_record(&record.id).await?;
    println!("{} verified", record.id);
    Ok(())
}

pub async fn run_link(context: &Context, id: &str, base_url: &str) -> Result<(), CliError> {
    let record = load_record(context, id).await?;
    println!("{}", verification_link(base_url.trim(), &record.id));
    Ok(())
}

pub async fn run_move(context: &Context, id: &str, lat: f64, lng: f64) -> Result<(), CliError> {
    let mut record = load_record(context, id).await?;
    let base = record.gps_outside.unwrap_or(Coords {
        lat,
        lng,
        accuracy: 0.0,
        captured_at_ms: unix_timestamp_millis(),
        manually_adjusted: false,
    });
    record.gps_outside = Some(base.adjusted(lat, lng));
    context.persistence.save_record(&record).await?;
    println!("{} moved to {lat:.6}, {lng:.6}", record.id);
    Ok(())
}

pub async fn run_delete(context: &Context, id: &str) -> Result<(), CliError> {
    let record = load_record(context, id).await?;
    context.persistence.delete_record(&record.id).await?;
    println!("{}", record.id);
    Ok(())
}

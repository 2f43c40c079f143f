//! Record export helpers shared by every client.

use std::fmt::Write as _;

use crate::models::{AuditRecord, UserProfile};

const CSV_HEADER: [&str; 13] = [
    "id",
    "date",
    "client",
    "type",
    "address",
    "comuna",
    "neighborhood",
    "phone",
    "hours",
    "auditor",
    "status",
    "latitude",
    "longitude",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

/// Render records as pretty-printed JSON, images included.
pub fn render_json_export(records: &[AuditRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(records)
}

/// Render one spreadsheet row per record. Auditor ids are resolved to the
/// current display name through `users`.
#[must_use]
pub fn render_csv_export(records: &[AuditRecord], users: &[UserProfile]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "{}", CSV_HEADER.join(","));

    for record in records {
        let date = record
            .created_at()
            .map_or_else(|| record.timestamp.clone(), |time| time.format("%Y-%m-%d %H:%M").to_string());
        let (latitude, longitude) = record
            .gps_outside
            .map_or((String::new(), String::new()), |coords| {
                (format!("{:.6}", coords.lat), format!("{:.6}", coords.lng))
            });
        let fields = [
            record.id.clone(),
            date,
            record.client.contact_name.clone(),
            record.client.client_type.clone(),
            record.client.address.clone(),
            record.client.comuna.clone(),
            record.client.neighborhood.clone(),
            record.client.phone.clone(),
            record.client.hours(),
            record.auditor_display_name(users).unwrap_or_default(),
            record.client_validation_status.as_str().to_string(),
            latitude,
            longitude,
        ];
        let row: Vec<String> = fields.iter().map(|field| csv_field(field)).collect();
        let _ = writeln!(output, "{}", row.join(","));
    }

    output
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render records in `format`. `users` resolves auditor names for CSV.
pub fn render_records_export(
    records: &[AuditRecord],
    users: &[UserProfile],
    format: ExportFormat,
) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(records),
        ExportFormat::Csv => Ok(render_csv_export(records, users)),
    }
}

/// Build a deterministic default file name for export flows.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("olpar-export-{timestamp_ms}.{}", format.extension())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{ClientInfo, ClientValidationStatus, Coords, Role};

    fn sample() -> AuditRecord {
        let mut record = AuditRecord::new(
            ClientInfo {
                contact_name: "Almacén \"Don Lucho\", Ltda".to_string(),
                client_type: "Almacén".to_string(),
                comuna: "Maipú".to_string(),
                open_time: "09:00".to_string(),
                close_time: "21:00".to_string(),
                ..ClientInfo::default()
            },
            Some(Coords {
                lat: -33.5,
                lng: -70.75,
                accuracy: 8.0,
                captured_at_ms: 1_704_067_200_000,
                manually_adjusted: false,
            }),
            None,
        );
        record.id = "OLP-100001".to_string();
        record.timestamp = "2024-01-01T12:30:00Z".to_string();
        record.auditor_id = Some("user-1".to_string());
        record.client_validation_status = ClientValidationStatus::Verified;
        record
    }

    #[test]
    fn csv_quotes_fields_and_resolves_auditor() {
        let users = vec![UserProfile {
            id: "user-1".to_string(),
            name: "Carla".to_string(),
            pin: "1234".to_string(),
            avatar_color: String::new(),
            role: Role::Auditor,
        }];

        let rendered = render_csv_export(&[sample()], &users);
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next(),
            Some("id,date,client,type,address,comuna,neighborhood,phone,hours,auditor,status,latitude,longitude")
        );
        assert_eq!(
            lines.next(),
            Some("OLP-100001,2024-01-01 12:30,\"Almacén \"\"Don Lucho\"\", Ltda\",Almacén,,Maipú,,,09:00-21:00,Carla,verified,-33.500000,-70.750000")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn csv_keeps_stored_auditor_name_when_unknown() {
        let mut record = sample();
        record.auditor_id = Some("Pedro".to_string());
        record.gps_outside = None;
        let rendered = render_csv_export(&[record], &[]);
        assert!(rendered.contains(",Pedro,verified,,\n"));
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "olpar-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Csv, 456),
            "olpar-export-456.csv"
        );
    }
}

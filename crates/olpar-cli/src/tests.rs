use olpar_core::models::DEFAULT_ADMIN_ID;
use olpar_core::{AppConfig, AuditRecord, ClientValidationStatus, Error};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::cli::{CaptureArgs, CompletionShell, EditRecordArgs, ExportFormat, RoleArg, StatusArg};
use crate::commands::common::{
    filter_by_auditor, format_relative_time, normalize_record_identifier, Context,
};
use crate::commands::completions::run_completions;
use crate::commands::export::run_export;
use crate::commands::{records, session, users};
use crate::error::CliError;

fn test_context() -> (Context, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig {
        data_dir: Some(dir.path().join("data")),
        ..AppConfig::default()
    };
    (Context::from_config(&config).unwrap(), dir)
}

fn capture_args(name: &str) -> CaptureArgs {
    CaptureArgs {
        name: name.to_string(),
        client_type: "Almacén".to_string(),
        address: "Av. Pajaritos 1234".to_string(),
        city: "Santiago".to_string(),
        comuna: "Maipú".to_string(),
        neighborhood: String::new(),
        phone: String::new(),
        email: String::new(),
        open: "09:00".to_string(),
        close: "21:00".to_string(),
        observations: String::new(),
        lat: Some(-33.51),
        lng: Some(-70.76),
        accuracy: 12.0,
    }
}

fn edit_args(id: &str) -> EditRecordArgs {
    EditRecordArgs {
        id: id.to_string(),
        name: None,
        client_type: None,
        address: None,
        city: None,
        comuna: None,
        neighborhood: None,
        phone: None,
        email: None,
        open: None,
        close: None,
        observations: None,
        facade_image: None,
        interior_image: None,
    }
}

async fn login_admin(context: &Context) {
    session::run_login(context, DEFAULT_ADMIN_ID, "2025")
        .await
        .unwrap();
}

#[test]
fn normalize_record_identifier_trims_but_keeps_case() {
    assert_eq!(
        normalize_record_identifier("  olp-100001 ").unwrap(),
        "olp-100001"
    );
    assert!(matches!(
        normalize_record_identifier(" \t "),
        Err(CliError::EmptyRecordId)
    ));
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn filter_by_auditor_matches_ids_and_stored_names() {
    let by_id = AuditRecord {
        auditor_id: Some(DEFAULT_ADMIN_ID.to_string()),
        ..AuditRecord::new(Default::default(), None, None)
    };
    let by_name = AuditRecord {
        auditor_id: Some("Administrador Olpar".to_string()),
        ..AuditRecord::new(Default::default(), None, None)
    };
    let other = AuditRecord {
        auditor_id: Some("Pedro".to_string()),
        ..AuditRecord::new(Default::default(), None, None)
    };
    let users = vec![olpar_core::models::default_admin()];

    let mine = filter_by_auditor(
        vec![by_id.clone(), by_name.clone(), other.clone()],
        "Administrador Olpar",
        &users,
    );
    assert_eq!(mine, vec![by_id, by_name]);

    let unknown = filter_by_auditor(vec![other.clone()], "Pedro", &users);
    assert_eq!(unknown, vec![other]);
}

#[tokio::test(flavor = "current_thread")]
async fn capture_requires_a_session() {
    let (context, _dir) = test_context();
    let error = records::run_capture(&context, capture_args("Tienda A"))
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::NotLoggedIn));
}

#[tokio::test(flavor = "current_thread")]
async fn capture_stores_record_owned_by_session() {
    let (context, _dir) = test_context();
    login_admin(&context).await;

    let record = records::run_capture(&context, capture_args("  Tienda A  "))
        .await
        .unwrap();

    assert!(record.id.starts_with("OLP-"));
    assert_eq!(record.client.contact_name, "Tienda A");
    assert_eq!(record.auditor_id.as_deref(), Some(DEFAULT_ADMIN_ID));
    assert_eq!(record.client_validation_status, ClientValidationStatus::Pending);

    let stored = context
        .persistence
        .get_record_by_id(&record.id)
        .await
        .unwrap();
    assert_eq!(stored, Some(record));
}

#[tokio::test(flavor = "current_thread")]
async fn status_verify_and_move_update_the_record() {
    let (context, _dir) = test_context();
    login_admin(&context).await;
    let record = records::run_capture(&context, capture_args("Tienda B"))
        .await
        .unwrap();
    let id = format!(" {} ", record.id);

    records::run_set_status(&context, &id, StatusArg::Reported)
        .await
        .unwrap();
    let reported = context
        .persistence
        .get_record_by_id(&record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reported.client_validation_status, ClientValidationStatus::Reported);

    records::run_verify(&context, &id).await.unwrap();
    records::run_move(&context, &id, -33.6, -70.7).await.unwrap();

    let updated = context
        .persistence
        .get_record_by_id(&record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.client_validation_status, ClientValidationStatus::Verified);
    let coords = updated.gps_outside.unwrap();
    assert!(coords.manually_adjusted);
    assert!((coords.lat + 33.6).abs() < f64::EPSILON);
    assert!((coords.accuracy - 12.0).abs() < f64::EPSILON);
}

#[tokio::test(flavor = "current_thread")]
async fn missing_records_are_reported() {
    let (context, _dir) = test_context();
    let error = records::run_delete(&context, "OLP-999999")
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::RecordNotFound(id) if id == "OLP-999999"));
}

#[tokio::test(flavor = "current_thread")]
async fn users_add_validates_and_remove_refuses_self() {
    let (context, _dir) = test_context();

    let error = users::run_add(&context, "Carla", "12a4", RoleArg::Auditor, None)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::Core(Error::InvalidInput(_))));

    let carla = users::run_add(&context, "Carla", "1234", RoleArg::Auditor, None)
        .await
        .unwrap();
    assert!(carla.id.starts_with("user-"));
    assert!(!carla.avatar_color.is_empty());

    session::run_login(&context, &carla.id, "1234").await.unwrap();
    let error = users::run_remove(&context, &carla.id).await.unwrap_err();
    assert!(matches!(error, CliError::Core(Error::SelfDeletion(_))));

    session::run_logout(&context).unwrap();
    users::run_remove(&context, &carla.id).await.unwrap();

    let remaining = context.persistence.get_users().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, DEFAULT_ADMIN_ID);
}

#[tokio::test(flavor = "current_thread")]
async fn wrong_pin_does_not_start_a_session() {
    let (context, _dir) = test_context();
    let error = session::run_login(&context, DEFAULT_ADMIN_ID, "9999")
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::Core(Error::InvalidCredentials(_))));
    assert!(context.sessions.load().unwrap().is_none());
}

#[tokio::test(flavor = "current_thread")]
async fn run_export_writes_csv_file() {
    let (context, dir) = test_context();
    login_admin(&context).await;
    let record = records::run_capture(&context, capture_args("Botillería, Sur"))
        .await
        .unwrap();
    let output_path = dir.path().join("export.csv");

    run_export(&context, ExportFormat::Csv, Some(&output_path))
        .await
        .unwrap();

    let exported = std::fs::read_to_string(&output_path).unwrap();
    let mut lines = exported.lines();
    assert!(lines.next().unwrap().starts_with("id,date,client"));
    let row = lines.next().unwrap();
    assert!(row.starts_with(&format!("{},", record.id)));
    assert!(row.contains("\"Botillería, Sur\""));
    assert!(row.contains(",Administrador Olpar,pending,"));
}

#[tokio::test(flavor = "current_thread")]
async fn run_export_writes_json_file() {
    let (context, dir) = test_context();
    login_admin(&context).await;
    records::run_capture(&context, capture_args("Tienda C"))
        .await
        .unwrap();
    let output_path = dir.path().join("export.json");

    run_export(&context, ExportFormat::Json, Some(&output_path))
        .await
        .unwrap();

    let exported: Vec<AuditRecord> =
        serde_json::from_str(&std::fs::read_to_string(&output_path).unwrap()).unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].client.contact_name, "Tienda C");
}

#[test]
fn run_completions_writes_bash_script_file() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("olpar.bash");

    run_completions(CompletionShell::Bash, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("_olpar()"));
    assert!(script.contains("complete -F _olpar"));
}

#[tokio::test(flavor = "current_thread")]
async fn edit_updates_client_fields_and_replaces_facade() {
    let (context, dir) = test_context();
    login_admin(&context).await;
    let record = records::run_capture(&context, capture_args("Tienda D"))
        .await
        .unwrap();
    let photo = dir.path().join("fachada.png");
    std::fs::write(&photo, [0x89, b'P', b'N', b'G']).unwrap();

    let edited = records::run_edit(
        &context,
        EditRecordArgs {
            name: Some("  Tienda D Express ".to_string()),
            phone: Some("+56 2 2345 6789".to_string()),
            facade_image: Some(photo),
            ..edit_args(&record.id)
        },
    )
    .await
    .unwrap();

    assert_eq!(edited.client.contact_name, "Tienda D Express");
    assert_eq!(edited.client.phone, "+56 2 2345 6789");
    assert_eq!(edited.client.comuna, "Maipú");
    let facade = edited.images.as_ref().and_then(|images| images.facade.clone());
    assert_eq!(facade.as_deref(), Some("data:image/png;base64,iVBORw=="));

    let stored = context
        .persistence
        .get_record_by_id(&record.id)
        .await
        .unwrap();
    assert_eq!(stored, Some(edited));
}

#[tokio::test(flavor = "current_thread")]
async fn edit_rejects_blank_name_and_unknown_images() {
    let (context, dir) = test_context();
    login_admin(&context).await;
    let record = records::run_capture(&context, capture_args("Tienda E"))
        .await
        .unwrap();

    let error = records::run_edit(
        &context,
        EditRecordArgs {
            name: Some("   ".to_string()),
            ..edit_args(&record.id)
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(error, CliError::Core(Error::InvalidInput(_))));

    let document = dir.path().join("notes.txt");
    std::fs::write(&document, "not an image").unwrap();
    let error = records::run_edit(
        &context,
        EditRecordArgs {
            interior_image: Some(document),
            ..edit_args(&record.id)
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(error, CliError::Core(Error::InvalidInput(_))));
}

#[tokio::test(flavor = "current_thread")]
async fn records_with_lowercase_ids_are_reachable() {
    let (context, _dir) = test_context();
    let imported = AuditRecord {
        id: "imported-7".to_string(),
        ..AuditRecord::new(Default::default(), None, None)
    };
    context.persistence.save_record(&imported).await.unwrap();

    records::run_verify(&context, " imported-7 ").await.unwrap();
    records::run_delete(&context, "imported-7").await.unwrap();

    assert!(context.persistence.get_records().await.unwrap().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn users_edit_updates_profile_and_session() {
    let (context, _dir) = test_context();
    let carla = users::run_add(&context, "Carla", "1234", RoleArg::Auditor, None)
        .await
        .unwrap();
    session::run_login(&context, &carla.id, "1234").await.unwrap();

    let error = users::run_edit(&context, &carla.id, None, Some("99".to_string()), None, None)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::Core(Error::InvalidInput(_))));

    let edited = users::run_edit(
        &context,
        &carla.id,
        Some("Carla Soto".to_string()),
        Some("4321".to_string()),
        Some(RoleArg::Admin),
        Some("bg-rose-600".to_string()),
    )
    .await
    .unwrap();

    assert_eq!(edited.id, carla.id);
    assert_eq!(edited.name, "Carla Soto");
    assert!(edited.is_admin());
    assert_eq!(context.sessions.load().unwrap(), Some(edited.clone()));

    let stored = context.persistence.get_users().await.unwrap();
    assert_eq!(stored, vec![edited]);
    session::run_login(&context, &carla.id, "4321").await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn run_export_into_directory_uses_suggested_name() {
    let (context, dir) = test_context();
    login_admin(&context).await;
    records::run_capture(&context, capture_args("Tienda F"))
        .await
        .unwrap();
    let export_dir = dir.path().join("exports");
    std::fs::create_dir(&export_dir).unwrap();

    run_export(&context, ExportFormat::Json, Some(&export_dir))
        .await
        .unwrap();

    let names: Vec<String> = std::fs::read_dir(&export_dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    assert!(names[0].starts_with("olpar-export-"));
    assert!(names[0].ends_with(".json"));
}

#[test]
fn run_completions_into_directory_uses_loader_file_name() {
    let dir = tempfile::tempdir().unwrap();

    run_completions(CompletionShell::Zsh, Some(dir.path())).unwrap();
    run_completions(CompletionShell::Fish, Some(dir.path())).unwrap();

    let zsh = std::fs::read_to_string(dir.path().join("_olpar")).unwrap();
    assert!(zsh.starts_with("#compdef olpar"));
    assert!(dir.path().join("olpar.fish").exists());
}

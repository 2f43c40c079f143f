use olpar_core::models::{Role, AVATAR_PALETTE};
use olpar_core::util::normalize_text_option;
use olpar_core::UserProfile;
use serde::Serialize;

use crate::cli::RoleArg;
use crate::commands::common::Context;
use crate::error::CliError;

/// PINs are never printed.
#[derive(Debug, Serialize)]
pub struct UserListItem {
    pub id: String,
    pub name: String,
    pub role: Role,
    pub avatar_color: String,
    pub current: bool,
}

pub async fn run_list(context: &Context, as_json: bool) -> Result<(), CliError> {
    let current = context.sessions.load()?.map(|profile| profile.id);
    let items = context
        .persistence
        .get_users()
        .await?
        .into_iter()
        .map(|user| UserListItem {
            current: current.as_deref() == Some(user.id.as_str()),
            id: user.id,
            name: user.name,
            role: user.role,
            avatar_color: user.avatar_color,
        })
        .collect::<Vec<_>>();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let marker = if item.current { "*" } else { " " };
            let role = if item.role == Role::Admin { "admin" } else { "auditor" };
            println!("{marker} {:<20} {:<8} {}", item.id, role, item.name);
        }
    }
    Ok(())
}

pub async fn run_add(
    context: &Context,
    name: &str,
    pin: &str,
    role: RoleArg,
    color: Option<String>,
) -> Result<UserProfile, CliError> {
    let role = role_from_arg(role);
    let color = match normalize_text_option(color) {
        Some(color) => color,
        None => {
            let count = context.persistence.get_users().await?.len();
            AVATAR_PALETTE[count % AVATAR_PALETTE.len()].to_string()
        }
    };

    let profile = UserProfile::new(name.trim(), pin.trim(), role, color);
    profile.validate()?;
    context.persistence.save_user(&profile).await?;
    println!("{}", profile.id);
    Ok(profile)
}

pub async fn run_edit(
    context: &Context,
    id: &str,
    name: Option<String>,
    pin: Option<String>,
    role: Option<RoleArg>,
    color: Option<String>,
) -> Result<UserProfile, CliError> {
    let updated = context
        .persistence
        .update_user(id.trim(), move |user| {
            if let Some(name) = name {
                user.name = name.trim().to_string();
            }
            if let Some(pin) = pin {
                user.pin = pin.trim().to_string();
            }
            if let Some(role) = role {
                user.role = role_from_arg(role);
            }
            if let Some(color) = normalize_text_option(color) {
                user.avatar_color = color;
            }
        })
        .await?;

    // The session keeps a copy of the profile.
    if context
        .sessions
        .load()?
        .is_some_and(|profile| profile.id == updated.id)
    {
        context.sessions.save(&updated)?;
    }
    println!("{}", updated.id);
    Ok(updated)
}

pub async fn run_remove(context: &Context, id: &str) -> Result<(), CliError> {
    let acting = context.sessions.load()?.map(|profile| profile.id);
    context
        .persistence
        .delete_user(id.trim(), acting.as_deref())
        .await?;
    println!("{}", id.trim());
    Ok(())
}

const fn role_from_arg(role: RoleArg) -> Role {
    match role {
        RoleArg::Auditor => Role::Auditor,
        RoleArg::Admin => Role::Admin,
    }
}

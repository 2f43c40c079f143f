use olpar_core::session::login;

use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_login(context: &Context, user_id: &str, pin: &str) -> Result<(), CliError> {
    let profile = login(
        &context.persistence,
        &context.sessions,
        user_id.trim(),
        pin.trim(),
    )
    .await?;
    println!("Logged in as {} ({})", profile.name, profile.id);
    Ok(())
}

pub fn run_logout(context: &Context) -> Result<(), CliError> {
    context.sessions.clear()?;
    println!("Logged out");
    Ok(())
}

pub fn run_whoami(context: &Context) -> Result<(), CliError> {
    match context.sessions.load()? {
        Some(profile) => println!("{} ({})", profile.name, profile.id),
        None => println!("Not logged in"),
    }
    Ok(())
}

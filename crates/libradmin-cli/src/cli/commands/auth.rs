//! Sign-in, sign-out and password recovery.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use libradmin_core::validation::ResetPasswordForm;
use libradmin_types::LoginCredentials;

use crate::cli::{App, surfaced};

pub async fn login(app: &App, username: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    let credentials = LoginCredentials {
        username: username.to_string(),
        password,
    };

    let user = app.session.signin(&credentials).await.map_err(surfaced)?;
    println!("Signed in as {} ({})", user.short_name(), user.role);
    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Contraseña: ");
    io::stderr().flush().context("flush prompt")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn logout(app: &App) {
    app.session.logout();
    println!("Signed out.");
}

pub fn whoami(app: &App) {
    let state = app.session.restore_session();
    match state.user() {
        Some(user) => println!(
            "{} {} <{}>  {}  {}",
            user.first_names, user.last_names, user.email, user.username, user.role
        ),
        None => println!("Not logged in."),
    }
}

pub async fn forgot(app: &App, email: &str) -> Result<()> {
    app.session
        .request_password_reset(email)
        .await
        .map_err(surfaced)?;
    Ok(())
}

pub async fn reset(app: &App, email: &str, password: String, confirm: String) -> Result<()> {
    let form = ResetPasswordForm {
        password,
        confirm_password: confirm,
    };
    app.session
        .reset_password(email, &form)
        .await
        .map_err(surfaced)?;
    Ok(())
}

//! MTProto sign-in: connect with a per-admin session file, running the
//! interactive code (+ optional two-step password) flow when needed.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::Session;
use tracing::info;

use telsuit_core::{config::AdminCredentials, Error, Result};

/// Session file for one admin account, next to the config file.
pub fn session_path(phone: &str) -> PathBuf {
    PathBuf::from(format!("telsuit-{}.session", phone.trim_start_matches('+')))
}

/// Connect with the stored session for `phone`, signing in interactively if
/// the session is missing or expired. The session file is saved back after
/// a successful connect.
pub async fn connect(phone: &str, creds: &AdminCredentials) -> Result<Client> {
    let path = session_path(phone);
    let session = Session::load_file_or_create(&path)
        .map_err(|e| Error::External(format!("session file {}: {e}", path.display())))?;

    let client = Client::connect(Config {
        session,
        api_id: creds.api_id,
        api_hash: creds.api_hash.clone(),
        params: InitParams::default(),
    })
    .await
    .map_err(|e| Error::External(format!("connect failed: {e}")))?;

    let authorized = client
        .is_authorized()
        .await
        .map_err(|e| Error::External(format!("authorization check failed: {e}")))?;
    if !authorized {
        sign_in(&client, phone).await?;
    }

    save_session(&client, &path)?;
    info!(phone, "client connected");
    Ok(client)
}

async fn sign_in(client: &Client, phone: &str) -> Result<()> {
    let token = client
        .request_login_code(phone)
        .await
        .map_err(|e| Error::External(format!("login code request failed: {e}")))?;

    let code = prompt("Enter the login code you received: ")?;
    match client.sign_in(&token, &code).await {
        Ok(_) => Ok(()),
        Err(SignInError::PasswordRequired(password_token)) => {
            let password = prompt("Two-step verification password: ")?;
            client
                .check_password(password_token, password)
                .await
                .map_err(|e| Error::External(format!("password check failed: {e}")))?;
            Ok(())
        }
        Err(e) => Err(Error::External(format!("sign in failed: {e}"))),
    }
}

fn save_session(client: &Client, path: &Path) -> Result<()> {
    client
        .session()
        .save_to_file(path)
        .map_err(|e| Error::External(format!("saving session failed: {e}")))?;
    Ok(())
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

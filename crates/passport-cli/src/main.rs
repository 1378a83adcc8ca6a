//! passport - command-line client for GWIN accounts.
//!
//! Signs in against the account service and keeps the session in a JSON jar
//! under the cache directory, so later invocations stay signed in until the
//! token expires.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::{Parser, Subcommand};
use passport_core::{
    FileStore, HttpTransport, Navigator, PassportConfig, PinCodePurpose, SessionManager,
    SignInRequest, SignUpRequest,
};
use serde::Serialize;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Log file name prefix in the cache directory
const LOG_FILE_PREFIX: &str = "passport.log";

#[derive(Parser)]
#[command(name = "passport", version, about = "GWIN account client")]
struct Cli {
    /// Also write logs to a daily rolling file in the cache directory
    #[arg(long, global = true)]
    log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the local session
    Status,
    /// Register a mobile number (prompts for the password)
    SignUp {
        mobile: String,
        /// Code received with `send-pin --purpose register`
        #[arg(long)]
        pin_code: String,
    },
    /// Sign in with a password, or with a one-time code via --pin-code
    SignIn {
        mobile: String,
        #[arg(long)]
        pin_code: Option<String>,
        /// Answer to the challenge from `captcha`
        #[arg(long, requires = "captcha_id")]
        captcha: Option<String>,
        #[arg(long)]
        captcha_id: Option<String>,
    },
    /// Drop the local session
    SignOut {
        /// Where to go afterwards instead of the login page
        #[arg(long)]
        redirect: Option<String>,
    },
    /// Fetch and cache the profile of the signed-in user
    Profile,
    /// Request a one-time code by SMS
    SendPin {
        phone: String,
        /// register, sign-in, reset-password or rebind-phone
        #[arg(long, default_value = "sign-in")]
        purpose: PinCodePurpose,
    },
    /// Fetch a graphical challenge
    Captcha,
    /// Verify a phone number and print the verification token
    VerifyPhone { mobile: String, pin_code: String },
    /// Set a new password (prompts for it)
    ChangePassword {
        /// Token printed by `verify-phone`
        pin_code_token: String,
    },
    /// Move the account to a new mobile number
    ChangePhone {
        mobile: String,
        /// Code sent to the new number
        pin_code: String,
        /// Token from verifying the old number
        pin_code_token: String,
    },
    /// Close the account on the server and sign out
    CloseAccount { mobile: String, pin_code: String },
}

/// Prints navigation targets; a terminal has nowhere to redirect to.
struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn navigate(&self, url: &str) {
        println!("Continue at: {}", url);
    }
}

/// Initialize the tracing subscriber for logging
fn init_tracing(log_dir: Option<PathBuf>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    Ok(guard)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn format_expiry(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(at) if millis > 0 => at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => "unknown".to_string(),
    }
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

async fn run(session: &SessionManager, command: Command) -> Result<()> {
    match command {
        Command::Status => {
            let credential = session.current_credential();
            if credential.access_token.is_empty() {
                println!("Not signed in");
                return Ok(());
            }
            let state = if session.is_signed_in() { "active" } else { "expired" };
            println!("Session:  {}", state);
            println!("User:     {}", credential.user_id);
            if !credential.subject_id.is_empty() {
                println!("Tenant:   {} ({})", credential.subject_name, credential.subject_id);
            }
            println!("Expires:  {}", format_expiry(credential.expires_time));
            let profile = session.current_profile();
            if !profile.name.is_empty() {
                println!("Name:     {}", profile.name);
            }
        }
        Command::SignUp { mobile, pin_code } => {
            let password = prompt_password("New password: ")?;
            let response = session
                .sign_up(SignUpRequest::new(mobile, password, pin_code))
                .await?;
            println!("Registered and signed in as {}", response.body.user_id);
        }
        Command::SignIn {
            mobile,
            pin_code,
            captcha,
            captcha_id,
        } => {
            let mut request = match pin_code {
                Some(code) => SignInRequest::with_pin_code(mobile, code),
                None => SignInRequest::with_password(mobile, prompt_password("Password: ")?),
            };
            if let (Some(code), Some(id)) = (captcha, captcha_id) {
                request = request.captcha(code, id);
            }
            let response = session.sign_in(request).await?;
            println!("Signed in as {}", response.body.user_id);
        }
        Command::SignOut { redirect } => {
            session.sign_out(redirect.as_deref(), None);
        }
        Command::Profile => {
            let response = session.fetch_profile().await?;
            print_json(&response.body)?;
        }
        Command::SendPin { phone, purpose } => {
            session.send_pin_code(&phone, purpose).await?;
            println!("Code sent to {}", phone.trim());
        }
        Command::Captcha => {
            let response = session.captcha().await?;
            print_json(&response.body)?;
        }
        Command::VerifyPhone { mobile, pin_code } => {
            let response = session.verify_phone(&mobile, &pin_code).await?;
            match response.pin_code_token() {
                Some(token) => println!("{}", token),
                None => print_json(&response.body)?,
            }
        }
        Command::ChangePassword { pin_code_token } => {
            let password = prompt_password("New password: ")?;
            session.change_password(&password, &pin_code_token).await?;
            println!("Password changed");
        }
        Command::ChangePhone {
            mobile,
            pin_code,
            pin_code_token,
        } => {
            let user_id = session.current_credential().user_id;
            anyhow::ensure!(!user_id.is_empty(), "Sign in before changing the phone number");
            session
                .change_phone(&mobile, &pin_code, &pin_code_token, &user_id)
                .await?;
            println!("Phone number changed to {}", mobile);
        }
        Command::CloseAccount { mobile, pin_code } => {
            let account_id = session.current_credential().user_id;
            anyhow::ensure!(!account_id.is_empty(), "Sign in before closing the account");
            session.close_account(&account_id, &pin_code, &mobile).await?;
            println!("Account closed");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = PassportConfig::load().context("Failed to load configuration")?;

    let log_dir = if cli.log_file {
        Some(config.cache_dir()?)
    } else {
        None
    };
    let _guard = init_tracing(log_dir)?;
    info!(base_url = %config.base_url, "passport starting");

    let transport = Arc::new(HttpTransport::new(&config)?);
    let store = Arc::new(FileStore::new(config.session_file()?));
    let session = SessionManager::builder(transport, store)
        .navigator(Arc::new(TerminalNavigator))
        .config(&config)
        .build();

    run(&session, cli.command).await
}

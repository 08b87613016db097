// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use mindguard::auth::AuthContext;
use mindguard::cli::{get_canonical_command, parse_command, show_help, ChatInput};
use mindguard::companion::{Classifier, Conversation, Delivered};
use mindguard::config::{self, Config};
use mindguard::contacts::EmergencyContacts;
use mindguard::error::{format_error, format_simple_error, AuthError, ContactError, SUPPORT_FOOTER};
use mindguard::storage::{FileStorage, Storage};
use mindguard::types::{NewUser, ProfileUpdate};
use mindguard::wellness::{cycles_or_default, run_breathing, BreathingOutcome, DEFAULT_CYCLES};
use tokio_util::sync::CancellationToken;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Associated data bound into encrypted exports.
const EXPORT_AAD: &[u8] = b"mindguard-export";


/// Exit codes following sysexits.h conventions
mod exit_codes {
    /// General error - unspecified error
    pub const ERROR: i32 = 1;
    /// I/O error - storage or file operation failed
    pub const IO_ERR: i32 = 74;
}

use exit_codes::*;

/// Spinner helpers for consistent progress indicators
mod spinner {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    /// Create a spinner with consistent styling
    pub fn create(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner()
            .tick_chars("\u{28FB}\u{28F9}\u{28FC}\u{28F8}\u{28FE}\u{28F6}\u{28F7}\u{28E7}\u{28CF}\u{28DF} ")
            .template("{spinner:.cyan} {msg}")
        {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    }
}

/// MindGuard - a private companion for student mental health.
#[derive(Parser)]
#[command(name = "mindguard")]
#[command(version = VERSION)]
#[command(about = "A private, on-device companion for student mental health.")]
#[command(long_about = "MindGuard - a private companion for student mental health\n\n\
    Create an account:   mindguard signup\n\
    Stay anonymous:      mindguard guest\n\
    Talk:                mindguard chat\n\
    Breathe:             mindguard breathe\n\
    Trusted people:      mindguard contacts add --name Mama --phone 0917...\n\n\
    Everything stays on this device. If you are in immediate danger,\n\
    please call local emergency services (911).")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local storage directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Session storage directory for the key cache (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    session_dir: Option<PathBuf>,

    /// Quiet mode: only errors are logged
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Verbose mode: debug logging on stderr
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account on this device
    Signup {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        fullname: Option<String>,
        #[arg(long)]
        studentid: Option<String>,
        #[arg(long)]
        program: Option<String>,
    },
    /// Log in to an existing account
    Login {
        #[arg(long)]
        email: Option<String>,
    },
    /// Log out and forget the cached key
    Logout,
    /// Continue without an account
    Guest,
    /// Show who is signed in
    Whoami,
    /// Talk with MindGuard
    #[command(alias = "c")]
    Chat,
    /// Manage emergency contacts
    Contacts {
        #[command(subcommand)]
        command: Option<ContactsCommands>,
    },
    /// View or manage your profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommands>,
    },
    /// Guided 4-7-8 breathing
    Breathe {
        /// Number of 19-second cycles
        #[arg(short, long, default_value_t = DEFAULT_CYCLES, value_parser = clap::value_parser!(u32).range(1..))]
        cycles: u32,
    },
    /// View or change configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum ContactsCommands {
    /// List saved contacts
    List,
    /// Add a contact
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        phone: String,
    },
    /// Remove a contact by id
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Show your profile
    Show,
    /// Edit profile fields (prompts when no flags are given)
    Edit {
        #[arg(long)]
        fullname: Option<String>,
        #[arg(long)]
        studentid: Option<String>,
        #[arg(long)]
        program: Option<String>,
    },
    /// Export your data as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Encrypt with your account key
        #[arg(long)]
        encrypt: bool,
    },
    /// Permanently delete your account
    Delete,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set companion reply delays in milliseconds
    SetDelays {
        #[arg(long)]
        greeting: Option<u64>,
        #[arg(long)]
        min: Option<u64>,
        #[arg(long)]
        max: Option<u64>,
    },
    /// Restore the default configuration
    Reset,
}

/// Everything a command needs: resolved paths, config and both stores.
struct App {
    base: PathBuf,
    config: Config,
    local: Arc<dyn Storage>,
    auth: AuthContext,
}

impl App {
    fn open(cli: &Cli) -> Result<Self> {
        let base = config::base_dir()?;
        let config = config::load_config(&base)?;

        let data_dir = cli
            .data_dir
            .clone()
            .unwrap_or_else(|| config.data_dir(&base));
        let session_dir = cli.session_dir.clone().unwrap_or_else(|| config.session_dir());

        let local: Arc<dyn Storage> = Arc::new(
            FileStorage::open(&data_dir)
                .with_context(|| format!("Failed to open storage at {}", data_dir.display()))?,
        );
        let session_scope: Arc<dyn Storage> = Arc::new(
            FileStorage::open(&session_dir)
                .with_context(|| format!("Failed to open session storage at {}", session_dir.display()))?,
        );

        let auth = AuthContext::bootstrap(Arc::clone(&local), session_scope);
        Ok(Self {
            base,
            config,
            local,
            auth,
        })
    }

    fn contacts(&self) -> EmergencyContacts {
        EmergencyContacts::load(Arc::clone(&self.local))
    }
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::ERROR
    } else {
        tracing::Level::WARN
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(cli) {
        eprintln!();
        if let Some(auth_err) = e.downcast_ref::<AuthError>() {
            eprintln!("{}", auth_err.explain());
        } else if let Some(ContactError::Storage(storage_err)) = e.downcast_ref::<ContactError>() {
            eprintln!("{}", format_error(&storage_err.to_string(), &[], &["Check the data directory: mindguard config show"]));
            std::process::exit(IO_ERR);
        } else {
            let causes: Vec<String> = e.chain().skip(1).map(|c| c.to_string()).collect();
            if causes.is_empty() {
                eprintln!("{}", format_simple_error(&e.to_string()));
            } else {
                let causes: Vec<&str> = causes.iter().map(String::as_str).collect();
                eprintln!("{}", format_error(&e.to_string(), &causes, &[]));
            }
        }
        std::process::exit(ERROR);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut app = App::open(&cli)?;

    match cli.command {
        Commands::Signup {
            email,
            fullname,
            studentid,
            program,
        } => handle_signup(&mut app, email, fullname, studentid, program),
        Commands::Login { email } => handle_login(&mut app, email),
        Commands::Logout => {
            app.auth.logout()?;
            println!("{} Logged out", "[✓]".green());
            Ok(())
        }
        Commands::Guest => {
            app.auth.start_anonymous()?;
            println!("{} Continuing as a guest. Nothing you say is linked to you.", "[✓]".green());
            println!("  Start talking: {}", "mindguard chat".cyan());
            Ok(())
        }
        Commands::Whoami => {
            handle_whoami(&app);
            Ok(())
        }
        Commands::Chat => handle_chat(&mut app),
        Commands::Contacts { command } => handle_contacts(&app, command.unwrap_or(ContactsCommands::List)),
        Commands::Profile { command } => handle_profile(&mut app, command.unwrap_or(ProfileCommands::Show)),
        Commands::Breathe { cycles } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
            runtime.block_on(breathe(cycles));
            Ok(())
        }
        Commands::Config { command } => handle_config(&mut app, command.unwrap_or(ConfigCommands::Show)),
    }
}

// ============================================================================
// PROMPTS
// ============================================================================

fn prompt_text(label: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(value) => Ok(value),
        None => inquire::Text::new(label)
            .prompt()
            .with_context(|| format!("No input for '{}'", label.trim_end_matches(':'))),
    }
}

fn prompt_password(label: &str) -> Result<String> {
    inquire::Password::new(label)
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("No password entered")
}

// ============================================================================
// ACCOUNT
// ============================================================================

fn handle_signup(
    app: &mut App,
    email: Option<String>,
    fullname: Option<String>,
    studentid: Option<String>,
    program: Option<String>,
) -> Result<()> {
    let new_user = NewUser {
        email: prompt_text("Email:", email)?,
        fullname: prompt_text("Full name:", fullname)?,
        studentid: prompt_text("Student ID (optional):", studentid)?,
        program: prompt_text("Program (optional):", program)?,
    };

    let password = inquire::Password::new("Password:")
        .with_display_mode(inquire::PasswordDisplayMode::Masked)
        .with_custom_confirmation_message("Confirm password:")
        .with_custom_confirmation_error_message("The passwords don't match.")
        .prompt()
        .context("No password entered")?;

    let user = app.auth.signup(new_user, &password)?;
    println!("{} Welcome, {}. Your account lives only on this device.", "[✓]".green(), user.fullname.bold());
    Ok(())
}

fn handle_login(app: &mut App, email: Option<String>) -> Result<()> {
    let email = prompt_text("Email:", email)?;
    let password = prompt_password("Password:")?;
    let user = app.auth.login(&email, &password)?;
    println!("{} Welcome back, {}.", "[✓]".green(), user.fullname.bold());
    Ok(())
}

fn handle_whoami(app: &App) {
    match app.auth.user() {
        Some(_) if app.auth.is_anonymous() => println!("Guest session (anonymous)"),
        Some(user) => {
            println!("{} <{}>", user.fullname.bold(), user.email);
            if app.auth.encryption_key().is_none() {
                println!("{}", "  Key not cached in this session; log in again to encrypt exports.".dimmed());
            }
        }
        None => {
            println!("Not signed in.");
            println!("  Log in:        {}", "mindguard login".cyan());
            println!("  Stay anonymous: {}", "mindguard guest".cyan());
        }
    }
}

/// Make sure someone is signed in before chatting, offering choices on a terminal.
fn ensure_session(app: &mut App) -> Result<()> {
    if app.auth.is_authenticated() {
        return Ok(());
    }

    if !std::io::stdin().is_terminal() {
        return Err(AuthError::NotSignedIn.into());
    }

    const LOGIN: &str = "Log in";
    const SIGNUP: &str = "Create an account";
    const GUEST: &str = "Continue as a guest";

    let choice = inquire::Select::new("How would you like to continue?", vec![LOGIN, SIGNUP, GUEST])
        .prompt()
        .context("No option selected")?;

    match choice {
        LOGIN => handle_login(app, None),
        SIGNUP => handle_signup(app, None, None, None, None),
        _ => {
            app.auth.start_anonymous()?;
            Ok(())
        }
    }
}

// ============================================================================
// CHAT
// ============================================================================

fn handle_chat(app: &mut App) -> Result<()> {
    ensure_session(app)?;

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let _enter = runtime.enter();

    let conversation = Conversation::new(Arc::new(Classifier::new()), app.config.reply_delays());
    let mut input = ChatInput::open(Some(config::history_path(&app.base)));
    let show_typing = app.config.typing_indicator;

    let name = app
        .auth
        .user()
        .map(|u| u.fullname.clone())
        .unwrap_or_default();
    println!();
    println!("{}", "=== MindGuard ===".bright_cyan().bold());
    println!("{}", format!("Signed in as {}. Type /help for commands.", name).dimmed());
    println!();

    if let Some(handle) = conversation.greet() {
        if !wait_for_reply(&runtime, &conversation, handle, show_typing, app)? {
            return end_chat(&conversation);
        }
    }

    while let Some(line) = input.read_line(&format!("{} ", "you>".green().bold()))? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some((command, args)) = parse_command(line) {
            match get_canonical_command(command) {
                Some("/help") => show_help(),
                Some("/breathe") => {
                    runtime.block_on(breathe(cycles_or_default(args.first().copied())));
                }
                Some("/contacts") => print_contacts(&app.contacts()),
                Some("/clear") => {
                    conversation.clear();
                    print!("\x1B[2J\x1B[1;1H");
                    println!("{}", "Conversation cleared.".dimmed());
                }
                Some("/exit") => break,
                _ => {}
            }
            continue;
        }

        if line.starts_with('/') {
            println!("{} Unknown command {}. Type /help.", "[!]".yellow(), line.red());
            continue;
        }

        if let Some(handle) = conversation.send(line) {
            if !wait_for_reply(&runtime, &conversation, handle, show_typing, app)? {
                break;
            }
        }
    }

    end_chat(&conversation)
}

fn end_chat(conversation: &Conversation) -> Result<()> {
    conversation.close();
    println!();
    println!("{}", "Take care of yourself. MindGuard is here whenever you need it.".cyan());
    Ok(())
}

fn wait_for_reply(
    runtime: &tokio::runtime::Runtime,
    conversation: &Conversation,
    handle: tokio::task::JoinHandle<Option<Delivered>>,
    show_typing: bool,
    app: &App,
) -> Result<bool> {
    let spinner = (show_typing && conversation.is_composing()).then(|| spinner::create("MindGuard is typing..."));
    // Ctrl+C while waiting ends the chat. Once a tokio signal listener exists
    // SIGINT no longer kills the process, so every wait has to listen.
    let joined = runtime.block_on(async {
        tokio::select! {
            joined = handle => Some(joined),
            _ = tokio::signal::ctrl_c() => None,
        }
    });
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let Some(joined) = joined else {
        tracing::debug!("CHAT_INTERRUPTED");
        return Ok(false);
    };
    let Some(delivered) = joined.context("Reply task failed")? else {
        return Ok(true);
    };

    println!("{} {}", "MindGuard:".cyan().bold(), delivered.message.text);
    println!();

    if delivered.category.map(|c| c.is_crisis()).unwrap_or(false) {
        print_crisis_contacts(&app.contacts());
    }
    Ok(true)
}

fn print_crisis_contacts(contacts: &EmergencyContacts) {
    println!("{}", "You don't have to go through this alone.".yellow().bold());
    if contacts.is_empty() {
        println!("  Emergency services: {}", "911".bold());
        println!(
            "  Save someone you trust: {}",
            "mindguard contacts add --name <name> --phone <number>".cyan()
        );
    } else {
        for contact in contacts.list() {
            println!("  {} {}", contact.name.bold(), contact.phone);
        }
        println!("  Emergency services: {}", "911".bold());
    }
    println!();
}

// ============================================================================
// WELLNESS
// ============================================================================

/// Ctrl+C stops the exercise instead of the process. The tokio handler stays
/// installed afterwards; chat reply waits listen for it too.
async fn breathe(cycles: u32) {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    println!();
    println!("{}", "4-7-8 breathing. Press Ctrl+C to stop.".bright_cyan());
    let outcome = run_breathing(cycles, cancel, |step| {
        print!("\r  {:<16}", step.label());
        let _ = std::io::Write::flush(&mut std::io::stdout());
    })
    .await;
    watcher.abort();

    println!();
    match outcome {
        BreathingOutcome::Completed { .. } => println!("{}", "Well done. Notice how you feel now.".green()),
        BreathingOutcome::Cancelled { .. } => println!("{}", "Stopped. You can come back any time.".dimmed()),
    }
    println!();
}

// ============================================================================
// CONTACTS
// ============================================================================

fn print_contacts(contacts: &EmergencyContacts) {
    println!();
    if contacts.is_empty() {
        println!("No emergency contacts yet.");
        println!("  Add one: {}", "mindguard contacts add --name <name> --phone <number>".cyan());
    } else {
        println!("{}", "Emergency contacts".bold());
        for contact in contacts.list() {
            println!("  {:<20} {:<18} {}", contact.name, contact.phone, contact.id.dimmed());
        }
    }
    println!();
}

fn handle_contacts(app: &App, command: ContactsCommands) -> Result<()> {
    let mut contacts = app.contacts();
    match command {
        ContactsCommands::List => print_contacts(&contacts),
        ContactsCommands::Add { name, phone } => {
            let contact = contacts.add(&name, &phone)?;
            println!("{} Saved {} ({})", "[✓]".green(), contact.name.bold(), contact.phone);
        }
        ContactsCommands::Remove { id } => {
            if contacts.remove(&id)? {
                println!("{} Contact removed", "[✓]".green());
            } else {
                bail!("No contact with id '{}'", id);
            }
        }
    }
    Ok(())
}

// ============================================================================
// PROFILE
// ============================================================================

fn handle_profile(app: &mut App, command: ProfileCommands) -> Result<()> {
    match command {
        ProfileCommands::Show => {
            let user = app.auth.user().ok_or(AuthError::NotSignedIn)?;
            println!();
            println!("{}", "=== Profile ===".bright_cyan().bold());
            println!("  Name:       {}", user.fullname);
            if !app.auth.is_anonymous() {
                println!("  Email:      {}", user.email);
                println!("  Student ID: {}", display_or_unset(&user.studentid));
                println!("  Program:    {}", display_or_unset(&user.program));
                println!("  Joined:     {}", user.created_at.format("%Y-%m-%d"));
            }
            println!("  Contacts:   {}", app.contacts().len());
            println!();
        }
        ProfileCommands::Edit {
            fullname,
            studentid,
            program,
        } => {
            let mut update = ProfileUpdate {
                fullname,
                studentid,
                program,
            };
            if update.is_empty() {
                let current = app.auth.user().ok_or(AuthError::NotSignedIn)?.clone();
                update = ProfileUpdate {
                    fullname: Some(prompt_with_default("Full name:", &current.fullname)?),
                    studentid: Some(prompt_with_default("Student ID:", &current.studentid)?),
                    program: Some(prompt_with_default("Program:", &current.program)?),
                };
            }
            app.auth.update_profile(update)?;
            println!("{} Profile updated", "[✓]".green());
        }
        ProfileCommands::Export { output, encrypt } => handle_export(app, output, encrypt)?,
        ProfileCommands::Delete => {
            let user = app.auth.user().ok_or(AuthError::NotSignedIn)?;
            if app.auth.is_anonymous() {
                return Err(AuthError::NotSignedIn.into());
            }
            println!("{}", "This deletes your account from this device. It cannot be undone.".red().bold());
            let confirmed = inquire::Confirm::new(&format!("Delete the account for {}?", user.email))
                .with_default(false)
                .prompt()
                .context("No answer given")?;
            if !confirmed {
                println!("Nothing was deleted.");
                return Ok(());
            }
            let password = prompt_password("Password:")?;
            app.auth.delete_account(&password)?;
            println!("{} Account deleted", "[✓]".green());
        }
    }
    Ok(())
}

fn prompt_with_default(label: &str, current: &str) -> Result<String> {
    inquire::Text::new(label)
        .with_initial_value(current)
        .prompt()
        .with_context(|| format!("No input for '{}'", label.trim_end_matches(':')))
}

fn display_or_unset(value: &str) -> String {
    if value.is_empty() {
        "(not set)".dimmed().to_string()
    } else {
        value.to_string()
    }
}

fn handle_export(app: &App, output: Option<PathBuf>, encrypt: bool) -> Result<()> {
    let contacts = app.contacts();
    let export = app.auth.export_data(contacts.list())?;
    let json = serde_json::to_string_pretty(&export)?;

    let content = if encrypt {
        let key = app.auth.encryption_key().with_context(|| {
            format!(
                "Your key is not available in this session. Log in again to encrypt exports.\n\n{}",
                SUPPORT_FOOTER
            )
        })?;
        let sealed = key.seal(json.as_bytes(), EXPORT_AAD)?;
        serde_json::to_string_pretty(&sealed)?
    } else {
        json
    };

    match output {
        Some(path) => {
            write_export(&path, &content)?;
            println!("{} Exported to {}", "[✓]".green(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn write_export(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

// ============================================================================
// CONFIG
// ============================================================================

fn handle_config(app: &mut App, command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = &app.config;
            println!();
            println!("{}", "=== MindGuard Configuration ===".bright_cyan().bold());
            println!();
            println!("  Data dir:        {}", config.data_dir(&app.base).display());
            println!("  Session dir:     {}", config.session_dir().display());
            println!("  Greeting delay:  {} ms", config.greeting_delay_ms);
            println!(
                "  Reply delay:     {}-{} ms",
                config.reply_delay_min_ms, config.reply_delay_max_ms
            );
            println!("  Typing spinner:  {}", config.typing_indicator);
            println!();
            println!("Config file: {}", config::config_path(&app.base).display());
            println!();
        }
        ConfigCommands::SetDelays { greeting, min, max } => {
            let greeting = greeting.unwrap_or(app.config.greeting_delay_ms);
            let min = min.unwrap_or(app.config.reply_delay_min_ms);
            let max = max.unwrap_or(app.config.reply_delay_max_ms);
            app.config.set_delays(greeting, min, max)?;
            config::save_config(&app.base, &app.config)?;
            println!(
                "{} Delays set: greeting {} ms, replies {}-{} ms",
                "[✓]".green(),
                greeting,
                min,
                max
            );
        }
        ConfigCommands::Reset => {
            app.config = Config::default();
            config::save_config(&app.base, &app.config)?;
            println!("{} Configuration reset to defaults", "[✓]".green());
        }
    }
    Ok(())
}

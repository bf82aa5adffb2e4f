//! CLI module for the atlas command-line interface.
//!
//! Every command runs against a [`SessionStore`] restored from the local data
//! directory:
//! - `login` / `register` / `logout` / `whoami` - session lifecycle
//! - `favorites list|add|remove|refresh` - the synchronized favorites list
//! - `countries list|show` - browse the public country dataset
//! - `config check` - validate the configuration file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::Config;
use crate::countries::{Country, CountryQuery, Region, SortKey};
use crate::favorites::CountryCode;
use crate::remote::RegistrationRequest;
use crate::session::Session;
use crate::AppState;

/// CLI arguments structure
#[derive(Parser, Debug)]
#[command(name = "atlas")]
#[command(author, version, about = "Explore countries and keep a synced favorites list", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "atlas.toml")]
    pub config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// Backend URL (overrides api.base_url)
    #[arg(long, env = "ATLAS_API_URL")]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with credentials or an existing token
    Login {
        /// Account email
        #[arg(long, conflicts_with = "token", required_unless_present = "token")]
        email: Option<String>,
        /// Account password (can also be set via ATLAS_PASSWORD)
        #[arg(long, env = "ATLAS_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Use this bearer token instead of credentials
        #[arg(long)]
        token: Option<String>,
    },

    /// Create a new account
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "ATLAS_PASSWORD", hide_env_values = true)]
        password: String,
        /// Defaults to --password
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Forget the current session
    Logout,

    /// Show the current session
    Whoami,

    /// Favorites management commands
    #[command(subcommand)]
    Favorites(FavoritesCommands),

    /// Country dataset commands
    #[command(subcommand)]
    Countries(CountriesCommands),

    /// Configuration management commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Favorites subcommands
#[derive(Subcommand, Debug)]
pub enum FavoritesCommands {
    /// List favorite countries
    List {
        /// Fetch country details for each favorite
        #[arg(long)]
        details: bool,
    },
    /// Add a country by its three-letter code
    Add { code: String },
    /// Remove a country by its three-letter code
    Remove { code: String },
    /// Re-fetch favorites from the server
    Refresh,
}

/// Countries subcommands
#[derive(Subcommand, Debug)]
pub enum CountriesCommands {
    /// List countries
    List {
        /// Filter by (part of) the country name
        #[arg(short, long)]
        search: Option<String>,
        /// Filter by region
        #[arg(short, long, value_enum)]
        region: Option<Region>,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortKey::Name)]
        sort: SortKey,
    },
    /// Show details for one country
    Show { code: String },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate configuration file
    Check,
}

impl Commands {
    /// Whether the restored session should be refreshed from the remote
    /// store before the command runs. Login refreshes on its own.
    fn needs_fresh_favorites(&self) -> bool {
        !matches!(
            self,
            Commands::Login { .. }
                | Commands::Register { .. }
                | Commands::Logout
                | Commands::Config(_)
        )
    }
}

/// Run a CLI command
pub async fn run_command(cli: &Cli, config: Config) -> Result<()> {
    if let Commands::Config(ConfigCommands::Check) = &cli.command {
        return cmd_config_check(cli).await;
    }

    let state = AppState::new(config)?;
    if cli.command.needs_fresh_favorites() {
        state.store.initialize().await;
    } else {
        state.store.restore();
    }

    match &cli.command {
        Commands::Login {
            email,
            password,
            token,
        } => cmd_login(&state, email.as_deref(), password.as_deref(), token.as_deref()).await,
        Commands::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            let request = RegistrationRequest {
                name: name.clone(),
                email: email.clone(),
                password: password.clone(),
                confirm_password: confirm_password.clone().unwrap_or_else(|| password.clone()),
            };
            cmd_register(&state, &request).await
        }
        Commands::Logout => cmd_logout(&state),
        Commands::Whoami => cmd_whoami(&state),
        Commands::Favorites(FavoritesCommands::List { details }) => {
            cmd_favorites_list(&state, *details).await
        }
        Commands::Favorites(FavoritesCommands::Add { code }) => {
            cmd_favorites_change(&state, code, true).await
        }
        Commands::Favorites(FavoritesCommands::Remove { code }) => {
            cmd_favorites_change(&state, code, false).await
        }
        Commands::Favorites(FavoritesCommands::Refresh) => cmd_favorites_refresh(&state).await,
        Commands::Countries(CountriesCommands::List {
            search,
            region,
            sort,
        }) => {
            let query = CountryQuery {
                search: search.clone(),
                region: *region,
                sort: *sort,
            };
            cmd_countries_list(&state, &query).await
        }
        Commands::Countries(CountriesCommands::Show { code }) => {
            cmd_countries_show(&state, code).await
        }
        Commands::Config(ConfigCommands::Check) => Ok(()),
    }
}

fn require_session(state: &AppState) -> Result<std::sync::Arc<Session>> {
    state
        .store
        .current_session()
        .context("Not logged in. Use 'atlas login' first.")
}

fn parse_code(raw: &str) -> Result<CountryCode> {
    CountryCode::parse(raw).with_context(|| format!("Invalid country code: {}", raw))
}

async fn cmd_login(
    state: &AppState,
    email: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
) -> Result<()> {
    let token = match (token, email) {
        (Some(token), _) => token.to_string(),
        (None, Some(email)) => {
            let password = password
                .context("Password required. Use --password or set ATLAS_PASSWORD.")?;
            state
                .auth
                .login(email, password)
                .await
                .context("Login failed. Please check your credentials and try again.")?
        }
        (None, None) => anyhow::bail!("Provide --email or --token"),
    };

    let session = state.store.login(&token).await?;

    println!();
    println!("[OK] Logged in as {} ({})", display_name(&session), session.role);
    println!("     {} favorite(s) on record", session.favorites.len());
    println!();
    Ok(())
}

async fn cmd_register(state: &AppState, request: &RegistrationRequest) -> Result<()> {
    state
        .auth
        .register(request)
        .await
        .context("Registration failed")?;

    println!();
    println!("[OK] Registration successful!");
    println!("     Log in with: atlas login --email {}", request.email);
    println!();
    Ok(())
}

fn cmd_logout(state: &AppState) -> Result<()> {
    let was_logged_in = state.store.is_authenticated();
    state.store.logout();
    if was_logged_in {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn cmd_whoami(state: &AppState) -> Result<()> {
    let Some(session) = state.store.current_session() else {
        println!("Not logged in.");
        return Ok(());
    };

    println!();
    println!("User ID:    {}", session.user_id);
    println!("Name:       {}", display_name(&session));
    println!("Role:       {}", session.role);
    if let Some(expires_at) = session.expires_at() {
        println!("Token exp:  {} (claimed)", expires_at.to_rfc3339());
    }
    println!("Favorites:  {}", session.favorites.len());
    println!();
    Ok(())
}

async fn cmd_favorites_list(state: &AppState, details: bool) -> Result<()> {
    let session = require_session(state)?;

    if session.favorites.is_empty() {
        println!("No favorite countries yet. Add one with 'atlas favorites add <CODE>'.");
        return Ok(());
    }

    if !details {
        for code in &session.favorites {
            println!("{}", code);
        }
        return Ok(());
    }

    let countries = state
        .countries
        .by_codes(session.favorites.as_slice())
        .await
        .context("Failed to load favorite countries")?;

    print_country_table(&countries, |_| true);
    Ok(())
}

async fn cmd_favorites_change(state: &AppState, raw_code: &str, add: bool) -> Result<()> {
    require_session(state)?;
    let code = parse_code(raw_code)?;

    let accepted = if add {
        state.store.add_favorite(&code).await
    } else {
        state.store.remove_favorite(&code).await
    };

    if !accepted {
        anyhow::bail!(
            "Failed to {} {}. The server rejected the change or could not be reached.",
            if add { "add" } else { "remove" },
            code
        );
    }

    let count = state
        .store
        .current_session()
        .map(|s| s.favorites.len())
        .unwrap_or(0);
    println!(
        "[OK] {} {} favorites ({} total)",
        if add { "Added" } else { "Removed" },
        if add {
            format!("{} to", code)
        } else {
            format!("{} from", code)
        },
        count
    );
    Ok(())
}

async fn cmd_favorites_refresh(state: &AppState) -> Result<()> {
    require_session(state)?;

    if state.store.refresh_from_remote().await {
        let count = state
            .store
            .current_session()
            .map(|s| s.favorites.len())
            .unwrap_or(0);
        println!("[OK] Favorites refreshed ({} total)", count);
    } else {
        println!("[!!] Could not refresh favorites; showing the cached list.");
    }
    Ok(())
}

async fn cmd_countries_list(state: &AppState, query: &CountryQuery) -> Result<()> {
    // Narrow server-side first, then apply the full query locally
    let countries = match (&query.search, query.region) {
        (Some(search), _) if !search.trim().is_empty() => state.countries.by_name(search).await,
        (_, Some(region)) => state.countries.by_region(region).await,
        _ => state.countries.all().await,
    }
    .context("Failed to fetch countries. Please try again later.")?;

    let countries = query.apply(countries);
    if countries.is_empty() {
        println!("No countries found.");
        return Ok(());
    }

    let favorites = state.store.current_session().map(|s| s.favorites.clone());
    print_country_table(&countries, |country| {
        favorites
            .as_ref()
            .zip(CountryCode::parse(&country.cca3).ok())
            .map(|(set, code)| set.contains(&code))
            .unwrap_or(false)
    });
    Ok(())
}

async fn cmd_countries_show(state: &AppState, raw_code: &str) -> Result<()> {
    let code = parse_code(raw_code)?;
    let country = state
        .countries
        .by_code(&code)
        .await
        .context("Failed to load country data")?
        .with_context(|| format!("Country not found: {}", code))?;

    let is_favorite = state
        .store
        .current_session()
        .map(|s| s.favorites.contains(&code))
        .unwrap_or(false);

    println!();
    println!(
        "=== {} {} ===",
        country.flag.as_deref().unwrap_or(""),
        country.name.common
    );
    println!();
    println!("Official:    {}", country.name.official);
    println!("Code:        {}", country.cca3);
    println!("Capital:     {}", country.capital_display());
    println!("Region:      {}", country.region);
    println!(
        "Subregion:   {}",
        country.subregion.as_deref().unwrap_or("N/A")
    );
    println!("Population:  {}", format_number(country.population));
    println!("Area:        {} km2", format_number(country.area.round() as u64));
    println!("Languages:   {}", country.languages_display());
    if let Some(png) = &country.flags.png {
        println!("Flag:        {}", png);
    }
    println!("Favorite:    {}", if is_favorite { "yes" } else { "no" });
    println!();
    Ok(())
}

/// Validate configuration file
async fn cmd_config_check(cli: &Cli) -> Result<()> {
    let config_path = &cli.config;

    println!("Checking configuration file: {}", config_path.display());
    println!();

    if !config_path.exists() {
        println!(
            "[!!] Configuration file not found: {}",
            config_path.display()
        );
        println!();
        println!("Defaults will be used.");
        return Ok(());
    }

    match Config::load(config_path) {
        Ok(config) => {
            println!("[OK] Configuration file is valid!");
            println!();
            println!("API:");
            println!("  Base URL:     {}", config.api.base_url);
            println!("  Timeout:      {}s", config.api.timeout_secs);
            println!("Countries:");
            println!("  Base URL:     {}", config.countries.base_url);
            println!("Storage:");
            println!("  Data Dir:     {}", config.storage.data_dir.display());
            println!("Logging:");
            println!("  Level:        {}", config.logging.level);
            println!();

            if config.api.base_url.starts_with("http://")
                && !config.api.base_url.contains("localhost")
                && !config.api.base_url.contains("127.0.0.1")
            {
                println!("Warnings:");
                println!("  [!] Bearer tokens will be sent over plain HTTP");
                println!();
            }
            Ok(())
        }
        Err(e) => {
            println!("[!!] Configuration file is invalid!");
            println!();
            println!("Error: {:#}", e);
            println!();
            anyhow::bail!("Invalid configuration file");
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn display_name(session: &Session) -> &str {
    if session.name.is_empty() {
        &session.user_id
    } else {
        &session.name
    }
}

fn print_country_table<F>(countries: &[Country], is_favorite: F)
where
    F: Fn(&Country) -> bool,
{
    println!();
    println!(
        "{:<1} {:<4}  {:<28}  {:<10}  {:<20}  {:>15}",
        "", "CODE", "NAME", "REGION", "CAPITAL", "POPULATION"
    );
    println!("{}", "-".repeat(86));

    for country in countries {
        println!(
            "{:<1} {:<4}  {:<28}  {:<10}  {:<20}  {:>15}",
            if is_favorite(country) { "*" } else { "" },
            country.cca3,
            truncate(&country.name.common, 28),
            truncate(&country.region, 10),
            truncate(&country.capital_display(), 20),
            format_number(country.population)
        );
    }

    println!();
    println!("{} countries", countries.len());
}

/// Group digits in thousands: 1234567 -> "1,234,567"
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Truncate a string to max length with ellipsis
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

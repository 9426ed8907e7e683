use chrono::Duration;
use log::{error, info, warn};
use mongodb::{Client as MongoClient, Database};
use rocket::{
    fairing::{Fairing, Info, Kind},
    figment::{providers::Env, Figment},
    Build, Rocket,
};
use serde::Deserialize;

use crate::mailer::Mailer;
use crate::model::{
    db::user::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Raw environment variables understood in addition to `Rocket.toml` and `ROCKET_*`,
/// with the config keys they map to.
const RAW_ENV_KEYS: [(&str, &str); 4] = [
    ("database_url", "db_uri"),
    ("email_user", "email_user"),
    ("email_pass", "email_pass"),
    ("nextauth_url", "app_url"),
];

/// The configuration sources: Rocket's defaults, `Rocket.toml`, `ROCKET_*` environment
/// variables, and finally the raw variables in [`RAW_ENV_KEYS`].
pub fn figment() -> Figment {
    let keys = RAW_ENV_KEYS.map(|(env, _)| env);
    rocket::Config::figment().merge(
        Env::raw()
            .only(&keys)
            .map(|key| config_key(key.as_str()).into()),
    )
}

/// The config key a raw environment variable is stored under.
fn config_key(env_key: &str) -> String {
    RAW_ENV_KEYS
        .iter()
        .find(|(env, _)| env.eq_ignore_ascii_case(env_key))
        .map_or_else(|| env_key.to_lowercase(), |(_, config)| config.to_string())
}

/// Application configuration, derived from the [`figment`]. This struct becomes managed state
/// and can be inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    app_url: String,
    otp_ttl: u32,
    otp_max_attempts: u32,
    auth_ttl: u32,
    #[serde(default)]
    src_voting: bool,
    // secrets
    jwt_secret: String,
    hmac_secret: String,
}

impl Config {
    /// Public base URL of the voting site, used in emails.
    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// Valid lifetime of an OTP in seconds.
    pub fn otp_ttl(&self) -> Duration {
        Duration::seconds(self.otp_ttl.into())
    }

    /// Number of wrong codes after which an OTP is burned.
    pub fn otp_max_attempts(&self) -> u32 {
        self.otp_max_attempts
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Whether students may vote in SRC (university-wide) elections.
    pub fn src_voting(&self) -> bool {
        self.src_voting
    }

    /// Secret key used to sign JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Secret key used to sign HMACs.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.src_voting() {
            info!("Students may vote in SRC elections");
        }

        // Manage the state.
        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    admin_email: String,
    // secrets
    db_uri: String,
    admin_password: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(&config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        if let Err(e) = prepare_database(&db, &config.admin_email, &config.admin_password).await {
            error!("Failed to prepare database: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Ensure the required indexes and at least one admin account exist.
pub(crate) async fn prepare_database(
    db: &Database,
    admin_email: &str,
    admin_password: &str,
) -> crate::error::Result<()> {
    ensure_indexes_exist(db).await?;
    ensure_admin_exists(&Coll::from_db(db), admin_email, admin_password).await
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "univote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub(crate) fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for outgoing email.
#[derive(Deserialize)]
struct MailConfig {
    // non-secrets
    smtp_host: String,
    email_from: Option<String>,
    email_user: Option<String>,
    // secrets
    email_pass: Option<String>,
}

/// A fairing that loads the SMTP config and places a [`Mailer`] into managed state.
/// Without SMTP credentials, mail is logged instead of sent.
pub struct MailerFairing;

#[rocket::async_trait]
impl Fairing for MailerFairing {
    fn info(&self) -> Info {
        Info {
            name: "Mailer",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<MailConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load mail config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let mailer = match (config.email_user, config.email_pass) {
            (Some(user), Some(pass)) => {
                let from = config.email_from.unwrap_or_else(|| user.clone());
                match Mailer::smtp(&config.smtp_host, user, pass, &from) {
                    Ok(mailer) => {
                        info!("Sending mail via {} as {from}", config.smtp_host);
                        mailer
                    }
                    Err(e) => {
                        error!("Failed to configure SMTP transport: {e}");
                        return Err(rocket);
                    }
                }
            }
            _ => {
                warn!("EMAIL_USER/EMAIL_PASS not set; outgoing mail will only be logged");
                Mailer::log_only()
            }
        };

        // Manage the state.
        rocket = rocket.manage(mailer);
        Ok(rocket)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Config {
        pub fn example() -> Self {
            Self {
                app_url: "http://localhost:3000".to_string(),
                otp_ttl: 300,
                otp_max_attempts: 5,
                auth_ttl: 3600,
                src_voting: false,
                jwt_secret: "jwt-test-secret".to_string(),
                hmac_secret: "hmac-test-secret".to_string(),
            }
        }
    }
}

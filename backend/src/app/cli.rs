use std::env;
use std::io::{self, Write};

use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::app::{self, MigrationError};
use crate::auth;
use crate::core::Context;
use crate::db::{self, NewUser};
use crate::services;

#[rustfmt::skip]
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Migration creation failed")]
    MigrationCreateFailed { #[source] source: MigrationError },

    // NoMigrationsApplied is reported as status output, not as an error
    #[error("Checking migration status failed")]
    MigrationStatusCheckFailed { #[source] source: MigrationError },

    #[error("Running migrations failed")]
    MigrationRunFailed { #[source] source: MigrationError },

    #[error("Creating admin user failed: {0}")]
    AdminCreationFailed(String),

    #[error("Token cleanup failed")]
    TokenCleanupFailed { #[source] source: services::auth::AuthError },

    #[error("Failed to read password")]
    PasswordPromptFailed { #[from] source: io::Error },
}

#[derive(Parser)]
#[command(name = "migrate")]
#[command(about = "Database maintenance utility", long_about = None)]
struct Cli {
    #[command(subcommand)]
    migrate_sub_command: MigrateSubCommands,
}

#[derive(Subcommand)]
enum MigrateSubCommands {
    /// Create a new migration file
    Create {
        /// Name of the migration
        name: String,
    },
    /// List all embedded migrations
    List,
    /// Check if there are pending migrations
    Status,
    /// Run all pending migrations
    Run,
    /// Create an admin user, prompting for the password
    CreateAdmin {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long, default_value = "Administrator")]
        name: String,
        #[arg(long)]
        organization_id: String,
        #[arg(long, default_value = "admin")]
        role_id: String,
    },
    /// Remove expired and revoked refresh tokens
    CleanupTokens,
}

/// Runs `<bin> migrate <command>` when requested; returns false when the process should serve HTTP instead.
pub async fn run_cli(context: &Context) -> Result<bool, CliError> {
    let args: Vec<String> = env::args().collect();
    if args.get(1).map(String::as_str) != Some("migrate") {
        return Ok(false);
    }

    // clap sees the sub command directly after the binary name
    let cli_args = args.iter().take(1).chain(args.iter().skip(2)).cloned();
    let cli = Cli::parse_from(cli_args);

    match cli.migrate_sub_command {
        MigrateSubCommands::Create { name } => {
            let filename =
                app::create_migration(&name).map_err(|source| CliError::MigrationCreateFailed { source })?;
            println!("Created new migration file: {filename}");
        }
        MigrateSubCommands::List => {
            let migrations = app::list_migrations();
            if migrations.is_empty() {
                println!("No migrations found.");
            } else {
                println!("Available migrations:");
                for (i, migration) in migrations.iter().enumerate() {
                    println!("{}. {migration}", i + 1);
                }
            }
        }
        MigrateSubCommands::Status => match app::check_pending_migrations(&context.db).await {
            Ok(true) => println!("There are pending migrations that need to be applied."),
            Ok(false) => println!("Database is up to date. No pending migrations."),
            Err(MigrationError::NoMigrationsApplied) => println!("No migrations have been applied yet."),
            Err(source) => return Err(CliError::MigrationStatusCheckFailed { source }),
        },
        MigrateSubCommands::Run => {
            app::run_migrations(&context.db)
                .await
                .map_err(|source| CliError::MigrationRunFailed { source })?;
            println!("Migrations applied successfully.");
        }
        MigrateSubCommands::CreateAdmin {
            username,
            email,
            name,
            organization_id,
            role_id,
        } => {
            print!("Enter password for admin user '{username}': ");
            io::stdout().flush()?;
            let password = rpassword::read_password()?;

            let new_user = NewUser {
                organization_id,
                role_id,
                name,
                username,
                email,
                password_hash: auth::hash_password(&password)
                    .map_err(|e| CliError::AdminCreationFailed(e.to_string()))?,
                employee_id: None,
                position: None,
                address: None,
                phone: None,
            };
            create_admin_user(context, &new_user).await?;
            println!("Admin user '{}' created successfully!", new_user.username);
        }
        MigrateSubCommands::CleanupTokens => {
            let removed = services::auth::cleanup_tokens(context)
                .await
                .map_err(|source| CliError::TokenCleanupFailed { source })?;
            println!("Removed {removed} expired or revoked refresh tokens.");
        }
    }

    Ok(true)
}

async fn create_admin_user(context: &Context, new_user: &NewUser) -> Result<(), CliError> {
    let failed = |e: crate::core::DbError| CliError::AdminCreationFailed(e.to_string());
    if db::email_taken(&context.db, &new_user.email, None).await.map_err(failed)? {
        return Err(CliError::AdminCreationFailed("email already registered".to_string()));
    }
    if db::username_taken(&context.db, &new_user.username, None).await.map_err(failed)? {
        return Err(CliError::AdminCreationFailed("username already taken".to_string()));
    }
    let user = db::create_user(&context.db, new_user).await.map_err(failed)?;
    tracing::info!(user_id = %user.id, "Admin user created");
    Ok(())
}

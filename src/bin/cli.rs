use clap::{Parser, Subcommand};
use dogether_auth::{
    config::AppConfig,
    db,
    error::AuthError,
    models::RegisteredUser,
    repositories::{SqliteUserRepository, UserRepository},
    services::{
        auth_service::SignupRequest, create_notifier, AuthService, CredentialHasher,
        TokenService,
    },
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "dogether-auth-cli")]
#[command(about = "CLI tool for managing DoGether accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Register a new account (sends a verification email unless --verified)
    Create {
        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,

        /// Display name
        #[arg(short, long)]
        name: Option<String>,

        /// Locale
        #[arg(short, long)]
        locale: Option<String>,

        /// Mark email as verified right away
        #[arg(long)]
        verified: bool,
    },

    /// List accounts
    List {
        /// Maximum number of users to display
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Mark an account's email as verified without a token
    Verify {
        /// Email address of the user to verify
        #[arg(short, long)]
        email: String,
    },

    /// Issue and send a fresh verification link
    Resend {
        /// Email address of the user
        #[arg(short, long)]
        email: String,
    },
}

fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dogether_auth=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let auth_service = AuthService::new(
        user_repository.clone(),
        Arc::new(TokenService::new(&config.jwt_secret)),
        CredentialHasher::new(config.hash_cost)?,
        create_notifier(config.smtp.as_ref()),
        config.public_base_url.clone(),
    );

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                email,
                password,
                name,
                locale,
                verified,
            } => {
                let password = match password {
                    Some(pw) => pw,
                    None => {
                        let pw = prompt_password("Password")?;
                        if pw != prompt_password("Confirm password")? {
                            fail("Passwords do not match");
                        }
                        pw
                    }
                };

                let request = SignupRequest {
                    email: email.clone(),
                    password,
                    name,
                    locale,
                };

                let registration = if verified {
                    auth_service.register_verified(request).await
                } else {
                    auth_service.register(request).await
                };

                let user = match registration {
                    Ok(user) => user,
                    // The row is committed before the email goes out.
                    Err(AuthError::Notification(e)) => {
                        eprintln!("⚠️  Verification email not sent: {}", e);
                        match user_repository.find_by_email(email.trim()).await {
                            Ok(Some(user)) => RegisteredUser::from(&user),
                            _ => fail("Account created but could not be loaded"),
                        }
                    }
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                };

                println!("✅ User created successfully!");
                println!("  ID: {}", user.id);
                println!("  Email: {}", user.email);
                println!("  Locale: {}", user.locale);
                println!("  Verified: {}", verified);
            }

            UserCommands::List { limit, offset } => {
                let users = match user_repository.list_users(Some(limit), Some(offset)).await {
                    Ok(users) => users,
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                };

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!(
                        "{:<5} {:<40} {:<8} {:<10} {:<20}",
                        "ID", "Email", "Locale", "Verified", "Created"
                    );
                    println!("{}", "-".repeat(85));
                    for user in users {
                        println!(
                            "{:<5} {:<40} {:<8} {:<10} {:<20}",
                            user.id,
                            user.email,
                            user.locale,
                            if user.email_verified { "Yes" } else { "No" },
                            user.created_at.as_deref().unwrap_or("N/A")
                        );
                    }
                }
            }

            UserCommands::Verify { email } => match user_repository.find_by_email(&email).await {
                Ok(Some(user)) if user.email_verified => {
                    println!("ℹ️  User '{}' is already verified", email);
                }
                Ok(Some(user)) => match user_repository.mark_verified(user.id).await {
                    Ok(()) => println!("✅ User '{}' email verified successfully!", email),
                    Err(err) => fail(format!("Failed to verify user: {}", err)),
                },
                Ok(None) => fail(format!("User '{}' not found", email)),
                Err(err) => fail(format!("Failed to find user: {}", err)),
            },

            UserCommands::Resend { email } => match user_repository.find_by_email(&email).await {
                Ok(Some(user)) if user.email_verified => {
                    println!("ℹ️  User '{}' is already verified", email);
                }
                Ok(Some(_)) => match auth_service.resend_verification(&email).await {
                    Ok(()) => println!("✅ Verification email sent to '{}'", email),
                    Err(err) => fail(format!("Failed to send verification email: {}", err)),
                },
                Ok(None) => fail(format!("User '{}' not found", email)),
                Err(err) => fail(format!("Failed to find user: {}", err)),
            },
        },
    }

    pool.close().await;
    Ok(())
}

//! CLI entry and dispatch.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use libradmin_core::api::ApiClient;
use libradmin_core::config::Config;
use libradmin_core::error::ClientError;
use libradmin_core::logging;
use libradmin_core::notify::{Notice, Notifier};
use libradmin_core::overdue::OverdueReconciler;
use libradmin_core::routes::{GuardDecision, Navigator, Route, RouteGuard};
use libradmin_core::session::SessionManager;
use libradmin_core::storage::{CookieJar, LocalStorage};
use libradmin_types::{AuthUser, Entity};
use tracing::debug;

mod commands;
mod console;

use console::{ConsoleNavigator, ConsoleNotifier};

#[derive(Parser)]
#[command(name = "libradmin")]
#[command(version = "0.1")]
#[command(about = "Library administration console")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Also write logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Sign in and keep the session for one day
    Login {
        /// Username (usuario)
        #[arg(short, long)]
        username: String,

        /// Password; read from stdin when omitted
        #[arg(long, env = "LIBRADMIN_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Recover a forgotten password
    Password {
        #[command(subcommand)]
        command: PasswordCommands,
    },

    /// Overdue-loan notifications
    Overdue {
        #[command(subcommand)]
        command: OverdueCommands,
    },

    /// Show loan statistics
    Dashboard,

    /// List and edit authors, subjects, books, students, users and loans
    Resources {
        #[command(subcommand)]
        command: ResourceCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum PasswordCommands {
    /// E-mail a password reset link
    Forgot {
        #[arg(value_name = "EMAIL")]
        email: String,
    },
    /// Set a new password
    Reset {
        #[arg(value_name = "EMAIL")]
        email: String,

        /// New password
        #[arg(long, env = "LIBRADMIN_NEW_PASSWORD", hide_env_values = true)]
        password: String,

        /// Repeat the new password
        #[arg(long)]
        confirm: String,
    },
}

#[derive(clap::Subcommand)]
enum OverdueCommands {
    /// Fetch overdue loans and show which are new
    List {
        /// Only loans not seen yet
        #[arg(long)]
        unseen: bool,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Mark every overdue loan as seen
    Seen,
    /// E-mail a student about their overdue loan
    Notify {
        /// Student id (idEstudiante)
        #[arg(value_name = "STUDENT_ID")]
        student_id: i64,

        /// Message body (15 to 255 characters)
        #[arg(short, long)]
        message: String,
    },
}

#[derive(clap::Subcommand)]
enum ResourceCommands {
    /// List records
    List {
        #[arg(value_name = "ENTITY", value_parser = parse_entity)]
        entity: Entity,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Create a record from a JSON object
    Create {
        #[arg(value_name = "ENTITY", value_parser = parse_entity)]
        entity: Entity,

        /// Record as JSON, e.g. '{"nombre":"Gabriel"}'
        #[arg(long)]
        data: String,
    },
    /// Update a record from a JSON object
    Update {
        #[arg(value_name = "ENTITY", value_parser = parse_entity)]
        entity: Entity,

        /// Record as JSON, including its id
        #[arg(long)]
        data: String,
    },
    /// Delete a record by id
    Delete {
        #[arg(value_name = "ENTITY", value_parser = parse_entity)]
        entity: Entity,

        #[arg(value_name = "ID")]
        id: i64,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show where libradmin keeps its files and which API it uses
    Path,
    /// Initialize a default config file (if not present)
    Init,
    /// Print a fresh config generated from defaults
    Generate,
}

fn parse_entity(value: &str) -> Result<Entity, String> {
    Entity::from_segment(value).ok_or_else(|| {
        let known: Vec<&str> = Entity::ALL.iter().map(|e| e.segment()).collect();
        format!("unknown entity '{value}' (expected one of: {})", known.join(", "))
    })
}

/// Marker for failures already shown to the user.
#[derive(Debug)]
pub struct Reported;

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("request failed")
    }
}

impl std::error::Error for Reported {}

/// Converts a failure the core already delivered to the notifier.
pub fn surfaced(err: ClientError) -> anyhow::Error {
    match err {
        ClientError::Validation(_) => anyhow::anyhow!("Invalid input: {}", err.user_message()),
        _ => anyhow::Error::new(Reported),
    }
}

/// A protected view the guard admitted.
pub struct View {
    pub user: AuthUser,
    pub overdue: OverdueReconciler,
    pub reconciled: bool,
}

/// Wired-up services for one invocation.
pub struct App {
    pub api: ApiClient,
    pub session: Arc<SessionManager>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn Notifier>,
}

impl App {
    fn new(config: &Config) -> Result<Self> {
        let api = ApiClient::from_config(config).context("build API client")?;
        let navigator: Arc<dyn Navigator> = Arc::new(ConsoleNavigator);
        let notifier: Arc<dyn Notifier> = Arc::new(ConsoleNotifier);
        let session = Arc::new(SessionManager::new(
            api.clone(),
            CookieJar::default_location(),
            Arc::clone(&navigator),
            Arc::clone(&notifier),
        ));
        debug!(api = api.base_url(), "console ready");
        Ok(Self {
            api,
            session,
            navigator,
            notifier,
        })
    }

    fn overdue(&self) -> OverdueReconciler {
        OverdueReconciler::new(
            self.api.clone(),
            LocalStorage::default_location(),
            Arc::clone(&self.session),
            Arc::clone(&self.notifier),
        )
    }

    /// Restores the session, passes the guard for a protected view and
    /// reconciles overdue loans once.
    ///
    /// A failed overdue fetch has already been surfaced and does not block
    /// the view; `View::reconciled` tells callers that need the fresh list.
    pub async fn enter(&self, route: Route) -> Result<View> {
        let mut guard = RouteGuard::new(Arc::clone(&self.navigator));
        let states = self.session.subscribe();
        self.session.restore_session();

        let user = match guard.admit(states).await {
            GuardDecision::Allow(user) => user,
            GuardDecision::Redirected | GuardDecision::Pending => {
                anyhow::bail!("Not logged in. Run `libradmin login` first.")
            }
        };
        debug!(%route, user = %user.username, "entering view");

        let overdue = self.overdue();
        let reconciled = overdue.fetch_overdue_loans().await.is_some();
        Ok(View {
            user,
            overdue,
            reconciled,
        })
    }

    /// Surfaces a failure from a direct API call.
    pub fn report(&self, err: ClientError) -> anyhow::Error {
        if !matches!(err, ClientError::Validation(_)) {
            self.notifier.notify(Notice::error(err.user_message()));
        }
        surfaced(err)
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // one tokio runtime for everything
    let rt = tokio::runtime::Runtime::new().context("create tokio runtime")?;
    rt.block_on(async move { dispatch(cli).await })
}

async fn dispatch(cli: Cli) -> Result<()> {
    let Cli { command, verbose } = cli;

    // Config commands must work even with a broken config file.
    let command = match command {
        Commands::Config { command } => return config_command(command),
        command => command,
    };

    let config = Config::load().context("load config")?;
    logging::init(&config, verbose).context("init logging")?;
    let app = App::new(&config)?;

    match command {
        Commands::Login { username, password } => {
            commands::auth::login(&app, &username, password).await
        }
        Commands::Logout => {
            commands::auth::logout(&app);
            Ok(())
        }
        Commands::Whoami => {
            commands::auth::whoami(&app);
            Ok(())
        }

        Commands::Password { command } => match command {
            PasswordCommands::Forgot { email } => commands::auth::forgot(&app, &email).await,
            PasswordCommands::Reset {
                email,
                password,
                confirm,
            } => commands::auth::reset(&app, &email, password, confirm).await,
        },

        Commands::Overdue { command } => match command {
            OverdueCommands::List { unseen, json } => {
                commands::overdue::list(&app, unseen, json).await
            }
            OverdueCommands::Seen => commands::overdue::seen(&app).await,
            OverdueCommands::Notify {
                student_id,
                message,
            } => commands::overdue::notify(&app, student_id, &message).await,
        },

        Commands::Dashboard => commands::dashboard::show(&app).await,

        Commands::Resources { command } => match command {
            ResourceCommands::List { entity, json } => {
                commands::resources::list(&app, entity, json).await
            }
            ResourceCommands::Create { entity, data } => {
                commands::resources::create(&app, entity, &data).await
            }
            ResourceCommands::Update { entity, data } => {
                commands::resources::update(&app, entity, &data).await
            }
            ResourceCommands::Delete { entity, id } => {
                commands::resources::delete(&app, entity, id).await
            }
        },

        Commands::Config { command } => config_command(command),
    }
}

fn config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Path => {
            commands::config::path();
            Ok(())
        }
        ConfigCommands::Init => commands::config::init(),
        ConfigCommands::Generate => commands::config::generate(),
    }
}

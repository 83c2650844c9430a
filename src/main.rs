use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use papaya_detect::core::db::{NewUser, UserDb, UserRepository};
use papaya_detect::settings::DEFAULT_CONFIDENCE;
use papaya_detect::shell::{RecordSummary, Shell, render_history};
use papaya_detect::{DetectionPipeline, InputImage, PipelineError, Session, SessionError, Settings};

#[derive(Parser)]
#[command(name = "papaya-detect")]
#[command(about = "Detect papaya fruit diseases in images")]
struct Cli {
    #[command(flatten)]
    resources: ResourceArgs,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ResourceArgs {
    /// Application root holding weights/, the catalog and users.db
    #[arg(long, env = "PAPAYA_ROOT", default_value = ".", global = true)]
    root: PathBuf,

    /// Detection model weights (.rten)
    #[arg(long, env = "PAPAYA_MODEL", global = true)]
    model: Option<PathBuf>,

    /// Class names, one per line
    #[arg(long, env = "PAPAYA_LABELS", global = true)]
    labels: Option<PathBuf>,

    /// Disease description catalog (JSON)
    #[arg(long, env = "PAPAYA_CATALOG", global = true)]
    catalog: Option<PathBuf>,

    /// Font for label text on annotated images
    #[arg(long, env = "PAPAYA_FONT", global = true)]
    font: Option<PathBuf>,

    /// Credential database
    #[arg(long, env = "PAPAYA_USERS_DB", global = true)]
    users_db: Option<PathBuf>,

    /// Require login before detecting
    #[arg(long, env = "PAPAYA_ENABLE_LOGIN", global = true)]
    enable_login: bool,

    /// Minimum confidence for reported regions (0..=1)
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE, global = true)]
    confidence: f32,
}

impl ResourceArgs {
    fn settings(&self) -> Settings {
        let mut settings = Settings::from_root(&self.root);
        if let Some(model) = &self.model {
            settings.model_path = model.clone();
        }
        if let Some(labels) = &self.labels {
            settings.labels_path = labels.clone();
        }
        if let Some(catalog) = &self.catalog {
            settings.catalog_path = catalog.clone();
        }
        if let Some(users_db) = &self.users_db {
            settings.users_db = users_db.clone();
        }
        settings.font_path = self.font.clone();
        settings.enable_login = self.enable_login;
        settings.confidence = self.confidence;
        settings
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Detect diseases in one or more images
    Detect {
        /// Input images (JPEG or PNG)
        #[arg(value_name = "IMAGE", required = true)]
        images: Vec<PathBuf>,

        /// Treat inputs as camera stills instead of uploads
        #[arg(long)]
        camera: bool,

        /// Write annotated images to this directory
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Save source and annotated images of every run (directory must be empty)
        #[arg(long, value_name = "DIR")]
        debug_out: Option<PathBuf>,

        /// Print the session history as JSON
        #[arg(long)]
        json: bool,

        #[arg(long)]
        username: Option<String>,

        #[arg(long, env = "PAPAYA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Interactive session reading commands from stdin
    Session {
        /// Write annotated images to this directory
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Manage accounts in the credential database
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Register a new account
    Add {
        username: String,
        name: String,
        #[arg(long, env = "PAPAYA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Check a password
    Verify {
        username: String,
        #[arg(long, env = "PAPAYA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List registered accounts
    List,
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "papaya_detect=debug" } else { "papaya_detect=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<DetectionPipeline> {
    let (pipeline, warnings) = match DetectionPipeline::from_settings(settings) {
        Ok(built) => built,
        Err(e @ PipelineError::ResourceLoad(_)) => {
            anyhow::bail!("Unable to load model: {}\n{}", settings.model_path.display(), e)
        }
        Err(e) => return Err(e.into()),
    };
    for warning in &warnings {
        eprintln!("Warning: {}", warning);
    }
    Ok(pipeline)
}

async fn open_session(
    settings: &Settings,
    username: Option<&str>,
    password: Option<&str>,
) -> anyhow::Result<(Session, Option<UserDb>)> {
    if !settings.enable_login {
        return Ok((Session::with_default_admin(), None));
    }

    let users = UserDb::open(&settings.users_db).await?;
    let mut session = Session::anonymous();
    if let (Some(username), Some(password)) = (username, password) {
        session.login(&users, username, password).await?;
    }
    Ok((session, Some(users)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    init_logging(args.verbose);
    let settings = args.resources.settings();

    match args.command {
        Commands::Detect {
            images,
            camera,
            out,
            debug_out,
            json,
            username,
            password,
        } => {
            let mut pipeline = build_pipeline(&settings)?;
            if let Some(debug_dir) = debug_out {
                pipeline = pipeline.with_debug(debug_dir)?;
            }
            let (session, _users) =
                open_session(&settings, username.as_deref(), password.as_deref()).await?;

            let mut shell = Shell::new(&pipeline, session, settings.confidence);
            if let Some(dir) = out {
                shell = shell.with_output_dir(dir);
            }

            let mut failures = 0;
            for path in &images {
                let input = if camera {
                    InputImage::open_camera_frame(path)
                } else {
                    InputImage::open(path)
                };
                let result = input
                    .map_err(|e| SessionError::from(PipelineError::from(e)))
                    .and_then(|input| shell.detect(input));
                match result {
                    Ok(text) if !json => print!("{}", text),
                    Ok(_) => {}
                    Err(e) => {
                        failures += 1;
                        eprintln!("Error: {}: {}", path.display(), e);
                    }
                }
            }

            let history = shell.session().history();
            if json {
                let summaries = history
                    .list()
                    .iter()
                    .enumerate()
                    .map(|(idx, record)| RecordSummary::new(idx + 1, record))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if args.verbose {
                println!("\n=== Riwayat Deteksi ===");
                print!("{}", render_history(history));
            }

            if failures > 0 {
                anyhow::bail!("{} of {} images failed", failures, images.len());
            }
        }
        Commands::Session { out } => {
            let pipeline = build_pipeline(&settings)?;
            let (session, users) = open_session(&settings, None, None).await?;

            let mut shell = Shell::new(&pipeline, session, settings.confidence);
            if let Some(users) = users {
                shell = shell.with_users(users);
            }
            if let Some(dir) = out {
                shell = shell.with_output_dir(dir);
            }

            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            shell.run(stdin.lock(), &mut stdout).await?;
        }
        Commands::User { action } => {
            let users = UserDb::open(&settings.users_db).await?;
            match action {
                UserCommand::Add {
                    username,
                    name,
                    password,
                } => {
                    let user = users
                        .register_user(NewUser {
                            username,
                            name,
                            password_confirmation: password.clone(),
                            password,
                        })
                        .await?;
                    println!("Registered {} ({})", user.username, user.name);
                }
                UserCommand::Verify { username, password } => {
                    match users.verify_user(&username, &password).await? {
                        Some(user) => println!("OK: {} ({})", user.username, user.name),
                        None => anyhow::bail!("Invalid username or password"),
                    }
                }
                UserCommand::List => {
                    for user in users.list_users().await? {
                        println!("{}\t{}", user.username, user.name);
                    }
                }
            }
            users.close().await;
        }
    }

    Ok(())
}

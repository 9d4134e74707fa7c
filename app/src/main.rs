//! `brainstorm` - account client for the Brainstorm backend.
//!
//! Each invocation restores the session from a refresh token (if given),
//! runs one command through the session context and prints where the app
//! would route next.
//!
//! ```bash
//! brainstorm signin --email ann@example.com --password secret1
//! brainstorm --refresh-token <token> profile --name Annie --photo ./me.png
//! ```

mod cli;

use anyhow::Context as _;
use brainstorm_session::providers::{
    CloudinaryImageHost, FirebaseIdentityProvider, FirestoreProfileStore,
};
use brainstorm_session::{
    resolve_route, AppConfig, IdentityAdapter, PhotoSource, ProfileUpdate, SessionContext,
    SessionEnvironment,
};
use clap::Parser;
use cli::{Cli, Commands, PhotoArg};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Session = SessionContext<
    FirebaseIdentityProvider,
    FirestoreProfileStore<FirebaseIdentityProvider>,
    CloudinaryImageHost,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "brainstorm=info,brainstorm_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Invalid configuration")?;
    info!(project = %config.firebase.project_id, "Configuration loaded");

    let identity = Arc::new(FirebaseIdentityProvider::new(config.firebase.clone(), &config.http)?);
    let profiles = Arc::new(FirestoreProfileStore::new(
        &config.firebase,
        &config.http,
        Arc::clone(&identity),
    )?);
    let images = Arc::new(CloudinaryImageHost::new(config.cloudinary.clone(), &config.http)?);
    let adapter = Arc::new(IdentityAdapter::new(Arc::clone(&identity), profiles, images));

    let session: Session = SessionContext::start(adapter, SessionEnvironment::default())?;
    println!("route: {}", resolve_route(&session.state()));

    let token = match &cli.command {
        Commands::Restore { token } => Some(token.as_str()),
        _ => cli.refresh_token.as_deref(),
    };
    if let Err(error) = identity.initialize(token).await {
        if matches!(cli.command, Commands::Restore { .. }) {
            return Err(error).context("Could not restore session");
        }
    }
    session.resolved().await?;

    run(&session, cli.command).await?;

    let state = session.state();
    println!("route: {}", resolve_route(&state));
    println!("hello, {}", state.greeting_name());
    if let Some(token) = identity.refresh_token() {
        println!("refresh token: {token}");
    }

    session.shutdown();
    Ok(())
}

async fn run(session: &Session, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Signin { email, password } => {
            session.sign_in(&email, &password).await?;
        },
        Commands::Signup {
            email,
            password,
            name,
        } => {
            let uid = session.sign_up(&email, &password, &name).await?;
            println!("created account {uid}, sign in to continue");
        },
        Commands::Signout => session.sign_out().await?,
        Commands::Whoami | Commands::Restore { .. } => match session.current_user() {
            Some(user) => {
                println!("uid: {}", user.uid);
                println!("email: {}", user.email.as_deref().unwrap_or("-"));
                println!("name: {}", user.display_name.as_deref().unwrap_or("-"));
                println!("photo: {}", user.photo_url.as_deref().unwrap_or("-"));
            },
            None => println!("not signed in"),
        },
        Commands::Profile {
            name,
            email,
            password,
            photo,
        } => {
            let mut update = ProfileUpdate::new();
            if let Some(name) = name {
                update = update.display_name(name);
            }
            if let Some(email) = email {
                update = update.email(email);
            }
            if let Some(password) = password {
                update = update.password(password);
            }
            if let Some(photo) = photo {
                update = update.photo(load_photo(PhotoArg::parse(&photo)).await?);
            }
            let user = session.update_profile(update).await?;
            info!(uid = %user.uid, "Profile updated");
        },
    }
    Ok(())
}

async fn load_photo(photo: PhotoArg) -> anyhow::Result<PhotoSource> {
    match photo {
        PhotoArg::Url(url) => Ok(PhotoSource::Remote(url)),
        PhotoArg::File(path) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Could not read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map_or_else(|| "photo".to_string(), |n| n.to_string_lossy().into_owned());
            Ok(PhotoSource::local(file_name, bytes))
        },
    }
}

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use odc_client::{
    AuthenticatedClient, ClientConfig, FileSessionStore, OperatorProfile, ReqwestTransport,
    SessionContext, SessionWatcher,
};
use odc_core::{OutcomeStatus, RegistrationForm, SignerInfo, SubmissionOrchestrator, SubmitResult};
use odc_types::{EntityKind, NonEmptyText};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "odc")]
#[command(about = "Organ donation console: register donors and patients")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a bearer token and tenant for later commands
    Login {
        #[arg(long)]
        token: String,
        /// Tenant sent as X-Tenant-ID
        #[arg(long)]
        tenant: String,
        /// Tenant in the operator profile, if it differs from the session tenant
        #[arg(long)]
        profile_tenant: Option<String>,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        hospital: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the stored session
    Status,
    /// Register a donor or patient with a signed consent document
    Register {
        kind: KindArg,
        /// Entity field as key=value (repeatable)
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
        /// JSON object of fields; --field values override it
        #[arg(long)]
        fields_file: Option<PathBuf>,
        /// Signed consent document (JPEG, PNG or PDF, at most 5 MiB)
        #[arg(long)]
        signature: PathBuf,
        /// Guardian signing on the entity's behalf
        #[arg(long, requires = "guardian_relation")]
        guardian_name: Option<String>,
        #[arg(long, requires = "guardian_name")]
        guardian_relation: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Donor,
    Patient,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Donor => EntityKind::Donor,
            KindArg::Patient => EntityKind::Patient,
        }
    }
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    if let Err(e) = init_tracing() {
        eprintln!("Error initialising logging: {}", e);
        return ExitCode::FAILURE;
    }

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("odc=warn".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn client_config() -> anyhow::Result<ClientConfig> {
    let env = |name: &str| std::env::var(name).ok();
    Ok(ClientConfig::from_env_values(
        env("ODC_API_BASE_URL"),
        env("ODC_REQUEST_TIMEOUT_MS"),
        env("ODC_VERIFICATION_TENANT_SOURCE"),
        env("ODC_SESSION_FILE"),
    )?)
}

fn open_session(config: &ClientConfig) -> anyhow::Result<SessionContext> {
    let store = FileSessionStore::open(config.session_file())
        .with_context(|| format!("opening {}", config.session_file().display()))?;
    Ok(SessionContext::new(Arc::new(store)))
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let Some(command) = cli.command else {
        println!("Use 'odc --help' for commands");
        return Ok(ExitCode::SUCCESS);
    };

    let config = client_config()?;
    let session = open_session(&config)?;

    match command {
        Commands::Login {
            token,
            tenant,
            profile_tenant,
            display_name,
            hospital,
        } => {
            let profile = OperatorProfile {
                display_name,
                tenant_id: Some(profile_tenant.unwrap_or_else(|| tenant.clone())),
                hospital_id: hospital,
            };
            session.login(
                NonEmptyText::new(&token).context("--token")?,
                Some(NonEmptyText::new(&tenant).context("--tenant")?),
                Some(profile),
            )?;
            tracing::info!("session stored in {}", config.session_file().display());
            println!("Signed in to tenant {}", tenant.trim());
        }
        Commands::Logout => {
            session.teardown()?;
            tracing::info!("session cleared");
            println!("Signed out");
        }
        Commands::Status => print_status(&session, &config),
        Commands::Register {
            kind,
            fields,
            fields_file,
            signature,
            guardian_name,
            guardian_relation,
        } => {
            if !session.is_authenticated() {
                anyhow::bail!("not signed in; run 'odc login' first");
            }

            let mut form = RegistrationForm::new(kind.into());
            if let Some(path) = fields_file {
                tracing::debug!("reading fields from {}", path.display());
                for (key, value) in read_fields_file(&path)? {
                    form.set_field(&key, value)?;
                }
            }
            for (key, value) in fields {
                form.set_field(&key, value)?;
            }
            if let (Some(name), Some(relation)) = (guardian_name, guardian_relation) {
                form.set_signer(SignerInfo::guardian(name, relation));
            }
            form.attach_path(&signature)
                .with_context(|| format!("reading {}", signature.display()))?;

            return register(config, session, form).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn register(
    config: ClientConfig,
    session: SessionContext,
    form: RegistrationForm,
) -> anyhow::Result<ExitCode> {
    tracing::info!("registering {} against {}", form.kind(), config.base_url());
    let transport = ReqwestTransport::new(config.base_url())?;
    let mut watcher = SessionWatcher::new(session.clone());
    let client = AuthenticatedClient::new(config, session, transport);
    let orchestrator = SubmissionOrchestrator::with_session(
        client,
        odc_core::RegistrationSession::with_form(form),
    );

    let result = orchestrator.submit().await?;

    // Any expiry signal is already queued; act on it without waiting for more.
    tokio::select! {
        biased;
        true = watcher.next_expiry() => {
            tracing::warn!("credential rejected; stored session torn down");
            eprintln!("Session expired; run 'odc login' to sign in again");
        }
        _ = std::future::ready(()) => {}
    }

    let SubmitResult::Finished(presentation) = result else {
        anyhow::bail!("a submission is already in flight");
    };
    tracing::info!("registration finished with {:?}", presentation.status);
    print!("{}", presentation);

    Ok(match presentation.status {
        OutcomeStatus::Success => ExitCode::SUCCESS,
        OutcomeStatus::Warning => ExitCode::from(2),
        OutcomeStatus::Error => ExitCode::FAILURE,
    })
}

fn print_status(session: &SessionContext, config: &ClientConfig) {
    println!("API: {}", config.base_url());
    if !session.is_authenticated() {
        println!("Not signed in");
        return;
    }
    println!(
        "Signed in; tenant {}",
        session.current_tenant().unwrap_or_else(|| "(none)".into())
    );
    println!(
        "Verification tenant: {}",
        session
            .verification_tenant(config.verification_tenant_source())
            .unwrap_or_else(|| "(none)".into())
    );
    if let Some(profile) = session.profile() {
        if let Some(name) = profile.display_name {
            println!("Operator: {}", name);
        }
        if let Some(hospital) = profile.hospital_id {
            println!("Hospital: {}", hospital);
        }
    }
}

fn read_fields_file(path: &Path) -> anyhow::Result<Vec<(String, String)>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let serde_json::Value::Object(map) = value else {
        anyhow::bail!("{} must contain a JSON object", path.display());
    };

    map.into_iter()
        .map(|(key, value)| match value {
            serde_json::Value::String(s) => Ok((key, s)),
            serde_json::Value::Number(n) => Ok((key, n.to_string())),
            other => anyhow::bail!("field '{}' must be a string or number, got {}", key, other),
        })
        .collect()
}

use axum::http::{HeaderMap, Method};
use clap::Parser;
use gatekeep::auth::{build_hasher, JwtVerifier, PasswordEncoder};
use gatekeep::config::{Config, ConfigManager, ConfigValidator, LogFormat};
use gatekeep::gate::Gate;
use gatekeep::http_server::HttpServer;
use gatekeep::policy::{AuthorizationPolicy, HeaderPolicy};
use gatekeep::utils::init_tracing;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "gatekeep")]
#[command(about = "Request authorization, session and security header gate")]
#[command(version)]
enum Cli {
    /// Run the demo HTTP server behind the gate
    Serve(ServeArgs),
    /// Show the authorization decision and response headers for a request
    Check(CheckArgs),
    /// Validate a configuration file
    Validate(ConfigArgs),
    /// Print the effective configuration after defaults and environment overrides
    ShowConfig(ShowConfigArgs),
    /// Print the configuration JSON schema
    Schema,
    /// Hash a password with the configured encoder
    HashPassword(HashPasswordArgs),
    /// Sign a JWT for local testing
    IssueToken(IssueTokenArgs),
}

#[derive(clap::Args)]
struct ConfigArgs {
    /// Configuration file path; defaults plus GATEKEEP_* environment when omitted
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Parser)]
struct ServeArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Host to bind to
    #[arg(short = 'H', long)]
    host: Option<String>,
    /// Port to bind to
    #[arg(short, long)]
    port: Option<u16>,
    /// Log level
    #[arg(short, long)]
    log_level: Option<String>,
    /// Emit JSON logs
    #[arg(long)]
    json_logs: bool,
}

#[derive(Parser)]
struct CheckArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Request path
    path: String,
    /// Request method
    #[arg(default_value = "GET")]
    method: String,
}

#[derive(Parser)]
struct ShowConfigArgs {
    #[command(flatten)]
    config: ConfigArgs,
    /// Output format
    #[arg(long, value_enum, default_value = "toml")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Toml,
    Json,
    Yaml,
}

#[derive(Parser)]
struct HashPasswordArgs {
    /// Plain-text password
    password: String,
    /// Encoder to use
    #[arg(long, value_enum, default_value = "bcrypt")]
    encoder: EncoderArg,
    /// BCrypt cost factor
    #[arg(long, default_value = "10")]
    cost: u32,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum EncoderArg {
    Bcrypt,
    Noop,
}

impl From<EncoderArg> for PasswordEncoder {
    fn from(arg: EncoderArg) -> Self {
        match arg {
            EncoderArg::Bcrypt => PasswordEncoder::Bcrypt,
            EncoderArg::Noop => PasswordEncoder::Noop,
        }
    }
}

#[derive(Parser)]
struct IssueTokenArgs {
    /// Token subject
    subject: String,
    /// Granted authorities
    #[arg(short, long, value_delimiter = ',')]
    authorities: Vec<String>,
    /// Signing secret
    #[arg(long, env = "GATEKEEP_AUTH__JWT_SECRET")]
    secret: String,
    /// Token issuer
    #[arg(long, default_value = "gatekeep")]
    issuer: String,
    /// Lifetime in hours
    #[arg(long, default_value = "24")]
    expiry_hours: i64,
}

async fn load_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let manager = match &args.config {
        Some(path) => {
            let expanded = shellexpand::tilde(path).to_string();
            ConfigManager::new(expanded).await?
        }
        None => ConfigManager::from_env()?,
    };
    Ok((*manager.get_config()).clone())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli {
        Cli::Serve(args) => {
            let mut config = load_config(&args.config).await?;

            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            if let Some(level) = args.log_level {
                config.logging.level = level;
            }
            if args.json_logs {
                config.logging.format = LogFormat::Json;
            }
            init_tracing(&config.logging.level, config.logging.format);

            match ConfigValidator::new().validate(&config) {
                Ok(warnings) => {
                    for warning in warnings {
                        warn!("{}", warning);
                    }
                }
                Err(errors) => {
                    for error in &errors {
                        tracing::error!("{}", error);
                    }
                    anyhow::bail!("configuration has {} error(s)", errors.len());
                }
            }

            let gate = Arc::new(Gate::from_config(&config)?);
            info!(
                rules = gate.authorization().rules().len(),
                stateless = gate.session().is_stateless(),
                "gate ready"
            );

            HttpServer::new(Arc::new(config), gate).run().await?;
        }
        Cli::Check(args) => {
            let config = load_config(&args.config).await?;
            let authorization = AuthorizationPolicy::from_config(&config.authorization)?;
            let headers = HeaderPolicy::from_config(&config.headers)?;
            let method = Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())?;

            let decision = authorization.decide(&args.path, &method);
            println!("{} {} => {:?}", method, args.path, decision);
            for (name, value) in headers.applied(&args.path, HeaderMap::new()).iter() {
                println!("  {}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
        }
        Cli::Validate(args) => {
            let validator = ConfigValidator::new();
            let result = match &args.config {
                Some(path) => validator.validate_file(path).await,
                None => validator.validate(&load_config(&args).await?),
            };
            match result {
                Ok(warnings) => {
                    for warning in &warnings {
                        println!("warning: {}", warning);
                    }
                    println!("configuration is valid");
                }
                Err(errors) => {
                    for error in &errors {
                        eprintln!("error: {}", error);
                    }
                    std::process::exit(1);
                }
            }
        }
        Cli::ShowConfig(args) => {
            let config = load_config(&args.config).await?;
            let rendered = match args.format {
                OutputFormat::Toml => toml::to_string_pretty(&config)?,
                OutputFormat::Json => serde_json::to_string_pretty(&config)?,
                OutputFormat::Yaml => serde_yaml::to_string(&config)?,
            };
            println!("{}", rendered);
        }
        Cli::Schema => {
            println!("{}", ConfigValidator::new().export_schema());
        }
        Cli::HashPassword(args) => {
            let hasher = build_hasher(args.encoder.into(), args.cost);
            println!("{}", hasher.hash(&args.password)?);
        }
        Cli::IssueToken(args) => {
            let jwt = JwtVerifier::new(args.secret)
                .with_issuer(args.issuer)
                .with_default_expiry(chrono::Duration::hours(args.expiry_hours));
            println!("{}", jwt.issue(&args.subject, args.authorities)?);
        }
    }

    Ok(())
}

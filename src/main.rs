use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use pgdao::codegen::{CodeGenConfig, Generator};
use pgdao::config::ConnectionConfig;
use pgdao::error::PgdaoError;
use pgdao::introspect::TableFilter;
use pgdao::keys::AutoKeyConfig;
use pgdao::typemap::TypeRuleSet;

#[derive(Parser, Debug)]
#[command(name = "pgdao")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Database schema to introspect
    #[arg(long, default_value = "public")]
    schema: String,

    /// Package name written into the generated header
    #[arg(long, default_value = "dao")]
    package: String,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Path to .env file for connection config
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// TOML type map replacing the built-in one
    #[arg(long)]
    typemap: Option<PathBuf>,

    /// Custom template used for every table
    #[arg(long)]
    template: Option<PathBuf>,

    /// Custom template used for every enum
    #[arg(long)]
    enum_template: Option<PathBuf>,

    /// Comma-separated list of tables to include (default: all)
    #[arg(long, value_delimiter = ',')]
    tables: Option<Vec<String>>,

    /// Comma-separated list of tables to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,

    /// Comma-separated list of tables and enums to mark deprecated
    #[arg(long, value_delimiter = ',')]
    deprecated: Option<Vec<String>>,

    /// Comma-separated DDL types treated as database generated keys
    #[arg(long, value_delimiter = ',')]
    autogen_types: Option<Vec<String>>,

    /// Treat identity columns as database generated keys
    #[arg(long)]
    identity_as_pk: bool,

    /// Skip enum types
    #[arg(long)]
    no_enums: bool,

    /// Emit rendered templates without formatting them
    #[arg(long)]
    no_format: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    if let Err(e) = run() {
        error!(error = ?e, "Fatal error");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    info!("pgdao v{}", env!("CARGO_PKG_VERSION"));
    info!(
        schema = ?cli.schema,
        package = ?cli.package,
        output = ?cli.output,
        "Starting code generation"
    );

    let connection = ConnectionConfig::load(cli.env_file.as_deref())
        .context("Failed to load database configuration")?;
    debug!(connection = ?connection.redacted(), "Loaded configuration");

    let codegen_config = build_codegen_config(&cli)?;
    debug!(
        filter = ?codegen_config.filter,
        deprecated = ?codegen_config.deprecated,
        auto_key = ?codegen_config.auto_key,
        custom_template = ?cli.template,
        custom_enum_template = ?cli.enum_template,
        "Code generation config"
    );

    let generator = Generator::new(codegen_config);
    let code = generate(&generator, &connection)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, &code)
                .map_err(PgdaoError::Output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = ?path, bytes = ?code.len(), "Wrote generated code");
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(&code)
                .and_then(|_| stdout.flush())
                .map_err(PgdaoError::Output)
                .context("Failed to write generated code to stdout")?;
        }
    }

    Ok(())
}

fn build_codegen_config(cli: &Cli) -> Result<CodeGenConfig> {
    let type_rules = match &cli.typemap {
        Some(path) => TypeRuleSet::load(path)
            .with_context(|| format!("Failed to load type map {}", path.display()))?,
        None => TypeRuleSet::builtin(),
    };

    let mut auto_key = AutoKeyConfig::default().with_identity_as_primary_key(cli.identity_as_pk);
    if let Some(types) = &cli.autogen_types {
        auto_key = auto_key.with_types(types.clone());
    }

    let filter = TableFilter {
        include: cli.tables.clone(),
        exclude: cli.exclude.clone(),
    };

    let mut config = CodeGenConfig::new(cli.package.clone())
        .with_schema(cli.schema.clone())
        .with_type_rules(type_rules)
        .with_auto_key(auto_key)
        .with_filter(filter)
        .with_deprecated(cli.deprecated.clone().unwrap_or_default())
        .with_include_enums(!cli.no_enums)
        .with_format(!cli.no_format);

    if let Some(path) = &cli.template {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read template {}", path.display()))?;
        config = config.with_custom_template(source);
    }
    if let Some(path) = &cli.enum_template {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Failed to read enum template {}", path.display()))?;
        config = config.with_custom_enum_template(source);
    }

    Ok(config)
}

fn init_tracing(verbose: u8) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });

    // Generated code may go to stdout
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[cfg(feature = "postgres")]
fn generate(generator: &Generator, connection: &ConnectionConfig) -> Result<Vec<u8>> {
    use pgdao::PostgresIntrospector;
    use postgres::NoTls;

    info!(connection = ?connection.redacted(), "Connecting to PostgreSQL");

    let mut client = postgres::Client::connect(&connection.connection_string(), NoTls)
        .map_err(|e| PgdaoError::Connection(e.to_string()))
        .with_context(|| format!("Failed to connect to PostgreSQL at {}", connection.redacted()))?;

    info!("Connected to database");

    let mut introspector = PostgresIntrospector::new(&mut client);
    let code = generator
        .generate(&mut introspector)
        .context("Failed to generate code")?;

    Ok(code)
}

#[cfg(not(feature = "postgres"))]
fn generate(_generator: &Generator, _connection: &ConnectionConfig) -> Result<Vec<u8>> {
    anyhow::bail!("PostgreSQL support not enabled. Rebuild with --features postgres")
}

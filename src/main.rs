//! Command-line interface for xmlschema-arbitrary

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

#[cfg(feature = "cli")]
use std::fs;
#[cfg(feature = "cli")]
use std::path::{Path, PathBuf};

#[cfg(feature = "cli")]
use xmlschema_arbitrary::{
    check_schema, CustomGenerators, ElementGenerator, GeneratorConfig, QName, RandomSource,
    RoundTripChecker, RoundTripReport, Schema, SchemaValidator, Tier,
};

#[cfg(feature = "cli")]
#[derive(Parser, Debug)]
#[command(name = "xmlschema-arbitrary")]
#[command(author, version, about = "Random schema-conformant XML instances", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate instances of a global element
    Sample {
        /// Path to the JSON schema model
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Root element: a local name in the target namespace, or `{namespace}local`
        #[arg(value_name = "ELEMENT")]
        root: String,

        /// Size parameter
        #[arg(long, default_value_t = 10)]
        size: u32,

        /// Number of instances
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Seed (fresh entropy when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Generator configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory to write `<root>-<n>.xml` files into (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Generate instances across growth tiers and validate them
    Check {
        /// Path to the JSON schema model
        #[arg(short, long, value_name = "SCHEMA")]
        schema: PathBuf,

        /// Root element; every global element is checked when omitted
        #[arg(value_name = "ELEMENT")]
        root: Option<String>,

        /// Tiers as `size:count` pairs (defaults to the standard growth schedule)
        #[arg(short, long, value_delimiter = ',')]
        tiers: Vec<String>,

        /// Seed (fresh entropy when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Generator configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(short, long)]
        json: bool,
    },
}

#[cfg(feature = "cli")]
fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sample {
            schema,
            root,
            size,
            count,
            seed,
            config,
            output,
        } => cmd_sample(schema, root, size, count, seed, config, output),
        Commands::Check {
            schema,
            root,
            tiers,
            seed,
            config,
            json,
        } => cmd_check(schema, root, tiers, seed, config, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(feature = "cli")]
fn load(
    schema_path: &Path,
    config: Option<PathBuf>,
) -> Result<(Schema, GeneratorConfig), Box<dyn std::error::Error>> {
    let schema = Schema::from_file(schema_path)?;
    let config = match config {
        Some(path) => GeneratorConfig::from_file(path)?,
        None => GeneratorConfig::default(),
    };
    Ok((schema, config))
}

#[cfg(feature = "cli")]
fn parse_root(schema: &Schema, root: &str) -> Result<QName, Box<dyn std::error::Error>> {
    if let Some(rest) = root.strip_prefix('{') {
        let (namespace, local) = rest
            .split_once('}')
            .ok_or_else(|| format!("Malformed element name '{}'", root))?;
        return Ok(QName::new(Some(namespace).filter(|ns| !ns.is_empty()), local));
    }
    Ok(schema.qname(root))
}

#[cfg(feature = "cli")]
fn source(seed: Option<u64>) -> RandomSource {
    match seed {
        Some(seed) => RandomSource::from_seed(seed),
        None => RandomSource::fresh(),
    }
}

#[cfg(feature = "cli")]
fn cmd_sample(
    schema_path: PathBuf,
    root: String,
    size: u32,
    count: usize,
    seed: Option<u64>,
    config: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (schema, config) = load(&schema_path, config)?;
    let root = parse_root(&schema, &root)?;
    let generator = ElementGenerator::new(&schema, &root, CustomGenerators::new(), config)?;
    let (batch, _) = generator.sample_with(size, count, source(seed));

    if let Some(dir) = &output {
        fs::create_dir_all(dir)?;
    }
    for (index, entry) in batch.entries.iter().enumerate() {
        match entry {
            Ok(sample) => {
                let xml = sample.value.to_xml()?;
                match &output {
                    Some(dir) => {
                        let path = dir.join(format!("{}-{}.xml", root.local_name, index + 1));
                        fs::write(&path, &xml)?;
                        println!("{} (seed {})", path.display(), sample.seed);
                    }
                    None => println!("{}", xml),
                }
            }
            Err(failure) => {
                eprintln!(
                    "sample {} failed (size {}, seed {}): {}",
                    index + 1,
                    failure.size,
                    failure.seed,
                    failure.error
                );
            }
        }
    }

    if batch.is_complete() {
        Ok(())
    } else {
        let failed = batch.failures().count();
        Err(format!("{} of {} samples could not be generated", failed, batch.len()).into())
    }
}

#[cfg(feature = "cli")]
fn parse_tiers(raw: &[String]) -> Result<Vec<Tier>, Box<dyn std::error::Error>> {
    if raw.is_empty() {
        return Ok(Tier::default_growth());
    }
    raw.iter()
        .map(|tier| -> Result<Tier, Box<dyn std::error::Error>> {
            let (size, count) = tier
                .split_once(':')
                .ok_or_else(|| format!("Tier '{}' is not of the form size:count", tier))?;
            Ok(Tier::new(size.trim().parse()?, count.trim().parse()?))
        })
        .collect()
}

#[cfg(feature = "cli")]
fn print_report(report: &RoundTripReport) {
    println!("{}", report.summary());
    for failure in report.failures() {
        println!("  sample {} (size {}, seed {}):", failure.index + 1, failure.size, failure.seed);
        for message in failure.outcome.messages() {
            println!("    - {}", message);
        }
    }
    for failure in &report.generation_failures {
        println!(
            "  sample {} not generated (size {}, seed {}): {}",
            failure.index + 1,
            failure.size,
            failure.seed,
            failure.error
        );
    }
}

#[cfg(feature = "cli")]
fn cmd_check(
    schema_path: PathBuf,
    root: Option<String>,
    tiers: Vec<String>,
    seed: Option<u64>,
    config: Option<PathBuf>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (schema, config) = load(&schema_path, config)?;
    let tiers = parse_tiers(&tiers)?;

    let Some(root) = root else {
        return cmd_check_schema(&schema, &config, &tiers, seed, json_output);
    };
    let root = parse_root(&schema, &root)?;
    let generator = ElementGenerator::new(&schema, &root, CustomGenerators::new(), config)?;
    let (batch, _) = generator.sample_tiers(&tiers, source(seed));

    let checker = RoundTripChecker::new(SchemaValidator::new(&schema));
    let report = checker.check(&batch);

    if json_output {
        println!("{}", report.to_json()?);
    } else {
        print_report(&report);
    }

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(feature = "cli")]
fn cmd_check_schema(
    schema: &Schema,
    config: &GeneratorConfig,
    tiers: &[Tier],
    seed: Option<u64>,
    json_output: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let checks = check_schema(schema, &CustomGenerators::new(), config, tiers, source(seed));

    if json_output {
        let entries = checks
            .iter()
            .map(|check| match &check.result {
                Ok(report) => serde_json::json!({ "element": check.element, "report": report }),
                Err(e) => serde_json::json!({ "element": check.element, "error": e.to_string() }),
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for check in &checks {
            match &check.result {
                Ok(report) => {
                    print!("{}: ", check.element);
                    print_report(report);
                }
                Err(e) => println!("{}: not derived: {}", check.element, e),
            }
        }
        let passed = checks.iter().filter(|c| c.is_success()).count();
        println!("{} of {} elements passed", passed, checks.len());
    }

    if !checks.iter().all(|c| c.is_success()) {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Rebuild with --features cli");
    std::process::exit(1);
}

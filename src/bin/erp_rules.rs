use std::{collections::HashMap, fs, path::PathBuf, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use erp_core::{
    category_tree::CategoryIndex,
    config::{self, AppConfig},
    derived::compute_derived,
    lifecycle::{can_transition, StatusLifecycle, TransitionCheck},
    models::{
        BillOfMaterial, BillOfMaterialItem, Material, MaterialCategory, ProductionConfirmation,
        Role, User, UserRole, WorkOrder,
    },
    reports::material_requirements,
    validation::{Validatable, ValidationContext, Violations},
};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config_dir.as_ref())?;
    config::init_tracing(config.log_level(), config.log_json);
    let vctx = ValidationContext::from_rules(config.rules());

    match cli.command {
        Commands::Validate(args) => handle_validate(args, &vctx, cli.json),
        Commands::Derive(args) => handle_derive(args, cli.json),
        Commands::Transition(args) => handle_transition(args, cli.json),
        Commands::Requirements(args) => handle_requirements(args, cli.json),
        Commands::Tree(args) => handle_tree(args, &config, cli.json),
    }
}

fn load_config(config_dir: Option<&PathBuf>) -> Result<AppConfig> {
    match config_dir {
        Some(dir) => config::load_config_from(dir),
        None => config::load_config(),
    }
    .context("failed to load configuration")
}

#[derive(Parser)]
#[command(
    name = "erp-rules",
    about = "Evaluate ERP domain rules against JSON records",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(long, global = true, help = "Directory holding default.toml and profile files")]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a record's validation rules
    Validate(RecordArgs),
    /// Print a record with its derived fields
    Derive(RecordArgs),
    /// Check whether a record may move to another status
    Transition(TransitionArgs),
    /// Scale a BOM to a production quantity
    Requirements(RequirementsArgs),
    /// Check a list of categories and print their paths
    Tree(TreeArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Category,
    Material,
    Bom,
    BomItem,
    WorkOrder,
    Confirmation,
    User,
    Role,
    UserRole,
}

#[derive(Clone, Copy, ValueEnum)]
enum LifecycleKind {
    Bom,
    WorkOrder,
    Confirmation,
}

#[derive(Args)]
struct RecordArgs {
    #[arg(value_enum, help = "Record kind")]
    kind: Kind,
    #[arg(help = "JSON file holding the record")]
    file: PathBuf,
}

#[derive(Args)]
struct TransitionArgs {
    #[arg(value_enum, help = "Record kind")]
    kind: LifecycleKind,
    #[arg(help = "JSON file holding the record")]
    file: PathBuf,
    #[arg(long, help = "Target status, e.g. IN_PROGRESS")]
    to: String,
}

#[derive(Args)]
struct RequirementsArgs {
    #[arg(help = "JSON file holding the BOM")]
    file: PathBuf,
    #[arg(long, help = "Quantity of the product to build")]
    quantity: Decimal,
    #[arg(long, help = "JSON file holding an array of materials for card details")]
    materials: Option<PathBuf>,
}

#[derive(Args)]
struct TreeArgs {
    #[arg(help = "JSON file holding an array of categories")]
    file: PathBuf,
}

fn read_json<T: DeserializeOwned>(path: &PathBuf) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    debug!(path = %path.display(), bytes = raw.len(), "Read input");
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn violations_of<T>(path: &PathBuf, vctx: &ValidationContext) -> Result<Violations>
where
    T: DeserializeOwned + Validatable,
{
    Ok(read_json::<T>(path)?.validate_with(vctx))
}

fn handle_validate(args: RecordArgs, vctx: &ValidationContext, json: bool) -> Result<()> {
    let violations = match args.kind {
        Kind::Category => violations_of::<MaterialCategory>(&args.file, vctx)?,
        Kind::Material => violations_of::<Material>(&args.file, vctx)?,
        Kind::Bom => violations_of::<BillOfMaterial>(&args.file, vctx)?,
        Kind::BomItem => violations_of::<BillOfMaterialItem>(&args.file, vctx)?,
        Kind::WorkOrder => violations_of::<WorkOrder>(&args.file, vctx)?,
        Kind::Confirmation => violations_of::<ProductionConfirmation>(&args.file, vctx)?,
        Kind::User => violations_of::<User>(&args.file, vctx)?,
        Kind::Role => violations_of::<Role>(&args.file, vctx)?,
        Kind::UserRole => violations_of::<UserRole>(&args.file, vctx)?,
    };

    if json {
        print_json(&json!({ "valid": violations.is_empty(), "violations": violations }))?;
    } else if violations.is_empty() {
        println!("Valid");
    } else {
        for violation in violations.iter() {
            println!("{}", violation);
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} rule(s) failed", violations.len()))
    }
}

fn handle_derive(args: RecordArgs, json: bool) -> Result<()> {
    let output = match args.kind {
        Kind::Bom => {
            serde_json::to_value(compute_derived(&read_json::<BillOfMaterial>(&args.file)?))?
        }
        Kind::BomItem => {
            serde_json::to_value(compute_derived(&read_json::<BillOfMaterialItem>(&args.file)?))?
        }
        Kind::WorkOrder => {
            serde_json::to_value(compute_derived(&read_json::<WorkOrder>(&args.file)?))?
        }
        Kind::Confirmation => serde_json::to_value(compute_derived(
            &read_json::<ProductionConfirmation>(&args.file)?,
        ))?,
        _ => bail!("records of this kind have no derived fields"),
    };

    if json {
        print_json(&output)
    } else {
        println!("{}", serde_json::to_string(&output)?);
        Ok(())
    }
}

fn check_transition<E>(path: &PathBuf, to: &str) -> Result<TransitionCheck>
where
    E: DeserializeOwned + StatusLifecycle,
    E::Status: FromStr,
{
    let entity = read_json::<E>(path)?;
    let target = E::Status::from_str(&to.trim().to_uppercase())
        .map_err(|_| anyhow!("unknown status '{}'", to))?;
    Ok(can_transition(&entity, target))
}

fn handle_transition(args: TransitionArgs, json: bool) -> Result<()> {
    let check = match args.kind {
        LifecycleKind::Bom => check_transition::<BillOfMaterial>(&args.file, &args.to)?,
        LifecycleKind::WorkOrder => check_transition::<WorkOrder>(&args.file, &args.to)?,
        LifecycleKind::Confirmation => {
            check_transition::<ProductionConfirmation>(&args.file, &args.to)?
        }
    };
    let permitted = check.is_permitted();

    if json {
        print_json(&check)?;
    } else if permitted {
        println!("{} -> {}: permitted", check.from, check.to);
    } else {
        println!("{} -> {}: rejected", check.from, check.to);
        for field in &check.missing_fields {
            println!("  missing: {}", field);
        }
        for blocker in &check.blockers {
            println!("  {}", blocker);
        }
    }

    if permitted {
        Ok(())
    } else {
        Err(anyhow!("transition rejected"))
    }
}

fn handle_requirements(args: RequirementsArgs, json: bool) -> Result<()> {
    if args.quantity <= Decimal::ZERO {
        bail!("quantity must be positive");
    }
    let bom = read_json::<BillOfMaterial>(&args.file)?;
    let materials: HashMap<Uuid, Material> = match &args.materials {
        Some(path) => read_json::<Vec<Material>>(path)?
            .into_iter()
            .map(|m| (m.id, m))
            .collect(),
        None => HashMap::new(),
    };

    let requirements = material_requirements(&bom, args.quantity, &materials);
    if json {
        return print_json(&requirements);
    }

    println!("{} x {} ({})", args.quantity, bom.name, bom.code);
    for req in &requirements {
        println!(
            "{:>5}  {:<20} {:>12} {}",
            req.line_number,
            req.component_code
                .clone()
                .unwrap_or_else(|| req.component_material_id.to_string()),
            req.required_quantity,
            req.unit_of_measure.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

fn handle_tree(args: TreeArgs, config: &AppConfig, json: bool) -> Result<()> {
    let categories = read_json::<Vec<MaterialCategory>>(&args.file)?;
    let index = CategoryIndex::from_categories(&categories)?;
    let max_depth = config.rules().max_category_depth;

    let mut rows = Vec::new();
    for category in categories.iter().filter(|c| !c.audit.is_deleted) {
        let depth = index.depth(category.id)?;
        if depth > max_depth {
            bail!(
                "category {} sits at depth {}, deeper than the maximum of {}",
                category.code,
                depth,
                max_depth
            );
        }
        rows.push((depth, index.path(category.id)?.join(" / ")));
    }
    rows.sort_by(|a, b| a.1.cmp(&b.1));

    if json {
        let paths: Vec<_> = rows
            .iter()
            .map(|(depth, path)| json!({ "depth": depth, "path": path }))
            .collect();
        return print_json(&paths);
    }
    for (_, path) in rows {
        println!("{}", path);
    }
    Ok(())
}

//! Persona Forge CLI
//!
//! Generate persona batches, enrich saved batches with lifecycle projections,
//! project a single financial snapshot, question saved personas and list
//! saved batches.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use persona_forge::chat;
use persona_forge::demographics::{load_samples, AgeBand, GenderFilter, IncomeBand};
use persona_forge::generation::{DisposableIncome, FinancialExperience, NetWorth, ProgressFn, Tenure};
use persona_forge::{
    enrich_batch, BankingParameters, Batch, BatchDispatcher, BatchStore, ChatCompletionClient,
    DemographicFilter, DemographicPool, DispatchConfig, LifecycleInput, LifecycleProjector,
    ParameterMode, PromptTemplate, RateLimiter,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "persona-forge")]
#[command(about = "Synthetic banking persona generator with lifecycle projections")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a batch of personas
    Generate(GenerateArgs),

    /// Add lifecycle projections to a saved batch
    Enrich {
        /// Batch file to enrich
        batch: PathBuf,
    },

    /// Project one financial snapshot and print it as JSON
    Project(ProjectArgs),

    /// Ask personas of a saved batch a question
    Ask(AskArgs),

    /// List saved batches, newest first
    List {
        #[arg(long, default_value = "output")]
        dir: PathBuf,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Census CSV with one sample per row
    #[arg(long)]
    data: PathBuf,

    /// Directory holding system.md and prompt.md
    #[arg(long)]
    prompts: Option<PathBuf>,

    #[arg(short, long, default_value_t = 5)]
    count: usize,

    /// Completion requests per second; also the worker pool size
    #[arg(long, default_value_t = 5)]
    rate_limit: usize,

    #[arg(long, default_value_t = 0.7)]
    temperature: f64,

    #[arg(long, default_value_t = 3000)]
    max_tokens: u32,

    /// Draw banking parameters independently per persona
    #[arg(long)]
    randomize: bool,

    #[command(flatten)]
    params: ParameterArgs,

    #[command(flatten)]
    filter: FilterArgs,

    #[arg(long, default_value = "output")]
    out: PathBuf,

    /// Also write the lifecycle-enriched copy
    #[arg(long)]
    lifecycle: bool,
}

/// Fixed banking parameters, used unless --randomize is set
#[derive(Args)]
struct ParameterArgs {
    /// "< 10k", "10k-100k" or ">100k"
    #[arg(long, default_value = "< 10k")]
    net_worth: String,

    /// "< 60k", "60k-100k" or ">100k"
    #[arg(long, default_value = "< 60k")]
    disposable_income: String,

    #[arg(long)]
    major_expenses: bool,

    /// rent or owner
    #[arg(long, default_value = "rent")]
    tenure: String,

    /// beginner, advanced or expert
    #[arg(long, default_value = "advanced")]
    experience: String,
}

#[derive(Args)]
struct FilterArgs {
    /// 18-25, 26-35, 36-45, 46-65 or 65+
    #[arg(long)]
    age_band: Option<String>,

    /// male or female
    #[arg(long)]
    gender: Option<String>,

    #[arg(long)]
    canton: Option<String>,

    #[arg(long)]
    language_region: Option<String>,

    /// "< 60k", "60k-100k" or "> 100k"
    #[arg(long)]
    income_band: Option<String>,

    #[arg(long)]
    education: Option<String>,

    #[arg(long)]
    employed: Option<bool>,

    #[arg(long)]
    has_children: Option<bool>,
}

#[derive(Args)]
struct AskArgs {
    /// Batch file to question
    batch: PathBuf,

    question: String,

    /// Ask only the persona at this 1-based position
    #[arg(long)]
    persona: Option<usize>,

    /// Number of personas asked, from the start of the batch
    #[arg(long, default_value_t = 10)]
    max_personas: usize,

    /// Completion requests per second; also the worker pool size
    #[arg(long, default_value_t = 3)]
    rate_limit: usize,
}

#[derive(Args)]
struct ProjectArgs {
    #[arg(long)]
    age: u32,

    #[arg(long)]
    income: f64,

    #[arg(long, default_value_t = 0.0)]
    assets: f64,

    #[arg(long)]
    monthly_expenses: Option<f64>,

    #[arg(long)]
    education: Option<String>,

    #[arg(long)]
    location: Option<String>,

    #[arg(long)]
    family_status: Option<String>,

    #[arg(long)]
    children: bool,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Generate(args) => generate(args),
        Commands::Enrich { batch } => enrich(&batch).map(|_| ()),
        Commands::Project(args) => project(args),
        Commands::Ask(args) => ask(args),
        Commands::List { dir } => list(&dir),
    }
}

fn generate(args: GenerateArgs) -> Result<()> {
    let filter = args.filter.to_filter()?;
    let mode = if args.randomize {
        ParameterMode::Randomize
    } else {
        ParameterMode::Fixed(args.params.to_parameters()?)
    };

    let samples = load_samples(&args.data)
        .with_context(|| format!("Failed to load demographic data from {}", args.data.display()))?;
    let pool = DemographicPool::new(samples);
    let pool = if filter.is_empty() { pool } else { pool.filtered(&filter) };
    if pool.is_empty() {
        bail!("No demographic samples match the selected filters");
    }
    println!("Sampling from {} demographic records", pool.len());

    let template = match &args.prompts {
        Some(dir) => PromptTemplate::from_dir(dir)
            .with_context(|| format!("Failed to load prompts from {}", dir.display()))?,
        None => PromptTemplate::default(),
    };
    let client = ChatCompletionClient::from_env().context("Failed to configure completion client")?;

    let config = DispatchConfig {
        rate_limit_per_second: args.rate_limit,
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        ..Default::default()
    };
    let dispatcher = BatchDispatcher::new(Arc::new(client), Arc::new(pool), template, config);

    let start = Instant::now();
    let progress: &ProgressFn<'_> = &|done, total, message| {
        println!("[{}/{}] {}", done, total, message);
    };
    let outcome = dispatcher.dispatch(args.count, &mode, Some(progress))?;
    println!(
        "Generated {} of {} personas in {:?}",
        outcome.personas.len(),
        args.count,
        start.elapsed()
    );
    for error in outcome.errors() {
        println!("  {}", error);
    }

    let batch = Batch::from_outcome(outcome, args.count, filter, mode);
    let store = BatchStore::new(&args.out);
    let path = store.save(&batch).context("Failed to save batch")?;
    println!("Saved to {}", path.display());

    if args.lifecycle {
        enrich(&path)?;
    }
    Ok(())
}

fn enrich(path: &Path) -> Result<PathBuf> {
    let mut batch = BatchStore::load(path)
        .with_context(|| format!("Failed to load batch {}", path.display()))?;

    let report = enrich_batch(&mut batch, &LifecycleProjector::default());
    let enriched = BatchStore::enriched_path(path);
    BatchStore::write(&batch, &enriched)
        .with_context(|| format!("Failed to write {}", enriched.display()))?;

    println!(
        "Enhanced {} personas with lifecycle data ({} skipped)",
        report.enriched,
        report.skipped.len()
    );
    println!("Saved to {}", enriched.display());
    Ok(enriched)
}

fn project(args: ProjectArgs) -> Result<()> {
    let input = LifecycleInput {
        age: args.age,
        annual_income: args.income,
        current_assets: args.assets,
        monthly_expenses: args.monthly_expenses,
        education_level: args.education,
        location: args.location,
        family_status: args.family_status,
        has_children: args.children,
    };
    let trajectory = LifecycleProjector::default().project(&input)?;
    println!("{}", serde_json::to_string_pretty(&trajectory)?);
    Ok(())
}

fn ask(args: AskArgs) -> Result<()> {
    if args.question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    let batch = BatchStore::load(&args.batch)
        .with_context(|| format!("Failed to load batch {}", args.batch.display()))?;
    let client = ChatCompletionClient::from_env().context("Failed to configure completion client")?;
    let limiter = RateLimiter::per_second(args.rate_limit);

    if let Some(position) = args.persona {
        let entry = position
            .checked_sub(1)
            .and_then(|i| batch.personas.get(i))
            .with_context(|| format!("Batch has no persona {} (it holds {})", position, batch.len()))?;
        let answer = chat::reply(entry, &[], &args.question, &client, &limiter)?;
        println!("{}: {}", entry.name().unwrap_or("Unknown"), answer);
        return Ok(());
    }

    let replies = chat::ask_batch(&batch, &args.question, args.max_personas, &client, &limiter)?;
    let mut failed = 0;
    for reply in &replies {
        match &reply.answer {
            Ok(answer) => println!("{} ({}): {}", reply.name, reply.occupation, answer),
            Err(e) => {
                failed += 1;
                log::debug!("Persona {} failed: {}", reply.position + 1, e);
            }
        }
    }
    println!("{} answers, {} errors", replies.len() - failed, failed);
    Ok(())
}

fn list(dir: &Path) -> Result<()> {
    let summaries = BatchStore::new(dir).list()?;
    if summaries.is_empty() {
        println!("No saved batches in {}", dir.display());
        return Ok(());
    }

    println!("{:<20} {:>8} {:>7} {:>9}  {}", "Generated", "Personas", "Errors", "Lifecycle", "File");
    println!("{}", "-".repeat(90));
    for summary in summaries {
        println!(
            "{:<20} {:>8} {:>7} {:>9}  {}",
            summary.generated_at.format("%Y-%m-%d %H:%M:%S"),
            summary.total_personas,
            summary.error_count,
            if summary.lifecycle_enhanced { "yes" } else { "no" },
            summary.path.display()
        );
    }
    Ok(())
}

impl ParameterArgs {
    fn to_parameters(&self) -> Result<BankingParameters> {
        Ok(BankingParameters {
            net_worth: pick(&NetWorth::ALL, &self.net_worth, NetWorth::as_str, "net worth")?,
            disposable_income: pick(
                &DisposableIncome::ALL,
                &self.disposable_income,
                DisposableIncome::as_str,
                "disposable income",
            )?,
            major_expenses_planned: self.major_expenses,
            tenure: pick(&Tenure::ALL, &self.tenure, Tenure::as_str, "tenure")?,
            financial_experience: pick(
                &FinancialExperience::ALL,
                &self.experience,
                FinancialExperience::as_str,
                "financial experience",
            )?,
        })
    }
}

impl FilterArgs {
    fn to_filter(&self) -> Result<DemographicFilter> {
        let age_band = match &self.age_band {
            Some(label) => Some(AgeBand::parse(label).with_context(|| format!("Unknown age band: {}", label))?),
            None => None,
        };
        let income_band = match &self.income_band {
            Some(label) => {
                Some(IncomeBand::parse(label).with_context(|| format!("Unknown income band: {}", label))?)
            }
            None => None,
        };
        let gender = match self.gender.as_deref().map(str::to_lowercase).as_deref() {
            Some("male") | Some("m") => Some(GenderFilter::Male),
            Some("female") | Some("w") | Some("f") => Some(GenderFilter::Female),
            Some(other) => bail!("Unknown gender: {}", other),
            None => None,
        };

        Ok(DemographicFilter {
            age_band,
            gender,
            canton: self.canton.clone(),
            language_region: self.language_region.clone(),
            income_band,
            education: self.education.clone(),
            employed: self.employed,
            has_children: self.has_children,
        })
    }
}

/// Match a CLI label against an enum's labels, ignoring spaces
fn pick<T: Copy>(options: &[T], label: &str, as_str: fn(&T) -> &'static str, what: &str) -> Result<T> {
    let wanted = label.replace(' ', "");
    options
        .iter()
        .find(|option| as_str(option).replace(' ', "") == wanted)
        .copied()
        .with_context(|| format!("Unknown {}: {}", what, label))
}

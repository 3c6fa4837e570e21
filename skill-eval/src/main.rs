//! skill-eval - evaluate generated code against skill acceptance criteria
//!
//! ## Usage
//!
//! ```bash
//! # Single pass over every scenario, using each scenario's mock response
//! skill-eval run azure-cosmos-py --mock
//!
//! # Feedback loop with overrides, Markdown report
//! skill-eval run azure-cosmos-py --mock --ralph --max-iterations 3 --threshold 90 --format markdown
//!
//! # One-shot evaluation of a file
//! skill-eval evaluate azure-cosmos-py generated.py
//! ```
//!
//! Exit status: 0 when every scenario passed, 1 otherwise, 2 on configuration errors.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use skill_eval::report::{evaluation_to_markdown, format_evaluation_console};
use skill_eval::{
    CriteriaLoader, EvalError, HarnessConfig, MockGenerator, Result, ScenarioFilter, ScenarioSet,
    SkillRunner, build_feedback, evaluate_file,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

/// Evaluate generated code against skill acceptance criteria
#[derive(Parser, Debug)]
#[command(name = "skill-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Repository root holding `.github/skills` and `tests/scenarios`
    /// (overrides SKILL_EVAL_BASE_PATH)
    #[arg(short = 'b', long, global = true)]
    base_path: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a skill's scenarios
    Run {
        /// Skill name (e.g. azure-cosmos-py)
        skill: String,
        /// Only scenarios whose name contains this value
        #[arg(long)]
        scenario: Option<String>,
        /// Only scenarios with this tag
        #[arg(long)]
        tag: Option<String>,
        /// Use each scenario's mock response instead of a live generator
        #[arg(long)]
        mock: bool,
        /// Iterate with feedback instead of a single pass
        #[arg(long)]
        ralph: bool,
        /// Maximum iterations per scenario (with --ralph)
        #[arg(long)]
        max_iterations: Option<usize>,
        /// Quality threshold (0-100)
        #[arg(long)]
        threshold: Option<f64>,
        /// Minimum improvement between iterations
        #[arg(long)]
        improvement: Option<f64>,
        /// Do not append feedback to the next prompt
        #[arg(long)]
        no_feedback: bool,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Scenarios run at the same time
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Evaluate one code file
    Evaluate {
        skill: String,
        code_file: PathBuf,
        #[arg(long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List skills that have acceptance criteria
    List,
    /// Show the parsed acceptance criteria of a skill
    Show { skill: String },
}

fn init_telemetry(log_level: &str, verbose: u8) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = match verbose {
        0 => log_level,
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn is_configuration_error(err: &EvalError) -> bool {
    matches!(
        err,
        EvalError::Configuration(_)
            | EvalError::ConfigValidation(_)
            | EvalError::CriteriaNotFound { .. }
            | EvalError::Criteria(_)
            | EvalError::Scenario(_)
    )
}

fn emit(content: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, content)?;
            eprintln!("{} {}", "Report written to".green(), path.display());
        }
        None => println!("{}", content),
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn run_scenarios(
    mut config: HarnessConfig,
    skill: &str,
    filter: ScenarioFilter,
    mock: bool,
    ralph: bool,
    max_iterations: Option<usize>,
    threshold: Option<f64>,
    improvement: Option<f64>,
    no_feedback: bool,
    format: OutputFormat,
    output: Option<&Path>,
    concurrency: Option<usize>,
) -> Result<bool> {
    if !mock {
        return Err(EvalError::config(
            "no live code generator is bundled; pass --mock or embed skill_eval with your own CodeGenerator",
        ));
    }

    if ralph {
        if let Some(n) = max_iterations {
            config.loop_config.max_iterations = n;
        }
    } else {
        if max_iterations.is_some() {
            warn!("--max-iterations has no effect without --ralph");
        }
        config.loop_config.max_iterations = 1;
    }
    if let Some(t) = threshold {
        config.loop_config.quality_threshold = t;
    }
    if let Some(i) = improvement {
        config.loop_config.improvement_threshold = i;
    }
    if no_feedback {
        config.loop_config.include_feedback = false;
    }
    if let Some(c) = concurrency {
        config.concurrency = c;
    }

    let scenarios = ScenarioSet::load_for_skill(&config.base_path, skill)?;
    if scenarios.filter(&filter).is_empty() {
        return Err(EvalError::scenario(format!("no scenarios of '{}' match the filter", skill)));
    }

    let generator = Arc::new(MockGenerator::from_scenarios(&scenarios.scenarios));
    let runner = SkillRunner::from_config(&config, skill, generator)?
        .with_generation_config(&scenarios.config);

    info!(skill = %skill, ralph = ralph, "Starting scenario run");
    let report = runner.run(&scenarios, &filter).await;

    let rendered = match format {
        OutputFormat::Text => {
            if output.is_some() {
                colored::control::set_override(false);
            }
            report.format_console()
        }
        OutputFormat::Json => report.to_json()?,
        OutputFormat::Markdown => report.to_markdown(),
    };
    emit(&rendered, output)?;

    Ok(report.all_passed())
}

fn evaluate(
    config: &HarnessConfig,
    skill: &str,
    code_file: &Path,
    format: OutputFormat,
) -> Result<bool> {
    let result = evaluate_file(&config.base_path, skill, code_file)?;
    let rendered = match format {
        OutputFormat::Text => {
            let feedback = build_feedback(&result, None);
            if feedback.is_empty() {
                format_evaluation_console(&result)
            } else {
                format!("{}\n{}", format_evaluation_console(&result), feedback)
            }
        }
        OutputFormat::Json => serde_json::to_string_pretty(&result)?,
        OutputFormat::Markdown => evaluation_to_markdown(&result),
    };
    emit(&rendered, None)?;
    Ok(result.passed)
}

fn list(config: &HarnessConfig) -> Result<bool> {
    let skills = CriteriaLoader::new(&config.base_path).list_skills();
    if skills.is_empty() {
        println!("{}", "No skills with acceptance criteria found".yellow());
        return Ok(true);
    }
    println!("{}", "Skills:".yellow().bold());
    for skill in skills {
        println!("  {} {}", "•".bright_black(), skill);
    }
    Ok(true)
}

fn show(config: &HarnessConfig, skill: &str) -> Result<bool> {
    let criteria = CriteriaLoader::new(&config.base_path).load(skill)?;

    println!("{} {}", "Skill:".yellow().bold(), criteria.skill_name.cyan());
    println!("  Language:  {}", criteria.language);
    if let Some(path) = &criteria.source_path {
        println!("  Source:    {}", path.display());
    }
    println!(
        "  Patterns:  {} correct, {} incorrect",
        criteria.correct_patterns.len(),
        criteria.incorrect_patterns.len()
    );
    println!();
    println!("{}", "Rules:".yellow().bold());
    for rule in &criteria.rules {
        println!(
            "  {} {} ({} correct, {} incorrect, {} required imports)",
            "─".bright_black(),
            rule.name,
            rule.correct_patterns.len().to_string().green(),
            rule.incorrect_patterns.len().to_string().red(),
            rule.required_imports.len()
        );
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine; environment variables and defaults apply.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Configuration Error".red().bold(), e);
            if let Some(suggestion) = &e.suggestion {
                eprintln!("  {}", suggestion.yellow());
            }
            return ExitCode::from(2);
        }
    };
    if let Some(path) = &cli.base_path {
        config.base_path = path.clone();
    }

    init_telemetry(&config.log_level, cli.verbose);

    let outcome = match cli.command {
        Commands::Run {
            skill,
            scenario,
            tag,
            mock,
            ralph,
            max_iterations,
            threshold,
            improvement,
            no_feedback,
            format,
            output,
            concurrency,
        } => {
            let filter = ScenarioFilter { name: scenario, tag };
            run_scenarios(
                config,
                &skill,
                filter,
                mock,
                ralph,
                max_iterations,
                threshold,
                improvement,
                no_feedback,
                format,
                output.as_deref(),
                concurrency,
            )
            .await
        }
        Commands::Evaluate { skill, code_file, format } => {
            evaluate(&config, &skill, &code_file, format)
        }
        Commands::List => list(&config),
        Commands::Show { skill } => show(&config, &skill),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            if is_configuration_error(&e) { ExitCode::from(2) } else { ExitCode::from(1) }
        }
    }
}

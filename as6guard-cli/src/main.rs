//! as6guard CLI - Automation Studio 4 to 6 migration analysis from the
//! command line.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process;

use as6guard::{
    load_builtin_rules, AnalyzeOptions, As6GuardCore, KnowledgeBase, Report, RewriteOptions,
    RewriteOutcome, RewriteResult, RuleKind, Severity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "as6guard")]
#[command(about = "Analyze and rewrite AS4 projects for the AS6 migration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Load rule data from these JSON files instead of the embedded set
    #[arg(long, global = true, value_name = "FILE")]
    rule_file: Vec<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a project tree and report deprecated constructs
    Analyze {
        /// Path to the project root (the directory holding the .apj file)
        #[arg(value_name = "DIR", default_value = ".")]
        project: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,

        /// Exit with code 1 if findings exist at this severity or higher
        #[arg(long, value_enum, default_value = "error")]
        fail_on: FailOnSeverity,

        /// Include info-level findings
        #[arg(short, long)]
        verbose: bool,

        /// Do not write the result file into the project root
        #[arg(long)]
        no_file: bool,

        /// Write the result file to this path instead of the project root
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Rewrite renamed constructs in place
    Rewrite {
        /// Path to the project root (the directory holding the .apj file)
        #[arg(value_name = "DIR", default_value = ".")]
        project: PathBuf,

        /// Rule categories to execute (comma separated)
        #[arg(long, value_delimiter = ',', default_value = "all")]
        rules: Vec<RuleSelection>,

        /// Compute and report everything, write nothing
        #[arg(long)]
        dry_run: bool,

        /// Keep the original of each rewritten file as <name>.bak
        #[arg(long)]
        backup: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List the loaded deprecation rules
    Rules {
        /// Show replacement hints
        #[arg(short, long)]
        verbose: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for CI/CD
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum FailOnSeverity {
    Error,
    Warning,
    Info,
}

impl FailOnSeverity {
    fn severity(self) -> Severity {
        match self {
            FailOnSeverity::Error => Severity::Error,
            FailOnSeverity::Warning => Severity::Warning,
            FailOnSeverity::Info => Severity::Info,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RuleSelection {
    /// Math and string functions plus their constants
    Functions,
    /// OPC UA client function blocks, types and enumerators
    Opcua,
    /// mapp Motion function blocks, types and enumerators
    Motion,
    /// Everything above
    All,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let kb = match load_rules(&cli.rule_file) {
        Ok(kb) => kb,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    };

    let exit_code = match cli.command {
        Commands::Analyze {
            project,
            format,
            fail_on,
            verbose,
            no_file,
            output,
        } => handle_analyze(&project, &kb, format, fail_on, verbose, no_file, output),
        Commands::Rewrite {
            project,
            rules,
            dry_run,
            backup,
            format,
        } => handle_rewrite(&project, &kb, &rules, dry_run, backup, format),
        Commands::Rules { verbose } => {
            handle_rules(&kb, verbose);
            0
        }
    };

    process::exit(exit_code);
}

fn load_rules(paths: &[PathBuf]) -> Result<KnowledgeBase, as6guard::KnowledgeBaseError> {
    if paths.is_empty() {
        load_builtin_rules()
    } else {
        KnowledgeBase::from_paths(paths)
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_analyze(
    project: &PathBuf,
    kb: &KnowledgeBase,
    format: OutputFormat,
    fail_on: FailOnSeverity,
    verbose: bool,
    no_file: bool,
    output: Option<PathBuf>,
) -> i32 {
    let options = AnalyzeOptions {
        verbose,
        emit_file: !no_file,
        output,
        cancel: None,
    };

    match As6GuardCore::new().analyze(project, kb, &options) {
        Ok(report) => {
            output_report(&report, &format);
            if report.counts.at_least(fail_on.severity()) > 0 {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

fn handle_rewrite(
    project: &PathBuf,
    kb: &KnowledgeBase,
    rules: &[RuleSelection],
    dry_run: bool,
    backup: bool,
    format: OutputFormat,
) -> i32 {
    let options = RewriteOptions {
        kinds: selected_kinds(rules),
        dry_run,
        backup,
        cancel: None,
    };

    match As6GuardCore::new().rewrite(project, kb, &options) {
        Ok(results) => {
            output_rewrite(&results, dry_run, &format);
            if results
                .iter()
                .any(|r| matches!(r.outcome, RewriteOutcome::Failed(_)))
            {
                1
            } else {
                0
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            2
        }
    }
}

fn selected_kinds(rules: &[RuleSelection]) -> Vec<RuleKind> {
    let mut kinds = Vec::new();
    for selection in rules {
        match selection {
            RuleSelection::Functions => {
                kinds.push(RuleKind::Function);
                kinds.push(RuleKind::FunctionBlock);
            }
            RuleSelection::Opcua => kinds.push(RuleKind::OpcUaConstruct),
            RuleSelection::Motion => kinds.push(RuleKind::MotionConstruct),
            RuleSelection::All => {
                return vec![
                    RuleKind::Function,
                    RuleKind::FunctionBlock,
                    RuleKind::OpcUaConstruct,
                    RuleKind::MotionConstruct,
                ];
            }
        }
    }
    kinds.dedup();
    kinds
}

fn output_report(report: &Report, format: &OutputFormat) {
    match format {
        OutputFormat::Human => print!("{}", report.render_text()),
        OutputFormat::Json => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
    }
}

fn output_rewrite(results: &[RewriteResult], dry_run: bool, format: &OutputFormat) {
    match format {
        OutputFormat::Human => {
            let mut rewritten = 0usize;
            let mut failed = 0usize;
            for result in results {
                match &result.outcome {
                    RewriteOutcome::Unchanged => {}
                    RewriteOutcome::Rewritten => {
                        rewritten += 1;
                        println!(
                            "{}: {} site(s){}",
                            result.path.display(),
                            result.applied.len(),
                            if dry_run { " (dry run)" } else { "" }
                        );
                        for applied in &result.applied {
                            println!(
                                "  line {}: {} -> {}",
                                applied.line, applied.original, applied.replacement
                            );
                        }
                    }
                    RewriteOutcome::Failed(reason) => {
                        failed += 1;
                        println!("{}: FAILED ({})", result.path.display(), reason);
                    }
                }
                for warning in &result.warnings {
                    println!("  warning: {}", warning);
                }
            }
            println!(
                "\n{} file(s) rewritten, {} failed, {} scanned",
                rewritten,
                failed,
                results.len()
            );
        }
        OutputFormat::Json => match serde_json::to_string_pretty(results) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error: {}", e),
        },
    }
}

fn handle_rules(kb: &KnowledgeBase, verbose: bool) {
    println!("Loaded ruleset {} ({} rules)\n", kb.version(), kb.len());

    let kinds = [
        RuleKind::Library,
        RuleKind::HardwareModule,
        RuleKind::FunctionBlock,
        RuleKind::Function,
        RuleKind::OpcUaConstruct,
        RuleKind::MotionConstruct,
        RuleKind::MappComponent,
    ];
    for kind in kinds {
        let rules: Vec<_> = kb.rules_of_kind(kind).collect();
        if rules.is_empty() {
            continue;
        }
        println!("{} ({})", kind, rules.len());
        for rule in rules {
            match &rule.replacement {
                Some(replacement) => {
                    println!("  {} -> {} [{}]", rule.identifier, replacement, rule.severity)
                }
                None => println!("  {} [{}]", rule.identifier, rule.severity),
            }
            if verbose {
                println!("    {}", rule.hint);
            }
        }
        println!();
    }
}

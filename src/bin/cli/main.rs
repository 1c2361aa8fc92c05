//! Binary entry point for the tagql command line compiler.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::error::Error;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use tagql::diagnostics::Diagnostic;
use tagql::grammar::QueryGrammar;
use tagql::lexical;
use tagql::semantic::{self, DialectKind, QueryPlan};
use tagql::translator::memory::{BuildCall, Catalog, InMemoryQueryer, RecordingBuilder};
use tagql::translator::{ElementValue, ExecuteBuilder, VisualForecast, VisualQueryPlan};
use tagql::{CompilerOptions, QueryCompiler};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use config::{CliConfig, Overrides};
use ui::{Theme, Ui};

#[derive(Parser, Debug)]
#[command(
    name = "tagql",
    version,
    about = "Compile, inspect and complete tag queries",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "PATH",
        env = "TAGQL_CONFIG",
        help = "Config file (defaults to <config dir>/tagql/config.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, value_enum, help = "Keyword dialect")]
    dialect: Option<DialectArg>,

    #[arg(long, global = true, help = "Read `_` in bare strings as a space")]
    underscore_space: bool,

    #[arg(long, global = true, help = "Accept full-width punctuation")]
    reflect_fullwidth: bool,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = ThemeArg::Auto,
        help = "Color theme for text output"
    )]
    theme: ThemeArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print the tokens of a query")]
    Lex {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    #[command(about = "Print the syntax tree of a query")]
    Parse {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    #[command(about = "Print the validated query plan")]
    Plan {
        #[arg(value_name = "QUERY")]
        query: String,
    },

    #[command(about = "Compile a query against a catalog")]
    Compile {
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(long, value_name = "FILE", help = "JSON catalog of tags, topics, authors and source tags")]
        catalog: Option<PathBuf>,
    },

    #[command(about = "Suggest completions at a cursor position")]
    Forecast {
        #[arg(value_name = "QUERY")]
        query: String,

        #[arg(long, value_name = "N", help = "Character offset (defaults to the end)")]
        cursor: Option<usize>,

        #[arg(long, value_name = "FILE", help = "JSON catalog of tags, topics, authors and source tags")]
        catalog: Option<PathBuf>,
    },

    #[command(about = "Print the built-in SLR table")]
    Table,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum DialectArg {
    Illust,
    Meta,
}

impl From<DialectArg> for DialectKind {
    fn from(dialect: DialectArg) -> Self {
        match dialect {
            DialectArg::Illust => DialectKind::Illust,
            DialectArg::Meta => DialectKind::Meta,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum ThemeArg {
    Auto,
    Light,
    Dark,
    Plain,
}

impl From<ThemeArg> for Theme {
    fn from(theme: ThemeArg) -> Self {
        match theme {
            ThemeArg::Auto => Theme::Auto,
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Plain => Theme::Plain,
        }
    }
}

/// Whether the query compiled cleanly.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Outcome {
    Clean,
    QueryErrors,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let ui = Ui::new(cli.theme.into());
    match run(&cli, &ui) {
        Ok(Outcome::Clean) => ExitCode::SUCCESS,
        Ok(Outcome::QueryErrors) => ExitCode::from(2),
        Err(err) => {
            ui.failure(&err.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("TAGQL_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();
}

fn run(cli: &Cli, ui: &Ui) -> Result<Outcome, Box<dyn Error>> {
    let mut config = CliConfig::load(cli.config.clone())?;
    if let Some(path) = config.path() {
        debug!(path = %path.display(), "loaded config");
    }
    config.apply(Overrides {
        dialect: cli.dialect.map(Into::into),
        underscore_space: cli.underscore_space,
        reflect_fullwidth: cli.reflect_fullwidth,
    });
    let options = config.options();

    match &cli.command {
        Command::Lex { query } => run_lex(cli.format, ui, options, query),
        Command::Parse { query } => run_parse(cli.format, ui, options, query),
        Command::Plan { query } => run_plan(cli.format, ui, options, query),
        Command::Compile { query, catalog } => {
            run_compile(cli.format, ui, options, query, catalog.as_ref())
        }
        Command::Forecast {
            query,
            cursor,
            catalog,
        } => run_forecast(cli.format, ui, options, query, *cursor, catalog.as_ref()),
        Command::Table => run_table(cli.format),
    }
}

fn outcome(diagnostics: &[Diagnostic]) -> Outcome {
    if diagnostics
        .iter()
        .any(|d| d.severity == tagql::Severity::Error)
    {
        Outcome::QueryErrors
    } else {
        Outcome::Clean
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: serde::Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn load_catalog(path: Option<&PathBuf>) -> Result<InMemoryQueryer, Box<dyn Error>> {
    let catalog = match path {
        Some(path) => Catalog::load(path)?,
        None => Catalog::default(),
    };
    Ok(InMemoryQueryer::new(catalog))
}

fn run_lex(
    format: OutputFormat,
    ui: &Ui,
    options: &CompilerOptions,
    query: &str,
) -> Result<Outcome, Box<dyn Error>> {
    let scanned = lexical::analyze(query, &options.lexical);
    let diagnostics = scanned.diagnostics();
    let tokens = scanned.result.unwrap_or_default();
    let value = json!({ "tokens": tokens, "diagnostics": diagnostics });
    emit(format, &value, || {
        ui.list(
            "Tokens",
            tokens.iter().map(|item| {
                let notation = item.token.notation().unwrap_or("space");
                format!("{:<8} {:<4} {}", item.span.to_string(), notation, item.token.render())
            }),
        );
        ui.diagnostics(&diagnostics);
    })?;
    Ok(outcome(&diagnostics))
}

fn run_parse(
    format: OutputFormat,
    ui: &Ui,
    options: &CompilerOptions,
    query: &str,
) -> Result<Outcome, Box<dyn Error>> {
    let scanned = lexical::analyze(query, &options.lexical);
    let mut diagnostics = scanned.diagnostics();
    let tokens = scanned.result.unwrap_or_default();
    let parsed = QueryGrammar::shared()?.parse(&tokens);
    diagnostics.extend(parsed.diagnostics());
    let value = json!({ "tree": parsed.result, "diagnostics": diagnostics });
    emit(format, &value, || {
        match &parsed.result {
            Some(root) => println!("{root:#?}"),
            None if diagnostics.is_empty() => ui.info("empty query"),
            None => {}
        }
        ui.diagnostics(&diagnostics);
    })?;
    Ok(outcome(&diagnostics))
}

fn run_plan(
    format: OutputFormat,
    ui: &Ui,
    options: &CompilerOptions,
    query: &str,
) -> Result<Outcome, Box<dyn Error>> {
    let scanned = lexical::analyze(query, &options.lexical);
    let mut diagnostics = scanned.diagnostics();
    let tokens = scanned.result.unwrap_or_default();
    let parsed = QueryGrammar::shared()?.parse(&tokens);
    diagnostics.extend(parsed.diagnostics());

    let plan = match (&parsed.result, parsed.has_errors()) {
        (Some(root), false) => {
            let analyzed = semantic::analyze(root, options.dialect);
            diagnostics.extend(analyzed.diagnostics());
            analyzed.result
        }
        (None, false) => Some(QueryPlan::default()),
        (_, true) => None,
    };

    let value = json!({ "plan": plan, "diagnostics": diagnostics });
    emit(format, &value, || {
        if let Some(plan) = &plan {
            print_plan_text(ui, plan);
        }
        ui.diagnostics(&diagnostics);
    })?;
    Ok(outcome(&diagnostics))
}

fn print_plan_text(ui: &Ui, plan: &QueryPlan) {
    if plan.is_empty() {
        ui.info("empty plan");
        return;
    }
    ui.list("Sorts", plan.sorts.iter().map(ToString::to_string));
    ui.list(
        "Filters",
        plan.filters.iter().map(|union| {
            let filters = union
                .filters
                .iter()
                .map(|f| serde_json::to_string(f).unwrap_or_else(|_| f.field().to_owned()))
                .collect::<Vec<_>>()
                .join(" | ");
            if union.exclude {
                format!("not {filters}")
            } else {
                filters
            }
        }),
    );
    ui.list(
        "Elements",
        plan.elements
            .iter()
            .map(|element| format!("{} {}", element.type_name(), element.render())),
    );
}

fn run_compile(
    format: OutputFormat,
    ui: &Ui,
    options: &CompilerOptions,
    query: &str,
    catalog: Option<&PathBuf>,
) -> Result<Outcome, Box<dyn Error>> {
    let queryer = load_catalog(catalog)?;
    let compiler = QueryCompiler::new(options.clone())?;
    let mut builder = RecordingBuilder::default();
    let schema = compiler.compile(query, &queryer, &mut builder)?;
    let calls = builder.build();

    let value = json!({ "schema": schema, "calls": calls });
    emit(format, &value, || {
        if let Some(plan) = &schema.plan {
            print_visual_text(ui, plan);
            ui.list("Builder calls", calls.iter().map(describe_call));
        }
        ui.diagnostics(&schema.warnings);
        ui.diagnostics(&schema.errors);
    })?;
    Ok(if schema.has_errors() {
        Outcome::QueryErrors
    } else {
        Outcome::Clean
    })
}

fn print_visual_text(ui: &Ui, plan: &VisualQueryPlan) {
    if plan.sorts.is_empty() && plan.elements.is_empty() && plan.filters.is_empty() {
        ui.info("empty plan");
        return;
    }
    ui.list("Sorts", plan.sorts.iter().cloned());
    for element in &plan.elements {
        ui.list(
            element.element_type,
            element.intersect_items.iter().map(|item| {
                let names = item
                    .union_items
                    .iter()
                    .map(|value| match value {
                        ElementValue::String(s) => s.value.clone(),
                        ElementValue::Tag(t) => format!("tag {}#{}", t.name, t.id),
                        ElementValue::Topic(t) => format!("topic {}#{}", t.name, t.id),
                        ElementValue::Author(a) => format!("author {}#{}", a.name, a.id),
                        ElementValue::SourceTag(s) => format!("{}.{}#{}", s.site, s.name, s.id),
                    })
                    .collect::<Vec<_>>();
                let sign = if item.exclude { "-" } else { "" };
                if names.is_empty() {
                    format!("{sign}(nothing)")
                } else {
                    format!("{sign}{}", names.join(" | "))
                }
            }),
        );
    }
    ui.list(
        "Filters",
        plan.filters.iter().map(|item| {
            let fields = item
                .fields
                .iter()
                .map(|field| field.name)
                .collect::<Vec<_>>()
                .join(" | ");
            if item.exclude {
                format!("-{fields}")
            } else {
                fields
            }
        }),
    );
}

fn describe_call(call: &BuildCall) -> String {
    serde_json::to_string(call).unwrap_or_else(|_| format!("{call:?}"))
}

fn run_forecast(
    format: OutputFormat,
    ui: &Ui,
    options: &CompilerOptions,
    query: &str,
    cursor: Option<usize>,
    catalog: Option<&PathBuf>,
) -> Result<Outcome, Box<dyn Error>> {
    let queryer = load_catalog(catalog)?;
    let compiler = QueryCompiler::new(options.clone())?;
    let forecast: Option<VisualForecast> = compiler.forecast(query, cursor, &queryer);
    emit(format, &forecast, || match &forecast {
        Some(forecast) => {
            ui.section(
                "Forecast",
                [
                    ("kind", forecast.kind.to_owned()),
                    ("partial", forecast.partial.clone()),
                    ("span", forecast.span.to_string()),
                ],
            );
            ui.list(
                "Suggestions",
                forecast.suggestions.iter().map(|s| {
                    let mut line = s.name.clone();
                    if let Some(context) = &s.context {
                        line.push_str(&format!(" ({context})"));
                    }
                    if !s.aliases.is_empty() {
                        line.push_str(&format!(" [{}]", s.aliases.join(", ")));
                    }
                    line
                }),
            );
        }
        None => ui.info("nothing to suggest"),
    })?;
    Ok(Outcome::Clean)
}

fn run_table(format: OutputFormat) -> Result<Outcome, Box<dyn Error>> {
    let grammar = QueryGrammar::shared()?;
    let table = grammar.table();
    match format {
        OutputFormat::Text => print!("{table}"),
        OutputFormat::Json => {
            let conflicts: Vec<_> = table
                .conflicts()
                .iter()
                .map(|c| {
                    json!({
                        "state": c.state,
                        "lookahead": c.lookahead,
                        "kept": c.kept.to_string(),
                        "discarded": c.discarded.to_string(),
                    })
                })
                .collect();
            let value = json!({
                "states": table.state_count(),
                "terminals": table.terminals(),
                "non_terminals": table.non_terminals(),
                "conflicts": conflicts,
                "table": table.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
    }
    Ok(Outcome::Clean)
}

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use medico_contracts::events::{EventPayload, SessionLog};
use medico_contracts::forms::{answers_from_json, render_widgets, AnswerMap, RawValue, Widget};
use medico_contracts::panels::{find_panel, panel_ids, PanelSpec, PANELS};
use medico_contracts::schema::FeatureSchema;
use medico_engine::{predict_panel, LoadFailure, ModelRegistry, Verdict};
use serde_json::{json, Map, Value};

#[derive(Debug, Parser)]
#[command(name = "medico", version, about = "Medico diagnosis system")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List diagnosis panels with feature counts and model status.
    Panels(PanelsArgs),
    /// Fill in one panel's form interactively and print the verdict.
    Form(FormArgs),
    /// Run one prediction from a JSON object of submitted values.
    Predict(PredictArgs),
}

#[derive(Debug, Parser)]
struct PanelsArgs {
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,
}

#[derive(Debug, Parser)]
struct FormArgs {
    #[arg(long)]
    panel: String,
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

#[derive(Debug, Parser)]
struct PredictArgs {
    #[arg(long)]
    panel: String,
    /// JSON object of feature values, e.g. '{"age": 50, "sex": "Female"}'.
    #[arg(long)]
    values: Option<String>,
    /// Path to a JSON file holding the same object.
    #[arg(long)]
    values_file: Option<PathBuf>,
    #[arg(long, default_value = "config")]
    config_dir: PathBuf,
    #[arg(long, default_value = "models")]
    models_dir: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("medico error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Panels(args) => run_panels(args),
        Command::Form(args) => run_form(args),
        Command::Predict(args) => run_predict(args),
    }
}

fn run_panels(args: PanelsArgs) -> Result<i32> {
    let (registry, failures) = ModelRegistry::load(&args.models_dir, PANELS);
    for panel in PANELS {
        let features = match FeatureSchema::load(args.config_dir.join(panel.schema_file)) {
            Ok(schema) => format!("{} features", schema.len()),
            Err(err) => format!("schema unavailable ({err:#})"),
        };
        let status = match registry.get(panel.id) {
            Some(model) => format!("model loaded ({})", &model.digest[..8]),
            None => failures
                .iter()
                .find(|failure| failure.panel_id == panel.id)
                .map(|failure| format!("model missing: {}", failure.message))
                .unwrap_or_else(|| "model missing".to_string()),
        };
        println!("{:<12} {:<28} {:<14} {}", panel.id, panel.title, features, status);
    }
    Ok(0)
}

fn run_form(args: FormArgs) -> Result<i32> {
    let panel = resolve_panel(&args.panel)?;
    let log = args.events.as_ref().map(SessionLog::new);

    // Schema failures are fatal to the panel; model failures are not.
    let schema = FeatureSchema::load(args.config_dir.join(panel.schema_file))?;
    let (registry, failures) = ModelRegistry::load(&args.models_dir, PANELS);
    report_startup(&registry, &failures, log.as_ref())?;

    println!("{}", panel.title);

    let widgets = render_widgets(&schema);
    let stdin = io::stdin();
    let mut line = String::new();
    let mut answers = AnswerMap::new();
    for widget in &widgets {
        let value = prompt_widget(widget, &stdin, &mut line)?;
        answers.insert(widget.name().to_string(), value);
    }

    match predict_panel(registry.classifier(panel.id), &schema, &answers) {
        Ok(verdict) => {
            emit_prediction(log.as_ref(), panel, &answers, verdict)?;
            println!("{}", panel.verdict(verdict.is_positive()));
        }
        Err(err) => {
            emit_failure(log.as_ref(), panel, &err)?;
            eprintln!("Error in prediction: {err:#}");
        }
    }
    Ok(0)
}

fn run_predict(args: PredictArgs) -> Result<i32> {
    let panel = resolve_panel(&args.panel)?;
    let values = read_values(&args)?;
    let log = args.events.as_ref().map(SessionLog::new);

    let schema = FeatureSchema::load(args.config_dir.join(panel.schema_file))?;
    let (registry, failures) = ModelRegistry::load(&args.models_dir, PANELS);
    report_startup(&registry, &failures, log.as_ref())?;

    let widgets = render_widgets(&schema);
    let answers = match answers_from_json(&widgets, &values) {
        Ok(answers) => answers,
        Err(err) => {
            emit_failure(log.as_ref(), panel, &err)?;
            eprintln!("Error in prediction: {err:#}");
            return Ok(1);
        }
    };

    match predict_panel(registry.classifier(panel.id), &schema, &answers) {
        Ok(verdict) => {
            emit_prediction(log.as_ref(), panel, &answers, verdict)?;
            println!("{}", panel.verdict(verdict.is_positive()));
            Ok(0)
        }
        Err(err) => {
            emit_failure(log.as_ref(), panel, &err)?;
            eprintln!("Error in prediction: {err:#}");
            Ok(1)
        }
    }
}

fn resolve_panel(id: &str) -> Result<&'static PanelSpec> {
    match find_panel(id) {
        Some(panel) => Ok(panel),
        None => bail!("unknown panel '{}'; available: {}", id, panel_ids().join(", ")),
    }
}

fn read_values(args: &PredictArgs) -> Result<Map<String, Value>> {
    let raw = match (&args.values, &args.values_file) {
        (Some(_), Some(_)) => bail!("pass either --values or --values-file, not both"),
        (Some(text), None) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read values file {}", path.display()))?,
        (None, None) => bail!("one of --values or --values-file is required"),
    };
    let parsed: Value = serde_json::from_str(&raw).context("failed to parse values as JSON")?;
    match parsed {
        Value::Object(map) => Ok(map),
        other => bail!("values must be a JSON object, got {other}"),
    }
}

fn prompt_widget(widget: &Widget, stdin: &io::Stdin, line: &mut String) -> Result<RawValue> {
    println!();
    println!("{}", widget.label());
    if !widget.help().is_empty() {
        println!("  {}", widget.help());
    }
    if let Widget::SelectBox { options, .. } = widget {
        for (index, option) in options.iter().enumerate() {
            println!("  {}) {}", index + 1, option);
        }
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = stdin.read_line(line)?;
        if read == 0 {
            // Input closed: keep the widget default, like an untouched form.
            return Ok(widget.default_value());
        }
        let input = line.trim_end_matches(['\n', '\r']);
        match widget.parse_response(input) {
            Ok(value) => return Ok(value),
            Err(err) => println!("{err:#}"),
        }
    }
}

fn report_startup(
    registry: &ModelRegistry,
    failures: &[LoadFailure],
    log: Option<&SessionLog>,
) -> Result<()> {
    for model in registry.models() {
        emit_event(
            log,
            "model_loaded",
            json_object(json!({
                "panel": model.panel_id,
                "path": model.path.to_string_lossy().to_string(),
                "digest": model.digest,
            })),
        )?;
    }
    for failure in failures {
        eprintln!("Model file not found or unreadable for '{}': {}", failure.panel_id, failure.message);
        emit_event(
            log,
            "model_load_failed",
            json_object(json!({
                "panel": failure.panel_id,
                "path": failure.path.to_string_lossy().to_string(),
                "message": failure.message,
            })),
        )?;
    }
    Ok(())
}

fn emit_prediction(
    log: Option<&SessionLog>,
    panel: &PanelSpec,
    answers: &AnswerMap,
    verdict: Verdict,
) -> Result<()> {
    emit_event(
        log,
        "prediction",
        json_object(json!({
            "panel": panel.id,
            "inputs": answers_json(answers),
            "label": verdict.label(),
        })),
    )
}

fn emit_failure(log: Option<&SessionLog>, panel: &PanelSpec, err: &anyhow::Error) -> Result<()> {
    emit_event(
        log,
        "prediction_failed",
        json_object(json!({
            "panel": panel.id,
            "message": format!("{err:#}"),
        })),
    )
}

fn emit_event(log: Option<&SessionLog>, event_type: &str, payload: EventPayload) -> Result<()> {
    if let Some(log) = log {
        log.emit(event_type, payload)?;
    }
    Ok(())
}

fn answers_json(answers: &AnswerMap) -> Value {
    let mut map = Map::new();
    for (name, value) in answers {
        let entry = match value {
            RawValue::Number(number) => json!(number),
            RawValue::Choice(index) => json!(index),
        };
        map.insert(name.clone(), entry);
    }
    Value::Object(map)
}

fn json_object(value: Value) -> EventPayload {
    value.as_object().cloned().unwrap_or_default()
}

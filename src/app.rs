use crate::cli::{Cli, Commands, FormatArg, OutputFormat};
use crate::errors::ExportError;
use crate::model::{EntityId, System};
use crate::tosca::{encode, export_system, DocumentFormat, ExportContext, ExportOptions, ServiceTemplate};
use crate::utils::config::{self, Config};
use crate::utils::{model_walker, table};
use clap::CommandFactory;
use clap_complete::generate;
use rayon::prelude::*;
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_USAGE: i32 = 2;

/// Run the CLI logic in-process.
///
/// Returns an exit code: 0 success, 1 failure, 2 usage error.
#[must_use]
pub fn run_cli(cli: Cli) -> i32 {
    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut io::stdout());
            EXIT_OK
        }
        Commands::Export {
            inputs,
            dir,
            no_ignore,
            output,
            out_dir,
            format,
            config,
            author,
            template_version,
        } => {
            let mut inputs = inputs;
            if let Some(d) = dir.as_ref() {
                let found = model_walker::model_files(d, no_ignore);
                tracing::debug!(dir = %d.display(), count = found.len(), "discovered model files");
                inputs.extend(found);
            }
            if inputs.is_empty() {
                eprintln!("No model files to export (pass INPUT paths or --dir)");
                return EXIT_USAGE;
            }
            if inputs.len() > 1 && out_dir.is_none() {
                eprintln!("Exporting {} models requires --out-dir", inputs.len());
                return EXIT_USAGE;
            }

            let cfg = match resolve_config(config.as_deref(), dir.as_deref().or_else(|| inputs[0].parent())) {
                Ok(c) => c,
                Err(msg) => {
                    eprintln!("{msg}");
                    return EXIT_FAILURE;
                }
            };
            let options = export_options(&cfg, author, template_version);
            let fmt = document_format(format, &cfg);

            match (output, out_dir) {
                (_, Some(out_dir)) => export_batch(&inputs, &out_dir, &options, fmt, cli.quiet),
                (Some(out), None) => match export_file(&inputs[0], &options, fmt) {
                    Ok(text) => write_output(&inputs[0], &out, &text, cli.quiet),
                    Err(e) => {
                        eprintln!("Export failed: {e}");
                        EXIT_FAILURE
                    }
                },
                (None, None) => match export_file(&inputs[0], &options, fmt) {
                    Ok(text) => {
                        print!("{text}");
                        EXIT_OK
                    }
                    Err(e) => {
                        eprintln!("Export failed: {e}");
                        EXIT_FAILURE
                    }
                },
            }
        }
        Commands::Check { input, format } => {
            let system = match System::load(&input) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Check failed: {e}");
                    return EXIT_FAILURE;
                }
            };
            let template = match export_system(&system, &ExportOptions::default()) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Check failed: {e}");
                    return EXIT_FAILURE;
                }
            };
            let counts = [
                ("components", system.components.len()),
                ("infrastructures", system.infrastructures.len()),
                ("data_aggregates", system.data_aggregates.len()),
                ("backing_data", system.backing_data.len()),
                ("links", system.links.len()),
                ("deployment_mappings", system.deployment_mappings.len()),
                ("request_traces", system.request_traces.len()),
                ("node_templates", template.topology_template.node_templates.len()),
                ("relationship_templates", template.topology_template.relationship_templates.len()),
            ];
            if matches!(format, OutputFormat::Json) {
                let mut obj = serde_json::Map::new();
                obj.insert("system".to_string(), json!(system.name));
                obj.insert("valid".to_string(), json!(true));
                for (k, v) in counts {
                    obj.insert(k.to_string(), json!(v));
                }
                print_json(&serde_json::Value::Object(obj))
            } else {
                let rows: Vec<Vec<String>> =
                    counts.iter().map(|(k, v)| vec![(*k).to_string(), v.to_string()]).collect();
                println!("{}", table::render(&["Entity", "Count"], &rows));
                if !cli.quiet {
                    println!("Model '{}' is valid", system.name);
                }
                EXIT_OK
            }
        }
        Commands::Inspect { input, format } => {
            let system = match System::load(&input) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Inspect failed: {e}");
                    return EXIT_FAILURE;
                }
            };
            let issued = export_system(&system, &ExportOptions::default()).and_then(|template| {
                let mut ctx = ExportContext::new(&system)?;
                ctx.allocate_keys()?;
                Ok((template, ctx))
            });
            let (template, ctx) = match issued {
                Ok(pair) => pair,
                Err(e) => {
                    eprintln!("Inspect failed: {e}");
                    return EXIT_FAILURE;
                }
            };
            if matches!(format, OutputFormat::Json) {
                print_json(&key_listing(&template, &ctx))
            } else {
                let rows = key_rows(&template, &ctx);
                println!("{}", table::render(&["Namespace", "Key", "Type", "Entity", "Name"], &rows));
                EXIT_OK
            }
        }
    }
}

/// Load, validate, export and encode one model file.
///
/// # Errors
/// Any model or export error; model errors are converted into `ExportError`.
pub fn export_file(
    input: &Path,
    options: &ExportOptions,
    format: DocumentFormat,
) -> Result<String, ExportError> {
    let system = System::load(input)?;
    let template = export_system(&system, options)?;
    encode(&template, format)
}

/// `--config` must load; otherwise a config next to the inputs is optional.
fn resolve_config(explicit: Option<&Path>, near: Option<&Path>) -> Result<Config, String> {
    if let Some(p) = explicit {
        return config::load_config_at(p).map_err(|e| format!("Failed to load config: {e}"));
    }
    Ok(near.and_then(config::load_config_near).unwrap_or_default())
}

/// CLI flags win over the config file.
#[must_use]
pub fn export_options(cfg: &Config, author: Option<String>, version: Option<String>) -> ExportOptions {
    let meta = cfg.metadata.clone().unwrap_or_default();
    ExportOptions {
        author: author.or(meta.author),
        version: version.or(meta.version),
        description: meta.description,
    }
}

#[must_use]
pub fn document_format(flag: Option<FormatArg>, cfg: &Config) -> DocumentFormat {
    if let Some(f) = flag {
        return f.into();
    }
    match cfg.output.as_ref().and_then(|o| o.format.as_deref()) {
        Some("json") => DocumentFormat::Json,
        Some("yaml" | "yml") | None => DocumentFormat::Yaml,
        Some(other) => {
            tracing::warn!(format = other, "unknown output format in config, using yaml");
            DocumentFormat::Yaml
        }
    }
}

/// `<out_dir>/<input stem>.tosca.<ext>`
#[must_use]
pub fn output_path(out_dir: &Path, input: &Path, format: DocumentFormat) -> PathBuf {
    let stem = input.file_stem().map_or_else(|| "model".into(), |s| s.to_string_lossy());
    out_dir.join(format!("{stem}.tosca.{}", format.extension()))
}

fn write_output(input: &Path, out: &Path, text: &str, quiet: bool) -> i32 {
    if let Err(e) = fs::write(out, text) {
        eprintln!("Failed to write output {}: {e}", out.display());
        return EXIT_FAILURE;
    }
    tracing::info!(input = %input.display(), output = %out.display(), "exported");
    if !quiet {
        println!("Exported {} -> {}", input.display(), out.display());
    }
    EXIT_OK
}

fn export_batch(
    inputs: &[PathBuf],
    out_dir: &Path,
    options: &ExportOptions,
    format: DocumentFormat,
    quiet: bool,
) -> i32 {
    let targets: Vec<PathBuf> = inputs.iter().map(|i| output_path(out_dir, i, format)).collect();
    let mut seen = HashSet::new();
    for (input, target) in inputs.iter().zip(&targets) {
        if !seen.insert(target) {
            eprintln!("Output collision: {} would overwrite {}", input.display(), target.display());
            return EXIT_USAGE;
        }
    }
    if let Err(e) = fs::create_dir_all(out_dir) {
        eprintln!("Failed to create output directory {}: {e}", out_dir.display());
        return EXIT_FAILURE;
    }

    // one export context per file; results are reported in input order
    let results: Vec<Result<String, ExportError>> =
        inputs.par_iter().map(|input| export_file(input, options, format)).collect();

    let mut code = EXIT_OK;
    for ((input, target), result) in inputs.iter().zip(&targets).zip(results) {
        match result {
            Ok(text) => {
                if write_output(input, target, &text, quiet) != EXIT_OK {
                    code = EXIT_FAILURE;
                }
            }
            Err(e) => {
                eprintln!("Export failed for {}: {e}", input.display());
                code = EXIT_FAILURE;
            }
        }
    }
    code
}

fn print_json(value: &serde_json::Value) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(s) => {
            println!("{s}");
            EXIT_OK
        }
        Err(e) => {
            eprintln!("JSON encode error: {e}");
            EXIT_FAILURE
        }
    }
}

fn entity_cell(id: Option<&EntityId>) -> String {
    id.map(ToString::to_string).unwrap_or_default()
}

fn key_listing(template: &ServiceTemplate, ctx: &ExportContext<'_>) -> serde_json::Value {
    let topo = &template.topology_template;
    let nodes: serde_json::Map<String, serde_json::Value> = topo
        .node_templates
        .iter()
        .map(|(k, n)| {
            (k.clone(), json!({ "type": n.node_type, "entity": entity_cell(ctx.node_entity(k)) }))
        })
        .collect();
    let rels: serde_json::Map<String, serde_json::Value> = topo
        .relationship_templates
        .iter()
        .map(|(k, r)| {
            (
                k.clone(),
                json!({ "type": r.relationship_type, "entity": entity_cell(ctx.relationship_entity(k)) }),
            )
        })
        .collect();
    json!({
        "template_name": template.metadata.template_name,
        "node_templates": nodes,
        "relationship_templates": rels,
    })
}

fn key_rows(template: &ServiceTemplate, ctx: &ExportContext<'_>) -> Vec<Vec<String>> {
    let topo = &template.topology_template;
    let nodes = topo.node_templates.iter().map(|(k, n)| {
        let name = n
            .metadata
            .as_ref()
            .and_then(|m| m.get("name"))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        vec![
            "node".to_string(),
            k.clone(),
            n.node_type.clone(),
            entity_cell(ctx.node_entity(k)),
            name.to_string(),
        ]
    });
    let rels = topo.relationship_templates.iter().map(|(k, r)| {
        vec![
            "relationship".to_string(),
            k.clone(),
            r.relationship_type.clone(),
            entity_cell(ctx.relationship_entity(k)),
            String::new(),
        ]
    });
    nodes.chain(rels).collect()
}

use std::path::Path;
use std::process;

use tessera_eval::{Interpreter, Value};
use tracing::info;

use crate::config::CliConfig;
use crate::{load_program, report_error, OutputFormat};

pub(crate) fn cmd_run(file: &Path, config: &CliConfig, output: OutputFormat, quiet: bool) {
    let program = load_program(file, output, quiet);
    info!(
        path = %file.display(),
        predicates = program.predicates.len(),
        steps = program.main.len(),
        "program loaded"
    );

    let mut interpreter = match Interpreter::new(config.runtime.clone()) {
        Ok(i) => i,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    match interpreter.run_program(&program) {
        Ok(value) => print_result(&value, config.output.pretty, output),
        Err(e) => {
            let trace = interpreter.failure_trace();
            match output {
                OutputFormat::Json => {
                    let err_json = serde_json::json!({
                        "error": e.to_string(),
                        "trace": trace,
                    });
                    eprintln!("{}", err_json);
                }
                OutputFormat::Text => {
                    if !quiet {
                        eprintln!("error: {}", e);
                        for line in &trace {
                            eprintln!("  at {}", line);
                        }
                    }
                }
            }
            process::exit(1);
        }
    }
}

fn print_result(value: &Value, pretty: bool, output: OutputFormat) {
    // Non-JSON values (invocables, quoted calls) fall back to their text form.
    let text = value
        .to_json_string(pretty)
        .unwrap_or_else(|_| value.as_string());
    match output {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Json => {
            let result = value
                .to_json()
                .unwrap_or_else(|_| serde_json::Value::String(value.as_string()));
            let out = serde_json::json!({ "result": result });
            let rendered = if pretty {
                serde_json::to_string_pretty(&out)
            } else {
                serde_json::to_string(&out)
            };
            println!("{}", rendered.unwrap_or(text));
        }
    }
}

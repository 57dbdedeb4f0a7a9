use std::path::Path;
use std::process;

use tessera_eval::Interpreter;

use crate::config::CliConfig;
use crate::{load_program, report_error, OutputFormat};

pub(crate) fn cmd_check(file: &Path, config: &CliConfig, output: OutputFormat, quiet: bool) {
    let program = load_program(file, output, quiet);

    let interpreter = match Interpreter::new(config.runtime.clone()) {
        Ok(i) => i,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };

    if let Err(e) = interpreter.check_program(&program) {
        report_error(&format!("{}", e), output, quiet);
        process::exit(1);
    }

    match output {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "ok": true,
                "predicates": program.predicates.len(),
                "main_steps": program.main.len(),
            });
            println!("{}", summary);
        }
        OutputFormat::Text => {
            if !quiet {
                println!(
                    "ok: {} predicate(s), {} main step(s)",
                    program.predicates.len(),
                    program.main.len()
                );
            }
        }
    }
}

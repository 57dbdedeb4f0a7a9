use std::path::Path;
use std::process;

use tessera_eval::Interpreter;

use crate::config::CliConfig;
use crate::{load_program, report_error, OutputFormat};

/// Load the program's predicates on top of the built-in library and list
/// the resulting table.
pub(crate) fn cmd_describe(file: &Path, config: &CliConfig, output: OutputFormat, quiet: bool) {
    let program = load_program(file, output, quiet);

    let mut interpreter = match Interpreter::new(config.runtime.clone()) {
        Ok(i) => i,
        Err(e) => {
            report_error(&format!("error: {}", e), output, quiet);
            process::exit(1);
        }
    };
    if let Err(e) = interpreter.load_program(&program) {
        report_error(&format!("error: {}", e), output, quiet);
        process::exit(1);
    }

    let description = interpreter.get_context_sequences_short_description();
    match output {
        OutputFormat::Json => {
            let lines: Vec<&str> = description.lines().collect();
            println!("{}", serde_json::json!({ "sequences": lines }));
        }
        OutputFormat::Text => println!("{}", description),
    }
}

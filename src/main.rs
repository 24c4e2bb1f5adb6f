//! Minimal CLI: compile a schema, validate one document against it.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use schemacheck::{compile, load_from_file, validate};

/// Validate a JSON document against a JSON Schema (draft 2019-09)
#[derive(Parser, Debug)]
#[command(name = "schemacheck")]
pub struct CommandLineInterface {
    /// schema document (JSON Schema draft 2019-09)
    schema_file: PathBuf,

    /// JSON document to validate
    json_file: PathBuf,
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> ExitCode {
        let schema_path = self.schema_file.display();
        let json_path = self.json_file.display();

        let schema_json = match load_from_file(&self.schema_file) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("{error:#}");
                return ExitCode::from(1);
            }
        };

        let schema = match compile(&schema_json) {
            Ok(schema) => schema,
            Err(errors) => {
                println!("Parsing of schema {schema_path} failed.");
                for error in errors {
                    eprintln!("{error}");
                }
                return ExitCode::from(1);
            }
        };
        println!("Parsed schema {schema_path} successfully.");

        let instance = match load_from_file(&self.json_file) {
            Ok(value) => value,
            Err(error) => {
                eprintln!("{error:#}");
                return ExitCode::from(1);
            }
        };

        let result = validate(&schema, &instance);
        if result.success {
            println!("Validated JSON file {json_path} successfully.");
            ExitCode::SUCCESS
        } else {
            println!("Validation of JSON file {json_path} failed.");
            for error in result.errors {
                eprintln!("{error}");
            }
            ExitCode::from(1)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let command_line_interface = CommandLineInterface::load();
    command_line_interface.run()
}

use std::env;
use std::fs;
use std::process;

use esml::EsmlError;

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut check_only = false;
    let mut emit_json = false;
    let mut files: Vec<&str> = Vec::new();
    for arg in &args[1..] {
        match arg.as_str() {
            "--check" => check_only = true,
            "--json" => emit_json = true,
            other => files.push(other),
        }
    }

    if files.is_empty() {
        eprintln!("Usage: esml-render [--check] [--json] <file.esml>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  esml-render template.esml > out.html");
        eprintln!("  esml-render --check *.esml");
        eprintln!("  esml-render --json template.esml");
        process::exit(1);
    }

    let mut exit_code = 0;
    for file_path in files {
        match process_file(file_path, check_only, emit_json) {
            Ok(()) => {
                if check_only {
                    println!("✓ {} is valid", file_path);
                }
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                print_error(&e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn process_file(path: &str, check_only: bool, emit_json: bool) -> Result<(), EsmlError> {
    let source = fs::read_to_string(path)
        .map_err(|e| EsmlError::Validation(format!("failed to read file: {}", e)))?;

    let email = esml::parse(&source)?;
    esml::validate(&email)?;

    if check_only {
        return Ok(());
    }
    if emit_json {
        println!("{}", serde_json::to_string_pretty(&email)?);
    } else {
        println!("{}", esml::render(&email));
    }
    Ok(())
}

fn print_error(error: &EsmlError) {
    match error {
        EsmlError::Parse {
            line,
            column,
            message,
        } => {
            eprintln!("  Parse error at line {}, column {}:", line, column);
            eprintln!("    {}", message);
        }
        EsmlError::UnclosedTag { tag, line, column } => {
            eprintln!(
                "  Tag <{}> opened at line {}, column {} is never closed",
                tag, line, column
            );
        }
        EsmlError::GridSum { row_id, sum } => {
            eprintln!("  Row '{}' has column spans summing to {}, expected 12", row_id, sum);
        }
        other => {
            eprintln!("  {}", other);
        }
    }
}

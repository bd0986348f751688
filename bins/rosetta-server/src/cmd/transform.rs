use std::io::Read;
use std::path::Path;

use rosetta_api::{FieldOverrides, OutputFormat};

use crate::config::TransformArgs;
use crate::error::CliError;

/// Template-authoring preview: render one document and print it.
pub fn run(args: TransformArgs) -> Result<(), CliError> {
    let input = read_input(args.input.as_deref())?;
    let format = resolve_format(&args)?;
    let overrides = args.overrides.apply(FieldOverrides::none());

    let rendered = rosetta_format::transform(&input, &format, &overrides)?;
    println!("{rendered}");
    Ok(())
}

fn read_input(path: Option<&Path>) -> Result<String, CliError> {
    match path {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "input",
            detail: format!("'{}': {e}", path.display()),
        }),
        _ => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            Ok(input)
        }
    }
}

fn resolve_format(args: &TransformArgs) -> Result<OutputFormat, CliError> {
    let template = match (&args.template, &args.template_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(std::fs::read_to_string(path).map_err(|e| CliError::Config {
            context: "template",
            detail: format!("'{}': {e}", path.display()),
        })?),
        (None, None) => None,
    };
    OutputFormat::from_name(&args.format, template).map_err(|detail| CliError::Config {
        context: "format",
        detail,
    })
}

use std::fs;

/// Writes the OpenAPI document to the path given as the first argument, or
/// stdout when none is given.
fn main() -> anyhow::Result<()> {
    let doc = schoolgate::docs::build_openapi(8000)?;
    let rendered = serde_json::to_string_pretty(&doc)?;

    match std::env::args().nth(1) {
        Some(path) => {
            fs::write(&path, rendered)?;
            eprintln!("wrote {}", path);
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

use anyhow::Context;
use survaive_back::services::documentation::ApiDoc;
use utoipa::OpenApi;

fn main() -> anyhow::Result<()> {
    let doc = ApiDoc::openapi()
        .to_pretty_json()
        .context("serializing the OpenAPI document")?;
    println!("{doc}");
    Ok(())
}

//! Hello World Example
//!
//! A pizza-loving app served over HTTP with the core platform.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package hello-world -- --config demos/hello_world/parley.toml
//!
//! curl -X POST http://127.0.0.1:3000/webhook \
//!   -H 'content-type: application/json' \
//!   -d '{"platform":"core","input":{"type":"LAUNCH"},"user":{"data":{"name":"Ada"}}}'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use parley::prelude::*;
use parley::runtime::ConfigLoader;
use serde_json::{Map, Value, json};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(about = "Serve the hello world app over HTTP")]
struct Args {
    /// Configuration file; searched for in the current directory if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides `server.port`.
    #[arg(short, long)]
    port: Option<u16>,
}

// ============================================================================
// Components
// ============================================================================

fn greeting_args(conversation: &Conversation) -> Map<String, Value> {
    let name = conversation
        .user
        .data
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("friend");
    let mut args = Map::new();
    args.insert("name".to_string(), json!(name));
    args
}

fn love_pizza() -> ComponentDeclaration {
    ComponentDeclaration::new("LovePizza")
        .global_handler(LAUNCH, |c| {
            Box::pin(async move {
                let welcome = c.t("welcome", &greeting_args(c));
                let reprompt = c.t("reprompt", &Map::new());
                c.ask(welcome, reprompt);
                Ok(())
            })
        })
        .handler("YesIntent", |c| {
            Box::pin(async move {
                let answer = c.t("yes", &Map::new());
                c.tell(answer);
                Ok(())
            })
        })
        .handler("NoIntent", |c| {
            Box::pin(async move {
                let answer = c.t("no", &Map::new());
                c.tell(answer);
                Ok(())
            })
        })
        .unhandled(|c| {
            Box::pin(async move {
                let reprompt = c.t("reprompt", &Map::new());
                c.ask(reprompt.clone(), reprompt);
                Ok(())
            })
        })
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = ConfigLoader::new().with_current_dir();
    if let Some(path) = &args.config {
        loader = loader.file(path);
    }
    let mut config = loader.load()?;
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let app = App::builder()
        .config(config.clone())
        .register([Usable::plugin(CorePlatform::default())])
        .register([love_pizza()])
        .on_error(|e, conversation| {
            error!(
                error = %e,
                platform = conversation.map(Conversation::platform),
                "Request failed"
            );
        })
        .build()?;

    app.hook(stage::RESPONSE_START, |c| {
        Box::pin(async move {
            info!(outputs = c.output.len(), "Rendering response");
            Ok(())
        })
    })?;

    Arc::new(app).serve(&config.server).await?;

    Ok(())
}
